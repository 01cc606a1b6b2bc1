use std::f32::consts::PI;

use plutonium_sprites::effects::{Effect, EffectMask, EffectState};

fn approx(a: f32, b: f32) -> bool {
    (a - b).abs() < 1e-5
}

#[test]
fn bit_follows_raw_value() {
    for effect in Effect::ALL {
        let mut state = EffectState::new();
        state.set(effect, 0.0);
        assert!(!state.mask().contains(effect), "{effect} set for 0");
        state.set(effect, 5.0);
        assert!(state.mask().contains(effect), "{effect} clear for 5");
        state.set(effect, -5.0);
        assert!(state.mask().contains(effect), "{effect} clear for -5");
        state.set(effect, 0.0);
        assert!(state.mask().is_empty());
    }
}

#[test]
fn bit_is_independent_of_converted_value() {
    let mut state = EffectState::new();
    // Clamps to a converted value equal to the neutral one, bit still set.
    state.set(Effect::Ghost, -50.0);
    assert!(state.mask().contains(Effect::Ghost));
    assert!(approx(state.value(Effect::Ghost), 1.0));
}

#[test]
fn bits_are_in_declaration_order() {
    let bits: Vec<u32> = Effect::ALL.iter().map(|e| e.mask()).collect();
    assert_eq!(bits, vec![1, 2, 4, 8, 16, 32, 64]);
    assert_eq!(EffectMask::ALL.bits(), 0x7f);
    assert_eq!(EffectMask::from_bits(0xff).bits(), 0x7f);
}

#[test]
fn converters() {
    assert!(approx(Effect::Color.convert(100.0), 0.5));
    assert!(approx(Effect::Color.convert(300.0), 0.5));
    assert!(approx(Effect::Color.convert(-100.0), -0.5));
    assert!(approx(Effect::Fisheye.convert(-200.0), 0.0));
    assert!(approx(Effect::Fisheye.convert(0.0), 1.0));
    assert!(approx(Effect::Fisheye.convert(50.0), 1.5));
    assert!(approx(Effect::Whirl.convert(180.0), PI));
    assert!(approx(Effect::Pixelate.convert(-20.0), 2.0));
    assert!(approx(Effect::Mosaic.convert(0.0), 1.0));
    assert!(approx(Effect::Mosaic.convert(95.0), 11.0));
    assert!(approx(Effect::Mosaic.convert(1.0e6), 512.0));
    assert!(approx(Effect::Brightness.convert(150.0), 1.0));
    assert!(approx(Effect::Brightness.convert(-50.0), -0.5));
    assert!(approx(Effect::Ghost.convert(25.0), 0.75));
    assert!(approx(Effect::Ghost.convert(200.0), 0.0));
}

#[test]
fn default_values_are_neutral() {
    let state = EffectState::default();
    assert!(state.mask().is_empty());
    assert!(approx(state.value(Effect::Ghost), 1.0));
    assert!(approx(state.value(Effect::Mosaic), 1.0));
    assert!(approx(state.value(Effect::Fisheye), 1.0));
    assert!(approx(state.value(Effect::Brightness), 0.0));
}

#[test]
fn mask_collects_and_iterates_in_order() {
    let mask: EffectMask = [Effect::Ghost, Effect::Color, Effect::Whirl].into_iter().collect();
    let order: Vec<Effect> = mask.iter().collect();
    assert_eq!(order, vec![Effect::Color, Effect::Whirl, Effect::Ghost]);
    assert!(!mask.without(Effect::Whirl).contains(Effect::Whirl));
}

#[test]
fn names_round_trip() {
    for effect in Effect::ALL {
        assert_eq!(Effect::from_name(effect.name()), Some(effect));
    }
    assert_eq!(Effect::from_name("blur"), None);
    assert_eq!(serde_json::to_string(&Effect::Fisheye).unwrap(), "\"fisheye\"");
    let parsed: Effect = serde_json::from_str("\"brightness\"").unwrap();
    assert_eq!(parsed, Effect::Brightness);
}
