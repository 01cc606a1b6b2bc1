use plutonium_sprites::effects::{Effect, EffectMask};
use plutonium_sprites::preprocess::preprocess;
use plutonium_sprites::shader_manager::{shader_source, DrawMode, ShaderKey};

const MODES: [DrawMode; 3] = [DrawMode::Default, DrawMode::Silhouette, DrawMode::ColorMask];

#[test]
fn silhouette_ignores_color_and_brightness() {
    let noisy = EffectMask::NONE
        .with(Effect::Color)
        .with(Effect::Brightness)
        .with(Effect::Ghost);
    let plain = EffectMask::NONE.with(Effect::Ghost);
    assert_eq!(
        ShaderKey::new(DrawMode::Silhouette, noisy),
        ShaderKey::new(DrawMode::Silhouette, plain)
    );
    assert_ne!(
        ShaderKey::new(DrawMode::Default, noisy),
        ShaderKey::new(DrawMode::Default, plain)
    );
    assert_eq!(ShaderKey::new(DrawMode::ColorMask, noisy).effects(), noisy);
}

#[test]
fn source_starts_with_defines() {
    let key = ShaderKey::new(
        DrawMode::ColorMask,
        EffectMask::NONE.with(Effect::Whirl).with(Effect::Color),
    );
    let source = shader_source(key);
    let preamble: Vec<&str> = source.lines().take(3).collect();
    assert_eq!(
        preamble,
        vec![
            "#define ENABLE_color",
            "#define ENABLE_whirl",
            "#define DRAW_MODE_colorMask"
        ]
    );
}

#[test]
fn every_permutation_preprocesses() {
    for mode in MODES {
        for bits in 0..=EffectMask::ALL.bits() {
            let key = ShaderKey::new(mode, EffectMask::from_bits(bits));
            let raw = shader_source(key);
            let out = preprocess(&raw).unwrap_or_else(|e| panic!("{key:?}: {e:?}"));
            assert_eq!(out.lines().count(), raw.lines().count());
            assert!(!out.contains("#define"));
        }
    }
}

#[test]
fn mode_selects_fragment_branch() {
    let plain = |mode| preprocess(&shader_source(ShaderKey::new(mode, EffectMask::NONE))).unwrap();

    let silhouette = plain(DrawMode::Silhouette);
    assert!(silhouette.contains("sprite.silhouette_color"));
    assert!(!silhouette.contains("color_mask.rgb"));

    let masked = plain(DrawMode::ColorMask);
    assert!(masked.contains("stage_uniforms.color_mask.rgb"));
    assert!(!masked.contains("sprite.silhouette_color;"));

    let default = plain(DrawMode::Default);
    assert!(!default.contains("rgb_to_hsv"));
    assert!(!default.contains("discard"));
}

#[test]
fn effect_code_only_when_enabled() {
    let with_color = preprocess(&shader_source(ShaderKey::new(
        DrawMode::Default,
        EffectMask::NONE.with(Effect::Color),
    )))
    .unwrap();
    assert!(with_color.contains("fn rgb_to_hsv"));
    assert!(!with_color.contains("sprite.whirl"));
}
