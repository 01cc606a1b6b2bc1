use plutonium_sprites::drawable::{
    color4b_from_id, color4b_to_id, color4f_from_id, DrawableId, NONE_ID,
};

#[test]
fn none_encodes_to_black() {
    assert_eq!(color4b_from_id(NONE_ID), [0, 0, 0, 255]);
    assert_eq!(color4b_to_id(0, 0, 0), NONE_ID);
    assert_eq!(DrawableId::from_color(0, 0, 0), None);
}

#[test]
fn channels_hold_low_middle_high_bytes() {
    assert_eq!(color4b_from_id(0), [1, 0, 0, 255]);
    assert_eq!(color4b_from_id(255), [0, 1, 0, 255]);
    assert_eq!(color4b_from_id(0x0001_0203 - 1), [3, 2, 1, 255]);
}

#[test]
fn ids_survive_the_color_round_trip() {
    for id in [0, 1, 2, 254, 255, 256, 65_535, 65_536, 1_000_000, DrawableId::MAX as i32] {
        let [r, g, b, a] = color4b_from_id(id);
        assert_eq!(a, 255);
        assert_eq!(color4b_to_id(r, g, b), id);
    }
}

#[test]
fn float_color_is_normalized() {
    let c = color4f_from_id(0);
    assert_eq!(c, [1.0 / 255.0, 0.0, 0.0, 1.0]);
    let max = color4f_from_id(DrawableId::MAX as i32);
    assert_eq!(max, [1.0, 1.0, 1.0, 1.0]);
}

#[test]
fn id_range_is_bounded_by_24_bits() {
    assert!(DrawableId::new(DrawableId::MAX).is_some());
    assert!(DrawableId::new(DrawableId::MAX + 1).is_none());
    let id = DrawableId::new(42).unwrap();
    let [r, g, b, _] = color4b_from_id(id.get() as i32);
    assert_eq!(DrawableId::from_color(r, g, b), Some(id));
}
