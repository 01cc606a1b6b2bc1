use plutonium_sprites::drawable::Transform;
use plutonium_sprites::matrix::{self, transform_point};

fn approx(a: f32, b: f32) -> bool {
    (a - b).abs() < 1e-4
}

#[test]
fn default_direction_is_a_half_turn() {
    let mut t = Transform::new();
    t.set_skin_size([10.0, 20.0]);
    let m = t.model_matrix();
    // direction 90 rotates by (270 - 90) degrees.
    assert!(approx(m[0][0], -10.0));
    assert!(approx(m[1][1], -20.0));
    assert!(approx(m[0][1], 0.0));
    assert!(approx(m[1][0], 0.0));
}

#[test]
fn matrix_is_stable_without_changes() {
    let mut t = Transform::new();
    t.set_skin_size([32.0, 16.0]);
    t.set_position([12.0, -7.5]);
    t.set_direction(33.0);
    let first = t.model_matrix();
    assert!(!t.is_dirty());
    let second = t.model_matrix();
    assert_eq!(first, second);
}

#[test]
fn unchanged_values_do_not_dirty() {
    let mut t = Transform::new();
    t.set_skin_size([4.0, 4.0]);
    t.model_matrix();
    t.set_position([0.0, 0.0]);
    t.set_direction(90.0);
    t.set_scale([100.0, 100.0]);
    assert!(!t.is_dirty());
    t.set_scale([50.0, 100.0]);
    assert!(t.is_dirty());
}

#[test]
fn translation_lands_in_last_column() {
    let mut t = Transform::new();
    t.set_skin_size([1.0, 1.0]);
    t.set_position([30.0, -40.0]);
    let m = t.model_matrix();
    assert!(approx(m[3][0], 30.0));
    assert!(approx(m[3][1], -40.0));
}

#[test]
fn direction_zero_is_three_quarter_turn() {
    let mut t = Transform::new();
    t.set_skin_size([10.0, 10.0]);
    t.set_direction(0.0);
    let m = t.model_matrix();
    let p = transform_point(&m, [0.5, 0.0, 0.0]);
    assert!(approx(p[0], 0.0));
    assert!(approx(p[1], -5.0));
}

#[test]
fn scale_is_percent_of_skin_size() {
    let mut t = Transform::new();
    t.set_skin_size([10.0, 10.0]);
    t.set_scale([200.0, 50.0]);
    let m = t.model_matrix();
    let corner = transform_point(&m, [0.5, 0.5, 0.0]);
    assert!(approx(corner[0].abs(), 10.0));
    assert!(approx(corner[1].abs(), 2.5));
}

#[test]
fn ortho_maps_stage_corners_to_clip_space() {
    let proj = matrix::ortho(-240.0, 240.0, -180.0, 180.0, -1.0, 1.0);
    let top_right = transform_point(&proj, [240.0, 180.0, 0.0]);
    let bottom_left = transform_point(&proj, [-240.0, -180.0, 0.0]);
    assert!(approx(top_right[0], 1.0) && approx(top_right[1], 1.0));
    assert!(approx(bottom_left[0], -1.0) && approx(bottom_left[1], -1.0));
    assert!(approx(top_right[2], 0.0));
}

#[test]
fn multiply_by_identity_is_noop() {
    let m = matrix::rotate_z(&matrix::translate(&matrix::IDENTITY, [1.0, 2.0, 3.0]), 0.7);
    assert_eq!(matrix::multiply(&m, &matrix::identity()), m);
    assert_eq!(matrix::multiply(&matrix::identity(), &m), m);
}
