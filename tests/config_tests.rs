use plutonium_sprites::config::RendererConfig;
use plutonium_sprites::RenderError;

#[test]
fn defaults_describe_the_standard_stage() {
    let config = RendererConfig::default();
    assert_eq!(config.stage.width(), 480.0);
    assert_eq!(config.stage.height(), 360.0);
    assert_eq!(config.native_size, [480, 360]);
    assert_eq!(config.max_touch_size, [3, 3]);
    assert_eq!(config.touch_tolerance, 2);
    assert!(config.validate().is_ok());
}

#[test]
fn partial_json_keeps_defaults() {
    let config = RendererConfig::from_json_str(r#"{ "touch_tolerance": 5, "fudge": 0.5 }"#).unwrap();
    assert_eq!(config.touch_tolerance, 5);
    assert_eq!(config.fudge, 0.5);
    assert_eq!(config.native_size, [480, 360]);
}

#[test]
fn json_round_trip() {
    let mut config = RendererConfig::default();
    config.background = [0.0, 0.5, 1.0, 1.0];
    config.max_touch_size = [5, 7];
    let json = serde_json::to_string(&config).unwrap();
    assert_eq!(RendererConfig::from_json_str(&json).unwrap(), config);
}

#[test]
fn invalid_values_are_rejected() {
    let err = RendererConfig::from_json_str(r#"{ "native_size": [0, 360] }"#).unwrap_err();
    assert!(matches!(err, RenderError::Config(_)));
    let err = RendererConfig::from_json_str(
        r#"{ "stage": { "left": 10, "right": -10, "bottom": 0, "top": 1 } }"#,
    )
    .unwrap_err();
    assert!(matches!(err, RenderError::Config(_)));
    assert!(RendererConfig::from_json_str("not json").is_err());
}

#[test]
fn missing_file_is_a_config_error() {
    let err = RendererConfig::load("/definitely/not/here.json").unwrap_err();
    assert!(matches!(err, RenderError::Config(_)));
}

#[test]
fn mask_uniform_carries_tolerance() {
    let config = RendererConfig::default();
    assert_eq!(
        config.color_mask_uniform([255, 0, 51]),
        [1.0, 0.0, 0.2, 2.0 / 255.0]
    );
}
