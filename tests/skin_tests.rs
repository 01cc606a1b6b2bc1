use std::fs;
use std::io::Cursor;

use plutonium_sprites::skin::{
    DecodedImage, Promotion, SkinEncoding, SkinSlot, SkinSource, BITMAP_RESOLUTION,
    MAX_VECTOR_DIMENSION, VECTOR_RESOLUTION,
};
use plutonium_sprites::skin_loader::{FileSkinLoader, SkinRequest};
use plutonium_sprites::SkinError;

const SQUARE_SVG: &str = r##"<svg xmlns="http://www.w3.org/2000/svg" width="10" height="8">
  <rect width="10" height="8" fill="#ff0000"/>
</svg>"##;

#[test]
fn only_the_latest_load_is_promoted() {
    let mut slot = SkinSlot::new();
    assert!(slot.install("placeholder").is_none());

    let first = slot.begin_load();
    let second = slot.begin_load();
    assert_ne!(first, second);

    match slot.complete(first, "first") {
        Promotion::Stale(value) => assert_eq!(value, "first"),
        Promotion::Promoted { .. } => panic!("stale load promoted"),
    }
    assert_eq!(slot.active(), Some(&"placeholder"));
    assert_eq!(slot.pending(), Some(second));

    match slot.complete(second, "second") {
        Promotion::Promoted { released } => assert_eq!(released, Some("placeholder")),
        Promotion::Stale(_) => panic!("current load dropped"),
    }
    assert_eq!(slot.active(), Some(&"second"));
    assert_eq!(slot.pending(), None);
}

#[test]
fn synchronous_install_cancels_pending_load() {
    let mut slot = SkinSlot::new();
    slot.install(1);
    let token = slot.begin_load();
    assert_eq!(slot.install(2), Some(1));
    assert!(matches!(slot.complete(token, 3), Promotion::Stale(3)));
    assert_eq!(slot.active(), Some(&2));
}

#[test]
fn failed_load_keeps_active_skin() {
    let mut slot = SkinSlot::new();
    slot.install("old");
    let token = slot.begin_load();
    assert!(slot.fail(token));
    assert!(!slot.fail(token));
    assert_eq!(slot.active(), Some(&"old"));
    assert_eq!(slot.pending(), None);
}

#[test]
fn clear_drops_everything() {
    let mut slot = SkinSlot::new();
    slot.install("a");
    let token = slot.begin_load();
    assert_eq!(slot.clear(), Some("a"));
    assert!(!slot.is_current(token));
    assert!(slot.active().is_none());
}

#[test]
fn encoding_from_name() {
    assert_eq!(SkinEncoding::from_name("cat.svg"), SkinEncoding::Vector);
    assert_eq!(SkinEncoding::from_name("cat.SVGZ"), SkinEncoding::Vector);
    assert_eq!(SkinEncoding::from_name("abc123.svg/get/"), SkinEncoding::Vector);
    assert_eq!(SkinEncoding::from_name("cat.png"), SkinEncoding::Bitmap);
    assert_eq!(SkinEncoding::from_name("no_extension"), SkinEncoding::Bitmap);
    assert_eq!(SkinEncoding::Vector.resolution(), VECTOR_RESOLUTION);
    assert_eq!(SkinEncoding::Bitmap.resolution(), BITMAP_RESOLUTION);
    match SkinSource::asset("costumes/dog.svg") {
        SkinSource::Asset { encoding, .. } => assert_eq!(encoding, SkinEncoding::Vector),
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn decoded_image_validates_size() {
    assert!(matches!(
        DecodedImage::new(2, 2, vec![0; 15]),
        Err(SkinError::PixelCount { expected: 16, actual: 15, .. })
    ));
    assert!(matches!(
        DecodedImage::new(0, 4, vec![]),
        Err(SkinError::Empty { .. })
    ));
    let solid = DecodedImage::solid(2, 1, [1, 2, 3, 4]).unwrap();
    assert_eq!(solid.rgba(), &[1, 2, 3, 4, 1, 2, 3, 4]);
}

#[test]
fn premultiply_scales_color_by_alpha() {
    let image = DecodedImage::new(2, 1, vec![255, 0, 0, 128, 10, 20, 30, 255]).unwrap();
    assert_eq!(image.premultiplied(), vec![128, 0, 0, 128, 10, 20, 30, 255]);
    assert_eq!(DecodedImage::transparent_placeholder().rgba(), &[0, 0, 0, 0]);
}

#[test]
fn svg_rasterizes_at_natural_size() {
    let image = DecodedImage::from_svg(SQUARE_SVG.as_bytes()).unwrap();
    assert_eq!((image.width(), image.height()), (10, 8));
    let center = ((4 * image.width() + 5) * 4) as usize;
    assert_eq!(&image.rgba()[center..center + 4], &[255, 0, 0, 255]);
    assert!(matches!(
        DecodedImage::from_svg(b"<not-svg"),
        Err(SkinError::Svg(_))
    ));
}

#[test]
fn svg_larger_than_the_raster_limit_is_rejected() {
    let huge = r#"<svg xmlns="http://www.w3.org/2000/svg" width="100000" height="100000"/>"#;
    assert!(matches!(
        DecodedImage::from_svg(huge.as_bytes()),
        Err(SkinError::TooLarge { width: 100000, height: 100000, max: MAX_VECTOR_DIMENSION })
    ));
}

#[test]
fn bitmaps_decode_through_image() {
    let source = image::RgbaImage::from_pixel(3, 2, image::Rgba([1, 2, 3, 255]));
    let mut bytes = Vec::new();
    source
        .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
        .unwrap();
    let decoded = DecodedImage::from_encoded(&bytes).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (3, 2));
    assert_eq!(&decoded.rgba()[..4], &[1, 2, 3, 255]);
    assert!(matches!(
        DecodedImage::from_encoded(b"garbage"),
        Err(SkinError::Decode(_))
    ));
}

#[test]
fn file_loader_reads_below_root() {
    let root = std::env::temp_dir().join(format!("plutonium_sprites_skins_{}", std::process::id()));
    fs::create_dir_all(&root).unwrap();
    fs::write(root.join("square.svg"), SQUARE_SVG).unwrap();

    let loader = FileSkinLoader::new(&root);
    assert_eq!(loader.asset_path("square.svg/get/").unwrap(), root.join("square.svg"));
    assert_eq!(loader.asset_path("/sub/./a.png").unwrap(), root.join("sub/./a.png"));
    for location in ["../../etc/passwd", "skins/../../x.png", "a/../b.svg"] {
        assert!(matches!(
            loader.asset_path(location),
            Err(SkinError::OutsideRoot(_))
        ));
    }
    let escaped = loader.decode(&SkinRequest {
        location: "../square.svg".to_string(),
        encoding: SkinEncoding::Vector,
    });
    assert!(matches!(escaped, Err(SkinError::OutsideRoot(_))));

    let image = loader
        .decode(&SkinRequest {
            location: "square.svg".to_string(),
            encoding: SkinEncoding::Vector,
        })
        .unwrap();
    assert_eq!((image.width(), image.height()), (10, 8));

    let missing = loader.decode(&SkinRequest {
        location: "missing.png".to_string(),
        encoding: SkinEncoding::Bitmap,
    });
    assert!(matches!(missing, Err(SkinError::Io { .. })));

    fs::remove_dir_all(&root).ok();
}
