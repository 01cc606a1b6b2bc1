//! Renders a small stage offscreen, saves it as PNG and reports pick and
//! color-touch results.
//!
//! Usage: `stage_snapshot [config.json]`

use std::fs;
use std::path::Path;

use anyhow::Context;
use plutonium_sprites::logging::{init_logging, LoggingConfig};
use plutonium_sprites::{
    DecodedImage, DrawableProperties, Effect, Renderer, RendererConfig, SkinSource,
};

const CIRCLE_SVG: &str = r##"<svg xmlns="http://www.w3.org/2000/svg" width="40" height="40">
  <circle cx="20" cy="20" r="18" fill="#20c020"/>
</svg>"##;

fn compare_with_tolerance(a: &image::RgbaImage, b: &image::RgbaImage, tolerance: u8) -> bool {
    if a.dimensions() != b.dimensions() {
        return false;
    }
    a.pixels().zip(b.pixels()).all(|(pa, pb)| {
        let da = pa.0;
        let db = pb.0;
        (0..4).all(|i| da[i].abs_diff(db[i]) <= tolerance)
    })
}

fn main() -> anyhow::Result<()> {
    init_logging(LoggingConfig::default());

    let config = match std::env::args().nth(1) {
        Some(path) => RendererConfig::load(&path).with_context(|| format!("loading {path}"))?,
        None => RendererConfig::default(),
    };
    let mut renderer = Renderer::headless(config).context("creating headless renderer")?;

    let back = renderer.create_drawable()?;
    renderer.update_drawable_properties(
        back,
        DrawableProperties::new()
            .with_skin(SkinSource::Pixels(DecodedImage::solid(80, 80, [0, 0, 255, 255])?))
            .with_position(-20.0, 0.0),
    )?;

    let front = renderer.create_drawable()?;
    renderer.update_drawable_properties(
        front,
        DrawableProperties::new()
            .with_skin(SkinSource::Pixels(DecodedImage::solid(80, 80, [255, 0, 0, 255])?))
            .with_position(20.0, 10.0)
            .with_direction(75.0)
            .with_effect(Effect::Ghost, 25.0),
    )?;

    let circle = renderer.create_drawable()?;
    renderer.update_drawable_properties(
        circle,
        DrawableProperties::new()
            .with_skin(SkinSource::Svg(CIRCLE_SVG.to_string()))
            .with_position(120.0, -80.0)
            .with_scale(150.0, 150.0)
            .with_effect(Effect::Color, 50.0),
    )?;

    renderer.draw()?;
    let canvas = renderer.read_canvas()?;

    fs::create_dir_all("snapshots/actual")?;
    fs::create_dir_all("snapshots/golden")?;
    let out_actual = Path::new("snapshots/actual/stage.png");
    let out_golden = Path::new("snapshots/golden/stage.png");
    canvas
        .save(out_actual)
        .with_context(|| format!("writing {}", out_actual.display()))?;

    if !out_golden.exists() {
        fs::copy(out_actual, out_golden)?;
        println!("golden created at {}", out_golden.display());
    } else {
        let golden = image::open(out_golden)?.to_rgba8();
        if compare_with_tolerance(&canvas, &golden, 3) {
            println!("snapshot OK for stage.png");
        } else {
            println!("snapshot mismatch for stage.png");
        }
    }

    let [width, height] = renderer.canvas_size();
    let center = (width as f32 / 2.0, height as f32 / 2.0);
    for (label, (x, y)) in [
        ("center", center),
        ("left of center", (center.0 - 50.0, center.1)),
        ("corner", (2.0, 2.0)),
    ] {
        match renderer.pick(x, y, 3.0, 3.0, None)? {
            Some(id) => println!("pick {label} ({x}, {y}) -> drawable {id}"),
            None => println!("pick {label} ({x}, {y}) -> nothing"),
        }
    }

    let touching = renderer.is_touching_color(front, [0, 0, 255], None)?;
    println!("front touching blue: {touching}");
    let touching = renderer.is_touching_color(circle, [0, 0, 255], None)?;
    println!("circle touching blue: {touching}");
    Ok(())
}
