//! CPU side of the GPU queries: pick footprint math and read-back interpretation.

use crate::config::StageBounds;
use crate::drawable::{color4b_to_id, DrawableId, NONE_ID};
use crate::matrix::{self, Mat4};
use crate::utils::Rgb8;

/// Clamps a touch footprint (device pixels) to `[1, max]` per axis.
pub fn clamp_touch_size(size: [f32; 2], max: [u32; 2]) -> [u32; 2] {
    [0, 1].map(|axis| {
        let rounded = size[axis].round();
        let rounded = if rounded.is_finite() { rounded } else { 1.0 };
        (rounded.max(1.0) as u32).clamp(1, max[axis].max(1))
    })
}

/// Where and how to render a pick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PickRegion {
    /// Projection covering exactly the touched pixels.
    pub projection: Mat4,
    /// Footprint in device pixels, already clamped.
    pub width: u32,
    pub height: u32,
}

/// Inputs of [`pick_region`], in client (CSS-like) pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PickRequest {
    pub x: f32,
    pub y: f32,
    pub touch_width: f32,
    pub touch_height: f32,
}

/// Builds the tight projection for a pick centered on a client-space point.
///
/// `device_pixel_ratio` converts client to canvas pixels per axis;
/// `canvas_size` is in canvas pixels.
pub fn pick_region(
    request: PickRequest,
    device_pixel_ratio: [f32; 2],
    canvas_size: [u32; 2],
    max_touch_size: [u32; 2],
    stage: &StageBounds,
) -> PickRegion {
    let [width, height] = clamp_touch_size(
        [
            request.touch_width * device_pixel_ratio[0],
            request.touch_height * device_pixel_ratio[1],
        ],
        max_touch_size,
    );

    let center_x = request.x * device_pixel_ratio[0];
    let center_y = request.y * device_pixel_ratio[1];
    let half_floor = |n: u32| (n / 2) as f32;
    let half_ceil = |n: u32| n.div_ceil(2) as f32;

    let pixel_left = (center_x - half_floor(width) + 0.5).floor();
    let pixel_right = (center_x + half_ceil(width) + 0.5).floor();
    let pixel_top = (center_y - half_floor(height) + 0.5).floor();
    let pixel_bottom = (center_y + half_ceil(height) + 0.5).floor();

    let width_per_pixel = stage.width() / canvas_size[0].max(1) as f32;
    let height_per_pixel = stage.height() / canvas_size[1].max(1) as f32;

    let pick_left = stage.left + pixel_left * width_per_pixel;
    let pick_right = stage.left + pixel_right * width_per_pixel;
    let pick_top = stage.top - pixel_top * height_per_pixel;
    let pick_bottom = stage.top - pixel_bottom * height_per_pixel;

    PickRegion {
        projection: matrix::ortho(pick_left, pick_right, pick_bottom, pick_top, -1.0, 1.0),
        width,
        height,
    }
}

/// Projection of the whole stage.
pub fn stage_projection(stage: &StageBounds) -> Mat4 {
    matrix::ortho(stage.left, stage.right, stage.bottom, stage.top, -1.0, 1.0)
}

/// Decodes RGBA pick pixels and returns the most frequent drawable.
///
/// Background (NONE) pixels never win; ties go to the ID seen first.
pub fn decode_pick_hits(pixels: &[u8]) -> Option<DrawableId> {
    let mut hits: Vec<(i32, u32)> = Vec::new();
    for px in pixels.chunks_exact(4) {
        let id = color4b_to_id(px[0], px[1], px[2]);
        match hits.iter_mut().find(|(seen, _)| *seen == id) {
            Some((_, count)) => *count += 1,
            None => hits.push((id, 1)),
        }
    }

    let mut best: Option<i32> = None;
    let mut best_count = 0;
    for (id, count) in hits {
        let count = if id == NONE_ID { 0 } else { count };
        if count > best_count {
            best = Some(id);
            best_count = count;
        }
    }
    best.and_then(|id| u32::try_from(id).ok()).and_then(DrawableId::new)
}

/// True if any non-transparent RGBA pixel is within `tolerance` of `color` on every channel.
pub fn find_touching_color(pixels: &[u8], color: Rgb8, tolerance: u8) -> bool {
    pixels.chunks_exact(4).any(|px| {
        px[3] != 0
            && px[..3]
                .iter()
                .zip(color)
                .all(|(&have, want)| have.abs_diff(want) <= tolerance)
    })
}
