//! Renderer configuration, loadable from JSON.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::RenderError;
use crate::utils::Rgb8;

/// Stage-space rectangle shown on the canvas. `top > bottom`: +Y is up.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StageBounds {
    pub left: f32,
    pub right: f32,
    pub bottom: f32,
    pub top: f32,
}

impl Default for StageBounds {
    fn default() -> Self {
        Self {
            left: -240.0,
            right: 240.0,
            bottom: -180.0,
            top: 180.0,
        }
    }
}

impl StageBounds {
    pub fn width(&self) -> f32 {
        self.right - self.left
    }

    pub fn height(&self) -> f32 {
        self.top - self.bottom
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    pub stage: StageBounds,
    /// Pixel size of the query framebuffer used by color-touch tests.
    pub native_size: [u32; 2],
    /// Largest pick footprint in device pixels.
    pub max_touch_size: [u32; 2],
    /// Per-channel tolerance when matching the touched color.
    pub touch_tolerance: u8,
    /// Per-channel tolerance when matching the color mask.
    pub mask_tolerance: u8,
    /// Canvas clear color, RGBA in 0..=1.
    pub background: [f32; 4],
    /// Debug tint for default-mode draws, 0 (off) to 1 (solid magenta).
    pub fudge: f32,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            stage: StageBounds::default(),
            native_size: [480, 360],
            max_touch_size: [3, 3],
            touch_tolerance: 2,
            mask_tolerance: 2,
            background: [1.0, 1.0, 1.0, 1.0],
            fudge: 0.0,
        }
    }
}

impl RendererConfig {
    pub fn from_json_str(json: &str) -> Result<Self, RenderError> {
        let config: RendererConfig =
            serde_json::from_str(json).map_err(|e| RenderError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, RenderError> {
        let path = path.as_ref();
        let json = fs::read_to_string(path)
            .map_err(|e| RenderError::Config(format!("{}: {e}", path.display())))?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<(), RenderError> {
        if !(self.stage.width() > 0.0 && self.stage.height() > 0.0) {
            return Err(RenderError::Config(format!(
                "stage bounds must have positive extent, got {:?}",
                self.stage
            )));
        }
        if self.native_size.contains(&0) {
            return Err(RenderError::Config("native_size must be non-zero".to_string()));
        }
        if self.max_touch_size.contains(&0) {
            return Err(RenderError::Config("max_touch_size must be non-zero".to_string()));
        }
        Ok(())
    }

    /// Background as the wgpu clear color.
    pub fn clear_color(&self) -> wgpu::Color {
        let [r, g, b, a] = self.background.map(f64::from);
        wgpu::Color { r, g, b, a }
    }

    /// Color mask uniform: rgb in 0..=1 plus the tolerance in the alpha slot.
    pub fn color_mask_uniform(&self, mask: Rgb8) -> [f32; 4] {
        [
            mask[0] as f32 / 255.0,
            mask[1] as f32 / 255.0,
            mask[2] as f32 / 255.0,
            self.mask_tolerance as f32 / 255.0,
        ]
    }
}
