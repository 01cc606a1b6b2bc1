//! 2D sprite stage rendered with wgpu.
//!
//! A [`Renderer`] owns a set of [`Drawable`] sprites, draws them back to front
//! through a permutable shader pipeline and answers two pixel-exact queries:
//! which drawable is under a point ([`Renderer::pick`]) and whether a drawable
//! touches a given color ([`Renderer::is_touching_color`]).

pub mod app;
pub mod config;
pub mod drawable;
pub mod effects;
pub mod error;
pub mod framebuffer;
pub mod gpu;
pub mod logging;
pub mod matrix;
pub mod preprocess;
pub mod query;
pub mod renderer;
pub mod shader_manager;
pub mod skin;
pub mod skin_loader;
pub mod utils;

pub use config::{RendererConfig, StageBounds};
pub use drawable::{Drawable, DrawableId, DrawableProperties};
pub use effects::{Effect, EffectMask};
pub use error::{RenderError, ShaderError, SkinError};
pub use gpu::{GpuContext, GpuOptions};
pub use renderer::Renderer;
pub use shader_manager::{DrawMode, ShaderManager};
pub use skin::{DecodedImage, SkinEncoding, SkinSource};
pub use skin_loader::{FileSkinLoader, SkinCompletion, SkinLoader, SkinRequest};
