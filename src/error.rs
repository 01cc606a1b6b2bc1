use thiserror::Error;

use crate::drawable::DrawableId;
use crate::shader_manager::ShaderKey;

/// Shader permutation could not be built.
///
/// Never cached: the next request for the same key compiles again.
#[derive(Debug, Error)]
pub enum ShaderError {
    #[error("preprocessing shader {key:?} failed at line {line}: {message}")]
    Preprocess {
        key: ShaderKey,
        line: usize,
        message: String,
    },
    #[error("compiling shader {key:?} failed: {message}\n{source_listing}")]
    Compile {
        key: ShaderKey,
        message: String,
        source_listing: String,
    },
    #[error("building pipeline for shader {key:?} failed: {message}")]
    Pipeline { key: ShaderKey, message: String },
}

#[derive(Debug, Error)]
pub enum SkinError {
    #[error("failed to read skin '{location}': {source}")]
    Io {
        location: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to decode bitmap skin: {0}")]
    Decode(#[from] image::ImageError),
    #[error("failed to parse vector skin: {0}")]
    Svg(String),
    #[error("skin pixel data is {actual} bytes, expected {expected} for {width}x{height}")]
    PixelCount {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },
    #[error("skin has zero area ({width}x{height})")]
    Empty { width: u32, height: u32 },
    #[error("skin is {width}x{height}, larger than the {max} pixel limit")]
    TooLarge { width: u32, height: u32, max: u32 },
    #[error("skin location '{0}' is outside the loader root")]
    OutsideRoot(String),
    #[error("skin loader gave up on '{0}'")]
    Abandoned(String),
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error(transparent)]
    Shader(#[from] ShaderError),
    #[error(transparent)]
    Skin(#[from] SkinError),
    #[error("gpu setup failed: {0}")]
    Gpu(String),
    #[error("surface unavailable: {0}")]
    Surface(#[from] wgpu::SurfaceError),
    #[error("pixel read-back failed: {0}")]
    Readback(String),
    #[error("no drawable with id {0}")]
    UnknownDrawable(DrawableId),
    #[error("drawable id space exhausted")]
    IdSpaceExhausted,
    #[error("invalid renderer config: {0}")]
    Config(String),
    #[error("canvas cannot be read back: {0}")]
    CanvasNotReadable(&'static str),
}
