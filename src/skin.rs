//! Skins: the texture a drawable renders with.
//!
//! A drawable always has an active skin. New skins either install at once
//! (in-memory pixels, inline SVG) or go through the skin loader, in which case
//! the drawable remembers a [`SkinToken`] for the pending load. Only the
//! completion carrying the most recent token is promoted; older completions
//! are dropped.

use std::sync::atomic::{AtomicU64, Ordering};

use resvg::usvg::{Options, Tree};
use tiny_skia::Pixmap;
use wgpu::util::DeviceExt;

use crate::error::SkinError;
use crate::utils::padded_bytes_per_row;

/// Raster sources are authored at double resolution.
pub const BITMAP_RESOLUTION: f32 = 2.0;
/// Vector sources are rasterized at their natural size.
pub const VECTOR_RESOLUTION: f32 = 1.0;
/// Largest side an SVG may rasterize to.
pub const MAX_VECTOR_DIMENSION: u32 = 8192;

/// Decoded RGBA8 pixels, straight (non-premultiplied) alpha, row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedImage {
    width: u32,
    height: u32,
    rgba: Vec<u8>,
}

impl DecodedImage {
    pub fn new(width: u32, height: u32, rgba: Vec<u8>) -> Result<Self, SkinError> {
        if width == 0 || height == 0 {
            return Err(SkinError::Empty { width, height });
        }
        let expected = width as usize * height as usize * 4;
        if rgba.len() != expected {
            return Err(SkinError::PixelCount {
                width,
                height,
                expected,
                actual: rgba.len(),
            });
        }
        Ok(Self {
            width,
            height,
            rgba,
        })
    }

    /// A `width`x`height` image filled with one color.
    pub fn solid(width: u32, height: u32, color: [u8; 4]) -> Result<Self, SkinError> {
        let rgba = color
            .iter()
            .copied()
            .cycle()
            .take(width as usize * height as usize * 4)
            .collect();
        Self::new(width, height, rgba)
    }

    /// The fully transparent 1x1 placeholder every drawable starts with.
    pub fn transparent_placeholder() -> Self {
        Self {
            width: 1,
            height: 1,
            rgba: vec![0, 0, 0, 0],
        }
    }

    /// Decodes PNG, JPEG, GIF, BMP and the other formats `image` understands.
    pub fn from_encoded(bytes: &[u8]) -> Result<Self, SkinError> {
        let rgba = image::load_from_memory(bytes)?.to_rgba8();
        let (width, height) = rgba.dimensions();
        Self::new(width, height, rgba.into_raw())
    }

    /// Rasterizes SVG (or gzip-compressed SVGZ) data at its natural size.
    pub fn from_svg(data: &[u8]) -> Result<Self, SkinError> {
        let tree = Tree::from_data(data, &Options::default())
            .map_err(|e| SkinError::Svg(e.to_string()))?;
        let size = tree.size();
        let width = size.width().ceil() as u32;
        let height = size.height().ceil() as u32;
        if width > MAX_VECTOR_DIMENSION || height > MAX_VECTOR_DIMENSION {
            return Err(SkinError::TooLarge {
                width,
                height,
                max: MAX_VECTOR_DIMENSION,
            });
        }
        let mut pixmap = Pixmap::new(width, height).ok_or(SkinError::Empty { width, height })?;
        pixmap.fill(tiny_skia::Color::TRANSPARENT);
        resvg::render(&tree, tiny_skia::Transform::identity(), &mut pixmap.as_mut());

        let rgba = pixmap
            .pixels()
            .iter()
            .flat_map(|p| {
                let c = p.demultiply();
                [c.red(), c.green(), c.blue(), c.alpha()]
            })
            .collect();
        Self::new(width, height, rgba)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn rgba(&self) -> &[u8] {
        &self.rgba
    }

    /// Pixels with color channels multiplied by alpha, as the shaders expect.
    pub fn premultiplied(&self) -> Vec<u8> {
        self.rgba
            .chunks_exact(4)
            .flat_map(|px| {
                let a = px[3] as u16;
                let mul = |c: u8| ((c as u16 * a + 127) / 255) as u8;
                [mul(px[0]), mul(px[1]), mul(px[2]), px[3]]
            })
            .collect()
    }
}

/// Declared encoding of a located skin asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SkinEncoding {
    Vector,
    Bitmap,
}

impl SkinEncoding {
    /// Classifies an asset name by extension. `svg`/`svgz`, including the
    /// `.../get/` asset-server form, are vector; everything else is bitmap.
    pub fn from_name(name: &str) -> SkinEncoding {
        let trimmed = name.trim_end_matches('/');
        let trimmed = trimmed.strip_suffix("/get").unwrap_or(trimmed);
        let ext = trimmed
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "svg" | "svgz" => SkinEncoding::Vector,
            _ => SkinEncoding::Bitmap,
        }
    }

    pub fn resolution(self) -> f32 {
        match self {
            SkinEncoding::Vector => VECTOR_RESOLUTION,
            SkinEncoding::Bitmap => BITMAP_RESOLUTION,
        }
    }
}

/// What a drawable should wear next.
#[derive(Debug, Clone)]
pub enum SkinSource {
    /// Replace the skin with the transparent placeholder.
    Empty,
    /// Already-decoded raster pixels; installed synchronously.
    Pixels(DecodedImage),
    /// Inline SVG markup; rasterized and installed synchronously.
    Svg(String),
    /// A located asset fetched and decoded by the skin loader.
    Asset {
        location: String,
        encoding: SkinEncoding,
    },
}

impl SkinSource {
    /// A located asset, classified by its name.
    pub fn asset(location: impl Into<String>) -> Self {
        let location = location.into();
        let encoding = SkinEncoding::from_name(&location);
        SkinSource::Asset { location, encoding }
    }
}

/// Identifies one skin load request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SkinToken(u64);

static NEXT_SKIN_TOKEN: AtomicU64 = AtomicU64::new(1);

impl SkinToken {
    fn next() -> Self {
        SkinToken(NEXT_SKIN_TOKEN.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

/// Outcome of offering a finished load to a [`SkinSlot`].
#[derive(Debug)]
pub enum Promotion<T> {
    /// The value is now active; `released` is the skin it replaced.
    Promoted { released: Option<T> },
    /// The token no longer matches the pending load; the value is handed back.
    Stale(T),
}

/// Active skin plus at most one pending load.
#[derive(Debug)]
pub struct SkinSlot<T> {
    active: Option<T>,
    pending: Option<SkinToken>,
}

impl<T> Default for SkinSlot<T> {
    fn default() -> Self {
        Self {
            active: None,
            pending: None,
        }
    }
}

impl<T> SkinSlot<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active(&self) -> Option<&T> {
        self.active.as_ref()
    }

    pub fn pending(&self) -> Option<SkinToken> {
        self.pending
    }

    /// Starts a new load; any earlier pending load is invalidated.
    pub fn begin_load(&mut self) -> SkinToken {
        let token = SkinToken::next();
        self.pending = Some(token);
        token
    }

    /// Installs `value` immediately, cancelling any pending load.
    pub fn install(&mut self, value: T) -> Option<T> {
        self.pending = None;
        self.active.replace(value)
    }

    pub fn is_current(&self, token: SkinToken) -> bool {
        self.pending == Some(token)
    }

    pub fn complete(&mut self, token: SkinToken, value: T) -> Promotion<T> {
        if !self.is_current(token) {
            return Promotion::Stale(value);
        }
        self.pending = None;
        Promotion::Promoted {
            released: self.active.replace(value),
        }
    }

    /// Clears the pending load if `token` is current. The active skin stays.
    pub fn fail(&mut self, token: SkinToken) -> bool {
        if self.is_current(token) {
            self.pending = None;
            true
        } else {
            false
        }
    }

    /// Drops the pending load and hands back the active skin.
    pub fn clear(&mut self) -> Option<T> {
        self.pending = None;
        self.active.take()
    }
}

/// GPU-side pieces needed to upload a skin.
pub struct SkinUploader<'a> {
    pub device: &'a wgpu::Device,
    pub queue: &'a wgpu::Queue,
    pub layout: &'a wgpu::BindGroupLayout,
    pub sampler: &'a wgpu::Sampler,
}

/// An uploaded skin texture and its bind group.
#[derive(Debug)]
pub struct SkinTexture {
    texture: wgpu::Texture,
    bind_group: wgpu::BindGroup,
    pixel_size: [u32; 2],
    resolution: f32,
}

impl SkinTexture {
    pub const FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

    /// Uploads `image`. Images wider or taller than the device allows are
    /// rejected before any GPU object is created.
    pub fn upload(
        ctx: &SkinUploader<'_>,
        image: &DecodedImage,
        resolution: f32,
    ) -> Result<Self, SkinError> {
        let max = ctx.device.limits().max_texture_dimension_2d;
        if image.width() > max || image.height() > max {
            return Err(SkinError::TooLarge {
                width: image.width(),
                height: image.height(),
                max,
            });
        }
        let extent = wgpu::Extent3d {
            width: image.width(),
            height: image.height(),
            depth_or_array_layers: 1,
        };
        let texture = ctx.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Skin Texture"),
            size: extent,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: Self::FORMAT,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        let unpadded_bytes_per_row = image.width() as usize * 4;
        let padded = padded_bytes_per_row(image.width()) as usize;
        let pixels = image.premultiplied();
        let mut padded_buffer = vec![0u8; padded * image.height() as usize];
        for (y, row) in pixels.chunks_exact(unpadded_bytes_per_row).enumerate() {
            let dst_start = y * padded;
            padded_buffer[dst_start..dst_start + unpadded_bytes_per_row].copy_from_slice(row);
        }

        let buffer = ctx
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Skin Pixel Buffer"),
                contents: &padded_buffer,
                usage: wgpu::BufferUsages::COPY_SRC,
            });

        let mut encoder = ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Skin Upload Encoder"),
            });
        encoder.copy_buffer_to_texture(
            wgpu::ImageCopyBuffer {
                buffer: &buffer,
                layout: wgpu::ImageDataLayout {
                    offset: 0,
                    bytes_per_row: Some(padded as u32),
                    rows_per_image: Some(image.height()),
                },
            },
            wgpu::ImageCopyTexture {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            extent,
        );
        ctx.queue.submit(std::iter::once(encoder.finish()));

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let bind_group = ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: ctx.layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(ctx.sampler),
                },
            ],
            label: Some("skin_bind_group"),
        });

        Ok(Self {
            texture,
            bind_group,
            pixel_size: [image.width(), image.height()],
            resolution,
        })
    }

    pub fn bind_group(&self) -> &wgpu::BindGroup {
        &self.bind_group
    }

    pub fn pixel_size(&self) -> [u32; 2] {
        self.pixel_size
    }

    pub fn resolution(&self) -> f32 {
        self.resolution
    }

    /// Layout size in stage units: texture size divided by resolution.
    pub fn nominal_size(&self) -> [f32; 2] {
        [
            self.pixel_size[0] as f32 / self.resolution,
            self.pixel_size[1] as f32 / self.resolution,
        ]
    }
}

impl Drop for SkinTexture {
    fn drop(&mut self) {
        self.texture.destroy();
    }
}

/// Shared sampler for skins: nearest filtering, clamped edges.
pub fn create_skin_sampler(device: &wgpu::Device) -> wgpu::Sampler {
    device.create_sampler(&wgpu::SamplerDescriptor {
        label: Some("Skin Sampler"),
        address_mode_u: wgpu::AddressMode::ClampToEdge,
        address_mode_v: wgpu::AddressMode::ClampToEdge,
        address_mode_w: wgpu::AddressMode::ClampToEdge,
        mag_filter: wgpu::FilterMode::Nearest,
        min_filter: wgpu::FilterMode::Nearest,
        mipmap_filter: wgpu::FilterMode::Nearest,
        ..Default::default()
    })
}
