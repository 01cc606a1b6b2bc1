//! The stage: drawable arena, draw loop and the GPU-backed queries.

use std::collections::HashMap;
use std::rc::Rc;
use std::sync::mpsc;

use wgpu::util::DeviceExt;
use winit::dpi::PhysicalSize;

use crate::config::RendererConfig;
use crate::drawable::{Drawable, DrawableId, DrawableProperties};
use crate::error::{RenderError, SkinError};
use crate::framebuffer::{create_depth_stencil, Framebuffer, PixelRect, OFFSCREEN_FORMAT};
use crate::gpu::{choose_surface_format, GpuContext, GpuOptions};
use crate::matrix::Mat4;
use crate::query::{self, PickRequest};
use crate::shader_manager::{DrawMode, PipelineVariant, ShaderManager, StencilMode, STENCIL_REFERENCE};
use crate::skin::{
    create_skin_sampler, DecodedImage, SkinSource, SkinTexture, SkinUploader, BITMAP_RESOLUTION,
    VECTOR_RESOLUTION,
};
use crate::skin_loader::{FileSkinLoader, SkinCompletion, SkinLoadResult, SkinLoader, SkinRequest};
use crate::utils::{Rgb8, QUAD_INDICES, QUAD_VERTICES};

/// Uniforms shared by every drawable in a pass.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct StageUniforms {
    pub projection: Mat4,
    /// rgb: mask color, a: per-channel tolerance, all in 0..=1.
    pub color_mask: [f32; 4],
    pub fudge: f32,
    pub _pad: [f32; 3],
}

impl StageUniforms {
    pub fn new(projection: Mat4, color_mask: [f32; 4], fudge: f32) -> Self {
        Self {
            projection,
            color_mask,
            fudge,
            _pad: [0.0; 3],
        }
    }
}

/// Where `draw` renders to.
enum Canvas<'w> {
    Surface {
        surface: wgpu::Surface<'w>,
        config: wgpu::SurfaceConfiguration,
        depth_stencil: wgpu::TextureView,
    },
    Offscreen(Framebuffer),
}

impl Canvas<'_> {
    fn format(&self) -> wgpu::TextureFormat {
        match self {
            Canvas::Surface { config, .. } => config.format,
            Canvas::Offscreen(fb) => fb.format(),
        }
    }
}

/// A drawable resolved to the pipeline it will be drawn with.
struct DrawItem {
    id: DrawableId,
    pipeline: Rc<wgpu::RenderPipeline>,
}

pub struct Renderer<'w> {
    gpu: GpuContext,
    canvas: Canvas<'w>,
    canvas_size: [u32; 2],
    device_pixel_ratio: [f32; 2],
    config: RendererConfig,
    shaders: ShaderManager,
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    stage_buffer: wgpu::Buffer,
    stage_bind_group: wgpu::BindGroup,
    sampler: wgpu::Sampler,
    drawables: HashMap<DrawableId, Drawable>,
    draw_order: Vec<DrawableId>,
    next_id: u32,
    query_framebuffer: Framebuffer,
    pick_framebuffer: Framebuffer,
    loader: Box<dyn SkinLoader>,
    skin_tx: mpsc::Sender<SkinLoadResult>,
    skin_rx: mpsc::Receiver<SkinLoadResult>,
}

impl Renderer<'static> {
    /// An offscreen renderer on a freshly acquired device.
    pub fn headless(config: RendererConfig) -> Result<Self, RenderError> {
        let gpu = GpuContext::headless(&GpuOptions::default())?;
        Self::offscreen(gpu, config)
    }

    /// An offscreen renderer whose canvas is `config.native_size`.
    pub fn offscreen(gpu: GpuContext, config: RendererConfig) -> Result<Self, RenderError> {
        config.validate()?;
        let [width, height] = config.native_size;
        let canvas = Canvas::Offscreen(Framebuffer::new(&gpu.device, "Canvas Texture", width, height));
        Ok(Self::build(gpu, canvas, [width, height], [1.0, 1.0], config))
    }
}

impl<'w> Renderer<'w> {
    /// A renderer presenting to `surface`, which must belong to `gpu.instance`.
    pub fn with_surface(
        gpu: GpuContext,
        surface: wgpu::Surface<'w>,
        size: PhysicalSize<u32>,
        scale_factor: f64,
        config: RendererConfig,
    ) -> Result<Self, RenderError> {
        config.validate()?;
        let caps = surface.get_capabilities(&gpu.adapter);
        let format = choose_surface_format(&caps)
            .ok_or_else(|| RenderError::Gpu("surface reports no formats".to_string()))?;
        let surface_config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode: caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&gpu.device, &surface_config);
        let depth_stencil =
            create_depth_stencil(&gpu.device, surface_config.width, surface_config.height);
        let canvas_size = [surface_config.width, surface_config.height];
        let canvas = Canvas::Surface {
            surface,
            config: surface_config,
            depth_stencil,
        };
        let ratio = scale_factor as f32;
        Ok(Self::build(gpu, canvas, canvas_size, [ratio, ratio], config))
    }

    fn build(
        gpu: GpuContext,
        canvas: Canvas<'w>,
        canvas_size: [u32; 2],
        device_pixel_ratio: [f32; 2],
        config: RendererConfig,
    ) -> Self {
        let device = &gpu.device;
        let shaders = ShaderManager::new(device);

        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Quad Vertex Buffer"),
            contents: bytemuck::cast_slice(&QUAD_VERTICES),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Quad Index Buffer"),
            contents: bytemuck::cast_slice(&QUAD_INDICES),
            usage: wgpu::BufferUsages::INDEX,
        });

        let stage_uniforms = StageUniforms::new(
            query::stage_projection(&config.stage),
            [0.0; 4],
            config.fudge,
        );
        let stage_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Stage Uniform Buffer"),
            contents: bytemuck::bytes_of(&stage_uniforms),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let stage_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &shaders.layouts().stage,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: stage_buffer.as_entire_binding(),
            }],
            label: Some("stage_bind_group"),
        });

        let sampler = create_skin_sampler(device);
        let [native_width, native_height] = config.native_size;
        let query_framebuffer = Framebuffer::new(device, "Query Framebuffer", native_width, native_height);
        let [touch_width, touch_height] = config.max_touch_size;
        let pick_framebuffer = Framebuffer::new(device, "Pick Framebuffer", touch_width, touch_height);
        let (skin_tx, skin_rx) = mpsc::channel();

        Self {
            gpu,
            canvas,
            canvas_size,
            device_pixel_ratio,
            config,
            shaders,
            vertex_buffer,
            index_buffer,
            stage_buffer,
            stage_bind_group,
            sampler,
            drawables: HashMap::new(),
            draw_order: Vec::new(),
            next_id: 0,
            query_framebuffer,
            pick_framebuffer,
            loader: Box::new(FileSkinLoader::new(".")),
            skin_tx,
            skin_rx,
        }
    }

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    pub fn gpu(&self) -> &GpuContext {
        &self.gpu
    }

    pub fn canvas_size(&self) -> [u32; 2] {
        self.canvas_size
    }

    pub fn device_pixel_ratio(&self) -> [f32; 2] {
        self.device_pixel_ratio
    }

    pub fn shader_manager(&self) -> &ShaderManager {
        &self.shaders
    }

    pub fn drawable(&self, id: DrawableId) -> Option<&Drawable> {
        self.drawables.get(&id)
    }

    /// Live drawables, back to front.
    pub fn draw_order(&self) -> &[DrawableId] {
        &self.draw_order
    }

    pub fn set_skin_loader(&mut self, loader: Box<dyn SkinLoader>) {
        self.loader = loader;
    }

    /// Resizes the canvas. `scale_factor` is device pixels per client pixel.
    pub fn set_canvas_size(&mut self, size: PhysicalSize<u32>, scale_factor: f64) {
        self.device_pixel_ratio = [scale_factor as f32; 2];
        if size.width == 0 || size.height == 0 {
            return;
        }
        self.canvas_size = [size.width, size.height];
        let device = &self.gpu.device;
        match &mut self.canvas {
            Canvas::Surface {
                surface,
                config,
                depth_stencil,
            } => {
                config.width = size.width;
                config.height = size.height;
                surface.configure(device, config);
                *depth_stencil = create_depth_stencil(device, size.width, size.height);
            }
            Canvas::Offscreen(fb) => {
                *fb = Framebuffer::new(device, "Canvas Texture", size.width, size.height);
            }
        }
    }

    pub fn create_drawable(&mut self) -> Result<DrawableId, RenderError> {
        let id = DrawableId::new(self.next_id).ok_or(RenderError::IdSpaceExhausted)?;
        self.next_id += 1;
        let placeholder =
            self.upload_skin(&DecodedImage::transparent_placeholder(), VECTOR_RESOLUTION)?;
        let drawable = Drawable::new(id, &self.gpu.device, &self.shaders.layouts().sprite, placeholder);
        self.drawables.insert(id, drawable);
        self.draw_order.push(id);
        log::debug!("created drawable {id}");
        Ok(id)
    }

    /// Removes a drawable and frees its GPU resources. `false` if `id` is unknown.
    pub fn destroy_drawable(&mut self, id: DrawableId) -> bool {
        let Some(drawable) = self.drawables.remove(&id) else {
            return false;
        };
        self.draw_order.retain(|other| *other != id);
        drawable.dispose();
        true
    }

    /// Applies a partial update. The skin is resolved first, so an invalid
    /// skin leaves the drawable untouched.
    pub fn update_drawable_properties(
        &mut self,
        id: DrawableId,
        props: DrawableProperties,
    ) -> Result<(), RenderError> {
        if !self.drawables.contains_key(&id) {
            return Err(RenderError::UnknownDrawable(id));
        }

        let mut load = None;
        let mut texture = None;
        match &props.skin {
            None => {}
            Some(SkinSource::Empty) => {
                texture = Some(
                    self.upload_skin(&DecodedImage::transparent_placeholder(), VECTOR_RESOLUTION)?,
                );
            }
            Some(SkinSource::Pixels(image)) => {
                texture = Some(self.upload_skin(image, BITMAP_RESOLUTION)?);
            }
            Some(SkinSource::Svg(markup)) => {
                let image = DecodedImage::from_svg(markup.as_bytes())?;
                texture = Some(self.upload_skin(&image, VECTOR_RESOLUTION)?);
            }
            Some(SkinSource::Asset { location, encoding }) => {
                load = Some(SkinRequest {
                    location: location.clone(),
                    encoding: *encoding,
                });
            }
        }

        let drawable = self
            .drawables
            .get_mut(&id)
            .ok_or(RenderError::UnknownDrawable(id))?;
        if let Some(texture) = texture {
            drawable.install_skin(texture);
        }
        drawable.apply_properties(&props);

        if let Some(request) = load {
            let token = drawable.begin_skin_load();
            let completion = SkinCompletion::new(id, token, &request, self.skin_tx.clone());
            self.loader.load(request, completion);
            self.poll_skin_loads();
        }
        Ok(())
    }

    /// Applies finished skin loads. Returns how many were promoted.
    pub fn poll_skin_loads(&mut self) -> usize {
        let mut promoted = 0;
        while let Ok(done) = self.skin_rx.try_recv() {
            let current = self
                .drawables
                .get(&done.drawable)
                .is_some_and(|d| d.is_current_load(done.token));
            if !current {
                log::debug!(
                    "dropping stale skin load '{}' for drawable {}",
                    done.location,
                    done.drawable
                );
                continue;
            }

            let uploaded = done
                .result
                .and_then(|image| self.upload_skin(&image, done.encoding.resolution()));
            match uploaded {
                Ok(texture) => {
                    if let Some(drawable) = self.drawables.get_mut(&done.drawable) {
                        if drawable.complete_skin_load(done.token, texture) {
                            promoted += 1;
                        }
                    }
                }
                Err(err) => {
                    log::warn!(
                        "skin '{}' for drawable {} failed, keeping previous skin: {err}",
                        done.location,
                        done.drawable
                    );
                    if let Some(drawable) = self.drawables.get_mut(&done.drawable) {
                        drawable.fail_skin_load(done.token);
                    }
                }
            }
        }
        promoted
    }

    fn upload_skin(&self, image: &DecodedImage, resolution: f32) -> Result<SkinTexture, SkinError> {
        let uploader = SkinUploader {
            device: &self.gpu.device,
            queue: &self.gpu.queue,
            layout: &self.shaders.layouts().skin,
            sampler: &self.sampler,
        };
        SkinTexture::upload(&uploader, image, resolution)
    }

    fn write_stage_uniforms(&self, projection: Mat4, color_mask: [f32; 4]) {
        let uniforms = StageUniforms::new(projection, color_mask, self.config.fudge);
        self.gpu
            .queue
            .write_buffer(&self.stage_buffer, 0, bytemuck::bytes_of(&uniforms));
    }

    /// Resolves shaders and pipelines for `ids` and uploads their uniforms.
    fn prepare_draws(
        &mut self,
        ids: &[DrawableId],
        mode: DrawMode,
        variant: PipelineVariant,
    ) -> Result<Vec<DrawItem>, RenderError> {
        let mut items = Vec::with_capacity(ids.len());
        for id in ids {
            let Some(drawable) = self.drawables.get_mut(id) else {
                continue;
            };
            if !drawable.is_visible() {
                continue;
            }
            let program = self
                .shaders
                .get_shader(&self.gpu.device, mode, drawable.enabled_effects())?;
            let pipeline = self.shaders.pipeline(&self.gpu.device, &program, variant)?;
            drawable.write_uniforms(&self.gpu.queue);
            items.push(DrawItem { id: *id, pipeline });
        }
        Ok(items)
    }

    /// Records `items`, switching pipeline (and rebinding stage uniforms) only on change.
    fn record_draws(&self, pass: &mut wgpu::RenderPass<'_>, items: &[DrawItem]) {
        let mut current: Option<&Rc<wgpu::RenderPipeline>> = None;
        for item in items {
            let Some(drawable) = self.drawables.get(&item.id) else {
                continue;
            };
            let Some(skin) = drawable.skin() else {
                continue;
            };
            if !current.is_some_and(|p| Rc::ptr_eq(p, &item.pipeline)) {
                pass.set_pipeline(&item.pipeline);
                pass.set_bind_group(2, &self.stage_bind_group, &[]);
                current = Some(&item.pipeline);
            }
            pass.set_bind_group(0, skin.bind_group(), &[]);
            pass.set_bind_group(1, drawable.uniform_bind_group(), &[]);
            pass.set_vertex_buffer(0, self.vertex_buffer.slice(..));
            pass.set_index_buffer(self.index_buffer.slice(..), wgpu::IndexFormat::Uint16);
            pass.draw_indexed(0..QUAD_INDICES.len() as u32, 0, 0..1);
        }
    }

    /// Renders every visible drawable to the canvas.
    pub fn draw(&mut self) -> Result<(), RenderError> {
        self.poll_skin_loads();
        self.write_stage_uniforms(query::stage_projection(&self.config.stage), [0.0; 4]);
        let order = self.draw_order.clone();
        let variant = PipelineVariant::new(self.canvas.format(), StencilMode::Off);
        let items = self.prepare_draws(&order, DrawMode::Default, variant)?;

        let mut frame = None;
        let surface_view;
        let (view, depth_stencil) = match &self.canvas {
            Canvas::Surface {
                surface,
                depth_stencil,
                ..
            } => {
                let texture = surface.get_current_texture()?;
                surface_view = texture
                    .texture
                    .create_view(&wgpu::TextureViewDescriptor::default());
                frame = Some(texture);
                (&surface_view, depth_stencil)
            }
            Canvas::Offscreen(fb) => (fb.color_view(), fb.depth_stencil_view()),
        };

        let mut encoder = self
            .gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Draw Encoder"),
            });
        {
            let mut pass = begin_pass(
                &mut encoder,
                "Draw Pass",
                view,
                depth_stencil,
                self.config.clear_color(),
            );
            let [width, height] = self.canvas_size;
            pass.set_viewport(0.0, 0.0, width as f32, height as f32, 0.0, 1.0);
            self.record_draws(&mut pass, &items);
        }
        self.gpu.queue.submit(Some(encoder.finish()));
        if let Some(frame) = frame {
            frame.present();
        }
        Ok(())
    }

    /// Returns the drawable covering the most pixels of the touch footprint
    /// centered on client point `(x, y)`.
    ///
    /// `candidates` restricts the search; `None` means every visible drawable.
    pub fn pick(
        &mut self,
        x: f32,
        y: f32,
        touch_width: f32,
        touch_height: f32,
        candidates: Option<&[DrawableId]>,
    ) -> Result<Option<DrawableId>, RenderError> {
        self.poll_skin_loads();
        let region = query::pick_region(
            PickRequest {
                x,
                y,
                touch_width,
                touch_height,
            },
            self.device_pixel_ratio,
            self.canvas_size,
            self.config.max_touch_size,
            &self.config.stage,
        );

        let ids: Vec<DrawableId> = match candidates {
            None => self.draw_order.clone(),
            Some(candidates) => {
                for id in candidates {
                    if !self.drawables.contains_key(id) {
                        log::warn!("pick candidate {id} does not exist");
                    }
                }
                self.draw_order
                    .iter()
                    .copied()
                    .filter(|id| candidates.contains(id))
                    .collect()
            }
        };

        self.write_stage_uniforms(region.projection, [0.0; 4]);
        let variant = PipelineVariant::new(OFFSCREEN_FORMAT, StencilMode::Off);
        let items = self.prepare_draws(&ids, DrawMode::Silhouette, variant)?;

        let mut encoder = self
            .gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Pick Encoder"),
            });
        {
            let fb = &self.pick_framebuffer;
            let mut pass = begin_pass(
                &mut encoder,
                "Pick Pass",
                fb.color_view(),
                fb.depth_stencil_view(),
                wgpu::Color::BLACK,
            );
            pass.set_viewport(0.0, 0.0, region.width as f32, region.height as f32, 0.0, 1.0);
            self.record_draws(&mut pass, &items);
        }
        self.gpu.queue.submit(Some(encoder.finish()));

        let pixels = self.pick_framebuffer.read_pixels(
            &self.gpu.device,
            &self.gpu.queue,
            PixelRect::new(0, 0, region.width, region.height),
        )?;
        Ok(query::decode_pick_hits(&pixels))
    }

    /// Single-pixel pick at a client point.
    pub fn pick_point(&mut self, x: f32, y: f32) -> Result<Option<DrawableId>, RenderError> {
        self.pick(x, y, 1.0, 1.0, None)
    }

    /// Whether the visible pixels of `id` overlap pixels of `color` drawn by
    /// the other visible drawables.
    ///
    /// With `mask`, only the parts of `id` whose own color matches `mask`
    /// (within the mask tolerance) count.
    pub fn is_touching_color(
        &mut self,
        id: DrawableId,
        color: Rgb8,
        mask: Option<Rgb8>,
    ) -> Result<bool, RenderError> {
        self.poll_skin_loads();
        match self.drawables.get(&id) {
            None => {
                log::warn!("is_touching_color on unknown drawable {id}");
                return Ok(false);
            }
            Some(drawable) if !drawable.is_visible() => return Ok(false),
            Some(_) => {}
        }

        let color_mask = mask
            .map(|m| self.config.color_mask_uniform(m))
            .unwrap_or([0.0; 4]);
        self.write_stage_uniforms(query::stage_projection(&self.config.stage), color_mask);

        let target_mode = if mask.is_some() {
            DrawMode::ColorMask
        } else {
            DrawMode::Silhouette
        };
        let mut items = self.prepare_draws(
            &[id],
            target_mode,
            PipelineVariant::new(OFFSCREEN_FORMAT, StencilMode::Write),
        )?;
        let others: Vec<DrawableId> = self
            .draw_order
            .iter()
            .copied()
            .filter(|other| *other != id)
            .collect();
        items.extend(self.prepare_draws(
            &others,
            DrawMode::Default,
            PipelineVariant::new(OFFSCREEN_FORMAT, StencilMode::Equal),
        )?);

        let mut encoder = self
            .gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Touch Query Encoder"),
            });
        {
            let fb = &self.query_framebuffer;
            let mut pass = begin_pass(
                &mut encoder,
                "Touch Query Pass",
                fb.color_view(),
                fb.depth_stencil_view(),
                wgpu::Color::TRANSPARENT,
            );
            pass.set_viewport(0.0, 0.0, fb.width() as f32, fb.height() as f32, 0.0, 1.0);
            pass.set_stencil_reference(STENCIL_REFERENCE);
            self.record_draws(&mut pass, &items);
        }
        self.gpu.queue.submit(Some(encoder.finish()));

        let fb = &self.query_framebuffer;
        let pixels = fb.read_pixels(&self.gpu.device, &self.gpu.queue, fb.full_rect())?;
        Ok(query::find_touching_color(
            &pixels,
            color,
            self.config.touch_tolerance,
        ))
    }

    /// Reads the offscreen canvas back as an image. Surface canvases are not readable.
    pub fn read_canvas(&self) -> Result<image::RgbaImage, RenderError> {
        let Canvas::Offscreen(fb) = &self.canvas else {
            return Err(RenderError::CanvasNotReadable("canvas is a window surface"));
        };
        let pixels = fb.read_pixels(&self.gpu.device, &self.gpu.queue, fb.full_rect())?;
        image::RgbaImage::from_raw(fb.width(), fb.height(), pixels)
            .ok_or_else(|| RenderError::Readback("pixel buffer size mismatch".to_string()))
    }
}

/// Begins a pass that clears color to `clear`, depth to 1 and stencil to 0.
fn begin_pass<'e>(
    encoder: &'e mut wgpu::CommandEncoder,
    label: &str,
    color: &wgpu::TextureView,
    depth_stencil: &wgpu::TextureView,
    clear: wgpu::Color,
) -> wgpu::RenderPass<'e> {
    encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
        label: Some(label),
        color_attachments: &[Some(wgpu::RenderPassColorAttachment {
            view: color,
            resolve_target: None,
            ops: wgpu::Operations {
                load: wgpu::LoadOp::Clear(clear),
                store: wgpu::StoreOp::Store,
            },
        })],
        depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
            view: depth_stencil,
            depth_ops: Some(wgpu::Operations {
                load: wgpu::LoadOp::Clear(1.0),
                store: wgpu::StoreOp::Store,
            }),
            stencil_ops: Some(wgpu::Operations {
                load: wgpu::LoadOp::Clear(0),
                store: wgpu::StoreOp::Store,
            }),
        }),
        timestamp_writes: None,
        occlusion_query_set: None,
    })
}
