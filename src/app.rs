use std::sync::Arc;

use anyhow::Context;
use winit::{
    application::ApplicationHandler,
    event::{ElementState, MouseButton, WindowEvent},
    event_loop::{ActiveEventLoop, EventLoop},
    window::{Window, WindowId},
};

use crate::config::RendererConfig;
use crate::gpu::{GpuContext, GpuOptions};
use crate::renderer::Renderer;
use crate::utils::Position;

pub struct WindowConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "Plutonium Stage".to_string(),
            width: 480,
            height: 360,
        }
    }
}

/// Per-frame input handed to the frame callback.
pub struct FrameContext {
    /// Cursor position in client (logical) pixels.
    pub mouse_position: Option<Position>,
    /// Left button went down since the previous frame.
    pub clicked: bool,
    pub delta_time: f32,
}

type FrameCallback = Box<dyn FnMut(&mut Renderer<'static>, &FrameContext)>;

pub struct StageApp {
    window_config: WindowConfig,
    renderer_config: RendererConfig,
    renderer: Option<Renderer<'static>>,
    window: Option<Arc<Window>>,
    last_frame: std::time::Instant,
    frame_callback: FrameCallback,
    frame_context: FrameContext,
    error: Option<anyhow::Error>,
}

impl StageApp {
    pub fn new<F>(window_config: WindowConfig, renderer_config: RendererConfig, frame_callback: F) -> Self
    where
        F: FnMut(&mut Renderer<'static>, &FrameContext) + 'static,
    {
        Self {
            window_config,
            renderer_config,
            renderer: None,
            window: None,
            last_frame: std::time::Instant::now(),
            frame_callback: Box::new(frame_callback),
            frame_context: FrameContext {
                mouse_position: None,
                clicked: false,
                delta_time: 0.0,
            },
            error: None,
        }
    }

    pub fn renderer(&mut self) -> Option<&mut Renderer<'static>> {
        self.renderer.as_mut()
    }

    fn init(&mut self, event_loop: &ActiveEventLoop) -> anyhow::Result<()> {
        let window_attributes = Window::default_attributes()
            .with_title(&self.window_config.title)
            .with_inner_size(winit::dpi::LogicalSize::new(
                self.window_config.width,
                self.window_config.height,
            ));
        let window = Arc::new(
            event_loop
                .create_window(window_attributes)
                .context("failed to create window")?,
        );

        let options = GpuOptions::default();
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: options.backends,
            ..Default::default()
        });
        let surface = instance
            .create_surface(window.clone())
            .context("failed to create wgpu surface")?;
        let gpu = GpuContext::for_surface(instance, &surface, &options)?;
        let renderer = Renderer::with_surface(
            gpu,
            surface,
            window.inner_size(),
            window.scale_factor(),
            self.renderer_config.clone(),
        )?;

        self.renderer = Some(renderer);
        window.request_redraw();
        self.window = Some(window);
        Ok(())
    }
}

impl ApplicationHandler<()> for StageApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.renderer.is_some() {
            return;
        }
        if let Err(err) = self.init(event_loop) {
            log::error!("{err:#}");
            self.error = Some(err);
            event_loop.exit();
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::CursorMoved { position, .. } => {
                let scale = self.window.as_ref().map_or(1.0, |w| w.scale_factor());
                let logical = position.to_logical::<f32>(scale);
                self.frame_context.mouse_position = Some(Position::new(logical.x, logical.y));
            }
            WindowEvent::MouseInput {
                state: ElementState::Pressed,
                button: MouseButton::Left,
                ..
            } => {
                self.frame_context.clicked = true;
            }
            WindowEvent::RedrawRequested => {
                let now = std::time::Instant::now();
                self.frame_context.delta_time = (now - self.last_frame).as_secs_f32();
                self.last_frame = now;

                if let Some(renderer) = &mut self.renderer {
                    (self.frame_callback)(renderer, &self.frame_context);
                    match renderer.draw() {
                        Ok(()) => {}
                        Err(crate::RenderError::Surface(
                            wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated,
                        )) => {
                            if let Some(window) = &self.window {
                                renderer.set_canvas_size(window.inner_size(), window.scale_factor());
                            }
                        }
                        Err(err) => log::warn!("frame skipped: {err}"),
                    }
                    self.frame_context.clicked = false;
                }
                if let Some(window) = &self.window {
                    window.request_redraw();
                }
            }
            WindowEvent::Resized(new_size) => {
                if let (Some(renderer), Some(window)) = (&mut self.renderer, &self.window) {
                    renderer.set_canvas_size(new_size, window.scale_factor());
                }
            }
            WindowEvent::ScaleFactorChanged { scale_factor, .. } => {
                if let (Some(renderer), Some(window)) = (&mut self.renderer, &self.window) {
                    renderer.set_canvas_size(window.inner_size(), scale_factor);
                }
            }
            WindowEvent::CloseRequested => {
                event_loop.exit();
            }
            _ => (),
        }
    }
}

/// Opens a window and runs `frame_callback` before every draw until it closes.
pub fn run_stage<F>(
    window_config: WindowConfig,
    renderer_config: RendererConfig,
    frame_callback: F,
) -> anyhow::Result<()>
where
    F: FnMut(&mut Renderer<'static>, &FrameContext) + 'static,
{
    let event_loop = EventLoop::new()?;
    let mut app = StageApp::new(window_config, renderer_config, frame_callback);

    event_loop.run_app(&mut app)?;
    match app.error.take() {
        Some(err) => Err(err),
        None => Ok(()),
    }
}
