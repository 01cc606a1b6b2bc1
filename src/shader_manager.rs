//! Shader permutations keyed by draw mode and enabled effects.
//!
//! Each `(DrawMode, effect bits)` pair compiles to one `ShaderProgram`, built
//! from the WGSL templates with a `#define` preamble. Programs build their
//! render pipelines lazily per color format and stencil mode.

use std::cell::RefCell;
use std::collections::HashMap;
use std::hash::Hash;
use std::rc::Rc;

use crate::drawable::SpriteUniforms;
use crate::effects::{Effect, EffectMask};
use crate::error::ShaderError;
use crate::framebuffer::DEPTH_STENCIL_FORMAT;
use crate::preprocess::{numbered_source, preprocess};
use crate::renderer::StageUniforms;
use crate::utils::Vertex;

const VERTEX_TEMPLATE: &str = include_str!("../shaders/sprite_vertex.wgsl");
const FRAGMENT_TEMPLATE: &str = include_str!("../shaders/sprite_fragment.wgsl");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DrawMode {
    /// Normal rendering.
    Default,
    /// Flat `silhouette_color` wherever the skin is not transparent.
    Silhouette,
    /// Keeps only fragments whose color matches the stage color mask.
    ColorMask,
}

impl DrawMode {
    pub fn define(self) -> &'static str {
        match self {
            DrawMode::Default => "DRAW_MODE_default",
            DrawMode::Silhouette => "DRAW_MODE_silhouette",
            DrawMode::ColorMask => "DRAW_MODE_colorMask",
        }
    }
}

/// Effects that only change color; meaningless in silhouette mode.
const SILHOUETTE_IGNORED: EffectMask = EffectMask::NONE
    .with(Effect::Color)
    .with(Effect::Brightness);

/// Cache key of one shader permutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShaderKey {
    mode: DrawMode,
    effects: EffectMask,
}

impl ShaderKey {
    pub fn new(mode: DrawMode, effects: EffectMask) -> Self {
        let effects = match mode {
            DrawMode::Silhouette => EffectMask::from_bits(effects.bits() & !SILHOUETTE_IGNORED.bits()),
            _ => effects,
        };
        Self { mode, effects }
    }

    pub fn mode(&self) -> DrawMode {
        self.mode
    }

    pub fn effects(&self) -> EffectMask {
        self.effects
    }
}

/// Full WGSL source of a permutation, before preprocessing.
pub fn shader_source(key: ShaderKey) -> String {
    let mut source = String::new();
    for effect in key.effects.iter() {
        source.push_str("#define ENABLE_");
        source.push_str(effect.name());
        source.push('\n');
    }
    source.push_str("#define ");
    source.push_str(key.mode.define());
    source.push('\n');
    source.push_str(VERTEX_TEMPLATE);
    source.push('\n');
    source.push_str(FRAGMENT_TEMPLATE);
    source
}

/// Insert-once cache of shared values. Failed builds are not stored.
#[derive(Debug)]
pub struct ProgramCache<K, P> {
    entries: HashMap<K, Rc<P>>,
}

impl<K, P> Default for ProgramCache<K, P> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

impl<K: Eq + Hash + Copy, P> ProgramCache<K, P> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &K) -> Option<Rc<P>> {
        self.entries.get(key).cloned()
    }

    pub fn get_or_try_insert_with<E>(
        &mut self,
        key: K,
        build: impl FnOnce() -> Result<P, E>,
    ) -> Result<Rc<P>, E> {
        if let Some(hit) = self.entries.get(&key) {
            return Ok(Rc::clone(hit));
        }
        let value = Rc::new(build()?);
        self.entries.insert(key, Rc::clone(&value));
        Ok(value)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// How a draw interacts with the stencil buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StencilMode {
    /// Stencil ignored.
    Off,
    /// Writes the reference value wherever a fragment survives; no color output.
    Write,
    /// Draws only where the stencil equals the reference value.
    Equal,
}

impl StencilMode {
    fn depth_stencil_state(self) -> wgpu::DepthStencilState {
        let face = match self {
            StencilMode::Off => wgpu::StencilFaceState::IGNORE,
            StencilMode::Write => wgpu::StencilFaceState {
                compare: wgpu::CompareFunction::Always,
                fail_op: wgpu::StencilOperation::Keep,
                depth_fail_op: wgpu::StencilOperation::Keep,
                pass_op: wgpu::StencilOperation::Replace,
            },
            StencilMode::Equal => wgpu::StencilFaceState {
                compare: wgpu::CompareFunction::Equal,
                fail_op: wgpu::StencilOperation::Keep,
                depth_fail_op: wgpu::StencilOperation::Keep,
                pass_op: wgpu::StencilOperation::Keep,
            },
        };
        let (read_mask, write_mask) = match self {
            StencilMode::Off => (0, 0),
            StencilMode::Write => (0xff, 0xff),
            StencilMode::Equal => (0xff, 0),
        };
        wgpu::DepthStencilState {
            format: DEPTH_STENCIL_FORMAT,
            depth_write_enabled: false,
            depth_compare: wgpu::CompareFunction::Always,
            stencil: wgpu::StencilState {
                front: face,
                back: face,
                read_mask,
                write_mask,
            },
            bias: wgpu::DepthBiasState::default(),
        }
    }

    fn color_writes(self) -> wgpu::ColorWrites {
        match self {
            StencilMode::Write => wgpu::ColorWrites::empty(),
            _ => wgpu::ColorWrites::ALL,
        }
    }
}

/// Stencil reference used by `Write` and `Equal` draws.
pub const STENCIL_REFERENCE: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PipelineVariant {
    pub color_format: wgpu::TextureFormat,
    pub stencil: StencilMode,
}

impl PipelineVariant {
    pub fn new(color_format: wgpu::TextureFormat, stencil: StencilMode) -> Self {
        Self {
            color_format,
            stencil,
        }
    }
}

/// Bind group layouts shared by every permutation.
#[derive(Debug)]
pub struct SpriteLayouts {
    pub skin: wgpu::BindGroupLayout,
    pub sprite: wgpu::BindGroupLayout,
    pub stage: wgpu::BindGroupLayout,
    pub pipeline: wgpu::PipelineLayout,
}

impl SpriteLayouts {
    pub fn new(device: &wgpu::Device) -> Self {
        let skin = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("skin_bind_group_layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        multisampled: false,
                        view_dimension: wgpu::TextureViewDimension::D2,
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let sprite = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("sprite_bind_group_layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: wgpu::BufferSize::new(
                        std::mem::size_of::<SpriteUniforms>() as _,
                    ),
                },
                count: None,
            }],
        });

        let stage = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("stage_bind_group_layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: wgpu::BufferSize::new(
                        std::mem::size_of::<StageUniforms>() as _,
                    ),
                },
                count: None,
            }],
        });

        let pipeline = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Sprite Pipeline Layout"),
            bind_group_layouts: &[&skin, &sprite, &stage],
            push_constant_ranges: &[],
        });

        Self {
            skin,
            sprite,
            stage,
            pipeline,
        }
    }
}

/// One compiled permutation and the pipelines built from it so far.
#[derive(Debug)]
pub struct ShaderProgram {
    key: ShaderKey,
    module: wgpu::ShaderModule,
    pipelines: RefCell<HashMap<PipelineVariant, Rc<wgpu::RenderPipeline>>>,
}

impl ShaderProgram {
    pub fn key(&self) -> ShaderKey {
        self.key
    }
}

/// Premultiplied-alpha "over" blending.
fn premultiplied_blend() -> wgpu::BlendState {
    wgpu::BlendState {
        color: wgpu::BlendComponent {
            src_factor: wgpu::BlendFactor::One,
            dst_factor: wgpu::BlendFactor::OneMinusSrcAlpha,
            operation: wgpu::BlendOperation::Add,
        },
        alpha: wgpu::BlendComponent {
            src_factor: wgpu::BlendFactor::One,
            dst_factor: wgpu::BlendFactor::OneMinusSrcAlpha,
            operation: wgpu::BlendOperation::Add,
        },
    }
}

pub struct ShaderManager {
    layouts: SpriteLayouts,
    programs: ProgramCache<ShaderKey, ShaderProgram>,
}

impl ShaderManager {
    pub fn new(device: &wgpu::Device) -> Self {
        Self {
            layouts: SpriteLayouts::new(device),
            programs: ProgramCache::new(),
        }
    }

    pub fn layouts(&self) -> &SpriteLayouts {
        &self.layouts
    }

    pub fn cached_programs(&self) -> usize {
        self.programs.len()
    }

    /// Returns the program for `(mode, effects)`, compiling it on first use.
    pub fn get_shader(
        &mut self,
        device: &wgpu::Device,
        mode: DrawMode,
        effects: EffectMask,
    ) -> Result<Rc<ShaderProgram>, ShaderError> {
        let key = ShaderKey::new(mode, effects);
        self.programs
            .get_or_try_insert_with(key, || compile_program(device, key))
            .inspect_err(|e| log::error!("{e}"))
    }

    /// Returns the render pipeline of `program` for `variant`, building it on first use.
    pub fn pipeline(
        &self,
        device: &wgpu::Device,
        program: &ShaderProgram,
        variant: PipelineVariant,
    ) -> Result<Rc<wgpu::RenderPipeline>, ShaderError> {
        if let Some(hit) = program.pipelines.borrow().get(&variant) {
            return Ok(Rc::clone(hit));
        }

        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Sprite Pipeline"),
            layout: Some(&self.layouts.pipeline),
            vertex: wgpu::VertexState {
                module: &program.module,
                entry_point: Some("vs_main"),
                buffers: &[Vertex::layout()],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &program.module,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: variant.color_format,
                    blend: Some(premultiplied_blend()),
                    write_mask: variant.stencil.color_writes(),
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            primitive: wgpu::PrimitiveState::default(),
            depth_stencil: Some(variant.stencil.depth_stencil_state()),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });
        if let Some(err) = pollster::block_on(device.pop_error_scope()) {
            let err = ShaderError::Pipeline {
                key: program.key,
                message: err.to_string(),
            };
            log::error!("{err}");
            return Err(err);
        }

        let pipeline = Rc::new(pipeline);
        program
            .pipelines
            .borrow_mut()
            .insert(variant, Rc::clone(&pipeline));
        Ok(pipeline)
    }
}

fn compile_program(device: &wgpu::Device, key: ShaderKey) -> Result<ShaderProgram, ShaderError> {
    log::debug!("compiling shader permutation {key:?}");
    let raw = shader_source(key);
    let source = preprocess(&raw).map_err(|e| ShaderError::Preprocess {
        key,
        line: e.line,
        message: e.message,
    })?;

    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("Sprite Shader"),
        source: wgpu::ShaderSource::Wgsl(source.as_str().into()),
    });
    if let Some(err) = pollster::block_on(device.pop_error_scope()) {
        return Err(ShaderError::Compile {
            key,
            message: err.to_string(),
            source_listing: numbered_source(&source),
        });
    }

    Ok(ShaderProgram {
        key,
        module,
        pipelines: RefCell::new(HashMap::new()),
    })
}
