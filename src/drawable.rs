//! One sprite on the stage: placement, effects, skin and the uniforms the
//! shaders read.

use std::fmt;

use wgpu::util::DeviceExt;

use crate::effects::{Effect, EffectMask, EffectState};
use crate::matrix::{self, Mat4};
use crate::skin::{Promotion, SkinSlot, SkinSource, SkinTexture, SkinToken};

/// Reserved ID meaning "no drawable". Encodes to opaque black.
pub const NONE_ID: i32 = -1;

/// Renderer-assigned drawable handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DrawableId(u32);

impl DrawableId {
    /// Largest ID that still fits the 24-bit color encoding.
    pub const MAX: u32 = 0x00FF_FFFE;

    pub fn new(raw: u32) -> Option<Self> {
        (raw <= Self::MAX).then_some(DrawableId(raw))
    }

    pub fn get(self) -> u32 {
        self.0
    }

    pub fn to_color4f(self) -> [f32; 4] {
        color4f_from_id(self.0 as i32)
    }

    /// Decodes a pick color; `None` for the NONE color and out-of-range values.
    pub fn from_color(r: u8, g: u8, b: u8) -> Option<Self> {
        let id = color4b_to_id(r, g, b);
        if id < 0 {
            return None;
        }
        DrawableId::new(id as u32)
    }
}

impl fmt::Display for DrawableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Packs `id - NONE_ID` into 24 bits of RGB: r low byte, g middle, b high.
pub fn color4b_from_id(id: i32) -> [u8; 4] {
    let packed = (id - NONE_ID) as u32;
    [
        (packed & 0xff) as u8,
        ((packed >> 8) & 0xff) as u8,
        ((packed >> 16) & 0xff) as u8,
        0xff,
    ]
}

pub fn color4f_from_id(id: i32) -> [f32; 4] {
    let [r, g, b, _] = color4b_from_id(id);
    [r as f32 / 255.0, g as f32 / 255.0, b as f32 / 255.0, 1.0]
}

pub fn color4b_to_id(r: u8, g: u8, b: u8) -> i32 {
    let packed = r as i32 | (g as i32) << 8 | (b as i32) << 16;
    packed + NONE_ID
}

/// Placement of a drawable and its lazily derived model matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct Transform {
    position: [f32; 2],
    direction: f32,
    scale: [f32; 2],
    skin_size: [f32; 2],
    matrix: Mat4,
    dirty: bool,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: [0.0, 0.0],
            direction: 90.0,
            scale: [100.0, 100.0],
            skin_size: [0.0, 0.0],
            matrix: matrix::IDENTITY,
            dirty: true,
        }
    }
}

impl Transform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn position(&self) -> [f32; 2] {
        self.position
    }

    pub fn direction(&self) -> f32 {
        self.direction
    }

    pub fn scale(&self) -> [f32; 2] {
        self.scale
    }

    pub fn skin_size(&self) -> [f32; 2] {
        self.skin_size
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn set_position(&mut self, position: [f32; 2]) {
        if self.position != position {
            self.position = position;
            self.dirty = true;
        }
    }

    pub fn set_direction(&mut self, direction: f32) {
        if self.direction != direction {
            self.direction = direction;
            self.dirty = true;
        }
    }

    pub fn set_scale(&mut self, scale: [f32; 2]) {
        if self.scale != scale {
            self.scale = scale;
            self.dirty = true;
        }
    }

    pub fn set_skin_size(&mut self, skin_size: [f32; 2]) {
        self.skin_size = skin_size;
        self.dirty = true;
    }

    /// `translate(position) * rotate_z((270 - direction) deg) * scale(skin_size * scale / 100)`
    pub fn model_matrix(&mut self) -> Mat4 {
        if self.dirty {
            let rotation = (270.0 - self.direction).to_radians();
            let scaled = [
                self.skin_size[0] * self.scale[0] / 100.0,
                self.skin_size[1] * self.scale[1] / 100.0,
                1.0,
            ];
            let m = matrix::translate(&matrix::IDENTITY, [self.position[0], self.position[1], 0.0]);
            let m = matrix::rotate_z(&m, rotation);
            self.matrix = matrix::scale(&m, scaled);
            self.dirty = false;
        }
        self.matrix
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct SpriteUniforms {
    pub model: Mat4,
    pub silhouette_color: [f32; 4],
    pub skin_size: [f32; 2],
    pub color: f32,
    pub fisheye: f32,
    pub whirl: f32,
    pub pixelate: f32,
    pub mosaic: f32,
    pub brightness: f32,
    pub ghost: f32,
    pub _pad: [f32; 3],
}

impl SpriteUniforms {
    pub fn new(model: Mat4, silhouette_color: [f32; 4], skin_size: [f32; 2], effects: &EffectState) -> Self {
        Self {
            model,
            silhouette_color,
            skin_size,
            color: effects.value(Effect::Color),
            fisheye: effects.value(Effect::Fisheye),
            whirl: effects.value(Effect::Whirl),
            pixelate: effects.value(Effect::Pixelate),
            mosaic: effects.value(Effect::Mosaic),
            brightness: effects.value(Effect::Brightness),
            ghost: effects.value(Effect::Ghost),
            _pad: [0.0; 3],
        }
    }
}

/// Partial property update. `None` fields are left alone.
#[derive(Debug, Clone, Default)]
pub struct DrawableProperties {
    pub skin: Option<SkinSource>,
    pub position: Option<[f32; 2]>,
    pub direction: Option<f32>,
    pub scale: Option<[f32; 2]>,
    pub visible: Option<bool>,
    pub effects: Vec<(Effect, f32)>,
}

impl DrawableProperties {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_skin(mut self, skin: SkinSource) -> Self {
        self.skin = Some(skin);
        self
    }

    pub fn with_position(mut self, x: f32, y: f32) -> Self {
        self.position = Some([x, y]);
        self
    }

    pub fn with_direction(mut self, direction: f32) -> Self {
        self.direction = Some(direction);
        self
    }

    pub fn with_scale(mut self, x: f32, y: f32) -> Self {
        self.scale = Some([x, y]);
        self
    }

    pub fn with_visible(mut self, visible: bool) -> Self {
        self.visible = Some(visible);
        self
    }

    pub fn with_effect(mut self, effect: Effect, raw: f32) -> Self {
        self.effects.push((effect, raw));
        self
    }
}

/// A sprite owned by the renderer.
#[derive(Debug)]
pub struct Drawable {
    id: DrawableId,
    transform: Transform,
    effects: EffectState,
    visible: bool,
    skin: SkinSlot<SkinTexture>,
    uniform_buffer: wgpu::Buffer,
    uniform_bind_group: wgpu::BindGroup,
}

impl Drawable {
    pub fn new(
        id: DrawableId,
        device: &wgpu::Device,
        sprite_layout: &wgpu::BindGroupLayout,
        placeholder: SkinTexture,
    ) -> Self {
        let mut transform = Transform::new();
        transform.set_skin_size(placeholder.nominal_size());
        let effects = EffectState::new();
        let uniforms = SpriteUniforms::new(
            transform.model_matrix(),
            id.to_color4f(),
            transform.skin_size(),
            &effects,
        );

        let uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Sprite Uniform Buffer"),
            contents: bytemuck::bytes_of(&uniforms),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let uniform_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: sprite_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
            label: Some("sprite_bind_group"),
        });

        let mut skin = SkinSlot::new();
        skin.install(placeholder);

        Self {
            id,
            transform,
            effects,
            visible: true,
            skin,
            uniform_buffer,
            uniform_bind_group,
        }
    }

    pub fn id(&self) -> DrawableId {
        self.id
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn transform(&self) -> &Transform {
        &self.transform
    }

    pub fn effects(&self) -> &EffectState {
        &self.effects
    }

    pub fn enabled_effects(&self) -> EffectMask {
        self.effects.mask()
    }

    /// Applies everything except the skin, which the renderer resolves first.
    pub fn apply_properties(&mut self, props: &DrawableProperties) {
        if let Some(position) = props.position {
            self.transform.set_position(position);
        }
        if let Some(direction) = props.direction {
            self.transform.set_direction(direction);
        }
        if let Some(scale) = props.scale {
            self.transform.set_scale(scale);
        }
        if let Some(visible) = props.visible {
            self.visible = visible;
        }
        for &(effect, raw) in &props.effects {
            self.effects.set(effect, raw);
        }
    }

    pub fn skin(&self) -> Option<&SkinTexture> {
        self.skin.active()
    }

    pub fn pending_skin(&self) -> Option<SkinToken> {
        self.skin.pending()
    }

    /// Installs a skin right away; any pending load is cancelled.
    pub fn install_skin(&mut self, texture: SkinTexture) {
        self.transform.set_skin_size(texture.nominal_size());
        self.skin.install(texture);
    }

    pub fn begin_skin_load(&mut self) -> SkinToken {
        self.skin.begin_load()
    }

    /// Promotes a finished load if `token` is still current.
    pub fn complete_skin_load(&mut self, token: SkinToken, texture: SkinTexture) -> bool {
        let size = texture.nominal_size();
        match self.skin.complete(token, texture) {
            Promotion::Promoted { .. } => {
                self.transform.set_skin_size(size);
                true
            }
            Promotion::Stale(_) => false,
        }
    }

    pub fn fail_skin_load(&mut self, token: SkinToken) -> bool {
        self.skin.fail(token)
    }

    pub fn is_current_load(&self, token: SkinToken) -> bool {
        self.skin.is_current(token)
    }

    pub fn uniforms(&mut self) -> SpriteUniforms {
        SpriteUniforms::new(
            self.transform.model_matrix(),
            self.id.to_color4f(),
            self.transform.skin_size(),
            &self.effects,
        )
    }

    pub fn write_uniforms(&mut self, queue: &wgpu::Queue) {
        let uniforms = self.uniforms();
        queue.write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(&uniforms));
    }

    pub fn uniform_bind_group(&self) -> &wgpu::BindGroup {
        &self.uniform_bind_group
    }

    /// Releases the skin texture and uniform buffer.
    pub fn dispose(mut self) {
        drop(self.skin.clear());
        self.uniform_buffer.destroy();
    }
}
