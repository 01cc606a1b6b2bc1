//! Graphic effects a drawable can carry.
//!
//! Each effect owns one bit of the drawable's enabled-effects mask and one
//! shader uniform. The bit follows the raw value (`raw != 0`); the uniform is
//! the raw value run through the effect's converter.

use std::f32::consts::PI;
use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Effect {
    Color,
    Fisheye,
    Whirl,
    Pixelate,
    Mosaic,
    Brightness,
    Ghost,
}

impl Effect {
    /// Every effect, in bit order.
    pub const ALL: [Effect; 7] = [
        Effect::Color,
        Effect::Fisheye,
        Effect::Whirl,
        Effect::Pixelate,
        Effect::Mosaic,
        Effect::Brightness,
        Effect::Ghost,
    ];

    pub const fn mask(self) -> u32 {
        1 << (self as u32)
    }

    pub const fn index(self) -> usize {
        self as usize
    }

    pub const fn name(self) -> &'static str {
        match self {
            Effect::Color => "color",
            Effect::Fisheye => "fisheye",
            Effect::Whirl => "whirl",
            Effect::Pixelate => "pixelate",
            Effect::Mosaic => "mosaic",
            Effect::Brightness => "brightness",
            Effect::Ghost => "ghost",
        }
    }

    pub fn from_name(name: &str) -> Option<Effect> {
        Effect::ALL.into_iter().find(|e| e.name() == name)
    }

    /// Maps a raw effect value to the value the shader consumes.
    pub fn convert(self, raw: f32) -> f32 {
        match self {
            // Truncated remainder: negative input keeps its sign and the
            // shader wraps the hue.
            Effect::Color => (raw / 200.0) % 1.0,
            Effect::Fisheye => ((raw + 100.0) / 100.0).max(0.0),
            Effect::Whirl => raw * PI / 180.0,
            Effect::Pixelate => raw.abs() / 10.0,
            Effect::Mosaic => ((raw.abs() + 10.0) / 10.0).round().clamp(1.0, 512.0),
            Effect::Brightness => raw.clamp(-100.0, 100.0) / 100.0,
            Effect::Ghost => 1.0 - raw.clamp(0.0, 100.0) / 100.0,
        }
    }
}

impl fmt::Display for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Bitmask of enabled effects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct EffectMask(u32);

impl EffectMask {
    pub const NONE: EffectMask = EffectMask(0);
    pub const ALL: EffectMask = EffectMask((1 << Effect::ALL.len()) - 1);

    pub const fn from_bits(bits: u32) -> Self {
        EffectMask(bits & Self::ALL.0)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn contains(self, effect: Effect) -> bool {
        self.0 & effect.mask() != 0
    }

    pub fn set(&mut self, effect: Effect, enabled: bool) {
        if enabled {
            self.0 |= effect.mask();
        } else {
            self.0 &= !effect.mask();
        }
    }

    pub const fn with(self, effect: Effect) -> Self {
        EffectMask(self.0 | effect.mask())
    }

    pub const fn without(self, effect: Effect) -> Self {
        EffectMask(self.0 & !effect.mask())
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Enabled effects in bit order.
    pub fn iter(self) -> impl Iterator<Item = Effect> {
        Effect::ALL.into_iter().filter(move |e| self.contains(*e))
    }
}

impl FromIterator<Effect> for EffectMask {
    fn from_iter<I: IntoIterator<Item = Effect>>(iter: I) -> Self {
        iter.into_iter().fold(EffectMask::NONE, EffectMask::with)
    }
}

/// Enabled mask plus the converted uniform value of every effect.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EffectState {
    mask: EffectMask,
    values: [f32; 7],
}

impl Default for EffectState {
    fn default() -> Self {
        Self {
            mask: EffectMask::NONE,
            values: Effect::ALL.map(|e| e.convert(0.0)),
        }
    }
}

impl EffectState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, effect: Effect, raw: f32) {
        self.mask.set(effect, raw != 0.0);
        self.values[effect.index()] = effect.convert(raw);
    }

    pub fn mask(&self) -> EffectMask {
        self.mask
    }

    pub fn value(&self, effect: Effect) -> f32 {
        self.values[effect.index()]
    }
}
