//! 8-bit RGBA color

use serde::{Deserialize, Serialize};

use crate::foundation::math::{Vec3, Vec4};

/// Color with 8-bit channels, the unit the public API speaks in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Color {
    /// Red
    pub r: u8,
    /// Green
    pub g: u8,
    /// Blue
    pub b: u8,
    /// Alpha
    pub a: u8,
}

impl Default for Color {
    fn default() -> Self {
        Self::WHITE
    }
}

impl Color {
    /// Opaque white
    pub const WHITE: Self = Self::new(255, 255, 255, 255);
    /// Opaque black
    pub const BLACK: Self = Self::new(0, 0, 0, 255);
    /// Transparent black
    pub const BLANK: Self = Self::new(0, 0, 0, 0);

    /// Create a color from channels
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Opaque gray of the given level
    pub const fn gray(level: u8) -> Self {
        Self::new(level, level, level, 255)
    }

    /// Channels normalized to [0, 1], alpha dropped
    pub fn to_vec3(self) -> Vec3 {
        Vec3::new(
            f32::from(self.r) / 255.0,
            f32::from(self.g) / 255.0,
            f32::from(self.b) / 255.0,
        )
    }

    /// Channels normalized to [0, 1]
    pub fn to_vec4(self) -> Vec4 {
        Vec4::new(
            f32::from(self.r) / 255.0,
            f32::from(self.g) / 255.0,
            f32::from(self.b) / 255.0,
            f32::from(self.a) / 255.0,
        )
    }

    /// Opaque color from normalized channels, clamped into range
    pub fn from_vec3(v: Vec3) -> Self {
        Self::new(unit_to_u8(v.x), unit_to_u8(v.y), unit_to_u8(v.z), 255)
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn unit_to_u8(value: f32) -> u8 {
    (value.clamp(0.0, 1.0) * 255.0).round() as u8
}
