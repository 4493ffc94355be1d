//! Material definitions
//!
//! A material is a small, copyable parameter block that references
//! already-uploaded textures. Missing textures are legal: the passes bind a
//! default texture (white, black or flat normal) in their place.

use serde::{Deserialize, Serialize};

use crate::render::api::TextureHandle;
use crate::render::primitives::Color;
use crate::render::systems::state::BlendMode;

/// Pixel layout of a caller-supplied texture
///
/// Only used to decide whether sampling the texture can produce
/// translucent texels.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PixelFormat {
    Grayscale,
    GrayAlpha,
    R5G6B5,
    R8G8B8,
    R5G5B5A1,
    R4G4B4A4,
    R8G8B8A8,
    R32,
    R32G32B32,
    R32G32B32A32,
    R16,
    R16G16B16,
    R16G16B16A16,
    Dxt1Rgb,
    Dxt1Rgba,
    Dxt3Rgba,
    Dxt5Rgba,
    Etc1Rgb,
    Etc2Rgb,
    Etc2EacRgba,
    PvrtRgb,
    PvrtRgba,
    Astc4x4Rgba,
    Astc8x8Rgba,
}

impl PixelFormat {
    /// Whether the format stores an alpha channel
    pub const fn has_alpha(self) -> bool {
        matches!(
            self,
            Self::GrayAlpha
                | Self::R5G5B5A1
                | Self::R4G4B4A4
                | Self::R8G8B8A8
                | Self::R32G32B32A32
                | Self::R16G16B16A16
                | Self::Dxt1Rgba
                | Self::Dxt3Rgba
                | Self::Dxt5Rgba
                | Self::Etc2EacRgba
                | Self::PvrtRgba
                | Self::Astc4x4Rgba
                | Self::Astc8x8Rgba
        )
    }
}

/// Texture uploaded by the application
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Texture {
    /// Device handle
    pub handle: TextureHandle,
    /// Width in texels
    pub width: u32,
    /// Height in texels
    pub height: u32,
    /// Source pixel layout
    pub format: PixelFormat,
}

impl Texture {
    /// Describe an uploaded texture
    pub const fn new(handle: TextureHandle, width: u32, height: u32, format: PixelFormat) -> Self {
        Self {
            handle,
            width,
            height,
            format,
        }
    }
}

/// A texture slot with its tint and scalar factor
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MaterialMap {
    /// Optional texture, a default is bound when absent
    pub texture: Option<Texture>,
    /// Tint multiplied with the texture
    pub color: Color,
    /// Scalar factor (emission energy, normal strength)
    pub value: f32,
}

impl MaterialMap {
    /// Untextured map
    pub const fn new(color: Color, value: f32) -> Self {
        Self {
            texture: None,
            color,
            value,
        }
    }

    /// Same map with a texture
    #[must_use]
    pub fn with_texture(mut self, texture: Texture) -> Self {
        self.texture = Some(texture);
        self
    }
}

/// Packed occlusion/roughness/metalness parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrmMap {
    /// Optional ORM texture (R occlusion, G roughness, B metalness)
    pub texture: Option<Texture>,
    /// Occlusion factor
    pub occlusion: f32,
    /// Roughness factor
    pub roughness: f32,
    /// Metalness factor
    pub metalness: f32,
}

impl Default for OrmMap {
    fn default() -> Self {
        Self {
            texture: None,
            occlusion: 1.0,
            roughness: 1.0,
            metalness: 0.0,
        }
    }
}

/// Surface description for one draw call
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Material {
    /// Base color
    pub albedo: MaterialMap,
    /// Emitted light, `value` is the energy
    pub emission: MaterialMap,
    /// Tangent-space normal map, `value` scales the perturbation
    pub normal: MaterialMap,
    /// Occlusion/roughness/metalness
    pub orm: OrmMap,
    /// Blend mode for this material, `None` uses the renderer's current mode
    pub blend_mode: Option<BlendMode>,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            albedo: MaterialMap::new(Color::WHITE, 1.0),
            emission: MaterialMap::new(Color::BLACK, 0.0),
            normal: MaterialMap::new(Color::WHITE, 1.0),
            orm: OrmMap::default(),
            blend_mode: None,
        }
    }
}

impl Material {
    /// Untextured material of a single color
    pub fn colored(color: Color) -> Self {
        let mut material = Self::default();
        material.albedo.color = color;
        material
    }

    /// Set the albedo texture
    #[must_use]
    pub fn with_albedo_texture(mut self, texture: Texture) -> Self {
        self.albedo.texture = Some(texture);
        self
    }

    /// Set emission color and energy
    #[must_use]
    pub fn with_emission(mut self, color: Color, energy: f32) -> Self {
        self.emission.color = color;
        self.emission.value = energy;
        self
    }

    /// Set roughness and metalness factors
    #[must_use]
    pub fn with_surface(mut self, roughness: f32, metalness: f32) -> Self {
        self.orm.roughness = roughness;
        self.orm.metalness = metalness;
        self
    }

    /// Override the blend mode for draws using this material
    #[must_use]
    pub fn with_blend_mode(mut self, mode: BlendMode) -> Self {
        self.blend_mode = Some(mode);
        self
    }
}
