//! Light and shadow records

use serde::{Deserialize, Serialize};

use crate::foundation::math::{Mat4, Vec3};
use crate::render::api::{FramebufferHandle, TextureHandle};

/// Light source kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LightType {
    /// Parallel rays from infinitely far away
    Directional,
    /// Cone from a point
    Spot,
    /// Point light radiating in all directions
    Omni,
}

impl LightType {
    /// Value of the `uLight.type` uniform
    pub const fn shader_index(self) -> i32 {
        match self {
            Self::Directional => 0,
            Self::Spot => 1,
            Self::Omni => 2,
        }
    }

    /// Bias used until the application sets its own
    pub const fn default_shadow_bias(self) -> f32 {
        match self {
            Self::Directional | Self::Spot => 0.0002,
            Self::Omni => 0.05,
        }
    }
}

/// Shadow refresh policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShadowUpdateMode {
    /// Refresh only on request
    Manual,
    /// Refresh once the configured period has elapsed
    Interval,
    /// Refresh every frame
    Continuous,
}

/// GPU resources of one shadow map
///
/// Directional and spot lights render into a 2D depth texture; omni lights
/// render each cube face into a depth cubemap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShadowMap {
    /// Framebuffer the depth is rendered through
    pub framebuffer: FramebufferHandle,
    /// Depth texture, a cubemap for omni lights
    pub depth: TextureHandle,
    /// Side length in texels
    pub resolution: u32,
    /// Light type the map was allocated for
    pub light_type: LightType,
}

impl ShadowMap {
    /// Size of one texel in UV units
    pub fn texel_size(&self) -> f32 {
        1.0 / self.resolution as f32
    }

    /// Whether sampling goes through a cubemap
    pub fn is_cube(&self) -> bool {
        self.light_type == LightType::Omni
    }
}

/// Refresh bookkeeping
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShadowUpdate {
    /// Policy
    pub mode: ShadowUpdateMode,
    /// Period in seconds for [`ShadowUpdateMode::Interval`]
    pub frequency: f32,
    /// Seconds accumulated since the last refresh
    pub timer: f32,
    /// Whether the map is rendered this frame
    pub should_update: bool,
}

impl Default for ShadowUpdate {
    fn default() -> Self {
        Self {
            mode: ShadowUpdateMode::Interval,
            frequency: 0.016,
            timer: 0.0,
            should_update: true,
        }
    }
}

impl ShadowUpdate {
    /// Advance the policy by `dt` seconds and decide whether to refresh
    pub fn process(&mut self, dt: f32) {
        match self.mode {
            ShadowUpdateMode::Manual => {}
            ShadowUpdateMode::Interval => {
                self.timer += dt;
                if self.timer >= self.frequency {
                    self.timer = 0.0;
                    self.should_update = true;
                }
            }
            ShadowUpdateMode::Continuous => self.should_update = true,
        }
    }
}

/// Shadow sub-record owned by a light
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Shadow {
    /// Whether the light casts shadows
    pub enabled: bool,
    /// Allocated map, if any
    pub map: Option<ShadowMap>,
    /// Refresh policy and state
    pub update: ShadowUpdate,
    /// Depth comparison bias
    pub bias: f32,
    /// Light view-projection used when the map was last rendered
    pub view_proj: Mat4,
}

impl Shadow {
    fn new(light_type: LightType) -> Self {
        Self {
            enabled: false,
            map: None,
            update: ShadowUpdate::default(),
            bias: light_type.default_shadow_bias(),
            view_proj: Mat4::identity(),
        }
    }
}

/// A light source
///
/// Cone cutoffs are stored as cosines; `-1` means no cone.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Light {
    /// Linear color
    pub color: Vec3,
    /// World position (spot and omni)
    pub position: Vec3,
    /// Normalized direction (directional and spot)
    pub direction: Vec3,
    /// Intensity multiplier
    pub energy: f32,
    /// Specular contribution
    pub specular: f32,
    /// Reach in world units (spot and omni)
    pub range: f32,
    /// Distance falloff exponent
    pub attenuation: f32,
    /// Cosine of the inner cone angle
    pub inner_cutoff: f32,
    /// Cosine of the outer cone angle
    pub outer_cutoff: f32,
    /// Apparent source size, controls shadow softness
    pub size: f32,
    /// Near distance of the shadow projection
    pub near: f32,
    /// Kind of light
    pub light_type: LightType,
    /// Whether the light contributes
    pub enabled: bool,
    /// Shadow state
    pub shadow: Shadow,
}

impl Light {
    /// A disabled light of the given type with default parameters
    pub fn new(light_type: LightType) -> Self {
        Self {
            color: Vec3::repeat(1.0),
            position: Vec3::zeros(),
            direction: Vec3::new(0.0, 0.0, -1.0),
            energy: 1.0,
            specular: 0.5,
            range: 100.0,
            attenuation: 1.0,
            inner_cutoff: -1.0,
            outer_cutoff: -1.0,
            size: 0.001,
            near: 0.05,
            light_type,
            enabled: false,
            shadow: Shadow::new(light_type),
        }
    }

    /// Far distance of the shadow projection
    pub const fn far(&self) -> f32 {
        self.range
    }

    /// Whether shadows are enabled and the map is due this frame
    pub fn needs_shadow_render(&self) -> bool {
        self.shadow.enabled && self.shadow.map.is_some() && self.shadow.update.should_update
    }
}
