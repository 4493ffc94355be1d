//! Renderer configuration for application-specific settings
//!
//! This module provides the configuration structure applications use to
//! size the internal render targets and pick pipeline options without
//! hardcoding values in the rendering system itself.

use serde::{Deserialize, Serialize};

use crate::config::{Config, ConfigError};
use crate::foundation::math::Vec3;
use crate::render::systems::state::RenderFlags;

/// Configuration for the hybrid renderer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// Internal resolution width in pixels
    pub width: u32,
    /// Internal resolution height in pixels
    pub height: u32,
    /// Pipeline feature flags
    pub flags: RenderFlags,
    /// Camera near clip distance
    pub near_plane: f32,
    /// Camera far clip distance
    pub far_plane: f32,
    /// Shadow map resolution used when a light enables shadows without one
    pub default_shadow_resolution: u32,
    /// Minimum corner of the scene volume directional shadows cover
    pub scene_bounds_min: Vec3,
    /// Maximum corner of the scene volume directional shadows cover
    pub scene_bounds_max: Vec3,
    /// Maximum number of lights sent to a single forward draw
    pub forward_light_limit: usize,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self::new(1280, 720)
    }
}

impl Config for RendererConfig {}

impl RendererConfig {
    /// Create a configuration rendering internally at `width` x `height`
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            flags: RenderFlags::empty(),
            near_plane: 0.01,
            far_plane: 1000.0,
            default_shadow_resolution: 1024,
            scene_bounds_min: Vec3::repeat(-100.0),
            scene_bounds_max: Vec3::repeat(100.0),
            forward_light_limit: 8,
        }
    }

    /// Set pipeline flags
    pub fn with_flags(mut self, flags: RenderFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Set the camera clip distances
    pub fn with_clip_planes(mut self, near: f32, far: f32) -> Self {
        self.near_plane = near;
        self.far_plane = far;
        self
    }

    /// Set the fallback shadow map resolution
    pub fn with_default_shadow_resolution(mut self, resolution: u32) -> Self {
        self.default_shadow_resolution = resolution;
        self
    }

    /// Set the volume directional shadow projections are fitted to
    pub fn with_scene_bounds(mut self, min: Vec3, max: Vec3) -> Self {
        self.scene_bounds_min = min;
        self.scene_bounds_max = max;
        self
    }

    /// Set the per-draw forward light limit
    pub fn with_forward_light_limit(mut self, limit: usize) -> Self {
        self.forward_light_limit = limit.clamp(1, 8);
        self
    }

    /// Check ranges before the renderer allocates anything
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.width == 0 || self.height == 0 {
            return Err(ConfigError::Invalid {
                field: "width/height",
                reason: format!("resolution must be positive, got {}x{}", self.width, self.height),
            });
        }
        if !(self.near_plane > 0.0 && self.far_plane > self.near_plane) {
            return Err(ConfigError::Invalid {
                field: "near_plane/far_plane",
                reason: format!("need 0 < near < far, got {} and {}", self.near_plane, self.far_plane),
            });
        }
        if self.default_shadow_resolution == 0 {
            return Err(ConfigError::Invalid {
                field: "default_shadow_resolution",
                reason: "must be positive".to_string(),
            });
        }
        if self.forward_light_limit == 0 || self.forward_light_limit > 8 {
            return Err(ConfigError::Invalid {
                field: "forward_light_limit",
                reason: format!("must be within 1..=8, got {}", self.forward_light_limit),
            });
        }
        Ok(())
    }
}
