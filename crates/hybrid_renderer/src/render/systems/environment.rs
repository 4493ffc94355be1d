//! Scene environment: ambient and background terms plus post-processing
//! parameters
//!
//! Read once per frame by the pass sequence. Settings that need GPU
//! resources on first use (SSAO, bloom, fog) are toggled through the
//! renderer so it can allocate them; everything else can be written here
//! directly.

use serde::{Deserialize, Serialize};

use crate::foundation::math::{Quat, Vec3};
use crate::render::api::TextureHandle;
use crate::render::primitives::Color;

/// Pre-built sky cubemaps
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Skybox {
    /// Environment cubemap drawn as background
    pub cubemap: TextureHandle,
    /// Diffuse irradiance cubemap
    pub irradiance: TextureHandle,
    /// Prefiltered specular cubemap
    pub prefilter: TextureHandle,
}

/// Bloom composite mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BloomMode {
    /// No bloom
    Disabled,
    /// Blurred highlights added to the image
    Additive,
    /// Blurred highlights soft-light blended
    SoftLight,
}

impl BloomMode {
    /// Value of the `uBloomMode` uniform
    pub const fn shader_index(self) -> i32 {
        self as i32
    }
}

/// Fog falloff
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FogMode {
    /// No fog
    Disabled,
    /// Linear between start and end
    Linear,
    /// Exponential squared
    Exp2,
    /// Exponential
    Exp,
}

impl FogMode {
    /// Value of the `uFogMode` uniform
    pub const fn shader_index(self) -> i32 {
        self as i32
    }
}

/// Tone mapping operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TonemapMode {
    /// Clamp only
    Linear,
    /// Reinhard
    Reinhard,
    /// Filmic curve
    Filmic,
    /// ACES approximation
    Aces,
}

impl TonemapMode {
    /// Value of the `uTonemapMode` uniform
    pub const fn shader_index(self) -> i32 {
        self as i32
    }
}

/// Screen-space ambient occlusion parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SsaoSettings {
    /// Whether the pass runs
    pub enabled: bool,
    /// Sampling radius in view space
    pub radius: f32,
    /// Depth comparison bias
    pub bias: f32,
    /// Blur iterations, each one horizontal or vertical
    pub iterations: u32,
}

/// Bloom parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BloomSettings {
    /// Composite mode, `Disabled` skips the stage
    pub mode: BloomMode,
    /// Strength of the composite
    pub intensity: f32,
    /// Luminance above which scene pixels feed the bloom
    pub hdr_threshold: f32,
    /// Same threshold for sky pixels
    pub sky_hdr_threshold: f32,
    /// Blur iterations
    pub iterations: u32,
}

/// Fog parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FogSettings {
    /// Falloff, `Disabled` skips the stage
    pub mode: FogMode,
    /// Fog color
    pub color: Vec3,
    /// Linear fog start distance
    pub start: f32,
    /// Linear fog end distance
    pub end: f32,
    /// Exponential density
    pub density: f32,
}

/// Tone mapping parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TonemapSettings {
    /// Operator
    pub mode: TonemapMode,
    /// Exposure multiplier
    pub exposure: f32,
    /// White point
    pub white: f32,
}

impl TonemapSettings {
    /// Exposure that leaves the image unchanged
    pub const DEFAULT_EXPOSURE: f32 = 1.0;
    /// White point of the default settings
    pub const DEFAULT_WHITE: f32 = 1.0;

    /// Whether the stage changes the image at all
    ///
    /// Any operator other than linear, or an exposure or white point off
    /// its default, turns the stage on.
    pub fn is_active(&self) -> bool {
        self.mode != TonemapMode::Linear
            || (self.exposure - Self::DEFAULT_EXPOSURE).abs() > f32::EPSILON
            || (self.white - Self::DEFAULT_WHITE).abs() > f32::EPSILON
    }
}

/// Final color adjustment
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdjustmentSettings {
    /// Brightness multiplier
    pub brightness: f32,
    /// Contrast multiplier
    pub contrast: f32,
    /// Saturation multiplier
    pub saturation: f32,
}

/// Full environment state
#[derive(Debug, Clone, PartialEq)]
pub struct Environment {
    /// Color of pixels no geometry covers, when no sky is used
    pub background_color: Vec3,
    /// Flat ambient term, when no sky is used
    pub ambient_color: Vec3,
    /// Sky cubemaps
    pub sky: Option<Skybox>,
    /// Whether the sky replaces the flat colors
    pub use_sky: bool,
    /// Sky orientation
    pub sky_rotation: Quat,
    /// Ambient occlusion
    pub ssao: SsaoSettings,
    /// Bloom
    pub bloom: BloomSettings,
    /// Fog
    pub fog: FogSettings,
    /// Tone mapping
    pub tonemap: TonemapSettings,
    /// Color adjustment
    pub adjustment: AdjustmentSettings,
}

impl Default for Environment {
    fn default() -> Self {
        Self {
            background_color: Vec3::repeat(0.2),
            ambient_color: Vec3::repeat(0.2),
            sky: None,
            use_sky: false,
            sky_rotation: Quat::identity(),
            ssao: SsaoSettings {
                enabled: false,
                radius: 0.5,
                bias: 0.025,
                iterations: 10,
            },
            bloom: BloomSettings {
                mode: BloomMode::Disabled,
                intensity: 1.0,
                hdr_threshold: 1.0,
                sky_hdr_threshold: 2.0,
                iterations: 10,
            },
            fog: FogSettings {
                mode: FogMode::Disabled,
                color: Vec3::repeat(1.0),
                start: 1.0,
                end: 50.0,
                density: 0.05,
            },
            tonemap: TonemapSettings {
                mode: TonemapMode::Linear,
                exposure: TonemapSettings::DEFAULT_EXPOSURE,
                white: TonemapSettings::DEFAULT_WHITE,
            },
            adjustment: AdjustmentSettings {
                brightness: 1.0,
                contrast: 1.0,
                saturation: 1.0,
            },
        }
    }
}

impl Environment {
    /// Set the background color; alpha is ignored
    pub fn set_background_color(&mut self, color: Color) {
        self.background_color = color.to_vec3();
    }

    /// Set the flat ambient color; alpha is ignored
    pub fn set_ambient_color(&mut self, color: Color) {
        self.ambient_color = color.to_vec3();
    }

    /// Use `skybox` for background and image based ambient light
    pub fn enable_skybox(&mut self, skybox: Skybox) {
        self.sky = Some(skybox);
        self.use_sky = true;
    }

    /// Return to flat background and ambient colors
    pub fn disable_skybox(&mut self) {
        self.use_sky = false;
    }

    /// Orient the sky from Euler angles in radians
    pub fn set_skybox_rotation(&mut self, pitch: f32, yaw: f32, roll: f32) {
        self.sky_rotation = Quat::from_euler_angles(pitch, yaw, roll);
    }

    /// The skybox when the sky is active
    pub fn active_sky(&self) -> Option<&Skybox> {
        self.sky.as_ref().filter(|_| self.use_sky)
    }

    /// Set the fog color; alpha is ignored
    pub fn set_fog_color(&mut self, color: Color) {
        self.fog.color = color.to_vec3();
    }

    /// Fog color as an opaque 8-bit color
    pub fn fog_color(&self) -> Color {
        Color::from_vec3(self.fog.color)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_tonemap_activates_on_any_non_default_setting() {
        let defaults = Environment::default().tonemap;
        assert!(!defaults.is_active());

        assert!(TonemapSettings { exposure: 1.5, ..defaults }.is_active());
        assert!(TonemapSettings { white: 4.0, ..defaults }.is_active());
        assert!(TonemapSettings { mode: TonemapMode::Reinhard, ..defaults }.is_active());
    }

    #[test]
    fn test_defaults() {
        let env = Environment::default();
        assert_relative_eq!(env.background_color, Vec3::repeat(0.2));
        assert!(!env.ssao.enabled);
        assert_eq!(env.ssao.iterations, 10);
        assert_eq!(env.bloom.mode, BloomMode::Disabled);
        assert_eq!(env.fog.mode, FogMode::Disabled);
        assert_eq!(env.fog.end, 50.0);
        assert!(!env.tonemap.is_active());
        assert!(env.active_sky().is_none());
    }

    #[test]
    fn test_tonemap_activation() {
        let mut tonemap = Environment::default().tonemap;
        tonemap.exposure = 1.5;
        assert!(tonemap.is_active());

        tonemap.exposure = 1.0;
        tonemap.mode = TonemapMode::Aces;
        assert!(tonemap.is_active());
    }

    #[test]
    fn test_skybox_toggle_keeps_handles() {
        let mut env = Environment::default();
        let sky = Skybox {
            cubemap: TextureHandle(1),
            irradiance: TextureHandle(2),
            prefilter: TextureHandle(3),
        };
        env.enable_skybox(sky);
        assert_eq!(env.active_sky(), Some(&sky));

        env.disable_skybox();
        assert!(env.active_sky().is_none());
        assert_eq!(env.sky, Some(sky));
    }

    #[test]
    fn test_color_setters_drop_alpha() {
        let mut env = Environment::default();
        env.set_ambient_color(Color::new(255, 0, 0, 0));
        assert_relative_eq!(env.ambient_color, Vec3::new(1.0, 0.0, 0.0));

        env.set_fog_color(Color::new(0, 255, 0, 10));
        assert_eq!(env.fog_color(), Color::new(0, 255, 0, 255));
    }
}
