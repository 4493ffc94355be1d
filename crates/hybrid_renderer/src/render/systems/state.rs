//! Render state applied to subsequent submissions
//!
//! The state is sampled when a draw call is submitted, not when the frame
//! ends, so changing it between two `draw_*` calls affects only the later one.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::render::api::BlendFunc;

bitflags! {
    /// Pipeline feature flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct RenderFlags: u32 {
        /// Anti-alias the final image with FXAA
        const FXAA = 1 << 0;
        /// Linear filtering for the final blit instead of nearest
        const BLIT_LINEAR = 1 << 1;
        /// Keep the internal aspect ratio when blitting (letterbox/pillarbox)
        const ASPECT_KEEP = 1 << 2;
        /// Restrict screen-space passes to geometry pixels with the stencil buffer
        const STENCIL_TEST = 1 << 3;
        /// Depth-only pre-pass before forward shading
        const DEPTH_PREPASS = 1 << 4;
    }
}

impl Default for RenderFlags {
    fn default() -> Self {
        Self::empty()
    }
}

/// Render path selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RenderMode {
    /// Classify from blend mode and albedo alpha
    AutoDetect,
    /// Always the deferred path
    Deferred,
    /// Always the forward path
    Forward,
}

/// How a forward-rendered surface combines with what is behind it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BlendMode {
    /// No blending
    Opaque,
    /// Standard alpha blending
    Alpha,
    /// Add to the destination
    Additive,
    /// Multiply with the destination
    Multiply,
}

impl BlendMode {
    /// Device blend state, `None` for opaque
    pub const fn blend_func(self) -> Option<BlendFunc> {
        match self {
            Self::Opaque => None,
            Self::Alpha => Some(BlendFunc::ALPHA),
            Self::Additive => Some(BlendFunc::ADDITIVE),
            Self::Multiply => Some(BlendFunc::MULTIPLY),
        }
    }
}

/// Which faces are rasterized into shadow maps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShadowCastMode {
    /// Front faces only (back faces culled)
    FrontFaces,
    /// Back faces only (front faces culled)
    BackFaces,
    /// Both sides
    AllFaces,
    /// Not rendered into shadow maps
    Disabled,
}

/// Camera-facing behavior of submitted geometry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BillboardMode {
    /// Use the transform as given
    Disabled,
    /// Fully face the camera
    Front,
    /// Rotate around the world Y axis only
    YAxis,
}

/// Submission state plus global flags
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderState {
    /// Active pipeline flags
    pub flags: RenderFlags,
    /// Render path override
    pub render_mode: RenderMode,
    /// Blend mode for materials that do not carry their own
    pub blend_mode: BlendMode,
    /// Shadow casting policy
    pub shadow_cast_mode: ShadowCastMode,
    /// Billboard behavior
    pub billboard_mode: BillboardMode,
    /// Fragments with alpha below this are discarded in the forward pass
    pub alpha_scissor_threshold: f32,
}

impl Default for RenderState {
    fn default() -> Self {
        Self::new(RenderFlags::empty())
    }
}

impl RenderState {
    /// Default submission state with the given flags
    pub const fn new(flags: RenderFlags) -> Self {
        Self {
            flags,
            render_mode: RenderMode::AutoDetect,
            blend_mode: BlendMode::Alpha,
            shadow_cast_mode: ShadowCastMode::FrontFaces,
            billboard_mode: BillboardMode::Disabled,
            alpha_scissor_threshold: 0.01,
        }
    }

    /// Whether every flag in `flags` is set
    pub const fn has(&self, flags: RenderFlags) -> bool {
        self.flags.contains(flags)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let state = RenderState::default();
        assert_eq!(state.render_mode, RenderMode::AutoDetect);
        assert_eq!(state.blend_mode, BlendMode::Alpha);
        assert_eq!(state.shadow_cast_mode, ShadowCastMode::FrontFaces);
        assert_eq!(state.billboard_mode, BillboardMode::Disabled);
        assert!((state.alpha_scissor_threshold - 0.01).abs() < f32::EPSILON);
        assert!(state.flags.is_empty());
    }

    #[test]
    fn test_blend_funcs() {
        assert_eq!(BlendMode::Opaque.blend_func(), None);
        assert_eq!(BlendMode::Multiply.blend_func(), Some(BlendFunc::MULTIPLY));
    }

    #[test]
    fn test_flag_queries() {
        let state = RenderState::new(RenderFlags::FXAA | RenderFlags::STENCIL_TEST);
        assert!(state.has(RenderFlags::FXAA));
        assert!(!state.has(RenderFlags::FXAA | RenderFlags::DEPTH_PREPASS));
    }
}
