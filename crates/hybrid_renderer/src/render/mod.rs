//! # Rendering System
//!
//! Hybrid deferred/forward renderer built on an abstract graphics device.
//!
//! ## Architecture
//!
//! - **Renderer**: frame bracket, draw submission and the public light and
//!   environment API
//! - **Passes**: ordered pass objects that each declare the targets they
//!   read and write
//! - **Systems**: draw-call bins, light registry and batching, environment
//!   settings, submission state
//! - **Resources**: framebuffers, shader programs, default textures and
//!   primitive meshes owned by one renderer
//! - **API**: the `GraphicsDevice` seam every GPU call goes through
//!
//! ## Frame flow
//!
//! `begin(camera)` clears the bins and computes the camera matrices; draw
//! calls are classified into deferred or forward bins as they arrive;
//! `end()` sorts the bins, batches visible lights and runs the pass
//! sequence, then resets the device to a known baseline.

pub mod api;
pub mod backends;
pub mod passes;
pub mod primitives;
pub mod renderer;
pub mod resources;
pub mod systems;

#[cfg(test)]
mod renderer_tests;

pub use api::{GraphicsDevice, RenderTarget, RendererConfig};
pub use passes::{FrameStats, PassSequence, RenderPass};
pub use primitives::{Camera, Color, Mesh, Model, Sprite};
pub use renderer::{DebugBuffer, Renderer};
pub use resources::Material;
pub use systems::lighting::{LightHandle, LightType, ShadowUpdateMode};
pub use systems::state::{BillboardMode, BlendMode, RenderFlags, RenderMode, ShadowCastMode};

use thiserror::Error;

use crate::config::ConfigError;

/// High-level rendering error types
///
/// Device implementations report their failures through these variants too,
/// so callers see one error type whatever backend is in use.
#[derive(Error, Debug)]
pub enum RenderError {
    /// Renderer initialization failed during setup
    ///
    /// Incomplete framebuffers and shaders that fail to link end up here.
    #[error("Renderer initialization failed: {0}")]
    InitializationFailed(String),

    /// A rendering operation failed during execution
    #[error("Rendering failed: {0}")]
    RenderingFailed(String),

    /// Resource creation or management failed
    #[error("Resource creation failed: {0}")]
    ResourceCreationFailed(String),

    /// Backend-specific error occurred
    #[error("Backend error: {0}")]
    BackendError(String),

    /// `end` was called without a matching `begin`
    #[error("Frame ended without begin")]
    FrameNotBegun,

    /// `begin` was called twice without `end`
    #[error("Frame begun twice without end")]
    FrameAlreadyBegun,

    /// The renderer configuration was rejected
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),
}

/// Result type for rendering operations
pub type RenderResult<T> = Result<T, RenderError>;
