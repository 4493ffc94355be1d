//! Resource management
//!
//! This module contains the GPU resources a renderer owns for its whole
//! lifetime: materials as submitted by the application, render targets,
//! shader programs, built-in textures and meshes.

pub mod material;
pub mod framebuffers;
pub mod shaders;
pub mod textures;
pub mod primitives;

pub use material::{Material, MaterialMap, OrmMap, PixelFormat, Texture};
pub use framebuffers::{ColorTarget, DualTarget, FramebufferSet, GBuffer, SceneTarget};
pub use shaders::{CachedUniform, ShaderLibrary};
pub use textures::DefaultTextures;
pub use primitives::Primitives;
