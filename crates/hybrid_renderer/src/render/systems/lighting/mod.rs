//! Lighting system
//!
//! Light records, the handle-based registry, per-frame visibility batching
//! and shadow map management.

pub mod batch;
pub mod light;
pub mod registry;
pub mod shadow;

pub use batch::{batch_lights, BatchedLight};
pub use light::{Light, LightType, Shadow, ShadowMap, ShadowUpdate, ShadowUpdateMode};
pub use registry::{LightHandle, LightRegistry};
