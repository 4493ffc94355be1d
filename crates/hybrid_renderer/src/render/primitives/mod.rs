//! Core primitive types for rendering
//!
//! This module contains the fundamental data structures the renderer
//! consumes: camera description, culling volumes, colors, geometry
//! references and sprite sheets.

pub mod camera;
pub mod color;
pub mod frustum;
pub mod mesh;
pub mod sprite;

// Re-export commonly used types
pub use camera::{Camera, CameraProjection};
pub use color::Color;
pub use frustum::{BoundingBox, Frustum, FrustumPlane, ScreenRect};
pub use mesh::{Mesh, Model};
pub use sprite::Sprite;
