//! # Hybrid Renderer
//!
//! A real-time 3D rendering pipeline that draws opaque geometry through a
//! deferred path and translucent geometry through a forward path, then
//! composites both with sky, shadows and post-processing.
//!
//! ## Features
//!
//! - **Deferred shading**: G-buffer, screen-space ambient occlusion,
//!   image-based ambient light and per-light additive accumulation
//! - **Forward shading**: back-to-front translucent draws with up to eight
//!   lights each and an optional depth prepass
//! - **Shadows**: directional, spot and omni shadow maps with manual,
//!   interval or continuous refresh
//! - **Post-processing**: bloom, fog, tonemapping, color adjustment, FXAA
//! - **Sprites**: animated sprite sheets drawn as optionally billboarded quads
//! - **Device seam**: every GPU call goes through [`GraphicsDevice`], with a
//!   recording implementation for headless use and tests
//!
//! ## Quick Start
//!
//! ```rust
//! use hybrid_renderer::prelude::*;
//! use hybrid_renderer::render::backends::RecordingDevice;
//!
//! fn main() -> Result<(), RenderError> {
//!     hybrid_renderer::foundation::logging::init_with_default("info");
//!
//!     let config = RendererConfig::new(1280, 720).with_flags(RenderFlags::FXAA);
//!     let mut renderer = Renderer::init(RecordingDevice::new(1280, 720), config)?;
//!
//!     let sun = renderer.create_light(LightType::Directional);
//!     renderer.set_light_active(sun, true);
//!     renderer.lights_mut().set_direction(sun, Vec3::new(-1.0, -1.0, -1.0));
//!
//!     let camera = Camera::perspective(Vec3::new(0.0, 2.0, 6.0), Vec3::zeros(), 60.0);
//!     renderer.begin(&camera)?;
//!     // draw_mesh / draw_model calls go here
//!     let stats = renderer.end()?;
//!     assert!(stats.ran("final_blit"));
//!
//!     renderer.close();
//!     Ok(())
//! }
//! ```
//!
//! [`GraphicsDevice`]: render::GraphicsDevice

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

pub mod config;
pub mod foundation;
pub mod render;

/// Common imports for renderer users
pub mod prelude {
    pub use crate::{
        config::{Config, ConfigError},
        foundation::math::{Mat4, Quat, Vec3, Vec4},
        render::{
            Camera, Color, DebugBuffer, GraphicsDevice, LightHandle, LightType, Material, Mesh, Model,
            RenderError, RenderFlags, RenderMode, RenderResult, RenderTarget, Renderer, RendererConfig,
            ShadowUpdateMode, Sprite,
        },
        render::systems::environment::{BloomMode, Environment, FogMode, Skybox, TonemapMode},
    };
}
