//! Public rendering API
//!
//! This module contains the types users and backends share: the
//! graphics device trait, renderer configuration and per-frame camera data.

pub mod types;
pub mod graphics_device;
pub mod renderer_config;
pub mod frame_data;

// Re-export commonly used types
pub use types::*;
pub use graphics_device::{DeviceResult, GraphicsDevice};
pub use renderer_config::RendererConfig;
pub use frame_data::FrameData;
