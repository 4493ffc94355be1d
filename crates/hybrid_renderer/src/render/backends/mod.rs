//! Backend implementations for the render module
//!
//! Currently only the headless recording device ships in the crate. GPU
//! backends implement `GraphicsDevice` outside of it.

/// Headless device that records calls
pub mod recording;

pub use recording::{DeviceCommand, RecordingDevice};
