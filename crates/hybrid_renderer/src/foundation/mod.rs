//! Foundation module - Core utilities and types
//!
//! This module provides fundamental utilities used throughout the renderer:
//! - Math types and projection helpers
//! - Collections and data structures
//! - Frame timing
//! - Logging bootstrap

pub mod math;
pub mod collections;
pub mod time;
pub mod logging;
