//! Active rendering systems
//!
//! This module contains the stateful runtime systems the pass sequence
//! reads every frame: draw-call collection, lighting, the environment and
//! the submission state.

pub mod drawcall;
pub mod environment;
pub mod lighting;
pub mod state;
