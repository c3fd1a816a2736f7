//! Tessera Core
//!
//! Shared utilities for the Tessera renderer: logging setup, profiling hooks,
//! generic geometry types and math re-exports.

pub mod config;
pub mod geometry;
pub mod logging;
pub mod math;
pub mod profiling;
