//! Tracing/logging setup shared by every binary entry point.

pub mod tracing;

pub use tracing::init;
