//! Configuration module for DiskImager
//!
//! Provides CLI arguments, the optional JSON config file and runtime
//! transfer settings.

mod settings;

pub use settings::*;
