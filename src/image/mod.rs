//! Image endpoints
//!
//! Raw image files and block devices as sources and sinks for the clone
//! and checksum operations.

mod endpoint;

pub use endpoint::*;
