//! Disk image operations
//!
//! Clone and checksum, both built on the shared transfer engine.

mod checksum;
mod clone;

pub use checksum::*;
pub use clone::*;
