//! Hash computation module
//!
//! Streaming hashers used by the checksum operation.

mod integrity;

pub use integrity::*;
