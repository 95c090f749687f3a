//! Progress reporting module
//!
//! The transfer engine accounts throughput in [`TransferProgress`] and
//! hands snapshots to a [`ProgressSink`]. The reporters turn those
//! snapshots into a terminal bar, JSON lines or log records.

mod model;
mod reporter;

pub use model::*;
pub use reporter::*;
