//! Byte-transfer core
//!
//! Chunk sources (direct or read-ahead), cooperative cancellation and the
//! engine loop shared by the clone and checksum operations.

mod cancel;
mod engine;
mod read_ahead;
mod source;

pub use cancel::CancellationToken;
pub use engine::{ChunkConsumer, ForEachChunk, TransferEngine, DEFAULT_SAMPLE_INTERVAL};
pub use read_ahead::{ReadAheadSource, RING_SIZE};
pub use source::{ChunkSource, SyncChunkSource, CHUNK_SIZE};
