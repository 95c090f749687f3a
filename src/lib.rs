//! # DiskImager - Clone and Checksum Raw Disk Images
//!
//! DiskImager moves raw bytes between disk image files and block devices,
//! or hashes them, while reporting throughput and honouring cancellation.
//!
//! ## Features
//!
//! - **Cancellable Transfers**: A shared token stops any transfer at the next chunk
//! - **Read-Ahead**: Background reader with a 16-slot ring of 64 KiB buffers
//! - **Live Throughput**: Step and average bytes/second, sampled every 100ms
//! - **Checksums**: SHA-256/384/512, BLAKE3, XXHash3 and XXHash64
//! - **Size Probing**: Readable and writable size of images and devices
//!
//! ## Quick Start
//!
//! ```no_run
//! use diskimager::config::TransferConfig;
//! use diskimager::core::clone_image;
//! use diskimager::progress::ProgressReporter;
//! use diskimager::transfer::CancellationToken;
//! use std::path::Path;
//!
//! let progress = ProgressReporter::new("Clone");
//! let result = clone_image(
//!     Path::new("sdcard.img"),
//!     Path::new("/dev/sdb"),
//!     None,
//!     &TransferConfig::default(),
//!     &CancellationToken::new(),
//!     &progress,
//! ).unwrap();
//!
//! result.print_summary();
//! ```
//!
//! ## Custom Consumers
//!
//! ```no_run
//! use diskimager::progress::NoProgress;
//! use diskimager::transfer::{CancellationToken, ForEachChunk, SyncChunkSource, TransferEngine};
//! use std::io::Cursor;
//!
//! let mut zeros = 0u64;
//! let mut source = SyncChunkSource::new(Cursor::new(vec![0u8; 4096]), 4096);
//! let mut consumer = ForEachChunk::new(
//!     |chunk: &[u8]| {
//!         zeros += chunk.iter().filter(|b| **b == 0).count() as u64;
//!         Ok(())
//!     },
//!     || Ok(()),
//! );
//!
//! let completed = TransferEngine::new()
//!     .run(&mut consumer, &mut source, 4096, &CancellationToken::new(), &NoProgress)
//!     .unwrap();
//! assert!(completed);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod core;
pub mod error;
pub mod hash;
pub mod image;
pub mod progress;
pub mod transfer;

// Re-export commonly used types
pub use config::{HashAlgorithm, TransferConfig};
pub use core::{checksum_image, clone_image, ChecksumReport, CloneResult};
pub use error::{ImagerError, Result};
pub use progress::{ProgressReporter, ProgressSink, TransferProgress};
pub use transfer::{CancellationToken, TransferEngine};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for convenient imports
pub mod prelude {
    //! Convenient re-exports for common usage
    //!
    //! ```no_run
    //! use diskimager::prelude::*;
    //! ```

    pub use crate::config::{HashAlgorithm, TransferConfig};
    pub use crate::core::{checksum_image, clone_image, ChecksumReport, CloneResult};
    pub use crate::error::{ImagerError, Result};
    pub use crate::hash::{hash_bytes, HashResult};
    pub use crate::image::{preflight, read_size, write_size, ImageSink, ImageSource, SizeCheck};
    pub use crate::progress::{NoProgress, ProgressReporter, ProgressSink, TransferProgress};
    pub use crate::transfer::{
        CancellationToken, ChunkConsumer, ChunkSource, ReadAheadSource, SyncChunkSource, TransferEngine,
    };
}
