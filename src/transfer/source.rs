//! Chunk sources
//!
//! A chunk source turns a sequential reader into a stream of borrowed byte
//! chunks, stopping once a fixed number of bytes has been read.

use crate::error::Result;
use std::io::{ErrorKind, Read};

/// Default chunk size (64 KiB)
pub const CHUNK_SIZE: usize = 64 * 1024;

/// Producer of sequential byte chunks.
///
/// The returned slice is only valid until the next call. An empty slice
/// marks the end of the stream (target reached, reader exhausted or, for
/// sources with background work, cancellation observed).
pub trait ChunkSource {
    /// Pull the next chunk
    fn next_chunk(&mut self) -> Result<&[u8]>;

    /// Stop any background work and wait for it to finish
    fn shutdown(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Read `buf.len()` bytes at most, retrying reads interrupted by signals
pub(crate) fn read_some<R: Read + ?Sized>(reader: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    loop {
        match reader.read(buf) {
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            other => return other,
        }
    }
}

/// Chunk source that reads on the caller's thread into a single reused buffer
pub struct SyncChunkSource<R> {
    reader: R,
    buffer: Vec<u8>,
    position: u64,
    total: u64,
}

impl<R: Read> SyncChunkSource<R> {
    /// Create a source that yields at most `total` bytes in 64 KiB chunks
    pub fn new(reader: R, total: u64) -> Self {
        Self::with_chunk_size(reader, total, CHUNK_SIZE)
    }

    /// Create a source with a custom chunk size
    pub fn with_chunk_size(reader: R, total: u64, chunk_size: usize) -> Self {
        Self {
            reader,
            buffer: vec![0u8; chunk_size.max(1)],
            position: 0,
            total,
        }
    }

    /// Bytes read from the underlying reader so far
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Give back the underlying reader
    pub fn into_inner(self) -> R {
        self.reader
    }
}

impl<R: Read> ChunkSource for SyncChunkSource<R> {
    fn next_chunk(&mut self) -> Result<&[u8]> {
        if self.position >= self.total {
            return Ok(&[]);
        }
        let want = (self.buffer.len() as u64).min(self.total - self.position) as usize;
        let read = read_some(&mut self.reader, &mut self.buffer[..want])?;
        self.position += read as u64;
        Ok(&self.buffer[..read])
    }
}
