//! Transfer engine
//!
//! Drives a [`ChunkSource`] to completion, feeding every chunk to a
//! [`ChunkConsumer`] and emitting time-throttled progress samples.

use crate::error::Result;
use crate::progress::{ProgressSink, TransferProgress};
use crate::transfer::cancel::CancellationToken;
use crate::transfer::source::ChunkSource;
use std::time::{Duration, Instant};

/// Default time between two progress samples
pub const DEFAULT_SAMPLE_INTERVAL: Duration = Duration::from_millis(100);

/// Per-chunk action plus the finalize step that follows the loop
pub trait ChunkConsumer {
    /// Process one chunk
    fn consume(&mut self, chunk: &[u8]) -> Result<()>;

    /// Called exactly once after the loop, even when the transfer was cut short
    fn finish(&mut self) -> Result<()>;
}

/// Adapts a pair of closures into a [`ChunkConsumer`]
pub struct ForEachChunk<A, F> {
    action: A,
    finalize: Option<F>,
}

impl<A, F> ForEachChunk<A, F>
where
    A: FnMut(&[u8]) -> Result<()>,
    F: FnOnce() -> Result<()>,
{
    /// Create a consumer from a per-chunk action and a finalize action
    pub fn new(action: A, finalize: F) -> Self {
        Self {
            action,
            finalize: Some(finalize),
        }
    }
}

impl<A, F> ChunkConsumer for ForEachChunk<A, F>
where
    A: FnMut(&[u8]) -> Result<()>,
    F: FnOnce() -> Result<()>,
{
    fn consume(&mut self, chunk: &[u8]) -> Result<()> {
        (self.action)(chunk)
    }

    fn finish(&mut self) -> Result<()> {
        match self.finalize.take() {
            Some(finalize) => finalize(),
            None => Ok(()),
        }
    }
}

/// Generic cancellable byte-transfer loop
#[derive(Debug, Clone, Copy)]
pub struct TransferEngine {
    sample_interval: Duration,
}

impl Default for TransferEngine {
    fn default() -> Self {
        Self {
            sample_interval: DEFAULT_SAMPLE_INTERVAL,
        }
    }
}

impl TransferEngine {
    /// Create an engine sampling progress every 100ms
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the minimum time between two progress samples
    pub fn with_sample_interval(mut self, interval: Duration) -> Self {
        self.sample_interval = interval;
        self
    }

    /// Sample interval in use
    pub fn sample_interval(&self) -> Duration {
        self.sample_interval
    }

    /// Move `total` bytes from `source` into `consumer`.
    ///
    /// Returns `Ok(true)` when every byte was processed and finalized,
    /// `Ok(false)` when cancellation or an early end of stream cut the
    /// transfer short. `consumer.finish()` and `source.shutdown()` run in
    /// both cases. I/O errors from either side propagate immediately.
    pub fn run<S, C, P>(
        &self,
        consumer: &mut C,
        source: &mut S,
        total: u64,
        cancel: &CancellationToken,
        sink: &P,
    ) -> Result<bool>
    where
        S: ChunkSource + ?Sized,
        C: ChunkConsumer + ?Sized,
        P: ProgressSink + ?Sized,
    {
        let interval_ms = self.sample_interval.as_millis() as u64;
        let watch = Instant::now();
        let mut progress = TransferProgress::new(total);
        let mut last_elapsed = 0u64;
        let mut step_bytes = 0u64;

        tracing::debug!("Transfer of {} bytes started", total);

        while !cancel.is_cancelled() {
            let chunk = source.next_chunk()?;
            // A source may not push the counter past the target
            let remaining = usize::try_from(total - progress.written).unwrap_or(usize::MAX);
            let chunk = &chunk[..chunk.len().min(remaining)];
            if chunk.is_empty() {
                break;
            }

            consumer.consume(chunk)?;
            progress.written += chunk.len() as u64;
            step_bytes += chunk.len() as u64;

            let elapsed = watch.elapsed().as_millis() as u64;
            if elapsed - last_elapsed >= interval_ms {
                progress.report(sink, step_bytes, last_elapsed, elapsed);
                step_bytes = 0;
                last_elapsed = elapsed;
            }
        }

        let elapsed = watch.elapsed().as_millis() as u64;
        consumer.finish()?;
        source.shutdown()?;

        let complete = progress.is_complete();
        if complete {
            progress.report(sink, step_bytes, last_elapsed, elapsed);
            tracing::debug!("Transfer of {} bytes completed in {} ms", total, elapsed);
        } else if cancel.is_cancelled() {
            tracing::info!("Transfer cancelled after {} of {} bytes", progress.written, total);
        } else {
            tracing::warn!("Source ended after {} of {} bytes", progress.written, total);
        }

        Ok(complete)
    }
}
