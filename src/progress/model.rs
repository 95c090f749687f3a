//! Transfer progress accounting
//!
//! A [`TransferProgress`] is owned by the transfer engine and mutated in
//! place on every sample tick. Sinks only ever see copies of it.

use serde::{Deserialize, Serialize};

/// Snapshot of a running byte transfer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferProgress {
    /// Bytes moved so far
    pub written: u64,
    /// Target byte count, fixed when the transfer starts
    pub total: u64,
    /// Wall time of the last rate computation, in milliseconds
    pub elapsed_ms: u64,
    /// Throughput over the interval since the previous sample
    pub step_bytes_per_second: u64,
    /// Throughput over the whole transfer so far
    pub avg_bytes_per_second: u64,
}

impl TransferProgress {
    /// Create a fresh progress record for a transfer of `total` bytes
    pub fn new(total: u64) -> Self {
        Self {
            total,
            ..Default::default()
        }
    }

    /// Whether every target byte has been moved
    pub fn is_complete(&self) -> bool {
        self.written == self.total
    }

    /// Completion in percent; an empty transfer counts as done
    pub fn percentage(&self) -> f64 {
        if self.total == 0 {
            100.0
        } else {
            (self.written as f64 / self.total as f64) * 100.0
        }
    }

    /// Estimated time left based on the average rate
    pub fn eta_seconds(&self) -> Option<u64> {
        if self.avg_bytes_per_second == 0 {
            return None;
        }
        let remaining = self.total.saturating_sub(self.written);
        Some(remaining / self.avg_bytes_per_second)
    }

    /// Recompute rates and deliver a snapshot to `sink`.
    ///
    /// Rates are only recomputed when the clock advanced past
    /// `last_elapsed_ms`; otherwise the previous values are kept. The
    /// snapshot is delivered in both cases.
    pub fn report<S>(&mut self, sink: &S, step_bytes: u64, last_elapsed_ms: u64, elapsed_ms: u64)
    where
        S: ProgressSink + ?Sized,
    {
        if elapsed_ms > last_elapsed_ms {
            self.avg_bytes_per_second = per_second(self.written, elapsed_ms);
            self.step_bytes_per_second = per_second(step_bytes, elapsed_ms - last_elapsed_ms);
            self.elapsed_ms = elapsed_ms;
        }
        sink.report(*self);
    }
}

/// `bytes * 1000 / ms` without overflowing on very large transfers
fn per_second(bytes: u64, ms: u64) -> u64 {
    ((bytes as u128 * 1000) / ms as u128).min(u64::MAX as u128) as u64
}

/// Receiver of progress snapshots.
///
/// Sinks may be called from whichever thread drives the transfer; any
/// marshalling to a UI thread is the sink's own business.
pub trait ProgressSink {
    /// Accept one snapshot
    fn report(&self, progress: TransferProgress);
}

impl<F> ProgressSink for F
where
    F: Fn(TransferProgress),
{
    fn report(&self, progress: TransferProgress) {
        self(progress)
    }
}

/// Sink that drops every snapshot
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&self, _progress: TransferProgress) {}
}
