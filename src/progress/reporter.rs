//! Progress reporter implementations
//!
//! - [`ProgressReporter`]: indicatif bar with step throughput and ETA
//! - [`JsonProgress`]: one JSON object per snapshot, for scripting
//! - [`LogProgress`]: tracing records, for non-TTY runs

use crate::progress::{ProgressSink, TransferProgress};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::io::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Terminal progress bar fed by transfer snapshots
pub struct ProgressReporter {
    bar: ProgressBar,
    last: Mutex<TransferProgress>,
}

impl ProgressReporter {
    /// Create a new progress bar with a short label such as "Clone"
    pub fn new(label: &str) -> Self {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{prefix:.bold.dim} [{bar:40.green/white}] {bytes}/{total_bytes} ({percent}%) {msg}")
                .expect("Invalid template")
                .progress_chars("=> "),
        );
        bar.set_prefix(label.to_string());

        Self {
            bar,
            last: Mutex::new(TransferProgress::default()),
        }
    }

    /// Create a hidden reporter (quiet mode); snapshots are still recorded
    pub fn disabled() -> Self {
        let reporter = Self::new("");
        reporter.bar.set_draw_target(ProgressDrawTarget::hidden());
        reporter
    }

    /// Last snapshot received
    pub fn last(&self) -> TransferProgress {
        self.last.lock().map(|p| *p).unwrap_or_default()
    }

    /// Finish the bar with a success message
    pub fn finish_success(&self, message: &str) {
        self.bar.finish_with_message(format!("✓ {}", message));
    }

    /// Leave the bar where it stopped with an error message
    pub fn finish_error(&self, message: &str) {
        self.bar.abandon_with_message(format!("✗ {}", message));
    }

    /// Summary built from the last snapshot
    pub fn summary(&self) -> ProgressSummary {
        ProgressSummary::from(self.last())
    }
}

impl ProgressSink for ProgressReporter {
    fn report(&self, progress: TransferProgress) {
        if self.bar.length() != Some(progress.total) {
            self.bar.set_length(progress.total);
        }
        self.bar.set_position(progress.written);

        let eta = progress
            .eta_seconds()
            .map(|s| humantime::format_duration(Duration::from_secs(s)).to_string())
            .unwrap_or_else(|| "-".to_string());
        self.bar.set_message(format!(
            "{}/s, ETA {}",
            humansize::format_size(progress.step_bytes_per_second, humansize::BINARY),
            eta
        ));

        if let Ok(mut last) = self.last.lock() {
            *last = progress;
        }
    }
}

/// Writes each snapshot as a JSON line
pub struct JsonProgress<W: Write> {
    out: Mutex<W>,
}

impl<W: Write> JsonProgress<W> {
    /// Create a JSON-lines sink writing to `out`
    pub fn new(out: W) -> Self {
        Self { out: Mutex::new(out) }
    }

    /// Give back the writer
    pub fn into_inner(self) -> W {
        match self.out.into_inner() {
            Ok(out) => out,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl<W: Write> ProgressSink for JsonProgress<W> {
    fn report(&self, progress: TransferProgress) {
        let Ok(mut out) = self.out.lock() else {
            return;
        };
        let written = serde_json::to_writer(&mut *out, &progress)
            .map_err(std::io::Error::from)
            .and_then(|_| out.write_all(b"\n"));
        if let Err(e) = written {
            tracing::warn!("Failed to write progress record: {}", e);
        }
    }
}

/// Logs snapshots through `tracing`, at most once per whole percent
pub struct LogProgress {
    last_percent: AtomicU64,
}

impl LogProgress {
    /// Create a log sink
    pub fn new() -> Self {
        Self {
            last_percent: AtomicU64::new(u64::MAX),
        }
    }
}

impl Default for LogProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressSink for LogProgress {
    fn report(&self, progress: TransferProgress) {
        let percent = progress.percentage() as u64;
        if self.last_percent.swap(percent, Ordering::Relaxed) == percent && !progress.is_complete() {
            return;
        }
        tracing::info!(
            "{:.1}% {}/{} at {}/s (avg {}/s)",
            progress.percentage(),
            humansize::format_size(progress.written, humansize::BINARY),
            humansize::format_size(progress.total, humansize::BINARY),
            humansize::format_size(progress.step_bytes_per_second, humansize::BINARY),
            humansize::format_size(progress.avg_bytes_per_second, humansize::BINARY),
        );
    }
}

/// Human-oriented view of a finished (or abandoned) transfer
#[derive(Debug, Clone)]
pub struct ProgressSummary {
    /// Bytes moved
    pub written: u64,
    /// Target bytes
    pub total: u64,
    /// Elapsed time
    pub elapsed: Duration,
    /// Average throughput in bytes/second
    pub throughput: u64,
}

impl From<TransferProgress> for ProgressSummary {
    fn from(p: TransferProgress) -> Self {
        Self {
            written: p.written,
            total: p.total,
            elapsed: Duration::from_millis(p.elapsed_ms),
            throughput: p.avg_bytes_per_second,
        }
    }
}

impl ProgressSummary {
    /// Get completion percentage
    pub fn percentage(&self) -> f64 {
        if self.total == 0 {
            100.0
        } else {
            (self.written as f64 / self.total as f64) * 100.0
        }
    }
}
