//! Clone operation
//!
//! Writes every chunk of a source to a sink unchanged and flushes the sink
//! once the loop ends.

use crate::config::TransferConfig;
use crate::error::Result;
use crate::image::{ensure_distinct, ImageSink, ImageSource};
use crate::progress::ProgressSink;
use crate::transfer::{CancellationToken, ChunkConsumer, ChunkSource, SyncChunkSource, TransferEngine};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Chunk consumer that writes to a sink and flushes it on finish
pub struct SinkWriter<W: Write> {
    sink: W,
    written: u64,
}

impl<W: Write> SinkWriter<W> {
    /// Wrap a sink
    pub fn new(sink: W) -> Self {
        Self { sink, written: 0 }
    }

    /// Bytes handed to the sink so far
    pub fn written(&self) -> u64 {
        self.written
    }

    /// Give back the sink
    pub fn into_inner(self) -> W {
        self.sink
    }
}

impl<W: Write> ChunkConsumer for SinkWriter<W> {
    fn consume(&mut self, chunk: &[u8]) -> Result<()> {
        self.sink.write_all(chunk)?;
        self.written += chunk.len() as u64;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.sink.flush()?;
        Ok(())
    }
}

/// Copy `total` bytes from `source` to `dst`
pub fn clone_with<S, W, P>(
    engine: &TransferEngine,
    source: &mut S,
    dst: W,
    total: u64,
    cancel: &CancellationToken,
    progress: &P,
) -> Result<bool>
where
    S: ChunkSource + ?Sized,
    W: Write,
    P: ProgressSink + ?Sized,
{
    let mut writer = SinkWriter::new(dst);
    engine.run(&mut writer, source, total, cancel, progress)
}

/// Copy `total` bytes from a reader to a writer on the calling thread
pub fn clone_stream<R, W, P>(
    engine: &TransferEngine,
    src: R,
    dst: W,
    total: u64,
    cancel: &CancellationToken,
    progress: &P,
) -> Result<bool>
where
    R: Read,
    W: Write,
    P: ProgressSink + ?Sized,
{
    let mut source = SyncChunkSource::new(src, total);
    clone_with(engine, &mut source, dst, total, cancel, progress)
}

/// Clone operation result
#[derive(Debug, Clone)]
pub struct CloneResult {
    /// Source path
    pub source: PathBuf,
    /// Destination path
    pub destination: PathBuf,
    /// Whether every requested byte was written and flushed
    pub completed: bool,
    /// Bytes requested
    pub total: u64,
    /// Bytes actually written
    pub bytes_written: u64,
    /// Total duration
    pub duration: Duration,
}

impl CloneResult {
    /// Average throughput in bytes/second
    pub fn throughput(&self) -> f64 {
        let secs = self.duration.as_secs_f64();
        if secs > 0.0 {
            self.bytes_written as f64 / secs
        } else {
            0.0
        }
    }

    /// Print summary to console
    pub fn print_summary(&self) {
        println!("\n=== Clone Summary ===");
        println!("Source:        {}", self.source.display());
        println!("Destination:   {}", self.destination.display());
        println!("Status:        {}", if self.completed { "complete" } else { "INCOMPLETE" });
        println!("Bytes written: {} of {}",
            humansize::format_size(self.bytes_written, humansize::BINARY),
            humansize::format_size(self.total, humansize::BINARY)
        );
        println!("Duration:      {:.2?}", self.duration);
        println!("Throughput:    {}/s", humansize::format_size(self.throughput() as u64, humansize::BINARY));
    }
}

/// Clone an image file or device to another.
///
/// `size` of `None` copies the whole readable length of the source.
pub fn clone_image<P>(
    source_path: &Path,
    destination_path: &Path,
    size: Option<u64>,
    config: &TransferConfig,
    cancel: &CancellationToken,
    progress: &P,
) -> Result<CloneResult>
where
    P: ProgressSink + ?Sized,
{
    let start = Instant::now();
    ensure_distinct(source_path, destination_path)?;

    let source = ImageSource::open(source_path)?;
    let total = size.unwrap_or(source.read_size());
    let sink = ImageSink::create(destination_path)?;

    tracing::info!(
        "Cloning {} bytes from {:?} to {:?}{}",
        total,
        source_path,
        destination_path,
        if config.read_ahead { " (read-ahead)" } else { "" }
    );

    let engine = TransferEngine::new().with_sample_interval(config.sample_interval());
    let mut chunks = source.into_chunk_source(total, config, cancel)?;
    let mut writer = SinkWriter::new(sink);
    let completed = engine
        .run(&mut writer, chunks.as_mut(), total, cancel, progress)
        .map_err(|e| e.with_context(format!("cloning to '{}'", destination_path.display())))?;

    Ok(CloneResult {
        source: source_path.to_path_buf(),
        destination: destination_path.to_path_buf(),
        completed,
        total,
        bytes_written: writer.written(),
        duration: start.elapsed(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::IoResultExt;
    use crate::progress::{NoProgress, TransferProgress};
    use crate::transfer::ForEachChunk;
    use std::cell::RefCell;
    use std::io::Cursor;
    use tempfile::TempDir;

    fn pattern(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 256) as u8).collect()
    }

    /// Check that `path` holds exactly `expected` in its first bytes
    fn compare_prefix(path: &Path, expected: &[u8]) -> Result<bool> {
        let mut file = std::fs::File::open(path).with_path(path)?;
        let mut actual = vec![0u8; expected.len()];
        match file.read_exact(&mut actual) {
            Ok(()) => Ok(actual == expected),
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Ok(false),
            Err(e) => Err(e).with_path(path),
        }
    }

    #[test]
    fn test_clone_stream_copies_exact_bytes() {
        let data = pattern(150_000);
        let mut out = Vec::new();
        let samples = RefCell::new(Vec::new());
        let sink = |p: TransferProgress| samples.borrow_mut().push(p);

        let ok = clone_stream(
            &TransferEngine::new(),
            Cursor::new(&data),
            &mut out,
            150_000,
            &CancellationToken::new(),
            &sink,
        )
        .unwrap();

        assert!(ok);
        assert_eq!(out, data);
        assert_eq!(samples.borrow().last().unwrap().written, 150_000);
    }

    #[test]
    fn test_clone_partial_size() {
        let data = pattern(10_000);
        let mut out = Vec::new();
        let ok = clone_stream(
            &TransferEngine::new(),
            Cursor::new(&data),
            &mut out,
            4_000,
            &CancellationToken::new(),
            &NoProgress,
        )
        .unwrap();

        assert!(ok);
        assert_eq!(out, data[..4_000]);
    }

    #[test]
    fn test_truncated_source_still_flushes() {
        struct FlushCounter<'a>(&'a RefCell<usize>);
        impl Write for FlushCounter<'_> {
            fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
                Ok(buf.len())
            }
            fn flush(&mut self) -> std::io::Result<()> {
                *self.0.borrow_mut() += 1;
                Ok(())
            }
        }

        let flushes = RefCell::new(0);
        let ok = clone_stream(
            &TransferEngine::new(),
            Cursor::new(vec![0u8; 100]),
            FlushCounter(&flushes),
            1_000,
            &CancellationToken::new(),
            &NoProgress,
        )
        .unwrap();

        assert!(!ok);
        assert_eq!(*flushes.borrow(), 1);
    }

    #[test]
    fn test_cancelled_clone_keeps_partial_output() {
        let cancel = CancellationToken::new();
        let mut source = SyncChunkSource::new(Cursor::new(vec![5u8; 200_000]), 200_000);
        let mut out = Vec::new();
        let mut consumer = ForEachChunk::new(
            |chunk: &[u8]| {
                out.extend_from_slice(chunk);
                cancel.cancel();
                Ok(())
            },
            || Ok(()),
        );

        let ok = TransferEngine::new()
            .run(&mut consumer, &mut source, 200_000, &cancel, &NoProgress)
            .unwrap();
        drop(consumer);

        assert!(!ok);
        assert_eq!(out.len(), 64 * 1024);
    }

    #[test]
    fn test_clone_image_files() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("source.img");
        let dst = dir.path().join("dest.img");
        let data = pattern(300_000);
        std::fs::write(&src, &data).unwrap();

        for read_ahead in [false, true] {
            let config = TransferConfig {
                read_ahead,
                ..Default::default()
            };
            let result =
                clone_image(&src, &dst, None, &config, &CancellationToken::new(), &NoProgress).unwrap();

            assert!(result.completed);
            assert_eq!(result.total, 300_000);
            assert_eq!(result.bytes_written, 300_000);
            assert_eq!(std::fs::read(&dst).unwrap(), data);
            assert!(compare_prefix(&dst, &data[..1_000]).unwrap());
        }
    }

    #[test]
    fn test_clone_image_onto_itself_is_refused() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("same.img");
        std::fs::write(&src, b"data").unwrap();

        let result = clone_image(
            &src,
            &src,
            None,
            &TransferConfig::default(),
            &CancellationToken::new(),
            &NoProgress,
        );
        assert!(result.is_err());
        assert_eq!(std::fs::read(&src).unwrap(), b"data");
    }

    #[test]
    fn test_clone_image_requested_size_larger_than_source() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("small.img");
        let dst = dir.path().join("out.img");
        std::fs::write(&src, vec![1u8; 1_000]).unwrap();

        let result = clone_image(
            &src,
            &dst,
            Some(2_000),
            &TransferConfig::default(),
            &CancellationToken::new(),
            &NoProgress,
        )
        .unwrap();

        assert!(!result.completed);
        assert_eq!(result.bytes_written, 1_000);
        assert!(compare_prefix(&dst, &[1u8; 1_000]).unwrap());
        assert!(!compare_prefix(&dst, &[1u8; 2_000]).unwrap());
    }
}
