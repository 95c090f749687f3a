//! Checksum operation
//!
//! Feeds every chunk of a source to a streaming hasher. A digest is only
//! produced when the whole requested length was hashed.

use crate::config::{HashAlgorithm, TransferConfig};
use crate::error::{ImagerError, Result};
use crate::hash::{HashResult, StreamingHasher};
use crate::image::ImageSource;
use crate::progress::ProgressSink;
use crate::transfer::{CancellationToken, ChunkConsumer, ChunkSource, SyncChunkSource, TransferEngine};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Chunk consumer that hashes every chunk and finalizes on finish
pub struct HashAccumulator {
    hasher: Option<StreamingHasher>,
    result: Option<HashResult>,
}

impl HashAccumulator {
    /// Start hashing with `algorithm`
    pub fn new(algorithm: HashAlgorithm) -> Self {
        Self {
            hasher: Some(StreamingHasher::new(algorithm)),
            result: None,
        }
    }

    /// Bytes hashed so far
    pub fn bytes_processed(&self) -> u64 {
        match (&self.hasher, &self.result) {
            (Some(h), _) => h.bytes_processed(),
            (None, Some(r)) => r.size,
            (None, None) => 0,
        }
    }

    /// The digest, once [`ChunkConsumer::finish`] has run
    pub fn into_result(self) -> Option<HashResult> {
        self.result
    }
}

impl ChunkConsumer for HashAccumulator {
    fn consume(&mut self, chunk: &[u8]) -> Result<()> {
        match self.hasher.as_mut() {
            Some(hasher) => {
                hasher.process(chunk);
                Ok(())
            }
            None => Err(ImagerError::config("hash already finalized")),
        }
    }

    fn finish(&mut self) -> Result<()> {
        if let Some(hasher) = self.hasher.take() {
            self.result = Some(hasher.finalize());
        }
        Ok(())
    }
}

/// Hash `total` bytes from `source`.
///
/// `None` when the transfer was cancelled or the source ran dry first.
pub fn checksum_with<S, P>(
    engine: &TransferEngine,
    source: &mut S,
    total: u64,
    algorithm: HashAlgorithm,
    cancel: &CancellationToken,
    progress: &P,
) -> Result<Option<HashResult>>
where
    S: ChunkSource + ?Sized,
    P: ProgressSink + ?Sized,
{
    let mut accumulator = HashAccumulator::new(algorithm);
    let completed = engine.run(&mut accumulator, source, total, cancel, progress)?;
    Ok(accumulator.into_result().filter(|_| completed))
}

/// Hash `total` bytes from a reader on the calling thread
pub fn checksum_stream<R, P>(
    engine: &TransferEngine,
    src: R,
    total: u64,
    algorithm: HashAlgorithm,
    cancel: &CancellationToken,
    progress: &P,
) -> Result<Option<HashResult>>
where
    R: Read,
    P: ProgressSink + ?Sized,
{
    let mut source = SyncChunkSource::new(src, total);
    checksum_with(engine, &mut source, total, algorithm, cancel, progress)
}

/// Checksum operation result
#[derive(Debug, Clone)]
pub struct ChecksumReport {
    /// Hashed path
    pub path: PathBuf,
    /// Bytes requested
    pub total: u64,
    /// Digest, absent when cancelled or truncated
    pub result: Option<HashResult>,
    /// Total duration
    pub duration: Duration,
}

impl ChecksumReport {
    /// Whether a digest was produced
    pub fn completed(&self) -> bool {
        self.result.is_some()
    }

    /// Check the digest against an expected hex value
    pub fn verify(&self, expected: &str) -> Result<()> {
        match &self.result {
            Some(result) if result.matches_hex(expected) => Ok(()),
            Some(result) => Err(ImagerError::integrity_mismatch(
                &self.path,
                expected.trim().to_lowercase(),
                result.hash.clone(),
            )),
            None => Err(ImagerError::Cancelled),
        }
    }
}

/// Hash an image file or device.
///
/// `size` of `None` hashes the whole readable length of the source.
pub fn checksum_image<P>(
    path: &Path,
    size: Option<u64>,
    algorithm: HashAlgorithm,
    config: &TransferConfig,
    cancel: &CancellationToken,
    progress: &P,
) -> Result<ChecksumReport>
where
    P: ProgressSink + ?Sized,
{
    let start = Instant::now();
    let source = ImageSource::open(path)?;
    let total = size.unwrap_or(source.read_size());

    tracing::info!("Hashing {} bytes of {:?} with {}", total, path, algorithm.name());

    let engine = TransferEngine::new().with_sample_interval(config.sample_interval());
    let mut chunks = source.into_chunk_source(total, config, cancel)?;
    let result = checksum_with(&engine, chunks.as_mut(), total, algorithm, cancel, progress)
        .map_err(|e| e.with_context(format!("hashing '{}'", path.display())))?;

    match &result {
        Some(r) => tracing::debug!("{} {} = {}", algorithm.name(), path.display(), r.hash),
        None => tracing::warn!("Checksum of {:?} did not complete", path),
    }

    Ok(ChecksumReport {
        path: path.to_path_buf(),
        total,
        result,
        duration: start.elapsed(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::hash_bytes;
    use crate::progress::NoProgress;
    use crate::transfer::ReadAheadSource;
    use std::io::Cursor;
    use tempfile::TempDir;

    fn pattern(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i * 7 % 251) as u8).collect()
    }

    #[test]
    fn test_checksum_matches_one_shot() {
        let data = pattern(150_000);
        let result = checksum_stream(
            &TransferEngine::new(),
            Cursor::new(&data),
            150_000,
            HashAlgorithm::Sha256,
            &CancellationToken::new(),
            &NoProgress,
        )
        .unwrap()
        .unwrap();

        assert_eq!(result, hash_bytes(&data, HashAlgorithm::Sha256));
    }

    #[test]
    fn test_checksum_is_deterministic_across_sources() {
        let data = pattern(500_000);
        let direct = checksum_stream(
            &TransferEngine::new(),
            Cursor::new(data.clone()),
            500_000,
            HashAlgorithm::Blake3,
            &CancellationToken::new(),
            &NoProgress,
        )
        .unwrap()
        .unwrap();

        let cancel = CancellationToken::new();
        let mut ahead = ReadAheadSource::spawn(Cursor::new(data), 500_000, cancel.clone()).unwrap();
        let buffered = checksum_with(
            &TransferEngine::new(),
            &mut ahead,
            500_000,
            HashAlgorithm::Blake3,
            &cancel,
            &NoProgress,
        )
        .unwrap()
        .unwrap();

        assert_eq!(direct.hash, buffered.hash);
    }

    #[test]
    fn test_bit_flip_changes_checksum() {
        let mut data = pattern(100_000);
        let run = |bytes: &[u8]| {
            checksum_stream(
                &TransferEngine::new(),
                Cursor::new(bytes.to_vec()),
                bytes.len() as u64,
                HashAlgorithm::Sha256,
                &CancellationToken::new(),
                &NoProgress,
            )
            .unwrap()
            .unwrap()
        };

        let clean = run(&data);
        data[77_777] ^= 0x80;
        assert_ne!(clean.hash, run(&data).hash);
    }

    #[test]
    fn test_cancelled_checksum_has_no_digest() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = checksum_stream(
            &TransferEngine::new(),
            Cursor::new(pattern(10_000)),
            10_000,
            HashAlgorithm::Sha256,
            &cancel,
            &NoProgress,
        )
        .unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_truncated_checksum_has_no_digest() {
        let result = checksum_stream(
            &TransferEngine::new(),
            Cursor::new(pattern(1_000)),
            5_000,
            HashAlgorithm::XXHash64,
            &CancellationToken::new(),
            &NoProgress,
        )
        .unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_accumulator_rejects_chunks_after_finish() {
        let mut acc = HashAccumulator::new(HashAlgorithm::Sha256);
        acc.consume(b"abc").unwrap();
        acc.finish().unwrap();
        assert_eq!(acc.bytes_processed(), 3);
        assert!(acc.consume(b"more").is_err());
        assert_eq!(
            acc.into_result().unwrap().hash,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_checksum_image_and_verify() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("disk.img");
        let data = pattern(200_000);
        std::fs::write(&path, &data).unwrap();
        let expected = hash_bytes(&data, HashAlgorithm::Sha512).hash;

        for read_ahead in [false, true] {
            let config = TransferConfig {
                read_ahead,
                ..Default::default()
            };
            let report = checksum_image(
                &path,
                None,
                HashAlgorithm::Sha512,
                &config,
                &CancellationToken::new(),
                &NoProgress,
            )
            .unwrap();

            assert!(report.completed());
            assert_eq!(report.total, 200_000);
            assert!(report.verify(&expected.to_uppercase()).is_ok());
            assert!(matches!(
                report.verify("00"),
                Err(ImagerError::IntegrityMismatch { .. })
            ));
        }
    }

    #[test]
    fn test_checksum_image_prefix() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("disk.img");
        let data = pattern(50_000);
        std::fs::write(&path, &data).unwrap();

        let report = checksum_image(
            &path,
            Some(1_000),
            HashAlgorithm::Sha256,
            &TransferConfig::default(),
            &CancellationToken::new(),
            &NoProgress,
        )
        .unwrap();

        assert_eq!(report.result.unwrap(), hash_bytes(&data[..1_000], HashAlgorithm::Sha256));
    }
}
