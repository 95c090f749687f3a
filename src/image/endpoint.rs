//! Image and device endpoints
//!
//! Opens raw image files or block devices as byte sources and sinks, and
//! works out how many bytes can be read from or written to them. Handles
//! are closed on drop, so every exit path releases them.

use crate::config::TransferConfig;
use crate::error::{ImagerError, IoResultExt, Result};
use crate::transfer::{CancellationToken, ChunkSource, ReadAheadSource, SyncChunkSource};
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Readable image file or block device
pub struct ImageSource {
    path: PathBuf,
    file: File,
    size: u64,
}

impl ImageSource {
    /// Open `path` for reading and probe its length
    pub fn open(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(ImagerError::NotFound(path.to_path_buf()));
        }
        let mut file = File::open(path).with_path(path)?;
        let size = probe_size(&mut file, path)?;
        tracing::debug!("Opened source {:?} ({} bytes)", path, size);

        Ok(Self {
            path: path.to_path_buf(),
            file,
            size,
        })
    }

    /// Number of readable bytes
    pub fn read_size(&self) -> u64 {
        self.size
    }

    /// Path this source was opened from
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Turn this source into a chunk source yielding at most `total` bytes,
    /// reading on a background thread when `config.read_ahead` is set
    pub fn into_chunk_source(
        self,
        total: u64,
        config: &TransferConfig,
        cancel: &CancellationToken,
    ) -> Result<Box<dyn ChunkSource>> {
        if config.read_ahead {
            Ok(Box::new(ReadAheadSource::spawn(self, total, cancel.clone())?))
        } else {
            Ok(Box::new(SyncChunkSource::with_chunk_size(self, total, config.chunk_size)))
        }
    }
}

impl Read for ImageSource {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.file.read(buf)
    }
}

/// Writable image file or block device
pub struct ImageSink {
    path: PathBuf,
    file: File,
}

impl ImageSink {
    /// Open `path` for writing.
    ///
    /// Existing block devices are written in place; regular files are
    /// created or truncated.
    pub fn create(path: &Path) -> Result<Self> {
        let is_device = path.exists() && !path.metadata().with_path(path)?.is_file();
        let file = if is_device {
            OpenOptions::new().write(true).open(path)
        } else {
            OpenOptions::new().write(true).create(true).truncate(true).open(path)
        }
        .with_path(path)?;
        tracing::debug!("Opened destination {:?} (device: {})", path, is_device);

        Ok(Self {
            path: path.to_path_buf(),
            file,
        })
    }

    /// Path this sink was opened at
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Write for ImageSink {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.file.write(buf)
    }

    /// Flushes and waits for the data to reach the device
    fn flush(&mut self) -> std::io::Result<()> {
        self.file.flush()?;
        self.file.sync_all()
    }
}

/// Length of an open file or device.
///
/// Block devices report a zero metadata length, so fall back to seeking to
/// the end and rewinding.
fn probe_size(file: &mut File, path: &Path) -> Result<u64> {
    let metadata = file.metadata().with_path(path)?;
    if metadata.is_file() {
        return Ok(metadata.len());
    }
    if metadata.is_dir() {
        return Err(ImagerError::UnknownSize(path.to_path_buf()));
    }
    let size = file.seek(SeekFrom::End(0)).with_path(path)?;
    file.seek(SeekFrom::Start(0)).with_path(path)?;
    Ok(size)
}

/// Readable length of `path`
pub fn read_size(path: &Path) -> Result<u64> {
    ImageSource::open(path).map(|s| s.read_size())
}

/// How many bytes can be written at `path`.
///
/// For a block device this is its length. For an image file it is the free
/// space of the filesystem holding it plus whatever the file already
/// occupies, since it will be truncated. `None` when it cannot be told.
pub fn write_size(path: &Path) -> Option<u64> {
    if let Ok(metadata) = path.metadata() {
        if !metadata.is_file() && !metadata.is_dir() {
            let mut file = File::open(path).ok()?;
            return probe_size(&mut file, path).ok();
        }
    }

    let existing = path.metadata().ok().filter(|m| m.is_file()).map(|m| m.len()).unwrap_or(0);
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => std::env::current_dir().ok()?,
    };
    let parent = parent.canonicalize().ok()?;
    available_space(&parent).map(|free| free.saturating_add(existing))
}

/// Free space on the mounted filesystem containing `path`
fn available_space(path: &Path) -> Option<u64> {
    use sysinfo::Disks;

    let disks = Disks::new_with_refreshed_list();

    // Longest mount point that prefixes the path wins
    let mut best_match: Option<&sysinfo::Disk> = None;
    let mut best_len = 0;

    for disk in disks.iter() {
        let mount = disk.mount_point();
        let len = mount.as_os_str().len();
        if path.starts_with(mount) && len >= best_len {
            best_match = Some(disk);
            best_len = len;
        }
    }

    best_match.map(|disk| disk.available_space())
}

/// Outcome of comparing a source length with a destination capacity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeCheck {
    /// The destination can hold the source
    Fits,
    /// The destination is smaller than the source
    TooSmall {
        /// Bytes to be written
        required: u64,
        /// Bytes the destination can take
        available: u64,
    },
    /// Destination capacity unknown
    Unknown,
}

/// Compare the bytes to write with what the destination can take
pub fn preflight(required: u64, available: Option<u64>) -> SizeCheck {
    match available {
        None => SizeCheck::Unknown,
        Some(available) if required > available => SizeCheck::TooSmall { required, available },
        Some(_) => SizeCheck::Fits,
    }
}

/// Refuse to clone a path onto itself
pub fn ensure_distinct(source: &Path, destination: &Path) -> Result<()> {
    let src = source.canonicalize().with_path(source)?;
    if let Ok(dst) = destination.canonicalize() {
        if src == dst {
            return Err(ImagerError::SameSourceAndDestination(src));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_source_reports_file_size() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("disk.img");
        std::fs::write(&path, vec![0xAAu8; 12_345]).unwrap();

        let mut source = ImageSource::open(&path).unwrap();
        assert_eq!(source.read_size(), 12_345);

        let mut data = Vec::new();
        source.read_to_end(&mut data).unwrap();
        assert_eq!(data.len(), 12_345);
    }

    #[test]
    fn test_missing_source() {
        let dir = TempDir::new().unwrap();
        let err = ImageSource::open(&dir.path().join("nope.img")).err().unwrap();
        assert!(matches!(err, ImagerError::NotFound(_)));
    }

    #[test]
    fn test_sink_truncates_regular_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.img");
        std::fs::write(&path, vec![1u8; 100]).unwrap();

        let mut sink = ImageSink::create(&path).unwrap();
        sink.write_all(b"abc").unwrap();
        sink.flush().unwrap();
        drop(sink);

        assert_eq!(std::fs::read(&path).unwrap(), b"abc");
    }

    #[test]
    fn test_preflight() {
        assert_eq!(preflight(10, Some(10)), SizeCheck::Fits);
        assert_eq!(
            preflight(11, Some(10)),
            SizeCheck::TooSmall { required: 11, available: 10 }
        );
        assert_eq!(preflight(11, None), SizeCheck::Unknown);
    }

    #[test]
    fn test_ensure_distinct() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a.img");
        std::fs::write(&a, b"x").unwrap();

        assert!(ensure_distinct(&a, &dir.path().join("b.img")).is_ok());
        assert!(matches!(
            ensure_distinct(&a, &dir.path().join(".").join("a.img")),
            Err(ImagerError::SameSourceAndDestination(_))
        ));
    }

    #[test]
    fn test_write_size_counts_existing_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("old.img");
        std::fs::write(&path, vec![0u8; 4096]).unwrap();

        if let Some(capacity) = write_size(&path) {
            assert!(capacity >= 4096);
        }
    }
}
