//! Configuration settings for DiskImager
//!
//! Defines the CLI arguments, the runtime transfer configuration and its
//! defaults.

use crate::error::{ImagerError, IoResultExt, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// DiskImager - clone and checksum raw disk images
#[derive(Parser, Debug, Clone)]
#[command(name = "diskimager")]
#[command(author = "DiskImager Team")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Clone and checksum raw disk images and block devices")]
#[command(long_about = r#"
DiskImager copies raw bytes between disk images and block devices, or
computes a checksum of them, with live throughput reporting.

Examples:
  diskimager clone sdcard.img /dev/sdb           # Write an image to a card
  diskimager clone /dev/sdb backup.img           # Back up a card
  diskimager checksum backup.img --algorithm sha512
  diskimager info /dev/sdb                       # Show readable/writable size

Press Ctrl+C to cancel a running transfer.
"#)]
pub struct CliArgs {
    /// Verbose output (can be repeated: -v, -vv, -vvv)
    #[arg(short = 'v', long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (suppress progress and summaries)
    #[arg(short = 'q', long, global = true)]
    pub quiet: bool,

    /// Output format for progress and results
    #[arg(long, value_enum, default_value = "text", global = true)]
    pub output: OutputFormat,

    /// JSON file with transfer defaults
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Subcommand
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Copy raw bytes from a source image or device to a destination
    #[command(name = "clone")]
    Clone {
        /// Source image file or block device
        source: PathBuf,
        /// Destination image file or block device
        destination: PathBuf,
        /// Number of bytes to copy (e.g. 4G); defaults to the source size
        #[arg(long, value_name = "SIZE")]
        size: Option<String>,
        /// Read ahead of the writer on a background thread
        #[arg(long)]
        read_ahead: bool,
        /// Proceed even when the destination looks too small
        #[arg(short, long)]
        force: bool,
        /// Milliseconds between progress samples
        #[arg(long, value_name = "MS")]
        interval: Option<u64>,
    },

    /// Compute a checksum of an image or device
    #[command(name = "checksum")]
    Checksum {
        /// Image file or block device
        source: PathBuf,
        /// Hash algorithm
        #[arg(short, long, value_enum)]
        algorithm: Option<HashAlgorithm>,
        /// Number of bytes to hash (e.g. 4G); defaults to the source size
        #[arg(long, value_name = "SIZE")]
        size: Option<String>,
        /// Expected digest (hex); exit with status 2 on mismatch
        #[arg(long, value_name = "HEX")]
        expect: Option<String>,
        /// Read ahead of the hasher on a background thread
        #[arg(long)]
        read_ahead: bool,
        /// Milliseconds between progress samples
        #[arg(long, value_name = "MS")]
        interval: Option<u64>,
    },

    /// Show the readable and writable size of an image or device
    #[command(name = "info")]
    Info {
        /// Image file or block device
        path: PathBuf,
    },
}

/// Hash algorithm for checksums
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    /// SHA-256 - Standard cryptographic hash
    #[default]
    #[value(name = "sha256")]
    Sha256,
    /// SHA-384
    #[value(name = "sha384")]
    Sha384,
    /// SHA-512
    #[value(name = "sha512")]
    Sha512,
    /// BLAKE3 - Fast and cryptographically secure
    #[value(name = "blake3")]
    Blake3,
    /// XXHash3 - Ultra fast, non-cryptographic (128-bit)
    #[value(name = "xxhash3")]
    XXHash3,
    /// XXHash64 - Fast, non-cryptographic (64-bit)
    #[value(name = "xxhash64")]
    XXHash64,
}

impl HashAlgorithm {
    /// Get the output size in bytes
    pub fn output_size(&self) -> usize {
        match self {
            Self::XXHash3 => 16,
            Self::XXHash64 => 8,
            Self::Blake3 => 32,
            Self::Sha256 => 32,
            Self::Sha384 => 48,
            Self::Sha512 => 64,
        }
    }

    /// Get human-readable name
    pub fn name(&self) -> &'static str {
        match self {
            Self::XXHash3 => "XXHash3",
            Self::XXHash64 => "XXHash64",
            Self::Blake3 => "BLAKE3",
            Self::Sha256 => "SHA-256",
            Self::Sha384 => "SHA-384",
            Self::Sha512 => "SHA-512",
        }
    }
}

/// Output format for progress and results
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Progress bar and human-readable text
    #[default]
    Text,
    /// One JSON object per progress sample and result
    Json,
}

/// Runtime transfer settings shared by clone and checksum
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferConfig {
    /// Milliseconds between progress samples
    pub sample_interval_ms: u64,
    /// Read chunk size in bytes (direct reads only; the read-ahead ring
    /// always uses 64 KiB slots)
    pub chunk_size: usize,
    /// Use the background read-ahead source
    pub read_ahead: bool,
    /// Default checksum algorithm
    pub algorithm: HashAlgorithm,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            sample_interval_ms: 100,
            chunk_size: 64 * 1024,
            read_ahead: false,
            algorithm: HashAlgorithm::Sha256,
        }
    }
}

impl TransferConfig {
    /// Load settings from a JSON file; missing fields keep their defaults
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path).with_path(path)?;
        let config: Self = serde_json::from_str(&json)
            .map_err(|e| ImagerError::config(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the engine cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(ImagerError::config("chunk_size must be greater than zero"));
        }
        Ok(())
    }

    /// Sample interval as a duration
    pub fn sample_interval(&self) -> Duration {
        Duration::from_millis(self.sample_interval_ms)
    }
}

/// Parse a human-readable size ("512", "64K", "1.5G", "4GB")
pub fn parse_size(size: &str) -> std::result::Result<u64, String> {
    let size = size.trim().to_uppercase();

    let (num_str, multiplier) = if size.ends_with("TB") || size.ends_with('T') {
        (size.trim_end_matches(|c| c == 'T' || c == 'B'), 1024u64 * 1024 * 1024 * 1024)
    } else if size.ends_with("GB") || size.ends_with('G') {
        (size.trim_end_matches(|c| c == 'G' || c == 'B'), 1024u64 * 1024 * 1024)
    } else if size.ends_with("MB") || size.ends_with('M') {
        (size.trim_end_matches(|c| c == 'M' || c == 'B'), 1024u64 * 1024)
    } else if size.ends_with("KB") || size.ends_with('K') {
        (size.trim_end_matches(|c| c == 'K' || c == 'B'), 1024u64)
    } else if size.ends_with('B') {
        (size.trim_end_matches('B'), 1u64)
    } else {
        (size.as_str(), 1u64)
    };

    let num: f64 = num_str
        .trim()
        .parse()
        .map_err(|_| format!("Invalid number: {}", num_str))?;
    if !num.is_finite() || num < 0.0 {
        return Err(format!("Invalid size: {}", size));
    }

    Ok((num * multiplier as f64) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_size() {
        assert_eq!(parse_size("1024").unwrap(), 1024);
        assert_eq!(parse_size("1K").unwrap(), 1024);
        assert_eq!(parse_size("1KB").unwrap(), 1024);
        assert_eq!(parse_size("64k").unwrap(), 64 * 1024);
        assert_eq!(parse_size("1M").unwrap(), 1024 * 1024);
        assert_eq!(parse_size("1G").unwrap(), 1024 * 1024 * 1024);
        assert_eq!(parse_size("1.5G").unwrap(), (1.5 * 1024.0 * 1024.0 * 1024.0) as u64);
        assert!(parse_size("lots").is_err());
        assert!(parse_size("-1M").is_err());
    }

    #[test]
    fn test_hash_algorithm() {
        assert_eq!(HashAlgorithm::default(), HashAlgorithm::Sha256);
        assert_eq!(HashAlgorithm::Sha512.output_size(), 64);
        assert_eq!(HashAlgorithm::Blake3.name(), "BLAKE3");
    }

    #[test]
    fn test_config_load_partial_json() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("diskimager.json");
        std::fs::write(&path, r#"{ "read_ahead": true, "algorithm": "blake3" }"#).unwrap();

        let config = TransferConfig::load(&path).unwrap();
        assert!(config.read_ahead);
        assert_eq!(config.algorithm, HashAlgorithm::Blake3);
        assert_eq!(config.sample_interval(), Duration::from_millis(100));
    }

    #[test]
    fn test_config_rejects_zero_chunk() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, r#"{ "chunk_size": 0 }"#).unwrap();
        assert!(matches!(TransferConfig::load(&path), Err(ImagerError::ConfigError(_))));
    }

    #[test]
    fn test_cli_parses_clone() {
        let args = CliArgs::try_parse_from([
            "diskimager", "clone", "a.img", "/dev/sdb", "--size", "4G", "--read-ahead", "-f",
        ])
        .unwrap();
        match args.command {
            Commands::Clone { size, read_ahead, force, .. } => {
                assert_eq!(size.as_deref(), Some("4G"));
                assert!(read_ahead);
                assert!(force);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }
}
