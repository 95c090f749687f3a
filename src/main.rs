//! DiskImager CLI - clone and checksum raw disk images
//!
//! Thin front end over the library: parses arguments, wires Ctrl+C to a
//! cancellation token and presents progress.

use clap::Parser;
use diskimager::config::{parse_size, CliArgs, Commands, HashAlgorithm, OutputFormat, TransferConfig};
use diskimager::core::{checksum_image, clone_image};
use diskimager::error::{ImagerError, Result};
use diskimager::image::{preflight, read_size, write_size, SizeCheck};
use diskimager::progress::{JsonProgress, LogProgress, ProgressReporter, ProgressSink};
use diskimager::transfer::CancellationToken;
use std::io::IsTerminal;
use std::path::Path;
use tracing_subscriber::EnvFilter;

/// Exit status for a checksum that differs from `--expect`
const EXIT_MISMATCH: i32 = 2;

fn main() {
    let args = CliArgs::parse();

    init_logging(&args);

    match run(&args) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("Error: {}", e);
            if e.is_permission_error() {
                eprintln!("Raw device access usually needs root privileges.");
            }
            std::process::exit(1);
        }
    }
}

/// Initialize logging; `-v` overrides `RUST_LOG`
fn init_logging(args: &CliArgs) {
    let filter = match args.verbose {
        0 if args.quiet => EnvFilter::new("error"),
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    match args.output {
        OutputFormat::Json => builder.json().init(),
        OutputFormat::Text => builder.init(),
    }
}

fn run(args: &CliArgs) -> Result<i32> {
    let mut config = match &args.config {
        Some(path) => TransferConfig::load(path)?,
        None => TransferConfig::default(),
    };

    match &args.command {
        Commands::Clone {
            source,
            destination,
            size,
            read_ahead,
            force,
            interval,
        } => {
            apply_overrides(&mut config, *read_ahead, *interval);
            let size = size.as_deref().map(parse_cli_size).transpose()?;
            cmd_clone(args, &config, source, destination, size, *force)
        }
        Commands::Checksum {
            source,
            algorithm,
            size,
            expect,
            read_ahead,
            interval,
        } => {
            apply_overrides(&mut config, *read_ahead, *interval);
            let size = size.as_deref().map(parse_cli_size).transpose()?;
            let algorithm = algorithm.unwrap_or(config.algorithm);
            cmd_checksum(args, &config, source, size, algorithm, expect.as_deref())
        }
        Commands::Info { path } => cmd_info(args, path),
    }
}

fn apply_overrides(config: &mut TransferConfig, read_ahead: bool, interval: Option<u64>) {
    config.read_ahead |= read_ahead;
    if let Some(ms) = interval {
        config.sample_interval_ms = ms;
    }
}

fn parse_cli_size(size: &str) -> Result<u64> {
    parse_size(size).map_err(ImagerError::config)
}

/// Cancel `token` when Ctrl+C is pressed.
///
/// The signal is awaited on a small tokio runtime owned by a helper thread,
/// so the transfer itself stays synchronous.
fn cancel_on_ctrl_c(token: &CancellationToken) {
    let token = token.clone();
    let spawned = std::thread::Builder::new()
        .name("ctrl-c".into())
        .spawn(move || {
            let rt = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
                Ok(rt) => rt,
                Err(e) => {
                    tracing::warn!("Ctrl+C handler unavailable: {}", e);
                    return;
                }
            };
            rt.block_on(async {
                if tokio::signal::ctrl_c().await.is_ok() {
                    eprintln!("\nCancelling...");
                    token.cancel();
                }
            });
        });

    if let Err(e) = spawned {
        tracing::warn!("Failed to start Ctrl+C handler: {}", e);
    }
}

/// Progress presentation for the chosen output mode
enum Presenter {
    Bar(ProgressReporter),
    Json(JsonProgress<std::io::Stdout>),
    Log(LogProgress),
}

impl Presenter {
    fn new(args: &CliArgs, label: &str) -> Self {
        match args.output {
            OutputFormat::Json => Self::Json(JsonProgress::new(std::io::stdout())),
            OutputFormat::Text if args.quiet => Self::Bar(ProgressReporter::disabled()),
            OutputFormat::Text if !std::io::stderr().is_terminal() => Self::Log(LogProgress::new()),
            OutputFormat::Text => Self::Bar(ProgressReporter::new(label)),
        }
    }

    fn sink(&self) -> &dyn ProgressSink {
        match self {
            Self::Bar(bar) => bar,
            Self::Json(json) => json,
            Self::Log(log) => log,
        }
    }

    fn finish(&self, completed: bool) {
        if let Self::Bar(bar) = self {
            if completed {
                bar.finish_success("done");
            } else {
                bar.finish_error("incomplete");
            }
        }
    }
}

fn cmd_clone(
    args: &CliArgs,
    config: &TransferConfig,
    source: &Path,
    destination: &Path,
    size: Option<u64>,
    force: bool,
) -> Result<i32> {
    let required = match size {
        Some(size) => size,
        None => read_size(source)?,
    };

    match preflight(required, write_size(destination)) {
        SizeCheck::Fits => {}
        SizeCheck::TooSmall { required, available } if !force => {
            return Err(ImagerError::DestinationTooSmall {
                path: destination.to_path_buf(),
                required,
                available,
            });
        }
        SizeCheck::TooSmall { required, available } => {
            tracing::warn!(
                "Destination {:?} looks too small ({} < {} bytes), continuing (--force)",
                destination,
                available,
                required
            );
        }
        SizeCheck::Unknown => {
            tracing::warn!("Cannot determine the capacity of {:?}", destination);
        }
    }

    let cancel = CancellationToken::new();
    cancel_on_ctrl_c(&cancel);

    let presenter = Presenter::new(args, "Clone");
    let result = clone_image(source, destination, Some(required), config, &cancel, presenter.sink());
    presenter.finish(result.as_ref().map(|r| r.completed).unwrap_or(false));
    let result = result?;

    match args.output {
        OutputFormat::Json => {
            let record = serde_json::json!({
                "operation": "clone",
                "source": result.source,
                "destination": result.destination,
                "completed": result.completed,
                "total": result.total,
                "bytes_written": result.bytes_written,
                "duration_ms": result.duration.as_millis() as u64,
            });
            println!("{}", record);
        }
        OutputFormat::Text if !args.quiet => result.print_summary(),
        OutputFormat::Text => {}
    }

    if result.completed {
        Ok(0)
    } else {
        if cancel.is_cancelled() {
            eprintln!("Clone cancelled after {} bytes", result.bytes_written);
        } else {
            eprintln!("Source ended after {} of {} bytes", result.bytes_written, result.total);
        }
        Ok(1)
    }
}

fn cmd_checksum(
    args: &CliArgs,
    config: &TransferConfig,
    source: &Path,
    size: Option<u64>,
    algorithm: HashAlgorithm,
    expect: Option<&str>,
) -> Result<i32> {
    let cancel = CancellationToken::new();
    cancel_on_ctrl_c(&cancel);

    let presenter = Presenter::new(args, algorithm.name());
    let report = checksum_image(source, size, algorithm, config, &cancel, presenter.sink());
    presenter.finish(report.as_ref().map(|r| r.completed()).unwrap_or(false));
    let report = report?;

    let Some(result) = &report.result else {
        if cancel.is_cancelled() {
            eprintln!("Checksum cancelled");
        } else {
            eprintln!("Source ended before {} bytes were hashed", report.total);
        }
        return Ok(1);
    };

    let matches = expect.map(|hex| result.matches_hex(hex));
    match args.output {
        OutputFormat::Json => {
            let record = serde_json::json!({
                "operation": "checksum",
                "path": report.path,
                "algorithm": result.algorithm,
                "hash": result.hash,
                "size": result.size,
                "duration_ms": report.duration.as_millis() as u64,
                "matches": matches,
            });
            println!("{}", record);
        }
        OutputFormat::Text => {
            println!("{}  {}", result.hash, report.path.display());
            if let Some(matches) = matches {
                if !args.quiet {
                    println!("Match: {}", if matches { "YES ✓" } else { "NO ✗" });
                }
            }
        }
    }

    let Some(expected) = expect else {
        return Ok(0);
    };
    match report.verify(expected) {
        Ok(()) => Ok(0),
        Err(e @ ImagerError::IntegrityMismatch { .. }) => {
            tracing::error!("{}", e);
            Ok(EXIT_MISMATCH)
        }
        Err(e) => Err(e),
    }
}

fn cmd_info(args: &CliArgs, path: &Path) -> Result<i32> {
    let readable = read_size(path).ok();
    let writable = write_size(path);

    match args.output {
        OutputFormat::Json => {
            let record = serde_json::json!({
                "path": path,
                "read_size": readable,
                "write_size": writable,
            });
            println!("{}", record);
        }
        OutputFormat::Text => {
            let show = |size: Option<u64>| match size {
                Some(s) => format!("{} ({} bytes)", humansize::format_size(s, humansize::BINARY), s),
                None => "unknown".to_string(),
            };
            println!("=== {} ===", path.display());
            println!("Readable: {}", show(readable));
            println!("Writable: {}", show(writable));
        }
    }

    if readable.is_none() && writable.is_none() {
        return Err(ImagerError::UnknownSize(path.to_path_buf()));
    }
    Ok(0)
}
