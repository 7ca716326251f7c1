//! discover-shapes - Shape discovery for CoreML model assemblies.
//!
//! Analyzes one model directory (`--model-dir`) or every model directory
//! below a root (`--scan-directory`) and writes one JSON configuration per
//! directory.

use anyhow::{Context, Result};
use clap::{ArgGroup, Parser};
use shapes_core::persist::{config_path_in, default_config_path, default_output_dir};
use shapes_core::{discover, discover_all, write_config, CoreMlReader};
use std::path::{Path, PathBuf};
use tracing::{error, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser, Debug)]
#[command(name = "discover-shapes")]
#[command(about = "Discover tensor shapes of multi-component CoreML models")]
#[command(group(
    ArgGroup::new("mode")
        .required(true)
        .args(["model_dir", "scan_directory"])
))]
struct Args {
    /// Path to a single model directory to analyze
    #[arg(long, value_name = "DIR")]
    model_dir: Option<PathBuf>,

    /// Path to a directory to scan for model subdirectories
    #[arg(long, value_name = "DIR")]
    scan_directory: Option<PathBuf>,

    /// Output file path (single model; defaults to <dir name>-config.json)
    #[arg(long, value_name = "FILE", conflicts_with = "scan_directory")]
    output: Option<PathBuf>,

    /// Output directory path (directory scan; defaults to configs)
    #[arg(long, value_name = "DIR", conflicts_with = "model_dir")]
    output_dir: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Set up logging
    FmtSubscriber::builder()
        .with_env_filter(log_filter(args.verbose))
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .init();

    match (&args.model_dir, &args.scan_directory) {
        (Some(model_dir), _) => run_single(model_dir, args.output),
        (None, Some(scan_dir)) => run_scan(scan_dir, args.output_dir),
        (None, None) => anyhow::bail!("either --model-dir or --scan-directory is required"),
    }
}

/// `--verbose` forces debug output; otherwise `RUST_LOG` applies, defaulting to warn.
fn log_filter(verbose: bool) -> EnvFilter {
    if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    }
}

fn run_single(model_dir: &Path, output: Option<PathBuf>) -> Result<()> {
    let result = discover(model_dir, &CoreMlReader)
        .with_context(|| format!("Failed to discover shapes in {}", model_dir.display()))?;

    let output_path = output.unwrap_or_else(|| default_config_path(model_dir));
    write_config(&output_path, &result)
        .with_context(|| format!("Failed to write {}", output_path.display()))?;

    // User-facing result line (intentional stdout)
    println!("Configuration saved to: {}", output_path.display());
    Ok(())
}

fn run_scan(scan_dir: &Path, output_dir: Option<PathBuf>) -> Result<()> {
    let results = discover_all(scan_dir, &CoreMlReader)
        .with_context(|| format!("Failed to scan {}", scan_dir.display()))?;

    if results.is_empty() {
        warn!("No model directories found in: {}", scan_dir.display());
        return Ok(());
    }

    let output_dir = output_dir.unwrap_or_else(default_output_dir);
    let mut failed = 0usize;
    for result in &results {
        let output_path = config_path_in(&output_dir, &result.model_info.path);
        match write_config(&output_path, result) {
            Ok(()) => println!("Configuration saved to: {}", output_path.display()),
            Err(e) => {
                error!("Failed to write {}: {}", output_path.display(), e);
                failed += 1;
            }
        }
    }

    println!("Processed {} model directories", results.len() - failed);
    if failed > 0 {
        anyhow::bail!("{} configuration(s) could not be written", failed);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;

    #[test]
    fn test_single_mode_args() {
        let args = Args::try_parse_from([
            "discover-shapes",
            "--model-dir",
            "models/qwen",
            "--output",
            "out.json",
            "-v",
        ])
        .unwrap();
        assert_eq!(args.model_dir, Some(PathBuf::from("models/qwen")));
        assert_eq!(args.output, Some(PathBuf::from("out.json")));
        assert!(args.verbose);
    }

    #[test]
    fn test_scan_mode_args() {
        let args =
            Args::try_parse_from(["discover-shapes", "--scan-directory", "models"]).unwrap();
        assert_eq!(args.scan_directory, Some(PathBuf::from("models")));
        assert!(args.output_dir.is_none());
        assert!(!args.verbose);
    }

    #[test]
    fn test_verbose_forces_debug_filter() {
        assert_eq!(log_filter(true).to_string(), "debug");
    }

    #[test]
    fn test_mode_is_required() {
        let err = Args::try_parse_from(["discover-shapes"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn test_modes_are_exclusive() {
        let err = Args::try_parse_from([
            "discover-shapes",
            "--model-dir",
            "a",
            "--scan-directory",
            "b",
        ])
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ArgumentConflict);
    }

    #[test]
    fn test_output_flags_follow_mode() {
        let err = Args::try_parse_from([
            "discover-shapes",
            "--scan-directory",
            "models",
            "--output",
            "out.json",
        ])
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ArgumentConflict);

        let err = Args::try_parse_from([
            "discover-shapes",
            "--model-dir",
            "models/qwen",
            "--output-dir",
            "configs",
        ])
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ArgumentConflict);
    }
}
