use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::AtomicBool;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use pdf_target_compressor::config::BYTES_PER_MB;
use pdf_target_compressor::{compress_file, CompressionConfig, SearchOutcome};

/// Shrink a PDF below a target size by re-rendering its pages
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Input PDF file
    input: PathBuf,

    /// Output PDF file (defaults to compressedfinal_<input name>)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Size ceiling in MB
    #[arg(long, default_value_t = 4.0)]
    max_size_mb: f64,

    /// Initial JPEG quality
    #[arg(long, default_value_t = 90)]
    quality: u8,

    /// Initial page scale factor
    #[arg(long, default_value_t = 0.5)]
    scale_factor: f64,

    /// Fraction below the ceiling accepted as close enough
    #[arg(long, default_value_t = 0.1)]
    tolerance: f64,

    #[arg(long, default_value_t = 0.1)]
    min_scale: f64,

    #[arg(long, default_value_t = 1.0)]
    max_scale: f64,

    #[arg(long, default_value_t = 10)]
    min_quality: u8,

    #[arg(long, default_value_t = 100)]
    max_quality: u8,

    /// Resolution pages are rendered at before scaling
    #[arg(long, default_value_t = 200.0)]
    dpi: f32,

    #[arg(long, default_value_t = 50)]
    max_iterations: usize,

    /// Keep the JPEG quality fixed and only adjust the scale factor
    #[arg(long)]
    fixed_quality: bool,

    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Args {
    fn config(&self) -> CompressionConfig {
        CompressionConfig {
            max_size_mb: self.max_size_mb,
            tolerance: self.tolerance,
            initial_scale: self.scale_factor,
            initial_quality: self.quality,
            min_scale: self.min_scale,
            max_scale: self.max_scale,
            min_quality: self.min_quality,
            max_quality: self.max_quality,
            adjust_quality: !self.fixed_quality,
            max_iterations: self.max_iterations,
            render_dpi: self.dpi,
            ..Default::default()
        }
    }
}

fn main() -> Result<ExitCode> {
    let args = Args::parse();

    env_logger::Builder::new()
        .filter_level(match args.verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            _ => log::LevelFilter::Debug,
        })
        .init();

    println!("Compressing PDF: {:?}", args.input);
    let start = Instant::now();
    let cancel = AtomicBool::new(false);

    let report = compress_file(
        &args.input,
        args.output.as_deref(),
        args.config(),
        &cancel,
        |result| {
            println!(
                "Current file size: {:.2} MB with {}",
                result.size_mb(),
                result.parameters
            )
        },
    )
    .with_context(|| format!("Failed to compress {}", args.input.display()))?;

    println!("Finished in {:.2?}", start.elapsed());
    println!(
        "Original size: {:.2} MB",
        report.original_size_bytes as f64 / BYTES_PER_MB
    );

    match (&report.outcome, &report.output_path) {
        (SearchOutcome::Exhausted { smallest_size_bytes, .. }, _) => {
            eprintln!("Unable to compress further without severe quality loss.");
            if let Some(smallest) = smallest_size_bytes {
                eprintln!(
                    "Smallest size reached: {:.2} MB (target {:.2} MB)",
                    *smallest as f64 / BYTES_PER_MB,
                    args.max_size_mb
                );
            }
            Ok(ExitCode::FAILURE)
        }
        (outcome, Some(path)) => {
            if let SearchOutcome::BestAvailable { reason, .. } = outcome {
                println!("Stopped before reaching the tolerance band: {}", reason);
            }
            if let Some(best) = outcome.result() {
                println!("Final compressed PDF saved as {}", path.display());
                println!("File size: {:.2} MB", best.size_mb());
                println!("Final {}", best.parameters);
            }
            Ok(ExitCode::SUCCESS)
        }
        (_, None) => Ok(ExitCode::FAILURE),
    }
}
