//! `voice-quality`: command-line entry point.
//!
//! Provides the following subcommands:
//!
//! - `voice-quality calibrate` -- Build a baseline profile from a clean reference.
//! - `voice-quality analyze` -- Print the JSON event report of a recording.
//!
//! `calibrate` writes to the platform profile directory unless `-o` is
//! given (see [`AppPaths`]).  Progress and the summary go through the logger
//! (`RUST_LOG`, or `--verbose` for debug level).

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use voice_quality::{
    audio::read_wav,
    calibration::{BaselineProfile, Calibrator},
    config::{AnalyzerConfig, AppPaths},
    pipeline::Analyzer,
};

/// Voice quality analysis against a calibrated reference.
#[derive(Parser)]
#[command(name = "voice-quality", about = "Voice quality analysis", version)]
struct Cli {
    /// Enable verbose (debug-level) logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Settings file (defaults to the platform settings.toml).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

/// Top-level subcommands.
#[derive(Subcommand)]
enum Command {
    /// Build a baseline profile from a clean reference recording.
    Calibrate {
        /// Reference WAV file.
        reference: PathBuf,

        /// Profile file to write.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Analyze a recording and print the JSON report.
    Analyze {
        /// WAV file to analyze.
        input: PathBuf,

        /// Baseline profile to compare against.
        #[arg(short, long)]
        profile: Option<PathBuf>,

        /// Treat every frame as voice-active.
        #[arg(long)]
        no_vad: bool,

        /// Add the whole-recording verdict to the report.
        #[arg(short, long)]
        global: bool,
    },
}

fn load_config(path: Option<&PathBuf>) -> Result<AnalyzerConfig> {
    match path {
        Some(path) => AnalyzerConfig::load_from(path)
            .with_context(|| format!("reading config {}", path.display())),
        None => Ok(AnalyzerConfig::load().unwrap_or_else(|e| {
            log::warn!("Failed to load config ({e}); using defaults");
            AnalyzerConfig::default()
        })),
    }
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

fn calibrate(config: AnalyzerConfig, reference: PathBuf, output: Option<PathBuf>) -> Result<()> {
    let (samples, sample_rate) = read_wav(&reference)?;

    let profile = Calibrator::new(&config).calibrate(&samples, sample_rate)?;
    let output = output.unwrap_or_else(|| AppPaths::new().default_profile_file);
    profile
        .save_to(&output)
        .with_context(|| format!("writing profile {}", output.display()))?;

    log::info!(
        "Baseline written to {} ({} frames, {:.1}s @ {} Hz)",
        output.display(),
        profile.frame_count,
        profile.duration_secs,
        profile.sample_rate
    );
    Ok(())
}

fn analyze(
    mut config: AnalyzerConfig,
    input: PathBuf,
    profile: Option<PathBuf>,
    no_vad: bool,
    global: bool,
) -> Result<()> {
    if no_vad {
        config.vad.enabled = false;
    }

    let profile = profile.unwrap_or_else(|| AppPaths::new().default_profile_file);
    let baseline = BaselineProfile::load_from(&profile).with_context(|| {
        format!(
            "reading profile {} (run `voice-quality calibrate` first)",
            profile.display()
        )
    })?;
    if global && baseline.global.is_none() {
        log::warn!(
            "Profile {} has no whole-recording descriptors; recalibrate to compare against it",
            profile.display()
        );
    }

    let (samples, sample_rate) = read_wav(&input)?;
    let mut analyzer = Analyzer::builder(config)
        .baseline(Arc::new(baseline))
        .build()?;

    let mut report = analyzer.analyze(&samples, sample_rate)?.to_report();
    if global {
        report = report.with_global(analyzer.analyze_global(&samples, sample_rate)?);
    }

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    let config = load_config(cli.config.as_ref())?;
    match cli.command {
        Command::Calibrate { reference, output } => calibrate(config, reference, output),
        Command::Analyze {
            input,
            profile,
            no_vad,
            global,
        } => analyze(config, input, profile, no_vad, global),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
