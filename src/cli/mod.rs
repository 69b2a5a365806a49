//! Command-line parsing for the double-slit coincidence analysis.
//!
//! The goal of this module is to keep **argument parsing** separate from the
//! pipeline: everything here ends in an [`ExperimentConfig`] or a
//! [`SynthSpec`], validated once.
//!
//! Every option can also be set through a `DSLIT_*` environment variable
//! (a `.env` file in the working directory is loaded first).

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::data::SynthSpec;
use crate::domain::{
    AnalysisOptions, DEFAULT_COUNTS_FILE, DEFAULT_INFO_FILE, ExperimentConfig, FitRegion,
    ModelVariant, ParamName, PathSettings, PhysicalConstants,
};
use crate::error::AppError;

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(
    name = "dslit",
    version,
    about = "Double-slit coincidence reduction and interference fit"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Load a scan, build the summary table, fit the pattern and write exports.
    Analyze(AnalyzeArgs),
    /// Load a scan and build the summary table only (never fits).
    Summarize(AnalyzeArgs),
    /// Write a synthetic scan in the measurement folder layout.
    Simulate(SimulateArgs),
    /// Print the theoretical visibility for the given setup.
    Visibility(PhysicsArgs),
}

/// Physical constants of the setup, in lab units.
#[derive(Debug, Args, Clone)]
pub struct PhysicsArgs {
    /// Wavelength (nm).
    #[arg(long, env = "DSLIT_WAVELENGTH_NM", default_value_t = 444.0)]
    pub wavelength_nm: f64,

    /// Slit-to-detector distance L (m).
    #[arg(long, env = "DSLIT_DISTANCE_M", default_value_t = 0.563)]
    pub distance_m: f64,

    /// Slit separation d (mm).
    #[arg(long, env = "DSLIT_SEPARATION_MM", default_value_t = 0.04)]
    pub separation_mm: f64,

    /// Slit width b (mm).
    #[arg(long, env = "DSLIT_WIDTH_MM", default_value_t = 0.02)]
    pub width_mm: f64,

    /// Pump beam waist w0 (mm), used for the theoretical visibility.
    #[arg(long, env = "DSLIT_BEAM_WAIST_MM", default_value_t = 0.064)]
    pub beam_waist_mm: f64,

    /// Source-to-slits distance z (m), used for the theoretical visibility.
    #[arg(long, env = "DSLIT_SOURCE_DISTANCE_M", default_value_t = 0.60)]
    pub source_distance_m: f64,

    /// Do not compute the theoretical visibility (ignore w0 and z).
    #[arg(long, env = "DSLIT_NO_THEORY")]
    pub no_theory: bool,
}

impl PhysicsArgs {
    pub fn to_constants(&self) -> PhysicalConstants {
        let (beam_waist_m, source_distance_m) = if self.no_theory {
            (None, None)
        } else {
            (Some(self.beam_waist_mm * 1e-3), Some(self.source_distance_m))
        };
        PhysicalConstants {
            wavelength_m: self.wavelength_nm * 1e-9,
            distance_m: self.distance_m,
            separation_m: self.separation_mm * 1e-3,
            width_m: self.width_mm * 1e-3,
            beam_waist_m,
            source_distance_m,
        }
    }
}

/// Options for `analyze` and `summarize`.
#[derive(Debug, Args, Clone)]
pub struct AnalyzeArgs {
    #[command(flatten)]
    pub physics: PhysicsArgs,

    /// Directory holding one sub-folder per detector position.
    #[arg(short = 'd', long, env = "DSLIT_DATA_DIR", default_value = "data")]
    pub data_dir: PathBuf,

    /// Directory for `summary.csv` and `fit.json`.
    #[arg(short = 'o', long, env = "DSLIT_OUTPUT_DIR", default_value = "output")]
    pub output_dir: PathBuf,

    /// Count table file name inside each position folder.
    #[arg(long, env = "DSLIT_COUNTS_FILE", default_value = DEFAULT_COUNTS_FILE)]
    pub counts_file: String,

    /// Metadata file name inside each position folder.
    #[arg(long, env = "DSLIT_INFO_FILE", default_value = DEFAULT_INFO_FILE)]
    pub info_file: String,

    /// Use raw coincidences instead of accidental-corrected ones.
    #[arg(long, env = "DSLIT_RAW")]
    pub raw: bool,

    /// Skip the fit.
    #[arg(long, env = "DSLIT_NO_FIT")]
    pub no_fit: bool,

    /// Pattern model.
    #[arg(short = 'm', long, env = "DSLIT_MODEL", value_enum, default_value_t = ModelVariant::Extended)]
    pub model: ModelVariant,

    /// Fit region: full, up_to_center or around_center (unknown names fall back to full).
    #[arg(short = 'r', long, env = "DSLIT_REGION", default_value = "full", value_parser = parse_region)]
    pub region: FitRegion,

    /// Hold a parameter fixed, e.g. `--fix delta=0` (repeatable).
    #[arg(long = "fix", value_name = "NAME=VALUE", value_parser = parse_fix)]
    pub fix: Vec<(ParamName, f64)>,

    /// Cap on solver trial steps before the fit is reported as not converged.
    #[arg(long, env = "DSLIT_MAX_ITERATIONS", default_value_t = 1000)]
    pub max_iterations: usize,

    /// Do not write `summary.csv` / `fit.json`.
    #[arg(long, env = "DSLIT_NO_EXPORT")]
    pub no_export: bool,

    /// Also print observed vs fitted counts per position.
    #[arg(long)]
    pub residuals: bool,
}

impl AnalyzeArgs {
    /// Resolve into a validated configuration.
    pub fn to_config(&self, perform_fit: bool) -> Result<ExperimentConfig, AppError> {
        let options = AnalysisOptions {
            use_true_coincidences: !self.raw,
            perform_fit: perform_fit && !self.no_fit,
            variant: self.model,
            fit_region: self.region,
            fixed: self.fix.clone(),
            max_iterations: self.max_iterations,
        };
        let paths = PathSettings {
            data_dir: self.data_dir.clone(),
            output_dir: self.output_dir.clone(),
            counts_file: self.counts_file.clone(),
            info_file: self.info_file.clone(),
        };
        ExperimentConfig::new(self.physics.to_constants(), options, paths)
    }
}

/// Options for `simulate`.
#[derive(Debug, Args, Clone)]
pub struct SimulateArgs {
    #[command(flatten)]
    pub physics: PhysicsArgs,

    /// Output directory for the generated scan.
    #[arg(short = 'd', long, env = "DSLIT_DATA_DIR", default_value = "data")]
    pub data_dir: PathBuf,

    /// First position (mm).
    #[arg(long, default_value_t = -6.0, allow_hyphen_values = true)]
    pub x_min: f64,

    /// Last position (mm).
    #[arg(long, default_value_t = 6.0, allow_hyphen_values = true)]
    pub x_max: f64,

    /// Number of positions.
    #[arg(long, default_value_t = 41)]
    pub positions: usize,

    /// Pattern center (mm).
    #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
    pub x0: f64,

    /// Amplitude N0 (coincidences per interval).
    #[arg(long, default_value_t = 400.0)]
    pub n0: f64,

    /// Visibility V.
    #[arg(long, default_value_t = 0.7)]
    pub visibility: f64,

    /// Phase offset delta (rad).
    #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
    pub delta: f64,

    /// Intervals (rows) per position.
    #[arg(long, default_value_t = 20)]
    pub intervals: usize,

    /// Interval duration (s).
    #[arg(long, default_value_t = 1.0)]
    pub time_s: f64,

    /// Coincidence window (ns).
    #[arg(long, default_value_t = 25.0)]
    pub window_ns: f64,

    /// Mean singles per interval on each detector.
    #[arg(long, default_value_t = 20_000.0)]
    pub singles: f64,

    /// Random seed.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,
}

impl SimulateArgs {
    pub fn to_spec(&self) -> Result<SynthSpec, AppError> {
        let physics = self.physics.to_constants();
        physics.validate()?;
        Ok(SynthSpec {
            physics,
            x_min_mm: self.x_min,
            x_max_mm: self.x_max,
            positions: self.positions,
            x0_mm: self.x0,
            n0: self.n0,
            visibility: self.visibility,
            delta: self.delta,
            intervals: self.intervals,
            measurement_time_s: self.time_s,
            window_ns: self.window_ns,
            singles_t: self.singles,
            singles_r: self.singles,
            seed: self.seed,
            ..SynthSpec::default()
        })
    }
}

/// Region names go through the same lenient mapping as the library.
fn parse_region(s: &str) -> Result<FitRegion, String> {
    Ok(FitRegion::from_name(s))
}

/// Parse `NAME=VALUE` for `--fix`.
fn parse_fix(s: &str) -> Result<(ParamName, f64), String> {
    let (name, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got '{s}'"))?;
    let name: ParamName = name.trim().parse()?;
    let value: f64 = value
        .trim()
        .parse()
        .map_err(|e| format!("invalid value for {}: {e}", name.as_str()))?;
    Ok((name, value))
}
