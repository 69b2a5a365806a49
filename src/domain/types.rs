//! Shared domain types.
//!
//! These types are intentionally kept lightweight and serializable so they can be:
//!
//! - passed between loader, preprocessor and fitter
//! - exported to CSV/JSON for external plotting
//! - reloaded later for reporting

use std::path::{Path, PathBuf};
use std::str::FromStr;

use clap::ValueEnum;
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Default count-table file name inside each position folder.
pub const DEFAULT_COUNTS_FILE: &str = "HBT_2D.csv";

/// Default metadata file name inside each position folder.
pub const DEFAULT_INFO_FILE: &str = "infoMedicion.txt";

/// Which points enter the fit, relative to the estimated center `x0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FitRegion {
    /// All positions.
    Full,
    /// Positions with `x <= x0`.
    UpToCenter,
    /// Positions within `±AROUND_CENTER_HALF_WIDTH_MM` of `x0`.
    AroundCenter,
}

impl FitRegion {
    /// Half-width (mm) of the `around_center` window.
    pub const AROUND_CENTER_HALF_WIDTH_MM: f64 = 2.0;

    pub fn name(self) -> &'static str {
        match self {
            FitRegion::Full => "full",
            FitRegion::UpToCenter => "up_to_center",
            FitRegion::AroundCenter => "around_center",
        }
    }

    /// Resolve a region name, falling back to `Full` for unknown names.
    ///
    /// The fallback is logged at warn level so typos do not go unnoticed.
    pub fn from_name(name: &str) -> FitRegion {
        match name.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "full" => FitRegion::Full,
            "up_to_center" => FitRegion::UpToCenter,
            "around_center" => FitRegion::AroundCenter,
            other => {
                log::warn!("Unknown fit region '{other}'; falling back to 'full'");
                FitRegion::Full
            }
        }
    }
}

/// Model variant used by the fitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ModelVariant {
    /// `N0`, `V`, `delta`.
    Basic,
    /// Basic plus horizontal scale `x_scale` and constant background `N_bg`.
    Extended,
}

impl ModelVariant {
    pub fn display_name(self) -> &'static str {
        match self {
            ModelVariant::Basic => "basic",
            ModelVariant::Extended => "extended",
        }
    }
}

/// Model parameter identifiers, in the order the models consume them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ParamName {
    #[serde(rename = "N0")]
    N0,
    #[serde(rename = "V")]
    V,
    #[serde(rename = "delta")]
    Delta,
    #[serde(rename = "x_scale")]
    XScale,
    #[serde(rename = "N_bg")]
    NBg,
}

impl ParamName {
    pub fn as_str(self) -> &'static str {
        match self {
            ParamName::N0 => "N0",
            ParamName::V => "V",
            ParamName::Delta => "delta",
            ParamName::XScale => "x_scale",
            ParamName::NBg => "N_bg",
        }
    }
}

impl FromStr for ParamName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "N0" | "n0" => Ok(ParamName::N0),
            "V" | "v" => Ok(ParamName::V),
            "delta" => Ok(ParamName::Delta),
            "x_scale" => Ok(ParamName::XScale),
            "N_bg" | "n_bg" => Ok(ParamName::NBg),
            other => Err(format!(
                "unknown parameter '{other}' (expected N0, V, delta, x_scale or N_bg)"
            )),
        }
    }
}

/// Physical constants of the setup. All lengths in meters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PhysicalConstants {
    pub wavelength_m: f64,
    /// Effective slit-to-detector distance `L`.
    pub distance_m: f64,
    /// Slit separation `d`.
    pub separation_m: f64,
    /// Slit width `b`.
    pub width_m: f64,
    /// Pump beam waist `w0` (theoretical visibility only).
    pub beam_waist_m: Option<f64>,
    /// Source-to-slits distance `z` (theoretical visibility only).
    pub source_distance_m: Option<f64>,
}

impl Default for PhysicalConstants {
    fn default() -> Self {
        Self {
            wavelength_m: 444e-9,
            distance_m: 56.3e-2,
            separation_m: 0.04e-3,
            width_m: 0.02e-3,
            beam_waist_m: Some(0.064e-3),
            source_distance_m: Some(60.0e-2),
        }
    }
}

impl PhysicalConstants {
    pub fn validate(&self) -> Result<(), AppError> {
        let required = [
            ("wavelength", self.wavelength_m),
            ("slit-to-detector distance", self.distance_m),
            ("slit separation", self.separation_m),
            ("slit width", self.width_m),
        ];
        for (label, value) in required {
            if !(value.is_finite() && value > 0.0) {
                return Err(AppError::Configuration(format!(
                    "{label} must be finite and > 0 (got {value})"
                )));
            }
        }
        let optional = [
            ("beam waist", self.beam_waist_m),
            ("source-to-slits distance", self.source_distance_m),
        ];
        for (label, value) in optional {
            if let Some(v) = value {
                if !(v.is_finite() && v > 0.0) {
                    return Err(AppError::Configuration(format!(
                        "{label} must be finite and > 0 when given (got {v})"
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Analysis toggles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisOptions {
    /// Fit accidental-corrected coincidences instead of raw `NTR`.
    pub use_true_coincidences: bool,
    pub perform_fit: bool,
    pub variant: ModelVariant,
    pub fit_region: FitRegion,
    /// Parameters held at a fixed value during the fit.
    pub fixed: Vec<(ParamName, f64)>,
    /// Cap on solver trial steps.
    pub max_iterations: usize,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            use_true_coincidences: true,
            perform_fit: true,
            variant: ModelVariant::Extended,
            fit_region: FitRegion::Full,
            fixed: Vec::new(),
            max_iterations: 1000,
        }
    }
}

/// Unresolved path settings, as given by the user.
#[derive(Debug, Clone)]
pub struct PathSettings {
    pub data_dir: PathBuf,
    pub output_dir: PathBuf,
    pub counts_file: String,
    pub info_file: String,
}

/// A full run's configuration as understood by the pipeline.
///
/// Paths are resolved to absolute form once, in [`ExperimentConfig::new`].
#[derive(Debug, Clone)]
pub struct ExperimentConfig {
    pub physics: PhysicalConstants,
    pub options: AnalysisOptions,
    data_dir: PathBuf,
    output_dir: PathBuf,
    counts_file: String,
    info_file: String,
}

impl ExperimentConfig {
    pub fn new(
        physics: PhysicalConstants,
        options: AnalysisOptions,
        paths: PathSettings,
    ) -> Result<Self, AppError> {
        physics.validate()?;
        if options.max_iterations == 0 {
            return Err(AppError::Configuration(
                "max iterations must be at least 1".into(),
            ));
        }
        let specs = crate::models::param_specs(options.variant);
        for (name, value) in &options.fixed {
            let Some(spec) = specs.iter().find(|s| s.name == *name) else {
                return Err(AppError::Configuration(format!(
                    "{} is not a parameter of the {} model",
                    name.as_str(),
                    options.variant.display_name()
                )));
            };
            if !(value.is_finite() && *value >= spec.lower && *value <= spec.upper) {
                return Err(AppError::Configuration(format!(
                    "fixed value {value} for {} is outside [{}, {}]",
                    name.as_str(),
                    spec.lower,
                    spec.upper
                )));
            }
        }
        if paths.counts_file.trim().is_empty() || paths.info_file.trim().is_empty() {
            return Err(AppError::Configuration(
                "count table and metadata file names must not be empty".into(),
            ));
        }

        Ok(Self {
            physics,
            options,
            data_dir: resolve_path(&paths.data_dir)?,
            output_dir: resolve_path(&paths.output_dir)?,
            counts_file: paths.counts_file,
            info_file: paths.info_file,
        })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn counts_file(&self) -> &str {
        &self.counts_file
    }

    pub fn info_file(&self) -> &str {
        &self.info_file
    }
}

/// Expand a leading `~` and make the path absolute.
fn resolve_path(path: &Path) -> Result<PathBuf, AppError> {
    let expanded = match path.strip_prefix("~") {
        Ok(rest) => match std::env::var_os("HOME") {
            Some(home) => PathBuf::from(home).join(rest),
            None => path.to_path_buf(),
        },
        Err(_) => path.to_path_buf(),
    };
    std::path::absolute(&expanded).map_err(|e| AppError::io(expanded, e))
}

/// One acquisition interval of the count table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IntervalRow {
    pub singles_t: f64,
    pub singles_r: f64,
    pub coincidences_tr: f64,
    /// Instrument-reported `g2(0)`.
    pub g2: f64,
}

/// Raw data for one stage position (one numeric folder).
#[derive(Debug, Clone, PartialEq)]
pub struct PositionRecord {
    pub x_mm: f64,
    pub rows: Vec<IntervalRow>,
    /// Duration of each acquisition interval.
    pub measurement_time_s: f64,
    pub window_ns: f64,
    pub folder: PathBuf,
}

/// An interval row plus its accidental-coincidence estimates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CorrectedRow {
    pub raw: IntervalRow,
    pub accidental: f64,
    /// `max(0, NTR - accidental)`.
    pub true_coincidences: f64,
}

/// A position record after accidental correction.
#[derive(Debug, Clone, PartialEq)]
pub struct CorrectedRecord {
    pub x_mm: f64,
    pub rows: Vec<CorrectedRow>,
    pub measurement_time_s: f64,
    pub window_ns: f64,
}

/// Mean, sample standard deviation, standard error and sum of a series.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SeriesStats {
    pub mean: f64,
    pub std: f64,
    pub sem: f64,
    pub total: f64,
}

/// Per-position aggregate statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionSummary {
    pub x_mm: f64,
    pub dt_s: f64,
    pub window_ns: f64,
    /// Series selected for fitting (true or raw coincidences).
    pub counts: SeriesStats,
    /// Raw `NTR`, regardless of the toggle.
    pub raw: SeriesStats,
    pub g2: SeriesStats,
    /// Mean accidental estimate per interval.
    pub accidental_mean: f64,
    pub n_intervals: usize,
}

/// Position summaries sorted ascending by `x_mm`.
pub type SummaryTable = Vec<PositionSummary>;

/// A fitted (or fixed) model parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedParam {
    pub name: ParamName,
    pub value: f64,
    /// Square root of the covariance diagonal; `None` for fixed parameters.
    pub stderr: Option<f64>,
    pub fixed: bool,
}

/// Fit output.
#[derive(Debug, Clone, PartialEq)]
pub struct FitResult {
    pub variant: ModelVariant,
    pub region: FitRegion,
    pub params: Vec<FittedParam>,
    /// Names of the free parameters, in covariance row/column order.
    pub free_params: Vec<ParamName>,
    pub covariance: DMatrix<f64>,
    pub x0_mm: f64,
    /// Which summary rows entered the fit (same order as the table).
    pub mask: Vec<bool>,
    pub chi2: f64,
    pub dof: usize,
    pub iterations: usize,
}

impl FitResult {
    pub fn value(&self, name: ParamName) -> Option<f64> {
        self.params.iter().find(|p| p.name == name).map(|p| p.value)
    }

    /// Parameter values in model order.
    pub fn values(&self) -> Vec<f64> {
        self.params.iter().map(|p| p.value).collect()
    }

    pub fn points_used(&self) -> usize {
        self.mask.iter().filter(|m| **m).count()
    }

    /// `chi2 / dof`, or `None` when the fit is exactly determined.
    pub fn reduced_chi2(&self) -> Option<f64> {
        if self.dof == 0 {
            None
        } else {
            Some(self.chi2 / self.dof as f64)
        }
    }
}

/// A saved fit file (JSON) for external plotting and reporting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FitFile {
    pub tool: String,
    pub variant: ModelVariant,
    pub region: FitRegion,
    pub physics: PhysicalConstants,
    pub x0_mm: f64,
    pub params: Vec<FittedParam>,
    pub free_params: Vec<ParamName>,
    /// Row-major covariance of `free_params`.
    pub covariance: Vec<Vec<f64>>,
    pub mask: Vec<bool>,
    pub chi2: f64,
    pub dof: usize,
    pub curve: FitCurve,
}

/// Model evaluated on a dense grid of absolute positions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FitCurve {
    pub x_mm: Vec<f64>,
    pub n: Vec<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paths() -> PathSettings {
        PathSettings {
            data_dir: PathBuf::from("samples"),
            output_dir: PathBuf::from("out"),
            counts_file: DEFAULT_COUNTS_FILE.to_string(),
            info_file: DEFAULT_INFO_FILE.to_string(),
        }
    }

    #[test]
    fn region_names_resolve_and_fall_back() {
        assert_eq!(FitRegion::from_name("up_to_center"), FitRegion::UpToCenter);
        assert_eq!(FitRegion::from_name("Around-Center"), FitRegion::AroundCenter);
        assert_eq!(FitRegion::from_name("uptocenter"), FitRegion::Full);
    }

    #[test]
    fn config_resolves_paths_to_absolute() {
        let cfg = ExperimentConfig::new(
            PhysicalConstants::default(),
            AnalysisOptions::default(),
            paths(),
        )
        .unwrap();
        assert!(cfg.data_dir().is_absolute());
        assert!(cfg.output_dir().is_absolute());
        assert!(cfg.data_dir().ends_with("samples"));
    }

    #[test]
    fn config_rejects_non_positive_constants() {
        let physics = PhysicalConstants {
            width_m: 0.0,
            ..PhysicalConstants::default()
        };
        let err = ExperimentConfig::new(physics, AnalysisOptions::default(), paths()).unwrap_err();
        assert!(matches!(err, AppError::Configuration(_)));
    }

    #[test]
    fn config_rejects_foreign_or_out_of_bounds_fixed_params() {
        let options = AnalysisOptions {
            variant: ModelVariant::Basic,
            fixed: vec![(ParamName::XScale, 1.0)],
            ..AnalysisOptions::default()
        };
        let err = ExperimentConfig::new(PhysicalConstants::default(), options, paths()).unwrap_err();
        assert!(matches!(err, AppError::Configuration(_)));

        let options = AnalysisOptions {
            fixed: vec![(ParamName::V, 1.5)],
            ..AnalysisOptions::default()
        };
        let err = ExperimentConfig::new(PhysicalConstants::default(), options, paths()).unwrap_err();
        assert!(matches!(err, AppError::Configuration(_)));
    }

    #[test]
    fn config_rejects_zero_iteration_cap() {
        let options = AnalysisOptions {
            max_iterations: 0,
            ..AnalysisOptions::default()
        };
        let err = ExperimentConfig::new(PhysicalConstants::default(), options, paths()).unwrap_err();
        assert!(matches!(err, AppError::Configuration(_)));
    }

    #[test]
    fn param_names_parse() {
        assert_eq!("delta".parse::<ParamName>().unwrap(), ParamName::Delta);
        assert_eq!("N_bg".parse::<ParamName>().unwrap(), ParamName::NBg);
        assert!("gamma".parse::<ParamName>().is_err());
    }
}
