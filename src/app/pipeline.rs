//! Shared analysis pipeline used by the `analyze` and `summarize` commands.
//!
//! Workflow: load positions -> correct + summarize -> (optional) fit -> residuals
//!
//! Loader and preprocessing errors abort the run. Fit errors do not: the
//! summary table is still a useful product, so the failure is logged and
//! carried in `FitOutcome::Failed`.

use crate::domain::{ExperimentConfig, FitResult, SummaryTable};
use crate::error::AppError;
use crate::fit::{FitOptions, fit_counts};
use crate::io::ingest::load_positions;
use crate::models::SlitGeometry;
use crate::preprocess::build_summary;
use crate::report::{PositionResidual, compute_residuals};

/// What happened to the fit stage.
#[derive(Debug)]
pub enum FitOutcome {
    /// Fitting disabled in the configuration.
    Skipped,
    Fitted {
        fit: FitResult,
        residuals: Vec<PositionResidual>,
    },
    Failed(AppError),
}

impl FitOutcome {
    pub fn fit(&self) -> Option<&FitResult> {
        match self {
            FitOutcome::Fitted { fit, .. } => Some(fit),
            _ => None,
        }
    }
}

/// All computed outputs of a single run.
#[derive(Debug)]
pub struct RunOutput {
    /// Number of position folders loaded.
    pub positions: usize,
    pub summary: SummaryTable,
    pub fit: FitOutcome,
}

/// Execute the full pipeline for a resolved configuration.
pub fn run_analysis(config: &ExperimentConfig) -> Result<RunOutput, AppError> {
    let records = load_positions(config)?;
    let summary = build_summary(&records, config.options.use_true_coincidences);

    let fit = if config.options.perform_fit {
        fit_stage(&summary, config)
    } else {
        log::debug!("Fit disabled; returning summary only");
        FitOutcome::Skipped
    };

    Ok(RunOutput {
        positions: records.len(),
        summary,
        fit,
    })
}

fn fit_stage(summary: &SummaryTable, config: &ExperimentConfig) -> FitOutcome {
    let geometry = SlitGeometry::from(&config.physics);
    let opts = FitOptions::from_analysis(&config.options);

    let result = fit_counts(summary, &geometry, &opts).and_then(|fit| {
        let residuals = compute_residuals(summary, &fit, &config.physics)?;
        Ok(FitOutcome::Fitted { fit, residuals })
    });

    result.unwrap_or_else(|err| {
        log::warn!("Fit failed, continuing with the summary only: {err}");
        FitOutcome::Failed(err)
    })
}
