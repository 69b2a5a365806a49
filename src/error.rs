use std::path::PathBuf;

use thiserror::Error;

/// Every failure the pipeline can surface.
///
/// Loader and preprocessing errors abort a run. The fit errors
/// (`UnderdeterminedFit`, `DegenerateInput`, `FitConvergence`) only abort the
/// fit step; the summary table computed before them stays valid.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Required input not found: {}", path.display())]
    MissingInput { path: PathBuf },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Malformed count table '{}': {message}", path.display())]
    MalformedTable { path: PathBuf, message: String },

    #[error("Underdetermined fit: {points} point(s) for {params} free parameter(s)")]
    UnderdeterminedFit { points: usize, params: usize },

    #[error("Degenerate fit input: {0}")]
    DegenerateInput(String),

    #[error("Fit did not converge after {iterations} iteration(s): {message}")]
    FitConvergence { iterations: usize, message: String },

    #[error("I/O error on '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Export failed: {0}")]
    Export(String),
}

impl AppError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        AppError::Io {
            path: path.into(),
            source,
        }
    }

    /// Process exit code for the `dslit` binary.
    pub fn exit_code(&self) -> u8 {
        match self {
            AppError::MissingInput { .. }
            | AppError::Configuration(_)
            | AppError::MalformedTable { .. }
            | AppError::Io { .. }
            | AppError::Export(_) => 2,
            AppError::DegenerateInput(_) => 3,
            AppError::UnderdeterminedFit { .. } | AppError::FitConvergence { .. } => 4,
        }
    }

    /// True for errors that only invalidate the fit step.
    pub fn is_fit_error(&self) -> bool {
        matches!(
            self,
            AppError::UnderdeterminedFit { .. }
                | AppError::DegenerateInput(_)
                | AppError::FitConvergence { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fit_errors_are_classified() {
        assert!(AppError::UnderdeterminedFit { points: 2, params: 3 }.is_fit_error());
        assert!(AppError::DegenerateInput("all zero".into()).is_fit_error());
        assert!(!AppError::MissingInput { path: "x".into() }.is_fit_error());
        assert_eq!(AppError::Configuration("bad".into()).exit_code(), 2);
        assert_eq!(
            AppError::FitConvergence {
                iterations: 10,
                message: "cap".into()
            }
            .exit_code(),
            4
        );
    }

    #[test]
    fn missing_input_names_path() {
        let e = AppError::MissingInput {
            path: PathBuf::from("/data/1.5/HBT_2D.csv"),
        };
        assert!(e.to_string().contains("/data/1.5/HBT_2D.csv"));
    }
}
