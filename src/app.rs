//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - loads `.env` and initializes logging
//! - parses CLI arguments
//! - runs the analysis pipeline
//! - prints reports
//! - writes exports

use std::path::Path;

use clap::Parser;

use crate::cli::{AnalyzeArgs, Command, PhysicsArgs, SimulateArgs};
use crate::error::AppError;

pub mod pipeline;

use pipeline::{FitOutcome, RunOutput};

/// File name of the summary export inside the output directory.
pub const SUMMARY_FILE: &str = "summary.csv";

/// File name of the fit export inside the output directory.
pub const FIT_FILE: &str = "fit.json";

/// Entry point for the `dslit` binary.
pub fn run() -> Result<(), AppError> {
    // A missing `.env` is the normal case.
    let _ = dotenvy::dotenv();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let argv = rewrite_args(std::env::args().collect());
    let cli = crate::cli::Cli::parse_from(argv);

    match cli.command {
        Command::Analyze(args) => handle_analyze(&args, true),
        Command::Summarize(args) => handle_analyze(&args, false),
        Command::Simulate(args) => handle_simulate(&args),
        Command::Visibility(args) => handle_visibility(&args),
    }
}

fn handle_analyze(args: &AnalyzeArgs, perform_fit: bool) -> Result<(), AppError> {
    let config = args.to_config(perform_fit)?;
    let run = pipeline::run_analysis(&config)?;

    println!(
        "{}",
        crate::report::format_summary_table(&run.summary, config.options.use_true_coincidences)
    );

    match &run.fit {
        FitOutcome::Fitted { fit, residuals } => {
            println!("{}", crate::report::format_fit(fit, &config.physics));
            if args.residuals {
                println!("{}", crate::report::format_residuals(residuals));
            }
        }
        FitOutcome::Failed(err) => println!("Fit unavailable: {err}"),
        FitOutcome::Skipped => {}
    }

    if !args.no_export {
        write_exports(&run, config.output_dir(), &config.physics)?;
    }

    Ok(())
}

/// Write `summary.csv` and, when a fit is available, `fit.json`.
pub fn write_exports(
    run: &RunOutput,
    output_dir: &Path,
    physics: &crate::domain::PhysicalConstants,
) -> Result<(), AppError> {
    std::fs::create_dir_all(output_dir).map_err(|e| AppError::io(output_dir, e))?;
    crate::io::export::write_summary_csv(&output_dir.join(SUMMARY_FILE), &run.summary)?;
    if let Some(fit) = run.fit.fit() {
        crate::io::fit_json::write_fit_json(&output_dir.join(FIT_FILE), fit, &run.summary, physics)?;
    }
    Ok(())
}

fn handle_simulate(args: &SimulateArgs) -> Result<(), AppError> {
    let spec = args.to_spec()?;
    let folders = crate::data::generate_dataset(&args.data_dir, &spec)?;
    println!(
        "Wrote {} position folders to {}",
        folders.len(),
        args.data_dir.display()
    );
    Ok(())
}

fn handle_visibility(args: &PhysicsArgs) -> Result<(), AppError> {
    let physics = args.to_constants();
    physics.validate()?;
    let v = crate::models::visibility_theory(&physics).ok_or_else(|| {
        AppError::Configuration("beam waist and source distance are required".into())
    })?;
    println!("Theoretical visibility: {v:.6}");
    Ok(())
}

/// Rewrite argv so `dslit` defaults to `dslit analyze`.
///
/// Rules:
/// - `dslit`                        -> `dslit analyze`
/// - `dslit -d scan ...`            -> `dslit analyze -d scan ...`
/// - `dslit --help/--version/-h`    -> unchanged (show top-level help/version)
fn rewrite_args(mut argv: Vec<String>) -> Vec<String> {
    let Some(arg1) = argv.get(1).cloned() else {
        argv.push("analyze".to_string());
        return argv;
    };

    let is_top_level_help_or_version = matches!(
        arg1.as_str(),
        "-h" | "--help" | "-V" | "--version" | "help"
    );
    if is_top_level_help_or_version {
        return argv;
    }

    let is_subcommand = matches!(
        arg1.as_str(),
        "analyze" | "summarize" | "simulate" | "visibility"
    );
    if is_subcommand {
        return argv;
    }

    if arg1.starts_with('-') {
        argv.insert(1, "analyze".to_string());
        return argv;
    }

    argv
}
