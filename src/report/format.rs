//! Formatted terminal output.
//!
//! We keep formatting code in one place so:
//! - the math/fitting code stays clean and testable
//! - output changes are localized

use crate::domain::{FitResult, PhysicalConstants, PositionSummary};
use crate::models::visibility_theory;
use crate::report::PositionResidual;

/// Format the per-position summary table.
pub fn format_summary_table(summary: &[PositionSummary], use_true: bool) -> String {
    let mut out = String::new();

    let label = if use_true { "true" } else { "raw" };
    out.push_str(&format!(
        "=== dslit - Coincidence summary ({} positions, {label} coincidences) ===\n",
        summary.len()
    ));
    push_line(
        &mut out,
        format!(
            "{:>8} {:>7} {:>8} {:>10} {:>9} {:>9} {:>10} {:>8} {:>8} {:>5}",
            "x_mm", "dt_s", "win_ns", "N_mean", "N_std", "N_sem", "N_total", "g2", "g2_sem", "n"
        ),
    );
    push_line(
        &mut out,
        format!(
            "{:-<8} {:-<7} {:-<8} {:-<10} {:-<9} {:-<9} {:-<10} {:-<8} {:-<8} {:-<5}",
            "", "", "", "", "", "", "", "", "", ""
        ),
    );

    for s in summary {
        push_line(
            &mut out,
            format!(
                "{:>8.3} {:>7.3} {:>8.2} {:>10.3} {:>9.3} {:>9.3} {:>10.1} {:>8.4} {:>8.4} {:>5}",
                s.x_mm,
                s.dt_s,
                s.window_ns,
                s.counts.mean,
                s.counts.std,
                s.counts.sem,
                s.counts.total,
                s.g2.mean,
                s.g2.sem,
                s.n_intervals
            ),
        );
    }

    out
}

/// Format fit diagnostics: parameters, quality and visibility comparison.
pub fn format_fit(fit: &FitResult, physics: &PhysicalConstants) -> String {
    let mut out = String::new();

    out.push_str(&format!(
        "\n=== Fit: {} | region={} ===\n",
        fit.variant.display_name(),
        fit.region.name()
    ));
    out.push_str(&format!(
        "Center x0 = {:.4} mm | points used = {}/{}\n",
        fit.x0_mm,
        fit.points_used(),
        fit.mask.len()
    ));

    out.push_str("\nParameters:\n");
    for p in &fit.params {
        let err = match p.stderr {
            Some(e) => format!("± {}", fmt_num(e)),
            None => "(fixed)".to_string(),
        };
        push_line(
            &mut out,
            format!("- {:<8} = {:>14} {err}", p.name.as_str(), fmt_num(p.value)),
        );
    }

    let reduced = fit
        .reduced_chi2()
        .map(|r| format!("{r:.4}"))
        .unwrap_or_else(|| "n/a".to_string());
    out.push_str(&format!(
        "\nchi2 = {:.4} | dof = {} | chi2/dof = {reduced} | iterations = {}\n",
        fit.chi2, fit.dof, fit.iterations
    ));

    let fitted_v = fit.value(crate::domain::ParamName::V).unwrap_or(f64::NAN);
    match visibility_theory(physics) {
        Some(theory) => out.push_str(&format!(
            "Visibility: fitted = {fitted_v:.4} | theory = {theory:.4} | ratio = {:.3}\n",
            if theory > 0.0 { fitted_v / theory } else { f64::NAN }
        )),
        None => out.push_str(&format!(
            "Visibility: fitted = {fitted_v:.4} | theory = n/a (beam waist or source distance not set)\n"
        )),
    }

    out
}

/// Format the observed vs fitted table.
pub fn format_residuals(rows: &[PositionResidual]) -> String {
    let mut out = String::new();
    out.push_str("\nResiduals (* = outside fit region):\n");
    push_line(
        &mut out,
        format!(
            "{:>8} {:>10} {:>10} {:>10} {:>8}",
            "x_mm", "observed", "fitted", "residual", "pull"
        ),
    );
    for r in rows {
        let pull = r.pull.map(|p| format!("{p:>8.2}")).unwrap_or_else(|| format!("{:>8}", "-"));
        let marker = if r.used { "" } else { " *" };
        push_line(
            &mut out,
            format!(
                "{:>8.3} {:>10.3} {:>10.3} {:>10.3} {pull}{marker}",
                r.x_mm, r.observed, r.fitted, r.residual
            ),
        );
    }
    out
}

fn push_line(out: &mut String, line: String) {
    out.push_str(line.trim_end());
    out.push('\n');
}

fn fmt_num(v: f64) -> String {
    if v.is_finite() && v != 0.0 && (v.abs() >= 1e5 || v.abs() < 1e-3) {
        format!("{v:.4e}")
    } else {
        format!("{v:.6}")
    }
}
