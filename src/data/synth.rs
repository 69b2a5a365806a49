//! Synthetic coincidence scans.
//!
//! Generates a dataset directory with the same layout the loader expects:
//! one sub-folder per detector position (named by `x_mm`), each holding a
//! count table and a metadata file. Counts are Poisson around:
//!
//! - `singles_t`, `singles_r` for the singles
//! - `N(x - x0) + NT·NR·τ/T` for the coincidences (model + accidentals)
//!
//! `g2(0)` is written as the coincidence count divided by the accidental
//! expectation of the same interval.

use std::fs;
use std::path::{Path, PathBuf};

use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::Poisson;

use crate::domain::{DEFAULT_COUNTS_FILE, DEFAULT_INFO_FILE, PhysicalConstants};
use crate::error::AppError;
use crate::models::{SlitGeometry, counts_basic};

/// Settings for a synthetic scan.
#[derive(Debug, Clone)]
pub struct SynthSpec {
    pub physics: PhysicalConstants,
    pub x_min_mm: f64,
    pub x_max_mm: f64,
    /// Number of positions, evenly spaced over `[x_min_mm, x_max_mm]`.
    pub positions: usize,
    /// Pattern center.
    pub x0_mm: f64,
    pub n0: f64,
    pub visibility: f64,
    pub delta: f64,
    /// Intervals (rows) per position.
    pub intervals: usize,
    pub measurement_time_s: f64,
    pub window_ns: f64,
    /// Mean singles per interval on each detector.
    pub singles_t: f64,
    pub singles_r: f64,
    pub seed: u64,
    pub counts_file: String,
    pub info_file: String,
}

impl Default for SynthSpec {
    fn default() -> Self {
        Self {
            physics: PhysicalConstants::default(),
            x_min_mm: -6.0,
            x_max_mm: 6.0,
            positions: 41,
            x0_mm: 0.0,
            n0: 400.0,
            visibility: 0.7,
            delta: 0.0,
            intervals: 20,
            measurement_time_s: 1.0,
            window_ns: 25.0,
            singles_t: 20_000.0,
            singles_r: 20_000.0,
            seed: 42,
            counts_file: DEFAULT_COUNTS_FILE.to_string(),
            info_file: DEFAULT_INFO_FILE.to_string(),
        }
    }
}

impl SynthSpec {
    fn validate(&self) -> Result<(), AppError> {
        if self.positions == 0 || self.intervals == 0 {
            return Err(AppError::Configuration(
                "Synthetic scan needs at least one position and one interval.".into(),
            ));
        }
        if !(self.x_min_mm.is_finite() && self.x_max_mm.is_finite() && self.x_max_mm >= self.x_min_mm) {
            return Err(AppError::Configuration("Invalid position range for synthetic scan.".into()));
        }
        if self.positions > 1 && self.x_max_mm == self.x_min_mm {
            return Err(AppError::Configuration(
                "Several positions need a non-empty position range.".into(),
            ));
        }
        let positive = [
            self.measurement_time_s,
            self.window_ns,
            self.singles_t,
            self.singles_r,
        ];
        if positive.iter().any(|v| !(v.is_finite() && *v > 0.0)) {
            return Err(AppError::Configuration(
                "Measurement time, window and singles rates must be > 0.".into(),
            ));
        }
        if !(self.n0.is_finite() && self.n0 >= 0.0) || !(0.0..=1.0).contains(&self.visibility) {
            return Err(AppError::Configuration(
                "Synthetic amplitude must be >= 0 and visibility within [0, 1].".into(),
            ));
        }
        Ok(())
    }

    /// Position grid in mm.
    pub fn grid(&self) -> Vec<f64> {
        if self.positions == 1 {
            return vec![self.x_min_mm];
        }
        let step = (self.x_max_mm - self.x_min_mm) / (self.positions - 1) as f64;
        (0..self.positions)
            .map(|i| self.x_min_mm + step * i as f64)
            .collect()
    }
}

/// Write a synthetic dataset under `dir`; returns the created position folders.
pub fn generate_dataset(dir: &Path, spec: &SynthSpec) -> Result<Vec<PathBuf>, AppError> {
    spec.validate()?;
    fs::create_dir_all(dir).map_err(|e| AppError::io(dir, e))?;

    let mut rng = StdRng::seed_from_u64(spec.seed);
    let singles_t = poisson(spec.singles_t)?;
    let singles_r = poisson(spec.singles_r)?;
    let geometry = SlitGeometry::from(&spec.physics);
    let tau_over_t = spec.window_ns * 1e-9 / spec.measurement_time_s;

    let mut folders = Vec::with_capacity(spec.positions);
    for x_mm in spec.grid() {
        let folder = dir.join(format!("{x_mm:.4}"));
        fs::create_dir_all(&folder).map_err(|e| AppError::io(&folder, e))?;

        let signal = counts_basic(&geometry, x_mm - spec.x0_mm, spec.n0, spec.visibility, spec.delta);
        let mut rows = Vec::with_capacity(spec.intervals);
        for _ in 0..spec.intervals {
            let nt = singles_t.sample(&mut rng);
            let nr = singles_r.sample(&mut rng);
            let accidental = nt * nr * tau_over_t;
            let ntr = sample_count(&mut rng, signal.max(0.0) + accidental)?;
            let g2 = if accidental > 0.0 { ntr / accidental } else { 0.0 };
            rows.push((nt, nr, ntr, g2));
        }

        write_count_table(&folder.join(&spec.counts_file), &rows)?;
        write_info_file(&folder.join(&spec.info_file), spec)?;
        folders.push(folder);
    }

    log::info!(
        "Generated synthetic scan: {} positions x {} intervals in {}",
        spec.positions,
        spec.intervals,
        dir.display()
    );
    Ok(folders)
}

fn poisson(lambda: f64) -> Result<Poisson<f64>, AppError> {
    Poisson::new(lambda)
        .map_err(|e| AppError::Configuration(format!("Invalid Poisson rate {lambda}: {e}")))
}

fn sample_count(rng: &mut StdRng, lambda: f64) -> Result<f64, AppError> {
    if lambda <= 0.0 {
        return Ok(0.0);
    }
    Ok(poisson(lambda)?.sample(rng))
}

fn write_count_table(path: &Path, rows: &[(f64, f64, f64, f64)]) -> Result<(), AppError> {
    let mut writer = csv::Writer::from_path(path)
        .map_err(|e| AppError::Export(format!("Failed to create '{}': {e}", path.display())))?;
    writer
        .write_record(["NT", "NR", "NTR", "g2(0)"])
        .map_err(|e| AppError::Export(format!("Failed to write '{}': {e}", path.display())))?;
    for (nt, nr, ntr, g2) in rows {
        writer
            .write_record(&[nt.to_string(), nr.to_string(), ntr.to_string(), format!("{g2:.6}")])
            .map_err(|e| AppError::Export(format!("Failed to write '{}': {e}", path.display())))?;
    }
    writer.flush().map_err(|e| AppError::io(path, e))
}

fn write_info_file(path: &Path, spec: &SynthSpec) -> Result<(), AppError> {
    let text = format!(
        "Synthetic scan (seed {})\nMeasurement time: {} us\nCoincidence window: {} ns\n",
        spec.seed,
        spec.measurement_time_s * 1e6,
        spec.window_ns
    );
    fs::write(path, text).map_err(|e| AppError::io(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::ingest::{discover_position_dirs, load_position};

    fn small() -> SynthSpec {
        SynthSpec {
            x_min_mm: -1.0,
            x_max_mm: 1.0,
            positions: 5,
            intervals: 6,
            ..SynthSpec::default()
        }
    }

    #[test]
    fn grid_is_evenly_spaced() {
        let g = small().grid();
        assert_eq!(g, vec![-1.0, -0.5, 0.0, 0.5, 1.0]);
    }

    #[test]
    fn dataset_loads_back() {
        let tmp = tempfile::tempdir().unwrap();
        let spec = small();
        generate_dataset(tmp.path(), &spec).unwrap();

        let dirs = discover_position_dirs(tmp.path()).unwrap();
        assert_eq!(dirs.len(), 5);
        assert_eq!(dirs[0].0, -1.0);

        let (x, folder) = &dirs[2];
        let record = load_position(folder, *x, &spec.counts_file, &spec.info_file).unwrap();
        assert_eq!(record.rows.len(), 6);
        assert!((record.measurement_time_s - 1.0).abs() < 1e-12);
        assert_eq!(record.window_ns, 25.0);
        for row in &record.rows {
            let acc = row.singles_t * row.singles_r * 25e-9;
            assert!((row.g2 - row.coincidences_tr / acc).abs() < 1e-5);
        }
    }

    #[test]
    fn same_seed_same_counts() {
        let a = tempfile::tempdir().unwrap();
        let b = tempfile::tempdir().unwrap();
        let spec = small();
        generate_dataset(a.path(), &spec).unwrap();
        generate_dataset(b.path(), &spec).unwrap();

        let name = format!("{:.4}", 0.5);
        let read = |d: &Path| fs::read_to_string(d.join(&name).join(DEFAULT_COUNTS_FILE)).unwrap();
        assert_eq!(read(a.path()), read(b.path()));
    }

    #[test]
    fn rejects_zero_positions() {
        let tmp = tempfile::tempdir().unwrap();
        let spec = SynthSpec { positions: 0, ..small() };
        assert!(matches!(generate_dataset(tmp.path(), &spec), Err(AppError::Configuration(_))));
    }
}
