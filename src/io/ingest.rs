//! Measurement folder discovery and parsing.
//!
//! This module is responsible for turning a directory of per-position folders
//! into a clean, sorted list of `PositionRecord`s that are safe to aggregate.
//!
//! Expected layout:
//!
//! ```text
//! <data_dir>/
//!   0.0/  HBT_2D.csv  infoMedicion.txt
//!   0.3/  HBT_2D.csv  infoMedicion.txt
//!   ...
//! ```
//!
//! Design goals:
//! - **Strict schema** for the count table (clear errors naming the file)
//! - **No silent defaults** for metadata: a missing duration or window is fatal
//! - **Deterministic output**: sorted by `x_mm` regardless of load order
//! - **Separation of concerns**: no statistics here

use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};

use csv::StringRecord;
use rayon::prelude::*;

use crate::domain::{ExperimentConfig, IntervalRow, PositionRecord};
use crate::error::AppError;

/// Count-table columns (normalized header names).
const COL_SINGLES_T: &str = "nt";
const COL_SINGLES_R: &str = "nr";
const COL_COINCIDENCES: &str = "ntr";
const COL_G2: &str = "g2(0)";

/// Punctuation stripped from metadata tokens before matching.
const TOKEN_PUNCTUATION: [char; 4] = [',', ';', '(', ')'];

/// Unit markers recognised in the metadata file.
const MICROSECOND_MARKERS: [&str; 6] = ["us", "µs", "μs", "micro", "microsecond", "microseconds"];
const NANOSECOND_MARKERS: [&str; 3] = ["ns", "nanosecond", "nanoseconds"];

/// Load every numeric position folder under the configured data directory.
pub fn load_positions(config: &ExperimentConfig) -> Result<Vec<PositionRecord>, AppError> {
    let dirs = discover_position_dirs(config.data_dir())?;

    let mut records = dirs
        .par_iter()
        .map(|(x_mm, folder)| load_position(folder, *x_mm, config.counts_file(), config.info_file()))
        .collect::<Result<Vec<_>, _>>()?;

    records.sort_by(|a, b| a.x_mm.total_cmp(&b.x_mm));

    log::info!(
        "Loaded {} position(s) from {}",
        records.len(),
        config.data_dir().display()
    );
    Ok(records)
}

/// Immediate subdirectories whose names parse as a finite `x_mm`.
///
/// Non-numeric folders are skipped. The result is sorted ascending by `x_mm`.
pub fn discover_position_dirs(base: &Path) -> Result<Vec<(f64, PathBuf)>, AppError> {
    if !base.is_dir() {
        return Err(AppError::MissingInput {
            path: base.to_path_buf(),
        });
    }

    let entries = std::fs::read_dir(base).map_err(|e| AppError::io(base, e))?;
    let mut out = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| AppError::io(base, e))?;
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        let name = entry.file_name();
        match name.to_str().and_then(parse_position_name) {
            Some(x_mm) => out.push((x_mm, path)),
            None => log::debug!("Skipping non-position folder {}", path.display()),
        }
    }

    out.sort_by(|a, b| a.0.total_cmp(&b.0));
    Ok(out)
}

fn parse_position_name(name: &str) -> Option<f64> {
    let v = name.trim().parse::<f64>().ok()?;
    if v.is_finite() { Some(v) } else { None }
}

/// Load a single position folder.
pub fn load_position(
    folder: &Path,
    x_mm: f64,
    counts_file: &str,
    info_file: &str,
) -> Result<PositionRecord, AppError> {
    let counts_path = folder.join(counts_file);
    let info_path = folder.join(info_file);

    for path in [&counts_path, &info_path] {
        if !path.is_file() {
            return Err(AppError::MissingInput { path: path.clone() });
        }
    }

    let (measurement_time_s, window_ns) = read_info_file(&info_path)?;
    let rows = read_count_table(&counts_path)?;

    log::debug!(
        "x={x_mm} mm: {} interval(s), dt={measurement_time_s} s, window={window_ns} ns",
        rows.len()
    );

    Ok(PositionRecord {
        x_mm,
        rows,
        measurement_time_s,
        window_ns,
        folder: folder.to_path_buf(),
    })
}

/// Parse the metadata file into `(measurement_time_s, window_ns)`.
pub fn read_info_file(path: &Path) -> Result<(f64, f64), AppError> {
    let bytes = std::fs::read(path).map_err(|e| AppError::io(path, e))?;
    let text = String::from_utf8_lossy(&bytes);
    let (time_us, window_ns) = parse_info_text(&text);

    let time_us = time_us.ok_or_else(|| {
        AppError::Configuration(format!(
            "Could not parse measurement time (µs) from '{}'",
            path.display()
        ))
    })?;
    let window_ns = window_ns.ok_or_else(|| {
        AppError::Configuration(format!(
            "Could not parse coincidence window (ns) from '{}'",
            path.display()
        ))
    })?;

    if time_us <= 0.0 {
        return Err(AppError::Configuration(format!(
            "Measurement time must be > 0 in '{}' (got {time_us} us)",
            path.display()
        )));
    }
    if window_ns <= 0.0 {
        return Err(AppError::Configuration(format!(
            "Coincidence window must be > 0 in '{}' (got {window_ns} ns)",
            path.display()
        )));
    }

    Ok((time_us * 1e-6, window_ns))
}

/// Scan free-form metadata text for `(duration_us, window_ns)`.
///
/// The first line carrying a unit marker wins for each value. On that line the
/// number directly before the marker is preferred, else the first number on the
/// line. Glued forms like `500us` are accepted.
pub fn parse_info_text(text: &str) -> (Option<f64>, Option<f64>) {
    let mut time_us = None;
    let mut window_ns = None;

    for line in text.lines() {
        let clean = line.to_lowercase().replace(['=', ':'], " ");
        let tokens: Vec<&str> = clean.split_whitespace().collect();

        if time_us.is_none() {
            time_us = value_with_unit(&tokens, &MICROSECOND_MARKERS);
        }
        if window_ns.is_none() {
            window_ns = value_with_unit(&tokens, &NANOSECOND_MARKERS);
        }
        if time_us.is_some() && window_ns.is_some() {
            break;
        }
    }

    (time_us, window_ns)
}

fn value_with_unit(tokens: &[&str], markers: &[&str]) -> Option<f64> {
    for (i, tok) in tokens.iter().enumerate() {
        let tok = tok.trim_matches(TOKEN_PUNCTUATION);
        if markers.contains(&tok) {
            let before = i.checked_sub(1).and_then(|j| parse_number(tokens[j]));
            return before.or_else(|| tokens.iter().find_map(|t| parse_number(t)));
        }
        for m in markers {
            if let Some(num) = tok.strip_suffix(m) {
                if let Some(v) = parse_number(num) {
                    return Some(v);
                }
            }
        }
    }
    None
}

fn parse_number(s: &str) -> Option<f64> {
    let s = s.trim_matches(TOKEN_PUNCTUATION);
    let v = s.parse::<f64>().ok()?;
    if v.is_finite() { Some(v) } else { None }
}

/// Read the interval count table (`NT, NR, NTR, g2(0)`).
pub fn read_count_table(path: &Path) -> Result<Vec<IntervalRow>, AppError> {
    let malformed = |message: String| AppError::MalformedTable {
        path: path.to_path_buf(),
        message,
    };

    let file = File::open(path).map_err(|e| AppError::io(path, e))?;
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(file);

    let headers = reader
        .headers()
        .map_err(|e| malformed(format!("Failed to read headers: {e}")))?
        .clone();
    let header_map = build_header_map(&headers);

    for col in [COL_SINGLES_T, COL_SINGLES_R, COL_COINCIDENCES, COL_G2] {
        if !header_map.contains_key(col) {
            return Err(malformed(format!("Missing required column `{col}`")));
        }
    }

    let mut rows = Vec::new();
    for (idx, result) in reader.records().enumerate() {
        // +2: records start after the header line, and lines are 1-based.
        let line = idx + 2;
        let record = result.map_err(|e| malformed(format!("CSV parse error on line {line}: {e}")))?;

        // Trailing blank lines show up as single empty fields.
        if record.iter().all(|f| f.is_empty()) {
            continue;
        }

        let field = |name: &str| {
            get_required_f64(&record, &header_map, name)
                .map_err(|msg| malformed(format!("line {line}: {msg}")))
        };
        rows.push(IntervalRow {
            singles_t: field(COL_SINGLES_T)?,
            singles_r: field(COL_SINGLES_R)?,
            coincidences_tr: field(COL_COINCIDENCES)?,
            g2: field(COL_G2)?,
        });
    }

    if rows.is_empty() {
        return Err(malformed("No interval rows".to_string()));
    }
    Ok(rows)
}

fn build_header_map(headers: &StringRecord) -> HashMap<String, usize> {
    headers
        .iter()
        .enumerate()
        .map(|(idx, name)| (normalize_header_name(name), idx))
        .collect()
}

fn normalize_header_name(name: &str) -> String {
    // Spreadsheet exports sometimes prefix the first header with a UTF-8 BOM.
    let name = name.trim().trim_start_matches('\u{feff}');
    name.to_ascii_lowercase()
}

fn get_required_f64(
    record: &StringRecord,
    header_map: &HashMap<String, usize>,
    name: &str,
) -> Result<f64, String> {
    let idx = header_map
        .get(name)
        .ok_or_else(|| format!("Missing required column: `{name}`"))?;
    let raw = record
        .get(*idx)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| format!("Missing required value: `{name}`"))?;
    let v = raw
        .parse::<f64>()
        .map_err(|_| format!("Invalid number '{raw}' in `{name}`"))?;
    if v.is_finite() {
        Ok(v)
    } else {
        Err(format!("Non-finite value in `{name}`"))
    }
}
