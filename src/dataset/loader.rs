//! Signal CSV Loader
//!
//! Discovers `<data_root>/*/<training_subdir>/*.csv` and concatenates every
//! file into one `SignalTable`. All files must share a header.

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::dataset::table::{Cell, SignalTable};
use crate::utils::error::{HeatError, Result};

/// Training directories matching `<root>/*/<subdir>`, sorted
pub fn discover_training_dirs(root: &Path, subdir: &str) -> Vec<PathBuf> {
    let mut dirs: Vec<PathBuf> = WalkDir::new(root)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_dir())
        .map(|e| e.path().join(subdir))
        .filter(|p| p.is_dir())
        .collect();
    dirs.sort();
    dirs
}

/// CSV files directly inside `dir`, sorted
pub fn discover_csv_files(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.path().to_path_buf())
        .filter(|p| {
            p.extension()
                .map(|ext| ext.to_string_lossy().eq_ignore_ascii_case("csv"))
                .unwrap_or(false)
        })
        .collect();
    files.sort();
    files
}

/// Read one CSV file with a header row
pub fn read_csv_file(path: &Path) -> Result<SignalTable> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)?;

    let columns: Vec<String> = reader.headers()?.iter().map(|h| h.to_string()).collect();
    let mut table = SignalTable::new(columns);

    for record in reader.records() {
        let record = record?;
        let row: Vec<Cell> = record.iter().map(Cell::parse).collect();
        table.push_row(row).map_err(|e| {
            HeatError::Dataset(format!("{}: {}", path.display(), e))
        })?;
    }

    debug!("Read {} rows from {:?}", table.len(), path);
    Ok(table)
}

/// Load and concatenate every CSV under the matching training directories.
///
/// A missing root or a tree without CSV files yields an empty table; the
/// downstream stages reject it.
pub fn load_signal_table(root: &Path, training_subdir: &str) -> Result<SignalTable> {
    info!("Scanning {:?} for */{}/*.csv", root, training_subdir);

    let dirs = discover_training_dirs(root, training_subdir);
    let mut table = SignalTable::default();
    let mut file_count = 0usize;

    for dir in &dirs {
        for file in discover_csv_files(dir) {
            let part = read_csv_file(&file)?;
            table.append(part).map_err(|e| {
                HeatError::Dataset(format!("{}: {}", file.display(), e))
            })?;
            file_count += 1;
        }
    }

    if file_count == 0 {
        warn!(
            "No CSV files found under {:?} (matched {} training directories)",
            root,
            dirs.len()
        );
    } else {
        info!(
            "Loaded {} rows x {} columns from {} files in {} directories",
            table.len(),
            table.width(),
            file_count,
            dirs.len()
        );
    }

    Ok(table)
}
