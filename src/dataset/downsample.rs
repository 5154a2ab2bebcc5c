//! Temporal downsampling of the trailing signal block
//!
//! The last `source_width` columns (600 by default) are replaced by
//! `source_width / group_size` columns (100), each the mean of one group of
//! consecutive samples.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::dataset::table::{Cell, SignalTable};
use crate::utils::error::{HeatError, Result};

/// Raw samples per window before downsampling
pub const RAW_WINDOW: usize = 600;

/// Samples averaged into one output value
pub const GROUP_SIZE: usize = 6;

/// Averages fixed-size groups of the trailing block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Downsampler {
    source_width: usize,
    group_size: usize,
}

impl Default for Downsampler {
    fn default() -> Self {
        Self {
            source_width: RAW_WINDOW,
            group_size: GROUP_SIZE,
        }
    }
}

impl Downsampler {
    pub fn new(source_width: usize, group_size: usize) -> Result<Self> {
        if group_size == 0 || source_width == 0 {
            return Err(HeatError::Config(
                "downsample widths must be greater than zero".to_string(),
            ));
        }
        if source_width % group_size != 0 {
            return Err(HeatError::Config(format!(
                "group size {} does not divide source width {}",
                group_size, source_width
            )));
        }
        Ok(Self {
            source_width,
            group_size,
        })
    }

    pub fn source_width(&self) -> usize {
        self.source_width
    }

    pub fn group_size(&self) -> usize {
        self.group_size
    }

    /// Number of produced columns
    pub fn target_width(&self) -> usize {
        self.source_width / self.group_size
    }

    /// Name of the `i`-th produced column
    pub fn column_name(i: usize) -> String {
        format!("downsampled_{}", i)
    }

    /// Replace the trailing block of every row with its group means.
    ///
    /// Leading columns pass through in order. Output width is
    /// `width - source_width + target_width`.
    pub fn apply(&self, table: &SignalTable) -> Result<SignalTable> {
        if table.is_empty() || table.width() == 0 {
            return Err(HeatError::EmptyDataset(
                "nothing to downsample".to_string(),
            ));
        }
        let start = table.trailing_start(self.source_width)?;

        let mut columns: Vec<String> = table.columns()[..start].to_vec();
        columns.extend((0..self.target_width()).map(Self::column_name));

        let mut out = SignalTable::new(columns);
        for (row_idx, row) in table.rows().iter().enumerate() {
            let mut new_row: Vec<Cell> = row[..start].to_vec();
            for (group_idx, group) in row[start..].chunks(self.group_size).enumerate() {
                let mut sum = 0.0f64;
                for (offset, cell) in group.iter().enumerate() {
                    let col = start + group_idx * self.group_size + offset;
                    sum += cell
                        .as_f64()
                        .ok_or_else(|| table.non_numeric(row_idx, col, cell))?;
                }
                new_row.push(Cell::Number(sum / self.group_size as f64));
            }
            out.push_row(new_row)?;
        }

        debug!(
            "Downsampled {} rows: {} -> {} columns",
            out.len(),
            table.width(),
            out.width()
        );
        Ok(out)
    }

    /// Downsample a single raw window of exactly `source_width` samples
    pub fn downsample_values(&self, values: &[f32]) -> Result<Vec<f32>> {
        if values.len() != self.source_width {
            return Err(HeatError::SizeMismatch {
                expected: self.source_width,
                actual: values.len(),
            });
        }
        Ok(values
            .chunks(self.group_size)
            .map(|g| (g.iter().map(|&v| v as f64).sum::<f64>() / self.group_size as f64) as f32)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Table with `lead` leading columns and `signal` trailing columns where
    /// each consecutive group of six holds 1..=6 plus the group index.
    fn synthetic(rows: usize, lead: usize, signal: usize) -> SignalTable {
        let mut columns: Vec<String> = (0..lead).map(|i| format!("meta_{}", i)).collect();
        columns.extend((0..signal).map(|i| format!("val_{}", i)));
        let mut table = SignalTable::new(columns);
        for r in 0..rows {
            let mut row: Vec<Cell> = (0..lead).map(|i| Cell::Number((r * 10 + i) as f64)).collect();
            row.extend((0..signal).map(|i| Cell::Number((i % 6 + 1) as f64 + (i / 6) as f64)));
            table.push_row(row).unwrap();
        }
        table
    }

    #[test]
    fn test_output_width_and_group_means() {
        let table = synthetic(3, 2, 600);
        let out = Downsampler::default().apply(&table).unwrap();

        assert_eq!(out.width(), table.width() - 500);
        assert_eq!(out.width(), 102);
        assert_eq!(out.columns()[2], "downsampled_0");
        assert_eq!(out.columns()[101], "downsampled_99");

        let row = out.row(0).unwrap();
        assert_eq!(row[2], Cell::Number(3.5));
        assert_eq!(row[3], Cell::Number(4.5));
        assert_eq!(row[101], Cell::Number(3.5 + 99.0));
    }

    #[test]
    fn test_leading_columns_pass_through() {
        let table = synthetic(2, 3, 600);
        let out = Downsampler::default().apply(&table).unwrap();
        assert_eq!(&out.columns()[..3], &table.columns()[..3]);
        assert_eq!(&out.row(1).unwrap()[..3], &table.row(1).unwrap()[..3]);
    }

    #[test]
    fn test_only_trailing_block_is_averaged() {
        // 606 columns: the first six stay untouched
        let table = synthetic(1, 6, 600);
        let out = Downsampler::default().apply(&table).unwrap();
        assert_eq!(out.width(), 106);
    }

    #[test]
    fn test_fewer_than_600_columns_fails() {
        let table = synthetic(2, 1, 594);
        let err = Downsampler::default().apply(&table).unwrap_err();
        assert!(matches!(
            err,
            HeatError::SizeMismatch {
                expected: 600,
                actual: 595
            }
        ));
    }

    #[test]
    fn test_empty_table_fails() {
        let err = Downsampler::default().apply(&SignalTable::default()).unwrap_err();
        assert!(matches!(err, HeatError::EmptyDataset(_)));
    }

    #[test]
    fn test_non_numeric_signal_fails() {
        let mut table = synthetic(1, 1, 600);
        let mut row = table.row(0).unwrap().to_vec();
        row[10] = Cell::Text("nan?".into());
        table.push_row(row).unwrap();
        assert!(matches!(
            Downsampler::default().apply(&table),
            Err(HeatError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_downsample_values_single_window() {
        let raw: Vec<f32> = (0..600).map(|i| (i % 6 + 1) as f32).collect();
        let out = Downsampler::default().downsample_values(&raw).unwrap();
        assert_eq!(out.len(), 100);
        assert!(out.iter().all(|&v| (v - 3.5).abs() < 1e-6));
        assert!(Downsampler::default().downsample_values(&raw[..100]).is_err());
    }

    #[test]
    fn test_new_validates_group_size() {
        assert!(Downsampler::new(600, 7).is_err());
        assert!(Downsampler::new(600, 0).is_err());
        assert_eq!(Downsampler::new(60, 6).unwrap().target_width(), 10);
    }
}
