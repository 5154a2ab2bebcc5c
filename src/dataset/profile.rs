//! Dataset summaries and per-class signal profiles

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::dataset::table::{Category, SignalTable};
use crate::utils::charts::{generate_band_chart, linspace, BandSeries, SERIES_COLORS};
use crate::utils::error::{HeatError, Result};

/// Column-wise mean and sample std of one label class
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassProfile {
    pub category: Category,
    pub count: usize,
    pub mean: Vec<f64>,
    /// ddof = 1; zero when the class has a single row
    pub std: Vec<f64>,
}

/// Per-class profiles over the last `timesteps` columns, in category order
pub fn class_profiles(table: &SignalTable, label_column: &str, timesteps: usize) -> Result<Vec<ClassProfile>> {
    if table.is_empty() {
        return Err(HeatError::EmptyDataset("no rows to profile".to_string()));
    }
    let labels = table.categories(label_column)?;
    let values = table.trailing_values(timesteps)?;

    let mut profiles = Vec::new();
    for (category, count) in table.label_counts(label_column)? {
        let rows: Vec<&[f32]> = values
            .chunks(timesteps)
            .zip(labels.iter())
            .filter(|(_, label)| **label == category)
            .map(|(row, _)| row)
            .collect();

        let mut mean = vec![0.0f64; timesteps];
        for row in &rows {
            for (m, &v) in mean.iter_mut().zip(row.iter()) {
                *m += v as f64;
            }
        }
        mean.iter_mut().for_each(|m| *m /= count as f64);

        let mut std = vec![0.0f64; timesteps];
        if count > 1 {
            for row in &rows {
                for ((s, &v), m) in std.iter_mut().zip(row.iter()).zip(mean.iter()) {
                    *s += (v as f64 - m).powi(2);
                }
            }
            std.iter_mut().for_each(|s| *s = (*s / (count - 1) as f64).sqrt());
        }

        profiles.push(ClassProfile {
            category,
            count,
            mean,
            std,
        });
    }
    Ok(profiles)
}

/// Render profiles as mean lines with std bands over `minutes` of signal
pub fn plot_class_profiles(
    profiles: &[ClassProfile],
    label_column: &str,
    minutes: f64,
    output_path: &Path,
) -> Result<()> {
    let series: Vec<BandSeries> = profiles
        .iter()
        .enumerate()
        .map(|(i, p)| BandSeries {
            name: format!("{} = {}", label_column.to_uppercase(), p.category),
            x: linspace(0.0, minutes, p.mean.len()),
            mean: p.mean.clone(),
            spread: p.std.clone(),
            color: SERIES_COLORS[i % SERIES_COLORS.len()].to_string(),
        })
        .collect();

    let title = format!(
        "Time Series (Mean and Standard Deviation) Over {} Minutes by {} Class",
        minutes,
        label_column.to_uppercase()
    );
    generate_band_chart(&title, "Time (minutes)", "Value", &series, output_path)?;
    Ok(())
}

/// Shape, label balance and value range of a table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetSummary {
    pub rows: usize,
    pub columns: usize,
    pub label_counts: Vec<(String, usize)>,
    pub signal_width: usize,
    pub signal_min: f64,
    pub signal_max: f64,
    pub signal_mean: f64,
    pub signal_std: f64,
}

impl DatasetSummary {
    /// Summarize `table`, treating the last `signal_width` columns as signal
    pub fn from_table(table: &SignalTable, label_column: &str, signal_width: usize) -> Result<Self> {
        if table.is_empty() {
            return Err(HeatError::EmptyDataset("no rows to summarize".to_string()));
        }
        let values = table.trailing_values(signal_width)?;
        let n = values.len() as f64;
        let mean = values.iter().map(|&v| v as f64).sum::<f64>() / n;
        let variance = if values.len() > 1 {
            values.iter().map(|&v| (v as f64 - mean).powi(2)).sum::<f64>() / (n - 1.0)
        } else {
            0.0
        };
        let (min, max) = values.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v as f64), hi.max(v as f64))
        });

        Ok(Self {
            rows: table.len(),
            columns: table.width(),
            label_counts: table
                .label_counts(label_column)?
                .into_iter()
                .map(|(c, n)| (c.to_string(), n))
                .collect(),
            signal_width,
            signal_min: min,
            signal_max: max,
            signal_mean: mean,
            signal_std: variance.sqrt(),
        })
    }
}

impl std::fmt::Display for DatasetSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Dataset Summary:")?;
        writeln!(f, "  Rows:          {}", self.rows)?;
        writeln!(f, "  Columns:       {}", self.columns)?;
        for (label, count) in &self.label_counts {
            writeln!(f, "  Label {:<8} {}", label, count)?;
        }
        writeln!(f, "  Signal width:  {}", self.signal_width)?;
        writeln!(f, "  Signal min:    {:.6}", self.signal_min)?;
        writeln!(f, "  Signal max:    {:.6}", self.signal_max)?;
        writeln!(f, "  Signal mean:   {:.6}", self.signal_mean)?;
        writeln!(f, "  Signal std:    {:.6}", self.signal_std)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::table::Cell;

    fn table() -> SignalTable {
        let mut t = SignalTable::new(vec!["Heat".into(), "s0".into(), "s1".into()]);
        t.push_row(vec![Cell::Number(0.0), Cell::Number(1.0), Cell::Number(2.0)]).unwrap();
        t.push_row(vec![Cell::Number(0.0), Cell::Number(3.0), Cell::Number(2.0)]).unwrap();
        t.push_row(vec![Cell::Number(1.0), Cell::Number(5.0), Cell::Number(6.0)]).unwrap();
        t
    }

    #[test]
    fn test_class_profiles_mean_and_sample_std() {
        let profiles = class_profiles(&table(), "Heat", 2).unwrap();
        assert_eq!(profiles.len(), 2);

        let cool = &profiles[0];
        assert_eq!(cool.count, 2);
        assert_eq!(cool.mean, vec![2.0, 2.0]);
        assert!((cool.std[0] - 2.0f64.sqrt()).abs() < 1e-12);
        assert_eq!(cool.std[1], 0.0);

        let heat = &profiles[1];
        assert_eq!(heat.std, vec![0.0, 0.0]);
    }

    #[test]
    fn test_summary() {
        let summary = DatasetSummary::from_table(&table(), "Heat", 2).unwrap();
        assert_eq!(summary.rows, 3);
        assert_eq!(summary.signal_min, 1.0);
        assert_eq!(summary.signal_max, 6.0);
        assert!((summary.signal_mean - 19.0 / 6.0).abs() < 1e-12);
        assert!(summary.to_string().contains("Label 0"));
    }

    #[test]
    fn test_plot_writes_svg() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model_input.svg");
        let profiles = class_profiles(&table(), "Heat", 2).unwrap();
        plot_class_profiles(&profiles, "Heat", 10.0, &path).unwrap();
        let svg = std::fs::read_to_string(&path).unwrap();
        assert!(svg.contains("HEAT = 1"));
    }

    #[test]
    fn test_empty_table_rejected() {
        let empty = SignalTable::new(vec!["Heat".into()]);
        assert!(class_profiles(&empty, "Heat", 1).is_err());
        assert!(DatasetSummary::from_table(&empty, "Heat", 1).is_err());
    }
}
