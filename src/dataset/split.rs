//! Train / validation / test splitting
//!
//! The split is deterministic and reproducible:
//! 1. All rows are shuffled with a fixed seed.
//! 2. **Test (20%)** is drawn stratified on the label column.
//! 3. **Validation (20% of the rest)** is drawn at random from the remainder.
//! 4. **Train** is everything left (64% of the source).

use std::collections::BTreeMap;

use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::dataset::table::{Category, SignalTable};
use crate::utils::error::{HeatError, Result};

/// Configuration for dataset splitting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitConfig {
    /// Fraction of all rows held out for testing
    pub test_fraction: f64,
    /// Fraction of the non-test rows used for validation
    pub validation_fraction: f64,
    /// Seed for the initial full-dataset shuffle
    pub shuffle_seed: u64,
    /// Seed for the test split
    pub test_seed: u64,
    /// Seed for the validation split
    pub validation_seed: u64,
    /// Column to stratify the test split on; `None` disables stratification
    pub stratify_column: Option<String>,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            test_fraction: 0.2,
            validation_fraction: 0.2,
            shuffle_seed: 42,
            test_seed: 42,
            validation_seed: 42,
            stratify_column: Some("Heat".to_string()),
        }
    }
}

impl SplitConfig {
    /// Create a configuration with custom fractions and one seed for every step
    pub fn new(test_fraction: f64, validation_fraction: f64, seed: u64) -> Result<Self> {
        let config = Self {
            test_fraction,
            validation_fraction,
            shuffle_seed: seed,
            test_seed: seed,
            validation_seed: seed,
            ..Default::default()
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("test_fraction", self.test_fraction),
            ("validation_fraction", self.validation_fraction),
        ] {
            if !(value > 0.0 && value < 1.0) {
                return Err(HeatError::Config(format!(
                    "{} must be in (0, 1), got {}",
                    name, value
                )));
            }
        }
        Ok(())
    }
}

/// Source row indices of each partition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitIndices {
    pub train: Vec<usize>,
    pub validation: Vec<usize>,
    pub test: Vec<usize>,
}

/// The three partitions of a dataset
#[derive(Debug, Clone)]
pub struct DatasetSplits {
    pub train: SignalTable,
    pub validation: SignalTable,
    pub test: SignalTable,
    pub indices: SplitIndices,
}

impl DatasetSplits {
    /// Partition `table` according to `config`
    pub fn from_table(table: &SignalTable, config: &SplitConfig) -> Result<Self> {
        config.validate()?;

        let n = table.len();
        if n == 0 {
            return Err(HeatError::EmptyDataset(
                "cannot split a dataset without rows".to_string(),
            ));
        }

        let mut order: Vec<usize> = (0..n).collect();
        order.shuffle(&mut ChaCha8Rng::seed_from_u64(config.shuffle_seed));

        let n_test = split_size(n, config.test_fraction, "test")?;
        let mut test_rng = ChaCha8Rng::seed_from_u64(config.test_seed);
        let (rest, test) = match &config.stratify_column {
            Some(column) => {
                let labels = table.categories(column)?;
                stratified_take(&order, &labels, n_test, &mut test_rng)?
            }
            None => random_take(&order, n_test, &mut test_rng),
        };

        let n_val = split_size(rest.len(), config.validation_fraction, "validation")?;
        let mut val_rng = ChaCha8Rng::seed_from_u64(config.validation_seed);
        let (train, validation) = random_take(&rest, n_val, &mut val_rng);

        let indices = SplitIndices {
            train,
            validation,
            test,
        };

        info!(
            "Split {} rows into train={} validation={} test={}",
            n,
            indices.train.len(),
            indices.validation.len(),
            indices.test.len()
        );

        Ok(Self {
            train: table.select_rows(&indices.train)?,
            validation: table.select_rows(&indices.validation)?,
            test: table.select_rows(&indices.test)?,
            indices,
        })
    }

    /// Per-partition sizes and label counts
    pub fn stats(&self, label_column: &str) -> Result<SplitStats> {
        let counts = |t: &SignalTable| -> Result<Vec<(String, usize)>> {
            Ok(t.label_counts(label_column)?
                .into_iter()
                .map(|(c, n)| (c.to_string(), n))
                .collect())
        };
        Ok(SplitStats {
            train_size: self.train.len(),
            validation_size: self.validation.len(),
            test_size: self.test.len(),
            train_labels: counts(&self.train)?,
            validation_labels: counts(&self.validation)?,
            test_labels: counts(&self.test)?,
        })
    }
}

/// Convenience wrapper around [`DatasetSplits::from_table`]
pub fn split_dataset(table: &SignalTable, config: &SplitConfig) -> Result<DatasetSplits> {
    DatasetSplits::from_table(table, config)
}

/// `ceil(n * fraction)`, rejecting splits that leave either side empty
fn split_size(n: usize, fraction: f64, what: &str) -> Result<usize> {
    let size = (n as f64 * fraction).ceil() as usize;
    if size == 0 || size >= n {
        return Err(HeatError::Dataset(format!(
            "{} split of {} rows with fraction {} leaves an empty partition",
            what, n, fraction
        )));
    }
    Ok(size)
}

/// Permute `pool` and take the first `count` as the held-out side.
/// Returns `(kept, taken)`.
fn random_take(pool: &[usize], count: usize, rng: &mut ChaCha8Rng) -> (Vec<usize>, Vec<usize>) {
    let mut shuffled = pool.to_vec();
    shuffled.shuffle(rng);
    let kept = shuffled.split_off(count);
    (kept, shuffled)
}

/// Take `count` rows from `order` preserving label proportions.
///
/// Each class receives `floor(n_c * count / n)`; leftover slots go to the
/// largest fractional remainders (larger class first, then category order).
fn stratified_take(
    order: &[usize],
    labels: &[Category],
    count: usize,
    rng: &mut ChaCha8Rng,
) -> Result<(Vec<usize>, Vec<usize>)> {
    let mut by_class: BTreeMap<&Category, Vec<usize>> = BTreeMap::new();
    for &row in order {
        by_class.entry(&labels[row]).or_default().push(row);
    }

    if by_class.len() < 2 {
        return Err(HeatError::Dataset(format!(
            "stratified split needs at least 2 classes, found {}",
            by_class.len()
        )));
    }

    let n = order.len();
    let mut allocation: Vec<(usize, usize, usize)> = by_class
        .values()
        .enumerate()
        .map(|(class_pos, rows)| {
            let exact = rows.len() * count;
            (class_pos, exact / n, exact % n)
        })
        .collect();

    let assigned: usize = allocation.iter().map(|(_, take, _)| take).sum();
    let mut leftover = count - assigned;
    let sizes: Vec<usize> = by_class.values().map(|r| r.len()).collect();

    let mut by_remainder: Vec<usize> = (0..allocation.len()).collect();
    by_remainder.sort_by(|&a, &b| {
        allocation[b]
            .2
            .cmp(&allocation[a].2)
            .then(sizes[b].cmp(&sizes[a]))
            .then(a.cmp(&b))
    });
    for pos in by_remainder {
        if leftover == 0 {
            break;
        }
        if allocation[pos].1 < sizes[pos] {
            allocation[pos].1 += 1;
            leftover -= 1;
        }
    }

    let mut kept = Vec::with_capacity(n - count);
    let mut taken = Vec::with_capacity(count);
    for ((category, rows), (_, take, _)) in by_class.into_iter().zip(allocation) {
        let mut rows = rows;
        rows.shuffle(rng);
        debug!(
            "Stratum {}: {} of {} rows to the held-out side",
            category,
            take,
            rows.len()
        );
        let rest = rows.split_off(take);
        taken.extend(rows);
        kept.extend(rest);
    }

    kept.shuffle(rng);
    taken.shuffle(rng);
    Ok((kept, taken))
}

/// Statistics about a split
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SplitStats {
    pub train_size: usize,
    pub validation_size: usize,
    pub test_size: usize,
    pub train_labels: Vec<(String, usize)>,
    pub validation_labels: Vec<(String, usize)>,
    pub test_labels: Vec<(String, usize)>,
}

impl std::fmt::Display for SplitStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let fmt_labels = |labels: &[(String, usize)]| {
            labels
                .iter()
                .map(|(c, n)| format!("{}={}", c, n))
                .collect::<Vec<_>>()
                .join(", ")
        };
        writeln!(f, "Dataset Split Statistics:")?;
        writeln!(f, "  Train:      {:>6}  [{}]", self.train_size, fmt_labels(&self.train_labels))?;
        writeln!(f, "  Validation: {:>6}  [{}]", self.validation_size, fmt_labels(&self.validation_labels))?;
        writeln!(f, "  Test:       {:>6}  [{}]", self.test_size, fmt_labels(&self.test_labels))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::table::Cell;
    use std::collections::HashSet;

    fn labelled_table(labels: &[f64]) -> SignalTable {
        let mut table = SignalTable::new(vec!["id".into(), "Heat".into(), "v".into()]);
        for (i, &label) in labels.iter().enumerate() {
            table
                .push_row(vec![Cell::Number(i as f64), Cell::Number(label), Cell::Number(0.5)])
                .unwrap();
        }
        table
    }

    fn balanced(n: usize) -> SignalTable {
        let labels: Vec<f64> = (0..n).map(|i| (i % 2) as f64).collect();
        labelled_table(&labels)
    }

    #[test]
    fn test_partitions_are_disjoint_and_complete() {
        let table = balanced(100);
        let splits = split_dataset(&table, &SplitConfig::default()).unwrap();
        let idx = &splits.indices;

        let train: HashSet<_> = idx.train.iter().collect();
        let val: HashSet<_> = idx.validation.iter().collect();
        let test: HashSet<_> = idx.test.iter().collect();
        assert!(train.is_disjoint(&val));
        assert!(train.is_disjoint(&test));
        assert!(val.is_disjoint(&test));

        let mut all: Vec<usize> = idx.train.iter().chain(&idx.validation).chain(&idx.test).copied().collect();
        all.sort();
        assert_eq!(all, (0..100).collect::<Vec<_>>());
    }

    #[test]
    fn test_sizes_64_16_20() {
        let splits = split_dataset(&balanced(100), &SplitConfig::default()).unwrap();
        assert_eq!(splits.test.len(), 20);
        assert_eq!(splits.validation.len(), 16);
        assert_eq!(splits.train.len(), 64);
    }

    #[test]
    fn test_sizes_within_rounding_for_odd_counts() {
        let splits = split_dataset(&balanced(97), &SplitConfig::default()).unwrap();
        // ceil(97 * 0.2) = 20, ceil(77 * 0.2) = 16
        assert_eq!(splits.test.len(), 20);
        assert_eq!(splits.validation.len(), 16);
        assert_eq!(splits.train.len(), 61);
    }

    #[test]
    fn test_stratified_test_balance() {
        let splits = split_dataset(&balanced(100), &SplitConfig::default()).unwrap();
        let counts = splits.test.label_counts("Heat").unwrap();
        let heat = counts[&Category::Number(1.0)] as i64;
        let cool = counts[&Category::Number(0.0)] as i64;
        assert!((heat - 10).abs() <= 2);
        assert!((cool - 10).abs() <= 2);
    }

    #[test]
    fn test_stratified_imbalanced_proportions() {
        // 30 positives out of 100 -> 6 of 20 test rows
        let labels: Vec<f64> = (0..100).map(|i| if i < 30 { 1.0 } else { 0.0 }).collect();
        let splits = split_dataset(&labelled_table(&labels), &SplitConfig::default()).unwrap();
        let counts = splits.test.label_counts("Heat").unwrap();
        assert_eq!(counts[&Category::Number(1.0)], 6);
        assert_eq!(counts[&Category::Number(0.0)], 14);
    }

    #[test]
    fn test_reproducibility() {
        let table = balanced(100);
        let a = split_dataset(&table, &SplitConfig::default()).unwrap();
        let b = split_dataset(&table, &SplitConfig::default()).unwrap();
        assert_eq!(a.indices, b.indices);
        assert_eq!(a.train, b.train);
    }

    #[test]
    fn test_different_seed_changes_assignment() {
        let table = balanced(100);
        let a = split_dataset(&table, &SplitConfig::default()).unwrap();
        let b = split_dataset(&table, &SplitConfig::new(0.2, 0.2, 7).unwrap()).unwrap();
        assert_ne!(a.indices, b.indices);
    }

    #[test]
    fn test_missing_label_column_fails() {
        let table = balanced(10);
        let config = SplitConfig {
            stratify_column: Some("Cold".into()),
            ..Default::default()
        };
        assert!(matches!(
            split_dataset(&table, &config),
            Err(HeatError::MissingColumn(c)) if c == "Cold"
        ));
    }

    #[test]
    fn test_single_class_fails() {
        let table = labelled_table(&[1.0; 20]);
        assert!(matches!(
            split_dataset(&table, &SplitConfig::default()),
            Err(HeatError::Dataset(_))
        ));
    }

    #[test]
    fn test_single_class_allowed_without_stratification() {
        let table = labelled_table(&[1.0; 20]);
        let config = SplitConfig {
            stratify_column: None,
            ..Default::default()
        };
        let splits = split_dataset(&table, &config).unwrap();
        assert_eq!(splits.test.len(), 4);
    }

    #[test]
    fn test_empty_dataset_fails() {
        let table = SignalTable::new(vec!["Heat".into()]);
        assert!(matches!(
            split_dataset(&table, &SplitConfig::default()),
            Err(HeatError::EmptyDataset(_))
        ));
    }

    #[test]
    fn test_too_small_dataset_fails() {
        let table = balanced(2);
        assert!(split_dataset(&table, &SplitConfig::default()).is_err());
    }

    #[test]
    fn test_invalid_fraction_rejected() {
        assert!(SplitConfig::new(1.0, 0.2, 42).is_err());
        assert!(SplitConfig::new(0.2, 0.0, 42).is_err());
    }

    #[test]
    fn test_stats_display() {
        let splits = split_dataset(&balanced(100), &SplitConfig::default()).unwrap();
        let stats = splits.stats("Heat").unwrap();
        assert_eq!(stats.train_size + stats.validation_size + stats.test_size, 100);
        let text = stats.to_string();
        assert!(text.contains("Test:"));
        assert!(text.contains("0=10"));
    }
}
