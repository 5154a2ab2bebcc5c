//! Tensor adapter: signal windows and one-hot labels
//!
//! The encoder is fit on the partition it encodes, so two partitions that
//! observe different label sets produce one-hot columns with different
//! meaning. `categories_consistent` lets callers detect that case.

use burn::prelude::*;
use serde::{Deserialize, Serialize};

use crate::dataset::burn_dataset::HeatItem;
use crate::dataset::table::{Category, SignalTable};
use crate::utils::error::{HeatError, Result};

/// One-hot encoder over sorted categories
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OneHotEncoder {
    categories: Vec<Category>,
}

impl OneHotEncoder {
    /// Fit on the observed values; categories are sorted and deduplicated
    pub fn fit(labels: &[Category]) -> Result<Self> {
        if labels.is_empty() {
            return Err(HeatError::EmptyDataset(
                "cannot fit a one-hot encoder without labels".to_string(),
            ));
        }
        let mut categories = labels.to_vec();
        categories.sort();
        categories.dedup();
        Ok(Self { categories })
    }

    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    pub fn num_categories(&self) -> usize {
        self.categories.len()
    }

    pub fn index_of(&self, label: &Category) -> Option<usize> {
        self.categories.binary_search(label).ok()
    }

    /// Row-major `[labels.len(), num_categories]` one-hot matrix
    pub fn transform(&self, labels: &[Category]) -> Result<Vec<f32>> {
        let k = self.num_categories();
        let mut encoded = vec![0.0f32; labels.len() * k];
        for (row, label) in labels.iter().enumerate() {
            let idx = self.index_of(label).ok_or_else(|| {
                HeatError::InvalidInput(format!("label '{}' was not seen when fitting", label))
            })?;
            encoded[row * k + idx] = 1.0;
        }
        Ok(encoded)
    }

    pub fn fit_transform(labels: &[Category]) -> Result<(Self, Vec<f32>)> {
        let encoder = Self::fit(labels)?;
        let encoded = encoder.transform(labels)?;
        Ok((encoder, encoded))
    }

    /// Category names in column order
    pub fn labels(&self) -> Vec<String> {
        self.categories.iter().map(|c| c.to_string()).collect()
    }
}

/// True when every encoder has the same category list
pub fn categories_consistent(encoders: &[&OneHotEncoder]) -> bool {
    encoders.windows(2).all(|w| w[0].categories == w[1].categories)
}

/// Model-ready arrays of one partition
#[derive(Debug, Clone)]
pub struct TensorPair {
    /// `[batch, 1, timesteps]`, row-major
    pub x: Vec<f32>,
    /// `[batch, num_categories]` one-hot, row-major
    pub y: Vec<f32>,
    pub batch: usize,
    pub timesteps: usize,
    pub encoder: OneHotEncoder,
}

impl TensorPair {
    pub fn x_shape(&self) -> [usize; 3] {
        [self.batch, 1, self.timesteps]
    }

    pub fn y_shape(&self) -> [usize; 2] {
        [self.batch, self.encoder.num_categories()]
    }

    pub fn to_tensors<B: Backend>(&self, device: &B::Device) -> (Tensor<B, 3>, Tensor<B, 2>) {
        let x = Tensor::<B, 3>::from_floats(TensorData::new(self.x.clone(), self.x_shape()), device);
        let y = Tensor::<B, 2>::from_floats(TensorData::new(self.y.clone(), self.y_shape()), device);
        (x, y)
    }

    /// Split back into per-row items for a burn `Dataset`
    pub fn items(&self) -> Vec<HeatItem> {
        let k = self.encoder.num_categories();
        self.x
            .chunks(self.timesteps)
            .zip(self.y.chunks(k))
            .map(|(signal, target)| HeatItem::new(signal.to_vec(), target.to_vec()))
            .collect()
    }
}

/// Convert a partition into `(x, y)`.
///
/// `x` is the last `timesteps` columns as one channel; `y` one-hot encodes
/// `label_column` with an encoder fit on this partition only.
pub fn table_to_tensors(table: &SignalTable, label_column: &str, timesteps: usize) -> Result<TensorPair> {
    if table.is_empty() {
        return Err(HeatError::EmptyDataset(
            "cannot build tensors from an empty partition".to_string(),
        ));
    }
    let x = table.trailing_values(timesteps)?;
    let labels = table.categories(label_column)?;
    let (encoder, y) = OneHotEncoder::fit_transform(&labels)?;

    Ok(TensorPair {
        x,
        y,
        batch: table.len(),
        timesteps,
        encoder,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::table::Cell;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    fn partition(labels: &[f64], timesteps: usize) -> SignalTable {
        let mut columns = vec!["Heat".to_string(), "meta".to_string()];
        columns.extend((0..timesteps).map(|i| format!("downsampled_{}", i)));
        let mut table = SignalTable::new(columns);
        for (r, &label) in labels.iter().enumerate() {
            let mut row = vec![Cell::Number(label), Cell::Number(-1.0)];
            row.extend((0..timesteps).map(|t| Cell::Number((r * 1000 + t) as f64)));
            table.push_row(row).unwrap();
        }
        table
    }

    #[test]
    fn test_one_hot_sorted_categories() {
        let labels = vec![Category::Number(1.0), Category::Number(0.0), Category::Number(1.0)];
        let (encoder, encoded) = OneHotEncoder::fit_transform(&labels).unwrap();
        assert_eq!(encoder.labels(), vec!["0", "1"]);
        assert_eq!(encoded, vec![0.0, 1.0, 1.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_unseen_label_rejected() {
        let encoder = OneHotEncoder::fit(&[Category::Number(0.0)]).unwrap();
        assert!(encoder.transform(&[Category::Number(1.0)]).is_err());
        assert!(OneHotEncoder::fit(&[]).is_err());
    }

    #[test]
    fn test_shapes_and_column_order() {
        let pair = table_to_tensors(&partition(&[0.0, 1.0, 1.0], 100), "Heat", 100).unwrap();
        assert_eq!(pair.x_shape(), [3, 1, 100]);
        assert_eq!(pair.y_shape(), [3, 2]);
        assert_eq!(pair.x[0], 0.0);
        assert_eq!(pair.x[99], 99.0);
        assert_eq!(pair.x[100], 1000.0);

        let (x, y) = pair.to_tensors::<TestBackend>(&Default::default());
        assert_eq!(x.dims(), [3, 1, 100]);
        assert_eq!(y.dims(), [3, 2]);
    }

    #[test]
    fn test_per_partition_fit_can_disagree() {
        let both = table_to_tensors(&partition(&[0.0, 1.0], 4), "Heat", 4).unwrap();
        let only_heat = table_to_tensors(&partition(&[1.0, 1.0], 4), "Heat", 4).unwrap();
        assert_eq!(only_heat.y_shape(), [2, 1]);
        assert!(!categories_consistent(&[&both.encoder, &only_heat.encoder]));
        assert!(categories_consistent(&[&both.encoder, &both.encoder]));
    }

    #[test]
    fn test_items_match_rows() {
        let pair = table_to_tensors(&partition(&[1.0, 0.0], 4), "Heat", 4).unwrap();
        let items = pair.items();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].signal, vec![0.0, 1.0, 2.0, 3.0]);
        assert_eq!(items[0].label, 1);
        assert_eq!(items[1].label, 0);
    }

    #[test]
    fn test_errors() {
        let empty = partition(&[], 4);
        assert!(matches!(table_to_tensors(&empty, "Heat", 4), Err(HeatError::EmptyDataset(_))));
        let narrow = partition(&[0.0], 4);
        assert!(matches!(
            table_to_tensors(&narrow, "Heat", 100),
            Err(HeatError::SizeMismatch { .. })
        ));
    }
}
