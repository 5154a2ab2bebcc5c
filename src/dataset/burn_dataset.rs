//! Burn Dataset Integration for signal windows
//!
//! Implements Burn's `Dataset` trait and a `Batcher` producing
//! `[batch, 1, timesteps]` signal tensors with integer class targets.

use std::sync::Arc;

use burn::data::dataloader::batcher::Batcher;
use burn::data::dataset::Dataset;
use burn::prelude::*;
use serde::{Deserialize, Serialize};

/// A single window ready for Burn
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HeatItem {
    /// Downsampled window, one channel
    pub signal: Vec<f32>,
    /// One-hot target row
    pub target: Vec<f32>,
    /// Index of the hot column
    pub label: usize,
}

impl HeatItem {
    pub fn new(signal: Vec<f32>, target: Vec<f32>) -> Self {
        let label = target
            .iter()
            .enumerate()
            .fold((0usize, f32::NEG_INFINITY), |best, (i, &v)| if v > best.1 { (i, v) } else { best })
            .0;
        Self {
            signal,
            target,
            label,
        }
    }
}

/// In-memory dataset shared read-only between loader workers
#[derive(Debug, Clone)]
pub struct HeatSignalDataset {
    items: Arc<Vec<HeatItem>>,
}

impl HeatSignalDataset {
    pub fn new(items: Vec<HeatItem>) -> Self {
        Self {
            items: Arc::new(items),
        }
    }

    /// Samples per class index
    pub fn class_distribution(&self, num_classes: usize) -> Vec<usize> {
        let mut counts = vec![0usize; num_classes];
        for item in self.items.iter() {
            if item.label < num_classes {
                counts[item.label] += 1;
            }
        }
        counts
    }

    pub fn labels(&self) -> Vec<usize> {
        self.items.iter().map(|item| item.label).collect()
    }
}

impl Dataset<HeatItem> for HeatSignalDataset {
    fn get(&self, index: usize) -> Option<HeatItem> {
        self.items.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.items.len()
    }
}

/// A batch of windows
#[derive(Clone, Debug)]
pub struct HeatBatch<B: Backend> {
    /// `[batch_size, 1, timesteps]`
    pub signals: Tensor<B, 3>,
    /// `[batch_size]` class indices
    pub targets: Tensor<B, 1, Int>,
}

/// Batcher for signal windows
#[derive(Clone, Debug)]
pub struct HeatBatcher {
    timesteps: usize,
}

impl HeatBatcher {
    pub fn new(timesteps: usize) -> Self {
        Self { timesteps }
    }
}

impl<B: Backend> Batcher<B, HeatItem, HeatBatch<B>> for HeatBatcher {
    fn batch(&self, items: Vec<HeatItem>, device: &B::Device) -> HeatBatch<B> {
        let batch_size = items.len();

        let signal_data: Vec<f32> = items.iter().flat_map(|item| item.signal.iter().copied()).collect();
        let signals = Tensor::<B, 3>::from_floats(
            TensorData::new(signal_data, [batch_size, 1, self.timesteps]),
            device,
        );

        let targets_data: Vec<i64> = items.iter().map(|item| item.label as i64).collect();
        let targets =
            Tensor::<B, 1, Int>::from_data(TensorData::new(targets_data, [batch_size]), device);

        HeatBatch { signals, targets }
    }
}
