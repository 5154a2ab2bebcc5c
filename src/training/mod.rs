//! Training module for the Heat classifier
//!
//! This module provides:
//! - The epoch loop with Adam and cross-entropy on logits
//! - Best-by-validation-accuracy checkpointing
//! - Evaluation of a model on a partition
//! - The end-to-end experiment pipeline

pub mod checkpoint;
pub mod pipeline;
pub mod trainer;

pub use checkpoint::{CheckpointManager, CheckpointMetadata};
pub use pipeline::{run_experiment, ExperimentReport};
pub use trainer::{evaluate, Trainer, TrainingState, TrainingSummary};

use serde::{Deserialize, Serialize};

use crate::utils::error::{HeatError, Result};

/// Default number of training epochs
pub const DEFAULT_EPOCHS: usize = 100;

/// Default batch size
pub const DEFAULT_BATCH_SIZE: usize = 8;

/// Default learning rate (tuned for the 60 minute max-normalized windows)
pub const DEFAULT_LEARNING_RATE: f64 = 0.0007503666240513933;

/// Default data loader workers
pub const DEFAULT_NUM_WORKERS: usize = 7;

/// Default seed for the backend and loader shuffling
pub const DEFAULT_SEED: u64 = 42;

/// Optimisation and loop settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub learning_rate: f64,
    pub batch_size: usize,
    /// Loader worker threads; 0 loads batches on the calling thread
    pub num_workers: usize,
    pub max_epochs: usize,
    /// Stop after this many epochs without a new best; `None` runs all epochs
    pub early_stopping_patience: Option<usize>,
    /// Reshuffle the training partition every epoch
    pub shuffle_train: bool,
    pub seed: u64,
    pub progress_bar: bool,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            learning_rate: DEFAULT_LEARNING_RATE,
            batch_size: DEFAULT_BATCH_SIZE,
            num_workers: DEFAULT_NUM_WORKERS,
            max_epochs: DEFAULT_EPOCHS,
            early_stopping_patience: None,
            shuffle_train: false,
            seed: DEFAULT_SEED,
            progress_bar: true,
        }
    }
}

impl TrainingConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(HeatError::Config(format!(
                "learning_rate must be positive, got {}",
                self.learning_rate
            )));
        }
        if self.batch_size == 0 {
            return Err(HeatError::Config("batch_size must be greater than zero".to_string()));
        }
        if self.max_epochs == 0 {
            return Err(HeatError::Config("max_epochs must be greater than zero".to_string()));
        }
        if self.early_stopping_patience == Some(0) {
            return Err(HeatError::Config(
                "early_stopping_patience must be at least 1 when set".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = TrainingConfig::default();
        assert_eq!(config.learning_rate, 0.0007503666240513933);
        assert_eq!(config.batch_size, 8);
        assert_eq!(config.num_workers, 7);
        assert_eq!(config.max_epochs, 100);
        assert_eq!(config.seed, 42);
        assert!(config.early_stopping_patience.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_values() {
        let mut config = TrainingConfig::default();
        config.batch_size = 0;
        assert!(config.validate().is_err());

        let mut config = TrainingConfig::default();
        config.learning_rate = -1.0;
        assert!(config.validate().is_err());

        let mut config = TrainingConfig::default();
        config.early_stopping_patience = Some(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: TrainingConfig = toml::from_str("max_epochs = 3\nnum_workers = 0").unwrap();
        assert_eq!(config.max_epochs, 3);
        assert_eq!(config.num_workers, 0);
        assert_eq!(config.batch_size, 8);
    }
}
