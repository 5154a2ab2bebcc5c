//! # WatchPlant Heat
//!
//! Heat-stress classification of plant bioelectric signal windows with a
//! small 1-D CNN built on the Burn framework.
//!
//! ## Modules
//!
//! - `dataset`: CSV ingestion, downsampling, seeded splits and tensor conversion
//! - `model`: the convolutional classifier and its shape inference
//! - `training`: training loop, best-model checkpointing and the experiment pipeline
//! - `export`: traced export of the evaluation-mode model
//! - `inference`: single-window prediction from checkpoints or exports
//! - `utils`: errors, logging, metrics and charts
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use watchplant_heat::backend::{default_device, TrainingBackend};
//! use watchplant_heat::config::ExperimentConfig;
//! use watchplant_heat::training::run_experiment;
//!
//! let config = ExperimentConfig::load("config/experiment.toml".as_ref())?;
//! let report = run_experiment::<TrainingBackend>(&config, &default_device())?;
//! println!("test accuracy: {:.4}", report.test.accuracy);
//! ```

pub mod backend;
pub mod config;
pub mod dataset;
pub mod export;
pub mod inference;
pub mod model;
pub mod training;
pub mod utils;

pub use config::{DataConfig, ExperimentConfig, OutputConfig};
pub use dataset::{DatasetSplits, Downsampler, HeatBatch, HeatBatcher, HeatItem, HeatSignalDataset, SignalTable, SplitConfig};
pub use inference::{HeatPredictor, Prediction};
pub use model::{HeatCnn, HeatCnnConfig};
pub use training::{Trainer, TrainingConfig, TrainingState};
pub use utils::error::{HeatError, Result};
pub use utils::metrics::{ConfusionMatrix, Metrics};

/// Binary Heat classification
pub const NUM_CLASSES: usize = 2;

/// Model input length after downsampling
pub const SEQUENCE_LENGTH: usize = 100;

/// Version of the library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
