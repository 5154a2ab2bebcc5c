//! Inference module for classifying single windows
//!
//! Loads a checkpoint, snapshot or export and returns per-class
//! probabilities for downsampled or raw-resolution windows.

pub mod predictor;

pub use predictor::{HeatPredictor, Prediction};
