//! Inference Predictor Module
//!
//! Runs single windows through a trained model. Windows are accepted either
//! already downsampled or at the raw sensor resolution.

use std::path::Path;
use std::time::{Duration, Instant};

use burn::tensor::{backend::Backend, Tensor, TensorData};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::dataset::downsample::{Downsampler, GROUP_SIZE};
use crate::dataset::normalize::Scaling;
use crate::export::load_exported;
use crate::model::{HeatCnn, HeatCnnConfig};
use crate::training::checkpoint::{load_model, CheckpointManager};
use crate::utils::error::{HeatError, Result, ResultExt};

/// Result of a single prediction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prediction {
    /// Predicted class index
    pub class_index: usize,

    /// Label of the predicted one-hot column
    pub label: String,

    /// Probability of the predicted class
    pub confidence: f32,

    /// Full probability distribution
    pub probabilities: Vec<f32>,

    pub inference_time_ms: f64,
}

impl Prediction {
    fn new(probabilities: Vec<f32>, labels: &[String], inference_time: Duration) -> Result<Self> {
        let (class_index, confidence) = probabilities
            .iter()
            .copied()
            .enumerate()
            .fold(None, |best: Option<(usize, f32)>, (i, p)| match best {
                Some((_, bp)) if bp >= p => best,
                _ => Some((i, p)),
            })
            .context("model returned no probabilities")?;

        let label = labels
            .get(class_index)
            .cloned()
            .unwrap_or_else(|| class_index.to_string());

        Ok(Self {
            class_index,
            label,
            confidence,
            probabilities,
            inference_time_ms: inference_time.as_secs_f64() * 1000.0,
        })
    }

    /// True when the predicted label is the Heat class
    pub fn is_heat(&self) -> bool {
        self.label == "1"
    }

    pub fn display(&self) -> String {
        let mut output = String::new();
        output.push_str(&format!("Prediction: Heat={} (class {})\n", self.label, self.class_index));
        output.push_str(&format!("Confidence: {:.2}%\n", self.confidence * 100.0));
        output.push_str(&format!("Probabilities: {:?}\n", self.probabilities));
        output.push_str(&format!("Inference time: {:.2} ms\n", self.inference_time_ms));
        output
    }
}

/// Predictor wrapping an evaluation-mode model
pub struct HeatPredictor<B: Backend> {
    model: HeatCnn<B>,
    config: HeatCnnConfig,
    class_labels: Vec<String>,
    downsampler: Downsampler,
    scaling: Scaling,
    device: B::Device,
}

impl<B: Backend> HeatPredictor<B> {
    pub fn new(model: HeatCnn<B>, config: HeatCnnConfig, class_labels: Vec<String>, device: B::Device) -> Result<Self> {
        model.check_shapes(&config, &device)?;
        let downsampler = Downsampler::new(config.sequence_length * GROUP_SIZE, GROUP_SIZE)?;
        Ok(Self {
            model,
            config,
            class_labels,
            downsampler,
            scaling: Scaling::None,
            device,
        })
    }

    /// Load a `.mpk` snapshot or checkpoint record
    pub fn from_snapshot(
        path: &Path,
        config: HeatCnnConfig,
        class_labels: Vec<String>,
        device: B::Device,
    ) -> Result<Self> {
        let model = load_model::<B>(&config, path, &device)?;
        Self::new(model, config, class_labels, device)
    }

    /// Load the best checkpoint of a training run
    pub fn from_checkpoint_dir(dir: &Path, device: B::Device) -> Result<Self> {
        let (model, metadata) = CheckpointManager::load_best::<B>(dir, &device)?;
        Self::new(model, metadata.model, metadata.class_labels, device)
    }

    /// Load a `.bin` export and its manifest
    pub fn from_export(path: &Path, device: B::Device) -> Result<Self> {
        let (model, manifest) = load_exported::<B>(path, &device)?;
        Self::new(model, manifest.model, manifest.class_labels, device)
    }

    /// Scaling applied to the model-resolution window
    pub fn with_scaling(mut self, scaling: Scaling) -> Self {
        self.scaling = scaling;
        self
    }

    pub fn config(&self) -> &HeatCnnConfig {
        &self.config
    }

    /// Bring a window to model resolution: downsample raw windows, then scale
    pub fn prepare(&self, window: &[f32]) -> Result<Vec<f32>> {
        let length = self.config.sequence_length;
        let values = if window.len() == length {
            window.to_vec()
        } else if window.len() == self.downsampler.source_width() {
            self.downsampler.downsample_values(window)?
        } else {
            return Err(HeatError::SizeMismatch {
                expected: length,
                actual: window.len(),
            });
        };
        Ok(self.scaling.apply(&values))
    }

    /// Classify one window
    pub fn predict(&self, window: &[f32]) -> Result<Prediction> {
        let start = Instant::now();
        let values = self.prepare(window)?;

        let input = Tensor::<B, 3>::from_floats(
            TensorData::new(values, [1, 1, self.config.sequence_length]),
            &self.device,
        );
        let probabilities: Vec<f32> = self
            .model
            .forward(input)
            .into_data()
            .convert::<f32>()
            .to_vec()
            .map_err(|e| HeatError::Inference(format!("could not read probabilities: {:?}", e)))?;

        let prediction = Prediction::new(probabilities, &self.class_labels, start.elapsed())?;
        debug!("Predicted class {} ({:.3})", prediction.class_index, prediction.confidence);
        Ok(prediction)
    }

    pub fn predict_batch(&self, windows: &[Vec<f32>]) -> Result<Vec<Prediction>> {
        windows
            .iter()
            .enumerate()
            .map(|(i, w)| self.predict(w).with_context(|| format!("window {}", i)))
            .collect()
    }
}
