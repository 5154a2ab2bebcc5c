//! Training loop for the Heat classifier
//!
//! One Adam optimizer, cross-entropy on logits, validation after every epoch
//! and a checkpoint whenever validation accuracy strictly improves.

use std::sync::Arc;

use burn::{
    data::dataloader::{DataLoader, DataLoaderBuilder},
    module::AutodiffModule,
    nn::loss::CrossEntropyLossConfig,
    optim::{AdamConfig, GradientsParams, Optimizer},
    tensor::{
        backend::{AutodiffBackend, Backend},
        ElementConversion, Int, Tensor,
    },
};
use burn::data::dataset::Dataset;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::dataset::{HeatBatch, HeatBatcher, HeatSignalDataset};
use crate::model::{HeatCnn, HeatCnnConfig};
use crate::training::checkpoint::{CheckpointManager, CheckpointMetadata};
use crate::training::TrainingConfig;
use crate::utils::error::{HeatError, Result};
use crate::utils::logging::TrainingLogger;
use crate::utils::metrics::Metrics;

/// Metrics of one epoch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpochRecord {
    pub epoch: usize,
    pub train_loss: f64,
    pub train_accuracy: f64,
    pub val_loss: f64,
    pub val_accuracy: f64,
}

/// Training state for checkpointing and monitoring
#[derive(Debug, Clone, Default)]
pub struct TrainingState {
    /// Current epoch (0-indexed)
    pub epoch: usize,
    pub best_val_accuracy: Option<f64>,
    pub best_epoch: Option<usize>,
    /// Number of epochs without improvement (for early stopping)
    pub epochs_without_improvement: usize,
    pub history: Vec<EpochRecord>,
}

impl TrainingState {
    /// Record an epoch; returns true when its accuracy is a new best.
    ///
    /// The first epoch is always a new best. Ties keep the earlier epoch.
    pub fn update_best(&mut self, record: EpochRecord) -> bool {
        let improved = match self.best_val_accuracy {
            None => true,
            Some(best) => record.val_accuracy > best,
        };

        if improved {
            self.best_val_accuracy = Some(record.val_accuracy);
            self.best_epoch = Some(record.epoch);
            self.epochs_without_improvement = 0;
        } else {
            self.epochs_without_improvement += 1;
        }

        self.epoch = record.epoch;
        self.history.push(record);
        improved
    }

    pub fn should_early_stop(&self, patience: Option<usize>) -> bool {
        patience.map_or(false, |p| self.epochs_without_improvement >= p)
    }
}

/// Outcome of `Trainer::fit`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingSummary {
    pub epochs_run: usize,
    pub stopped_early: bool,
    pub best: CheckpointMetadata,
    pub history: Vec<EpochRecord>,
}

/// Build a loader over `dataset` on `device`
pub fn build_loader<B: Backend>(
    dataset: &HeatSignalDataset,
    batch_size: usize,
    num_workers: usize,
    shuffle_seed: Option<u64>,
    timesteps: usize,
    device: &B::Device,
) -> Arc<dyn DataLoader<B, HeatBatch<B>>> {
    let mut builder = DataLoaderBuilder::new(HeatBatcher::new(timesteps))
        .batch_size(batch_size)
        .set_device(device.clone());
    if let Some(seed) = shuffle_seed {
        builder = builder.shuffle(seed);
    }
    if num_workers > 0 {
        builder = builder.num_workers(num_workers);
    }
    builder.build(dataset.clone())
}

/// Evaluate `model` on `dataset` without gradient tracking.
///
/// The loss is the sample-weighted mean cross-entropy over all batches.
pub fn evaluate<B: Backend>(
    model: &HeatCnn<B>,
    dataset: &HeatSignalDataset,
    batch_size: usize,
    num_workers: usize,
    num_classes: usize,
    timesteps: usize,
    device: &B::Device,
) -> Result<Metrics> {
    if dataset.is_empty() {
        return Err(HeatError::EmptyDataset("cannot evaluate on an empty partition".to_string()));
    }

    let loader = build_loader::<B>(dataset, batch_size, num_workers, None, timesteps, device);
    let loss_fn = CrossEntropyLossConfig::new().init(device);

    let mut predictions = Vec::with_capacity(dataset.len());
    let mut ground_truth = Vec::with_capacity(dataset.len());
    let mut loss_sum = 0.0f64;

    for batch in loader.iter() {
        let batch_len = batch.targets.dims()[0];
        let logits = model.forward_logits(batch.signals);
        let loss: f64 = loss_fn
            .forward(logits.clone(), batch.targets.clone())
            .into_scalar()
            .elem();
        loss_sum += loss * batch_len as f64;

        let predicted = int_values(logits.argmax(1).reshape([batch_len]))?;
        let targets = int_values(batch.targets)?;
        predictions.extend(predicted.into_iter().map(|p| p as usize));
        ground_truth.extend(targets.into_iter().map(|t| t as usize));
    }

    let total = ground_truth.len().max(1);
    Ok(Metrics::from_predictions(&predictions, &ground_truth, num_classes).with_loss(loss_sum / total as f64))
}

fn int_values<B: Backend>(tensor: Tensor<B, 1, Int>) -> Result<Vec<i64>> {
    tensor
        .into_data()
        .convert::<i64>()
        .to_vec()
        .map_err(|e| HeatError::Training(format!("could not read tensor data: {:?}", e)))
}

/// Main trainer for the Heat classifier
pub struct Trainer<B: AutodiffBackend> {
    pub model: HeatCnn<B>,
    pub config: TrainingConfig,
    pub state: TrainingState,
    model_config: HeatCnnConfig,
    checkpoints: CheckpointManager,
    class_labels: Vec<String>,
    device: B::Device,
}

impl<B: AutodiffBackend> Trainer<B> {
    /// Seed the backend and build a fresh model
    pub fn new(
        model_config: HeatCnnConfig,
        config: TrainingConfig,
        checkpoints: CheckpointManager,
        class_labels: Vec<String>,
        device: B::Device,
    ) -> Result<Self> {
        config.validate()?;
        B::seed(config.seed);
        let model = model_config.init::<B>(&device)?;

        Ok(Self {
            model,
            config,
            state: TrainingState::default(),
            model_config,
            checkpoints,
            class_labels,
            device,
        })
    }

    pub fn checkpoints(&self) -> &CheckpointManager {
        &self.checkpoints
    }

    /// Run the epoch loop until `max_epochs` or early stopping
    pub fn fit(&mut self, train: &HeatSignalDataset, validation: &HeatSignalDataset) -> Result<TrainingSummary> {
        if train.is_empty() {
            return Err(HeatError::EmptyDataset("training partition is empty".to_string()));
        }
        if validation.is_empty() {
            return Err(HeatError::EmptyDataset("validation partition is empty".to_string()));
        }

        let timesteps = self.model_config.sequence_length;
        let shuffle = self.config.shuffle_train.then_some(self.config.seed);
        let train_loader = build_loader::<B>(
            train,
            self.config.batch_size,
            self.config.num_workers,
            shuffle,
            timesteps,
            &self.device,
        );

        let mut optimizer = AdamConfig::new().init::<B, HeatCnn<B>>();

        let mut logger = if self.config.progress_bar {
            TrainingLogger::new(self.config.max_epochs)
        } else {
            TrainingLogger::hidden(self.config.max_epochs)
        };

        info!(
            "Training on {} windows, validating on {} (batch {}, lr {})",
            train.len(),
            validation.len(),
            self.config.batch_size,
            self.config.learning_rate
        );
        info!(
            "Training class distribution: {:?}",
            train.class_distribution(self.model_config.num_classes)
        );

        let mut stopped_early = false;
        for epoch in 0..self.config.max_epochs {
            logger.start_epoch(epoch);

            let (train_loss, train_accuracy) = self.train_epoch(&train_loader, &mut optimizer)?;

            let val = evaluate::<B::InnerBackend>(
                &self.model.valid(),
                validation,
                self.config.batch_size,
                self.config.num_workers,
                self.model_config.num_classes,
                timesteps,
                &self.device,
            )?;
            let val_loss = val.loss.unwrap_or(f64::NAN);
            logger.end_epoch(train_loss, val_loss, val.accuracy);

            let record = EpochRecord {
                epoch,
                train_loss,
                train_accuracy,
                val_loss,
                val_accuracy: val.accuracy,
            };

            if self.state.update_best(record) {
                logger.log_new_best(val.accuracy);
                let metadata = CheckpointMetadata::new(
                    epoch,
                    val.accuracy,
                    val_loss,
                    train_loss,
                    self.model_config.clone(),
                    self.class_labels.clone(),
                );
                self.checkpoints.save_best(&self.model, metadata)?;
            }

            if self.state.should_early_stop(self.config.early_stopping_patience) {
                logger.log_early_stop(self.state.epochs_without_improvement);
                stopped_early = true;
                break;
            }
        }

        let best = self
            .checkpoints
            .best()
            .cloned()
            .ok_or_else(|| HeatError::Training("no checkpoint was written".to_string()))?;
        logger.finish(self.state.history.len(), best.val_accuracy);

        Ok(TrainingSummary {
            epochs_run: self.state.history.len(),
            stopped_early,
            best,
            history: self.state.history.clone(),
        })
    }

    /// Train for one epoch; returns `(mean loss, accuracy)`
    fn train_epoch<O: Optimizer<HeatCnn<B>, B>>(
        &mut self,
        loader: &Arc<dyn DataLoader<B, HeatBatch<B>>>,
        optimizer: &mut O,
    ) -> Result<(f64, f64)> {
        let loss_fn = CrossEntropyLossConfig::new().init(&self.device);
        let mut loss_sum = 0.0f64;
        let mut correct = 0usize;
        let mut total = 0usize;

        for (batch_idx, batch) in loader.iter().enumerate() {
            let batch_len = batch.targets.dims()[0];
            let logits = self.model.forward_logits(batch.signals);
            let loss = loss_fn.forward(logits.clone(), batch.targets.clone());

            let loss_value: f64 = loss.clone().into_scalar().elem();
            loss_sum += loss_value * batch_len as f64;

            let batch_correct: i64 = logits
                .argmax(1)
                .reshape([batch_len])
                .equal(batch.targets)
                .int()
                .sum()
                .into_scalar()
                .elem();
            correct += batch_correct as usize;
            total += batch_len;

            let grads = GradientsParams::from_grads(loss.backward(), &self.model);
            self.model = optimizer.step(self.config.learning_rate, self.model.clone(), grads);

            debug!("  batch {}: loss = {:.4}", batch_idx + 1, loss_value);
        }

        if total == 0 {
            return Err(HeatError::Training("training loader produced no batches".to_string()));
        }
        Ok((loss_sum / total as f64, correct as f64 / total as f64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::HeatItem;
    use burn::backend::{Autodiff, NdArray};

    type TestBackend = Autodiff<NdArray>;

    /// Class 1 windows ramp upwards, class 0 windows are flat
    fn synthetic(count: usize) -> HeatSignalDataset {
        let items = (0..count)
            .map(|i| {
                let label = i % 2;
                let signal = (0..100)
                    .map(|t| if label == 1 { t as f32 / 100.0 } else { 0.1 })
                    .collect();
                let mut target = vec![0.0; 2];
                target[label] = 1.0;
                HeatItem::new(signal, target)
            })
            .collect();
        HeatSignalDataset::new(items)
    }

    fn record(epoch: usize, val_accuracy: f64) -> EpochRecord {
        EpochRecord {
            epoch,
            train_loss: 0.5,
            train_accuracy: 0.5,
            val_loss: 0.5,
            val_accuracy,
        }
    }

    fn quick_config(epochs: usize) -> TrainingConfig {
        TrainingConfig {
            max_epochs: epochs,
            num_workers: 0,
            progress_bar: false,
            ..Default::default()
        }
    }

    #[test]
    fn test_first_epoch_is_best_and_ties_keep_earlier() {
        let mut state = TrainingState::default();
        assert!(state.update_best(record(0, 0.0)));
        assert!(!state.update_best(record(1, 0.0)));
        assert!(state.update_best(record(2, 0.5)));
        assert!(!state.update_best(record(3, 0.5)));
        assert_eq!(state.best_epoch, Some(2));
        assert_eq!(state.epochs_without_improvement, 1);
        assert_eq!(state.history.len(), 4);
    }

    #[test]
    fn test_early_stop() {
        let mut state = TrainingState::default();
        state.update_best(record(0, 0.9));
        state.update_best(record(1, 0.8));
        state.update_best(record(2, 0.8));
        assert!(state.should_early_stop(Some(2)));
        assert!(!state.should_early_stop(Some(3)));
        assert!(!state.should_early_stop(None));
    }

    #[test]
    fn test_evaluate_reports_loss_and_accuracy() {
        let device = Default::default();
        let model = HeatCnnConfig::new().init::<NdArray>(&device).unwrap();
        let metrics = evaluate(&model, &synthetic(10), 4, 0, 2, 100, &device).unwrap();
        assert_eq!(metrics.total_samples, 10);
        assert!(metrics.loss.unwrap().is_finite());
        assert!((0.0..=1.0).contains(&metrics.accuracy));
    }

    #[test]
    fn test_evaluate_empty_partition() {
        let device = Default::default();
        let model = HeatCnnConfig::new().init::<NdArray>(&device).unwrap();
        assert!(matches!(
            evaluate(&model, &HeatSignalDataset::new(vec![]), 4, 0, 2, 100, &device),
            Err(HeatError::EmptyDataset(_))
        ));
    }

    #[test]
    fn test_fit_writes_best_checkpoint() {
        let dir = tempfile::tempdir().unwrap();
        let device = Default::default();
        let mut trainer = Trainer::<TestBackend>::new(
            HeatCnnConfig::new(),
            quick_config(3),
            CheckpointManager::new(dir.path()),
            vec!["0".into(), "1".into()],
            device,
        )
        .unwrap();

        let summary = trainer.fit(&synthetic(16), &synthetic(6)).unwrap();
        assert_eq!(summary.epochs_run, 3);
        assert_eq!(summary.history.len(), 3);
        assert!(!summary.stopped_early);

        let best_accuracy = summary
            .history
            .iter()
            .map(|r| r.val_accuracy)
            .fold(f64::MIN, f64::max);
        assert_eq!(summary.best.val_accuracy, best_accuracy);
        assert!(trainer.checkpoints().best_path().unwrap().exists());
    }

    #[test]
    fn test_fit_rejects_empty_partitions() {
        let dir = tempfile::tempdir().unwrap();
        let mut trainer = Trainer::<TestBackend>::new(
            HeatCnnConfig::new(),
            quick_config(1),
            CheckpointManager::new(dir.path()),
            vec![],
            Default::default(),
        )
        .unwrap();
        assert!(trainer.fit(&HeatSignalDataset::new(vec![]), &synthetic(2)).is_err());
    }
}
