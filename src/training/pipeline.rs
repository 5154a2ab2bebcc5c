//! End-to-end Heat experiment
//!
//! Load CSV windows, downsample, split, train with best-model checkpointing,
//! reload the best checkpoint, evaluate it, snapshot it, export it and write
//! a JSON report.

use std::fs;
use std::path::{Path, PathBuf};

use burn::tensor::backend::{AutodiffBackend, Backend};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::ExperimentConfig;
use crate::dataset::encoding::categories_consistent;
use crate::dataset::profile::{class_profiles, plot_class_profiles, DatasetSummary};
use crate::dataset::split::SplitStats;
use crate::dataset::{load_signal_table, split_dataset, table_to_tensors, DatasetSplits, HeatSignalDataset, SignalTable, TensorPair};
use crate::export::{export_model, manifest_path, ReferenceCheck};
use crate::model::HeatCnn;
use crate::training::checkpoint::{save_model, CheckpointManager};
use crate::training::trainer::{evaluate, Trainer, TrainingSummary};
use crate::utils::error::{HeatError, Result};
use crate::utils::metrics::Metrics;

/// Accuracy difference tolerated when re-evaluating the reloaded checkpoint
const REPRODUCTION_TOLERANCE: f64 = 1e-9;

/// Data ready for training and evaluation
#[derive(Debug, Clone)]
pub struct PreparedData {
    pub summary: DatasetSummary,
    pub splits: DatasetSplits,
    pub train: TensorPair,
    pub validation: TensorPair,
    pub test: TensorPair,
}

impl PreparedData {
    /// One-hot labels of the training partition
    pub fn class_labels(&self) -> Vec<String> {
        self.train.encoder.labels()
    }

    pub fn split_stats(&self, label_column: &str) -> Result<SplitStats> {
        self.splits.stats(label_column)
    }
}

/// Files written by an experiment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artifacts {
    pub best_checkpoint: PathBuf,
    pub final_model: PathBuf,
    pub export: PathBuf,
    pub manifest: PathBuf,
    pub profile_plot: Option<PathBuf>,
}

/// Everything worth keeping about one run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentReport {
    pub created_at: String,
    pub config: ExperimentConfig,
    pub dataset: DatasetSummary,
    pub split: SplitStats,
    pub training: TrainingSummary,
    /// Validation metrics of the reloaded best checkpoint
    pub validation: Metrics,
    pub test: Metrics,
    pub reference: Option<ReferenceCheck>,
    pub artifacts: Artifacts,
}

impl ExperimentReport {
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

/// Load every CSV, log a summary and downsample the signal block
pub fn load_downsampled(config: &ExperimentConfig) -> Result<(DatasetSummary, SignalTable)> {
    let data = &config.data;
    let table = load_signal_table(&data.data_root, &data.training_subdir)?;
    let summary = DatasetSummary::from_table(&table, &data.label_column, data.raw_window)?;
    info!("\n{}", summary);

    let downsampled = data.downsampler()?.apply(&table)?;
    info!(
        "Downsampled {} rows: {} -> {} columns",
        downsampled.len(),
        table.width(),
        downsampled.width()
    );
    Ok((summary, downsampled))
}

/// Write the class profile chart of a downsampled table
pub fn plot_profiles(config: &ExperimentConfig, table: &SignalTable, path: &Path) -> Result<()> {
    let profiles = class_profiles(table, &config.data.label_column, config.model.sequence_length)?;
    let minutes = config.data.raw_window as f64 / 60.0;
    plot_class_profiles(&profiles, &config.data.label_column, minutes, path)?;
    info!("Class profile chart written to {:?}", path);
    Ok(())
}

/// Load, downsample, split and encode the configured dataset
pub fn prepare_data(config: &ExperimentConfig) -> Result<PreparedData> {
    config.validate()?;
    let (summary, table) = load_downsampled(config)?;
    split_and_encode(config, summary, &table)
}

/// Split a downsampled table and encode each partition
pub fn split_and_encode(config: &ExperimentConfig, summary: DatasetSummary, table: &SignalTable) -> Result<PreparedData> {
    let splits = split_dataset(table, &config.split)?;
    info!("\n{}", splits.stats(&config.data.label_column)?);

    let label = &config.data.label_column;
    let timesteps = config.model.sequence_length;
    let train = table_to_tensors(&splits.train, label, timesteps)?;
    let validation = table_to_tensors(&splits.validation, label, timesteps)?;
    let test = table_to_tensors(&splits.test, label, timesteps)?;

    if !categories_consistent(&[&train.encoder, &validation.encoder, &test.encoder]) {
        warn!(
            "Partitions observed different {} categories (train {:?}, validation {:?}, test {:?}); one-hot columns are not aligned",
            label,
            train.encoder.labels(),
            validation.encoder.labels(),
            test.encoder.labels()
        );
    }
    for pair in [&train, &validation, &test] {
        if pair.encoder.num_categories() > config.model.num_classes {
            return Err(HeatError::Config(format!(
                "{} categories {:?} exceed the model's {} classes",
                label,
                pair.encoder.labels(),
                config.model.num_classes
            )));
        }
    }

    Ok(PreparedData {
        summary,
        splits,
        train,
        validation,
        test,
    })
}

/// Evaluate `model` on one encoded partition
pub fn evaluate_partition<B: Backend>(
    model: &HeatCnn<B>,
    pair: &TensorPair,
    config: &ExperimentConfig,
    device: &B::Device,
) -> Result<Metrics> {
    evaluate(
        model,
        &HeatSignalDataset::new(pair.items()),
        config.training.batch_size,
        config.training.num_workers,
        config.model.num_classes,
        config.model.sequence_length,
        device,
    )
}

/// Run the full experiment on backend `B`
pub fn run_experiment<B: AutodiffBackend>(config: &ExperimentConfig, device: &B::Device) -> Result<ExperimentReport> {
    config.validate()?;
    let (summary, table) = load_downsampled(config)?;
    if let Some(path) = config.output.profile_plot() {
        plot_profiles(config, &table, &path)?;
    }
    let data = split_and_encode(config, summary, &table)?;
    let split = data.split_stats(&config.data.label_column)?;
    let checkpoint_dir = config.output.checkpoint_dir();

    let mut trainer = Trainer::<B>::new(
        config.model.clone(),
        config.training.clone(),
        CheckpointManager::new(&checkpoint_dir),
        data.class_labels(),
        device.clone(),
    )?;
    let training = trainer.fit(
        &HeatSignalDataset::new(data.train.items()),
        &HeatSignalDataset::new(data.validation.items()),
    )?;

    // Everything below runs on the reloaded best checkpoint
    let (model, best) = CheckpointManager::load_best::<B::InnerBackend>(&checkpoint_dir, device)?;
    let validation = evaluate_partition(&model, &data.validation, config, device)?;
    if (validation.accuracy - best.val_accuracy).abs() > REPRODUCTION_TOLERANCE {
        warn!(
            "Reloaded checkpoint scores val_accuracy {:.6}, recorded {:.6}",
            validation.accuracy, best.val_accuracy
        );
    }

    let test = evaluate_partition(&model, &data.test, config, device)?;
    info!("Test metrics of epoch {} checkpoint:\n{}", best.epoch, test.display());

    let final_model = config.output.final_model();
    save_model(&model, &final_model)?;
    info!("Final model saved to {:?}", final_model);

    let export_path = config.output.export_file();
    let manifest = export_model(&model, &config.model, best.class_labels.clone(), &export_path, device)?;

    let report = ExperimentReport {
        created_at: Utc::now().to_rfc3339(),
        config: config.clone(),
        dataset: data.summary,
        split,
        artifacts: Artifacts {
            best_checkpoint: checkpoint_dir.join(&best.file_name),
            final_model,
            manifest: manifest_path(&export_path),
            export: export_path,
            profile_plot: config.output.profile_plot(),
        },
        training,
        validation,
        test,
        reference: manifest.reference,
    };
    let report_path = config.output.report_file();
    report.save(&report_path)?;
    info!("Report written to {:?}", report_path);

    Ok(report)
}
