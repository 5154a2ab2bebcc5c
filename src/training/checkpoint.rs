//! Best-model checkpointing.
//!
//! Keeps only the checkpoint with the highest validation accuracy: the model
//! record (`.mpk`, full precision) plus a `best_model.json` sidecar naming it.

use std::fs;
use std::path::{Path, PathBuf};

use burn::{
    module::Module,
    record::{FullPrecisionSettings, NamedMpkFileRecorder},
    tensor::backend::Backend,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::model::{HeatCnn, HeatCnnConfig};
use crate::utils::error::{HeatError, Result};

/// Sidecar file describing the current best checkpoint
pub const BEST_METADATA_FILE: &str = "best_model.json";

/// Recorder used for checkpoints and snapshots
pub type CheckpointRecorder = NamedMpkFileRecorder<FullPrecisionSettings>;

/// Metadata stored next to a checkpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointMetadata {
    /// 0-indexed epoch that produced the checkpoint
    pub epoch: usize,
    /// Record file name inside the checkpoint directory
    pub file_name: String,
    pub val_accuracy: f64,
    pub val_loss: f64,
    pub train_loss: f64,
    pub model: HeatCnnConfig,
    /// One-hot column labels of the training partition
    pub class_labels: Vec<String>,
    pub timestamp: String,
}

impl CheckpointMetadata {
    pub fn new(
        epoch: usize,
        val_accuracy: f64,
        val_loss: f64,
        train_loss: f64,
        model: HeatCnnConfig,
        class_labels: Vec<String>,
    ) -> Self {
        Self {
            epoch,
            file_name: checkpoint_file_name(epoch, val_loss),
            val_accuracy,
            val_loss,
            train_loss,
            model,
            class_labels,
            timestamp: Utc::now().to_rfc3339(),
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(HeatError::PathNotFound(path.to_path_buf()));
        }
        let json = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }
}

/// `best_model-epoch=EE-val_loss=L.LLLL.mpk`
pub fn checkpoint_file_name(epoch: usize, val_loss: f64) -> String {
    format!("best_model-epoch={:02}-val_loss={:.4}.mpk", epoch, val_loss)
}

/// Save a model record to an explicit `.mpk` path
pub fn save_model<B: Backend>(model: &HeatCnn<B>, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    model
        .clone()
        .save_file(path.to_path_buf(), &CheckpointRecorder::new())?;
    debug!("Model record written to {:?}", path);
    Ok(())
}

/// Build a model from `config` and load the record at `path` into it
pub fn load_model<B: Backend>(config: &HeatCnnConfig, path: &Path, device: &B::Device) -> Result<HeatCnn<B>> {
    if !path.exists() {
        return Err(HeatError::PathNotFound(path.to_path_buf()));
    }
    let model = config
        .init::<B>(device)?
        .load_file(path.to_path_buf(), &CheckpointRecorder::new(), device)?;
    model.check_shapes(config, device)?;
    Ok(model)
}

/// Keeps the single best checkpoint in a directory
pub struct CheckpointManager {
    dir: PathBuf,
    best: Option<CheckpointMetadata>,
}

impl CheckpointManager {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            best: None,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn best(&self) -> Option<&CheckpointMetadata> {
        self.best.as_ref()
    }

    /// Path of the current best record, if any
    pub fn best_path(&self) -> Option<PathBuf> {
        self.best.as_ref().map(|m| self.dir.join(&m.file_name))
    }

    /// Write `model` as the new best and drop the previous record
    pub fn save_best<B: Backend>(&mut self, model: &HeatCnn<B>, metadata: CheckpointMetadata) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir)?;

        let path = self.dir.join(&metadata.file_name);
        save_model(model, &path)?;
        metadata.save(&self.dir.join(BEST_METADATA_FILE))?;

        if let Some(previous) = self.best.replace(metadata) {
            let old = self.dir.join(&previous.file_name);
            if old != path {
                if let Err(e) = fs::remove_file(&old) {
                    warn!("Could not remove previous checkpoint {:?}: {}", old, e);
                }
            }
        }

        info!("Checkpoint saved to {:?}", path);
        Ok(path)
    }

    /// Load the best checkpoint recorded in `dir`
    pub fn load_best<B: Backend>(dir: &Path, device: &B::Device) -> Result<(HeatCnn<B>, CheckpointMetadata)> {
        let metadata = CheckpointMetadata::load(&dir.join(BEST_METADATA_FILE))?;
        let model = load_model::<B>(&metadata.model, &dir.join(&metadata.file_name), device)?;
        info!(
            "Loaded checkpoint from epoch {} (val_accuracy {:.4})",
            metadata.epoch, metadata.val_accuracy
        );
        Ok((model, metadata))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use burn::tensor::Tensor;

    type TestBackend = NdArray;

    fn metadata(epoch: usize, val_accuracy: f64, val_loss: f64) -> CheckpointMetadata {
        CheckpointMetadata::new(
            epoch,
            val_accuracy,
            val_loss,
            0.5,
            HeatCnnConfig::new(),
            vec!["0".into(), "1".into()],
        )
    }

    #[test]
    fn test_file_name_format() {
        assert_eq!(checkpoint_file_name(3, 0.123456), "best_model-epoch=03-val_loss=0.1235.mpk");
        assert_eq!(checkpoint_file_name(12, 1.0), "best_model-epoch=12-val_loss=1.0000.mpk");
    }

    #[test]
    fn test_save_and_load_best_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let device = Default::default();
        let model = HeatCnnConfig::new().init::<TestBackend>(&device).unwrap();

        let mut manager = CheckpointManager::new(dir.path());
        let path = manager.save_best(&model, metadata(0, 0.75, 0.4)).unwrap();
        assert!(path.exists());

        let (loaded, meta) = CheckpointManager::load_best::<TestBackend>(dir.path(), &device).unwrap();
        assert_eq!(meta.epoch, 0);
        assert_eq!(meta.val_accuracy, 0.75);

        let input = Tensor::<TestBackend, 3>::ones([2, 1, 100], &device);
        let a: Vec<f32> = model.forward(input.clone()).into_data().to_vec().unwrap();
        let b: Vec<f32> = loaded.forward(input).into_data().to_vec().unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_only_latest_best_is_kept() {
        let dir = tempfile::tempdir().unwrap();
        let device = Default::default();
        let model = HeatCnnConfig::new().init::<TestBackend>(&device).unwrap();

        let mut manager = CheckpointManager::new(dir.path());
        let first = manager.save_best(&model, metadata(0, 0.6, 0.7)).unwrap();
        let second = manager.save_best(&model, metadata(4, 0.8, 0.3)).unwrap();

        assert!(!first.exists());
        assert!(second.exists());
        assert_eq!(manager.best().unwrap().epoch, 4);

        let records = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().map(|x| x == "mpk").unwrap_or(false))
            .count();
        assert_eq!(records, 1);
    }

    #[test]
    fn test_missing_checkpoint_reported() {
        let dir = tempfile::tempdir().unwrap();
        let device = Default::default();
        assert!(matches!(
            CheckpointManager::load_best::<TestBackend>(dir.path(), &device),
            Err(HeatError::PathNotFound(_))
        ));
    }
}
