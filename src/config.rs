//! Experiment configuration
//!
//! One TOML file bundles data discovery, splitting, the model geometry,
//! training hyperparameters and output locations. Every section is optional;
//! missing keys fall back to the values of the 60 minute max-normalized
//! Heat experiment.

use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};

use crate::dataset::downsample::{Downsampler, GROUP_SIZE, RAW_WINDOW};
use crate::dataset::split::SplitConfig;
use crate::model::HeatCnnConfig;
use crate::training::TrainingConfig;
use crate::utils::error::{HeatError, Result};

/// Where the CSV windows live and how they are shaped
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    /// Parent of the per-experiment directories
    pub data_root: PathBuf,
    /// Subdirectory of each experiment holding CSV files
    pub training_subdir: String,
    pub label_column: String,
    /// Raw samples per window
    pub raw_window: usize,
    /// Samples averaged into one model input value
    pub group_size: usize,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            data_root: PathBuf::from("data"),
            training_subdir: "training_data".to_string(),
            label_column: "Heat".to_string(),
            raw_window: RAW_WINDOW,
            group_size: GROUP_SIZE,
        }
    }
}

impl DataConfig {
    pub fn downsampler(&self) -> Result<Downsampler> {
        Downsampler::new(self.raw_window, self.group_size)
    }
}

/// Artifact locations, relative paths resolve against `output_dir`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub output_dir: PathBuf,
    pub checkpoint_dir: PathBuf,
    /// Reloaded best model in evaluation mode
    pub final_model: PathBuf,
    pub export_file: PathBuf,
    pub report_file: PathBuf,
    /// Write the class profile chart during an experiment
    pub plot_profiles: bool,
    pub profile_plot: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("output"),
            checkpoint_dir: PathBuf::from("checkpoints"),
            final_model: PathBuf::from("60-min-max-model.mpk"),
            export_file: PathBuf::from("model.bin"),
            report_file: PathBuf::from("results/report.json"),
            plot_profiles: true,
            profile_plot: PathBuf::from("results/model_input.svg"),
        }
    }
}

impl OutputConfig {
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.output_dir.join(path)
        }
    }

    pub fn checkpoint_dir(&self) -> PathBuf {
        self.resolve(&self.checkpoint_dir)
    }

    pub fn final_model(&self) -> PathBuf {
        self.resolve(&self.final_model)
    }

    pub fn export_file(&self) -> PathBuf {
        self.resolve(&self.export_file)
    }

    pub fn report_file(&self) -> PathBuf {
        self.resolve(&self.report_file)
    }

    /// Chart location, `None` when charts are turned off
    pub fn profile_plot(&self) -> Option<PathBuf> {
        self.plot_profiles.then(|| self.resolve(&self.profile_plot))
    }
}

/// `[model]` table; keys left out keep the `HeatCnnConfig` defaults
#[derive(Debug, Deserialize)]
#[serde(default)]
struct ModelSection {
    input_channels: usize,
    output_channels: usize,
    kernel_size: usize,
    sequence_length: usize,
    hidden_units: usize,
    num_classes: usize,
}

impl Default for ModelSection {
    fn default() -> Self {
        let model = HeatCnnConfig::new();
        Self {
            input_channels: model.input_channels,
            output_channels: model.output_channels,
            kernel_size: model.kernel_size,
            sequence_length: model.sequence_length,
            hidden_units: model.hidden_units,
            num_classes: model.num_classes,
        }
    }
}

impl From<ModelSection> for HeatCnnConfig {
    fn from(section: ModelSection) -> Self {
        HeatCnnConfig {
            input_channels: section.input_channels,
            output_channels: section.output_channels,
            kernel_size: section.kernel_size,
            sequence_length: section.sequence_length,
            hidden_units: section.hidden_units,
            num_classes: section.num_classes,
        }
    }
}

fn deserialize_model<'de, D>(deserializer: D) -> std::result::Result<HeatCnnConfig, D::Error>
where
    D: Deserializer<'de>,
{
    ModelSection::deserialize(deserializer).map(HeatCnnConfig::from)
}

/// Full experiment configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentConfig {
    #[serde(default)]
    pub data: DataConfig,
    #[serde(default)]
    pub split: SplitConfig,
    #[serde(default = "HeatCnnConfig::new", deserialize_with = "deserialize_model")]
    pub model: HeatCnnConfig,
    #[serde(default)]
    pub training: TrainingConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            data: DataConfig::default(),
            split: SplitConfig::default(),
            model: HeatCnnConfig::new(),
            training: TrainingConfig::default(),
            output: OutputConfig::default(),
        }
    }
}

impl ExperimentConfig {
    /// Check every section and that the data and model agree on the window
    pub fn validate(&self) -> Result<()> {
        let downsampler = self.data.downsampler()?;
        self.split.validate()?;
        self.model.validate()?;
        self.training.validate()?;

        if downsampler.target_width() != self.model.sequence_length {
            return Err(HeatError::Config(format!(
                "downsampled width {} does not match model sequence_length {}",
                downsampler.target_width(),
                self.model.sequence_length
            )));
        }
        if self.data.label_column.is_empty() {
            return Err(HeatError::Config("label_column must not be empty".to_string()));
        }
        if let Some(column) = &self.split.stratify_column {
            if *column != self.data.label_column {
                return Err(HeatError::Config(format!(
                    "split.stratify_column '{}' differs from data.label_column '{}'",
                    column, self.data.label_column
                )));
            }
        }
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let config: Self = load_toml_config(path)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }
}

/// Read and deserialize a TOML file
pub fn load_toml_config<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = fs::read_to_string(path)
        .map_err(|e| HeatError::Config(format!("Failed to read config {}: {e}", path.display())))?;

    toml::from_str(&content)
        .map_err(|e| HeatError::Config(format!("Failed to parse config {}: {e}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = ExperimentConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.data.label_column, "Heat");
        assert_eq!(config.output.checkpoint_dir(), PathBuf::from("output/checkpoints"));
    }

    #[test]
    fn test_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("experiment.toml");
        fs::write(
            &path,
            "[data]\ndata_root = \"/srv/watchplant\"\n\n[training]\nmax_epochs = 5\n\n[model]\nkernel_size = 7\n",
        )
        .unwrap();

        let config = ExperimentConfig::load(&path).unwrap();
        assert_eq!(config.data.data_root, PathBuf::from("/srv/watchplant"));
        assert_eq!(config.data.training_subdir, "training_data");
        assert_eq!(config.training.max_epochs, 5);
        assert_eq!(config.training.batch_size, 8);
        assert_eq!(config.model.kernel_size, 7);
        assert_eq!(config.model.output_channels, 32);
        assert_eq!(config.model.hidden_units, 48);
        assert_eq!(config.model.sequence_length, 100);
    }

    #[test]
    fn test_partial_model_table_keeps_defaults() {
        let config: ExperimentConfig = toml::from_str("[model]\nhidden_units = 16\n").unwrap();
        assert_eq!(config.model, HeatCnnConfig::new().with_hidden_units(16));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/experiment.toml");
        let mut config = ExperimentConfig::default();
        config.training.early_stopping_patience = Some(10);
        config.output.plot_profiles = false;
        config.save(&path).unwrap();

        let loaded = ExperimentConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
        assert_eq!(loaded.output.profile_plot(), None);
    }

    #[test]
    fn test_stratify_column_must_follow_label_column() {
        let mut config = ExperimentConfig::default();
        config.data.label_column = "Stress".to_string();
        assert!(matches!(config.validate(), Err(HeatError::Config(_))));

        config.split.stratify_column = Some("Stress".to_string());
        assert!(config.validate().is_ok());

        config.split.stratify_column = None;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_window_mismatch_rejected() {
        let mut config = ExperimentConfig::default();
        config.data.group_size = 3;
        assert!(matches!(config.validate(), Err(HeatError::Config(_))));
    }

    #[test]
    fn test_absolute_output_paths_kept() {
        let mut output = OutputConfig::default();
        output.export_file = PathBuf::from("/tmp/model.bin");
        assert_eq!(output.export_file(), PathBuf::from("/tmp/model.bin"));
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            ExperimentConfig::load(Path::new("/nonexistent/experiment.toml")),
            Err(HeatError::Config(_))
        ));
    }
}
