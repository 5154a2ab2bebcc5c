//! WatchPlant Heat CLI
//!
//! Train, evaluate, export and run the Heat-stress classifier on plant
//! bioelectric signal windows.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use tracing::info;

use watchplant_heat::backend::{backend_name, default_device, DefaultBackend, TrainingBackend};
use watchplant_heat::config::ExperimentConfig;
use watchplant_heat::dataset::downsample::GROUP_SIZE;
use watchplant_heat::dataset::loader::read_csv_file;
use watchplant_heat::dataset::normalize::Scaling;
use watchplant_heat::export::export_model;
use watchplant_heat::inference::HeatPredictor;
use watchplant_heat::training::checkpoint::CheckpointManager;
use watchplant_heat::training::pipeline::{evaluate_partition, load_downsampled, plot_profiles, prepare_data};
use watchplant_heat::training::run_experiment;
use watchplant_heat::utils::logging::{init_logging, LogConfig};

/// Heat-stress classification of plant bioelectric signals
#[derive(Parser, Debug)]
#[command(name = "watchplant_heat")]
#[command(version)]
#[command(about = "Heat-stress 1-D CNN for plant bioelectric signals", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, default_value = "false")]
    verbose: bool,

    /// Experiment configuration (TOML); defaults are used when omitted
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Train, evaluate, snapshot and export in one run
    Train {
        /// Root directory holding the per-experiment folders
        #[arg(short, long)]
        data_root: Option<PathBuf>,

        /// Directory for checkpoints, models and reports
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Maximum number of epochs
        #[arg(short, long)]
        epochs: Option<usize>,

        /// Data loader worker threads
        #[arg(long)]
        workers: Option<usize>,

        /// Seed for the backend and every split
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Evaluate the best checkpoint on the validation and test partitions
    Evaluate {
        /// Checkpoint directory (defaults to the configured one)
        #[arg(long)]
        checkpoint_dir: Option<PathBuf>,
    },

    /// Export the best checkpoint to a portable binary
    Export {
        #[arg(long)]
        checkpoint_dir: Option<PathBuf>,

        /// Output file (defaults to the configured export file)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Classify every window of a CSV file
    Predict {
        /// Exported `.bin` file, `.mpk` snapshot or checkpoint directory
        #[arg(short, long)]
        model: PathBuf,

        /// CSV file whose trailing columns are windows
        #[arg(short, long)]
        input: PathBuf,

        /// Scaling applied to each downsampled window
        #[arg(long, value_enum, default_value = "none")]
        scaling: ScalingArg,
    },

    /// Print dataset and split statistics
    Stats,

    /// Write the per-class mean and std chart
    Plot {
        /// Output SVG (defaults to the configured chart path)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Write a configuration file with every default filled in
    InitConfig {
        #[arg(short, long, default_value = "config/experiment.toml")]
        output: PathBuf,
    },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum ScalingArg {
    None,
    /// Fixed bounds of the acquisition device
    MinMax,
    ZScore,
}

impl From<ScalingArg> for Scaling {
    fn from(arg: ScalingArg) -> Self {
        match arg {
            ScalingArg::None => Scaling::None,
            ScalingArg::MinMax => Scaling::device_min_max(),
            ScalingArg::ZScore => Scaling::ZScore { factor: 1.0 },
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_config = if cli.verbose {
        LogConfig::verbose()
    } else {
        LogConfig::default()
    };
    let _ = init_logging(&log_config);

    print_banner();

    let config = || load_config(cli.config.as_deref());

    match cli.command {
        Commands::Train {
            data_root,
            output_dir,
            epochs,
            workers,
            seed,
        } => {
            let mut config = config()?;
            if let Some(root) = data_root {
                config.data.data_root = root;
            }
            if let Some(dir) = output_dir {
                config.output.output_dir = dir;
            }
            if let Some(epochs) = epochs {
                config.training.max_epochs = epochs;
            }
            if let Some(workers) = workers {
                config.training.num_workers = workers;
            }
            if let Some(seed) = seed {
                config.training.seed = seed;
                config.split.shuffle_seed = seed;
                config.split.test_seed = seed;
                config.split.validation_seed = seed;
            }
            cmd_train(&config)
        }
        Commands::Evaluate { checkpoint_dir } => cmd_evaluate(&config()?, checkpoint_dir),
        Commands::Export { checkpoint_dir, output } => cmd_export(&config()?, checkpoint_dir, output),
        Commands::Predict { model, input, scaling } => cmd_predict(&config, &model, &input, scaling.into()),
        Commands::Stats => cmd_stats(&config()?),
        Commands::Plot { output } => cmd_plot(&config()?, output),
        Commands::InitConfig { output } => cmd_init_config(&output),
    }
}

fn print_banner() {
    println!();
    println!("{}", "╔══════════════════════════════════════════════╗".green());
    println!("{}", "║     WatchPlant Heat-Stress Classifier        ║".green().bold());
    println!("{}", "╚══════════════════════════════════════════════╝".green());
    println!("  version {} | backend {}", watchplant_heat::VERSION, backend_name());
    println!();
}

fn load_config(path: Option<&Path>) -> Result<ExperimentConfig> {
    match path {
        Some(path) => ExperimentConfig::load(path).with_context(|| format!("loading {}", path.display())),
        None => {
            info!("No configuration file given, using defaults");
            Ok(ExperimentConfig::default())
        }
    }
}

fn cmd_init_config(output: &Path) -> Result<()> {
    ExperimentConfig::default()
        .save(output)
        .with_context(|| format!("writing {}", output.display()))?;
    println!("{} {}", "Configuration written to".green(), output.display());
    Ok(())
}

fn cmd_train(config: &ExperimentConfig) -> Result<()> {
    println!("{}", "Training Configuration:".cyan().bold());
    println!("  Data root:       {}", config.data.data_root.display());
    println!("  Epochs:          {}", config.training.max_epochs);
    println!("  Batch size:      {}", config.training.batch_size);
    println!("  Learning rate:   {}", config.training.learning_rate);
    println!("  Workers:         {}", config.training.num_workers);
    println!("  Seed:            {}", config.training.seed);
    println!("  Output:          {}", config.output.output_dir.display());
    println!();

    let report = run_experiment::<TrainingBackend>(config, &default_device()).context("experiment failed")?;

    println!();
    println!("{}", "Experiment Summary:".green().bold());
    println!(
        "  Best epoch:      {} (val_accuracy {:.2}%)",
        report.training.best.epoch,
        report.training.best.val_accuracy * 100.0
    );
    println!("  Epochs run:      {}", report.training.epochs_run);
    println!("{}", report.test.display());
    println!("{}", report.test.confusion_matrix.render(&report.training.best.class_labels));
    if let Some(reference) = &report.reference {
        println!(
            "  Reference Heat window: class {} {:?}",
            reference.predicted_class, reference.probabilities
        );
    }
    println!("  Checkpoint:      {}", report.artifacts.best_checkpoint.display());
    println!("  Final model:     {}", report.artifacts.final_model.display());
    println!("  Export:          {}", report.artifacts.export.display());
    println!("  Report:          {}", config.output.report_file().display());
    Ok(())
}

fn cmd_evaluate(config: &ExperimentConfig, checkpoint_dir: Option<PathBuf>) -> Result<()> {
    let dir = checkpoint_dir.unwrap_or_else(|| config.output.checkpoint_dir());
    let device = default_device();
    let (model, metadata) =
        CheckpointManager::load_best::<DefaultBackend>(&dir, &device).context("loading best checkpoint")?;

    let data = prepare_data(config)?;
    let validation = evaluate_partition(&model, &data.validation, config, &device)?;
    let test = evaluate_partition(&model, &data.test, config, &device)?;

    println!("{}", format!("Checkpoint from epoch {}", metadata.epoch).cyan().bold());
    println!(
        "  Recorded val_accuracy: {:.4} | re-evaluated: {:.4}",
        metadata.val_accuracy, validation.accuracy
    );
    println!("{}", "Test partition:".cyan().bold());
    println!("{}", test.display());
    println!("{}", test.confusion_matrix.render(&metadata.class_labels));
    Ok(())
}

fn cmd_export(config: &ExperimentConfig, checkpoint_dir: Option<PathBuf>, output: Option<PathBuf>) -> Result<()> {
    let dir = checkpoint_dir.unwrap_or_else(|| config.output.checkpoint_dir());
    let output = output.unwrap_or_else(|| config.output.export_file());
    let device = default_device();

    let (model, metadata) =
        CheckpointManager::load_best::<DefaultBackend>(&dir, &device).context("loading best checkpoint")?;
    let manifest = export_model(&model, &metadata.model, metadata.class_labels, &output, &device)
        .with_context(|| format!("exporting to {}", output.display()))?;

    println!("{} {}", "Exported".green().bold(), output.display());
    for op in &manifest.graph.ops {
        println!("  {:<8} {:?} -> {:?}", op.name, op.input_shape, op.output_shape);
    }
    if let Some(reference) = &manifest.reference {
        println!("  Reference Heat window probabilities: {:?}", reference.probabilities);
    }
    Ok(())
}

fn cmd_predict(
    config: impl Fn() -> Result<ExperimentConfig>,
    model: &Path,
    input: &Path,
    scaling: Scaling,
) -> Result<()> {
    let device = default_device();
    let extension = model.extension().and_then(|e| e.to_str());
    let predictor = if model.is_dir() {
        HeatPredictor::<DefaultBackend>::from_checkpoint_dir(model, device)
    } else if extension == Some("bin") {
        HeatPredictor::<DefaultBackend>::from_export(model, device)
    } else if extension == Some("mpk") {
        // Snapshots carry no metadata; the geometry comes from the configuration
        let model_config = config()?.model;
        let labels = (0..model_config.num_classes).map(|i| i.to_string()).collect();
        HeatPredictor::<DefaultBackend>::from_snapshot(model, model_config, labels, device)
    } else {
        bail!(
            "expected an exported .bin file, a .mpk snapshot or a checkpoint directory, got {}",
            model.display()
        );
    }
    .with_context(|| format!("loading model from {}", model.display()))?
    .with_scaling(scaling);

    let table = read_csv_file(input).with_context(|| format!("reading {}", input.display()))?;
    let length = predictor.config().sequence_length;
    let raw = length * GROUP_SIZE;
    let width = if table.width() >= raw { raw } else { length };
    let values = table.trailing_values(width)?;

    let windows: Vec<Vec<f32>> = values.chunks(width).map(|w| w.to_vec()).collect();
    let predictions = predictor.predict_batch(&windows)?;

    println!("{}", format!("{} windows from {}", predictions.len(), input.display()).cyan().bold());
    for (i, prediction) in predictions.iter().enumerate() {
        let label = if prediction.is_heat() {
            "HEAT".red().bold()
        } else {
            "no heat".green()
        };
        println!(
            "  [{:>4}] {:<8} confidence {:.2}% {:?}",
            i,
            label,
            prediction.confidence * 100.0,
            prediction.probabilities
        );
    }
    Ok(())
}

fn cmd_stats(config: &ExperimentConfig) -> Result<()> {
    let data = prepare_data(config)?;
    println!("{}", "Dataset Statistics:".cyan().bold());
    println!("{}", data.summary);
    println!("{}", data.split_stats(&config.data.label_column)?);
    Ok(())
}

fn cmd_plot(config: &ExperimentConfig, output: Option<PathBuf>) -> Result<()> {
    let path = output.unwrap_or_else(|| config.output.resolve(&config.output.profile_plot));
    let (_, table) = load_downsampled(config)?;
    plot_profiles(config, &table, &path)?;
    println!("{} {}", "Chart written to".green(), path.display());
    Ok(())
}
