//! Portable model export
//!
//! The evaluation-mode model is traced op by op on a single example window.
//! Every op's output shape must match the shape implied by the
//! configuration; the weights are then written with burn's binary recorder
//! and a JSON manifest describes the graph next to them.

pub mod reference;

use std::fs;
use std::path::{Path, PathBuf};

use burn::{
    module::Module,
    record::{BinFileRecorder, FullPrecisionSettings},
    tensor::{activation::softmax, backend::Backend, Distribution, ElementConversion, Tensor, TensorData},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::model::config::{POOL_STRIDE, POOL_WINDOW, SELECTED_POSITIONS};
use crate::model::{HeatCnn, HeatCnnConfig};
use crate::utils::error::{HeatError, Result};

pub use reference::{REFERENCE_HEAT_CLASS, REFERENCE_HEAT_WINDOW};

/// Manifest format revision
pub const MANIFEST_VERSION: u32 = 1;

/// Recorder for exported weights
pub type ExportRecorder = BinFileRecorder<FullPrecisionSettings>;

/// Tolerance between the traced output and `HeatCnn::forward`
const TRACE_TOLERANCE: f32 = 1e-5;

/// Operations of the exported graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpKind {
    Conv1d,
    Relu,
    MaxPool1d,
    SelectPositions,
    Linear,
    Softmax,
}

/// One traced op with its observed shapes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TracedOp {
    pub name: String,
    pub kind: OpKind,
    pub input_shape: Vec<usize>,
    pub output_shape: Vec<usize>,
    /// Op attributes, e.g. kernel size or selected positions
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attributes: Vec<(String, usize)>,
}

/// The forward pass as a flat op list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphTrace {
    pub input_shape: Vec<usize>,
    pub output_shape: Vec<usize>,
    pub ops: Vec<TracedOp>,
}

/// Reference window run through the exported model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferenceCheck {
    pub expected_class: usize,
    pub predicted_class: usize,
    pub probabilities: Vec<f32>,
}

/// Sidecar written next to the exported weights
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportManifest {
    pub format_version: u32,
    pub model: HeatCnnConfig,
    pub class_labels: Vec<String>,
    pub graph: GraphTrace,
    pub reference: Option<ReferenceCheck>,
    pub created_at: String,
}

impl ExportManifest {
    pub fn save(&self, path: &Path) -> Result<()> {
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(HeatError::PathNotFound(path.to_path_buf()));
        }
        Ok(serde_json::from_str(&fs::read_to_string(path)?)?)
    }
}

/// `model.bin` -> `model.graph.json`
pub fn manifest_path(export_path: &Path) -> PathBuf {
    export_path.with_extension("graph.json")
}

struct Tracer {
    ops: Vec<TracedOp>,
}

impl Tracer {
    /// Record an op, failing when the observed shape is not the static one
    fn record<const D: usize>(
        &mut self,
        name: &str,
        kind: OpKind,
        input_shape: Vec<usize>,
        output: &[usize; D],
        expected: &[usize],
        attributes: Vec<(String, usize)>,
    ) -> Result<()> {
        if output.as_slice() != expected {
            return Err(HeatError::Export {
                op: name.to_string(),
                reason: format!("output shape {:?} differs from static shape {:?}", output, expected),
            });
        }
        self.ops.push(TracedOp {
            name: name.to_string(),
            kind,
            input_shape,
            output_shape: output.to_vec(),
            attributes,
        });
        Ok(())
    }
}

/// Trace the forward pass of `model` on `example`.
///
/// The example must be a single window `[1, channels, length]`; shapes of
/// every op are checked against `config`.
pub fn trace_model<B: Backend>(model: &HeatCnn<B>, config: &HeatCnnConfig, example: Tensor<B, 3>) -> Result<GraphTrace> {
    let input_shape = example.dims();
    let expected_input = config.example_input_shape();
    if input_shape != expected_input {
        return Err(HeatError::Export {
            op: "input".to_string(),
            reason: format!(
                "example input {:?} is not the static shape {:?}",
                input_shape, expected_input
            ),
        });
    }

    let conv_len = config.conv_len()?;
    let pooled_len = config.pooled_len()?;
    let width = config.flattened_width()?;
    let channels = config.output_channels;

    let mut tracer = Tracer { ops: Vec::new() };

    let x = model.conv.forward(example.clone());
    tracer.record(
        "conv1",
        OpKind::Conv1d,
        input_shape.to_vec(),
        &x.dims(),
        &[1, channels, conv_len],
        vec![("kernel_size".to_string(), config.kernel_size)],
    )?;

    let x = model.activation.forward(x);
    tracer.record("relu1", OpKind::Relu, vec![1, channels, conv_len], &x.dims(), &[1, channels, conv_len], vec![])?;

    let x = model.pool.forward(x);
    tracer.record(
        "pool1",
        OpKind::MaxPool1d,
        vec![1, channels, conv_len],
        &x.dims(),
        &[1, channels, pooled_len],
        vec![("window".to_string(), POOL_WINDOW), ("stride".to_string(), POOL_STRIDE)],
    )?;

    let x = HeatCnn::select_positions(x);
    tracer.record(
        "select",
        OpKind::SelectPositions,
        vec![1, channels, pooled_len],
        &x.dims(),
        &[1, width],
        vec![("positions".to_string(), SELECTED_POSITIONS)],
    )?;

    let x = model.hidden.forward(x);
    tracer.record("fc1", OpKind::Linear, vec![1, width], &x.dims(), &[1, config.hidden_units], vec![])?;

    let x = model.activation.forward(x);
    tracer.record(
        "relu2",
        OpKind::Relu,
        vec![1, config.hidden_units],
        &x.dims(),
        &[1, config.hidden_units],
        vec![],
    )?;

    let x = model.output.forward(x);
    tracer.record(
        "fc2",
        OpKind::Linear,
        vec![1, config.hidden_units],
        &x.dims(),
        &[1, config.num_classes],
        vec![],
    )?;

    let traced = softmax(x, 1);
    tracer.record(
        "softmax",
        OpKind::Softmax,
        vec![1, config.num_classes],
        &traced.dims(),
        &[1, config.num_classes],
        vec![],
    )?;

    let direct = model.forward(example);
    let diff: f32 = (traced - direct).abs().max().into_scalar().elem();
    if !(diff <= TRACE_TOLERANCE) {
        return Err(HeatError::Export {
            op: "softmax".to_string(),
            reason: format!("traced output differs from forward by {}", diff),
        });
    }

    Ok(GraphTrace {
        input_shape: input_shape.to_vec(),
        output_shape: vec![1, config.num_classes],
        ops: tracer.ops,
    })
}

/// Run the reference Heat window through `model` when the geometry allows
fn reference_check<B: Backend>(model: &HeatCnn<B>, config: &HeatCnnConfig, device: &B::Device) -> Result<Option<ReferenceCheck>> {
    if config.example_input_shape() != [1, 1, REFERENCE_HEAT_WINDOW.len()] {
        return Ok(None);
    }

    let input = Tensor::<B, 3>::from_floats(
        TensorData::new(REFERENCE_HEAT_WINDOW.to_vec(), [1, 1, REFERENCE_HEAT_WINDOW.len()]),
        device,
    );
    let probabilities: Vec<f32> = model
        .forward(input)
        .into_data()
        .to_vec()
        .map_err(|e| HeatError::Export {
            op: "reference".to_string(),
            reason: format!("{:?}", e),
        })?;
    let predicted_class = probabilities
        .iter()
        .enumerate()
        .fold((0usize, f32::NEG_INFINITY), |best, (i, &p)| if p > best.1 { (i, p) } else { best })
        .0;

    Ok(Some(ReferenceCheck {
        expected_class: REFERENCE_HEAT_CLASS,
        predicted_class,
        probabilities,
    }))
}

/// Export an evaluation-mode model.
///
/// Writes the weights to `path` (which should end in `.bin`) and the
/// manifest to `manifest_path(path)`. The weights are read back before the
/// manifest is written, so a manifest only exists for a loadable export.
pub fn export_model<B: Backend>(
    model: &HeatCnn<B>,
    config: &HeatCnnConfig,
    class_labels: Vec<String>,
    path: &Path,
    device: &B::Device,
) -> Result<ExportManifest> {
    let example = Tensor::<B, 3>::random(config.example_input_shape(), Distribution::Normal(0.0, 1.0), device);
    let graph = trace_model(model, config, example)?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    model
        .clone()
        .save_file(path.to_path_buf(), &ExportRecorder::new())
        .map_err(|e| HeatError::Export {
            op: "record".to_string(),
            reason: format!("{:?}", e),
        })?;

    let reloaded = config
        .init::<B>(device)?
        .load_file(path.to_path_buf(), &ExportRecorder::new(), device)?;
    let reference = reference_check(&reloaded, config, device)?;
    if let Some(check) = &reference {
        info!(
            "Reference Heat window -> class {} (probabilities {:?})",
            check.predicted_class, check.probabilities
        );
    }

    let manifest = ExportManifest {
        format_version: MANIFEST_VERSION,
        model: config.clone(),
        class_labels,
        graph,
        reference,
        created_at: Utc::now().to_rfc3339(),
    };
    manifest.save(&manifest_path(path))?;

    info!("Exported model to {:?} ({} ops)", path, manifest.graph.ops.len());
    Ok(manifest)
}

/// Load an export written by `export_model`
pub fn load_exported<B: Backend>(path: &Path, device: &B::Device) -> Result<(HeatCnn<B>, ExportManifest)> {
    if !path.exists() {
        return Err(HeatError::PathNotFound(path.to_path_buf()));
    }
    let manifest = ExportManifest::load(&manifest_path(path))?;
    if manifest.format_version != MANIFEST_VERSION {
        return Err(HeatError::Export {
            op: "manifest".to_string(),
            reason: format!("unsupported format version {}", manifest.format_version),
        });
    }
    let model = manifest
        .model
        .init::<B>(device)?
        .load_file(path.to_path_buf(), &ExportRecorder::new(), device)?;
    Ok((model, manifest))
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    #[test]
    fn test_trace_default_model() {
        let device = Default::default();
        let config = HeatCnnConfig::new();
        let model = config.init::<TestBackend>(&device).unwrap();

        let trace = trace_model(&model, &config, Tensor::zeros([1, 1, 100], &device)).unwrap();
        let names: Vec<&str> = trace.ops.iter().map(|op| op.name.as_str()).collect();
        assert_eq!(names, vec!["conv1", "relu1", "pool1", "select", "fc1", "relu2", "fc2", "softmax"]);
        assert_eq!(trace.ops[0].output_shape, vec![1, 32, 96]);
        assert_eq!(trace.ops[2].output_shape, vec![1, 32, 32]);
        assert_eq!(trace.ops[3].output_shape, vec![1, 64]);
        assert_eq!(trace.output_shape, vec![1, 2]);
    }

    #[test]
    fn test_batched_example_is_rejected() {
        let device = Default::default();
        let config = HeatCnnConfig::new();
        let model = config.init::<TestBackend>(&device).unwrap();

        match trace_model(&model, &config, Tensor::zeros([2, 1, 100], &device)) {
            Err(HeatError::Export { op, .. }) => assert_eq!(op, "input"),
            other => panic!("expected export error, got {:?}", other.map(|t| t.ops.len())),
        }
    }

    #[test]
    fn test_mismatched_config_names_the_op() {
        let device = Default::default();
        let model = HeatCnnConfig::new().init::<TestBackend>(&device).unwrap();
        let other = HeatCnnConfig::new().with_kernel_size(3);

        match trace_model(&model, &other, Tensor::zeros([1, 1, 100], &device)) {
            Err(HeatError::Export { op, .. }) => assert_eq!(op, "conv1"),
            other => panic!("expected export error, got {:?}", other.map(|t| t.ops.len())),
        }
    }

    #[test]
    fn test_export_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.bin");
        let device = Default::default();
        let config = HeatCnnConfig::new();
        let model = config.init::<TestBackend>(&device).unwrap();

        let manifest = export_model(&model, &config, vec!["0".into(), "1".into()], &path, &device).unwrap();
        assert!(path.exists());
        assert!(dir.path().join("model.graph.json").exists());

        let reference = manifest.reference.unwrap();
        assert_eq!(reference.expected_class, 1);
        assert!((reference.probabilities.iter().sum::<f32>() - 1.0).abs() < 1e-5);

        let (loaded, loaded_manifest) = load_exported::<TestBackend>(&path, &device).unwrap();
        assert_eq!(loaded_manifest.model, config);

        let input = Tensor::<TestBackend, 3>::ones([1, 1, 100], &device);
        let a: Vec<f32> = model.forward(input.clone()).into_data().to_vec().unwrap();
        let b: Vec<f32> = loaded.forward(input).into_data().to_vec().unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_manifest_path() {
        assert_eq!(manifest_path(Path::new("out/model.bin")), PathBuf::from("out/model.graph.json"));
    }
}
