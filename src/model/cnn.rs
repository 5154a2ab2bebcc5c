//! 1-D CNN for Heat-stress classification
//!
//! A single convolution stage followed by a two-layer classifier head. The
//! head reads only the first two pooled positions of every feature map.

use burn::{
    module::Module,
    nn::{
        conv::{Conv1d, Conv1dConfig},
        pool::{MaxPool1d, MaxPool1dConfig},
        Linear, LinearConfig, Relu,
    },
    tensor::{activation::softmax, backend::Backend, Tensor},
};

use crate::model::config::{HeatCnnConfig, POOL_STRIDE, POOL_WINDOW, SELECTED_POSITIONS};
use crate::utils::error::{HeatError, Result};

/// Heat-stress classifier
#[derive(Module, Debug)]
pub struct HeatCnn<B: Backend> {
    // Public for the export tracer
    pub conv: Conv1d<B>,
    pub pool: MaxPool1d,
    pub hidden: Linear<B>,
    pub output: Linear<B>,
    pub activation: Relu,
}

impl HeatCnnConfig {
    /// Build the model and verify the head is sized for the feature width.
    ///
    /// The width is computed analytically and by a trial pass on zeros; any
    /// disagreement with the constructed layer is a configuration error.
    pub fn init<B: Backend>(&self, device: &B::Device) -> Result<HeatCnn<B>> {
        let width = self.flattened_width()?;

        let model = HeatCnn {
            conv: Conv1dConfig::new(self.input_channels, self.output_channels, self.kernel_size)
                .init(device),
            pool: MaxPool1dConfig::new(POOL_WINDOW).with_stride(POOL_STRIDE).init(),
            hidden: LinearConfig::new(width, self.hidden_units)
                .with_bias(false)
                .init(device),
            output: LinearConfig::new(self.hidden_units, self.num_classes)
                .with_bias(false)
                .init(device),
            activation: Relu::new(),
        };

        model.check_shapes(self, device)?;
        Ok(model)
    }
}

impl<B: Backend> HeatCnn<B> {
    /// Conv, ReLU and pool: `[batch, in, length]` -> `[batch, filters, pooled]`
    pub fn features(&self, x: Tensor<B, 3>) -> Tensor<B, 3> {
        let x = self.conv.forward(x);
        let x = self.activation.forward(x);
        self.pool.forward(x)
    }

    /// Concatenate pooled positions 0 and 1: `[batch, filters, pooled]` ->
    /// `[batch, 2 * filters]`
    pub fn select_positions(x: Tensor<B, 3>) -> Tensor<B, 2> {
        let [batch, channels, _] = x.dims();
        let positions = (0..SELECTED_POSITIONS)
            .map(|p| x.clone().narrow(2, p, 1).reshape([batch, channels]))
            .collect();
        Tensor::cat(positions, 1)
    }

    /// Unnormalized class scores, `[batch, num_classes]`
    pub fn forward_logits(&self, x: Tensor<B, 3>) -> Tensor<B, 2> {
        let x = Self::select_positions(self.features(x));
        let x = self.hidden.forward(x);
        let x = self.activation.forward(x);
        self.output.forward(x)
    }

    /// Class probabilities, `[batch, num_classes]`
    pub fn forward(&self, x: Tensor<B, 3>) -> Tensor<B, 2> {
        softmax(self.forward_logits(x), 1)
    }

    /// Input width of the first fully-connected layer
    pub fn hidden_in_features(&self) -> usize {
        self.hidden.weight.val().dims()[0]
    }

    /// Output classes
    pub fn num_classes(&self) -> usize {
        self.output.weight.val().dims()[1]
    }

    /// Feature width produced by a zero input of the configured shape
    pub fn probe_flattened_width(&self, config: &HeatCnnConfig, device: &B::Device) -> usize {
        let dummy = Tensor::<B, 3>::zeros(config.example_input_shape(), device);
        Self::select_positions(self.features(dummy)).dims()[1]
    }

    /// Verify the layers agree with `config`
    pub fn check_shapes(&self, config: &HeatCnnConfig, device: &B::Device) -> Result<()> {
        let analytic = config.flattened_width()?;
        let probed = self.probe_flattened_width(config, device);
        let layer = self.hidden_in_features();

        if analytic != probed || analytic != layer {
            return Err(HeatError::Config(format!(
                "flattened width mismatch: analytic {}, trial pass {}, hidden layer expects {}",
                analytic, probed, layer
            )));
        }
        if self.num_classes() != config.num_classes {
            return Err(HeatError::Config(format!(
                "output layer has {} classes, config expects {}",
                self.num_classes(),
                config.num_classes
            )));
        }
        Ok(())
    }
}
