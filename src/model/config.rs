//! Model configuration and static shape computation
//!
//! The classifier is `Conv1d -> ReLU -> MaxPool1d(3, 3) -> pick pooled
//! positions 0 and 1 -> Linear -> ReLU -> Linear -> softmax`. Every tensor
//! shape along that path follows from the configuration alone.

use burn::config::Config;

use crate::utils::error::{self, HeatError};

/// Max-pool window
pub const POOL_WINDOW: usize = 3;

/// Max-pool stride
pub const POOL_STRIDE: usize = 3;

/// Pooled positions concatenated along the feature axis
pub const SELECTED_POSITIONS: usize = 2;

/// Configuration for the `HeatCnn` classifier
#[derive(Config, Debug, PartialEq)]
pub struct HeatCnnConfig {
    /// Input channels (1 for a single electrode window)
    #[config(default = "1")]
    pub input_channels: usize,

    /// Convolution filters
    #[config(default = "32")]
    pub output_channels: usize,

    /// Convolution kernel width
    #[config(default = "5")]
    pub kernel_size: usize,

    /// Timesteps per window after downsampling
    #[config(default = "100")]
    pub sequence_length: usize,

    /// Units of the hidden fully-connected layer
    #[config(default = "48")]
    pub hidden_units: usize,

    /// Output classes
    #[config(default = "2")]
    pub num_classes: usize,
}

/// Output length of a stride-1, unpadded convolution
pub fn conv_output_len(input_len: usize, kernel_size: usize) -> Option<usize> {
    input_len.checked_sub(kernel_size).map(|d| d + 1)
}

/// Output length of a max-pool without padding
pub fn pool_output_len(input_len: usize, window: usize, stride: usize) -> usize {
    if input_len < window || stride == 0 {
        0
    } else {
        (input_len - window) / stride + 1
    }
}

impl HeatCnnConfig {
    /// Check every size and that the pooled sequence has the positions the
    /// classifier head reads
    pub fn validate(&self) -> error::Result<()> {
        for (name, value) in [
            ("input_channels", self.input_channels),
            ("output_channels", self.output_channels),
            ("kernel_size", self.kernel_size),
            ("sequence_length", self.sequence_length),
            ("hidden_units", self.hidden_units),
            ("num_classes", self.num_classes),
        ] {
            if value == 0 {
                return Err(HeatError::Config(format!("{} must be greater than zero", name)));
            }
        }

        if self.kernel_size > self.sequence_length {
            return Err(HeatError::Config(format!(
                "kernel_size {} exceeds sequence_length {}",
                self.kernel_size, self.sequence_length
            )));
        }

        let pooled = self.pooled_len()?;
        if pooled < SELECTED_POSITIONS {
            return Err(HeatError::Config(format!(
                "pooled length {} is shorter than the {} positions read by the classifier",
                pooled, SELECTED_POSITIONS
            )));
        }

        Ok(())
    }

    /// Sequence length after the convolution
    pub fn conv_len(&self) -> error::Result<usize> {
        conv_output_len(self.sequence_length, self.kernel_size).ok_or_else(|| {
            HeatError::Config(format!(
                "kernel_size {} exceeds sequence_length {}",
                self.kernel_size, self.sequence_length
            ))
        })
    }

    /// Sequence length after the max-pool
    pub fn pooled_len(&self) -> error::Result<usize> {
        Ok(pool_output_len(self.conv_len()?, POOL_WINDOW, POOL_STRIDE))
    }

    /// Input width of the first fully-connected layer
    pub fn flattened_width(&self) -> error::Result<usize> {
        self.validate()?;
        Ok(SELECTED_POSITIONS * self.output_channels)
    }

    /// Input shape of a single example, `[1, channels, length]`
    pub fn example_input_shape(&self) -> [usize; 3] {
        [1, self.input_channels, self.sequence_length]
    }

    /// Trainable parameter count
    pub fn num_params(&self) -> error::Result<usize> {
        let conv = self.input_channels * self.output_channels * self.kernel_size + self.output_channels;
        let hidden = self.flattened_width()? * self.hidden_units;
        let output = self.hidden_units * self.num_classes;
        Ok(conv + hidden + output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = HeatCnnConfig::new();
        assert_eq!(config.input_channels, 1);
        assert_eq!(config.output_channels, 32);
        assert_eq!(config.kernel_size, 5);
        assert_eq!(config.sequence_length, 100);
        assert_eq!(config.hidden_units, 48);
        assert_eq!(config.num_classes, 2);
    }

    #[test]
    fn test_shape_chain_for_defaults() {
        let config = HeatCnnConfig::new();
        assert_eq!(config.conv_len().unwrap(), 96);
        assert_eq!(config.pooled_len().unwrap(), 32);
        assert_eq!(config.flattened_width().unwrap(), 64);
    }

    #[test]
    fn test_width_follows_output_channels() {
        let config = HeatCnnConfig::new().with_output_channels(8).with_kernel_size(3);
        assert_eq!(config.flattened_width().unwrap(), 16);
    }

    #[test]
    fn test_pool_output_len() {
        assert_eq!(pool_output_len(96, 3, 3), 32);
        assert_eq!(pool_output_len(7, 3, 3), 2);
        assert_eq!(pool_output_len(2, 3, 3), 0);
    }

    #[test]
    fn test_invalid_configs() {
        assert!(HeatCnnConfig::new().with_kernel_size(101).validate().is_err());
        assert!(HeatCnnConfig::new().with_output_channels(0).validate().is_err());
        // conv length 5 -> pooled length 1, too short for two positions
        assert!(HeatCnnConfig::new().with_sequence_length(9).validate().is_err());
        assert!(HeatCnnConfig::new().with_sequence_length(10).validate().is_ok());
    }

    #[test]
    fn test_num_params() {
        // conv 1*32*5+32, hidden 64*48, output 48*2
        assert_eq!(HeatCnnConfig::new().num_params().unwrap(), 192 + 3072 + 96);
    }

    #[test]
    fn test_json_round_trip() {
        let config = HeatCnnConfig::new().with_kernel_size(7);
        let json = serde_json::to_string(&config).unwrap();
        let back: HeatCnnConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }
}
