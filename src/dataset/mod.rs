//! Dataset module
//!
//! CSV ingestion, downsampling, splitting and conversion of signal windows
//! into Burn tensors.

pub mod burn_dataset;
pub mod downsample;
pub mod encoding;
pub mod loader;
pub mod normalize;
pub mod profile;
pub mod split;
pub mod table;

pub use burn_dataset::{HeatBatch, HeatBatcher, HeatItem, HeatSignalDataset};
pub use downsample::Downsampler;
pub use encoding::{table_to_tensors, OneHotEncoder, TensorPair};
pub use loader::load_signal_table;
pub use split::{split_dataset, DatasetSplits, SplitConfig};
pub use table::{Category, Cell, SignalTable};
