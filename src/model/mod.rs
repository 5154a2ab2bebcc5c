//! Model module: the Heat 1-D CNN and its configuration

pub mod cnn;
pub mod config;

pub use cnn::HeatCnn;
pub use config::HeatCnnConfig;
