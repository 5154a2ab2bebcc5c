//! Utility modules: errors, logging, metrics and charts

pub mod charts;
pub mod error;
pub mod logging;
pub mod metrics;

pub use error::{HeatError, Result, ResultExt};
pub use metrics::{ConfusionMatrix, Metrics};
