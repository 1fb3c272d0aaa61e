//! Utility modules: errors, logging and evaluation metrics

pub mod error;
pub mod logging;
pub mod metrics;

pub use error::{Result, SceneError};
pub use logging::{init_logging, ProgressLogger};
pub use metrics::{ClassMetrics, ConfusionMatrix, Metrics};
