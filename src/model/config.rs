//! Model and Training Configuration
//!
//! Configuration structures for model variant selection and training
//! hyperparameters, serializable to JSON.

use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::utils::error::{Result, SceneError};

/// The three network size variants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModelVariant {
    /// Full VGG-16-sized network
    Full,
    /// Three-stage network, the default
    Small,
    /// Three-stage network with halved filter counts
    Small2,
}

impl Default for ModelVariant {
    fn default() -> Self {
        Self::Small
    }
}

impl FromStr for ModelVariant {
    type Err = SceneError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "full" => Ok(Self::Full),
            "small" => Ok(Self::Small),
            "small2" => Ok(Self::Small2),
            other => Err(SceneError::Config(format!(
                "unknown model variant '{}' (expected full, small or small2)",
                other
            ))),
        }
    }
}

impl std::fmt::Display for ModelVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Full => write!(f, "full"),
            Self::Small => write!(f, "small"),
            Self::Small2 => write!(f, "small2"),
        }
    }
}

/// Training hyperparameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingConfig {
    /// Number of training epochs
    pub max_epoch: usize,

    /// Batch size for training and validation
    pub batch_size: usize,

    /// Adam learning rate
    pub learning_rate: f64,

    /// Input image size (square crop side)
    pub img_size: u32,

    /// Model variant to train
    pub model: ModelVariant,

    /// Random seed for shuffling, cropping and flipping
    pub seed: u64,

    /// Directory for checkpoint snapshots
    pub output_dir: String,

    /// Evaluate with random crops instead of center crops
    /// (the historical evaluation behavior)
    pub legacy_eval: bool,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            max_epoch: 20,
            batch_size: 32,
            learning_rate: 1e-3,
            img_size: 224,
            model: ModelVariant::Small,
            seed: 42,
            output_dir: "output/models".to_string(),
            legacy_eval: false,
        }
    }
}

impl TrainingConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.max_epoch == 0 {
            return Err(SceneError::Config("max_epoch must be positive".to_string()));
        }
        if self.batch_size == 0 {
            return Err(SceneError::Config(
                "batch_size must be positive".to_string(),
            ));
        }
        if self.learning_rate <= 0.0 {
            return Err(SceneError::Config(
                "learning_rate must be positive".to_string(),
            ));
        }
        if self.img_size == 0 {
            return Err(SceneError::Config("img_size must be positive".to_string()));
        }
        Ok(())
    }

    /// Save configuration to a JSON file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| SceneError::Config(format!("failed to serialize config: {}", e)))?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Load configuration from a JSON file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        serde_json::from_str(&json)
            .map_err(|e| SceneError::Config(format!("failed to parse config: {}", e)))
    }
}
