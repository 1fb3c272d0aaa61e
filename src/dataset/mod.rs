//! Dataset module for indoor/outdoor frame classification
//!
//! This module provides:
//! - Manifest (dataset list) parsing, shuffling and splitting
//! - The geometric transform library used by the preprocessing pipeline
//! - The mean image estimator and its persistence
//! - The on-the-fly preprocessing dataset adapter with Burn integration

pub mod manifest;
pub mod mean;
pub mod preprocess;
pub mod transform;

use serde::{Deserialize, Serialize};

// Re-export main types for convenience
pub use manifest::{
    read_manifest, shuffle_and_split, write_manifest, LabeledImageList, LabeledImageSource,
    ManifestEntry,
};
pub use mean::{compute_mean, load_mean, load_mean_or_neutral, neutral_mean, save_mean};
pub use preprocess::{
    CropMode, PreprocessConfig, PreprocessDataset, SceneBatch, SceneBatcher, SceneItem,
};
pub use transform::CropBox;

/// Total number of classes
pub const NUM_CLASSES: usize = 2;

/// Label used for outdoor frames in manifests
///
/// Fixed by the data-prep tooling: segment rows tagged `out` are written
/// with label 0, everything else with label 1. Do not flip.
pub const LABEL_OUTDOOR: usize = 0;

/// Label used for indoor frames in manifests
pub const LABEL_INDOOR: usize = 1;

/// The two scene classes, with their manifest label values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SceneClass {
    Outdoor,
    Indoor,
}

impl SceneClass {
    /// Map a manifest label to its class
    pub fn from_label(label: usize) -> Option<Self> {
        match label {
            LABEL_OUTDOOR => Some(Self::Outdoor),
            LABEL_INDOOR => Some(Self::Indoor),
            _ => None,
        }
    }

    /// The manifest label value of this class
    pub fn label(self) -> usize {
        match self {
            Self::Outdoor => LABEL_OUTDOOR,
            Self::Indoor => LABEL_INDOOR,
        }
    }

    /// Human-readable class name
    pub fn name(self) -> &'static str {
        match self {
            Self::Outdoor => "Outdoor",
            Self::Indoor => "Indoor",
        }
    }
}

impl std::fmt::Display for SceneClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_convention() {
        // The index convention is load-bearing: outdoor is 0, indoor is 1
        assert_eq!(LABEL_OUTDOOR, 0);
        assert_eq!(LABEL_INDOOR, 1);
        assert_eq!(SceneClass::Outdoor.label(), 0);
        assert_eq!(SceneClass::Indoor.label(), 1);
    }

    #[test]
    fn test_from_label() {
        assert_eq!(SceneClass::from_label(0), Some(SceneClass::Outdoor));
        assert_eq!(SceneClass::from_label(1), Some(SceneClass::Indoor));
        assert_eq!(SceneClass::from_label(2), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(SceneClass::Outdoor.to_string(), "Outdoor");
        assert_eq!(SceneClass::Indoor.to_string(), "Indoor");
    }
}
