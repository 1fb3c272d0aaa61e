//! # inoutdoor
//!
//! A Rust library for classifying video frames as indoor or outdoor
//! scenes using the Burn framework.
//!
//! The heart of the library is the on-the-fly preprocessing pipeline:
//! deterministic-but-randomized geometric transforms (aspect-preserving
//! scale, square crop with safe out-of-bounds padding, horizontal flip,
//! mean subtraction and normalization) applied identically at training,
//! validation and single-image inference time, with a different
//! randomization policy per phase.
//!
//! ## Modules
//!
//! - `dataset`: manifest handling, geometric transforms, mean image
//!   estimation, and the preprocessing dataset adapter
//! - `model`: three VGG-style CNN size variants
//! - `training`: epoch loop and dataset evaluation
//! - `inference`: crop-averaging single-image prediction
//! - `utils`: errors, logging and metrics
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use inoutdoor::backend::DefaultBackend;
//! use inoutdoor::dataset::{
//!     load_mean_or_neutral, LabeledImageList, PreprocessConfig, PreprocessDataset,
//! };
//!
//! let mean = load_mean_or_neutral(None, 224)?;
//! let source = LabeledImageList::open("train_list.txt")?;
//! let dataset = PreprocessDataset::new(source, mean, PreprocessConfig::train(224))?;
//! let (image, label) = dataset.get_example(0)?;
//! ```

pub mod backend;
pub mod dataset;
pub mod inference;
pub mod model;
pub mod training;
pub mod utils;

// Re-export commonly used items for convenience
pub use dataset::{
    CropMode, LabeledImageList, LabeledImageSource, ManifestEntry, PreprocessConfig,
    PreprocessDataset, SceneBatch, SceneBatcher, SceneClass, SceneItem, LABEL_INDOOR,
    LABEL_OUTDOOR, NUM_CLASSES,
};
pub use inference::{InferenceConfig, Prediction, Predictor};
pub use model::{ModelVariant, SceneModel, SceneNet, SceneNetSmall, SceneNetSmall2, TrainingConfig};
pub use training::{evaluate, train, EvalReport, TrainReport};
pub use utils::error::{Result, SceneError};
pub use utils::metrics::Metrics;

/// Default input image size for all model variants
pub const DEFAULT_IMG_SIZE: u32 = 224;

/// Version of the library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
