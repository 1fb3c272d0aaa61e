//! Model module: CNN architectures and their configuration

pub mod cnn;
pub mod config;

use std::path::Path;

use burn::module::Module;
use burn::record::CompactRecorder;
use burn::tensor::backend::Backend;

use crate::utils::error::{Result, SceneError};

pub use cnn::{SceneModel, SceneNet, SceneNetSmall, SceneNetSmall2, MODEL_INPUT_SIZE};
pub use config::{ModelVariant, TrainingConfig};

/// Load a model's weights from a checkpoint file
///
/// The checkpoint must have been written with the same model variant and
/// recorder (`CompactRecorder`) the trainer uses.
pub fn load_model_file<B: Backend, M: Module<B>>(
    model: M,
    path: &Path,
    device: &B::Device,
) -> Result<M> {
    model
        .load_file(path, &CompactRecorder::new(), device)
        .map_err(|e| {
            SceneError::Model(format!(
                "failed to load checkpoint {}: {:?}",
                path.display(),
                e
            ))
        })
}
