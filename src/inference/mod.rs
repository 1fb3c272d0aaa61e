//! Inference module: single-image prediction with crop averaging

pub mod predictor;

pub use predictor::{InferenceConfig, Prediction, Predictor};
