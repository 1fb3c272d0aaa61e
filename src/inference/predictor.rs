//! Inference Aggregator
//!
//! Classifies a single image by preprocessing it several times with
//! independently drawn crops, running the model on each crop, and
//! averaging the resulting class probabilities. With a centered crop and
//! one sample the prediction is fully deterministic; with random crops
//! it is a Monte-Carlo estimate whose variance shrinks with more
//! samples.

use std::path::Path;
use std::sync::Mutex;

use burn::prelude::*;
use burn::tensor::activation::softmax;
use ndarray::Array3;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::dataset::manifest::load_image_chw;
use crate::dataset::preprocess::CropMode;
use crate::dataset::transform;
use crate::dataset::{SceneClass, NUM_CLASSES};
use crate::model::SceneModel;
use crate::utils::error::{Result, SceneError};

/// Configuration for the inference aggregator
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InferenceConfig {
    /// Model input size, also the scale target for the shorter side
    pub img_size: u32,
    /// Number of independently cropped samples to average
    pub num_samples: usize,
    /// Crop strategy per sample
    pub crop_mode: CropMode,
    /// Apply a horizontal flip with probability 0.5 per sample
    pub random_flip: bool,
}

impl Default for InferenceConfig {
    /// The robustness-averaging mode: ten random crops, no flips
    fn default() -> Self {
        Self {
            img_size: 224,
            num_samples: 10,
            crop_mode: CropMode::Random,
            random_flip: false,
        }
    }
}

impl InferenceConfig {
    /// Deterministic mode: a single centered crop
    pub fn deterministic(img_size: u32) -> Self {
        Self {
            img_size,
            num_samples: 1,
            crop_mode: CropMode::Center,
            random_flip: false,
        }
    }
}

/// A single-image prediction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prediction {
    /// Averaged probability per class, indexed by label
    pub probabilities: Vec<f32>,
    /// Most probable class
    pub class: SceneClass,
    /// Probability of the predicted class
    pub confidence: f32,
}

impl Prediction {
    /// Build a prediction from an averaged probability vector
    pub fn from_probabilities(probabilities: Vec<f32>) -> Result<Self> {
        let (label, &confidence) = probabilities
            .iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| a.total_cmp(b))
            .ok_or_else(|| SceneError::Model("empty probability vector".to_string()))?;

        let class = SceneClass::from_label(label).ok_or_else(|| {
            SceneError::Model(format!("probability vector has unexpected class {}", label))
        })?;

        Ok(Self {
            probabilities,
            class,
            confidence,
        })
    }
}

impl std::fmt::Display for Prediction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({:.2})", self.class, self.confidence)
    }
}

/// Crop-averaging predictor around a trained model
#[derive(Debug)]
pub struct Predictor<B: Backend, M: SceneModel<B>> {
    model: M,
    mean: Array3<f32>,
    config: InferenceConfig,
    device: B::Device,
    rng: Mutex<ChaCha8Rng>,
}

impl<B: Backend, M: SceneModel<B>> Predictor<B, M> {
    /// Create a predictor with an entropy-seeded RNG
    ///
    /// # Errors
    /// Returns [`SceneError::Config`] when the mean image's shape does
    /// not match `(3, img_size, img_size)` or `num_samples` is zero.
    pub fn new(
        model: M,
        mean: Array3<f32>,
        config: InferenceConfig,
        device: B::Device,
    ) -> Result<Self> {
        Self::build(model, mean, config, device, ChaCha8Rng::from_entropy())
    }

    /// Create a predictor with a fixed RNG seed
    pub fn with_seed(
        model: M,
        mean: Array3<f32>,
        config: InferenceConfig,
        device: B::Device,
        seed: u64,
    ) -> Result<Self> {
        Self::build(model, mean, config, device, ChaCha8Rng::seed_from_u64(seed))
    }

    fn build(
        model: M,
        mean: Array3<f32>,
        config: InferenceConfig,
        device: B::Device,
        rng: ChaCha8Rng,
    ) -> Result<Self> {
        if config.num_samples == 0 {
            return Err(SceneError::Config(
                "num_samples must be positive".to_string(),
            ));
        }

        let size = config.img_size as usize;
        let expected = (3, size, size);
        if mean.dim() != expected {
            return Err(SceneError::Config(format!(
                "mean image shape {:?} does not match inference size {} (expected {:?})",
                mean.dim(),
                config.img_size,
                expected
            )));
        }

        Ok(Self {
            model,
            mean,
            config,
            device,
            rng: Mutex::new(rng),
        })
    }

    /// The configured aggregation policy
    pub fn config(&self) -> &InferenceConfig {
        &self.config
    }

    /// Classify a raw channel-first `(3, H, W)` image with pixel values
    /// in `0.0..=255.0`
    ///
    /// Scales once, then draws `num_samples` crops, normalizes each the
    /// same way the dataset adapter does, runs the model and averages
    /// the softmax probabilities.
    pub fn predict(&self, raw: &Array3<f32>) -> Result<Prediction> {
        let size = self.config.img_size;

        if raw.dim().0 != 3 {
            return Err(SceneError::InvalidImage(format!(
                "expected a channel-first 3-channel image, got shape {:?}",
                raw.dim()
            )));
        }

        let hwc = transform::chw_to_hwc(raw);
        let scaled = transform::scale(&hwc, Some(size))?;

        let mut summed = vec![0.0f64; NUM_CLASSES];
        for _ in 0..self.config.num_samples {
            let crop = match self.config.crop_mode {
                CropMode::Random => {
                    let mut rng = self.rng.lock().expect("crop rng poisoned");
                    transform::random_square_crop(&scaled, size, &mut *rng)
                }
                CropMode::Center => transform::center_square_crop(&scaled, size),
            };

            let mut chw = transform::hwc_to_chw(&crop);
            if self.config.random_flip {
                let flip = self.rng.lock().expect("crop rng poisoned").gen_bool(0.5);
                if flip {
                    chw = transform::horizontal_flip(&chw);
                }
            }

            let normalized = (chw - &self.mean) * (1.0 / 255.0);
            let data: Vec<f32> = normalized.into_iter().collect();
            let input = Tensor::<B, 4>::from_floats(
                TensorData::new(data, [1, 3, size as usize, size as usize]),
                &self.device,
            );

            let probs = softmax(self.model.forward(input), 1);
            let probs: Vec<f32> = probs.into_data().to_vec().unwrap();
            for (sum, p) in summed.iter_mut().zip(probs) {
                *sum += p as f64;
            }
        }

        let probabilities: Vec<f32> = summed
            .iter()
            .map(|&sum| (sum / self.config.num_samples as f64) as f32)
            .collect();

        Prediction::from_probabilities(probabilities)
    }

    /// Load an image file and classify it
    pub fn predict_file(&self, path: &Path) -> Result<Prediction> {
        let raw = load_image_chw(path)?;
        self.predict(&raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::neutral_mean;
    use crate::model::SceneNetSmall2;

    type TestBackend = burn::backend::NdArray;

    /// Stub model with fixed logits, independent of the input
    #[derive(Debug)]
    struct FixedLogits;

    impl SceneModel<TestBackend> for FixedLogits {
        fn forward(
            &self,
            images: Tensor<TestBackend, 4>,
        ) -> Tensor<TestBackend, 2> {
            let [batch, _, _, _] = images.dims();
            let device = images.device();
            let data: Vec<f32> = (0..batch).flat_map(|_| [0.0f32, 1.0]).collect();
            Tensor::from_floats(TensorData::new(data, [batch, 2]), &device)
        }
    }

    fn gray_image(h: usize, w: usize) -> Array3<f32> {
        Array3::from_elem((3, h, w), 128.0)
    }

    #[test]
    fn test_prediction_from_probabilities() {
        let pred = Prediction::from_probabilities(vec![0.7, 0.3]).unwrap();
        assert_eq!(pred.class, SceneClass::Outdoor);
        assert!((pred.confidence - 0.7).abs() < 1e-6);

        let pred = Prediction::from_probabilities(vec![0.2, 0.8]).unwrap();
        assert_eq!(pred.class, SceneClass::Indoor);
        assert_eq!(pred.to_string(), "Indoor (0.80)");
    }

    #[test]
    fn test_mean_shape_mismatch_rejected() {
        let config = InferenceConfig::deterministic(8);
        let err = Predictor::<TestBackend, _>::new(
            FixedLogits,
            neutral_mean(4),
            config,
            Default::default(),
        )
        .unwrap_err();
        assert!(matches!(err, SceneError::Config(_)));
    }

    #[test]
    fn test_zero_samples_rejected() {
        let config = InferenceConfig {
            num_samples: 0,
            img_size: 8,
            ..Default::default()
        };
        let err = Predictor::<TestBackend, _>::new(
            FixedLogits,
            neutral_mean(8),
            config,
            Default::default(),
        )
        .unwrap_err();
        assert!(matches!(err, SceneError::Config(_)));
    }

    #[test]
    fn test_averaging_with_fixed_logits() {
        // Averaging identical softmax outputs must reproduce them exactly
        let config = InferenceConfig {
            img_size: 8,
            num_samples: 5,
            crop_mode: CropMode::Random,
            random_flip: false,
        };
        let predictor = Predictor::<TestBackend, _>::with_seed(
            FixedLogits,
            neutral_mean(8),
            config,
            Default::default(),
            7,
        )
        .unwrap();

        let prediction = predictor.predict(&gray_image(16, 12)).unwrap();

        // softmax([0, 1]) = [1/(1+e), e/(1+e)]
        let expected_indoor = std::f32::consts::E / (1.0 + std::f32::consts::E);
        assert_eq!(prediction.class, SceneClass::Indoor);
        assert!((prediction.confidence - expected_indoor).abs() < 1e-5);
        let sum: f32 = prediction.probabilities.iter().sum();
        assert!((sum - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_center_single_sample_is_deterministic() {
        let device = Default::default();
        let model = SceneNetSmall2::<TestBackend>::new(NUM_CLASSES, &device);
        let predictor = Predictor::<TestBackend, _>::new(
            model,
            neutral_mean(224),
            InferenceConfig::deterministic(224),
            device,
        )
        .unwrap();

        let image = gray_image(240, 320);
        let a = predictor.predict(&image).unwrap();
        let b = predictor.predict(&image).unwrap();

        assert_eq!(a.probabilities, b.probabilities);
        assert_eq!(a.class, b.class);
    }
}
