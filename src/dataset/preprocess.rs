//! Preprocessing Dataset Adapter
//!
//! Wraps a raw [`LabeledImageSource`] and applies the on-the-fly
//! preprocessing pipeline per item: scale to crop size, square crop
//! (random or center), horizontal flip, mean subtraction, and scaling to
//! a normalized range. The same adapter serves training, evaluation and
//! the legacy random-crop evaluation mode, differing only in its
//! configuration.
//!
//! Also provides the Burn `Dataset` and `Batcher` integration used by the
//! training and evaluation loops.

use std::sync::Mutex;

use burn::data::dataloader::batcher::Batcher;
use burn::data::dataset::Dataset;
use burn::prelude::*;
use ndarray::Array3;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::dataset::manifest::LabeledImageSource;
use crate::dataset::transform;
use crate::utils::error::{Result, SceneError};

/// Square-crop strategy applied by the adapter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CropMode {
    /// Uniformly random offset along the longer axis
    Random,
    /// Deterministic centered crop
    Center,
}

/// Immutable per-phase preprocessing policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreprocessConfig {
    /// Output square size, also the scale target for the shorter side
    pub crop_size: u32,
    /// Crop strategy
    pub crop_mode: CropMode,
    /// Apply a horizontal flip with probability 0.5
    pub random_flip: bool,
}

impl PreprocessConfig {
    /// Training policy: random crops, random flips
    pub fn train(crop_size: u32) -> Self {
        Self {
            crop_size,
            crop_mode: CropMode::Random,
            random_flip: true,
        }
    }

    /// Evaluation policy: centered crops, no flips
    pub fn eval(crop_size: u32) -> Self {
        Self {
            crop_size,
            crop_mode: CropMode::Center,
            random_flip: false,
        }
    }

    /// Historical evaluation policy: random crops, no flips
    ///
    /// Retained as an explicit option because earlier evaluation runs
    /// used random crops; never the silent default.
    pub fn legacy_eval(crop_size: u32) -> Self {
        Self {
            crop_size,
            crop_mode: CropMode::Random,
            random_flip: false,
        }
    }
}

/// Labeled-image dataset with on-the-fly preprocessing
///
/// Configuration is fixed at construction. The mean image is read-only
/// shared state; the crop/flip RNG is the only interior-mutable state
/// and sits behind a mutex so `get_example` stays shareable.
#[derive(Debug)]
pub struct PreprocessDataset<S> {
    source: S,
    mean: Array3<f32>,
    config: PreprocessConfig,
    rng: Mutex<ChaCha8Rng>,
}

impl<S: LabeledImageSource> PreprocessDataset<S> {
    /// Create an adapter with an entropy-seeded RNG
    ///
    /// # Errors
    /// Returns [`SceneError::Config`] when the mean image's shape does
    /// not match `(3, crop_size, crop_size)`.
    pub fn new(source: S, mean: Array3<f32>, config: PreprocessConfig) -> Result<Self> {
        Self::build(source, mean, config, ChaCha8Rng::from_entropy())
    }

    /// Create an adapter with a fixed RNG seed, for reproducible runs
    pub fn with_seed(
        source: S,
        mean: Array3<f32>,
        config: PreprocessConfig,
        seed: u64,
    ) -> Result<Self> {
        Self::build(source, mean, config, ChaCha8Rng::seed_from_u64(seed))
    }

    fn build(
        source: S,
        mean: Array3<f32>,
        config: PreprocessConfig,
        rng: ChaCha8Rng,
    ) -> Result<Self> {
        let size = config.crop_size as usize;
        let expected = (3, size, size);
        if mean.dim() != expected {
            return Err(SceneError::Config(format!(
                "mean image shape {:?} does not match crop size {} (expected {:?})",
                mean.dim(),
                config.crop_size,
                expected
            )));
        }

        Ok(Self {
            source,
            mean,
            config,
            rng: Mutex::new(rng),
        })
    }

    /// Number of items in the underlying source
    pub fn len(&self) -> usize {
        self.source.len()
    }

    /// Whether the underlying source is empty
    pub fn is_empty(&self) -> bool {
        self.source.is_empty()
    }

    /// The configured policy
    pub fn config(&self) -> &PreprocessConfig {
        &self.config
    }

    /// Fetch and preprocess the item at `index`
    ///
    /// Returns a channel-first `(3, crop, crop)` tensor with values in
    /// approximately `[-1, 1]` after mean subtraction and division by
    /// 255, paired with the item's label.
    pub fn get_example(&self, index: usize) -> Result<(Array3<f32>, usize)> {
        let size = self.config.crop_size;

        let (raw, label) = self.source.get(index)?;

        let image = transform::chw_to_hwc(&raw);
        let image = transform::scale(&image, Some(size))?;

        let image = match self.config.crop_mode {
            CropMode::Random => {
                let mut rng = self.rng.lock().expect("crop rng poisoned");
                transform::random_square_crop(&image, size, &mut *rng)
            }
            CropMode::Center => transform::center_square_crop(&image, size),
        };

        let mut image = transform::hwc_to_chw(&image);

        if self.config.random_flip {
            let flip = self.rng.lock().expect("crop rng poisoned").gen_bool(0.5);
            if flip {
                image = transform::horizontal_flip(&image);
            }
        }

        let image = (image - &self.mean) * (1.0 / 255.0);
        Ok((image, label))
    }

    /// Iterate all items in enumeration order
    pub fn iter_examples(&self) -> impl Iterator<Item = Result<(Array3<f32>, usize)>> + '_ {
        (0..self.len()).map(move |i| self.get_example(i))
    }
}

/// A preprocessed item ready for batching
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SceneItem {
    /// Flattened channel-first image data, `3 * crop * crop` floats
    pub image: Vec<f32>,
    /// Class label
    pub label: usize,
}

impl<S: LabeledImageSource + Send + Sync> Dataset<SceneItem> for PreprocessDataset<S> {
    fn get(&self, index: usize) -> Option<SceneItem> {
        match self.get_example(index) {
            Ok((image, label)) => Some(SceneItem {
                image: image.into_iter().collect(),
                label,
            }),
            Err(err) => {
                warn!("Failed to load sample {}: {}", index, err);
                None
            }
        }
    }

    fn len(&self) -> usize {
        PreprocessDataset::len(self)
    }
}

/// A batch of preprocessed scene images
#[derive(Clone, Debug)]
pub struct SceneBatch<B: Backend> {
    /// Images with shape `[batch_size, 3, crop, crop]`
    pub images: Tensor<B, 4>,
    /// Labels with shape `[batch_size]`
    pub targets: Tensor<B, 1, Int>,
}

/// Batcher stacking [`SceneItem`]s into tensors
///
/// The adapter already normalized every item, so the batcher only stacks.
#[derive(Clone, Debug)]
pub struct SceneBatcher<B: Backend> {
    device: B::Device,
    crop_size: usize,
}

impl<B: Backend> SceneBatcher<B> {
    /// Create a batcher for the given device and crop size
    pub fn new(device: B::Device, crop_size: usize) -> Self {
        Self { device, crop_size }
    }
}

impl<B: Backend> Batcher<SceneItem, SceneBatch<B>> for SceneBatcher<B> {
    fn batch(&self, items: Vec<SceneItem>) -> SceneBatch<B> {
        let batch_size = items.len();
        let (channels, height, width) = (3, self.crop_size, self.crop_size);

        let images_data: Vec<f32> = items.iter().flat_map(|item| item.image.clone()).collect();
        let images = Tensor::<B, 4>::from_floats(
            TensorData::new(images_data, [batch_size, channels, height, width]),
            &self.device,
        );

        let targets_data: Vec<i64> = items.iter().map(|item| item.label as i64).collect();
        let targets = Tensor::<B, 1, Int>::from_data(
            TensorData::new(targets_data, [batch_size]),
            &self.device,
        );

        SceneBatch { images, targets }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type TestBackend = burn::backend::NdArray;

    /// In-memory source for tests: stores raw channel-first images
    #[derive(Debug)]
    struct InMemorySource {
        items: Vec<(Array3<f32>, usize)>,
    }

    impl LabeledImageSource for InMemorySource {
        fn len(&self) -> usize {
            self.items.len()
        }

        fn get(&self, index: usize) -> Result<(Array3<f32>, usize)> {
            self.items
                .get(index)
                .cloned()
                .ok_or(SceneError::IndexOutOfRange {
                    index,
                    len: self.items.len(),
                })
        }
    }

    fn constant_source(value: f32, h: usize, w: usize, label: usize) -> InMemorySource {
        InMemorySource {
            items: vec![(Array3::from_elem((3, h, w), value), label)],
        }
    }

    #[test]
    fn test_policy_constructors() {
        let train = PreprocessConfig::train(224);
        assert_eq!(train.crop_mode, CropMode::Random);
        assert!(train.random_flip);

        let eval = PreprocessConfig::eval(224);
        assert_eq!(eval.crop_mode, CropMode::Center);
        assert!(!eval.random_flip);

        let legacy = PreprocessConfig::legacy_eval(224);
        assert_eq!(legacy.crop_mode, CropMode::Random);
        assert!(!legacy.random_flip);
    }

    #[test]
    fn test_mean_shape_mismatch_rejected_at_construction() {
        let source = constant_source(255.0, 4, 4, 0);
        let mean = Array3::<f32>::zeros((3, 8, 8));

        let err = PreprocessDataset::new(source, mean, PreprocessConfig::eval(4)).unwrap_err();
        assert!(matches!(err, SceneError::Config(_)));
    }

    #[test]
    fn test_center_pipeline_end_to_end() {
        // All-255 4x4 input, zero mean, center crop 4, no flip:
        // (255 - 0) / 255 = 1.0 everywhere
        let source = constant_source(255.0, 4, 4, 0);
        let mean = Array3::<f32>::zeros((3, 4, 4));
        let dataset =
            PreprocessDataset::new(source, mean, PreprocessConfig::eval(4)).unwrap();

        let (image, label) = dataset.get_example(0).unwrap();
        assert_eq!(label, 0);
        assert_eq!(image.dim(), (3, 4, 4));
        assert!(image.iter().all(|&v| (v - 1.0).abs() < 1e-6));
    }

    #[test]
    fn test_mean_subtraction_range() {
        // All-255 input with a mean of 255 maps to 0.0
        let source = constant_source(255.0, 4, 4, 1);
        let mean = Array3::from_elem((3, 4, 4), 255.0);
        let dataset =
            PreprocessDataset::new(source, mean, PreprocessConfig::eval(4)).unwrap();

        let (image, _) = dataset.get_example(0).unwrap();
        assert!(image.iter().all(|&v| v.abs() < 1e-6));
    }

    #[test]
    fn test_output_is_square_for_non_square_input() {
        let source = constant_source(100.0, 12, 6, 1);
        let mean = Array3::<f32>::zeros((3, 4, 4));
        let dataset =
            PreprocessDataset::with_seed(source, mean, PreprocessConfig::train(4), 3).unwrap();

        let (image, _) = dataset.get_example(0).unwrap();
        assert_eq!(image.dim(), (3, 4, 4));
    }

    #[test]
    fn test_seeded_pipeline_is_reproducible() {
        let make = || {
            PreprocessDataset::with_seed(
                constant_source(200.0, 16, 8, 0),
                Array3::<f32>::zeros((3, 4, 4)),
                PreprocessConfig::train(4),
                42,
            )
            .unwrap()
        };

        let a = make().get_example(0).unwrap().0;
        let b = make().get_example(0).unwrap().0;
        assert_eq!(a, b);
    }

    #[test]
    fn test_index_out_of_range_propagates() {
        let source = constant_source(0.0, 4, 4, 0);
        let mean = Array3::<f32>::zeros((3, 4, 4));
        let dataset =
            PreprocessDataset::new(source, mean, PreprocessConfig::eval(4)).unwrap();

        assert!(matches!(
            dataset.get_example(3),
            Err(SceneError::IndexOutOfRange { index: 3, len: 1 })
        ));
    }

    #[test]
    fn test_burn_dataset_integration() {
        let source = constant_source(255.0, 4, 4, 1);
        let mean = Array3::<f32>::zeros((3, 4, 4));
        let dataset =
            PreprocessDataset::new(source, mean, PreprocessConfig::eval(4)).unwrap();

        assert_eq!(Dataset::len(&dataset), 1);
        let item = Dataset::get(&dataset, 0).unwrap();
        assert_eq!(item.label, 1);
        assert_eq!(item.image.len(), 3 * 4 * 4);
        assert!(Dataset::get(&dataset, 1).is_none());
    }

    #[test]
    fn test_batcher_shapes_and_values() {
        let device = Default::default();
        let batcher = SceneBatcher::<TestBackend>::new(device, 4);

        let items = vec![
            SceneItem {
                image: vec![1.0; 3 * 4 * 4],
                label: 0,
            },
            SceneItem {
                image: vec![0.5; 3 * 4 * 4],
                label: 1,
            },
        ];

        let batch = batcher.batch(items);
        assert_eq!(batch.images.dims(), [2, 3, 4, 4]);
        assert_eq!(batch.targets.dims(), [2]);

        let targets: Vec<i64> = batch.targets.into_data().to_vec().unwrap();
        assert_eq!(targets, vec![0, 1]);
    }
}
