//! Dataset Evaluation
//!
//! Runs a model over a preprocessed dataset in batches and collects
//! average loss, accuracy and per-class metrics. Used standalone by the
//! `eval` command and per-epoch by the trainer.

use burn::{
    data::dataloader::batcher::Batcher,
    nn::loss::CrossEntropyLossConfig,
    prelude::*,
    tensor::ElementConversion,
};
use tracing::info;

use crate::dataset::manifest::LabeledImageSource;
use crate::dataset::preprocess::{PreprocessDataset, SceneBatcher, SceneItem};
use crate::dataset::NUM_CLASSES;
use crate::model::SceneModel;
use crate::utils::error::Result;
use crate::utils::metrics::Metrics;

/// Result of evaluating a model over a dataset
#[derive(Debug, Clone)]
pub struct EvalReport {
    /// Average cross-entropy loss over batches
    pub loss: f64,
    /// Accuracy and per-class metrics
    pub metrics: Metrics,
}

/// Evaluate `model` over every item of `dataset`
///
/// Items are read in enumeration order; a source read failure aborts the
/// evaluation, since a missing file at this stage indicates a corrupt
/// manifest.
pub fn evaluate<B, M, S>(
    model: &M,
    dataset: &PreprocessDataset<S>,
    batcher: &SceneBatcher<B>,
    batch_size: usize,
) -> Result<EvalReport>
where
    B: Backend,
    M: SceneModel<B>,
    S: LabeledImageSource + Send + Sync,
{
    let len = dataset.len();
    let mut total_loss = 0.0f64;
    let mut num_batches = 0usize;
    let mut all_predictions: Vec<usize> = Vec::with_capacity(len);
    let mut all_targets: Vec<usize> = Vec::with_capacity(len);

    for start in (0..len).step_by(batch_size.max(1)) {
        let end = (start + batch_size).min(len);

        let mut items = Vec::with_capacity(end - start);
        for index in start..end {
            let (image, label) = dataset.get_example(index)?;
            items.push(SceneItem {
                image: image.into_iter().collect(),
                label,
            });
        }

        let batch = batcher.batch(items);
        let output = model.forward(batch.images);

        let loss = CrossEntropyLossConfig::new()
            .init(&output.device())
            .forward(output.clone(), batch.targets.clone());
        let loss_value: f64 = loss.into_scalar().elem();
        total_loss += loss_value;
        num_batches += 1;

        let predictions = output.argmax(1).squeeze::<1>(1);
        let pred_vec: Vec<i64> = predictions.into_data().to_vec().unwrap();
        let target_vec: Vec<i64> = batch.targets.into_data().to_vec().unwrap();

        all_predictions.extend(pred_vec.iter().map(|&p| p as usize));
        all_targets.extend(target_vec.iter().map(|&t| t as usize));
    }

    let avg_loss = total_loss / num_batches.max(1) as f64;
    let mut metrics = Metrics::from_predictions(&all_predictions, &all_targets, NUM_CLASSES);
    metrics.loss = Some(avg_loss);

    info!(
        "Evaluation: loss = {:.4}, accuracy = {:.2}%, samples = {}",
        avg_loss,
        metrics.accuracy * 100.0,
        metrics.total_samples
    );

    Ok(EvalReport {
        loss: avg_loss,
        metrics,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::preprocess::PreprocessConfig;
    use crate::utils::error::SceneError;
    use ndarray::Array3;

    type TestBackend = burn::backend::NdArray;

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

    /// Stub model that always scores class 1 higher, whatever the input
    struct IndoorBiasedModel;

    impl SceneModel<TestBackend> for IndoorBiasedModel {
        fn forward(
            &self,
            images: Tensor<TestBackend, 4>,
        ) -> Tensor<TestBackend, 2> {
            let [batch, _, _, _] = images.dims();
            let device = images.device();
            let data: Vec<f32> = (0..batch).flat_map(|_| [0.0f32, 2.0]).collect();
            Tensor::from_floats(TensorData::new(data, [batch, 2]), &device)
        }
    }

    #[test]
    fn test_evaluate_with_stub_model() {
        let source = InMemorySource {
            items: vec![
                (Array3::from_elem((3, 4, 4), 10.0), 1),
                (Array3::from_elem((3, 4, 4), 20.0), 0),
                (Array3::from_elem((3, 4, 4), 30.0), 1),
            ],
        };
        let dataset = PreprocessDataset::new(
            source,
            Array3::<f32>::zeros((3, 4, 4)),
            PreprocessConfig::eval(4),
        )
        .unwrap();

        let device = Default::default();
        let batcher = SceneBatcher::<TestBackend>::new(device, 4);
        let report = evaluate(&IndoorBiasedModel, &dataset, &batcher, 2).unwrap();

        // The stub always predicts indoor (1); two of three labels are 1
        assert_eq!(report.metrics.total_samples, 3);
        assert!((report.metrics.accuracy - 2.0 / 3.0).abs() < 1e-9);
        assert_eq!(report.metrics.confusion_matrix.count(1, 1), 2);
        assert_eq!(report.metrics.confusion_matrix.count(0, 1), 1);
        assert!(report.loss > 0.0);
        assert_eq!(report.metrics.loss, Some(report.loss));
    }
}
