//! Training Loop
//!
//! Custom epoch loop over the preprocessing dataset adapter: seeded
//! per-epoch shuffling, lazy batching, cross-entropy loss, plain Adam,
//! per-epoch validation on the dev set and per-epoch checkpoint
//! snapshots with best-model tracking.

use std::path::{Path, PathBuf};

use anyhow::Result;
use burn::{
    data::dataloader::batcher::Batcher,
    module::AutodiffModule,
    nn::loss::CrossEntropyLossConfig,
    optim::{AdamConfig, GradientsParams, Optimizer},
    prelude::*,
    record::CompactRecorder,
    tensor::{backend::AutodiffBackend, ElementConversion},
};
use chrono::Local;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info};

use crate::dataset::manifest::LabeledImageSource;
use crate::dataset::preprocess::{PreprocessDataset, SceneBatcher, SceneItem};
use crate::model::{SceneModel, TrainingConfig};
use crate::training::evaluator::evaluate;

/// Outcome of a training run
#[derive(Debug, Clone)]
pub struct TrainReport {
    /// Epochs completed
    pub epochs_run: usize,
    /// Best validation accuracy observed
    pub best_val_accuracy: f64,
    /// Epoch index (1-based) of the best validation accuracy
    pub best_epoch: usize,
    /// Average training loss per epoch
    pub train_losses: Vec<f64>,
    /// Validation accuracy per epoch
    pub val_accuracies: Vec<f64>,
    /// Directory the snapshots were written to
    pub run_dir: PathBuf,
}

/// Train `model` on `train_dataset`, validating against `dev_dataset`
/// after every epoch
///
/// Snapshots are written to a timestamped directory under
/// `config.output_dir`, one per epoch, mirroring the historical
/// per-epoch model snapshots.
pub fn train<B, M, S>(
    mut model: M,
    train_dataset: &PreprocessDataset<S>,
    dev_dataset: &PreprocessDataset<S>,
    config: &TrainingConfig,
    device: &B::Device,
) -> Result<TrainReport>
where
    B: AutodiffBackend,
    M: SceneModel<B> + AutodiffModule<B>,
    M::InnerModule: SceneModel<B::InnerBackend>,
    S: LabeledImageSource + Send + Sync,
{
    config.validate()?;
    if train_dataset.is_empty() {
        anyhow::bail!("training dataset is empty");
    }

    let size = config.img_size as usize;
    let batcher = SceneBatcher::<B>::new(device.clone(), size);

    let inner_device = <B::InnerBackend as Backend>::Device::default();
    let inner_batcher = SceneBatcher::<B::InnerBackend>::new(inner_device, size);

    // The original setup trained with default Adam and no weight decay
    let mut optimizer = AdamConfig::new().init();
    let mut epoch_rng = ChaCha8Rng::seed_from_u64(config.seed);

    let run_dir = Path::new(&config.output_dir).join(format!(
        "{}_{}",
        config.model,
        Local::now().format("%Y%m%d_%H%M%S")
    ));
    std::fs::create_dir_all(&run_dir)?;
    config.save(run_dir.join("training_config.json"))?;

    info!(
        "Training {} for {} epochs ({} train / {} dev samples, batch size {})",
        config.model,
        config.max_epoch,
        train_dataset.len(),
        dev_dataset.len(),
        config.batch_size
    );

    let recorder = CompactRecorder::new();
    let mut report = TrainReport {
        epochs_run: 0,
        best_val_accuracy: 0.0,
        best_epoch: 0,
        train_losses: Vec::new(),
        val_accuracies: Vec::new(),
        run_dir: run_dir.clone(),
    };

    for epoch in 0..config.max_epoch {
        let mut epoch_loss = 0.0f64;
        let mut correct = 0usize;
        let mut seen = 0usize;

        let mut indices: Vec<usize> = (0..train_dataset.len()).collect();
        indices.shuffle(&mut epoch_rng);
        let num_batches = indices.len().div_ceil(config.batch_size);

        for (batch_idx, batch_indices) in indices.chunks(config.batch_size).enumerate() {
            let mut items = Vec::with_capacity(batch_indices.len());
            for &index in batch_indices {
                let (image, label) = train_dataset.get_example(index)?;
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
            let loss_value: f64 = loss.clone().into_scalar().elem();
            epoch_loss += loss_value;

            let predictions = output.argmax(1).squeeze::<1>(1);
            let batch_correct: i64 = predictions
                .equal(batch.targets.clone())
                .int()
                .sum()
                .into_scalar()
                .elem();
            correct += batch_correct as usize;
            seen += batch.targets.dims()[0];

            let grads = loss.backward();
            let grads = GradientsParams::from_grads(grads, &model);
            model = optimizer.step(config.learning_rate, model, grads);

            if (batch_idx + 1) % 10 == 0 || batch_idx + 1 == num_batches {
                debug!(
                    "  batch {}/{}: loss = {:.4}, acc = {:.2}%",
                    batch_idx + 1,
                    num_batches,
                    loss_value,
                    100.0 * correct as f64 / seen as f64
                );
            }
        }

        let avg_loss = epoch_loss / num_batches.max(1) as f64;
        report.train_losses.push(avg_loss);

        let eval_report = evaluate(
            &model.valid(),
            dev_dataset,
            &inner_batcher,
            config.batch_size,
        )?;
        let val_accuracy = eval_report.metrics.accuracy;
        report.val_accuracies.push(val_accuracy);

        if val_accuracy > report.best_val_accuracy {
            report.best_val_accuracy = val_accuracy;
            report.best_epoch = epoch + 1;
        }

        info!(
            "Epoch {}/{}: loss = {:.4}, train acc = {:.2}%, val acc = {:.2}%{}",
            epoch + 1,
            config.max_epoch,
            avg_loss,
            100.0 * correct as f64 / seen.max(1) as f64,
            100.0 * val_accuracy,
            if report.best_epoch == epoch + 1 {
                " (best)"
            } else {
                ""
            }
        );

        let snapshot = run_dir.join(format!("model_epoch-{}", epoch + 1));
        model
            .clone()
            .save_file(&snapshot, &recorder)
            .map_err(|e| anyhow::anyhow!("failed to save snapshot: {:?}", e))?;

        report.epochs_run = epoch + 1;
    }

    info!(
        "Training complete: best val acc {:.2}% at epoch {}",
        100.0 * report.best_val_accuracy,
        report.best_epoch
    );

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ModelVariant;

    #[test]
    fn test_train_report_defaults() {
        let report = TrainReport {
            epochs_run: 0,
            best_val_accuracy: 0.0,
            best_epoch: 0,
            train_losses: Vec::new(),
            val_accuracies: Vec::new(),
            run_dir: PathBuf::from("output"),
        };
        assert_eq!(report.epochs_run, 0);
        assert!(report.train_losses.is_empty());
    }

    #[test]
    fn test_run_dir_name_includes_variant() {
        let config = TrainingConfig {
            model: ModelVariant::Small2,
            ..Default::default()
        };
        assert!(config.output_dir.len() > 0);
        assert_eq!(config.model.to_string(), "small2");
    }
}
