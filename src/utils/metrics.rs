//! Metrics Module for Model Evaluation
//!
//! Accuracy, per-class precision/recall/F1 and a confusion matrix for
//! the two-class indoor/outdoor problem.

use serde::{Deserialize, Serialize};

/// Evaluation metrics over a set of predictions
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Metrics {
    /// Total number of samples evaluated
    pub total_samples: usize,

    /// Number of correct predictions
    pub correct_predictions: usize,

    /// Overall accuracy (correct / total)
    pub accuracy: f64,

    /// Average loss, if the evaluator computed one
    pub loss: Option<f64>,

    /// Per-class metrics, indexed by class label
    pub per_class: Vec<ClassMetrics>,

    /// Confusion matrix
    pub confusion_matrix: ConfusionMatrix,
}

impl Metrics {
    /// Create metrics from predictions and ground-truth labels
    pub fn from_predictions(
        predictions: &[usize],
        ground_truth: &[usize],
        num_classes: usize,
    ) -> Self {
        assert_eq!(
            predictions.len(),
            ground_truth.len(),
            "Predictions and ground truth must have same length"
        );

        let total_samples = predictions.len();
        if total_samples == 0 {
            return Self::default();
        }

        let confusion_matrix =
            ConfusionMatrix::from_predictions(predictions, ground_truth, num_classes);

        let correct_predictions = predictions
            .iter()
            .zip(ground_truth.iter())
            .filter(|(p, g)| p == g)
            .count();

        let accuracy = correct_predictions as f64 / total_samples as f64;

        let per_class = (0..num_classes)
            .map(|class_idx| ClassMetrics::from_confusion_matrix(&confusion_matrix, class_idx))
            .collect();

        Self {
            total_samples,
            correct_predictions,
            accuracy,
            loss: None,
            per_class,
            confusion_matrix,
        }
    }
}

/// Per-class precision, recall and F1
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClassMetrics {
    pub class_index: usize,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    /// Number of ground-truth samples of this class
    pub support: usize,
}

impl ClassMetrics {
    /// Derive class metrics from a confusion matrix
    pub fn from_confusion_matrix(cm: &ConfusionMatrix, class_idx: usize) -> Self {
        let tp = cm.count(class_idx, class_idx);
        let predicted: usize = (0..cm.num_classes).map(|a| cm.count(a, class_idx)).sum();
        let support: usize = (0..cm.num_classes).map(|p| cm.count(class_idx, p)).sum();

        let precision = if predicted > 0 {
            tp as f64 / predicted as f64
        } else {
            0.0
        };
        let recall = if support > 0 {
            tp as f64 / support as f64
        } else {
            0.0
        };
        let f1 = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };

        Self {
            class_index: class_idx,
            precision,
            recall,
            f1,
            support,
        }
    }
}

/// Confusion matrix with rows = actual class, columns = predicted class
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    pub num_classes: usize,
    /// Flattened row-major counts, length `num_classes * num_classes`
    pub counts: Vec<usize>,
}

impl ConfusionMatrix {
    /// Build a confusion matrix from prediction/label pairs
    ///
    /// Pairs with out-of-range labels are ignored.
    pub fn from_predictions(
        predictions: &[usize],
        ground_truth: &[usize],
        num_classes: usize,
    ) -> Self {
        let mut counts = vec![0usize; num_classes * num_classes];
        for (&pred, &actual) in predictions.iter().zip(ground_truth.iter()) {
            if pred < num_classes && actual < num_classes {
                counts[actual * num_classes + pred] += 1;
            }
        }
        Self {
            num_classes,
            counts,
        }
    }

    /// Count of samples with the given actual and predicted class
    pub fn count(&self, actual: usize, predicted: usize) -> usize {
        self.counts[actual * self.num_classes + predicted]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_perfect_predictions() {
        let preds = vec![0, 1, 0, 1];
        let truth = vec![0, 1, 0, 1];
        let metrics = Metrics::from_predictions(&preds, &truth, 2);

        assert_eq!(metrics.total_samples, 4);
        assert_eq!(metrics.correct_predictions, 4);
        assert!((metrics.accuracy - 1.0).abs() < 1e-9);
        assert!((metrics.per_class[0].f1 - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_confusion_matrix_counts() {
        // actual 0 predicted 1 twice, actual 1 predicted 1 once
        let preds = vec![1, 1, 1];
        let truth = vec![0, 0, 1];
        let cm = ConfusionMatrix::from_predictions(&preds, &truth, 2);

        assert_eq!(cm.count(0, 1), 2);
        assert_eq!(cm.count(1, 1), 1);
        assert_eq!(cm.count(0, 0), 0);
    }

    #[test]
    fn test_precision_recall() {
        // class 1: tp=1, fp=2 -> precision 1/3; support 1 -> recall 1
        let preds = vec![1, 1, 1];
        let truth = vec![0, 0, 1];
        let metrics = Metrics::from_predictions(&preds, &truth, 2);

        let c1 = &metrics.per_class[1];
        assert!((c1.precision - 1.0 / 3.0).abs() < 1e-9);
        assert!((c1.recall - 1.0).abs() < 1e-9);

        // class 0: nothing predicted as 0
        let c0 = &metrics.per_class[0];
        assert_eq!(c0.support, 2);
        assert!((c0.precision - 0.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_input() {
        let metrics = Metrics::from_predictions(&[], &[], 2);
        assert_eq!(metrics.total_samples, 0);
        assert_eq!(metrics.accuracy, 0.0);
    }
}
