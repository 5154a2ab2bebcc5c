//! Metrics Module for Model Evaluation
//!
//! Accuracy, micro and macro F1, per-class precision/recall and the
//! confusion matrix for the Heat classifier.

use serde::{Deserialize, Serialize};

/// Evaluation metrics over one partition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Metrics {
    /// Total number of samples evaluated
    pub total_samples: usize,

    /// Number of correct predictions
    pub correct_predictions: usize,

    /// Overall accuracy (correct / total)
    pub accuracy: f64,

    /// Sample-weighted mean loss, set by the evaluator
    pub loss: Option<f64>,

    /// Micro-averaged F1 (pooled TP/FP/FN over classes)
    pub micro_f1: f64,

    /// Macro-averaged precision over classes with support
    pub macro_precision: f64,

    /// Macro-averaged recall
    pub macro_recall: f64,

    /// Macro-averaged F1-score
    pub macro_f1: f64,

    /// Per-class metrics
    pub per_class: Vec<ClassMetrics>,

    /// Confusion matrix
    pub confusion_matrix: ConfusionMatrix,
}

impl Metrics {
    /// Build metrics from predicted and true class indices
    pub fn from_predictions(
        predictions: &[usize],
        ground_truth: &[usize],
        num_classes: usize,
    ) -> Self {
        let total_samples = predictions.len().min(ground_truth.len());
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

        let per_class: Vec<ClassMetrics> = (0..num_classes)
            .map(|class_idx| ClassMetrics::from_confusion_matrix(&confusion_matrix, class_idx))
            .collect();

        let valid_classes: Vec<&ClassMetrics> =
            per_class.iter().filter(|m| m.support > 0).collect();
        let num_valid = valid_classes.len() as f64;

        let macro_avg = |f: fn(&ClassMetrics) -> f64| {
            if num_valid > 0.0 {
                valid_classes.iter().map(|m| f(m)).sum::<f64>() / num_valid
            } else {
                0.0
            }
        };
        let macro_precision = macro_avg(|m| m.precision);
        let macro_recall = macro_avg(|m| m.recall);
        let macro_f1 = macro_avg(|m| m.f1);

        let tp: usize = per_class.iter().map(|m| m.true_positives).sum();
        let fp: usize = per_class.iter().map(|m| m.false_positives).sum();
        let fn_: usize = per_class.iter().map(|m| m.false_negatives).sum();
        let micro_f1 = if 2 * tp + fp + fn_ > 0 {
            2.0 * tp as f64 / (2 * tp + fp + fn_) as f64
        } else {
            0.0
        };

        Self {
            total_samples,
            correct_predictions,
            accuracy,
            loss: None,
            micro_f1,
            macro_precision,
            macro_recall,
            macro_f1,
            per_class,
            confusion_matrix,
        }
    }

    /// Attach a mean loss
    pub fn with_loss(mut self, loss: f64) -> Self {
        self.loss = Some(loss);
        self
    }

    /// Pretty print metrics
    pub fn display(&self) -> String {
        let mut output = String::new();

        output.push_str("╔══════════════════════════════════════════════════════════════╗\n");
        output.push_str("║                    Evaluation Metrics                        ║\n");
        output.push_str("╠══════════════════════════════════════════════════════════════╣\n");
        if let Some(loss) = self.loss {
            output.push_str(&format!("║ Loss:              {:8.4}                                  ║\n", loss));
        }
        output.push_str(&format!("║ Accuracy:          {:6.2}%                                   ║\n", self.accuracy * 100.0));
        output.push_str(&format!("║ F1 (micro):        {:6.2}%                                   ║\n", self.micro_f1 * 100.0));
        output.push_str(&format!("║ F1 (macro):        {:6.2}%                                   ║\n", self.macro_f1 * 100.0));
        output.push_str(&format!("║ Macro Precision:   {:6.2}%                                   ║\n", self.macro_precision * 100.0));
        output.push_str(&format!("║ Macro Recall:      {:6.2}%                                   ║\n", self.macro_recall * 100.0));
        output.push_str(&format!("║ Total Samples:     {:6}                                    ║\n", self.total_samples));
        output.push_str("╚══════════════════════════════════════════════════════════════╝\n");

        output
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self {
            total_samples: 0,
            correct_predictions: 0,
            accuracy: 0.0,
            loss: None,
            micro_f1: 0.0,
            macro_precision: 0.0,
            macro_recall: 0.0,
            macro_f1: 0.0,
            per_class: Vec::new(),
            confusion_matrix: ConfusionMatrix::default(),
        }
    }
}

impl std::fmt::Display for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display())
    }
}

/// Per-class metrics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClassMetrics {
    pub class_idx: usize,
    pub true_positives: usize,
    pub false_positives: usize,
    pub false_negatives: usize,
    /// TP / (TP + FP)
    pub precision: f64,
    /// TP / (TP + FN)
    pub recall: f64,
    pub f1: f64,
    /// Number of actual samples of this class
    pub support: usize,
}

impl ClassMetrics {
    /// Calculate metrics for a class from confusion matrix
    pub fn from_confusion_matrix(cm: &ConfusionMatrix, class_idx: usize) -> Self {
        let true_positives = cm.get(class_idx, class_idx);

        let false_positives: usize = (0..cm.num_classes)
            .filter(|&i| i != class_idx)
            .map(|i| cm.get(i, class_idx))
            .sum();

        let false_negatives: usize = (0..cm.num_classes)
            .filter(|&i| i != class_idx)
            .map(|i| cm.get(class_idx, i))
            .sum();

        let support = true_positives + false_negatives;

        let precision = if true_positives + false_positives > 0 {
            true_positives as f64 / (true_positives + false_positives) as f64
        } else {
            0.0
        };

        let recall = if support > 0 {
            true_positives as f64 / support as f64
        } else {
            0.0
        };

        let f1 = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };

        Self {
            class_idx,
            true_positives,
            false_positives,
            false_negatives,
            precision,
            recall,
            f1,
            support,
        }
    }
}

/// Confusion matrix, row = actual, column = predicted
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    pub num_classes: usize,
    /// Flat row-major storage
    pub matrix: Vec<usize>,
}

impl Default for ConfusionMatrix {
    fn default() -> Self {
        Self::new(0)
    }
}

impl ConfusionMatrix {
    pub fn new(num_classes: usize) -> Self {
        Self {
            num_classes,
            matrix: vec![0; num_classes * num_classes],
        }
    }

    pub fn from_predictions(
        predictions: &[usize],
        ground_truth: &[usize],
        num_classes: usize,
    ) -> Self {
        let mut cm = Self::new(num_classes);
        for (&pred, &actual) in predictions.iter().zip(ground_truth.iter()) {
            cm.add(actual, pred);
        }
        cm
    }

    /// Add a single prediction; out-of-range indices are ignored
    pub fn add(&mut self, actual: usize, predicted: usize) {
        if actual < self.num_classes && predicted < self.num_classes {
            self.matrix[actual * self.num_classes + predicted] += 1;
        }
    }

    pub fn get(&self, actual: usize, predicted: usize) -> usize {
        if actual < self.num_classes && predicted < self.num_classes {
            self.matrix[actual * self.num_classes + predicted]
        } else {
            0
        }
    }

    pub fn total(&self) -> usize {
        self.matrix.iter().sum()
    }

    /// Diagonal sum
    pub fn correct(&self) -> usize {
        (0..self.num_classes).map(|i| self.get(i, i)).sum()
    }

    pub fn accuracy(&self) -> f64 {
        let total = self.total();
        if total > 0 {
            self.correct() as f64 / total as f64
        } else {
            0.0
        }
    }

    /// Render as a small text table with the given class labels
    pub fn render(&self, labels: &[String]) -> String {
        let label = |i: usize| labels.get(i).cloned().unwrap_or_else(|| i.to_string());
        let mut out = format!("{:>12}", "actual\\pred");
        for col in 0..self.num_classes {
            out.push_str(&format!("{:>8}", label(col)));
        }
        out.push('\n');
        for row in 0..self.num_classes {
            out.push_str(&format!("{:>12}", label(row)));
            for col in 0..self.num_classes {
                out.push_str(&format!("{:>8}", self.get(row, col)));
            }
            out.push('\n');
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_perfect_predictions() {
        let preds = vec![0, 1, 1, 0];
        let metrics = Metrics::from_predictions(&preds, &preds, 2);
        assert_eq!(metrics.accuracy, 1.0);
        assert_eq!(metrics.micro_f1, 1.0);
        assert_eq!(metrics.macro_f1, 1.0);
    }

    #[test]
    fn test_micro_f1_equals_accuracy_for_single_label() {
        let preds = vec![0, 1, 1, 1, 0, 0];
        let truth = vec![0, 1, 0, 1, 1, 0];
        let metrics = Metrics::from_predictions(&preds, &truth, 2);
        assert!((metrics.micro_f1 - metrics.accuracy).abs() < 1e-12);
        assert!((metrics.accuracy - 4.0 / 6.0).abs() < 1e-12);
    }

    #[test]
    fn test_macro_f1_ignores_classes_without_support() {
        // Only class 0 present in the ground truth
        let preds = vec![0, 0, 1];
        let truth = vec![0, 0, 0];
        let metrics = Metrics::from_predictions(&preds, &truth, 2);
        // class 0: precision 1, recall 2/3 -> f1 0.8
        assert!((metrics.macro_f1 - 0.8).abs() < 1e-12);
    }

    #[test]
    fn test_confusion_matrix_layout() {
        let cm = ConfusionMatrix::from_predictions(&[1, 0, 1], &[0, 0, 1], 2);
        assert_eq!(cm.get(0, 1), 1);
        assert_eq!(cm.get(0, 0), 1);
        assert_eq!(cm.get(1, 1), 1);
        assert_eq!(cm.correct(), 2);
        let text = cm.render(&["0".to_string(), "1".to_string()]);
        assert!(text.contains("actual\\pred"));
    }

    #[test]
    fn test_empty_predictions() {
        let metrics = Metrics::from_predictions(&[], &[], 2);
        assert_eq!(metrics.total_samples, 0);
        assert!(metrics.loss.is_none());
    }
}
