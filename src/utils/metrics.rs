//! Metrics Module for Model Evaluation
//!
//! Tracks loss and accuracy during training and validation. The accuracy
//! denominator is always the number of examples actually scored, so numbers
//! are comparable between training variants and across folds.

use serde::{Deserialize, Serialize};

/// Loss, accuracy and macro F1 for one epoch (training or validation)
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct EpochMetrics {
    /// Mean loss over batches
    pub loss: f64,
    /// Fraction of correctly classified examples
    pub accuracy: f64,
    /// Macro-averaged F1 over the classes present in the ground truth
    pub macro_f1: f64,
}

impl EpochMetrics {
    pub fn new(loss: f64, accuracy: f64, macro_f1: f64) -> Self {
        Self {
            loss,
            accuracy,
            macro_f1,
        }
    }
}

impl std::fmt::Display for EpochMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "loss = {:.4}, accuracy = {:.2}%, macro F1 = {:.3}",
            self.loss,
            self.accuracy * 100.0,
            self.macro_f1
        )
    }
}

/// Running average for tracking metrics during training
#[derive(Debug, Clone, Default)]
pub struct RunningAverage {
    sum: f64,
    count: usize,
}

impl RunningAverage {
    /// Create a new running average
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a value
    pub fn add(&mut self, value: f64) {
        self.sum += value;
        self.count += 1;
    }

    /// Get the current average
    pub fn average(&self) -> f64 {
        if self.count > 0 {
            self.sum / self.count as f64
        } else {
            0.0
        }
    }

    /// Get the count
    pub fn count(&self) -> usize {
        self.count
    }

    /// Reset the running average
    pub fn reset(&mut self) {
        self.sum = 0.0;
        self.count = 0;
    }
}

/// Accuracy tracker accumulating correct/total over batches
#[derive(Debug, Clone, Default)]
pub struct AccuracyTracker {
    correct: usize,
    total: usize,
}

impl AccuracyTracker {
    /// Create a new accuracy tracker
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one batch worth of results
    pub fn add_batch(&mut self, correct: usize, batch_size: usize) {
        self.correct += correct;
        self.total += batch_size;
    }

    /// Add individual predictions against ground truth
    pub fn add_predictions(&mut self, predictions: &[usize], ground_truth: &[usize]) {
        for (pred, gt) in predictions.iter().zip(ground_truth.iter()) {
            self.total += 1;
            if pred == gt {
                self.correct += 1;
            }
        }
    }

    /// Get the current accuracy
    pub fn accuracy(&self) -> f64 {
        if self.total > 0 {
            self.correct as f64 / self.total as f64
        } else {
            0.0
        }
    }

    /// Number of examples scored so far
    pub fn count(&self) -> usize {
        self.total
    }

    /// Number of correct predictions so far
    pub fn correct(&self) -> usize {
        self.correct
    }

    /// Reset the tracker
    pub fn reset(&mut self) {
        self.correct = 0;
        self.total = 0;
    }
}

/// Macro-averaged F1 score over classes that appear in the ground truth
pub fn macro_f1(predictions: &[usize], ground_truth: &[usize], num_classes: usize) -> f64 {
    let mut tp = vec![0usize; num_classes];
    let mut fp = vec![0usize; num_classes];
    let mut fn_ = vec![0usize; num_classes];

    for (&pred, &actual) in predictions.iter().zip(ground_truth.iter()) {
        if pred >= num_classes || actual >= num_classes {
            continue;
        }
        if pred == actual {
            tp[actual] += 1;
        } else {
            fp[pred] += 1;
            fn_[actual] += 1;
        }
    }

    let mut f1_sum = 0.0;
    let mut present = 0usize;
    for class in 0..num_classes {
        let support = tp[class] + fn_[class];
        if support == 0 {
            continue;
        }
        present += 1;

        let precision = if tp[class] + fp[class] > 0 {
            tp[class] as f64 / (tp[class] + fp[class]) as f64
        } else {
            0.0
        };
        let recall = tp[class] as f64 / support as f64;

        if precision + recall > 0.0 {
            f1_sum += 2.0 * precision * recall / (precision + recall);
        }
    }

    if present > 0 {
        f1_sum / present as f64
    } else {
        0.0
    }
}
