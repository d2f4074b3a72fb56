//! Loss and accuracy measures for a single engagement score.

/// Decision threshold separating "wants it" from "does not".
pub const DECISION_THRESHOLD: f64 = 0.5;

/// Per-example loss `½(prediction − label)²`.
pub fn squared_error(prediction: f64, label: f64) -> f64 {
    let diff = prediction - label;
    0.5 * diff * diff
}

/// Derivative of [`squared_error`] with respect to the prediction.
pub fn squared_error_gradient(prediction: f64, label: f64) -> f64 {
    prediction - label
}

/// Whether `prediction` and `label` round to the same class under the 0.5 threshold.
pub fn is_correct(prediction: f64, label: f64) -> bool {
    (prediction >= DECISION_THRESHOLD) == (label >= DECISION_THRESHOLD)
}

/// Aggregate loss/accuracy over a batch of (prediction, label) pairs.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BatchScore {
    pub loss_sum: f64,
    pub correct: usize,
    pub total: usize,
}

impl BatchScore {
    /// Record one prediction.
    pub fn record(&mut self, prediction: f64, label: f64) {
        self.loss_sum += squared_error(prediction, label);
        if is_correct(prediction, label) {
            self.correct += 1;
        }
        self.total += 1;
    }

    /// Mean loss, 0.0 for an empty batch.
    pub fn mean_loss(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.loss_sum / self.total as f64
        }
    }

    /// Fraction of correct predictions, 0.0 for an empty batch.
    pub fn accuracy(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.correct as f64 / self.total as f64
        }
    }
}
