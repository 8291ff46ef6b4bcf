//! Learning rate scheduling
//!
//! A single step-decay schedule: the learning rate halves every
//! `step_size` epochs. `lr = initial_lr * 0.5^(epoch / step_size)`.

use serde::{Deserialize, Serialize};

/// Step-decay learning rate schedule
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepLr {
    /// Learning rate at epoch 0
    pub initial_lr: f64,
    /// Epochs between halvings
    pub step_size: usize,
    /// Multiplicative decay per step
    pub gamma: f64,
}

impl StepLr {
    /// Create a schedule that halves the rate every `step_size` epochs
    pub fn new(initial_lr: f64, step_size: usize) -> Self {
        Self {
            initial_lr,
            step_size: step_size.max(1),
            gamma: 0.5,
        }
    }

    /// Learning rate for a given epoch (0-indexed)
    pub fn lr_at(&self, epoch: usize) -> f64 {
        let steps = (epoch / self.step_size) as i32;
        self.initial_lr * self.gamma.powi(steps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_decay_halves_every_step() {
        let schedule = StepLr::new(1e-3, 20);

        assert_eq!(schedule.lr_at(0), 1e-3);
        assert_eq!(schedule.lr_at(19), 1e-3);
        assert!((schedule.lr_at(20) - 5e-4).abs() < 1e-12);
        assert!((schedule.lr_at(39) - 5e-4).abs() < 1e-12);
        assert!((schedule.lr_at(40) - 2.5e-4).abs() < 1e-12);
    }

    #[test]
    fn test_zero_step_size_is_clamped() {
        let schedule = StepLr::new(1e-3, 0);
        assert!((schedule.lr_at(1) - 5e-4).abs() < 1e-12);
    }
}
