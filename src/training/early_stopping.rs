//! Early stopping on validation loss
//!
//! Counts epochs since the validation loss last strictly decreased and stops
//! the fold once the count exceeds the patience, so a patience of 2 tolerates
//! two stale epochs and stops on the third. Patience 0 disables the stopper
//! entirely. Once triggered, the stop flag stays set for the rest of the
//! fold.

use tracing::warn;

/// Patience-based early stopping state
#[derive(Debug, Clone)]
pub struct EarlyStopper {
    patience: usize,
    best_loss: f64,
    epochs_without_improvement: usize,
    stopped: bool,
}

impl EarlyStopper {
    /// Create a stopper with the given patience (0 disables it)
    pub fn new(patience: usize) -> Self {
        Self {
            patience,
            best_loss: f64::INFINITY,
            epochs_without_improvement: 0,
            stopped: false,
        }
    }

    /// Record a validation loss; returns true when training should stop
    pub fn observe(&mut self, val_loss: f64) -> bool {
        if self.patience == 0 {
            return false;
        }
        if self.stopped {
            return true;
        }

        if val_loss < self.best_loss {
            self.best_loss = val_loss;
            self.epochs_without_improvement = 0;
        } else {
            self.epochs_without_improvement += 1;
            if self.epochs_without_improvement > self.patience {
                warn!(
                    "Early stopping triggered after {} epochs without improvement",
                    self.epochs_without_improvement
                );
                self.stopped = true;
            }
        }

        self.stopped
    }

    pub fn stopped(&self) -> bool {
        self.stopped
    }

    pub fn epochs_without_improvement(&self) -> usize {
        self.epochs_without_improvement
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_patience_never_stops() {
        let mut stopper = EarlyStopper::new(0);
        for _ in 0..100 {
            assert!(!stopper.observe(1.0));
        }
        assert!(!stopper.stopped());
    }

    #[test]
    fn test_strict_decrease_resets_counter() {
        let mut stopper = EarlyStopper::new(2);

        assert!(!stopper.observe(0.9));
        assert!(!stopper.observe(0.8)); // improvement, counter back to 0
        assert!(!stopper.observe(0.85)); // 1 without improvement
        assert!(!stopper.observe(0.86)); // 2 without improvement, tolerated
        assert!(stopper.observe(0.87)); // 3 exceeds the patience -> stop
        assert!(stopper.stopped());
    }

    #[test]
    fn test_patience_two_stops_on_fifth_observation() {
        let mut stopper = EarlyStopper::new(2);

        let stops: Vec<bool> = [0.9, 0.8, 0.85, 0.86, 0.87]
            .iter()
            .map(|&loss| stopper.observe(loss))
            .collect();

        assert_eq!(stops, vec![false, false, false, false, true]);
    }

    #[test]
    fn test_equal_loss_does_not_count_as_improvement() {
        let mut stopper = EarlyStopper::new(2);

        assert!(!stopper.observe(0.5));
        assert!(!stopper.observe(0.5));
        assert!(!stopper.observe(0.5));
        assert!(stopper.observe(0.5));
    }

    #[test]
    fn test_stop_is_permanent() {
        let mut stopper = EarlyStopper::new(1);
        assert!(!stopper.observe(0.5));
        assert!(!stopper.observe(0.6));
        assert!(stopper.observe(0.7));

        // A later improvement does not un-stop the fold
        assert!(stopper.observe(0.1));
        assert!(stopper.stopped());
    }
}
