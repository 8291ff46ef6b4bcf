//! Logging Module
//!
//! Structured logging via the `tracing` crate plus a small helper for
//! per-epoch training progress output.

use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Minimum log level to display
    pub level: Level,
    /// Whether to include target (module path)
    pub include_target: bool,
    /// Whether to use ANSI colors
    pub ansi_colors: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            include_target: false,
            ansi_colors: true,
        }
    }
}

impl LogConfig {
    /// Verbose config for debugging
    pub fn verbose() -> Self {
        Self {
            level: Level::DEBUG,
            include_target: true,
            ansi_colors: true,
        }
    }

}

/// Initialize logging with the given configuration
///
/// Returns Err if a global subscriber was already installed.
pub fn init_logging(config: &LogConfig) -> Result<(), String> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(config.level)
        .with_ansi(config.ansi_colors)
        .with_target(config.include_target)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| format!("Failed to initialize logging: {}", e))
}

/// Training progress logger
pub struct TrainingLogger {
    /// Current epoch
    epoch: usize,
    /// Total epochs
    total_epochs: usize,
    /// Epoch start time
    epoch_start: std::time::Instant,
    /// Training start time
    training_start: std::time::Instant,
}

impl TrainingLogger {
    /// Create a new training logger
    pub fn new(total_epochs: usize) -> Self {
        Self {
            epoch: 0,
            total_epochs,
            epoch_start: std::time::Instant::now(),
            training_start: std::time::Instant::now(),
        }
    }

    /// Log start of an epoch
    pub fn start_epoch(&mut self, epoch: usize) {
        self.epoch = epoch;
        self.epoch_start = std::time::Instant::now();

        tracing::info!("Epoch {}/{} started", epoch + 1, self.total_epochs);
    }

    /// Log end of an epoch with metrics
    pub fn end_epoch(
        &self,
        train_loss: f64,
        val_loss: f64,
        val_accuracy: f64,
        val_f1: f64,
        learning_rate: f64,
    ) {
        let epoch_time = self.epoch_start.elapsed();

        tracing::info!(
            "Epoch {}/{} completed in {:.1}s | Train Loss: {:.4} | Val Loss: {:.4} | Val Acc: {:.2}% | Val F1: {:.3} | LR: {:.6}",
            self.epoch + 1,
            self.total_epochs,
            epoch_time.as_secs_f64(),
            train_loss,
            val_loss,
            val_accuracy * 100.0,
            val_f1,
            learning_rate
        );
    }

    /// Log a new best model
    pub fn log_new_best(&self, accuracy: f64) {
        tracing::info!("New best model! Accuracy: {:.2}%", accuracy * 100.0);
    }

    /// Log early stopping
    pub fn log_early_stop(&self, patience: usize) {
        tracing::warn!(
            "Early stopping triggered after {} epochs without improvement",
            patience
        );
    }

    /// Log training completion
    pub fn log_complete(&self, best_accuracy: f64) {
        let total_time = self.training_start.elapsed();

        tracing::info!(
            "Training complete in {:.1}s | Best accuracy: {:.2}%",
            total_time.as_secs_f64(),
            best_accuracy * 100.0
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_config_default() {
        let config = LogConfig::default();
        assert_eq!(config.level, Level::INFO);
        assert!(!config.include_target);
    }

    #[test]
    fn test_log_config_verbose() {
        let config = LogConfig::verbose();
        assert_eq!(config.level, Level::DEBUG);
        assert!(config.include_target);
    }
}
