//! Model and training configuration
//!
//! Both configs serialize to JSON; every run directory gets a `config.json`
//! dump so results stay reproducible.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::dataset::{IMAGE_HEIGHT, IMAGE_WIDTH, NUM_CLASSES};
use crate::utils::error::{MaskVisionError, Result};

/// Configuration for the CNN model architecture
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Number of output classes
    pub num_classes: usize,

    /// Number of input channels (3 for RGB)
    pub input_channels: usize,

    /// Dropout rate for the classifier head (0.0 to 1.0)
    pub dropout_rate: f64,

    /// Filters per convolutional block
    pub conv_filters: Vec<usize>,

    /// Kernel size for convolutional layers
    pub kernel_size: usize,

    /// Units in the hidden fully connected layer
    pub fc_units: usize,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self::base()
    }
}

impl ModelConfig {
    /// Standard architecture
    pub fn base() -> Self {
        Self {
            num_classes: NUM_CLASSES,
            input_channels: 3,
            dropout_rate: 0.5,
            conv_filters: vec![32, 64, 128, 256],
            kernel_size: 3,
            fc_units: 256,
        }
    }

    /// Wider filter ladder for maximum accuracy
    pub fn wide() -> Self {
        Self {
            conv_filters: vec![64, 128, 256, 512],
            fc_units: 512,
            ..Self::base()
        }
    }

    /// Lightweight variant for fast experiments
    pub fn lite() -> Self {
        Self {
            dropout_rate: 0.3,
            conv_filters: vec![16, 32, 64],
            fc_units: 128,
            ..Self::base()
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.num_classes == 0 {
            return Err(MaskVisionError::Config(
                "num_classes must be greater than 0".to_string(),
            ));
        }
        if !(0.0..1.0).contains(&self.dropout_rate) {
            return Err(MaskVisionError::Config(
                "dropout_rate must be in range [0.0, 1.0)".to_string(),
            ));
        }
        if self.conv_filters.is_empty() {
            return Err(MaskVisionError::Config(
                "conv_filters must have at least one layer".to_string(),
            ));
        }
        if self.kernel_size < 1 || self.kernel_size % 2 == 0 {
            return Err(MaskVisionError::Config(
                "kernel_size must be a positive odd number".to_string(),
            ));
        }
        Ok(())
    }
}

/// Training hyperparameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainConfig {
    /// Number of training epochs
    pub epochs: usize,

    /// Batch size for training
    pub batch_size: usize,

    /// Batch size for validation
    pub valid_batch_size: usize,

    /// Initial learning rate
    pub learning_rate: f64,

    /// Weight decay (L2 regularization)
    pub weight_decay: f64,

    /// Halve the learning rate every this many epochs
    pub lr_decay_step: usize,

    /// Model registry key: base, wide, lite
    pub model: String,

    /// Optimizer registry key: sgd, adam
    pub optimizer: String,

    /// Criterion registry key: cross_entropy, label_smoothing, focal
    pub criterion: String,

    /// Augmentation registry key: base, custom
    pub augmentation: String,

    /// Training mode: plain, k, s, g, cutmix
    pub mode: String,

    /// Sample training batches inversely to class frequency
    pub balanced: bool,

    /// Apply the training augmentation pipeline to validation images too
    pub augment_validation: bool,

    /// Number of folds for cross-validation modes
    pub num_folds: usize,

    /// Validation fraction for holdout modes
    pub val_ratio: f64,

    /// Early stopping patience in epochs (0 disables)
    pub early_stopping: usize,

    /// Log running averages every this many batches
    pub log_interval: usize,

    /// Random seed for reproducibility
    pub seed: u64,

    /// Model input width in pixels
    pub image_width: usize,

    /// Model input height in pixels
    pub image_height: usize,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            epochs: 30,
            batch_size: 64,
            valid_batch_size: 256,
            learning_rate: 1e-3,
            weight_decay: 5e-4,
            lr_decay_step: 20,
            model: "base".to_string(),
            optimizer: "adam".to_string(),
            criterion: "cross_entropy".to_string(),
            augmentation: "base".to_string(),
            mode: "plain".to_string(),
            balanced: false,
            augment_validation: false,
            num_folds: 5,
            val_ratio: 0.2,
            early_stopping: 0,
            log_interval: 20,
            seed: 42,
            image_width: IMAGE_WIDTH,
            image_height: IMAGE_HEIGHT,
        }
    }
}

impl TrainConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.epochs == 0 {
            return Err(MaskVisionError::Config(
                "epochs must be greater than 0".to_string(),
            ));
        }
        if self.batch_size == 0 || self.valid_batch_size == 0 {
            return Err(MaskVisionError::Config(
                "batch sizes must be greater than 0".to_string(),
            ));
        }
        if self.learning_rate <= 0.0 {
            return Err(MaskVisionError::Config(
                "learning_rate must be positive".to_string(),
            ));
        }
        if self.lr_decay_step == 0 {
            return Err(MaskVisionError::Config(
                "lr_decay_step must be greater than 0".to_string(),
            ));
        }
        if !(0.0..1.0).contains(&self.val_ratio) || self.val_ratio == 0.0 {
            return Err(MaskVisionError::Config(
                "val_ratio must be in range (0.0, 1.0)".to_string(),
            ));
        }
        if self.image_width == 0 || self.image_height == 0 {
            return Err(MaskVisionError::Config(
                "image dimensions must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Save configuration to a JSON file
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Load configuration from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_config_presets_validate() {
        assert!(ModelConfig::base().validate().is_ok());
        assert!(ModelConfig::wide().validate().is_ok());
        assert!(ModelConfig::lite().validate().is_ok());
        assert_eq!(ModelConfig::default().num_classes, 18);
    }

    #[test]
    fn test_model_config_validation() {
        let mut config = ModelConfig::base();
        config.num_classes = 0;
        assert!(config.validate().is_err());

        config = ModelConfig::base();
        config.dropout_rate = 1.5;
        assert!(config.validate().is_err());

        config = ModelConfig::base();
        config.kernel_size = 4;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_train_config_defaults() {
        let config = TrainConfig::default();
        assert_eq!(config.batch_size, 64);
        assert_eq!(config.seed, 42);
        assert_eq!(config.lr_decay_step, 20);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_train_config_validation() {
        let mut config = TrainConfig::default();
        config.val_ratio = 1.0;
        assert!(config.validate().is_err());

        config = TrainConfig::default();
        config.epochs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_train_config_roundtrip() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.json");

        let mut config = TrainConfig::default();
        config.mode = "cutmix".to_string();
        config.seed = 7;
        config.balanced = true;
        config.augment_validation = true;
        config.save(&path).unwrap();

        let loaded = TrainConfig::load(&path).unwrap();
        assert_eq!(loaded.mode, "cutmix");
        assert_eq!(loaded.seed, 7);
        assert!(loaded.balanced);
        assert!(loaded.augment_validation);
    }
}
