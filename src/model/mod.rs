//! Model module for CNN architectures using the Burn framework
//!
//! This module provides:
//! - The mask-wearing classifier CNN and its architecture presets
//! - Model and training configuration
//! - Checkpoint scoring for single models and fold ensembles

pub mod cnn;
pub mod config;
pub mod ensemble;

pub use cnn::MaskClassifier;
pub use config::{ModelConfig, TrainConfig};
pub use ensemble::Scorer;

use burn::tensor::backend::Backend;

use crate::utils::error::{MaskVisionError, Result};

const MODEL_KEYS: &str = "base, wide, lite";

/// Look up an architecture preset by key
pub fn model_config(key: &str) -> Result<ModelConfig> {
    match key {
        "base" => Ok(ModelConfig::base()),
        "wide" => Ok(ModelConfig::wide()),
        "lite" => Ok(ModelConfig::lite()),
        other => Err(MaskVisionError::UnknownKey {
            kind: "model",
            key: other.to_string(),
            known: MODEL_KEYS,
        }),
    }
}

/// Build a classifier from an architecture preset key
pub fn create_classifier<B: Backend>(key: &str, device: &B::Device) -> Result<MaskClassifier<B>> {
    let config = model_config(key)?;
    config.validate()?;
    Ok(MaskClassifier::new(&config, device))
}
