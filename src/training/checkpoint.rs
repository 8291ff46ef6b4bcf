//! Checkpoint policy and run directory management
//!
//! Each run gets its own directory under the output root (`exp`, `exp2`,
//! `exp3`, ...) holding a `config.json` dump and the model checkpoints;
//! cross-validation runs keep each fold's `best`/`last` pair in its own
//! `fold{n}` subdirectory. The policy saves `best` only when validation
//! accuracy strictly improves and `last` every epoch; a failed checkpoint
//! write aborts the fold.

use std::path::{Path, PathBuf};

use burn::module::Module;
use burn::record::CompactRecorder;
use burn::tensor::backend::Backend;
use tracing::info;

use crate::model::{MaskClassifier, TrainConfig};
use crate::utils::error::{MaskVisionError, Result};

/// Decision for one epoch's checkpoints
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckpointDecision {
    /// Save the best checkpoint this epoch
    pub save_best: bool,
}

/// Tracks the best validation metrics across a fold
#[derive(Debug, Clone)]
pub struct CheckpointPolicy {
    best_val_accuracy: f64,
    /// Lowest validation loss seen, kept for reporting only
    best_val_loss: f64,
}

impl Default for CheckpointPolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl CheckpointPolicy {
    pub fn new() -> Self {
        Self {
            best_val_accuracy: 0.0,
            best_val_loss: f64::INFINITY,
        }
    }

    /// Record an epoch's validation metrics
    ///
    /// `save_best` fires only on a strictly greater accuracy, so ties keep
    /// the earlier checkpoint.
    pub fn observe(&mut self, val_accuracy: f64, val_loss: f64) -> CheckpointDecision {
        if val_loss < self.best_val_loss {
            self.best_val_loss = val_loss;
        }

        let save_best = val_accuracy > self.best_val_accuracy;
        if save_best {
            self.best_val_accuracy = val_accuracy;
        }

        CheckpointDecision { save_best }
    }

    pub fn best_val_accuracy(&self) -> f64 {
        self.best_val_accuracy
    }

    pub fn best_val_loss(&self) -> f64 {
        self.best_val_loss
    }
}

/// First unused run directory: `base`, then `base2`, `base3`, ...
pub fn increment_path(base: &Path) -> PathBuf {
    if !base.exists() {
        return base.to_path_buf();
    }

    let name = base
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("exp")
        .to_string();
    let parent = base.parent().unwrap_or(Path::new(""));

    for n in 2.. {
        let candidate = parent.join(format!("{}{}", name, n));
        if !candidate.exists() {
            return candidate;
        }
    }
    unreachable!()
}

/// Owns one run directory and writes checkpoints into it
#[derive(Debug)]
pub struct CheckpointManager {
    run_dir: PathBuf,
}

impl CheckpointManager {
    /// Create a fresh run directory under `output_dir`
    pub fn new(output_dir: &Path, name: &str) -> Result<Self> {
        let run_dir = increment_path(&output_dir.join(name));
        std::fs::create_dir_all(&run_dir)?;
        info!("Run directory: {:?}", run_dir);

        Ok(Self { run_dir })
    }

    pub fn run_dir(&self) -> &Path {
        &self.run_dir
    }

    /// Dump the training configuration next to the checkpoints
    pub fn dump_config(&self, config: &TrainConfig) -> Result<()> {
        config.save(&self.run_dir.join("config.json"))
    }

    /// Path of a checkpoint, e.g. `best.mpk` or `fold2/last.mpk`
    pub fn checkpoint_path(&self, kind: &str, fold: Option<usize>) -> PathBuf {
        match fold {
            Some(fold) => self
                .run_dir
                .join(format!("fold{}", fold))
                .join(format!("{}.mpk", kind)),
            None => self.run_dir.join(format!("{}.mpk", kind)),
        }
    }

    /// Save a model checkpoint; failure is fatal for the fold
    pub fn save<B: Backend>(
        &self,
        model: MaskClassifier<B>,
        kind: &str,
        fold: Option<usize>,
    ) -> Result<PathBuf> {
        let path = self.checkpoint_path(kind, fold);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        model
            .save_file(&path, &CompactRecorder::new())
            .map_err(|e| MaskVisionError::Checkpoint {
                path: path.clone(),
                reason: e.to_string(),
            })?;
        Ok(path)
    }
}
