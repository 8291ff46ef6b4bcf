//! Training orchestration
//!
//! Dispatches a run over the training mode: `plain` and `cutmix` train a
//! single model on a holdout split, while `k`, `s` and `g` run k-fold,
//! stratified or grouped cross-validation and train one model per fold. All
//! randomness flows from the run seed, so a rerun with the same
//! configuration reproduces the same splits, shuffles and augmentations.

use std::path::Path;

use burn::tensor::backend::AutodiffBackend;
use colored::Colorize;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use tracing::info;

use super::checkpoint::CheckpointManager;
use super::criterion::create_criterion;
use super::trainer::{FoldOutcome, Trainer};
use crate::dataset::{
    create_augmenter, holdout, Augmenter, FoldMode, FoldPlanner, MaskDataset, MaskImageDataset,
};
use crate::model::{create_classifier, TrainConfig};
use crate::utils::error::{MaskVisionError, Result};
use crate::utils::{derive_seed, seed_everything};

/// Summary of a completed run
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    /// One outcome per trained model
    pub outcomes: Vec<FoldOutcome>,
    /// Mean best validation accuracy over folds
    pub mean_val_accuracy: f64,
    /// Completion timestamp (RFC 3339)
    pub completed_at: String,
}

impl RunSummary {
    fn new(outcomes: Vec<FoldOutcome>) -> Self {
        let mean_val_accuracy = if outcomes.is_empty() {
            0.0
        } else {
            outcomes.iter().map(|o| o.best_val_accuracy).sum::<f64>() / outcomes.len() as f64
        };
        Self {
            outcomes,
            mean_val_accuracy,
            completed_at: chrono::Local::now().to_rfc3339(),
        }
    }

    /// Write the summary as JSON next to the checkpoints
    pub fn save(&self, path: &std::path::Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Print a per-fold table to the console
    pub fn print(&self) {
        println!("\n{}", "Results".bold());
        for outcome in &self.outcomes {
            let label = match outcome.fold {
                Some(fold) => format!("fold {}", fold),
                None => "holdout".to_string(),
            };
            println!(
                "  {:8} best acc = {}  best loss = {:.4}  epochs = {}",
                label,
                format!("{:.2}%", outcome.best_val_accuracy * 100.0).green(),
                outcome.best_val_loss,
                outcome.epochs_run
            );
        }
        if self.outcomes.len() > 1 {
            println!(
                "  {:8} mean acc = {}",
                "overall",
                format!("{:.2}%", self.mean_val_accuracy * 100.0).green().bold()
            );
        }
    }
}

const MODE_KEYS: &str = "plain, k, s, g, cutmix";

// Keeps fold seeds clear of the per-item augmentation salt space
const FOLD_SEED_SALT: u64 = 1 << 48;

/// Run a full training job per the configuration
pub fn run_training<B: AutodiffBackend>(
    data_dir: &Path,
    output_dir: &Path,
    name: &str,
    config: TrainConfig,
    device: B::Device,
) -> Result<RunSummary> {
    config.validate()?;
    if !["plain", "k", "s", "g", "cutmix"].contains(&config.mode.as_str()) {
        return Err(MaskVisionError::UnknownKey {
            kind: "mode",
            key: config.mode.clone(),
            known: MODE_KEYS,
        });
    }
    seed_everything::<B>(config.seed);

    let dataset = MaskDataset::new(data_dir)?;
    dataset.stats().print();

    let manager = CheckpointManager::new(output_dir, name)?;
    manager.dump_config(&config)?;

    let splits: Vec<(Vec<usize>, Vec<usize>, Option<usize>)> = match config.mode.as_str() {
        "k" | "s" | "g" => {
            let mode = FoldMode::parse(&config.mode)?;
            let planner = FoldPlanner::new(mode, config.num_folds, config.seed)?;
            planner
                .plan(&dataset.labels(), &dataset.groups())?
                .into_iter()
                .map(|fold| (fold.train_indices, fold.val_indices, Some(fold.index)))
                .collect()
        }
        _ => {
            let (train, val) = holdout(dataset.len(), config.val_ratio, config.seed)?;
            vec![(train, val, None)]
        }
    };
    let cutmix = config.mode == "cutmix";

    let train_augmenter = create_augmenter(
        &config.augmentation,
        config.image_width as u32,
        config.image_height as u32,
    )?;
    let val_augmenter = if config.augment_validation {
        train_augmenter.clone()
    } else {
        Augmenter::base(config.image_width as u32, config.image_height as u32)
    };
    let criterion = create_criterion(&config.criterion)?;

    info!(
        "Mode '{}': training {} model(s) on {} samples",
        config.mode,
        splits.len(),
        dataset.len()
    );

    let mut outcomes = Vec::with_capacity(splits.len());
    for (ordinal, (train_indices, val_indices, fold)) in splits.into_iter().enumerate() {
        // Each split gets its own seed-derived stream, so a fold's shuffles
        // never depend on how much randomness earlier folds consumed.
        let mut rng =
            ChaCha8Rng::seed_from_u64(derive_seed(config.seed, FOLD_SEED_SALT | ordinal as u64));
        let mut train_ds = MaskImageDataset::new(
            dataset.subset(&train_indices),
            train_augmenter.clone(),
            config.seed,
        );
        let val_ds = MaskImageDataset::new(
            dataset.subset(&val_indices),
            val_augmenter.clone(),
            config.seed,
        );

        let model = create_classifier::<B>(&config.model, &device)?;
        let mut trainer = Trainer::new(
            model,
            config.clone(),
            criterion.clone(),
            device.clone(),
            cutmix,
        )?;

        let outcome = trainer.fit(&mut train_ds, &val_ds, &manager, fold, &mut rng)?;
        outcomes.push(outcome);
    }

    let summary = RunSummary::new(outcomes);
    summary.save(&manager.run_dir().join("summary.json"))?;
    summary.print();
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_means_over_folds() {
        let outcome = |fold, acc| FoldOutcome {
            fold: Some(fold),
            best_val_accuracy: acc,
            best_val_loss: 1.0,
            epochs_run: 3,
            best_checkpoint: None,
        };

        let summary = RunSummary::new(vec![outcome(0, 0.8), outcome(1, 0.6)]);
        assert!((summary.mean_val_accuracy - 0.7).abs() < 1e-9);
    }

    #[test]
    fn test_empty_summary_is_zero() {
        let summary = RunSummary::new(vec![]);
        assert_eq!(summary.mean_val_accuracy, 0.0);
    }

    #[test]
    fn test_fold_rng_streams_are_independent() {
        use rand::Rng;

        let mut fold0 = ChaCha8Rng::seed_from_u64(derive_seed(42, FOLD_SEED_SALT));
        let mut fold1 = ChaCha8Rng::seed_from_u64(derive_seed(42, FOLD_SEED_SALT | 1));

        // Draining one fold's stream leaves the next fold's draws unchanged
        for _ in 0..1000 {
            fold0.gen::<u64>();
        }
        let first: u64 = fold1.gen();

        let mut fresh = ChaCha8Rng::seed_from_u64(derive_seed(42, FOLD_SEED_SALT | 1));
        assert_eq!(first, fresh.gen::<u64>());

        let mut other = ChaCha8Rng::seed_from_u64(derive_seed(42, FOLD_SEED_SALT));
        assert_ne!(first, other.gen::<u64>());
    }

    #[test]
    fn test_unknown_mode_is_rejected() {
        type TestAutodiff = burn::backend::Autodiff<burn::backend::NdArray>;

        let tmp = tempfile::tempdir().unwrap();
        let mut config = TrainConfig::default();
        config.mode = "bootstrap".to_string();

        // Rejected before the dataset is even scanned
        let err = run_training::<TestAutodiff>(
            &tmp.path().join("missing"),
            tmp.path(),
            "exp",
            config,
            Default::default(),
        )
        .unwrap_err();
        assert!(matches!(err, MaskVisionError::UnknownKey { kind: "mode", .. }));
    }
}
