//! Training loop for the mask classifier
//!
//! Implements the per-fold training loop with the Burn framework:
//! forward/backward passes with automatic differentiation, step-decay
//! learning rate, checkpointing on validation accuracy and optional early
//! stopping on validation loss. Validation always runs on the inner
//! (non-autodiff) model.

use burn::{
    data::{dataloader::batcher::Batcher, dataset::Dataset},
    module::AutodiffModule,
    optim::{
        adaptor::OptimizerAdaptor, decay::WeightDecayConfig, momentum::MomentumConfig, Adam,
        AdamConfig, GradientsParams, Optimizer, Sgd, SgdConfig,
    },
    tensor::{backend::AutodiffBackend, ElementConversion},
};
use rand::distributions::{Distribution, WeightedIndex};
use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use tracing::{debug, info};

use super::checkpoint::{CheckpointManager, CheckpointPolicy};
use super::criterion::Criterion;
use super::early_stopping::EarlyStopper;
use super::scheduler::StepLr;
use crate::dataset::{CutMixBatcher, MaskBatcher, MaskImageDataset, MaskItem, NUM_CLASSES};
use crate::model::{MaskClassifier, TrainConfig};
use crate::utils::error::{MaskVisionError, Result};
use crate::utils::logging::TrainingLogger;
use crate::utils::metrics::{macro_f1, AccuracyTracker, EpochMetrics, RunningAverage};

const OPTIMIZER_KEYS: &str = "sgd, adam";

/// Optimizer wrapper so one trainer type covers both registry entries
pub enum MaskOptimizer<B: AutodiffBackend> {
    Sgd(OptimizerAdaptor<Sgd<B::InnerBackend>, MaskClassifier<B>, B>),
    Adam(OptimizerAdaptor<Adam<B::InnerBackend>, MaskClassifier<B>, B>),
}

impl<B: AutodiffBackend> MaskOptimizer<B> {
    /// Apply one optimizer step
    pub fn step(
        &mut self,
        lr: f64,
        model: MaskClassifier<B>,
        grads: GradientsParams,
    ) -> MaskClassifier<B> {
        match self {
            Self::Sgd(opt) => opt.step(lr, model, grads),
            Self::Adam(opt) => opt.step(lr, model, grads),
        }
    }
}

/// Look up an optimizer by key
pub fn create_optimizer<B: AutodiffBackend>(
    key: &str,
    weight_decay: f64,
) -> Result<MaskOptimizer<B>> {
    match key {
        "sgd" => Ok(MaskOptimizer::Sgd(
            SgdConfig::new()
                .with_weight_decay(Some(WeightDecayConfig::new(weight_decay)))
                .with_momentum(Some(MomentumConfig::new()))
                .init(),
        )),
        "adam" => Ok(MaskOptimizer::Adam(
            AdamConfig::new()
                .with_weight_decay(Some(WeightDecayConfig::new(weight_decay)))
                .init(),
        )),
        other => Err(MaskVisionError::UnknownKey {
            kind: "optimizer",
            key: other.to_string(),
            known: OPTIMIZER_KEYS,
        }),
    }
}

/// Training-epoch index order: a plain shuffle, or class-balanced sampling
/// with replacement when enabled
///
/// Balanced sampling weights each example inversely to its class frequency,
/// so rare classes are drawn as often as common ones over an epoch.
fn epoch_indices(labels: &[usize], balanced: bool, rng: &mut ChaCha8Rng) -> Result<Vec<usize>> {
    if !balanced {
        let mut indices: Vec<usize> = (0..labels.len()).collect();
        indices.shuffle(rng);
        return Ok(indices);
    }

    let num_classes = labels.iter().max().map_or(0, |&m| m + 1);
    let mut counts = vec![0usize; num_classes];
    for &label in labels {
        counts[label] += 1;
    }

    let weights: Vec<f64> = labels.iter().map(|&l| 1.0 / counts[l] as f64).collect();
    let sampler = WeightedIndex::new(&weights)
        .map_err(|e| MaskVisionError::Config(format!("class-balanced sampling: {}", e)))?;

    Ok((0..labels.len()).map(|_| sampler.sample(rng)).collect())
}

/// Mutable per-fold training state
#[derive(Debug, Clone)]
pub struct RunState {
    /// Current epoch (0-indexed)
    pub epoch: usize,
    /// Current learning rate
    pub current_lr: f64,
    /// Training loss history (per epoch)
    pub train_losses: Vec<f64>,
    /// Validation loss history (per epoch)
    pub val_losses: Vec<f64>,
    /// Validation accuracy history (per epoch)
    pub val_accuracies: Vec<f64>,
    /// Total training samples seen
    pub samples_seen: usize,
}

impl RunState {
    pub fn new(initial_lr: f64) -> Self {
        Self {
            epoch: 0,
            current_lr: initial_lr,
            train_losses: Vec::new(),
            val_losses: Vec::new(),
            val_accuracies: Vec::new(),
            samples_seen: 0,
        }
    }
}

/// Result of one completed fold
#[derive(Debug, Clone, Serialize)]
pub struct FoldOutcome {
    /// Fold index, if part of a cross-validation run
    pub fold: Option<usize>,
    /// Best validation accuracy reached
    pub best_val_accuracy: f64,
    /// Lowest validation loss seen
    pub best_val_loss: f64,
    /// Epochs actually run (early stopping may cut the schedule short)
    pub epochs_run: usize,
    /// Path of the best checkpoint, if one was ever saved
    pub best_checkpoint: Option<std::path::PathBuf>,
}

/// Trainer for the mask classifier
pub struct Trainer<B: AutodiffBackend> {
    pub model: MaskClassifier<B>,
    optimizer: MaskOptimizer<B>,
    criterion: Criterion,
    schedule: StepLr,
    config: TrainConfig,
    device: B::Device,
    /// Apply CutMix mixing on training batches
    cutmix: bool,
    pub state: RunState,
}

impl<B: AutodiffBackend> Trainer<B> {
    pub fn new(
        model: MaskClassifier<B>,
        config: TrainConfig,
        criterion: Criterion,
        device: B::Device,
        cutmix: bool,
    ) -> Result<Self> {
        let optimizer = create_optimizer::<B>(&config.optimizer, config.weight_decay)?;
        let schedule = StepLr::new(config.learning_rate, config.lr_decay_step);
        let state = RunState::new(config.learning_rate);

        Ok(Self {
            model,
            optimizer,
            criterion,
            schedule,
            config,
            device,
            cutmix,
            state,
        })
    }

    /// Run the full training loop for one fold
    ///
    /// Saves `best` on strict validation accuracy improvement and `last`
    /// every epoch. Checkpoint write failures abort the fold.
    pub fn fit(
        &mut self,
        train_ds: &mut MaskImageDataset,
        val_ds: &MaskImageDataset,
        manager: &CheckpointManager,
        fold: Option<usize>,
        rng: &mut ChaCha8Rng,
    ) -> Result<FoldOutcome> {
        let batcher = MaskBatcher::<B>::new(
            self.device.clone(),
            self.config.image_width,
            self.config.image_height,
        );
        let cutmix_batcher = CutMixBatcher::<B>::new(
            self.device.clone(),
            self.config.image_width,
            self.config.image_height,
        );
        let valid_batcher = MaskBatcher::<B::InnerBackend>::new(
            Default::default(),
            self.config.image_width,
            self.config.image_height,
        );

        let mut policy = CheckpointPolicy::new();
        let mut stopper = EarlyStopper::new(self.config.early_stopping);
        let mut logger = TrainingLogger::new(self.config.epochs);
        let mut best_checkpoint = None;
        let mut epochs_run = 0;

        if let Some(fold) = fold {
            info!(
                "Fold {}: {} train / {} val samples",
                fold,
                train_ds.len(),
                val_ds.len()
            );
        }

        for epoch in 0..self.config.epochs {
            self.state.epoch = epoch;
            self.state.current_lr = self.schedule.lr_at(epoch);
            train_ds.set_epoch(epoch);
            logger.start_epoch(epoch);

            let indices = epoch_indices(&train_ds.labels(), self.config.balanced, rng)?;
            let train_loss = if self.cutmix {
                self.train_epoch_cutmix(train_ds, &cutmix_batcher, &indices, rng)
            } else {
                self.train_epoch(train_ds, &batcher, &indices)
            };
            self.state.train_losses.push(train_loss);

            let val = self.validate(val_ds, &valid_batcher);
            self.state.val_losses.push(val.loss);
            self.state.val_accuracies.push(val.accuracy);

            logger.end_epoch(
                train_loss,
                val.loss,
                val.accuracy,
                val.macro_f1,
                self.state.current_lr,
            );

            let decision = policy.observe(val.accuracy, val.loss);
            if decision.save_best {
                logger.log_new_best(val.accuracy);
                best_checkpoint = Some(manager.save(self.model.clone(), "best", fold)?);
            }
            manager.save(self.model.clone(), "last", fold)?;

            epochs_run = epoch + 1;
            if stopper.observe(val.loss) {
                logger.log_early_stop(self.config.early_stopping);
                break;
            }
        }

        logger.log_complete(policy.best_val_accuracy());

        Ok(FoldOutcome {
            fold,
            best_val_accuracy: policy.best_val_accuracy(),
            best_val_loss: policy.best_val_loss(),
            epochs_run,
            best_checkpoint,
        })
    }

    /// Train one epoch over the given index order; returns the mean batch loss
    fn train_epoch(
        &mut self,
        dataset: &MaskImageDataset,
        batcher: &MaskBatcher<B>,
        indices: &[usize],
    ) -> f64 {
        let mut loss_avg = RunningAverage::new();
        let mut tracker = AccuracyTracker::new();

        let num_batches = indices.len().div_ceil(self.config.batch_size);

        for (batch_idx, chunk) in indices.chunks(self.config.batch_size).enumerate() {
            let items: Vec<MaskItem> = chunk.iter().filter_map(|&i| dataset.get(i)).collect();
            if items.is_empty() {
                continue;
            }
            let batch_size = items.len();
            let batch = batcher.batch(items);

            let output = self.model.forward(batch.images.clone());
            let loss = self
                .criterion
                .forward(output.clone(), batch.targets.clone());
            let loss_value: f64 = loss.clone().into_scalar().elem();
            loss_avg.add(loss_value);

            let predictions = output.argmax(1).squeeze::<1>(1);
            let correct: i64 = predictions
                .equal(batch.targets.clone())
                .int()
                .sum()
                .into_scalar()
                .elem();
            tracker.add_batch(correct as usize, batch_size);

            let grads = loss.backward();
            let grads = GradientsParams::from_grads(grads, &self.model);
            self.model = self
                .optimizer
                .step(self.state.current_lr, self.model.clone(), grads);

            self.state.samples_seen += batch_size;

            if (batch_idx + 1) % self.config.log_interval == 0 || batch_idx + 1 == num_batches {
                debug!(
                    "  Batch {}/{}: loss = {:.4}, acc = {:.2}%",
                    batch_idx + 1,
                    num_batches,
                    loss_avg.average(),
                    tracker.accuracy() * 100.0
                );
            }
        }

        loss_avg.average()
    }

    /// Train one epoch with CutMix mixing; returns the mean batch loss
    ///
    /// Batch accuracy is not meaningful against mixed targets, so only the
    /// loss is tracked here.
    fn train_epoch_cutmix(
        &mut self,
        dataset: &MaskImageDataset,
        batcher: &CutMixBatcher<B>,
        indices: &[usize],
        rng: &mut ChaCha8Rng,
    ) -> f64 {
        let mut loss_avg = RunningAverage::new();

        let num_batches = indices.len().div_ceil(self.config.batch_size);

        for (batch_idx, chunk) in indices.chunks(self.config.batch_size).enumerate() {
            let items: Vec<MaskItem> = chunk.iter().filter_map(|&i| dataset.get(i)).collect();
            if items.is_empty() {
                continue;
            }
            let batch_size = items.len();
            let batch = batcher.mix_batch(items, rng);

            let output = self.model.forward(batch.images.clone());
            let loss = self.criterion.forward_mixed(
                output,
                batch.targets_a.clone(),
                batch.targets_b.clone(),
                batch.lambda,
            );
            let loss_value: f64 = loss.clone().into_scalar().elem();
            loss_avg.add(loss_value);

            let grads = loss.backward();
            let grads = GradientsParams::from_grads(grads, &self.model);
            self.model = self
                .optimizer
                .step(self.state.current_lr, self.model.clone(), grads);

            self.state.samples_seen += batch_size;

            if (batch_idx + 1) % self.config.log_interval == 0 || batch_idx + 1 == num_batches {
                debug!(
                    "  Batch {}/{}: loss = {:.4} (lambda = {:.3})",
                    batch_idx + 1,
                    num_batches,
                    loss_avg.average(),
                    batch.lambda
                );
            }
        }

        loss_avg.average()
    }

    /// Evaluate on a validation set with the inner (non-autodiff) model
    ///
    /// The accuracy denominator is the number of examples actually scored;
    /// unreadable images are skipped, not counted as misses. Macro F1 is
    /// computed over the whole validation set, not per batch.
    pub fn validate(
        &self,
        dataset: &MaskImageDataset,
        batcher: &MaskBatcher<B::InnerBackend>,
    ) -> EpochMetrics {
        let model_valid = self.model.valid();

        let mut loss_avg = RunningAverage::new();
        let mut tracker = AccuracyTracker::new();
        let mut all_predictions = Vec::with_capacity(dataset.len());
        let mut all_labels = Vec::with_capacity(dataset.len());

        let indices: Vec<usize> = (0..dataset.len()).collect();
        for chunk in indices.chunks(self.config.valid_batch_size) {
            let items: Vec<MaskItem> = chunk.iter().filter_map(|&i| dataset.get(i)).collect();
            if items.is_empty() {
                continue;
            }
            let labels: Vec<usize> = items.iter().map(|item| item.label).collect();
            let batch = batcher.batch(items);

            let output = model_valid.forward(batch.images.clone());
            let loss = self.criterion.forward(output.clone(), batch.targets);
            loss_avg.add(loss.into_scalar().elem());

            let predictions: Vec<usize> = output
                .argmax(1)
                .squeeze::<1>(1)
                .into_data()
                .to_vec::<i64>()
                .unwrap()
                .into_iter()
                .map(|p| p as usize)
                .collect();
            tracker.add_predictions(&predictions, &labels);
            all_predictions.extend(predictions);
            all_labels.extend(labels);
        }

        EpochMetrics::new(
            loss_avg.average(),
            tracker.accuracy(),
            macro_f1(&all_predictions, &all_labels, NUM_CLASSES),
        )
    }
}
