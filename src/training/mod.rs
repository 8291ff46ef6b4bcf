//! Training module
//!
//! The trainer runs the per-epoch loop for one model; the run orchestrator
//! plans splits per the training mode and drives one trainer per fold.

pub mod checkpoint;
pub mod criterion;
pub mod early_stopping;
pub mod run;
pub mod scheduler;
pub mod trainer;

pub use checkpoint::{increment_path, CheckpointManager, CheckpointPolicy};
pub use criterion::{create_criterion, Criterion};
pub use early_stopping::EarlyStopper;
pub use run::{run_training, RunSummary};
pub use scheduler::StepLr;
pub use trainer::{create_optimizer, FoldOutcome, MaskOptimizer, RunState, Trainer};
