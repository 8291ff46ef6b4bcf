//! # MaskVision
//!
//! A Rust library for mask-wearing face classification using the Burn
//! framework. Classifies face photos into 18 composite classes combining
//! mask state (worn, worn incorrectly, not worn), gender and age bucket.
//!
//! ## Modules
//!
//! - `dataset`: Directory scanning, label encoding, fold planning,
//!   augmentation and batching
//! - `model`: CNN architecture, configuration and checkpoint scoring
//! - `training`: Training loops, checkpointing, scheduling and the run
//!   orchestrator
//! - `utils`: Logging, metrics, errors and seeding
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use maskvision::backend::TrainingBackend;
//! use maskvision::model::TrainConfig;
//! use maskvision::training::run_training;
//!
//! let config = TrainConfig::default();
//! let summary = run_training::<TrainingBackend>(
//!     "data/train".as_ref(),
//!     "output".as_ref(),
//!     "exp",
//!     config,
//!     Default::default(),
//! )?;
//! ```

pub mod backend;
pub mod dataset;
pub mod model;
pub mod training;
pub mod utils;

// Re-export commonly used items for convenience
pub use dataset::loader::MaskDataset;
pub use dataset::split::{holdout, FoldMode, FoldPlanner};
pub use dataset::{MaskBatch, MaskBatcher, MaskImageDataset, MaskItem, NUM_CLASSES};
pub use model::cnn::MaskClassifier;
pub use model::config::{ModelConfig, TrainConfig};
pub use model::ensemble::Scorer;
pub use training::run::{run_training, RunSummary};
pub use training::trainer::{RunState, Trainer};
pub use utils::error::{MaskVisionError, Result};

/// Default model input width in pixels
pub use dataset::IMAGE_WIDTH;
/// Default model input height in pixels
pub use dataset::IMAGE_HEIGHT;

/// Version of the library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
