//! Dataset loading, labeling, splitting and augmentation
//!
//! The pipeline goes disk scan ([`MaskDataset`]) -> fold planning
//! ([`FoldPlanner`] or [`holdout`]) -> lazy image dataset
//! ([`MaskImageDataset`]) -> tensor batches ([`MaskBatcher`], with
//! [`CutMixBatcher`] as the mixing variant).

pub mod augmentation;
pub mod batch;
pub mod cutmix;
pub mod label;
pub mod loader;
pub mod split;

pub use augmentation::{create_augmenter, Augmenter};
pub use batch::{MaskBatch, MaskBatcher, MaskImageDataset, MaskItem, NORM_MEAN, NORM_STD};
pub use cutmix::{CutMix, CutMixBatch, CutMixBatcher};
pub use label::{AgeBucket, Gender, MaskState, NUM_CLASSES};
pub use loader::{DatasetStats, FaceSample, MaskDataset};
pub use split::{holdout, Fold, FoldMode, FoldPlanner};

/// Default model input width in pixels
pub const IMAGE_WIDTH: usize = 96;
/// Default model input height in pixels
pub const IMAGE_HEIGHT: usize = 128;
