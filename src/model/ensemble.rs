//! Inference scoring over one or more trained checkpoints
//!
//! Cross-validation training leaves one best checkpoint per fold; scoring
//! averages their softmax outputs, which is the standard way to get a single
//! prediction out of a k-fold run.

use std::path::Path;

use burn::module::Module;
use burn::record::CompactRecorder;
use burn::tensor::{backend::Backend, Tensor};

use super::cnn::MaskClassifier;
use super::config::ModelConfig;
use crate::utils::error::{MaskVisionError, Result};

/// Prediction scorer over a single model or a fold ensemble
pub enum Scorer<B: Backend> {
    Single(MaskClassifier<B>),
    Ensemble(Vec<MaskClassifier<B>>),
}

impl<B: Backend> Scorer<B> {
    /// Load a scorer from checkpoint files
    ///
    /// One path loads a single model, several paths form an ensemble. All
    /// checkpoints must share the given architecture.
    pub fn from_files(paths: &[impl AsRef<Path>], config: &ModelConfig, device: &B::Device) -> Result<Self> {
        if paths.is_empty() {
            return Err(MaskVisionError::Config(
                "at least one checkpoint path is required".to_string(),
            ));
        }

        let mut models = Vec::with_capacity(paths.len());
        for path in paths {
            let path = path.as_ref();
            let model = MaskClassifier::<B>::new(config, device)
                .load_file(path, &CompactRecorder::new(), device)
                .map_err(|e| MaskVisionError::Checkpoint {
                    path: path.to_path_buf(),
                    reason: e.to_string(),
                })?;
            models.push(model);
        }

        Ok(if models.len() == 1 {
            // into_iter().next() on a one-element vec cannot fail
            Self::Single(models.into_iter().next().unwrap())
        } else {
            Self::Ensemble(models)
        })
    }

    /// Number of models backing the scorer
    pub fn len(&self) -> usize {
        match self {
            Self::Single(_) => 1,
            Self::Ensemble(models) => models.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    /// Class probabilities of shape [batch_size, num_classes]
    ///
    /// For ensembles the per-model softmax outputs are averaged, so rows
    /// still sum to one.
    pub fn score(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        match self {
            Self::Single(model) => model.forward_softmax(images),
            Self::Ensemble(models) => {
                let mut sum = models[0].forward_softmax(images.clone());
                for model in &models[1..] {
                    sum = sum + model.forward_softmax(images.clone());
                }
                sum / models.len() as f32
            }
        }
    }

    /// Predicted class index per batch row
    pub fn predict(&self, images: Tensor<B, 4>) -> Vec<usize> {
        let probs = self.score(images);
        let preds = probs.argmax(1).squeeze::<1>(1);
        preds
            .into_data()
            .to_vec::<i64>()
            .unwrap()
            .into_iter()
            .map(|p| p as usize)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type TestBackend = burn::backend::NdArray;

    #[test]
    fn test_empty_paths_rejected() {
        let device = Default::default();
        let config = ModelConfig::lite();
        let paths: Vec<&Path> = vec![];

        assert!(Scorer::<TestBackend>::from_files(&paths, &config, &device).is_err());
    }

    #[test]
    fn test_missing_checkpoint_is_a_checkpoint_error() {
        let device = Default::default();
        let config = ModelConfig::lite();
        let paths = vec![Path::new("/no/such/model.mpk")];

        let err = Scorer::<TestBackend>::from_files(&paths, &config, &device)
            .err()
            .unwrap();
        assert!(matches!(err, MaskVisionError::Checkpoint { .. }));
    }

    #[test]
    fn test_ensemble_scores_are_probabilities() {
        let device = Default::default();
        let config = ModelConfig::lite();
        let models = vec![
            MaskClassifier::<TestBackend>::new(&config, &device),
            MaskClassifier::<TestBackend>::new(&config, &device),
        ];
        let scorer = Scorer::Ensemble(models);
        assert_eq!(scorer.len(), 2);

        let images = Tensor::<TestBackend, 4>::ones([2, 3, 64, 48], &device);
        let probs = scorer.score(images.clone());
        assert_eq!(probs.dims(), [2, 18]);

        let row_sums: Vec<f32> = probs.sum_dim(1).into_data().to_vec().unwrap();
        for sum in row_sums {
            assert!((sum - 1.0).abs() < 1e-4);
        }

        let preds = scorer.predict(images);
        assert_eq!(preds.len(), 2);
        assert!(preds.iter().all(|&p| p < 18));
    }
}
