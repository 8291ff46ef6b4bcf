//! Loss functions
//!
//! Criteria are looked up by key, like models and optimizers. All variants
//! reduce to a scalar loss tensor; `forward_mixed` combines two target sets
//! for CutMix batches.

use burn::nn::loss::CrossEntropyLossConfig;
use burn::tensor::{backend::Backend, Int, Tensor};

use crate::utils::error::{MaskVisionError, Result};

const CRITERION_KEYS: &str = "cross_entropy, label_smoothing, focal";

/// Classification loss
#[derive(Debug, Clone)]
pub enum Criterion {
    /// Plain cross-entropy
    CrossEntropy,
    /// Cross-entropy with label smoothing epsilon
    LabelSmoothing(f32),
    /// Focal loss with the given gamma, down-weights easy examples
    Focal(f32),
}

impl Criterion {
    /// Scalar loss for a batch of logits
    pub fn forward<B: Backend>(
        &self,
        logits: Tensor<B, 2>,
        targets: Tensor<B, 1, Int>,
    ) -> Tensor<B, 1> {
        let device = logits.device();
        match self {
            Self::CrossEntropy => CrossEntropyLossConfig::new()
                .init(&device)
                .forward(logits, targets),
            Self::LabelSmoothing(eps) => CrossEntropyLossConfig::new()
                .with_smoothing(Some(*eps))
                .init(&device)
                .forward(logits, targets),
            Self::Focal(gamma) => focal_loss(logits, targets, *gamma),
        }
    }

    /// Mixed loss for CutMix batches:
    /// `lam * loss(targets_a) + (1 - lam) * loss(targets_b)`
    pub fn forward_mixed<B: Backend>(
        &self,
        logits: Tensor<B, 2>,
        targets_a: Tensor<B, 1, Int>,
        targets_b: Tensor<B, 1, Int>,
        lambda: f32,
    ) -> Tensor<B, 1> {
        let loss_a = self.forward(logits.clone(), targets_a);
        let loss_b = self.forward(logits, targets_b);
        loss_a * lambda + loss_b * (1.0 - lambda)
    }
}

/// Focal loss: `mean((1 - p_t)^gamma * -log(p_t))`
fn focal_loss<B: Backend>(
    logits: Tensor<B, 2>,
    targets: Tensor<B, 1, Int>,
    gamma: f32,
) -> Tensor<B, 1> {
    let [batch_size, _num_classes] = logits.dims();

    let log_probs = burn::tensor::activation::log_softmax(logits, 1);
    let targets_2d = targets.reshape([batch_size, 1]);
    let log_pt = log_probs.gather(1, targets_2d).squeeze::<1>(1);

    let pt = log_pt.clone().exp();
    let focal_weight = (pt.neg() + 1.0).powf_scalar(gamma);

    (focal_weight * log_pt.neg()).mean()
}

/// Look up a loss function by key
pub fn create_criterion(key: &str) -> Result<Criterion> {
    match key {
        "cross_entropy" => Ok(Criterion::CrossEntropy),
        "label_smoothing" => Ok(Criterion::LabelSmoothing(0.1)),
        "focal" => Ok(Criterion::Focal(2.0)),
        other => Err(MaskVisionError::UnknownKey {
            kind: "criterion",
            key: other.to_string(),
            known: CRITERION_KEYS,
        }),
    }
}
