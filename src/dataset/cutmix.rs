//! CutMix batch augmentation
//!
//! For each training batch a single mixing coefficient is drawn from
//! Beta(1, 1) (uniform), a rectangle with area ratio `1 - lambda` is cut out
//! of every image and filled with the corresponding region of a randomly
//! chosen partner image. The coefficient is then corrected to the exact
//! uncut-area ratio and the loss mixes both targets:
//! `lam * loss(targets_a) + (1 - lam) * loss(targets_b)`.

use burn::tensor::{backend::Backend, Int, Tensor};
use rand::seq::SliceRandom;
use rand::Rng;
use rand_chacha::ChaCha8Rng;

use super::batch::{MaskBatcher, MaskItem};

/// Targets produced by mixing one batch
#[derive(Debug, Clone)]
pub struct MixedTargets {
    /// Original labels
    pub targets_a: Vec<usize>,
    /// Partner labels
    pub targets_b: Vec<usize>,
    /// Mixing coefficient after area correction
    pub lambda: f32,
}

/// CutMix operator over CHW float images of a fixed size
#[derive(Debug, Clone)]
pub struct CutMix {
    width: usize,
    height: usize,
}

impl CutMix {
    pub fn new(width: usize, height: usize) -> Self {
        Self { width, height }
    }

    /// Mix a batch of items in place and return the target bookkeeping.
    ///
    /// Batches with fewer than two items are left untouched (lambda = 1).
    pub fn apply(&self, items: &mut [MaskItem], rng: &mut ChaCha8Rng) -> MixedTargets {
        let n = items.len();
        let targets_a: Vec<usize> = items.iter().map(|it| it.label).collect();

        if n < 2 {
            return MixedTargets {
                targets_b: targets_a.clone(),
                targets_a,
                lambda: 1.0,
            };
        }

        let mut partner: Vec<usize> = (0..n).collect();
        partner.shuffle(rng);

        let lambda: f64 = rng.gen();
        let (x1, y1, x2, y2) = self.rand_bbox(lambda, rng);

        let originals: Vec<Vec<f32>> = items.iter().map(|it| it.image.clone()).collect();
        let (w, h) = (self.width, self.height);

        for (i, item) in items.iter_mut().enumerate() {
            let src = &originals[partner[i]];
            for c in 0..3 {
                for y in y1..y2 {
                    let row = c * h * w + y * w;
                    item.image[row + x1..row + x2].copy_from_slice(&src[row + x1..row + x2]);
                }
            }
        }

        // Correct lambda to the exact uncut-area ratio
        let cut_area = (x2 - x1) * (y2 - y1);
        let lambda = 1.0 - cut_area as f32 / (w * h) as f32;

        MixedTargets {
            targets_b: partner.iter().map(|&p| targets_a[p]).collect(),
            targets_a,
            lambda,
        }
    }

    /// Rectangle with side ratio sqrt(1 - lambda), centered at a random
    /// point and clamped to the image bounds
    fn rand_bbox(&self, lambda: f64, rng: &mut ChaCha8Rng) -> (usize, usize, usize, usize) {
        let cut_ratio = (1.0 - lambda).sqrt();
        let cut_w = (self.width as f64 * cut_ratio) as usize;
        let cut_h = (self.height as f64 * cut_ratio) as usize;

        let cx = rng.gen_range(0..self.width);
        let cy = rng.gen_range(0..self.height);

        let x1 = cx.saturating_sub(cut_w / 2);
        let y1 = cy.saturating_sub(cut_h / 2);
        let x2 = (cx + cut_w / 2).min(self.width);
        let y2 = (cy + cut_h / 2).min(self.height);

        (x1, y1, x2, y2)
    }
}

/// A mixed batch ready for the mixed loss
#[derive(Clone, Debug)]
pub struct CutMixBatch<B: Backend> {
    /// Mixed images with shape [batch_size, 3, height, width]
    pub images: Tensor<B, 4>,
    /// Original labels with shape [batch_size]
    pub targets_a: Tensor<B, 1, Int>,
    /// Partner labels with shape [batch_size]
    pub targets_b: Tensor<B, 1, Int>,
    /// Mixing coefficient after area correction
    pub lambda: f32,
}

/// Batcher wrapping [`MaskBatcher`] with CutMix mixing
#[derive(Clone, Debug)]
pub struct CutMixBatcher<B: Backend> {
    inner: MaskBatcher<B>,
    cutmix: CutMix,
}

impl<B: Backend> CutMixBatcher<B> {
    pub fn new(device: B::Device, width: usize, height: usize) -> Self {
        Self {
            inner: MaskBatcher::new(device, width, height),
            cutmix: CutMix::new(width, height),
        }
    }

    /// Mix the items and assemble tensors; not the plain `Batcher` trait
    /// because mixing needs the run RNG
    pub fn mix_batch(&self, mut items: Vec<MaskItem>, rng: &mut ChaCha8Rng) -> CutMixBatch<B> {
        let mixed = self.cutmix.apply(&mut items, rng);

        CutMixBatch {
            images: self.inner.image_tensor(&items),
            targets_a: self.inner.target_tensor(&mixed.targets_a),
            targets_b: self.inner.target_tensor(&mixed.targets_b),
            lambda: mixed.lambda,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn flat_item(value: f32, label: usize, w: usize, h: usize) -> MaskItem {
        MaskItem {
            image: vec![value; 3 * w * h],
            label,
        }
    }

    #[test]
    fn test_single_item_batch_is_untouched() {
        let cutmix = CutMix::new(4, 4);
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let mut items = vec![flat_item(0.5, 1, 4, 4)];

        let mixed = cutmix.apply(&mut items, &mut rng);

        assert_eq!(mixed.lambda, 1.0);
        assert_eq!(mixed.targets_a, mixed.targets_b);
        assert!(items[0].image.iter().all(|&v| v == 0.5));
    }

    #[test]
    fn test_lambda_matches_uncut_area() {
        let (w, h) = (8, 8);
        let cutmix = CutMix::new(w, h);
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let mut items = vec![flat_item(0.0, 0, w, h), flat_item(1.0, 1, w, h)];

        let mixed = cutmix.apply(&mut items, &mut rng);

        // Count pixels in item 0 that came from a partner image
        let plane = &items[0].image[..w * h];
        let foreign = plane.iter().filter(|&&v| v != 0.0).count();
        let own = plane.len() - foreign;
        let expected_lambda = own as f32 / (w * h) as f32;

        // The partner permutation may map an item onto itself, in which case
        // the pasted region is indistinguishable; only check when it moved.
        if mixed.targets_b[0] != mixed.targets_a[0] {
            assert!((mixed.lambda - expected_lambda).abs() < 1e-6);
        }
        assert!((0.0..=1.0).contains(&mixed.lambda));
    }

    #[test]
    fn test_mixing_is_deterministic_under_seed() {
        let cutmix = CutMix::new(8, 8);

        let run = |seed: u64| {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let mut items = vec![
                flat_item(0.0, 0, 8, 8),
                flat_item(0.5, 1, 8, 8),
                flat_item(1.0, 2, 8, 8),
            ];
            let mixed = cutmix.apply(&mut items, &mut rng);
            (mixed.lambda, mixed.targets_b, items[0].image.clone())
        };

        assert_eq!(run(7), run(7));
    }

    #[test]
    fn test_cutmix_batcher_shapes() {
        type TestBackend = burn::backend::NdArray;

        let device = Default::default();
        let batcher = CutMixBatcher::<TestBackend>::new(device, 4, 4);
        let mut rng = ChaCha8Rng::seed_from_u64(1);

        let items = vec![flat_item(0.2, 3, 4, 4), flat_item(0.8, 9, 4, 4)];
        let batch = batcher.mix_batch(items, &mut rng);

        assert_eq!(batch.images.dims(), [2, 3, 4, 4]);
        assert_eq!(batch.targets_a.dims(), [2]);
        assert_eq!(batch.targets_b.dims(), [2]);
        assert!((0.0..=1.0).contains(&batch.lambda));
    }
}
