//! Burn dataset and batcher integration
//!
//! Implements Burn's `Dataset` trait over a subset of loader samples and a
//! `Batcher` that assembles normalized image tensors. Images are loaded
//! lazily; an unreadable file yields `None` from `get` and is skipped at
//! batch assembly with a warning, so a corrupt image never aborts a run.

use std::path::PathBuf;

use burn::data::dataloader::batcher::Batcher;
use burn::data::dataset::Dataset;
use burn::tensor::{backend::Backend, Int, Tensor, TensorData};
use image::{DynamicImage, ImageReader};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::augmentation::Augmenter;
use crate::utils::derive_seed;

/// Per-channel normalization mean, computed over the face photo corpus
pub const NORM_MEAN: [f32; 3] = [0.548, 0.504, 0.479];
/// Per-channel normalization std, computed over the face photo corpus
pub const NORM_STD: [f32; 3] = [0.237, 0.247, 0.246];

/// A single face image ready for batching
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MaskItem {
    /// Image data as flattened CHW float array [3 * H * W], range [0, 1]
    pub image: Vec<f32>,
    /// Composite class label (0..18)
    pub label: usize,
}

impl MaskItem {
    /// Convert a decoded (and already resized) image into CHW float data
    pub fn from_image(img: &DynamicImage, label: usize) -> Self {
        let rgb = img.to_rgb8();
        let (width, height) = (rgb.width() as usize, rgb.height() as usize);
        let mut image = vec![0.0f32; 3 * height * width];

        for y in 0..height {
            for x in 0..width {
                let pixel = rgb.get_pixel(x as u32, y as u32);
                image[y * width + x] = pixel[0] as f32 / 255.0;
                image[height * width + y * width + x] = pixel[1] as f32 / 255.0;
                image[2 * height * width + y * width + x] = pixel[2] as f32 / 255.0;
            }
        }

        Self { image, label }
    }
}

/// Face image dataset over a subset of loader samples
///
/// Carries an augmentation pipeline; validation sets use the resize-only
/// `base` pipeline. Augmentation randomness is derived from
/// (seed, epoch, index), so epochs differ while runs with the same seed are
/// identical.
#[derive(Debug, Clone)]
pub struct MaskImageDataset {
    /// (image_path, label) pairs
    samples: Vec<(PathBuf, usize)>,
    augmenter: Augmenter,
    seed: u64,
    epoch: u64,
}

impl MaskImageDataset {
    /// Create a dataset from (path, label) pairs
    pub fn new(samples: Vec<(PathBuf, usize)>, augmenter: Augmenter, seed: u64) -> Self {
        Self {
            samples,
            augmenter,
            seed,
            epoch: 0,
        }
    }

    /// Advance the augmentation salt; called once per training epoch
    pub fn set_epoch(&mut self, epoch: usize) {
        self.epoch = epoch as u64;
    }

    /// Labels in sample order
    pub fn labels(&self) -> Vec<usize> {
        self.samples.iter().map(|(_, label)| *label).collect()
    }

    /// Samples per class count
    pub fn class_distribution(&self, num_classes: usize) -> Vec<usize> {
        let mut counts = vec![0usize; num_classes];
        for (_, label) in &self.samples {
            if *label < num_classes {
                counts[*label] += 1;
            }
        }
        counts
    }
}

impl Dataset<MaskItem> for MaskImageDataset {
    fn get(&self, index: usize) -> Option<MaskItem> {
        let (path, label) = self.samples.get(index)?;

        let img = match ImageReader::open(path).and_then(|r| {
            r.decode()
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
        }) {
            Ok(img) => img,
            Err(e) => {
                warn!("Skipping unreadable image {:?}: {}", path, e);
                return None;
            }
        };

        let mut rng =
            ChaCha8Rng::seed_from_u64(derive_seed(self.seed, (self.epoch << 32) | index as u64));
        let img = self.augmenter.apply(img, &mut rng);

        Some(MaskItem::from_image(&img, *label))
    }

    fn len(&self) -> usize {
        self.samples.len()
    }
}

/// A batch of face images for training or validation
#[derive(Clone, Debug)]
pub struct MaskBatch<B: Backend> {
    /// Images with shape [batch_size, 3, height, width]
    pub images: Tensor<B, 4>,
    /// Labels with shape [batch_size]
    pub targets: Tensor<B, 1, Int>,
}

/// Batcher assembling normalized image tensors
#[derive(Clone, Debug)]
pub struct MaskBatcher<B: Backend> {
    device: B::Device,
    width: usize,
    height: usize,
}

impl<B: Backend> MaskBatcher<B> {
    /// Create a batcher for the given device and image size
    pub fn new(device: B::Device, width: usize, height: usize) -> Self {
        Self {
            device,
            width,
            height,
        }
    }

    pub(crate) fn image_tensor(&self, items: &[MaskItem]) -> Tensor<B, 4> {
        let batch_size = items.len();
        let images_data: Vec<f32> = items.iter().flat_map(|item| item.image.clone()).collect();

        let images = Tensor::<B, 4>::from_floats(
            TensorData::new(images_data, [batch_size, 3, self.height, self.width]),
            &self.device,
        );

        // Normalize: (x - mean) / std
        let mean = Tensor::<B, 4>::from_floats(
            TensorData::new(NORM_MEAN.to_vec(), [1, 3, 1, 1]),
            &self.device,
        );
        let std = Tensor::<B, 4>::from_floats(
            TensorData::new(NORM_STD.to_vec(), [1, 3, 1, 1]),
            &self.device,
        );

        (images - mean) / std
    }

    pub(crate) fn target_tensor(&self, labels: &[usize]) -> Tensor<B, 1, Int> {
        let targets_data: Vec<i64> = labels.iter().map(|&l| l as i64).collect();
        Tensor::<B, 1, Int>::from_data(
            TensorData::new(targets_data, [labels.len()]),
            &self.device,
        )
    }
}

impl<B: Backend> Batcher<MaskItem, MaskBatch<B>> for MaskBatcher<B> {
    fn batch(&self, items: Vec<MaskItem>) -> MaskBatch<B> {
        let images = self.image_tensor(&items);
        let labels: Vec<usize> = items.iter().map(|item| item.label).collect();
        let targets = self.target_tensor(&labels);

        MaskBatch { images, targets }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::augmentation::create_augmenter;

    type TestBackend = burn::backend::NdArray;

    fn flat_image(value: u8, width: u32, height: u32) -> DynamicImage {
        let buf = image::RgbImage::from_pixel(width, height, image::Rgb([value, value, value]));
        DynamicImage::ImageRgb8(buf)
    }

    #[test]
    fn test_item_is_chw_normalized_to_unit_range() {
        let item = MaskItem::from_image(&flat_image(255, 4, 2), 3);

        assert_eq!(item.label, 3);
        assert_eq!(item.image.len(), 3 * 2 * 4);
        assert!(item.image.iter().all(|&v| (v - 1.0).abs() < 1e-6));
    }

    #[test]
    fn test_batcher_shapes_and_normalization() {
        let device = Default::default();
        let batcher = MaskBatcher::<TestBackend>::new(device, 4, 2);

        let items = vec![
            MaskItem::from_image(&flat_image(0, 4, 2), 0),
            MaskItem::from_image(&flat_image(255, 4, 2), 17),
        ];
        let batch = batcher.batch(items);

        assert_eq!(batch.images.dims(), [2, 3, 2, 4]);
        assert_eq!(batch.targets.dims(), [2]);

        let data: Vec<f32> = batch.images.into_data().to_vec().unwrap();
        // First item is all zeros: channel 0 normalizes to (0 - mean) / std
        let expected = (0.0 - NORM_MEAN[0]) / NORM_STD[0];
        assert!((data[0] - expected).abs() < 1e-5);

        let targets: Vec<i64> = batch.targets.into_data().to_vec().unwrap();
        assert_eq!(targets, vec![0, 17]);
    }

    #[test]
    fn test_dataset_missing_file_yields_none() {
        let aug = create_augmenter("base", 4, 2).unwrap();
        let dataset = MaskImageDataset::new(
            vec![(PathBuf::from("/no/such/image.jpg"), 0)],
            aug,
            42,
        );

        assert_eq!(dataset.len(), 1);
        assert!(dataset.get(0).is_none());
        assert!(dataset.get(99).is_none());
    }

    #[test]
    fn test_dataset_loads_and_resizes() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("normal.png");
        flat_image(128, 10, 10).save(&path).unwrap();

        let aug = create_augmenter("base", 4, 2).unwrap();
        let dataset = MaskImageDataset::new(vec![(path, 5)], aug, 42);

        let item = dataset.get(0).unwrap();
        assert_eq!(item.label, 5);
        assert_eq!(item.image.len(), 3 * 2 * 4);
    }

    #[test]
    fn test_class_distribution() {
        let aug = create_augmenter("base", 4, 2).unwrap();
        let dataset = MaskImageDataset::new(
            vec![
                (PathBuf::from("a.jpg"), 0),
                (PathBuf::from("b.jpg"), 0),
                (PathBuf::from("c.jpg"), 2),
            ],
            aug,
            42,
        );

        assert_eq!(dataset.class_distribution(3), vec![2, 0, 1]);
    }
}
