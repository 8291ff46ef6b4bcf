//! Data augmentation pipelines
//!
//! Augmenters are looked up by key (fail fast on unknown keys) and applied
//! per image with a caller-provided RNG, so augmentation is reproducible
//! under the run seed.

use image::imageops::FilterType;
use image::{DynamicImage, Rgb};
use rand::Rng;
use rand_chacha::ChaCha8Rng;

use crate::utils::error::{MaskVisionError, Result};

const AUGMENTER_KEYS: &str = "base, custom";

/// Image augmentation pipeline
///
/// All augmenters end with a resize to the target size, so the output shape
/// is fixed regardless of the source image.
#[derive(Debug, Clone)]
pub struct Augmenter {
    /// Output width in pixels
    width: u32,
    /// Output height in pixels
    height: u32,
    /// Optional center crop (width, height) applied before resizing
    center_crop: Option<(u32, u32)>,
    /// Probability of a horizontal flip
    hflip_prob: f64,
    /// Max absolute brightness shift (0..255 scale)
    brightness_jitter: i32,
    /// Max absolute per-channel pixel jitter (0..255 scale)
    noise_amplitude: i32,
}

impl Augmenter {
    /// Resize-only pipeline
    pub fn base(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            center_crop: None,
            hflip_prob: 0.0,
            brightness_jitter: 0,
            noise_amplitude: 0,
        }
    }

    /// Heavier pipeline: center crop, flip, brightness and pixel jitter
    pub fn custom(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            center_crop: Some((320, 240)),
            hflip_prob: 0.5,
            brightness_jitter: 20,
            noise_amplitude: 8,
        }
    }

    /// Apply the pipeline to one image
    pub fn apply(&self, img: DynamicImage, rng: &mut ChaCha8Rng) -> DynamicImage {
        let mut img = img;

        if let Some((cw, ch)) = self.center_crop {
            if img.width() > cw && img.height() > ch {
                let x = (img.width() - cw) / 2;
                let y = (img.height() - ch) / 2;
                img = img.crop_imm(x, y, cw, ch);
            }
        }

        let mut img = img.resize_exact(self.width, self.height, FilterType::Triangle);

        if self.hflip_prob > 0.0 && rng.gen_bool(self.hflip_prob) {
            img = img.fliph();
        }

        if self.brightness_jitter > 0 {
            let delta = rng.gen_range(-self.brightness_jitter..=self.brightness_jitter);
            img = img.brighten(delta);
        }

        if self.noise_amplitude > 0 {
            let mut rgb = img.to_rgb8();
            for pixel in rgb.pixels_mut() {
                let jitter = |v: u8, rng: &mut ChaCha8Rng| -> u8 {
                    let delta = rng.gen_range(-self.noise_amplitude..=self.noise_amplitude);
                    (v as i32 + delta).clamp(0, 255) as u8
                };
                *pixel = Rgb([
                    jitter(pixel[0], rng),
                    jitter(pixel[1], rng),
                    jitter(pixel[2], rng),
                ]);
            }
            img = DynamicImage::ImageRgb8(rgb);
        }

        img
    }

    pub fn output_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

/// Look up an augmentation pipeline by key
pub fn create_augmenter(key: &str, width: u32, height: u32) -> Result<Augmenter> {
    match key {
        "base" => Ok(Augmenter::base(width, height)),
        "custom" => Ok(Augmenter::custom(width, height)),
        other => Err(MaskVisionError::UnknownKey {
            kind: "augmentation",
            key: other.to_string(),
            known: AUGMENTER_KEYS,
        }),
    }
}
