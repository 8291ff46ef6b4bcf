//! Dataset loader for mask-wearing face photos
//!
//! Scans a directory of profile folders, each named
//! `<id>_<gender>_<race>_<age>` (e.g. `000004_male_Asian_54`) and holding the
//! photos of one person. The composite class label is derived from the folder
//! name and the image file stem; the profile ordinal doubles as the group key
//! for grouped cross-validation, so one person never appears on both sides of
//! a split.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use super::label::{self, AgeBucket, Gender, MaskState};
use crate::utils::error::{MaskVisionError, Result};

const IMAGE_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "bmp"];

/// A single image sample with its label and metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaceSample {
    /// Path to the image file
    pub path: PathBuf,
    /// Composite class label (0..18)
    pub label: usize,
    /// Mask state component of the label
    pub mask: MaskState,
    /// Gender component of the label
    pub gender: Gender,
    /// Age bucket component of the label
    pub age: AgeBucket,
    /// Group key: ordinal of the owning profile directory
    pub group: usize,
    /// Profile directory name, kept for diagnostics
    pub profile: String,
}

/// Attributes parsed from a profile directory name
struct Profile {
    gender: Gender,
    age: AgeBucket,
}

fn parse_profile(name: &str) -> Result<Profile> {
    let parts: Vec<&str> = name.split('_').collect();
    if parts.len() != 4 {
        return Err(MaskVisionError::Dataset(format!(
            "Profile directory '{}' does not match <id>_<gender>_<race>_<age>",
            name
        )));
    }

    let gender = Gender::parse(parts[1])?;
    let age: u32 = parts[3].parse().map_err(|_| {
        MaskVisionError::Dataset(format!("Profile directory '{}' has a non-numeric age", name))
    })?;

    Ok(Profile {
        gender,
        age: AgeBucket::from_years(age),
    })
}

/// Mask face dataset scanned from disk
#[derive(Debug)]
pub struct MaskDataset {
    /// Root directory of the dataset
    pub root_dir: PathBuf,
    /// All samples in the dataset
    pub samples: Vec<FaceSample>,
    /// Number of profiles (distinct group keys)
    pub num_profiles: usize,
}

impl MaskDataset {
    /// Scan a dataset directory
    ///
    /// ```text
    /// root_dir/
    /// ├── 000001_female_Asian_45/
    /// │   ├── mask1.jpg .. mask5.jpg
    /// │   ├── incorrect_mask.jpg
    /// │   └── normal.jpg
    /// ├── 000002_male_Asian_52/
    /// │   └── ...
    /// └── ...
    /// ```
    pub fn new<P: AsRef<Path>>(root_dir: P) -> Result<Self> {
        let root_dir = root_dir.as_ref().to_path_buf();
        info!("Loading mask dataset from: {:?}", root_dir);

        if !root_dir.exists() {
            return Err(MaskVisionError::Dataset(format!(
                "Dataset directory does not exist: {:?}",
                root_dir
            )));
        }

        let mut profile_dirs: Vec<String> = Vec::new();
        for entry in std::fs::read_dir(&root_dir)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                if let Some(name) = entry.file_name().to_str() {
                    if !name.starts_with('.') && !name.starts_with('_') {
                        profile_dirs.push(name.to_string());
                    }
                }
            }
        }
        profile_dirs.sort();

        info!("Found {} profile directories", profile_dirs.len());

        let mut samples = Vec::new();
        let mut group: usize = 0;

        for dir_name in &profile_dirs {
            let profile = match parse_profile(dir_name) {
                Ok(p) => p,
                Err(e) => {
                    warn!("Skipping profile directory '{}': {}", dir_name, e);
                    continue;
                }
            };

            let profile_dir = root_dir.join(dir_name);
            let mut added = 0usize;

            for entry in WalkDir::new(&profile_dir)
                .min_depth(1)
                .max_depth(1)
                .sort_by_file_name()
                .into_iter()
                .filter_map(|e| e.ok())
            {
                let path = entry.path().to_path_buf();

                let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                    continue;
                };
                // System artifacts like ._mask1.jpg land next to real photos
                if stem.starts_with('.') || stem.starts_with('_') {
                    continue;
                }

                let is_image = path
                    .extension()
                    .and_then(|e| e.to_str())
                    .map(|e| IMAGE_EXTENSIONS.contains(&e.to_lowercase().as_str()))
                    .unwrap_or(false);
                if !is_image {
                    continue;
                }

                let mask = match MaskState::from_file_stem(stem) {
                    Ok(m) => m,
                    Err(e) => {
                        warn!("Skipping {:?}: {}", path, e);
                        continue;
                    }
                };

                samples.push(FaceSample {
                    path,
                    label: label::encode(mask, profile.gender, profile.age),
                    mask,
                    gender: profile.gender,
                    age: profile.age,
                    group,
                    profile: dir_name.clone(),
                });
                added += 1;
            }

            debug!("Profile '{}' (group {}): {} images", dir_name, group, added);
            group += 1;
        }

        if samples.is_empty() {
            return Err(MaskVisionError::Dataset(format!(
                "No usable samples found under {:?}",
                root_dir
            )));
        }

        info!("Loaded {} total samples", samples.len());

        Ok(Self {
            root_dir,
            samples,
            num_profiles: group,
        })
    }

    /// Get the number of samples in the dataset
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Check if the dataset is empty
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Composite labels of all samples, in sample order
    pub fn labels(&self) -> Vec<usize> {
        self.samples.iter().map(|s| s.label).collect()
    }

    /// Group keys of all samples, in sample order
    pub fn groups(&self) -> Vec<usize> {
        self.samples.iter().map(|s| s.group).collect()
    }

    /// (path, label) pairs for a subset of sample indices
    pub fn subset(&self, indices: &[usize]) -> Vec<(PathBuf, usize)> {
        indices
            .iter()
            .map(|&i| (self.samples[i].path.clone(), self.samples[i].label))
            .collect()
    }

    /// Get statistics about the dataset
    pub fn stats(&self) -> DatasetStats {
        let mut class_counts = vec![0usize; label::NUM_CLASSES];
        for sample in &self.samples {
            class_counts[sample.label] += 1;
        }

        DatasetStats {
            total_samples: self.samples.len(),
            num_profiles: self.num_profiles,
            class_counts,
        }
    }
}

/// Statistics about the dataset
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetStats {
    pub total_samples: usize,
    pub num_profiles: usize,
    pub class_counts: Vec<usize>,
}

impl DatasetStats {
    /// Print statistics to console
    pub fn print(&self) {
        println!("\nDataset Statistics:");
        println!("  Total samples: {}", self.total_samples);
        println!("  Profiles: {}", self.num_profiles);
        println!("\n  Samples per class:");

        for (idx, count) in self.class_counts.iter().enumerate() {
            let bar_len = (*count as f32 / self.total_samples.max(1) as f32 * 40.0) as usize;
            let bar: String = "█".repeat(bar_len);
            println!(
                "    {:2}. {:24} {:5} {}",
                idx,
                label::class_name(idx),
                count,
                bar
            );
        }
    }

    /// Per-class counts as a map keyed by class name
    pub fn by_class_name(&self) -> HashMap<String, usize> {
        self.class_counts
            .iter()
            .enumerate()
            .map(|(idx, &count)| (label::class_name(idx), count))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_profile(root: &Path, name: &str, files: &[&str]) {
        let dir = root.join(name);
        fs::create_dir_all(&dir).unwrap();
        for file in files {
            // The scanner never decodes, any bytes will do
            fs::write(dir.join(file), b"not-a-real-image").unwrap();
        }
    }

    #[test]
    fn test_scan_derives_labels_and_groups() {
        let tmp = tempfile::tempdir().unwrap();
        write_profile(
            tmp.path(),
            "000001_female_Asian_45",
            &["mask1.jpg", "incorrect_mask.jpg", "normal.jpg"],
        );
        write_profile(tmp.path(), "000002_male_Asian_27", &["mask1.jpg", "normal.jpg"]);

        let dataset = MaskDataset::new(tmp.path()).unwrap();
        assert_eq!(dataset.len(), 5);
        assert_eq!(dataset.num_profiles, 2);

        // Profile ordering is lexicographic, so group 0 is the female profile.
        let female_mask = &dataset.samples[1]; // incorrect sorts before mask1
        assert_eq!(female_mask.group, 0);

        let by_name: Vec<_> = dataset
            .samples
            .iter()
            .filter(|s| s.profile == "000002_male_Asian_27")
            .collect();
        assert_eq!(by_name.len(), 2);
        for sample in by_name {
            assert_eq!(sample.group, 1);
            assert_eq!(sample.gender, Gender::Male);
            assert_eq!(sample.age, AgeBucket::Young);
        }
    }

    #[test]
    fn test_scan_skips_hidden_and_unparseable() {
        let tmp = tempfile::tempdir().unwrap();
        write_profile(
            tmp.path(),
            "000003_male_Asian_60",
            &["mask1.jpg", "._mask1.jpg", "notes.txt"],
        );
        write_profile(tmp.path(), "garbage-folder", &["mask1.jpg"]);

        let dataset = MaskDataset::new(tmp.path()).unwrap();
        assert_eq!(dataset.len(), 1);
        assert_eq!(dataset.samples[0].age, AgeBucket::Old);
    }

    #[test]
    fn test_empty_scan_is_fatal() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(MaskDataset::new(tmp.path()).is_err());
    }

    #[test]
    fn test_missing_directory_is_fatal() {
        assert!(MaskDataset::new("/definitely/not/here").is_err());
    }
}
