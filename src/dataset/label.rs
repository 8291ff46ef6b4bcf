//! Composite label encoding for mask-wearing face photos
//!
//! A sample's class combines three attributes: mask state, gender, and age
//! bucket. The 18 composite classes are encoded as
//! `mask * 6 + gender * 3 + age_bucket`.

use serde::{Deserialize, Serialize};

use crate::utils::error::{MaskVisionError, Result};

/// Number of composite classes (3 mask states x 2 genders x 3 age buckets)
pub const NUM_CLASSES: usize = 18;

/// Whether and how a mask is worn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MaskState {
    /// Mask worn correctly
    Wear = 0,
    /// Mask present but worn incorrectly (nose or chin exposed)
    Incorrect = 1,
    /// No mask
    NotWear = 2,
}

impl MaskState {
    /// Derive the mask state from an image file stem
    ///
    /// Profile directories contain files like `mask1.jpg` .. `mask5.jpg`,
    /// `incorrect_mask.jpg` and `normal.jpg`.
    pub fn from_file_stem(stem: &str) -> Result<Self> {
        if stem.starts_with("incorrect") {
            Ok(Self::Incorrect)
        } else if stem.starts_with("mask") {
            Ok(Self::Wear)
        } else if stem.starts_with("normal") {
            Ok(Self::NotWear)
        } else {
            Err(MaskVisionError::Dataset(format!(
                "Unrecognized image file stem '{}'",
                stem
            )))
        }
    }
}

/// Gender as recorded in the profile directory name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Gender {
    Male = 0,
    Female = 1,
}

impl Gender {
    pub fn parse(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "male" => Ok(Self::Male),
            "female" => Ok(Self::Female),
            other => Err(MaskVisionError::Dataset(format!(
                "Unrecognized gender '{}' in profile name",
                other
            ))),
        }
    }
}

/// Age bucket derived from the recorded age in years
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AgeBucket {
    /// Under 30
    Young = 0,
    /// 30 to 59
    Middle = 1,
    /// 60 and over
    Old = 2,
}

impl AgeBucket {
    pub fn from_years(age: u32) -> Self {
        if age < 30 {
            Self::Young
        } else if age < 60 {
            Self::Middle
        } else {
            Self::Old
        }
    }
}

/// Encode the three attributes into a composite class label (0..18)
pub fn encode(mask: MaskState, gender: Gender, age: AgeBucket) -> usize {
    mask as usize * 6 + gender as usize * 3 + age as usize
}

/// Decode a composite class label back into its attributes
pub fn decode(label: usize) -> Result<(MaskState, Gender, AgeBucket)> {
    if label >= NUM_CLASSES {
        return Err(MaskVisionError::Dataset(format!(
            "Label {} out of range (0..{})",
            label, NUM_CLASSES
        )));
    }

    let mask = match label / 6 {
        0 => MaskState::Wear,
        1 => MaskState::Incorrect,
        _ => MaskState::NotWear,
    };
    let gender = if (label % 6) / 3 == 0 {
        Gender::Male
    } else {
        Gender::Female
    };
    let age = match label % 3 {
        0 => AgeBucket::Young,
        1 => AgeBucket::Middle,
        _ => AgeBucket::Old,
    };

    Ok((mask, gender, age))
}

/// Human-readable name for a composite class, e.g. `wear_male_young`
pub fn class_name(label: usize) -> String {
    match decode(label) {
        Ok((mask, gender, age)) => {
            let mask = match mask {
                MaskState::Wear => "wear",
                MaskState::Incorrect => "incorrect",
                MaskState::NotWear => "normal",
            };
            let gender = match gender {
                Gender::Male => "male",
                Gender::Female => "female",
            };
            let age = match age {
                AgeBucket::Young => "young",
                AgeBucket::Middle => "middle",
                AgeBucket::Old => "old",
            };
            format!("{}_{}_{}", mask, gender, age)
        }
        Err(_) => "unknown".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_covers_all_classes() {
        let mut seen = vec![false; NUM_CLASSES];
        for mask in [MaskState::Wear, MaskState::Incorrect, MaskState::NotWear] {
            for gender in [Gender::Male, Gender::Female] {
                for age in [AgeBucket::Young, AgeBucket::Middle, AgeBucket::Old] {
                    let label = encode(mask, gender, age);
                    assert!(label < NUM_CLASSES);
                    assert!(!seen[label], "duplicate label {}", label);
                    seen[label] = true;
                }
            }
        }
        assert!(seen.iter().all(|&s| s));
    }

    #[test]
    fn test_decode_round_trips() {
        for label in 0..NUM_CLASSES {
            let (mask, gender, age) = decode(label).unwrap();
            assert_eq!(encode(mask, gender, age), label);
        }
        assert!(decode(NUM_CLASSES).is_err());
    }

    #[test]
    fn test_mask_state_from_file_stem() {
        assert_eq!(MaskState::from_file_stem("mask3").unwrap(), MaskState::Wear);
        assert_eq!(
            MaskState::from_file_stem("incorrect_mask").unwrap(),
            MaskState::Incorrect
        );
        assert_eq!(
            MaskState::from_file_stem("normal").unwrap(),
            MaskState::NotWear
        );
        assert!(MaskState::from_file_stem("selfie").is_err());
    }

    #[test]
    fn test_age_bucket_boundaries() {
        assert_eq!(AgeBucket::from_years(29), AgeBucket::Young);
        assert_eq!(AgeBucket::from_years(30), AgeBucket::Middle);
        assert_eq!(AgeBucket::from_years(59), AgeBucket::Middle);
        assert_eq!(AgeBucket::from_years(60), AgeBucket::Old);
    }

    #[test]
    fn test_class_name() {
        let label = encode(MaskState::Wear, Gender::Male, AgeBucket::Young);
        assert_eq!(class_name(label), "wear_male_young");
        let label = encode(MaskState::NotWear, Gender::Female, AgeBucket::Old);
        assert_eq!(class_name(label), "normal_female_old");
    }
}
