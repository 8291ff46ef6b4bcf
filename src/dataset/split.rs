//! Fold planning for cross-validation
//!
//! Three k-fold strategies plus a plain hold-out split, all deterministic
//! under a seed:
//! - `k`: plain k-fold over shuffled indices
//! - `s`: stratified k-fold, per-class counts per fold differ by at most one
//! - `g`: grouped k-fold, a group key (one key per person) never straddles
//!   folds, so the same face cannot leak into both train and validation

use std::collections::BTreeMap;

use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::utils::error::{MaskVisionError, Result};

/// Cross-validation split strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FoldMode {
    /// Plain k-fold
    KFold,
    /// Stratified k-fold (class balance per fold)
    Stratified,
    /// Grouped k-fold (group keys never straddle folds)
    Grouped,
}

impl FoldMode {
    /// Parse the CLI mode key (`k`, `s`, `g`)
    pub fn parse(key: &str) -> Result<Self> {
        match key {
            "k" => Ok(Self::KFold),
            "s" => Ok(Self::Stratified),
            "g" => Ok(Self::Grouped),
            other => Err(MaskVisionError::UnknownKey {
                kind: "fold mode",
                key: other.to_string(),
                known: "k, s, g",
            }),
        }
    }
}

/// One cross-validation fold
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fold {
    /// Fold index (0-based)
    pub index: usize,
    /// Sample indices used for training
    pub train_indices: Vec<usize>,
    /// Sample indices used for validation
    pub val_indices: Vec<usize>,
}

/// Deterministic fold planner
#[derive(Debug, Clone)]
pub struct FoldPlanner {
    mode: FoldMode,
    num_folds: usize,
    seed: u64,
}

impl FoldPlanner {
    /// Create a planner; fewer than two folds is a configuration error
    pub fn new(mode: FoldMode, num_folds: usize, seed: u64) -> Result<Self> {
        if num_folds < 2 {
            return Err(MaskVisionError::InvalidFoldCount(num_folds));
        }
        Ok(Self {
            mode,
            num_folds,
            seed,
        })
    }

    pub fn mode(&self) -> FoldMode {
        self.mode
    }

    pub fn num_folds(&self) -> usize {
        self.num_folds
    }

    /// Plan the folds for a dataset described by per-sample labels and groups.
    ///
    /// Planning is idempotent: the same inputs and seed always yield the same
    /// folds, call after call.
    pub fn plan(&self, labels: &[usize], groups: &[usize]) -> Result<Vec<Fold>> {
        let n = labels.len();
        if n < self.num_folds {
            return Err(MaskVisionError::Dataset(format!(
                "Cannot split {} samples into {} folds",
                n, self.num_folds
            )));
        }
        if groups.len() != n {
            return Err(MaskVisionError::Dataset(format!(
                "Labels ({}) and groups ({}) disagree in length",
                n,
                groups.len()
            )));
        }

        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);

        let assignment = match self.mode {
            FoldMode::KFold => self.assign_kfold(n, &mut rng),
            FoldMode::Stratified => self.assign_stratified(labels, &mut rng),
            FoldMode::Grouped => self.assign_grouped(groups)?,
        };

        let mut folds: Vec<Fold> = (0..self.num_folds)
            .map(|index| Fold {
                index,
                train_indices: Vec::new(),
                val_indices: Vec::new(),
            })
            .collect();

        for (sample, &fold_id) in assignment.iter().enumerate() {
            for fold in folds.iter_mut() {
                if fold.index == fold_id {
                    fold.val_indices.push(sample);
                } else {
                    fold.train_indices.push(sample);
                }
            }
        }

        Ok(folds)
    }

    /// Round-robin deal over shuffled indices; fold sizes differ by at most 1
    fn assign_kfold(&self, n: usize, rng: &mut ChaCha8Rng) -> Vec<usize> {
        let mut order: Vec<usize> = (0..n).collect();
        order.shuffle(rng);

        let mut assignment = vec![0usize; n];
        for (position, &sample) in order.iter().enumerate() {
            assignment[sample] = position % self.num_folds;
        }
        assignment
    }

    /// Per-class shuffle then round-robin deal, keeping class balance per fold
    fn assign_stratified(&self, labels: &[usize], rng: &mut ChaCha8Rng) -> Vec<usize> {
        let mut by_class: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        for (sample, &label) in labels.iter().enumerate() {
            by_class.entry(label).or_default().push(sample);
        }

        let mut assignment = vec![0usize; labels.len()];
        for (_, class_samples) in by_class.iter_mut() {
            class_samples.shuffle(rng);
            for (position, &sample) in class_samples.iter().enumerate() {
                assignment[sample] = position % self.num_folds;
            }
        }
        assignment
    }

    /// Greedy bin packing: largest group first into the currently smallest fold
    fn assign_grouped(&self, groups: &[usize]) -> Result<Vec<usize>> {
        let mut by_group: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        for (sample, &group) in groups.iter().enumerate() {
            by_group.entry(group).or_default().push(sample);
        }

        if by_group.len() < self.num_folds {
            return Err(MaskVisionError::Dataset(format!(
                "Only {} distinct groups for {} folds",
                by_group.len(),
                self.num_folds
            )));
        }

        // Largest first, key as tie-break: fully deterministic without a RNG
        let mut group_order: Vec<(usize, usize)> = by_group
            .iter()
            .map(|(&key, members)| (key, members.len()))
            .collect();
        group_order.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

        let mut fold_sizes = vec![0usize; self.num_folds];
        let mut assignment = vec![0usize; groups.len()];

        for (key, size) in group_order {
            let target = fold_sizes
                .iter()
                .enumerate()
                .min_by_key(|&(_, &s)| s)
                .map(|(i, _)| i)
                .unwrap_or(0);

            for &sample in &by_group[&key] {
                assignment[sample] = target;
            }
            fold_sizes[target] += size;
        }

        Ok(assignment)
    }
}

/// Plain hold-out split used by the non-fold training variants.
///
/// Shuffles all indices with the seed and carves off `val_ratio` of them
/// (at least one) for validation.
pub fn holdout(n: usize, val_ratio: f64, seed: u64) -> Result<(Vec<usize>, Vec<usize>)> {
    if n < 2 {
        return Err(MaskVisionError::Dataset(format!(
            "Need at least 2 samples to split, got {}",
            n
        )));
    }
    if !(0.0..1.0).contains(&val_ratio) || val_ratio == 0.0 {
        return Err(MaskVisionError::Config(format!(
            "Validation ratio must be in (0, 1), got {}",
            val_ratio
        )));
    }

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut order: Vec<usize> = (0..n).collect();
    order.shuffle(&mut rng);

    let n_val = ((n as f64 * val_ratio).round() as usize).clamp(1, n - 1);
    let val = order[..n_val].to_vec();
    let train = order[n_val..].to_vec();

    Ok((train, val))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    /// 5 classes x 100 samples; group = sample / 7 (uneven group sizes)
    fn test_population() -> (Vec<usize>, Vec<usize>) {
        let labels: Vec<usize> = (0..500).map(|i| i % 5).collect();
        let groups: Vec<usize> = (0..500).map(|i| i / 7).collect();
        (labels, groups)
    }

    fn check_disjoint_and_complete(folds: &[Fold], n: usize) {
        let mut seen = HashSet::new();
        for fold in folds {
            for &i in &fold.val_indices {
                assert!(seen.insert(i), "index {} in two validation folds", i);
            }

            let val: HashSet<_> = fold.val_indices.iter().collect();
            for i in &fold.train_indices {
                assert!(!val.contains(i), "index {} in both halves of a fold", i);
            }
            assert_eq!(fold.train_indices.len() + fold.val_indices.len(), n);
        }
        assert_eq!(seen.len(), n, "validation folds must cover every index");
    }

    #[test]
    fn test_fold_count_must_be_at_least_two() {
        assert!(matches!(
            FoldPlanner::new(FoldMode::KFold, 1, 42),
            Err(MaskVisionError::InvalidFoldCount(1))
        ));
        assert!(FoldPlanner::new(FoldMode::KFold, 2, 42).is_ok());
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!(FoldMode::parse("k").unwrap(), FoldMode::KFold);
        assert_eq!(FoldMode::parse("s").unwrap(), FoldMode::Stratified);
        assert_eq!(FoldMode::parse("g").unwrap(), FoldMode::Grouped);
        assert!(FoldMode::parse("x").is_err());
    }

    #[test]
    fn test_kfold_disjoint_union_and_balance() {
        let (labels, groups) = test_population();
        let planner = FoldPlanner::new(FoldMode::KFold, 5, 42).unwrap();
        let folds = planner.plan(&labels, &groups).unwrap();

        assert_eq!(folds.len(), 5);
        check_disjoint_and_complete(&folds, labels.len());

        let sizes: Vec<usize> = folds.iter().map(|f| f.val_indices.len()).collect();
        let min = sizes.iter().min().unwrap();
        let max = sizes.iter().max().unwrap();
        assert!(max - min <= 1);
    }

    #[test]
    fn test_stratified_class_balance_within_one() {
        let (labels, groups) = test_population();
        let planner = FoldPlanner::new(FoldMode::Stratified, 3, 42).unwrap();
        let folds = planner.plan(&labels, &groups).unwrap();

        check_disjoint_and_complete(&folds, labels.len());

        for class in 0..5 {
            let counts: Vec<usize> = folds
                .iter()
                .map(|f| f.val_indices.iter().filter(|&&i| labels[i] == class).count())
                .collect();
            let min = counts.iter().min().unwrap();
            let max = counts.iter().max().unwrap();
            assert!(
                max - min <= 1,
                "class {} spread {:?} exceeds 1 across folds",
                class,
                counts
            );
        }
    }

    #[test]
    fn test_grouped_never_straddles_folds() {
        let (labels, groups) = test_population();
        let planner = FoldPlanner::new(FoldMode::Grouped, 4, 42).unwrap();
        let folds = planner.plan(&labels, &groups).unwrap();

        check_disjoint_and_complete(&folds, labels.len());

        for fold in &folds {
            let val_groups: HashSet<usize> = fold.val_indices.iter().map(|&i| groups[i]).collect();
            for &i in &fold.train_indices {
                assert!(
                    !val_groups.contains(&groups[i]),
                    "group {} appears in train and validation of fold {}",
                    groups[i],
                    fold.index
                );
            }
        }
    }

    #[test]
    fn test_planning_is_idempotent() {
        let (labels, groups) = test_population();
        for mode in [FoldMode::KFold, FoldMode::Stratified, FoldMode::Grouped] {
            let planner = FoldPlanner::new(mode, 5, 7).unwrap();
            let a = planner.plan(&labels, &groups).unwrap();
            let b = planner.plan(&labels, &groups).unwrap();
            for (fa, fb) in a.iter().zip(b.iter()) {
                assert_eq!(fa.train_indices, fb.train_indices);
                assert_eq!(fa.val_indices, fb.val_indices);
            }
        }
    }

    #[test]
    fn test_different_seeds_differ() {
        let (labels, groups) = test_population();
        let a = FoldPlanner::new(FoldMode::KFold, 5, 1)
            .unwrap()
            .plan(&labels, &groups)
            .unwrap();
        let b = FoldPlanner::new(FoldMode::KFold, 5, 2)
            .unwrap()
            .plan(&labels, &groups)
            .unwrap();
        assert_ne!(a[0].val_indices, b[0].val_indices);
    }

    #[test]
    fn test_holdout_split() {
        let (train, val) = holdout(100, 0.2, 42).unwrap();
        assert_eq!(train.len(), 80);
        assert_eq!(val.len(), 20);

        let all: HashSet<usize> = train.iter().chain(val.iter()).copied().collect();
        assert_eq!(all.len(), 100);

        // Same seed reproduces the split
        let (train2, val2) = holdout(100, 0.2, 42).unwrap();
        assert_eq!(train, train2);
        assert_eq!(val, val2);
    }

    #[test]
    fn test_holdout_rejects_bad_ratio() {
        assert!(holdout(100, 0.0, 42).is_err());
        assert!(holdout(100, 1.0, 42).is_err());
    }
}
