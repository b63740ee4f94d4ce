//! Regression label sources.
//!
//! A regression forest's gradient is the label itself. [`DirectLabels`] keeps
//! the training targets fixed for the whole run; [`ShuffledLabels`] remaps
//! integer labels through a fresh random permutation before every round.

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;

use crate::data::QueryBoundaries;
use crate::model::ConfigError;

fn check_label_count(labels: &[f32], queries: &QueryBoundaries) -> Result<(), ConfigError> {
    if labels.len() != queries.n_examples() {
        return Err(ConfigError::LabelCountMismatch {
            labels: labels.len(),
            examples: queries.n_examples(),
        });
    }
    Ok(())
}

// =============================================================================
// Direct Labels
// =============================================================================

/// Labels used unchanged as the gradient.
#[derive(Debug, Clone)]
pub struct DirectLabels {
    labels: Vec<f32>,
    queries: QueryBoundaries,
}

impl DirectLabels {
    /// # Errors
    ///
    /// [`ConfigError::LabelCountMismatch`] if `labels` does not cover exactly
    /// the examples partitioned by `queries`.
    pub fn new(labels: Vec<f32>, queries: QueryBoundaries) -> Result<Self, ConfigError> {
        check_label_count(&labels, &queries)?;
        Ok(Self { labels, queries })
    }

    #[inline]
    pub fn labels(&self) -> &[f32] {
        &self.labels
    }

    #[inline]
    pub fn queries(&self) -> &QueryBoundaries {
        &self.queries
    }
}

// =============================================================================
// Shuffled Labels
// =============================================================================

/// Integer labels remapped through a new random permutation every round.
///
/// Every label must be an integral value in `[0, upper_bound)`. The permutation
/// covers `[0, label_limit)` where `label_limit = max(label) + 1`, so the set
/// of distinct label values keeps its size from round to round.
///
/// Labels are held as `u32` so values above `2^24` stay distinct; they are
/// converted to `f32` only when written into the gradient.
///
/// Each refresh materializes the whole permutation: a single label near the
/// default upper bound (about `2^31`) costs an 8 GB `u32` buffer per round.
/// Keep labels dense or lower `upper_bound` for large label ranges.
///
/// The label buffer is owned here and rewritten in place by
/// [`refresh_labels`](Self::refresh_labels), which needs `&mut self`. Gradient
/// fan-out only reads the buffer, so a remap can never overlap a read.
#[derive(Debug, Clone)]
pub struct ShuffledLabels {
    labels: Vec<u32>,
    queries: QueryBoundaries,
    label_limit: usize,
    rng: Xoshiro256PlusPlus,
    permutation: Vec<u32>,
}

impl ShuffledLabels {
    /// # Errors
    ///
    /// - [`ConfigError::LabelCountMismatch`] on a length mismatch
    /// - [`ConfigError::ShuffleLabelOutOfRange`] for the first label that is
    ///   negative, NaN or not below `upper_bound`
    pub fn new(
        labels: Vec<f32>,
        queries: QueryBoundaries,
        upper_bound: u32,
        seed: u64,
    ) -> Result<Self, ConfigError> {
        check_label_count(&labels, &queries)?;

        let labels = labels
            .iter()
            .enumerate()
            .map(|(index, &label)| {
                // Compared in f64 so the bound is exact for every u32.
                if label >= 0.0 && (label as f64) < upper_bound as f64 {
                    Ok(label as u32)
                } else {
                    Err(ConfigError::ShuffleLabelOutOfRange {
                        index,
                        label,
                        upper_bound,
                    })
                }
            })
            .collect::<Result<Vec<u32>, _>>()?;

        let label_limit = labels.iter().max().map_or(1, |&m| m as usize + 1);
        Ok(Self {
            labels,
            queries,
            label_limit,
            rng: Xoshiro256PlusPlus::seed_from_u64(seed),
            permutation: Vec::new(),
        })
    }

    /// Number of label values the permutation ranges over.
    #[inline]
    pub fn label_limit(&self) -> usize {
        self.label_limit
    }

    /// Current integer labels.
    #[inline]
    pub fn labels(&self) -> &[u32] {
        &self.labels
    }

    #[inline]
    pub fn queries(&self) -> &QueryBoundaries {
        &self.queries
    }

    /// Draw a new permutation of `[0, label_limit)` and remap every label.
    pub fn refresh_labels(&mut self) {
        self.permutation.clear();
        self.permutation.extend(0..self.label_limit as u32);
        self.permutation.shuffle(&mut self.rng);

        let perm = &self.permutation;
        for label in &mut self.labels {
            *label = perm[*label as usize];
        }
    }

    /// Write the current labels of `range` as gradient values.
    #[inline]
    pub(crate) fn write_gradient(&self, range: std::ops::Range<usize>, gradient: &mut [f32]) {
        for (g, &label) in gradient.iter_mut().zip(&self.labels[range]) {
            *g = label as f32;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn queries(n: usize) -> QueryBoundaries {
        QueryBoundaries::uniform(n, 2)
    }

    #[test]
    fn direct_rejects_length_mismatch() {
        let err = DirectLabels::new(vec![1.0, 2.0], queries(3)).unwrap_err();
        assert!(matches!(err, ConfigError::LabelCountMismatch { labels: 2, examples: 3 }));
    }

    #[test]
    fn shuffle_rejects_out_of_range_labels() {
        for (labels, bad) in [(vec![0.0, -1.0, 2.0], 1), (vec![0.0, 1.0, 10.0], 2), (vec![f32::NAN, 0.0, 0.0], 0)] {
            let err = ShuffledLabels::new(labels, queries(3), 10, 0).unwrap_err();
            match err {
                ConfigError::ShuffleLabelOutOfRange { index, upper_bound, .. } => {
                    assert_eq!(index, bad);
                    assert_eq!(upper_bound, 10);
                }
                other => panic!("unexpected error: {other}"),
            }
        }
    }

    #[test]
    fn all_zero_labels_are_identity() {
        let mut shuffled = ShuffledLabels::new(vec![0.0; 4], queries(4), 10, 1).unwrap();
        assert_eq!(shuffled.label_limit(), 1);
        shuffled.refresh_labels();
        assert_eq!(shuffled.labels(), &[0; 4]);
    }

    #[test]
    fn refresh_is_a_consistent_relabeling() {
        let original = vec![0.0, 1.0, 2.0, 1.0, 0.0, 2.0, 2.0];
        let mut shuffled = ShuffledLabels::new(original.clone(), queries(7), 100, 5).unwrap();
        assert_eq!(shuffled.label_limit(), 3);

        shuffled.refresh_labels();
        let remapped = shuffled.labels();
        // Equal labels stay equal, distinct labels stay distinct.
        for i in 0..original.len() {
            for j in 0..original.len() {
                assert_eq!(original[i] == original[j], remapped[i] == remapped[j]);
            }
        }
        assert!(remapped.iter().all(|&l| l < 3));
    }

    #[test]
    fn same_seed_same_permutations() {
        let labels: Vec<f32> = (0..20).map(|i| (i % 7) as f32).collect();
        let mut a = ShuffledLabels::new(labels.clone(), queries(20), 100, 9).unwrap();
        let mut b = ShuffledLabels::new(labels, queries(20), 100, 9).unwrap();
        for _ in 0..3 {
            a.refresh_labels();
            b.refresh_labels();
            assert_eq!(a.labels(), b.labels());
        }
    }

    #[test]
    fn labels_above_f32_precision_stay_distinct() {
        // Consecutive integers past 2^24 collapse when stored as f32.
        let base = 1u32 << 24;
        let n = 4096;
        let labels: Vec<f32> = (0..n).map(|i| (base + 2 * i) as f32).collect();
        let mut shuffled = ShuffledLabels::new(labels, queries(n as usize), 0x7FFF_FFC7, 0).unwrap();
        assert_eq!(shuffled.label_limit(), (base + 2 * (n - 1)) as usize + 1);

        shuffled.refresh_labels();
        let mut remapped = shuffled.labels().to_vec();
        remapped.sort_unstable();
        remapped.dedup();
        assert_eq!(remapped.len(), n as usize);
    }

    #[test]
    fn bound_is_exact_above_f32_precision() {
        let bound = (1u32 << 24) + 1;
        let label = (1u32 << 24) as f32;
        let shuffled = ShuffledLabels::new(vec![label], queries(1), bound, 0).unwrap();
        assert_eq!(shuffled.labels(), &[1u32 << 24]);

        assert!(ShuffledLabels::new(vec![label], queries(1), 1 << 24, 0).is_err());
    }
}
