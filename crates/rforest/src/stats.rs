//! Weighted-sample quantile estimation.
//!
//! [`QuantileStatistics`] sorts a weighted sample once and then answers any
//! number of quantile queries by binary search over the cumulative weights.
//!
//! The estimate is a step function with no interpolation: the value returned
//! for `q` is the smallest sample value whose cumulative weight reaches
//! `q * total_weight`. This is the same rule XGBoost uses for its weighted
//! quantile, so `q = 0` yields the minimum and `q = 1` the maximum.

/// Sorted weighted sample supporting quantile queries.
#[derive(Debug, Clone, Default)]
pub struct QuantileStatistics {
    /// Sample values in ascending order.
    values: Vec<f32>,
    /// Cumulative weight up to and including each value.
    cumulative: Vec<f64>,
}

impl QuantileStatistics {
    /// Build from sample values and optional per-value weights.
    ///
    /// `None` weights mean uniform weight 1.0. NaN values and entries with a
    /// non-positive or non-finite weight are ignored.
    pub fn new(values: &[f32], weights: Option<&[f32]>) -> Self {
        debug_assert!(weights.map_or(true, |w| w.len() == values.len()));

        let mut pairs: Vec<(f32, f32)> = match weights {
            Some(w) => values.iter().copied().zip(w.iter().copied()).collect(),
            None => values.iter().map(|&v| (v, 1.0)).collect(),
        };
        pairs.retain(|&(v, w)| !v.is_nan() && w.is_finite() && w > 0.0);
        pairs.sort_by(|a, b| a.0.total_cmp(&b.0));

        let mut cumulative = Vec::with_capacity(pairs.len());
        let mut acc = 0.0f64;
        for &(_, w) in &pairs {
            acc += w as f64;
            cumulative.push(acc);
        }

        Self {
            values: pairs.into_iter().map(|(v, _)| v).collect(),
            cumulative,
        }
    }

    /// Number of retained sample values.
    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Sum of the retained weights.
    #[inline]
    pub fn total_weight(&self) -> f64 {
        self.cumulative.last().copied().unwrap_or(0.0)
    }

    /// Value at quantile `q`.
    ///
    /// `q` is clamped to `[0, 1]`. Returns `f32::NAN` for an empty sample or a
    /// NaN `q`.
    pub fn quantile(&self, q: f32) -> f32 {
        if self.values.is_empty() || q.is_nan() {
            return f32::NAN;
        }

        // `q` carries f32 rounding, so a boundary such as `0.2 * 5` must still
        // match the cumulative weight 1.0 it denotes.
        let threshold = q.clamp(0.0, 1.0) as f64 * self.total_weight();
        let tolerance = threshold * f32::EPSILON as f64;
        let idx = self.cumulative.partition_point(|&c| c + tolerance < threshold);
        self.values[idx.min(self.values.len() - 1)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn empty_sample_is_nan() {
        let stats = QuantileStatistics::new(&[], None);
        assert!(stats.is_empty());
        assert!(stats.quantile(0.5).is_nan());
    }

    #[test]
    fn single_value() {
        let stats = QuantileStatistics::new(&[42.0], None);
        assert_eq!(stats.quantile(0.0), 42.0);
        assert_eq!(stats.quantile(0.5), 42.0);
        assert_eq!(stats.quantile(1.0), 42.0);
    }

    #[rstest]
    #[case(0.0, 1.0)]
    #[case(0.25, 1.0)]
    #[case(0.5, 2.0)]
    #[case(0.6, 3.0)]
    #[case(1.0, 4.0)]
    fn unweighted_step_function(#[case] q: f32, #[case] expected: f32) {
        let stats = QuantileStatistics::new(&[4.0, 2.0, 3.0, 1.0], None);
        assert_eq!(stats.quantile(q), expected);
    }

    #[test]
    fn weights_shift_the_median() {
        // Heavy weight on 10.0 pulls the median up.
        let stats = QuantileStatistics::new(&[1.0, 2.0, 10.0], Some(&[1.0, 1.0, 8.0]));
        assert_eq!(stats.total_weight(), 10.0);
        assert_eq!(stats.quantile(0.5), 10.0);
        assert_eq!(stats.quantile(0.1), 1.0);
        assert_eq!(stats.quantile(0.2), 2.0);
    }

    #[rstest]
    #[case(0.2, 1.0)]
    #[case(0.4, 2.0)]
    #[case(0.6, 3.0)]
    #[case(0.8, 4.0)]
    #[case(0.81, 5.0)]
    fn exact_boundaries_take_the_lower_value(#[case] q: f32, #[case] expected: f32) {
        let stats = QuantileStatistics::new(&[5.0, 3.0, 1.0, 4.0, 2.0], None);
        assert_eq!(stats.quantile(q), expected);
    }

    #[test]
    fn weighted_boundaries() {
        let stats = QuantileStatistics::new(&[1.0, 2.0, 3.0], Some(&[0.1, 0.2, 0.7]));
        assert_eq!(stats.quantile(0.1), 1.0);
        assert_eq!(stats.quantile(0.3), 2.0);
        assert_eq!(stats.quantile(0.31), 3.0);
    }

    #[test]
    fn nan_values_and_zero_weights_are_dropped() {
        let stats = QuantileStatistics::new(&[f32::NAN, 5.0, 7.0], Some(&[1.0, 0.0, 2.0]));
        assert_eq!(stats.len(), 1);
        assert_eq!(stats.quantile(0.0), 7.0);
    }

    #[test]
    fn out_of_range_q_is_clamped() {
        let stats = QuantileStatistics::new(&[1.0, 2.0, 3.0], None);
        assert_eq!(stats.quantile(-1.0), 1.0);
        assert_eq!(stats.quantile(2.0), 3.0);
        assert!(stats.quantile(f32::NAN).is_nan());
    }
}
