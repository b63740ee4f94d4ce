//! Objective functions for regression forests.
//!
//! A forest grows every tree against the same kind of signal: the gradient of
//! example `i` is its current label. [`RegressionObjective`] selects between
//! fixed labels and labels reshuffled each round.
//!
//! # Concurrency
//!
//! [`RegressionObjective::compute_gradients`] splits the gradient buffer into
//! one disjoint `&mut` chunk per query and fills the chunks in parallel while
//! the label buffer is only read. The shuffled variant rewrites its labels in
//! [`RegressionObjective::refresh_labels`], which takes `&mut self` and is
//! called once per round before any gradient is requested.

mod regression;

pub use regression::{DirectLabels, ShuffledLabels};

use crate::data::QueryBoundaries;
use crate::utils::Parallelism;

/// Regression objective, selected once from the configuration.
#[derive(Debug, Clone)]
pub enum RegressionObjective {
    /// Labels are the training targets for the whole run.
    Direct(DirectLabels),
    /// Labels are remapped through a fresh random permutation every round.
    Shuffled(ShuffledLabels),
}

impl RegressionObjective {
    /// Prepare the labels for the next round. No-op for the direct variant.
    pub fn refresh_labels(&mut self) {
        match self {
            Self::Direct(_) => {}
            Self::Shuffled(inner) => inner.refresh_labels(),
        }
    }

    #[inline]
    pub fn queries(&self) -> &QueryBoundaries {
        match self {
            Self::Direct(inner) => inner.queries(),
            Self::Shuffled(inner) => inner.queries(),
        }
    }

    /// Write the gradient of every example in `query` into `gradient`.
    ///
    /// `gradient` is the slice of the full gradient vector covering exactly
    /// the query's example range.
    #[inline]
    pub fn gradient_in_query(&self, query: usize, gradient: &mut [f32]) {
        let range = self.queries().range(query);
        match self {
            Self::Direct(inner) => gradient.copy_from_slice(&inner.labels()[range]),
            Self::Shuffled(inner) => inner.write_gradient(range, gradient),
        }
    }

    /// Fill the full gradient vector, one task per query.
    pub fn compute_gradients(&self, gradient: &mut [f32], parallelism: Parallelism) {
        let queries = self.queries();
        debug_assert_eq!(gradient.len(), queries.n_examples());

        let mut chunks = Vec::with_capacity(queries.n_queries());
        let mut rest = gradient;
        for q in 0..queries.n_queries() {
            let (chunk, tail) = std::mem::take(&mut rest).split_at_mut(queries.range(q).len());
            chunks.push((q, chunk));
            rest = tail;
        }

        parallelism.maybe_par_for_each(chunks, |(q, chunk)| self.gradient_in_query(q, chunk));
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Direct(_) => "regression",
            Self::Shuffled(_) => "regression_shuffled",
        }
    }
}

impl From<DirectLabels> for RegressionObjective {
    fn from(inner: DirectLabels) -> Self {
        Self::Direct(inner)
    }
}

impl From<ShuffledLabels> for RegressionObjective {
    fn from(inner: ShuffledLabels) -> Self {
        Self::Shuffled(inner)
    }
}
