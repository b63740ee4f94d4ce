//! Per-leaf label samples used for quantile estimation.

use super::NodeId;

/// Training labels (and optional weights) recorded at each leaf of a tree.
///
/// Stored as one packed buffer with a `(start, len)` segment per node.
/// Internal nodes and leaves without recorded labels have an empty segment.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LeafSamples {
    segments: Box<[(u32, u32)]>,
    values: Box<[f32]>,
    weights: Option<Box<[f32]>>,
}

impl LeafSamples {
    /// No recorded labels for any node.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Start building samples for a tree with `n_nodes` nodes.
    pub fn builder(n_nodes: usize, weighted: bool) -> LeafSamplesBuilder {
        LeafSamplesBuilder {
            segments: vec![(0, 0); n_nodes],
            values: Vec::new(),
            weights: weighted.then(Vec::new),
        }
    }

    /// Rebuild from raw parts, checking that every segment is in bounds.
    pub fn from_parts(
        segments: Vec<(u32, u32)>,
        values: Vec<f32>,
        weights: Option<Vec<f32>>,
    ) -> Option<Self> {
        if weights.as_ref().is_some_and(|w| w.len() != values.len()) {
            return None;
        }
        let in_bounds = segments
            .iter()
            .all(|&(start, len)| (start as usize).checked_add(len as usize).is_some_and(|end| end <= values.len()));
        in_bounds.then(|| Self {
            segments: segments.into_boxed_slice(),
            values: values.into_boxed_slice(),
            weights: weights.map(Vec::into_boxed_slice),
        })
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Whether per-sample weights were recorded.
    #[inline]
    pub fn is_weighted(&self) -> bool {
        self.weights.is_some()
    }

    /// Labels recorded at `node`, with weights when present.
    #[inline]
    pub fn get(&self, node: NodeId) -> (&[f32], Option<&[f32]>) {
        let Some(&(start, len)) = self.segments.get(node as usize) else {
            return (&[], None);
        };
        let range = start as usize..(start + len) as usize;
        (&self.values[range.clone()], self.weights.as_ref().map(|w| &w[range]))
    }

    pub fn segments(&self) -> &[(u32, u32)] {
        &self.segments
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    pub fn weights(&self) -> Option<&[f32]> {
        self.weights.as_deref()
    }
}

/// Builder for [`LeafSamples`].
#[derive(Debug)]
pub struct LeafSamplesBuilder {
    segments: Vec<(u32, u32)>,
    values: Vec<f32>,
    weights: Option<Vec<f32>>,
}

impl LeafSamplesBuilder {
    /// Record the samples of one leaf.
    ///
    /// For a weighted builder, missing weights are recorded as 1.0. For an
    /// unweighted builder, `weights` is ignored.
    pub fn set(&mut self, node: NodeId, values: &[f32], weights: Option<&[f32]>) {
        debug_assert!(weights.map_or(true, |w| w.len() == values.len()));
        let start = self.values.len() as u32;
        self.values.extend_from_slice(values);
        if let Some(out) = self.weights.as_mut() {
            match weights {
                Some(w) => out.extend_from_slice(w),
                None => out.extend(std::iter::repeat(1.0).take(values.len())),
            }
        }
        self.segments[node as usize] = (start, values.len() as u32);
    }

    pub fn build(self) -> LeafSamples {
        LeafSamples {
            segments: self.segments.into_boxed_slice(),
            values: self.values.into_boxed_slice(),
            weights: self.weights.map(Vec::into_boxed_slice),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn segments_per_node() {
        let mut builder = LeafSamples::builder(3, false);
        builder.set(1, &[1.0, 2.0], None);
        builder.set(2, &[5.0], Some(&[3.0]));
        let samples = builder.build();

        assert_eq!(samples.get(0), (&[][..], None));
        assert_eq!(samples.get(1).0, &[1.0, 2.0]);
        assert_eq!(samples.get(2).0, &[5.0]);
        assert!(!samples.is_weighted());
        assert_eq!(samples.get(9).0.len(), 0);
    }

    #[test]
    fn weighted_builder_fills_missing_weights() {
        let mut builder = LeafSamples::builder(2, true);
        builder.set(0, &[1.0], Some(&[0.5]));
        builder.set(1, &[2.0, 3.0], None);
        let samples = builder.build();

        assert_eq!(samples.get(0).1, Some(&[0.5][..]));
        assert_eq!(samples.get(1).1, Some(&[1.0, 1.0][..]));
    }

    #[test]
    fn from_parts_checks_bounds() {
        assert!(LeafSamples::from_parts(vec![(0, 2)], vec![1.0], None).is_none());
        assert!(LeafSamples::from_parts(vec![(0, 1)], vec![1.0], Some(vec![])).is_none());
        assert!(LeafSamples::from_parts(vec![(0, 1), (1, 0)], vec![1.0], None).is_some());
    }
}
