//! Quantile prediction: monotonicity, determinism, buffer reuse and schema binding.

use std::sync::OnceLock;

use proptest::prelude::*;

use rforest::data::{Column, Dataset, RoleMappedData, RoleMapping};
use rforest::testing::synthetic_regression_dataset;
use rforest::{ConfigError, ForestRegressionConfig, ForestRegressionPredictor, ForestRegressionTrainer, SchemaError};

const N_FEATURES: usize = 3;

fn predictor() -> &'static ForestRegressionPredictor {
    static PREDICTOR: OnceLock<ForestRegressionPredictor> = OnceLock::new();
    PREDICTOR.get_or_init(|| {
        let data = synthetic_regression_dataset(500, N_FEATURES, 31, 0.5);
        let roles = RoleMapping::default();
        let config = ForestRegressionConfig::builder()
            .n_trees(20)
            .max_leaves(16)
            .min_samples_leaf(5)
            .quantile_sample_count(25)
            .build()
            .unwrap();
        ForestRegressionTrainer::fit(config, &RoleMappedData::new(&data, &roles)).unwrap()
    })
}

fn arb_features() -> impl Strategy<Value = Vec<f32>> {
    proptest::collection::vec(-1.5f32..1.5, N_FEATURES)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn quantiles_are_monotone(features in arb_features(), mut quantiles in proptest::collection::vec(0.0f32..=1.0, 1..8)) {
        quantiles.sort_by(f32::total_cmp);
        let mapper = predictor().get_mapper(&quantiles).unwrap();
        let mut out = Vec::new();
        mapper(&features, &mut out).unwrap();

        prop_assert_eq!(out.len(), quantiles.len());
        for pair in out.windows(2) {
            prop_assert!(pair[0] <= pair[1], "{:?} for {:?}", out, quantiles);
        }
    }

    #[test]
    fn quantiles_are_deterministic(features in arb_features(), q in 0.0f32..=1.0) {
        let mapper = predictor().get_mapper(&[q, 0.5]).unwrap();
        let (mut a, mut b) = (Vec::new(), Vec::new());
        mapper(&features, &mut a).unwrap();
        mapper(&features, &mut b).unwrap();

        let bits = |v: &[f32]| v.iter().map(|x| x.to_bits()).collect::<Vec<_>>();
        prop_assert_eq!(bits(&a), bits(&b));
    }
}

#[test]
fn output_follows_caller_order() {
    let predictor = predictor();
    let features = [0.2f32, -0.4, 0.9];
    let mut forward = Vec::new();
    let mut backward = Vec::new();
    predictor.get_mapper(&[0.1, 0.9]).unwrap()(&features, &mut forward).unwrap();
    predictor.get_mapper(&[0.9, 0.1]).unwrap()(&features, &mut backward).unwrap();
    assert_eq!(forward, vec![backward[1], backward[0]]);
}

#[test]
fn extreme_quantiles_bound_the_median() {
    let mapper = predictor().get_mapper(&[0.0, 0.5, 1.0]).unwrap();
    let mut out = Vec::new();
    mapper(&[0.0, 0.0, 0.0], &mut out).unwrap();
    assert!(out[0] <= out[1] && out[1] <= out[2]);
    assert!(out.iter().all(|v| v.is_finite()));
}

#[test]
fn caller_buffer_is_reused_when_large_enough() {
    let mapper = predictor().get_mapper(&[0.25, 0.5, 0.75]).unwrap();
    let mut out: Vec<f32> = Vec::with_capacity(16);
    out.extend([9.0; 10]);
    let ptr = out.as_ptr();

    mapper(&[0.1, 0.1, 0.1], &mut out).unwrap();
    assert_eq!(out.len(), 3);
    assert_eq!(out.as_ptr(), ptr);
}

#[test]
fn invalid_quantile_lists_are_rejected() {
    let predictor = predictor();
    assert_eq!(predictor.get_mapper(&[]).err(), Some(ConfigError::EmptyQuantiles));
    assert_eq!(
        predictor.create_mapper(&[0.2, 1.01]).err(),
        Some(ConfigError::QuantileOutOfRange { index: 1, value: 1.01 })
    );
}

#[test]
fn bound_mapper_covers_dataset() {
    let predictor = predictor();
    let data = synthetic_regression_dataset(40, N_FEATURES, 99, 0.0);
    let quantiles = [0.1f32, 0.5, 0.9];

    let mapper = predictor.create_mapper(&quantiles).unwrap();
    let bound = mapper.bind(&data.schema(), "Features").unwrap();
    let result = bound.map_dataset(&data).unwrap();
    assert_eq!(result.dim(), (40, 3));

    let Some(Column::Vector(features)) = data.column("Features") else {
        panic!("features column must be a fixed-size vector");
    };
    let mut out = Vec::new();
    for (i, row) in features.rows().into_iter().enumerate() {
        mapper.map(row.as_slice().unwrap(), &mut out).unwrap();
        assert_eq!(result.row(i).to_vec(), out);
    }
}

#[test]
fn bind_rejects_wrong_dimension() {
    let predictor = predictor();
    let data = synthetic_regression_dataset(5, N_FEATURES + 1, 1, 0.0);
    let mapper = predictor.create_mapper(&[0.5]).unwrap();
    assert!(matches!(
        mapper.bind(&data.schema(), "Features"),
        Err(SchemaError::FeatureDimensionMismatch { expected: N_FEATURES, got, .. }) if got == N_FEATURES + 1
    ));

    let empty = Dataset::new();
    assert!(matches!(
        mapper.bind(&empty.schema(), "Features"),
        Err(SchemaError::MissingColumn { .. })
    ));
}
