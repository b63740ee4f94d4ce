//! Prediction benchmarks: scalar batch and quantile queries.
//!
//! Run with: `cargo bench --bench predict`

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use rforest::data::{RoleMappedData, RoleMapping};
use rforest::testing::{random_features, synthetic_regression_dataset};
use rforest::{ForestRegressionConfig, ForestRegressionPredictor, ForestRegressionTrainer};

const N_FEATURES: usize = 20;
const BATCH_SIZES: [usize; 3] = [100, 1_000, 10_000];

fn train_predictor() -> ForestRegressionPredictor {
    let data = synthetic_regression_dataset(5_000, N_FEATURES, 42, 0.2);
    let roles = RoleMapping::default();
    let config = ForestRegressionConfig::builder()
        .n_trees(100)
        .max_leaves(32)
        .build()
        .unwrap();
    ForestRegressionTrainer::fit(config, &RoleMappedData::new(&data, &roles)).unwrap()
}

fn bench_scalar(c: &mut Criterion) {
    let predictor = train_predictor();
    let mut group = c.benchmark_group("predict/scalar");

    for batch in BATCH_SIZES {
        let features = random_features(batch, N_FEATURES, 7, -1.0, 1.0);
        group.throughput(Throughput::Elements(batch as u64));
        for n_threads in [1, 0] {
            let label = if n_threads == 1 { "sequential" } else { "parallel" };
            group.bench_with_input(BenchmarkId::new(label, batch), &features, |b, f| {
                b.iter(|| black_box(predictor.predict(black_box(f.view()), n_threads).unwrap()))
            });
        }
    }
    group.finish();
}

fn bench_quantile(c: &mut Criterion) {
    let predictor = train_predictor();
    let mut group = c.benchmark_group("predict/quantile");
    let features = random_features(1_000, N_FEATURES, 8, -1.0, 1.0);
    group.throughput(Throughput::Elements(features.nrows() as u64));

    for quantiles in [vec![0.5f32], vec![0.1, 0.5, 0.9], (1..20).map(|i| i as f32 / 20.0).collect()] {
        let mapper = predictor.get_mapper(&quantiles).unwrap();
        group.bench_with_input(BenchmarkId::new("rows", quantiles.len()), &features, |b, f| {
            let mut out = Vec::with_capacity(quantiles.len());
            b.iter(|| {
                for row in f.rows() {
                    mapper(row.as_slice().unwrap(), &mut out).unwrap();
                    black_box(&out);
                }
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_scalar, bench_quantile);
criterion_main!(benches);
