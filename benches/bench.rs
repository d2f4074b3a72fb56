//! Criterion benchmarks for prefnet.
//!
//! Covers the hot paths of training and serving:
//! - forward pass and single-example SGD steps
//! - feature extraction for a candidate batch
//! - ranking candidates with a trained model

use std::hint::black_box;
use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use prefnet::behavior::{BehaviorEvent, EventType, ItemAttributes, MemoryBehaviorStore, MemoryCatalog};
use prefnet::dataset::TrainingExample;
use prefnet::features::{FeatureConfig, FeatureExtractor};
use prefnet::network::{Activation, NetworkArchitecture, NeuralNetwork};
use prefnet::registry::ModelRegistry;
use prefnet::scorer::{RecommendationRequest, RecommendationScorer};
use prefnet::trainer::{Trainer, TrainingConfig};

const USERS: u64 = 50;
const ITEMS: u64 = 200;

/// Generate a synthetic behavior log with a few events per user.
fn generate_extractor() -> Arc<FeatureExtractor> {
    let reference = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
    let kinds = EventType::ALL;
    let mut events = Vec::new();
    for user in 0..USERS {
        for step in 0..20u64 {
            let item = (user * 7 + step * 13) % ITEMS;
            let kind = kinds[((user + step) % kinds.len() as u64) as usize];
            let timestamp = reference - Duration::hours((user * 20 + step) as i64);
            events.push(BehaviorEvent::new(user, item, kind, timestamp));
        }
    }
    let catalog = MemoryCatalog::with_items((0..ITEMS).map(|id| {
        ItemAttributes::new(id)
            .with_category(format!("category{}", id % 8))
            .with_price(5.0 + (id % 40) as f64 * 7.5)
            .with_tags([format!("tag{}", id % 11), format!("tag{}", id % 5)])
    }));

    Arc::new(FeatureExtractor::new(
        Arc::new(MemoryBehaviorStore::with_events(events)),
        Arc::new(catalog),
        FeatureConfig::default(),
    ))
}

fn bench_network(c: &mut Criterion) {
    let architecture = NetworkArchitecture::with_hidden(12, &[8, 6]).unwrap();
    let mut network = NeuralNetwork::new(architecture, Activation::Sigmoid, 42);
    let input: Vec<f64> = (0..12).map(|i| i as f64 / 12.0).collect();

    let mut group = c.benchmark_group("network");
    group.bench_function("forward", |b| {
        b.iter(|| network.predict(black_box(&input)).unwrap())
    });
    group.bench_function("train_example", |b| {
        b.iter(|| network.train_example(black_box(&input), 1.0, 0.01).unwrap())
    });
    group.finish();
}

fn bench_features(c: &mut Criterion) {
    let extractor = generate_extractor();
    let reference = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
    let candidates: Vec<u64> = (0..100).collect();

    let mut group = c.benchmark_group("features");
    group.throughput(Throughput::Elements(candidates.len() as u64));
    group.bench_function("extract_batch_100", |b| {
        b.iter(|| {
            extractor
                .extract_batch(black_box(3), black_box(&candidates), reference)
                .unwrap()
        })
    });
    group.finish();
}

fn bench_scoring(c: &mut Criterion) {
    let extractor = generate_extractor();
    let registry = Arc::new(ModelRegistry::in_memory());
    let trainer = Trainer::new(Arc::clone(&extractor), Arc::clone(&registry));
    let config = TrainingConfig {
        epochs: 20,
        ..TrainingConfig::default()
    };
    trainer.train_model(&config).unwrap();

    let scorer = RecommendationScorer::new(extractor, registry);
    let reference = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
    let candidates: Vec<u64> = (0..ITEMS).collect();
    let request = RecommendationRequest::new(5, candidates)
        .with_top_n(10)
        .with_as_of(reference);

    let mut group = c.benchmark_group("scoring");
    group.throughput(Throughput::Elements(request.candidate_item_ids.len() as u64));
    group.bench_function("recommend_top_10", |b| {
        b.iter(|| scorer.recommend(black_box(&request)).unwrap())
    });
    group.finish();
}

fn bench_training(c: &mut Criterion) {
    let examples: Vec<TrainingExample> = (0..200u64)
        .map(|i| {
            let features: Vec<f64> = (0..12).map(|j| ((i * 31 + j * 17) % 100) as f64 / 100.0).collect();
            let label = if features[0] > 0.5 { 1.0 } else { 0.0 };
            TrainingExample::new(i, i, features, label)
        })
        .collect();
    let config = TrainingConfig {
        epochs: 10,
        ..TrainingConfig::default()
    };

    let mut group = c.benchmark_group("training");
    group.sample_size(10);
    group.bench_function("fit_200x10", |b| {
        b.iter(|| prefnet::trainer::fit(black_box(&config), examples.clone()).unwrap())
    });
    group.finish();
}

criterion_group!(benches, bench_network, bench_features, bench_scoring, bench_training);
criterion_main!(benches);
