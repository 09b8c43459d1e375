use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use lpcnet_features_rs::{
    AltPitchEstimator, ExtractorConfig, FRAME_SIZE, FeatureExtractor, NlpPitchEstimator,
};
use std::hint::black_box;

fn generate_test_audio(sample_rate: u32, duration_ms: u32) -> Vec<i16> {
    let total_samples = (sample_rate * duration_ms / 1000) as usize;

    // Voiced-like signal: 150 Hz fundamental plus two harmonics
    (0..total_samples)
        .map(|i| {
            let t = i as f32 / sample_rate as f32;
            let w = 2.0 * std::f32::consts::PI * 150.0 * t;
            let s = w.sin() + 0.5 * (2.0 * w).sin() + 0.25 * (3.0 * w).sin();
            (s * 8000.0) as i16
        })
        .collect()
}

fn config() -> ExtractorConfig {
    ExtractorConfig::default().with_seed(1)
}

fn bench_extractor_creation(c: &mut Criterion) {
    c.bench_function("extractor_creation", |b| {
        b.iter(|| {
            let _extractor = FeatureExtractor::new(config()).unwrap();
        });
    });
}

fn bench_single_frame_processing(c: &mut Criterion) {
    let mut group = c.benchmark_group("single_frame_processing");
    let test_audio = generate_test_audio(16000, 100);
    let frame = &test_audio[..FRAME_SIZE];

    let mut extractor = FeatureExtractor::new(config()).unwrap();
    group.bench_function("primary_pitch", |b| {
        b.iter(|| {
            let _features = extractor.process_frame(black_box(frame)).unwrap();
        });
    });

    let mut extractor = FeatureExtractor::new(config())
        .unwrap()
        .with_alt_pitch(Box::new(NlpPitchEstimator::new()));
    group.bench_function("alt_pitch", |b| {
        b.iter(|| {
            let _features = extractor.process_frame(black_box(frame)).unwrap();
        });
    });

    group.finish();
}

fn bench_batch_processing(c: &mut Criterion) {
    let mut group = c.benchmark_group("batch_processing");

    for duration_ms in [100, 500, 1000, 5000].iter() {
        let test_audio = generate_test_audio(16000, *duration_ms);

        group.bench_with_input(
            BenchmarkId::from_parameter(duration_ms),
            duration_ms,
            |b, _| {
                b.iter(|| {
                    let mut extractor = FeatureExtractor::new(config()).unwrap();
                    let _matrix = extractor.extract(black_box(&test_audio)).unwrap();
                });
            },
        );
    }

    group.finish();
}

fn bench_nlp_estimator(c: &mut Criterion) {
    let test_audio: Vec<f32> = generate_test_audio(16000, 40)
        .into_iter()
        .map(f32::from)
        .collect();
    let mut nlp = NlpPitchEstimator::new();
    let history = &test_audio[..nlp.history_len()];

    c.bench_function("nlp_estimate", |b| {
        b.iter(|| {
            let _pitch = nlp.estimate(black_box(history));
        });
    });
}

criterion_group!(
    benches,
    bench_extractor_creation,
    bench_single_frame_processing,
    bench_batch_processing,
    bench_nlp_estimator
);
criterion_main!(benches);
