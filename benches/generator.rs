use criterion::{black_box, criterion_group, criterion_main, Criterion};
use malbolge::{GenerationConfig, Generator};

fn bench_generate_single_byte(c: &mut Criterion) {
    let generator = Generator::new();
    let config = GenerationConfig {
        random_seed: Some(42),
        ..GenerationConfig::default()
    };

    c.bench_function("generator/generate_a", |b| {
        b.iter(|| {
            black_box(
                generator
                    .generate_for_string(black_box("A"), &config)
                    .unwrap(),
            );
        })
    });
}

fn bench_generate_two_bytes(c: &mut Criterion) {
    let generator = Generator::new();
    let config = GenerationConfig {
        random_seed: Some(42),
        ..GenerationConfig::default()
    };

    c.bench_function("generator/generate_hi", |b| {
        b.iter(|| {
            black_box(
                generator
                    .generate_for_string(black_box("Hi"), &config)
                    .unwrap(),
            );
        })
    });
}

criterion_group!(benches, bench_generate_single_byte, bench_generate_two_bytes);
criterion_main!(benches);
