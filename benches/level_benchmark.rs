use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use tiervault::{
    DataCategory, EncryptionEngine, EncryptionLevel, EngineConfig, MemorySecretStore,
};

fn benchmark_levels(c: &mut Criterion) {
    let engine = EncryptionEngine::initialize(
        Arc::new(MemorySecretStore::with_secret(&[7u8; 32])),
        EngineConfig::default(),
    )
    .unwrap();

    // Warm the key cache so PBKDF2 is not measured.
    engine
        .encrypt(b"warm", DataCategory::PersonalInfo, EncryptionLevel::Basic, "warm")
        .unwrap();

    let sizes = [("100B", 100), ("1KB", 1024), ("10KB", 10 * 1024)];

    let mut group = c.benchmark_group("encrypt");
    for level in [EncryptionLevel::Basic, EncryptionLevel::Standard, EncryptionLevel::High] {
        for (name, size) in sizes {
            let payload = vec![0x42u8; size];
            group.throughput(Throughput::Bytes(size as u64));
            group.bench_with_input(BenchmarkId::new(level.as_str(), name), &payload, |b, p| {
                b.iter(|| {
                    engine
                        .encrypt(black_box(p), DataCategory::PersonalInfo, level, "bench")
                        .unwrap()
                });
            });
        }
    }
    group.finish();

    let mut group = c.benchmark_group("decrypt");
    for level in [EncryptionLevel::Basic, EncryptionLevel::Standard, EncryptionLevel::High] {
        for (name, size) in sizes {
            let artifact = engine
                .encrypt(&vec![0x42u8; size], DataCategory::PersonalInfo, level, "bench")
                .unwrap();
            group.throughput(Throughput::Bytes(size as u64));
            group.bench_with_input(BenchmarkId::new(level.as_str(), name), &artifact, |b, a| {
                b.iter(|| engine.decrypt(black_box(a)).unwrap());
            });
        }
    }
    group.finish();

    // RSA key generation dominates; a handful of samples is enough.
    let mut group = c.benchmark_group("maximum");
    group.sample_size(10);
    let artifact = engine
        .encrypt(&[0x42u8; 1024], DataCategory::LegalDocuments, EncryptionLevel::Maximum, "bench")
        .unwrap();
    group.bench_function("encrypt_1KB", |b| {
        b.iter(|| {
            engine
                .encrypt(
                    black_box(&[0x42u8; 1024]),
                    DataCategory::LegalDocuments,
                    EncryptionLevel::Maximum,
                    "bench",
                )
                .unwrap()
        });
    });
    group.bench_function("decrypt_1KB", |b| {
        b.iter(|| engine.decrypt(black_box(&artifact)).unwrap());
    });
    group.finish();
}

fn benchmark_derivation(c: &mut Criterion) {
    let engine = EncryptionEngine::initialize(
        Arc::new(MemorySecretStore::with_secret(&[7u8; 32])),
        EngineConfig::default(),
    )
    .unwrap();

    let mut group = c.benchmark_group("key_hierarchy");
    group.sample_size(10);
    // Each rotation derives one fresh key per category.
    group.bench_function("rotate", |b| {
        b.iter(|| engine.rotate_keys().unwrap());
    });
    group.finish();
}

criterion_group!(benches, benchmark_levels, benchmark_derivation);
criterion_main!(benches);
