//! Retrieval benchmarks: record throughput, similarity search, recency
//! scans and the composite context query.
//!
//! Run with `cargo bench --bench retrieval`.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use pulsedb::{
    ContextRequest, Database, EmbeddingDimension, ExperienceKind, NewExperience, PulseConfig,
    SyncMode,
};
use tempfile::TempDir;

const DIM: usize = 64;

fn config(sync_mode: SyncMode) -> PulseConfig {
    PulseConfig {
        embedding_dimension: EmbeddingDimension::Custom(DIM),
        sync_mode,
        ..Default::default()
    }
}

fn pseudo_embedding(seed: u64) -> Vec<f32> {
    // SplitMix64-ish stream, deterministic per seed
    let mut state = seed.wrapping_add(0x9e3779b97f4a7c15);
    (0..DIM)
        .map(|_| {
            state ^= state >> 30;
            state = state.wrapping_mul(0xbf58476d1ce4e5b9);
            ((state >> 40) as f32 / (1u64 << 24) as f32) - 0.5
        })
        .collect()
}

fn populated(count: u64, sync_mode: SyncMode) -> (Database, TempDir, pulsedb::CollectiveId) {
    let dir = TempDir::new().unwrap();
    let db = Database::open(dir.path(), config(sync_mode)).unwrap();
    let collective = db.create_collective("bench", None).unwrap();
    for i in 0..count {
        db.record_experience(
            NewExperience::new(
                collective,
                format!("experience number {i}"),
                ExperienceKind::Generic { category: None },
            )
            .with_embedding(pseudo_embedding(i)),
        )
        .unwrap();
    }
    (db, dir, collective)
}

fn bench_record(c: &mut Criterion) {
    let mut group = c.benchmark_group("record_experience");
    for sync_mode in [SyncMode::Fast, SyncMode::Normal] {
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{sync_mode:?}")),
            &sync_mode,
            |b, &sync_mode| {
                let (db, _dir, collective) = populated(0, sync_mode);
                let mut i = 0u64;
                b.iter(|| {
                    i += 1;
                    db.record_experience(
                        NewExperience::new(
                            collective,
                            format!("bench {i}"),
                            ExperienceKind::Generic { category: None },
                        )
                        .with_embedding(pseudo_embedding(i)),
                    )
                    .unwrap()
                });
            },
        );
    }
    group.finish();
}

fn bench_search(c: &mut Criterion) {
    let mut group = c.benchmark_group("search_similar");
    for size in [1_000u64, 10_000] {
        let (db, _dir, collective) = populated(size, SyncMode::Fast);
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            let query = pseudo_embedding(u64::MAX / 2);
            b.iter(|| db.search_similar(collective, black_box(&query), 10).unwrap());
        });
    }
    group.finish();
}

fn bench_recent(c: &mut Criterion) {
    let (db, _dir, collective) = populated(10_000, SyncMode::Fast);
    c.bench_function("get_recent_experiences/limit=50", |b| {
        b.iter(|| db.get_recent_experiences(collective, black_box(50), None).unwrap());
    });
}

fn bench_context(c: &mut Criterion) {
    let (db, _dir, collective) = populated(5_000, SyncMode::Fast);
    c.bench_function("get_context_candidates", |b| {
        let query = pseudo_embedding(7);
        b.iter(|| {
            db.get_context_candidates(ContextRequest::new(collective, black_box(query.clone())))
                .unwrap()
        });
    });
}

criterion_group!(benches, bench_record, bench_search, bench_recent, bench_context);
criterion_main!(benches);
