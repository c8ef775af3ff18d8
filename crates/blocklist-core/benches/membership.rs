//! Membership check latency: cached snapshot vs. store lookup.
//!
//! Run with:
//! ```sh
//! cargo bench --bench membership
//! ```

use std::time::Duration;

use blocklist_core::events::NullNotifier;
use blocklist_core::{BlockingService, MemoryCache, MemoryStore, SqliteCache, SqliteStore, UserId};
use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};

/// Blocked-set sizes per subject.
const SIZES: [u64; 3] = [10, 1_000, 10_000];
const SUBJECT: UserId = UserId::new(1);
const HOUR: Duration = Duration::from_secs(3600);

fn seed<S, C>(svc: &BlockingService<S, C, NullNotifier>, size: u64)
where
    S: blocklist_core::RelationshipStore,
    C: blocklist_core::CacheLayer,
{
    for target in 2..size + 2 {
        svc.block(SUBJECT, UserId::new(target)).expect("seed block");
    }
}

fn bench_memory(c: &mut Criterion) {
    let mut group = c.benchmark_group("membership.memory");

    for size in SIZES {
        let svc = BlockingService::new(MemoryStore::new(), MemoryCache::default(), NullNotifier);
        seed(&svc, size);
        let probe = UserId::new(size / 2 + 2);

        group.bench_with_input(BenchmarkId::new("store", size), &probe, |b, probe| {
            svc.clear_blocking_cache(SUBJECT).expect("clear");
            b.iter(|| black_box(svc.is_blocking(SUBJECT, *probe).expect("check")));
        });

        group.bench_with_input(BenchmarkId::new("cached", size), &probe, |b, probe| {
            svc.cache_blocking(SUBJECT, Some(HOUR)).expect("warm");
            b.iter(|| black_box(svc.is_blocking(SUBJECT, *probe).expect("check")));
        });
    }

    group.finish();
}

fn bench_sqlite(c: &mut Criterion) {
    let mut group = c.benchmark_group("membership.sqlite");
    let dir = tempfile::tempdir().expect("temp dir");

    for size in SIZES {
        let path = dir.path().join(format!("bench-{size}.db"));
        let svc = BlockingService::new(
            SqliteStore::open(&path).expect("store"),
            SqliteCache::open(&path, "bench").expect("cache"),
            NullNotifier,
        );
        seed(&svc, size);
        let probe = UserId::new(size / 2 + 2);

        group.bench_with_input(BenchmarkId::new("store", size), &probe, |b, probe| {
            svc.clear_blocking_cache(SUBJECT).expect("clear");
            b.iter(|| black_box(svc.is_blocking(SUBJECT, *probe).expect("check")));
        });

        group.bench_with_input(BenchmarkId::new("cached", size), &probe, |b, probe| {
            svc.cache_blocking(SUBJECT, Some(HOUR)).expect("warm");
            b.iter(|| black_box(svc.is_blocking(SUBJECT, *probe).expect("check")));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_memory, bench_sqlite);
criterion_main!(benches);
