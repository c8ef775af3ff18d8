//! Concurrent callers sharing one service through `Arc`.
//!
//! Whatever the interleaving, a given edge is created at most once and
//! announced at most once.

use std::sync::{Arc, Barrier};
use std::thread;

use blocklist_core::events::RecordingNotifier;
use blocklist_core::{
    BlockEvent, BlockingService, CacheLayer, MemoryCache, MemoryStore, RelationshipStore,
    SqliteCache, SqliteStore, UserId,
};

const THREADS: usize = 8;

fn uid(raw: u64) -> UserId {
    UserId::new(raw)
}

/// Run `op` on `THREADS` threads released together; collect the results.
fn race<S, C, F>(svc: &Arc<BlockingService<S, C, RecordingNotifier>>, op: F) -> Vec<bool>
where
    S: RelationshipStore + 'static,
    C: CacheLayer + 'static,
    F: Fn(&BlockingService<S, C, RecordingNotifier>) -> bool + Send + Sync + 'static,
{
    let barrier = Arc::new(Barrier::new(THREADS));
    let op = Arc::new(op);
    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let svc = Arc::clone(svc);
            let barrier = Arc::clone(&barrier);
            let op = Arc::clone(&op);
            thread::spawn(move || {
                barrier.wait();
                op(&svc)
            })
        })
        .collect();

    handles
        .into_iter()
        .map(|h| h.join().expect("worker panicked"))
        .collect()
}

#[test]
fn concurrent_block_creates_one_edge_and_one_event() {
    let svc = Arc::new(BlockingService::new(
        MemoryStore::new(),
        MemoryCache::default(),
        RecordingNotifier::new(),
    ));

    let results = race(&svc, |svc| svc.block(uid(1), uid(2)).expect("block"));

    assert_eq!(results.iter().filter(|won| **won).count(), 1);
    assert_eq!(svc.blocking_ids(uid(1)).expect("list"), vec![uid(2)]);
    assert_eq!(
        svc.notifier().events(),
        vec![BlockEvent::Blocked {
            actor_id: uid(1),
            target_id: uid(2),
        }]
    );
}

#[test]
fn concurrent_block_on_sqlite_creates_one_edge() {
    let dir = tempfile::tempdir().expect("create temp dir");
    let path = dir.path().join("race.db");
    let svc = Arc::new(BlockingService::new(
        SqliteStore::open(&path).expect("store"),
        SqliteCache::open(&path, "race").expect("cache"),
        RecordingNotifier::new(),
    ));

    let results = race(&svc, |svc| svc.block(uid(7), uid(8)).expect("block"));

    assert_eq!(results.iter().filter(|won| **won).count(), 1);
    assert_eq!(svc.blocking_count(uid(7)).expect("count"), 1);
    assert_eq!(svc.notifier().events().len(), 1);
}

#[test]
fn concurrent_toggles_never_duplicate() {
    let svc = Arc::new(BlockingService::new(
        MemoryStore::new(),
        MemoryCache::default(),
        RecordingNotifier::new(),
    ));

    race(&svc, |svc| svc.toggle_block(uid(3), uid(4)).expect("toggle"));

    // Every event is a real store transition, so the tally of blocks minus
    // unblocks is the final state.
    let events = svc.notifier().events();
    let blocked = events
        .iter()
        .filter(|e| matches!(e, BlockEvent::Blocked { .. }))
        .count();
    let unblocked = events.len() - blocked;
    let now_blocking = svc.is_blocking(uid(3), uid(4)).expect("state");
    assert_eq!(blocked - unblocked, usize::from(now_blocking));
    assert!(svc.blocking_count(uid(3)).expect("count") <= 1);
}

#[test]
fn readers_and_writers_interleave_with_cache_population() {
    let svc = Arc::new(BlockingService::new(
        MemoryStore::new(),
        MemoryCache::default(),
        RecordingNotifier::new(),
    ));

    let writers: Vec<_> = (0..4u64)
        .map(|w| {
            let svc = Arc::clone(&svc);
            thread::spawn(move || {
                for target in 0..50u64 {
                    svc.block(uid(1), uid(100 + w * 50 + target)).expect("block");
                }
            })
        })
        .collect();
    let readers: Vec<_> = (0..4)
        .map(|_| {
            let svc = Arc::clone(&svc);
            thread::spawn(move || {
                for _ in 0..50 {
                    svc.cache_blocking(uid(1), None).expect("populate");
                    let _ = svc.is_blocking(uid(1), uid(120)).expect("read");
                }
            })
        })
        .collect();

    for handle in writers.into_iter().chain(readers) {
        handle.join().expect("thread panicked");
    }

    // After the dust settles a fresh population sees every edge.
    let cached = svc.cache_blocking(uid(1), None).expect("populate");
    assert_eq!(cached.len(), 200);
    assert_eq!(svc.notifier().events().len(), 200);
    assert_eq!(svc.cache_faults(), 0);
}
