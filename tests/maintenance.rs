//! Integration tests for the maintenance worker.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use oxihash::{
    expansion_threshold, HashIndex, IndexConfig, Item, KeyHash, MaintenanceWorker,
    RebalancerControl,
};

mod common;
use common::insert_at;

/// Poll until `cond` holds or the deadline passes.
fn wait_for(cond: impl Fn() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while !cond() {
        assert!(Instant::now() < deadline, "condition not reached in time");
        thread::sleep(Duration::from_millis(5));
    }
}

/// Mock rebalancer recording pause/resume edges.
#[derive(Default)]
struct MockRebalancer {
    paused: AtomicBool,
    pauses: AtomicU64,
    resumes: AtomicU64,
}

impl RebalancerControl for MockRebalancer {
    fn pause(&self) {
        self.paused.store(true, Ordering::Release);
        self.pauses.fetch_add(1, Ordering::Relaxed);
    }

    fn resume(&self) {
        self.paused.store(false, Ordering::Release);
        self.resumes.fetch_add(1, Ordering::Relaxed);
    }
}

#[test]
fn test_start_stop_lifecycle() {
    let index = Arc::new(HashIndex::new(&IndexConfig::new(4)));
    let mut worker = MaintenanceWorker::new(Arc::clone(&index));

    assert!(!worker.is_running());
    assert!(worker.start().unwrap());
    assert!(worker.is_running());

    // Second start is a no-op.
    assert!(!worker.start().unwrap());

    worker.stop();
    assert!(!worker.is_running());

    // The worker can be restarted after a stop.
    assert!(worker.start().unwrap());
    worker.stop();
}

#[test]
fn test_lifecycle_without_expansion() {
    // Never crossing the load threshold: the worker comes and goes
    // without any resize ever being performed.
    let index = Arc::new(HashIndex::new(&IndexConfig::new(4)));
    let mut worker = MaintenanceWorker::new(Arc::clone(&index));
    worker.start().unwrap();

    for hv in 0u64..8 {
        insert_at(&index, format!("key-{hv}").as_bytes(), hv);
    }
    thread::sleep(Duration::from_millis(50));

    worker.stop();

    assert_eq!(index.power(), 4);
    assert!(!index.is_expanding());
    assert_eq!(index.metrics().snapshot().expansions_completed, 0);
}

#[test]
fn test_threshold_crossing_drives_expansion() {
    let index = Arc::new(HashIndex::new(&IndexConfig::new(2)));
    let mut worker = MaintenanceWorker::new(Arc::clone(&index));
    worker.start().unwrap();

    for hv in 0u64..7 {
        insert_at(&index, format!("key-{hv}").as_bytes(), hv);
    }

    wait_for(|| index.power() == 3 && !index.is_expanding());
    worker.stop();

    for hv in 0u64..7 {
        assert!(index.contains(format!("key-{hv}").as_bytes(), KeyHash::new(hv)));
    }
    let stats = index.distribution();
    assert_eq!(stats.buckets, 8);
    assert_eq!(stats.chained_items, 7);
    assert_eq!(index.metrics().snapshot().expansions_completed, 1);
}

#[test]
fn test_expansions_chain_under_sustained_load() {
    let index = Arc::new(HashIndex::new(&IndexConfig::new(2).with_bulk_move(2)));
    let mut worker = MaintenanceWorker::new(Arc::clone(&index));
    worker.start().unwrap();

    for i in 0u64..200 {
        let key = format!("obj:{i}");
        index.insert(
            Item::new(key.as_bytes(), b"v"),
            KeyHash::new(i.wrapping_mul(0x9e3779b97f4a7c15)),
        );
    }

    // Threshold crossings are detected on insert, so keep trickling
    // items until the table catches up with the load. 200 items settle
    // once 2^p * 3/2 >= 200, i.e. at power 8.
    let deadline = Instant::now() + Duration::from_secs(10);
    let mut extra = 0u64;
    loop {
        let settled = !index.is_expanding()
            && !index.expansion_requested()
            && index.len() <= expansion_threshold(index.power());
        if settled {
            break;
        }
        assert!(Instant::now() < deadline, "expansions did not settle in time");
        if !index.is_expanding() && !index.expansion_requested() {
            let key = format!("extra:{extra}");
            index.insert(
                Item::new(key.as_bytes(), b"v"),
                KeyHash::new((1000 + extra).wrapping_mul(0x9e3779b97f4a7c15)),
            );
            extra += 1;
        }
        thread::sleep(Duration::from_millis(2));
    }
    worker.stop();

    assert_eq!(index.power(), 8);
    assert_eq!(index.len(), 200 + extra);
    let stats = index.distribution();
    assert_eq!(stats.chained_items, stats.items);
}

#[test]
fn test_shutdown_while_expanding() {
    let index = Arc::new(HashIndex::new(&IndexConfig::new(10)));
    let mut worker = MaintenanceWorker::new(Arc::clone(&index));

    // Start a large expansion by hand, then let the worker pick it up
    // and stop it mid-flight.
    assert!(index.start_expansion());
    worker.start().unwrap();
    worker.stop();

    // The index stays correct whether or not the expansion finished.
    insert_at(&index, b"after", 0x123);
    assert!(index.contains(b"after", KeyHash::new(0x123)));

    // A restarted worker picks the leftover migration back up.
    let mut worker = MaintenanceWorker::new(Arc::clone(&index));
    worker.start().unwrap();
    wait_for(|| !index.is_expanding());
    worker.stop();

    assert!(index.contains(b"after", KeyHash::new(0x123)));
}

#[test]
fn test_rebalancer_pause_resume_edges() {
    let index = Arc::new(HashIndex::new(&IndexConfig::new(2)));
    let rebalancer = Arc::new(MockRebalancer::default());
    let mut worker = MaintenanceWorker::new(Arc::clone(&index))
        .with_rebalancer(Arc::clone(&rebalancer) as Arc<dyn RebalancerControl>);
    worker.start().unwrap();

    for hv in 0u64..7 {
        insert_at(&index, format!("key-{hv}").as_bytes(), hv);
    }
    wait_for(|| index.power() == 3 && !index.is_expanding());

    // The expansion paused the rebalancer once and resumed it after.
    wait_for(|| rebalancer.resumes.load(Ordering::Relaxed) >= 2);
    assert_eq!(rebalancer.pauses.load(Ordering::Relaxed), 1);
    assert!(!rebalancer.paused.load(Ordering::Acquire));

    worker.stop();
}

#[test]
fn test_concurrent_inserts_with_live_worker() {
    let index = Arc::new(HashIndex::new(&IndexConfig::new(4)));
    let mut worker = MaintenanceWorker::new(Arc::clone(&index));
    worker.start().unwrap();

    let threads = 4u64;
    let per_thread = 400u64;
    let handles: Vec<_> = (0..threads)
        .map(|t| {
            let index = Arc::clone(&index);
            thread::spawn(move || {
                for i in 0..per_thread {
                    let key = format!("t{t}:{i}");
                    let hv = KeyHash::new((t * per_thread + i).wrapping_mul(0x9e3779b97f4a7c15));
                    index.insert(Item::new(key.as_bytes(), b"v"), hv);
                    assert!(index.contains(key.as_bytes(), hv));
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    wait_for(|| !index.is_expanding() && !index.expansion_requested());
    worker.stop();

    assert_eq!(index.len(), threads * per_thread);
    let stats = index.distribution();
    assert_eq!(stats.chained_items, stats.items);
    assert!(index.power() > 4);
}
