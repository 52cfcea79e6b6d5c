use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use crate::config::{IndexConfig, DEFAULT_HASH_POWER, MAX_HASH_POWER};
use crate::index::{chain, expansion_threshold, BucketTable, KeyHash};
use crate::item::{Item, ItemRef};
use crate::locking::LockTable;
use crate::maintenance::MaintenanceSignal;
use crate::stats::IndexMetrics;

use super::{HashIndex, IndexStats, TablePair};

impl HashIndex {
    /// Create a new index from a configuration.
    ///
    /// An `initial_power` of zero selects the default
    /// ([`DEFAULT_HASH_POWER`]). The stripe power is clamped to the
    /// initial power so every key of a bucket shares a stripe.
    ///
    /// # Panics
    /// Panics if the initial power exceeds [`MAX_HASH_POWER`].
    pub fn new(config: &IndexConfig) -> Self {
        let power = if config.initial_power == 0 {
            DEFAULT_HASH_POWER
        } else {
            config.initial_power
        };
        assert!(
            power <= MAX_HASH_POWER,
            "initial power {power} exceeds maximum {MAX_HASH_POWER}"
        );

        let bulk_move = config.bulk_move.max(1);
        let lock_power = config.lock_power.min(power);
        let primary = BucketTable::new(power);

        let metrics = IndexMetrics::new();
        metrics.record_init(power, primary.bytes());

        Self {
            locks: LockTable::new(lock_power),
            state: UnsafeCell::new(TablePair {
                primary,
                old: None,
                frontier: 0,
            }),
            count: AtomicU64::new(0),
            expanding: AtomicBool::new(false),
            signal: MaintenanceSignal::new(),
            metrics,
            bulk_move,
        }
    }

    /// Look up an item by key and return its identity handle.
    ///
    /// Returns the item currently linked under the key, or `None`. The
    /// item's content is not copied; see [`HashIndex::find_with`] for
    /// borrowing access under the index's lock.
    pub fn find(&self, key: &[u8], hash: KeyHash) -> Option<ItemRef> {
        let _guard = self.locks.lock(hash);
        self.metrics.finds.fetch_add(1, Ordering::Relaxed);

        // SAFETY: exclusive references into the tables exist only while
        // the index is quiesced, which cannot overlap a held access
        // guard.
        let state = unsafe { &*self.state.get() };
        let bucket = state.locate(hash);
        // SAFETY: the access guard covers this bucket.
        let head = unsafe { bucket.chain() };
        chain::find(head, key).map(ItemRef::new)
    }

    /// Look up an item and run `f` on it under the index's lock.
    pub fn find_with<R>(&self, key: &[u8], hash: KeyHash, f: impl FnOnce(&Item) -> R) -> Option<R> {
        let _guard = self.locks.lock(hash);
        self.metrics.finds.fetch_add(1, Ordering::Relaxed);

        // SAFETY: as in `find`.
        let state = unsafe { &*self.state.get() };
        let bucket = state.locate(hash);
        // SAFETY: the access guard covers this bucket.
        let head = unsafe { bucket.chain() };
        chain::find(head, key).map(f)
    }

    /// Whether an item with this key is indexed.
    pub fn contains(&self, key: &[u8], hash: KeyHash) -> bool {
        self.find_with(key, hash, |_| ()).is_some()
    }

    /// Link an item into the index.
    ///
    /// The caller must guarantee that no item with the same key is
    /// currently indexed (a prior [`find`](HashIndex::find) under the
    /// same lock); duplicates are a contract violation and assert in
    /// debug builds. Crossing the load threshold requests an expansion
    /// from the maintenance worker; the decision itself never runs on
    /// this path.
    pub fn insert(&self, mut item: Box<Item>, hash: KeyHash) {
        let _guard = self.locks.lock(hash);
        self.metrics.inserts.fetch_add(1, Ordering::Relaxed);
        item.hash = hash;

        // SAFETY: as in `find`.
        let state = unsafe { &*self.state.get() };
        let bucket = state.locate(hash);
        // SAFETY: the access guard makes this bucket access exclusive.
        let head = unsafe { bucket.chain_mut() };
        debug_assert!(
            chain::find(head, item.key()).is_none(),
            "insert of a key that is already indexed"
        );
        chain::prepend(head, item);

        let count = self.count.fetch_add(1, Ordering::Relaxed) + 1;
        if state.old.is_none() && count > expansion_threshold(state.primary.power()) {
            self.request_expansion();
        }
    }

    /// Unlink an item by key and return it to the caller.
    ///
    /// Deleting an absent key is a contract violation (callers verify
    /// presence under the same lock) and asserts in debug builds.
    pub fn delete(&self, key: &[u8], hash: KeyHash) -> Option<Box<Item>> {
        let _guard = self.locks.lock(hash);
        self.metrics.deletes.fetch_add(1, Ordering::Relaxed);

        // SAFETY: as in `find`.
        let state = unsafe { &*self.state.get() };
        let bucket = state.locate(hash);
        // SAFETY: the access guard makes this bucket access exclusive.
        let head = unsafe { bucket.chain_mut() };
        let removed = chain::unlink(head, key);
        debug_assert!(removed.is_some(), "delete of a key that is not indexed");
        if removed.is_some() {
            self.count.fetch_sub(1, Ordering::Relaxed);
        }
        removed
    }

    /// Number of items linked into either table.
    #[inline]
    pub fn len(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    /// Whether the index holds no items.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current primary-table power.
    #[inline]
    pub fn power(&self) -> u8 {
        self.metrics.power_level.load(Ordering::Relaxed) as u8
    }

    /// Whether an expansion is live.
    #[inline]
    pub fn is_expanding(&self) -> bool {
        self.expanding.load(Ordering::Acquire)
    }

    /// Whether an expansion request is pending with the maintenance
    /// worker.
    pub fn expansion_requested(&self) -> bool {
        self.signal.is_requested()
    }

    /// The index's metric counters.
    pub fn metrics(&self) -> &IndexMetrics {
        &self.metrics
    }

    /// Quiesce the index and report its layout from an exhaustive walk
    /// of both tables.
    pub fn distribution(&self) -> IndexStats {
        let _mode = self.locks.exclusive();
        let _global = self.locks.lock_global();

        // SAFETY: the exclusive mode hold drains every access guard and
        // blocks new ones, and the global mutex excludes the expansion
        // coordinator; no other reference into the tables can exist.
        let state = unsafe { &mut *self.state.get() };

        let mut chained_items = 0u64;
        let mut longest_chain = 0usize;
        {
            let mut scan = |table: &mut BucketTable| {
                for index in 0..table.size() {
                    let chain_len = chain::len(table.chain_mut(index));
                    chained_items += chain_len as u64;
                    longest_chain = longest_chain.max(chain_len);
                }
            };
            scan(&mut state.primary);
            if let Some(old) = state.old.as_mut() {
                scan(old);
            }
        }

        IndexStats {
            power: state.primary.power(),
            buckets: state.primary.size(),
            items: self.count.load(Ordering::Relaxed),
            chained_items,
            longest_chain,
            expanding: state.old.is_some(),
            frontier: state.frontier,
            table_bytes: state.table_bytes(),
        }
    }

    /// Record a threshold crossing with the maintenance worker. The
    /// request flag is a debounce: repeat crossings before the worker
    /// wakes are no-ops.
    fn request_expansion(&self) {
        if self.signal.request() {
            self.metrics.expansion_requests.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(
                items = self.count.load(Ordering::Relaxed),
                power = self.power(),
                "hash table expansion requested"
            );
        }
    }
}
