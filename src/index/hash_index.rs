//! The index façade and expansion coordinator.
//!
//! Note: this file is the `hash_index` module entrypoint and only
//! contains type definitions and module wiring. The operations live in
//! `src/index/hash_index/ops.rs` and the expansion coordinator in
//! `src/index/hash_index/expand.rs`.

use std::cell::UnsafeCell;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64};

use crate::index::{Bucket, BucketTable};
use crate::locking::LockTable;
use crate::maintenance::MaintenanceSignal;
use crate::stats::IndexMetrics;
use crate::KeyHash;

/// The two tables plus migration progress.
///
/// `old` is `Some` exactly while an expansion is live. Buckets of `old`
/// below `frontier` have been drained into `primary`; buckets at or above
/// it are untouched since the expansion began.
pub(crate) struct TablePair {
    pub(crate) primary: BucketTable,
    pub(crate) old: Option<BucketTable>,
    pub(crate) frontier: u64,
}

impl TablePair {
    /// The bucket a key with this hash currently lives in.
    ///
    /// During expansion a key's home stays in the old table until its old
    /// bucket has been migrated; exactly one bucket is ever consulted,
    /// with no fallback to the other table.
    pub(crate) fn locate(&self, hash: KeyHash) -> &Bucket {
        if let Some(old) = &self.old {
            let old_bucket = old.bucket_for(hash);
            if old_bucket >= self.frontier {
                return old.bucket(old_bucket);
            }
        }
        self.primary.bucket(self.primary.bucket_for(hash))
    }

    /// Approximate bytes held by the live table arrays.
    pub(crate) fn table_bytes(&self) -> u64 {
        self.primary.bytes() + self.old.as_ref().map_or(0, |t| t.bytes())
    }
}

/// Concurrent hash index mapping byte-string keys to cached items.
///
/// Many threads perform [`find`](HashIndex::find),
/// [`insert`](HashIndex::insert) and [`delete`](HashIndex::delete) under
/// per-stripe locks; a single maintenance thread doubles the table
/// incrementally under the global lock (see
/// [`MaintenanceWorker`](crate::MaintenanceWorker)). All operations take
/// the key's precomputed hash; the index has no hashing policy of its
/// own.
pub struct HashIndex {
    pub(crate) locks: LockTable,
    /// Guarded by the locking protocol: operations create only shared
    /// references and mutate individual buckets under their stripe lock;
    /// exclusive references exist only under the global lock in global
    /// mode (coordinator) or with the mode held exclusively
    /// (`distribution`).
    pub(crate) state: UnsafeCell<TablePair>,
    /// Items linked into either table.
    pub(crate) count: AtomicU64,
    /// Mirror of `state.old.is_some()` for lock-free observation.
    pub(crate) expanding: AtomicBool,
    pub(crate) signal: MaintenanceSignal,
    pub(crate) metrics: IndexMetrics,
    /// Old-table buckets migrated per global-lock acquisition.
    pub(crate) bulk_move: usize,
}

// Safety: the tables inside the UnsafeCell are only referenced under the
// locking protocol described on `state`; everything else is atomics or
// internally synchronised.
unsafe impl Send for HashIndex {}
unsafe impl Sync for HashIndex {}

/// Snapshot of the index layout produced by an exhaustive walk.
#[derive(Debug, Clone)]
pub struct IndexStats {
    /// Current primary-table power.
    pub power: u8,
    /// Primary-table bucket count.
    pub buckets: u64,
    /// Items linked, per the maintained counter.
    pub items: u64,
    /// Items discovered by walking every chain in both tables.
    pub chained_items: u64,
    /// Longest chain seen.
    pub longest_chain: usize,
    /// Whether an expansion is live.
    pub expanding: bool,
    /// Next old-table bucket to migrate; 0 when not expanding.
    pub frontier: u64,
    /// Approximate bytes held by the table arrays.
    pub table_bytes: u64,
}

impl IndexStats {
    /// Items per primary bucket.
    pub fn load_factor(&self) -> f64 {
        if self.buckets == 0 {
            return 0.0;
        }
        self.items as f64 / self.buckets as f64
    }
}

impl fmt::Display for IndexStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Index layout:")?;
        writeln!(f, "  Power: {}", self.power)?;
        writeln!(f, "  Buckets: {}", self.buckets)?;
        writeln!(f, "  Items: {}", self.items)?;
        writeln!(f, "  Chained items: {}", self.chained_items)?;
        writeln!(f, "  Longest chain: {}", self.longest_chain)?;
        writeln!(f, "  Expanding: {}", self.expanding)?;
        writeln!(f, "  Frontier: {}", self.frontier)?;
        writeln!(f, "  Table bytes: {}", self.table_bytes)?;
        writeln!(f, "  Load factor: {:.2}", self.load_factor())
    }
}

mod expand;
mod ops;
