//! Locking modes for index access.
//!
//! The index operates under two mutually exclusive locking regimes:
//!
//! - **Fine-grained** (the default): readers and writers take a
//!   per-stripe mutex selected by the key hash. Operations on disjoint
//!   stripes proceed in parallel.
//! - **Global**: one mutex serialises every index operation. This mode
//!   is engaged only while the maintenance worker migrates buckets.
//!
//! Every operation holds a read guard on the mode for its whole
//! duration, plus whichever mutex the current mode selects. Switching
//! modes takes the write lock, which waits for every in-flight guard to
//! drain. That write barrier gives the three switch guarantees:
//!
//! - A switch is observed atomically; no thread ever holds one mode's
//!   lock while another thread holds the other's.
//! - While global mode is engaged, no thread holds a stripe lock.
//! - A thread that selected a bucket under one mode completes its
//!   operation before any transition is observed.
//!
//! The stripe for a hash is its low `lock_power` bits. `lock_power`
//! never exceeds the initial table power, and table powers only grow, so
//! all keys of one bucket (in either table, at any power) always share a
//! stripe.

use parking_lot::{Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::index::{table_size, KeyHash};

/// Locking regime the index is currently operating under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    /// Per-stripe locking; the normal hot path.
    Granular,
    /// One process-wide lock; engaged only during expansion work.
    Global,
}

/// The stripe table and mode switch.
pub(crate) struct LockTable {
    mode: RwLock<LockMode>,
    stripes: Box<[Mutex<()>]>,
    lock_power: u8,
    global: Mutex<()>,
}

/// Guard held by an index operation for its whole duration.
///
/// Holds the mode read guard plus the mutex the mode selected; dropping
/// it releases both.
pub(crate) struct AccessGuard<'a> {
    _mode: RwLockReadGuard<'a, LockMode>,
    _lock: MutexGuard<'a, ()>,
}

impl LockTable {
    pub(crate) fn new(lock_power: u8) -> Self {
        let stripes = (0..table_size(lock_power))
            .map(|_| Mutex::new(()))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        Self {
            mode: RwLock::new(LockMode::Granular),
            stripes,
            lock_power,
            global: Mutex::new(()),
        }
    }

    /// Acquire whichever lock the current mode requires for this hash.
    pub(crate) fn lock(&self, hash: KeyHash) -> AccessGuard<'_> {
        let mode = self.mode.read();
        let lock = match *mode {
            LockMode::Granular => self.stripes[hash.stripe_index(self.lock_power)].lock(),
            LockMode::Global => self.global.lock(),
        };
        AccessGuard {
            _mode: mode,
            _lock: lock,
        }
    }

    /// Acquire the global mutex directly, without a mode guard.
    ///
    /// Used by the expansion coordinator, which runs while the mode is
    /// already `Global` and therefore contends with operations on this
    /// mutex alone.
    pub(crate) fn lock_global(&self) -> MutexGuard<'_, ()> {
        self.global.lock()
    }

    /// Switch modes. Blocks until every in-flight access guard drains.
    pub(crate) fn set_mode(&self, mode: LockMode) {
        *self.mode.write() = mode;
    }

    /// The current mode.
    pub(crate) fn mode(&self) -> LockMode {
        *self.mode.read()
    }

    /// Exclusive hold on the mode, draining all access guards and
    /// blocking new ones. Pair with [`LockTable::lock_global`] to quiesce
    /// the index entirely.
    pub(crate) fn exclusive(&self) -> RwLockWriteGuard<'_, LockMode> {
        self.mode.write()
    }
}
