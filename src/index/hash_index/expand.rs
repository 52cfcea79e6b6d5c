//! Incremental expansion of the primary table.
//!
//! Expansion doubles the table without stopping the world: the primary
//! becomes the old table, a table of twice the size takes its place, and
//! the maintenance worker drains old buckets into it a batch at a time
//! under the global lock. Readers and writers keep running between
//! batches; a key's home bucket moves from the old table to the primary
//! exactly when its old bucket crosses the frontier.

use std::mem;
use std::sync::atomic::Ordering;

use crate::config::MAX_HASH_POWER;
use crate::index::{chain, table_size, BucketTable};
use crate::locking::LockMode;

use super::{HashIndex, TablePair};

impl HashIndex {
    /// Begin an expansion: switch every thread to the global lock, alias
    /// the primary table as old, and install a primary of twice the
    /// size.
    ///
    /// Returns `false` and leaves the index unchanged (back under
    /// fine-grained locking) if the new table cannot be allocated or the
    /// power ceiling is reached; the index keeps serving at its current
    /// size. Returns `true` if an expansion is now live, including when
    /// one already was.
    ///
    /// This is part of the maintenance protocol and is driven by a
    /// single thread, normally the
    /// [`MaintenanceWorker`](crate::MaintenanceWorker).
    pub fn start_expansion(&self) -> bool {
        self.locks.set_mode(LockMode::Global);

        let started = {
            let _guard = self.locks.lock_global();
            // SAFETY: global mode routes every operation through the
            // global mutex we hold; no other reference into the tables
            // exists.
            let state = unsafe { &mut *self.state.get() };

            if state.old.is_some() {
                return true;
            }

            let next_power = state.primary.power() + 1;
            if next_power > MAX_HASH_POWER {
                tracing::warn!(
                    power = state.primary.power(),
                    "hash table at maximum power, expansion skipped"
                );
                false
            } else {
                match BucketTable::try_new(next_power) {
                    Ok(fresh) => {
                        let old = mem::replace(&mut state.primary, fresh);
                        state.old = Some(old);
                        state.frontier = 0;
                        self.expanding.store(true, Ordering::Release);
                        self.metrics
                            .record_expansion_started(next_power, state.table_bytes());
                        tracing::info!(
                            power = next_power,
                            buckets = table_size(next_power),
                            items = self.count.load(Ordering::Relaxed),
                            "hash table expansion starting"
                        );
                        true
                    }
                    Err(err) => {
                        // Bad news, but the old table keeps serving.
                        self.metrics.record_expansion_failed();
                        tracing::error!(
                            power = next_power,
                            error = %err,
                            "hash table expansion failed, continuing at current size"
                        );
                        false
                    }
                }
            }
        };

        if !started {
            self.locks.set_mode(LockMode::Granular);
        }
        started
    }

    /// Migrate up to `bulk_move` old buckets under one global-lock
    /// acquisition.
    ///
    /// Returns `true` once no expansion is live, at which point the
    /// index is back under fine-grained locking. Between calls the
    /// global lock is released so readers and writers can progress.
    pub fn expand_step(&self) -> bool {
        let finished = {
            let _guard = self.locks.lock_global();
            // SAFETY: as in `start_expansion`.
            let state = unsafe { &mut *self.state.get() };

            if state.old.is_none() {
                true
            } else {
                let mut exhausted = false;
                for _ in 0..self.bulk_move {
                    exhausted = Self::migrate_bucket(state);
                    if exhausted {
                        break;
                    }
                }
                if exhausted {
                    state.old = None;
                    state.frontier = 0;
                    self.expanding.store(false, Ordering::Release);
                    self.metrics.record_expansion_completed(
                        state.primary.power(),
                        state.primary.bytes(),
                    );
                    tracing::info!(
                        power = state.primary.power(),
                        items = self.count.load(Ordering::Relaxed),
                        "hash table expansion done"
                    );
                }
                exhausted
            }
        };

        if finished {
            self.locks.set_mode(LockMode::Granular);
        }
        finished
    }

    /// Drain the frontier bucket of the old table into the primary.
    ///
    /// The old chain is consumed head-first and each item is re-homed by
    /// its stored hash under the doubled mask, so colliding items split
    /// between the two candidate primary buckets. Returns `true` when
    /// the old table is exhausted.
    fn migrate_bucket(state: &mut TablePair) -> bool {
        let TablePair {
            primary,
            old,
            frontier,
        } = state;
        let Some(old_table) = old.as_mut() else {
            return true;
        };

        let mut pending = old_table.chain_mut(*frontier).take();
        while let Some(mut item) = pending {
            pending = item.next.take();
            let dest = primary.bucket_for(item.hash);
            chain::prepend(primary.chain_mut(dest), item);
        }

        *frontier += 1;
        *frontier == old_table.size()
    }
}
