//! Metric counters for the hash index.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Atomic gauges and counters maintained by the index.
///
/// Gauges (`power_level`, `table_bytes`, `is_expanding`) are written by
/// the expansion coordinator; operation counters are bumped on the hot
/// path with relaxed ordering.
#[derive(Debug, Default)]
pub struct IndexMetrics {
    /// Current primary-table power.
    pub power_level: AtomicU64,
    /// Approximate bytes held by the table arrays (both tables while an
    /// expansion is live).
    pub table_bytes: AtomicU64,
    /// Whether an expansion is live.
    pub is_expanding: AtomicBool,
    /// Find operations.
    pub finds: AtomicU64,
    /// Insert operations.
    pub inserts: AtomicU64,
    /// Delete operations.
    pub deletes: AtomicU64,
    /// Expansion requests raised by threshold crossings (debounced).
    pub expansion_requests: AtomicU64,
    /// Expansions started.
    pub expansions_started: AtomicU64,
    /// Expansions run to completion.
    pub expansions_completed: AtomicU64,
    /// Expansion starts abandoned for lack of memory.
    pub expansion_failures: AtomicU64,
}

impl IndexMetrics {
    /// Create zeroed metrics.
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_init(&self, power: u8, table_bytes: u64) {
        self.power_level.store(power as u64, Ordering::Relaxed);
        self.table_bytes.store(table_bytes, Ordering::Relaxed);
    }

    pub(crate) fn record_expansion_started(&self, power: u8, table_bytes: u64) {
        self.expansions_started.fetch_add(1, Ordering::Relaxed);
        self.power_level.store(power as u64, Ordering::Relaxed);
        self.table_bytes.store(table_bytes, Ordering::Relaxed);
        self.is_expanding.store(true, Ordering::Relaxed);
    }

    pub(crate) fn record_expansion_completed(&self, power: u8, table_bytes: u64) {
        self.expansions_completed.fetch_add(1, Ordering::Relaxed);
        self.power_level.store(power as u64, Ordering::Relaxed);
        self.table_bytes.store(table_bytes, Ordering::Relaxed);
        self.is_expanding.store(false, Ordering::Relaxed);
    }

    pub(crate) fn record_expansion_failed(&self) {
        self.expansion_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Take a plain snapshot of the current values.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            power_level: self.power_level.load(Ordering::Relaxed) as u8,
            table_bytes: self.table_bytes.load(Ordering::Relaxed),
            is_expanding: self.is_expanding.load(Ordering::Relaxed),
            finds: self.finds.load(Ordering::Relaxed),
            inserts: self.inserts.load(Ordering::Relaxed),
            deletes: self.deletes.load(Ordering::Relaxed),
            expansion_requests: self.expansion_requests.load(Ordering::Relaxed),
            expansions_started: self.expansions_started.load(Ordering::Relaxed),
            expansions_completed: self.expansions_completed.load(Ordering::Relaxed),
            expansion_failures: self.expansion_failures.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`IndexMetrics`].
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    /// Current primary-table power.
    pub power_level: u8,
    /// Approximate bytes held by the table arrays.
    pub table_bytes: u64,
    /// Whether an expansion is live.
    pub is_expanding: bool,
    /// Find operations.
    pub finds: u64,
    /// Insert operations.
    pub inserts: u64,
    /// Delete operations.
    pub deletes: u64,
    /// Expansion requests raised.
    pub expansion_requests: u64,
    /// Expansions started.
    pub expansions_started: u64,
    /// Expansions run to completion.
    pub expansions_completed: u64,
    /// Expansion starts abandoned for lack of memory.
    pub expansion_failures: u64,
}

impl fmt::Display for MetricsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Hash index metrics:")?;
        writeln!(f, "  Power level: {}", self.power_level)?;
        writeln!(f, "  Table bytes: {}", self.table_bytes)?;
        writeln!(f, "  Expanding: {}", self.is_expanding)?;
        writeln!(f, "  Finds: {}", self.finds)?;
        writeln!(f, "  Inserts: {}", self.inserts)?;
        writeln!(f, "  Deletes: {}", self.deletes)?;
        writeln!(f, "  Expansion requests: {}", self.expansion_requests)?;
        writeln!(f, "  Expansions started: {}", self.expansions_started)?;
        writeln!(f, "  Expansions completed: {}", self.expansions_completed)?;
        writeln!(f, "  Expansion failures: {}", self.expansion_failures)
    }
}
