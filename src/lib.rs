//! oxihash - A concurrent chained hash index with online incremental expansion
//!
//! This crate provides the lookup structure of an in-memory key/value
//! cache: a hash index mapping byte-string keys to externally owned items,
//! shared by many request-handling threads and kept at a bounded average
//! chain length by a background maintenance worker that doubles the table
//! without stopping the world.
//!
//! # Features
//!
//! - Per-stripe locking on the hot path; a single global lock is engaged
//!   only while the maintenance worker migrates buckets
//! - Incremental doubling: buckets move from the old table to the new one
//!   in small batches, and lookups route to whichever table currently
//!   holds a key's home bucket
//! - Hashing stays with the caller: every operation takes a precomputed
//!   [`KeyHash`]
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use oxihash::{HashIndex, IndexConfig, Item, KeyHash, MaintenanceWorker};
//! use std::sync::Arc;
//!
//! let index = Arc::new(HashIndex::new(&IndexConfig::from_env()?));
//! let mut worker = MaintenanceWorker::new(Arc::clone(&index));
//! worker.start()?;
//!
//! let hv = KeyHash::new(hash_fn(b"key"));
//! index.insert(Item::new(b"key", b"value"), hv);
//! let found = index.find(b"key", hv);
//!
//! worker.stop();
//! ```

#![warn(missing_docs)]

pub mod config;
pub mod index;
pub mod item;
pub mod locking;
pub mod maintenance;
pub mod stats;

// Re-exports for convenience
pub use config::{ConfigError, IndexConfig};
pub use index::{expansion_threshold, table_mask, table_size, HashIndex, IndexStats, KeyHash};
pub use item::{Item, ItemRef};
pub use locking::LockMode;
pub use maintenance::{MaintenanceWorker, RebalancerControl};
pub use stats::{IndexMetrics, MetricsSnapshot};

/// Prelude module for common imports
pub mod prelude {
    pub use crate::config::IndexConfig;
    pub use crate::index::{HashIndex, KeyHash};
    pub use crate::item::{Item, ItemRef};
    pub use crate::maintenance::MaintenanceWorker;
}
