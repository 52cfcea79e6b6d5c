//! Shared test utilities.

#![allow(dead_code)]

use std::hash::{BuildHasher, Hasher};

use ahash::RandomState;
use oxihash::{HashIndex, IndexConfig, Item, KeyHash};

/// Fixed-seed hasher so test runs are reproducible.
pub fn hasher() -> RandomState {
    RandomState::with_seeds(
        0x6c62272e07bb0142,
        0x62b821756295c58d,
        0x2b32db04c76e95bf,
        0x5851f42d4c957f2d,
    )
}

/// Hash a key the way the cache's dispatch layer would.
pub fn hash_of(key: &[u8]) -> KeyHash {
    let mut h = hasher().build_hasher();
    h.write(key);
    KeyHash::new(h.finish())
}

/// A small index suitable for exercising expansion quickly.
pub fn small_index(power: u8) -> HashIndex {
    HashIndex::new(&IndexConfig::new(power))
}

/// Insert a key with a hashed key, returning the hash used.
pub fn insert_hashed(index: &HashIndex, key: &[u8], value: &[u8]) -> KeyHash {
    let hv = hash_of(key);
    index.insert(Item::new(key, value), hv);
    hv
}

/// Insert a key under a literal hash value.
pub fn insert_at(index: &HashIndex, key: &[u8], hv: u64) {
    index.insert(Item::new(key, b"value"), KeyHash::new(hv));
}
