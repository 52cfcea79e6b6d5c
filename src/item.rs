//! Cached item records.
//!
//! An [`Item`] is owned by the cache's allocation layer; the index only
//! threads it onto singly-linked bucket chains through the reserved
//! `next` field. Ownership of the box moves into the index on insert and
//! back out on delete. The index never copies keys or values.

use std::fmt;
use std::ptr::NonNull;

use crate::index::KeyHash;

/// A cached item.
///
/// The record stores its key bytes, an opaque value, the hash stamped by
/// the index on insert, and the chain link reserved for the index.
pub struct Item {
    /// Next item in the bucket chain. Written only by the index.
    pub(crate) next: Option<Box<Item>>,
    /// Hash of the key, stamped by the index on insert.
    pub(crate) hash: KeyHash,
    key: Box<[u8]>,
    value: Box<[u8]>,
}

impl Item {
    /// Allocate a new, unlinked item.
    pub fn new(key: &[u8], value: &[u8]) -> Box<Item> {
        Box::new(Item {
            next: None,
            hash: KeyHash::new(0),
            key: key.into(),
            value: value.into(),
        })
    }

    /// The item's key bytes.
    #[inline]
    pub fn key(&self) -> &[u8] {
        &self.key
    }

    /// The item's value bytes.
    #[inline]
    pub fn value(&self) -> &[u8] {
        &self.value
    }

    /// The hash the item was inserted under.
    #[inline]
    pub fn hash(&self) -> KeyHash {
        self.hash
    }

    /// Key equality is `(length, bytes)` equality.
    #[inline]
    pub(crate) fn key_matches(&self, key: &[u8]) -> bool {
        self.key.len() == key.len() && *self.key == *key
    }
}

impl fmt::Debug for Item {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Item")
            .field("key", &self.key)
            .field("hash", &self.hash)
            .field("value_len", &self.value.len())
            .finish()
    }
}

/// Identity handle to an indexed item, as returned by
/// [`HashIndex::find`](crate::HashIndex::find).
///
/// The handle identifies the item without borrowing it; two handles
/// compare equal exactly when they name the same record. Dereferencing
/// through [`ItemRef::get`] is `unsafe` because the index cannot prove
/// the item is still linked; use
/// [`HashIndex::find_with`](crate::HashIndex::find_with) for access under
/// the index's own lock.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct ItemRef(NonNull<Item>);

impl ItemRef {
    pub(crate) fn new(item: &Item) -> Self {
        Self(NonNull::from(item))
    }

    /// The address of the underlying record.
    #[inline]
    pub fn as_ptr(&self) -> *const Item {
        self.0.as_ptr()
    }

    /// Borrow the underlying record.
    ///
    /// # Safety
    /// The item must still be indexed (or otherwise kept alive by the
    /// caller), and the caller must synchronise with writers that could
    /// delete it for the duration of the borrow.
    #[inline]
    pub unsafe fn get<'a>(&self) -> &'a Item {
        &*self.0.as_ptr()
    }
}

impl fmt::Debug for ItemRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ItemRef").field(&self.0.as_ptr()).finish()
    }
}

// Safety: an ItemRef is an address; whether it may be dereferenced is
// governed by the contract on `get`.
unsafe impl Send for ItemRef {}
unsafe impl Sync for ItemRef {}
