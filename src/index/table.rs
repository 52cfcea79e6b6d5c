//! Bucket tables.
//!
//! A table is a power-of-two-sized array of chain heads. The index owns
//! two of these while an expansion is live (the doubled primary and the
//! draining old table) and exactly one otherwise.

use std::cell::UnsafeCell;
use std::collections::TryReserveError;
use std::mem;

use crate::index::{table_size, ChainHead, KeyHash};

/// One table slot holding the head of a chain.
///
/// The cell is mutated through a shared reference while the lock covering
/// the bucket is held; see the safety notes on the accessors.
pub(crate) struct Bucket(UnsafeCell<ChainHead>);

impl Bucket {
    fn new() -> Self {
        Self(UnsafeCell::new(None))
    }

    /// Borrow the chain head.
    ///
    /// # Safety
    /// The caller must hold the lock covering this bucket (its stripe in
    /// fine-grained mode, the global lock in global mode).
    #[inline]
    pub(crate) unsafe fn chain(&self) -> &ChainHead {
        &*self.0.get()
    }

    /// Mutably borrow the chain head.
    ///
    /// # Safety
    /// As for [`Bucket::chain`]; the lock makes the access exclusive.
    #[allow(clippy::mut_from_ref)]
    #[inline]
    pub(crate) unsafe fn chain_mut(&self) -> &mut ChainHead {
        &mut *self.0.get()
    }
}

/// A power-of-two-sized array of chain heads.
pub(crate) struct BucketTable {
    power: u8,
    buckets: Box<[Bucket]>,
}

impl BucketTable {
    /// Allocate a table of `1 << power` empty buckets.
    ///
    /// Startup allocation failure is not recoverable; only expansion uses
    /// the fallible constructor.
    pub(crate) fn new(power: u8) -> Self {
        Self::try_new(power).expect("failed to allocate hash table")
    }

    /// Allocate a table of `1 << power` empty buckets, reporting
    /// allocation failure instead of aborting.
    pub(crate) fn try_new(power: u8) -> Result<Self, TryReserveError> {
        let len = table_size(power) as usize;
        let mut buckets = Vec::new();
        buckets.try_reserve_exact(len)?;
        buckets.resize_with(len, Bucket::new);
        Ok(Self {
            power,
            buckets: buckets.into_boxed_slice(),
        })
    }

    /// The table's power.
    #[inline]
    pub(crate) fn power(&self) -> u8 {
        self.power
    }

    /// Number of buckets.
    #[inline]
    pub(crate) fn size(&self) -> u64 {
        table_size(self.power)
    }

    /// Bucket index for a hash under this table's mask.
    #[inline]
    pub(crate) fn bucket_for(&self, hash: KeyHash) -> u64 {
        hash.bucket_index(self.power)
    }

    /// The bucket at a given index.
    #[inline]
    pub(crate) fn bucket(&self, index: u64) -> &Bucket {
        &self.buckets[index as usize]
    }

    /// Exclusive access to a chain head through `&mut self`.
    #[inline]
    pub(crate) fn chain_mut(&mut self, index: u64) -> &mut ChainHead {
        self.buckets[index as usize].0.get_mut()
    }

    /// Approximate bytes held by the bucket array.
    #[inline]
    pub(crate) fn bytes(&self) -> u64 {
        self.size() * mem::size_of::<Bucket>() as u64
    }
}

impl Drop for BucketTable {
    fn drop(&mut self) {
        // Unlink chains iteratively; dropping the nested boxes directly
        // would recurse chain-deep.
        for bucket in self.buckets.iter_mut() {
            let mut cursor = bucket.0.get_mut().take();
            while let Some(mut item) = cursor {
                cursor = item.next.take();
            }
        }
    }
}
