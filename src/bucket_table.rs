//! BucketTable: fixed-capacity, lock-striped `u64 -> u64` table.
//!
//! All storage is allocated up front: `size` buckets of `assoc` slots each,
//! one lock per bucket. Keys are hashed with the identity function, so the
//! caller must supply keys that are already well scattered (addresses,
//! sequence numbers, pre-hashed ids). Nothing here ever allocates after
//! construction, and a full bucket evicts round-robin instead of growing.

use parking_lot::Mutex;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
struct Slot {
    key: u64,
    value: u64,
}

#[derive(Debug)]
struct Bucket {
    // Next slot to occupy when the key is not already resident.
    cursor: usize,
    slots: Box<[Option<Slot>]>,
}

/// What an insert did to its bucket.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Insertion {
    /// The key was resident; its value was overwritten in place.
    Updated,
    /// The key took a previously empty slot.
    Inserted,
    /// The key displaced a different resident key.
    Evicted { key: u64 },
}

#[derive(Debug)]
pub struct BucketTable {
    buckets: Box<[Mutex<Bucket>]>,
    assoc: usize,
}

impl BucketTable {
    /// Allocate `size` buckets of `assoc` slots. Both must be non-zero;
    /// `StoreConfig::validate` guarantees this for every store-built table.
    pub fn new(size: usize, assoc: usize) -> Self {
        debug_assert!(size > 0 && assoc > 0, "bucket table dimensions must be non-zero");
        let buckets = (0..size)
            .map(|_| {
                Mutex::new(Bucket {
                    cursor: 0,
                    slots: vec![None; assoc].into_boxed_slice(),
                })
            })
            .collect();
        Self { buckets, assoc }
    }

    #[inline]
    fn bucket(&self, key: u64) -> &Mutex<Bucket> {
        let i = (key % self.buckets.len() as u64) as usize;
        &self.buckets[i]
    }

    pub fn buckets(&self) -> usize {
        self.buckets.len()
    }

    pub fn assoc(&self) -> usize {
        self.assoc
    }

    /// Overwrite `key` in place if resident, else take the bucket's next slot.
    pub fn insert(&self, key: u64, value: u64) -> Insertion {
        let mut b = self.bucket(key).lock();
        if let Some(slot) = b.slots.iter_mut().flatten().find(|s| s.key == key) {
            slot.value = value;
            return Insertion::Updated;
        }
        let pos = b.cursor % self.assoc;
        b.cursor = b.cursor.wrapping_add(1);
        match b.slots[pos].replace(Slot { key, value }) {
            Some(old) => Insertion::Evicted { key: old.key },
            None => Insertion::Inserted,
        }
    }

    pub fn lookup(&self, key: u64) -> Option<u64> {
        let b = self.bucket(key).lock();
        b.slots
            .iter()
            .flatten()
            .find(|s| s.key == key)
            .map(|s| s.value)
    }

    /// Live entries across all buckets. Takes every bucket lock in turn, so
    /// the count is only a snapshot under concurrent inserts.
    pub fn len(&self) -> usize {
        self.buckets
            .iter()
            .map(|b| b.lock().slots.iter().flatten().count())
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
