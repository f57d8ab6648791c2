//! Map: one reporting channel. Values live either inline in the key
//! object's scratch area or in a private [`BucketTable`]; every insert also
//! records its key in a [`HistoryRing`] so consumers can ask for "the most
//! recent key".

use crate::bucket_table::{BucketTable, Insertion};
use crate::error::{Miss, Result};
use crate::history::HistoryRing;
use crate::ident::Identity;
use crate::key::Key;
use std::fmt;
use std::sync::Arc;
use tracing::trace;

/// Where a map keeps its values. Fixed for the map's lifetime.
#[derive(Debug)]
pub(crate) enum Backing {
    /// Byte offset into each key's `ScratchArea`.
    Scratch { offset: usize },
    Hash(BucketTable),
}

#[derive(Debug)]
pub struct Map {
    id: Identity,
    key_kind: Box<str>,
    backing: Backing,
    keys: HistoryRing,
}

impl Map {
    pub(crate) fn new(
        id: Identity,
        key_kind: &str,
        backing: Backing,
        history_depth: usize,
    ) -> Result<Self> {
        Ok(Self {
            id,
            key_kind: key_kind.into(),
            backing,
            keys: HistoryRing::new(history_depth, Key::ENCODED_LEN)?,
        })
    }

    pub fn identity(&self) -> &Identity {
        &self.id
    }

    pub fn key_kind(&self) -> &str {
        &self.key_kind
    }

    /// Byte offset of this map's slot in each key's scratch area, if the
    /// map is scratch-backed.
    pub fn scratch_offset(&self) -> Option<usize> {
        match self.backing {
            Backing::Scratch { offset } => Some(offset),
            Backing::Hash(_) => None,
        }
    }

    pub fn is_scratch_backed(&self) -> bool {
        self.scratch_offset().is_some()
    }

    pub fn history_depth(&self) -> usize {
        self.keys.capacity()
    }

    pub(crate) fn insert(&self, key: Key, value: u64) -> Result<()> {
        match &self.backing {
            Backing::Scratch { offset } => key.scratch()?.store(*offset, value)?,
            Backing::Hash(table) => {
                if let Insertion::Evicted { key: old } = table.insert(key.raw(), value) {
                    trace!(map = %self.id, evicted = old, "bucket slot reused");
                }
            }
        }
        let mut slot = self.keys.allocate();
        key.encode(slot.payload_mut());
        slot.commit();
        Ok(())
    }

    pub(crate) fn lookup(&self, key: &Key) -> core::result::Result<u64, Miss> {
        match &self.backing {
            Backing::Scratch { offset } => key.scratch()?.load(*offset),
            Backing::Hash(table) => table
                .lookup(key.raw())
                .ok_or(Miss::Key { key: key.raw() }),
        }
    }

    /// The key inserted `back` inserts ago (0 = most recent).
    pub(crate) fn recent_key(&self, back: usize) -> core::result::Result<Key, Miss> {
        let mut buf = [0u8; Key::ENCODED_LEN];
        self.keys.get(back, &mut buf)?;
        Ok(Key::decode(&buf))
    }

    /// The `n` most recent keys, newest first.
    pub(crate) fn recent_keys(&self, n: usize) -> core::result::Result<Vec<Key>, Miss> {
        if n > self.keys.capacity() {
            return Err(Miss::BeyondCapacity {
                back: n - 1,
                capacity: self.keys.capacity(),
            });
        }
        let mut buf = vec![0u8; n * Key::ENCODED_LEN];
        self.keys.get_recent(n, &mut buf)?;
        Ok(buf.chunks_exact(Key::ENCODED_LEN).map(Key::decode).collect())
    }
}

/// Opaque handle to a registered map. Cheap to clone; never touches the
/// registration lock.
#[derive(Clone)]
pub struct MapHandle(pub(crate) Arc<Map>);

impl MapHandle {
    pub fn identity(&self) -> &Identity {
        self.0.identity()
    }

    pub fn is_scratch_backed(&self) -> bool {
        self.0.is_scratch_backed()
    }

    pub fn scratch_offset(&self) -> Option<usize> {
        self.0.scratch_offset()
    }

    pub fn history_depth(&self) -> usize {
        self.0.history_depth()
    }
}

impl PartialEq for MapHandle {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for MapHandle {}

impl fmt::Debug for MapHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MapHandle")
            .field("id", self.identity())
            .field("scratch_offset", &self.scratch_offset())
            .finish()
    }
}
