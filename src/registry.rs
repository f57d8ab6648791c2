//! Registry: identity bookkeeping for maps, key kinds and combiners.
//!
//! Arenas are `SlotMap`s that are only ever appended to, so slot order is
//! registration order; `hashbrown` indexes resolve identities to slots.
//! Every register call checks all failure conditions before mutating
//! anything, so a rejected registration leaves the registry untouched.
//! The whole structure sits behind the store's single registration lock.

use crate::bucket_table::BucketTable;
use crate::combiner::{CombineFn, Combiner, MAX_COMBINER_ARGS};
use crate::config::{StoreConfig, VALUE_WIDTH};
use crate::error::{Result, StoreError, Table};
use crate::ident::Identity;
use crate::map::{Backing, Map};
use hashbrown::HashMap;
use slotmap::{new_key_type, SlotMap};
use std::sync::Arc;

new_key_type! {
    struct MapSlot;
    struct KindSlot;
}

/// Byte window inside a key object that scratch-backed maps may claim.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ScratchWindow {
    pub offset: usize,
    pub size: usize,
}

impl ScratchWindow {
    pub fn new(offset: usize, size: usize) -> Self {
        Self { offset, size }
    }
}

/// Remaining scratch room of one key kind. The first map registered for a
/// kind fixes its window; every scratch-backed map then claims one value
/// width from the front.
#[derive(Debug)]
pub(crate) struct KeyKind {
    next_offset: usize,
    remaining: usize,
}

impl KeyKind {
    fn new(window: Option<ScratchWindow>) -> Self {
        let w = window.unwrap_or(ScratchWindow::new(0, 0));
        Self {
            next_offset: w.offset,
            remaining: w.size,
        }
    }

    fn peek(&self) -> Option<usize> {
        (self.remaining >= VALUE_WIDTH).then_some(self.next_offset)
    }

    fn claim(&mut self) -> Option<usize> {
        let off = self.peek()?;
        self.next_offset += VALUE_WIDTH;
        self.remaining -= VALUE_WIDTH;
        Some(off)
    }
}

enum KindEntry {
    Known(KindSlot),
    New(KeyKind),
}

#[derive(Debug, Default)]
pub(crate) struct Registry {
    maps: SlotMap<MapSlot, Arc<Map>>,
    map_index: HashMap<Identity, MapSlot>,
    kinds: SlotMap<KindSlot, KeyKind>,
    kind_index: HashMap<Box<str>, KindSlot>,
    combiners: Vec<Arc<Combiner>>,
}

impl Registry {
    pub(crate) fn map_count(&self) -> usize {
        self.maps.len()
    }

    pub(crate) fn key_kind_count(&self) -> usize {
        self.kinds.len()
    }

    pub(crate) fn combiner_count(&self) -> usize {
        self.combiners.len()
    }

    pub(crate) fn map(&self, id: &Identity) -> Option<Arc<Map>> {
        let slot = self.map_index.get(id)?;
        self.maps.get(*slot).cloned()
    }

    pub(crate) fn resolve(&self, id: &Identity) -> Result<Arc<Map>> {
        self.map(id)
            .ok_or_else(|| StoreError::UnknownIdentifier(id.to_string()))
    }

    pub(crate) fn combiner(&self, id: usize) -> Option<Arc<Combiner>> {
        self.combiners.get(id).cloned()
    }

    /// Maps in registration order.
    pub(crate) fn maps(&self) -> impl Iterator<Item = &Arc<Map>> {
        self.maps.values()
    }

    pub(crate) fn register_map(
        &mut self,
        cfg: &StoreConfig,
        id: Identity,
        key_kind: &str,
        scratch: Option<ScratchWindow>,
        history_depth: usize,
    ) -> Result<Arc<Map>> {
        if self.map_index.contains_key(&id) {
            return Err(StoreError::DuplicateIdentifier(id.to_string()));
        }
        if self.maps.len() >= cfg.max_maps {
            return Err(StoreError::CapacityExceeded {
                table: Table::Maps,
                capacity: cfg.max_maps,
            });
        }

        let kind = match self.kind_index.get(key_kind) {
            Some(&slot) => KindEntry::Known(slot),
            None => {
                if self.kinds.len() >= cfg.max_key_kinds {
                    return Err(StoreError::CapacityExceeded {
                        table: Table::KeyKinds,
                        capacity: cfg.max_key_kinds,
                    });
                }
                if let Some(w) = scratch {
                    if w.offset % VALUE_WIDTH != 0 {
                        return Err(StoreError::invalid(format!(
                            "scratch offset {} is not {VALUE_WIDTH}-byte aligned",
                            w.offset
                        )));
                    }
                }
                KindEntry::New(KeyKind::new(scratch))
            }
        };

        let slot_offset = match &kind {
            KindEntry::Known(slot) => self.kinds[*slot].peek(),
            KindEntry::New(fresh) => fresh.peek(),
        };
        let backing = match slot_offset {
            Some(offset) => Backing::Scratch { offset },
            None => Backing::Hash(BucketTable::new(cfg.hash_table_size, cfg.hash_assoc)),
        };
        // Builds the key history; fails on a bad depth before anything is committed.
        let map = Arc::new(Map::new(id.clone(), key_kind, backing, history_depth)?);

        let kind_slot = match kind {
            KindEntry::Known(slot) => slot,
            KindEntry::New(fresh) => {
                let slot = self.kinds.insert(fresh);
                self.kind_index.insert(key_kind.into(), slot);
                slot
            }
        };
        if map.is_scratch_backed() {
            self.kinds[kind_slot].claim();
        }
        let slot = self.maps.insert(Arc::clone(&map));
        self.map_index.insert(id, slot);
        Ok(map)
    }

    pub(crate) fn register_combiner(
        &mut self,
        cfg: &StoreConfig,
        deps: &[Identity],
        func: CombineFn,
        result_width: usize,
        history_depth: usize,
    ) -> Result<Arc<Combiner>> {
        if self.combiners.len() >= cfg.max_combiners {
            return Err(StoreError::CapacityExceeded {
                table: Table::Combiners,
                capacity: cfg.max_combiners,
            });
        }
        let limit = cfg.max_maps_per_combiner.min(MAX_COMBINER_ARGS);
        if deps.is_empty() || deps.len() > limit {
            return Err(StoreError::invalid(format!(
                "combiner needs 1..={limit} dependencies, got {}",
                deps.len()
            )));
        }
        let maps = deps
            .iter()
            .map(|id| self.resolve(id))
            .collect::<Result<Vec<_>>>()?;
        let c = Arc::new(Combiner::new(
            self.combiners.len(),
            maps,
            func,
            result_width,
            history_depth,
        )?);
        self.combiners.push(Arc::clone(&c));
        Ok(c)
    }
}
