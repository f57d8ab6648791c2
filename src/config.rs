//! Fixed capacities chosen once when the store is constructed.

use crate::error::{Result, StoreError};

/// Width in bytes of every reported value.
pub const VALUE_WIDTH: usize = core::mem::size_of::<u64>();

/// Capacities for every pre-sized table in a [`Store`](crate::Store).
///
/// Nothing grows after construction; registrations beyond these limits fail
/// with `CapacityExceeded` or `InvalidConfiguration`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct StoreConfig {
    /// Maximum number of registered maps.
    pub max_maps: usize,
    /// Maximum number of distinct key kinds.
    pub max_key_kinds: usize,
    /// Maximum number of registered combiners.
    pub max_combiners: usize,
    /// Buckets in each hash-backed map.
    pub hash_table_size: usize,
    /// Slots per bucket.
    pub hash_assoc: usize,
    /// Maximum dependencies of a single combiner.
    pub max_maps_per_combiner: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_maps: 256,
            max_key_kinds: 256,
            max_combiners: 256,
            hash_table_size: 4096,
            hash_assoc: 1,
            max_maps_per_combiner: 16,
        }
    }
}

impl StoreConfig {
    pub fn with_max_maps(mut self, n: usize) -> Self {
        self.max_maps = n;
        self
    }

    pub fn with_max_key_kinds(mut self, n: usize) -> Self {
        self.max_key_kinds = n;
        self
    }

    pub fn with_max_combiners(mut self, n: usize) -> Self {
        self.max_combiners = n;
        self
    }

    pub fn with_hash_table(mut self, size: usize, assoc: usize) -> Self {
        self.hash_table_size = size;
        self.hash_assoc = assoc;
        self
    }

    pub fn with_max_maps_per_combiner(mut self, n: usize) -> Self {
        self.max_maps_per_combiner = n;
        self
    }

    /// Reject capacities that would make every registration fail or every
    /// hash lookup divide by zero.
    pub fn validate(&self) -> Result<()> {
        let fields = [
            ("max_maps", self.max_maps),
            ("max_key_kinds", self.max_key_kinds),
            ("max_combiners", self.max_combiners),
            ("hash_table_size", self.hash_table_size),
            ("hash_assoc", self.hash_assoc),
            ("max_maps_per_combiner", self.max_maps_per_combiner),
        ];
        for (name, v) in fields {
            if v == 0 {
                return Err(StoreError::invalid(format!("{name} must be non-zero")));
            }
        }
        Ok(())
    }
}
