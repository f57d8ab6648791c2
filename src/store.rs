//! Store: the registration, insert, combine and query entry points.
//!
//! Control-plane calls (`register_*`, `subscribe`, handle lookups) take
//! the single registration lock. Data-plane calls (`insert`, `lookup`,
//! `combine`, `query_past`...) work purely through handles and only ever
//! touch one bucket lock or one history-ring lock at a time.

use crate::combiner::{Combiner, CombinerHandle, Lookup};
use crate::config::{StoreConfig, VALUE_WIDTH};
use crate::error::{Result, StoreError};
use crate::ident::Identity;
use crate::key::Key;
use crate::map::MapHandle;
use crate::registry::{Registry, ScratchWindow};
use parking_lot::Mutex;
use tracing::{debug, info, trace, warn};

/// An in-process feature store. Construct once, share by reference.
pub struct Store {
    config: StoreConfig,
    registry: Mutex<Registry>,
}

impl Store {
    /// Validate `config` and build an empty store.
    pub fn new(config: StoreConfig) -> Result<Self> {
        config.validate()?;
        info!(
            max_maps = config.max_maps,
            max_combiners = config.max_combiners,
            hash_table_size = config.hash_table_size,
            hash_assoc = config.hash_assoc,
            "feature store initialised"
        );
        Ok(Self {
            config,
            registry: Mutex::new(Registry::default()),
        })
    }

    pub fn with_defaults() -> Self {
        Self {
            config: StoreConfig::default(),
            registry: Mutex::new(Registry::default()),
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Register a reporting channel.
    ///
    /// `key_kind` names the shape of the keys this map is fed. The first map
    /// registered for a kind fixes that kind's scratch window; while the
    /// window has room for another value the map is scratch-backed,
    /// otherwise it gets its own hash table. `history_depth` sizes the
    /// recent-keys ring and must be a power of two.
    pub fn register_map(
        &self,
        id: impl Into<Identity>,
        key_kind: &str,
        scratch: Option<ScratchWindow>,
        history_depth: usize,
    ) -> Result<MapHandle> {
        let id = id.into();
        let mut reg = self.registry.lock();
        match reg.register_map(&self.config, id.clone(), key_kind, scratch, history_depth) {
            Ok(map) => {
                debug!(
                    map = %id,
                    key_kind,
                    scratch_offset = ?map.scratch_offset(),
                    history_depth,
                    "registered map"
                );
                Ok(MapHandle(map))
            }
            Err(e) => {
                warn!(map = %id, key_kind, error = %e, "map registration rejected");
                Err(e)
            }
        }
    }

    /// Register a combiner over `deps`, in argument order.
    ///
    /// `func` receives one value per dependency and must fill the
    /// `result_width`-byte output slice. `history_depth` sizes the result
    /// ring and must be a power of two.
    pub fn register_combiner<F>(
        &self,
        deps: &[Identity],
        func: F,
        result_width: usize,
        history_depth: usize,
    ) -> Result<CombinerHandle>
    where
        F: Fn(&[u64], &mut [u8]) + Send + Sync + 'static,
    {
        let mut reg = self.registry.lock();
        match reg.register_combiner(&self.config, deps, Box::new(func), result_width, history_depth)
        {
            Ok(c) => {
                let names: Vec<String> = deps.iter().map(ToString::to_string).collect();
                debug!(
                    combiner = c.id(),
                    deps = ?names,
                    result_width,
                    history_depth,
                    "registered combiner"
                );
                Ok(CombinerHandle(c))
            }
            Err(e) => {
                warn!(error = %e, "combiner registration rejected");
                Err(e)
            }
        }
    }

    /// Resolve map identities into handles, in the order given.
    pub fn subscribe(&self, ids: &[Identity]) -> Result<Vec<MapHandle>> {
        let reg = self.registry.lock();
        ids.iter()
            .map(|id| reg.resolve(id).map(MapHandle))
            .collect()
    }

    pub fn map(&self, id: &Identity) -> Option<MapHandle> {
        self.registry.lock().map(id).map(MapHandle)
    }

    pub fn combiner(&self, id: usize) -> Option<CombinerHandle> {
        self.registry.lock().combiner(id).map(CombinerHandle)
    }

    /// Identities of all registered maps, in registration order.
    pub fn map_ids(&self) -> Vec<Identity> {
        self.registry
            .lock()
            .maps()
            .map(|m| m.identity().clone())
            .collect()
    }

    pub fn map_count(&self) -> usize {
        self.registry.lock().map_count()
    }

    pub fn combiner_count(&self) -> usize {
        self.registry.lock().combiner_count()
    }

    /// Report `value` for `key`. Scratch-backed maps need an inline key.
    pub fn insert(&self, map: &MapHandle, key: Key, value: u64) -> Result<()> {
        trace!(map = %map.identity(), key = key.raw(), value, "insert");
        map.0.insert(key, value)
    }

    /// Current value of `key` in one map.
    pub fn lookup(&self, map: &MapHandle, key: &Key) -> Result<u64> {
        Ok(map.0.lookup(key)?)
    }

    /// The `n` most recently inserted keys of `map`, newest first.
    pub fn past_keys(&self, map: &MapHandle, n: usize) -> Result<Vec<Key>> {
        Ok(map.0.recent_keys(n)?)
    }

    /// Compute and retain one new result.
    pub fn combine(&self, combiner: &CombinerHandle, lookup: Lookup<'_>) -> Result<()> {
        trace!(combiner = combiner.id(), ?lookup, "combine");
        combiner.0.combine(lookup)
    }

    /// Run one combine per step, then return the `n_past` newest results,
    /// newest first. Stops at the first failing step; results of earlier
    /// steps stay recorded.
    pub fn advance(
        &self,
        combiner: &CombinerHandle,
        steps: &[Lookup<'_>],
        n_past: usize,
    ) -> Result<Vec<Vec<u8>>> {
        trace!(combiner = combiner.id(), steps = steps.len(), n_past, "advance");
        combiner.0.advance(steps, n_past)
    }

    /// The `n` newest results, newest first (index 0 is the latest).
    pub fn query_past(&self, combiner: &CombinerHandle, n: usize) -> Result<Vec<Vec<u8>>> {
        combiner.0.query_past(n)
    }

    /// Like [`query_past`](Self::query_past), copying into `out`, which
    /// must hold exactly `n * result_width` bytes.
    pub fn query_past_into(&self, combiner: &CombinerHandle, n: usize, out: &mut [u8]) -> Result<()> {
        combiner.0.query_past_into(n, out)
    }

    /// Results decoded as little-endian `u64`s, newest first. Requires an
    /// 8-byte result width.
    pub fn query_past_u64(&self, combiner: &CombinerHandle, n: usize) -> Result<Vec<u64>> {
        let c: &Combiner = &combiner.0;
        if c.result_width() != VALUE_WIDTH {
            return Err(StoreError::invalid(format!(
                "combiner {} produces {}-byte results",
                c.id(),
                c.result_width()
            )));
        }
        c.check_depth(n)?;
        let mut buf = vec![0u8; n * VALUE_WIDTH];
        c.query_past_into(n, &mut buf)?;
        Ok(buf
            .chunks_exact(VALUE_WIDTH)
            .map(|b| {
                let mut w = [0u8; VALUE_WIDTH];
                w.copy_from_slice(b);
                u64::from_le_bytes(w)
            })
            .collect())
    }

    /// Tear the store down. Outstanding handles keep their own map or
    /// combiner alive until dropped.
    pub fn shutdown(self) {
        let reg = self.registry.into_inner();
        info!(
            maps = reg.map_count(),
            key_kinds = reg.key_kind_count(),
            combiners = reg.combiner_count(),
            "feature store shut down"
        );
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let reg = self.registry.lock();
        f.debug_struct("Store")
            .field("config", &self.config)
            .field("maps", &reg.map_count())
            .field("combiners", &reg.combiner_count())
            .finish()
    }
}
