//! Combiners: registered computations over a fixed list of maps.
//!
//! Each `combine` resolves one key per dependency, reads the dependency's
//! value for that key, runs the user function over the ordered values and
//! writes its output straight into a freshly reserved slot of the
//! combiner's result ring. A miss anywhere aborts the call before a slot is
//! reserved, so no partial result is ever appended.

use crate::error::{Miss, Result, StoreError};
use crate::history::HistoryRing;
use crate::key::Key;
use crate::map::Map;
use crate::reentrancy;
use std::fmt;
use std::sync::Arc;

/// Upper bound on dependencies per combiner; argument vectors live on the
/// stack.
pub const MAX_COMBINER_ARGS: usize = 64;

/// User computation: ordered dependency values in, result bytes out. The
/// output slice is exactly the combiner's result width.
pub type CombineFn = Box<dyn Fn(&[u64], &mut [u8]) + Send + Sync>;

/// How `combine` picks the key used against each dependency.
#[derive(Copy, Clone, Debug)]
pub enum Lookup<'a> {
    /// One caller-supplied key per dependency, in dependency order.
    Explicit(&'a [Key]),
    /// The most recent key of dependency `i`, applied to every dependency.
    /// Only meaningful when all dependencies are keyed by the same entity.
    Broadcast(usize),
    /// Each dependency's own most recent key. The keys need not belong to
    /// the same logical event.
    Independent,
}

pub struct Combiner {
    id: usize,
    deps: Vec<Arc<Map>>,
    func: CombineFn,
    results: HistoryRing,
}

impl Combiner {
    pub(crate) fn new(
        id: usize,
        deps: Vec<Arc<Map>>,
        func: CombineFn,
        result_width: usize,
        history_depth: usize,
    ) -> Result<Self> {
        Ok(Self {
            id,
            deps,
            func,
            results: HistoryRing::new(history_depth, result_width)?,
        })
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn dependencies(&self) -> impl Iterator<Item = &crate::ident::Identity> {
        self.deps.iter().map(|m| m.identity())
    }

    pub fn result_width(&self) -> usize {
        self.results.width()
    }

    pub fn history_depth(&self) -> usize {
        self.results.capacity()
    }

    fn resolve(&self, lookup: Lookup<'_>, args: &mut [u64]) -> Result<()> {
        let broadcast = match lookup {
            Lookup::Explicit(keys) if keys.len() != self.deps.len() => {
                return Err(StoreError::invalid(format!(
                    "combiner {} takes {} keys, got {}",
                    self.id,
                    self.deps.len(),
                    keys.len()
                )));
            }
            Lookup::Broadcast(dim) => {
                let src = self.deps.get(dim).ok_or_else(|| {
                    StoreError::invalid(format!(
                        "broadcast index {dim} out of range for {} dependencies",
                        self.deps.len()
                    ))
                })?;
                Some(src.recent_key(0)?)
            }
            _ => None,
        };
        for (j, (dep, arg)) in self.deps.iter().zip(args.iter_mut()).enumerate() {
            let key = match (lookup, broadcast) {
                (Lookup::Explicit(keys), _) => keys[j],
                (_, Some(k)) => k,
                _ => dep.recent_key(0)?,
            };
            *arg = dep.lookup(&key)?;
        }
        Ok(())
    }

    pub(crate) fn combine(&self, lookup: Lookup<'_>) -> Result<()> {
        reentrancy::check("combine");
        let mut args = [0u64; MAX_COMBINER_ARGS];
        let args = &mut args[..self.deps.len()];
        self.resolve(lookup, args)?;

        let mut slot = self.results.allocate();
        {
            let _cb = reentrancy::enter_callback();
            (self.func)(args, slot.payload_mut());
        }
        slot.commit();
        Ok(())
    }

    pub(crate) fn check_depth(&self, n: usize) -> core::result::Result<(), Miss> {
        if n > self.results.capacity() {
            return Err(Miss::BeyondCapacity {
                back: n - 1,
                capacity: self.results.capacity(),
            });
        }
        Ok(())
    }

    pub(crate) fn query_past_into(&self, n: usize, out: &mut [u8]) -> Result<()> {
        reentrancy::check("query_past");
        self.check_depth(n)?;
        if out.len() != n * self.results.width() {
            return Err(StoreError::invalid(format!(
                "output buffer holds {} bytes, need {}",
                out.len(),
                n * self.results.width()
            )));
        }
        self.results.get_recent(n, out)?;
        Ok(())
    }

    pub(crate) fn query_past(&self, n: usize) -> Result<Vec<Vec<u8>>> {
        self.check_depth(n)?;
        let width = self.results.width();
        let mut buf = vec![0u8; n * width];
        self.query_past_into(n, &mut buf)?;
        Ok(buf.chunks_exact(width).map(<[u8]>::to_vec).collect())
    }

    pub(crate) fn advance(&self, steps: &[Lookup<'_>], n_past: usize) -> Result<Vec<Vec<u8>>> {
        reentrancy::check("advance");
        self.check_depth(n_past)?;
        for step in steps {
            self.combine(*step)?;
        }
        self.query_past(n_past)
    }
}

impl fmt::Debug for Combiner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Combiner")
            .field("id", &self.id)
            .field("deps", &self.deps.iter().map(|m| m.identity()).collect::<Vec<_>>())
            .field("result_width", &self.results.width())
            .field("history_depth", &self.results.capacity())
            .finish()
    }
}

/// Handle to a registered combiner.
#[derive(Clone, Debug)]
pub struct CombinerHandle(pub(crate) Arc<Combiner>);

impl CombinerHandle {
    pub fn id(&self) -> usize {
        self.0.id()
    }

    pub fn result_width(&self) -> usize {
        self.0.result_width()
    }

    pub fn history_depth(&self) -> usize {
        self.0.history_depth()
    }
}

impl PartialEq for CombinerHandle {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for CombinerHandle {}
