//! fstore: an in-process feature store that decouples reporting raw,
//! keyed event data from the computations that derive features from it.
//!
//! Internal Design:
//!
//! Summary
//! - Goal: let any number of reporting sites insert `(key, u64)` pairs
//!   while consumers combine the latest values across several reporting
//!   channels, with every structure sized once at registration time.
//! - Layers:
//!   - BucketTable: fixed-size, identity-hashed, lock-striped `u64 -> u64`
//!     table; overwrites a resident key in place, evicts round-robin when
//!     a bucket is full.
//!   - HistoryRing: power-of-two ring of fixed-width records with a
//!     two-phase allocate/commit protocol; backs both the per-map key
//!     history and each combiner's result history.
//!   - Map: one reporting channel; values live inline in the key's
//!     `ScratchArea` when its key kind still has room, else in a private
//!     BucketTable.
//!   - Combiner: dependency maps plus a user function; resolves one key per
//!     dependency (explicit, broadcast from one map, or independent),
//!     evaluates, and appends the result.
//!   - Registry/Store: identity bookkeeping behind one registration lock and
//!     the public entry points.
//!
//! Constraints
//! - No growth after registration: tables, rings and registries are
//!   allocated up front and failures are reported, never panicked.
//! - Two lock tiers: the registration lock is only taken by control-plane
//!   calls; inserts and combines only take one bucket lock or one ring lock
//!   at a time.
//! - Identity hashing: keys must already be well distributed.
//! - The per-map key ring is the single ordering point for "most recent";
//!   it orders by allocation, not completion, of concurrent inserts.
//!
//! Publication
//! - A ring slot is reserved under the ring lock and the lock is held
//!   while the payload is written; commit marks the slot readable and
//!   releases the lock. Readers never observe a reserved slot, and a
//!   reservation abandoned mid-write (for example by a panicking combiner
//!   function) leaves its slot unreadable.
//! - A combiner function therefore runs with its result ring locked. It must
//!   not call `combine`, `advance` or `query_past` on any combiner. Re-entering
//!   its own combiner would deadlock; debug builds reject every nested call
//!   per thread and panic, release builds only guarantee the own-combiner
//!   deadlock.
//!
//! Keys and scratch storage
//! - `Key::Token` is an opaque 64-bit identity. `Key::Inline` points at a
//!   caller-owned `ScratchArea`; the store never owns it and building one is
//!   `unsafe` because its liveness is the caller's responsibility, including
//!   while it sits in a map's key history.
//! - The first map registered for a key kind fixes that kind's scratch
//!   window; later maps claim successive 8-byte slots until it runs out.
//!
//! Notes and non-goals
//! - No persistence, resizing, unregistration or unbounded key sets.
//! - Values are `u64`; combiner results are opaque fixed-width bytes.
//! - Query results are returned newest first.

pub(crate) mod bucket_table;
mod bucket_table_proptest;
pub mod combiner;
pub mod config;
pub mod error;
pub(crate) mod history;
mod history_proptest;
pub mod ident;
pub mod key;
pub mod map;
mod reentrancy;
mod registry;
mod store;

// Public surface
pub use combiner::{CombinerHandle, Lookup, MAX_COMBINER_ARGS};
pub use config::{StoreConfig, VALUE_WIDTH};
pub use error::{Miss, Result, StoreError, Table};
pub use ident::Identity;
pub use key::{Key, ScratchArea};
pub use map::MapHandle;
pub use registry::ScratchWindow;
pub use store::Store;
