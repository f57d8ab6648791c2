//! Error taxonomy shared by the control plane and the data plane.

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Fixed-size tables that can run out of room at registration time.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Table {
    Maps,
    KeyKinds,
    Combiners,
}

impl std::fmt::Display for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Table::Maps => "map",
            Table::KeyKinds => "key-kind",
            Table::Combiners => "combiner",
        })
    }
}

/// Why a data-plane read came back empty.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Error)]
pub enum Miss {
    /// The hash-backed map holds no entry for this key.
    #[error("no value for key {key:#x}")]
    Key { key: u64 },

    /// The history slot `back` entries behind the newest was never published.
    #[error("history slot {back} back has not been written")]
    NeverWritten { back: usize },

    /// More history was requested than the buffer retains.
    #[error("history slot {back} back exceeds capacity {capacity}")]
    BeyondCapacity { back: usize, capacity: usize },

    /// A token key was used against a scratch-backed map.
    #[error("scratch-backed map requires an inline key")]
    NotScratchKey,

    /// The key object's scratch area does not cover the claimed slot.
    #[error("scratch slot at byte {offset} lies outside a {len}-byte area")]
    ScratchOutOfBounds { offset: usize, len: usize },
}

/// Errors returned by [`Store`](crate::Store) operations.
#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum StoreError {
    /// A fixed registration table is full.
    #[error("{table} table is full ({capacity} entries)")]
    CapacityExceeded { table: Table, capacity: usize },

    /// A dependency or map identity was not registered.
    #[error("unknown identifier: {0}")]
    UnknownIdentifier(String),

    /// A map is already registered under this identity.
    #[error("duplicate identifier: {0}")]
    DuplicateIdentifier(String),

    /// Registration parameters or call arguments are malformed.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// No value could be resolved.
    #[error("lookup miss: {0}")]
    LookupMiss(#[from] Miss),
}

impl StoreError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        StoreError::InvalidConfiguration(msg.into())
    }

    /// True for the ordinary "nothing there yet" outcome callers usually
    /// tolerate at cold start.
    pub fn is_miss(&self) -> bool {
        matches!(self, StoreError::LookupMiss(_))
    }
}
