//! Keys: plain 64-bit tokens, or references to caller-owned scratch storage.
//!
//! A hash-backed map only ever sees a key's 64-bit identity (`Key::raw`).
//! A scratch-backed map writes values straight into the key object's
//! `ScratchArea`, so the key must point at one. The store never owns that
//! area; keeping it alive is the caller's job, which is why building an
//! inline key is `unsafe`.

use crate::config::VALUE_WIDTH;
use crate::error::Miss;
use core::ptr::NonNull;
use core::sync::atomic::{AtomicU64, Ordering};

/// Inline storage a key object offers to scratch-backed maps.
///
/// Embed one in the struct that represents a key (an in-flight request, a
/// file handle...). Byte offsets handed out at map registration index into
/// this area in whole 8-byte words.
#[derive(Debug, Default)]
pub struct ScratchArea {
    words: Box<[AtomicU64]>,
}

impl ScratchArea {
    /// Zeroed area of at least `bytes` bytes, rounded up to whole words.
    pub fn new(bytes: usize) -> Self {
        let n = bytes.div_ceil(VALUE_WIDTH);
        Self {
            words: (0..n).map(|_| AtomicU64::new(0)).collect(),
        }
    }

    pub fn len_bytes(&self) -> usize {
        self.words.len() * VALUE_WIDTH
    }

    fn word(&self, offset: usize) -> Result<&AtomicU64, Miss> {
        debug_assert_eq!(offset % VALUE_WIDTH, 0);
        self.words
            .get(offset / VALUE_WIDTH)
            .ok_or(Miss::ScratchOutOfBounds {
                offset,
                len: self.len_bytes(),
            })
    }

    pub(crate) fn store(&self, offset: usize, value: u64) -> Result<(), Miss> {
        self.word(offset)?.store(value, Ordering::Release);
        Ok(())
    }

    pub(crate) fn load(&self, offset: usize) -> Result<u64, Miss> {
        Ok(self.word(offset)?.load(Ordering::Acquire))
    }
}

/// Raw back-reference to a caller-owned [`ScratchArea`].
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct InlineKey(NonNull<ScratchArea>);

// SAFETY: `ScratchArea` is only accessed through atomics; the pointer's
// liveness is covered by the contract of `Key::inline`.
unsafe impl Send for InlineKey {}
unsafe impl Sync for InlineKey {}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Key {
    /// Opaque, already well-distributed 64-bit identity.
    Token(u64),
    /// Key object carrying its own scratch storage.
    Inline(InlineKey),
}

const TAG_TOKEN: u8 = 0;
const TAG_INLINE: u8 = 1;

impl Key {
    /// Bytes needed to record a key in a history buffer.
    pub(crate) const ENCODED_LEN: usize = 1 + VALUE_WIDTH;

    pub const fn token(v: u64) -> Key {
        Key::Token(v)
    }

    /// Key referring to `area`.
    ///
    /// # Safety
    ///
    /// `area` must stay alive and at the same address for as long as the
    /// store may use this key: every insert or lookup that passes it, and
    /// every combine that can still read it back from a map's key history.
    pub unsafe fn inline(area: &ScratchArea) -> Key {
        Key::Inline(InlineKey(NonNull::from(area)))
    }

    /// The identity used for hashing; an inline key hashes by address.
    pub fn raw(&self) -> u64 {
        match self {
            Key::Token(v) => *v,
            Key::Inline(p) => p.0.as_ptr() as usize as u64,
        }
    }

    pub fn is_inline(&self) -> bool {
        matches!(self, Key::Inline(_))
    }

    pub(crate) fn scratch(&self) -> Result<&ScratchArea, Miss> {
        match self {
            // SAFETY: liveness is guaranteed by the caller of `Key::inline`.
            Key::Inline(p) => Ok(unsafe { p.0.as_ref() }),
            Key::Token(_) => Err(Miss::NotScratchKey),
        }
    }

    pub(crate) fn encode(&self, out: &mut [u8]) {
        let tag = if self.is_inline() { TAG_INLINE } else { TAG_TOKEN };
        out[0] = tag;
        out[1..Self::ENCODED_LEN].copy_from_slice(&self.raw().to_le_bytes());
    }

    pub(crate) fn decode(bytes: &[u8]) -> Key {
        let mut raw = [0u8; VALUE_WIDTH];
        raw.copy_from_slice(&bytes[1..Self::ENCODED_LEN]);
        let raw = u64::from_le_bytes(raw);
        match (bytes[0], NonNull::new(raw as usize as *mut ScratchArea)) {
            (TAG_INLINE, Some(p)) => Key::Inline(InlineKey(p)),
            _ => Key::Token(raw),
        }
    }
}

impl From<u64> for Key {
    fn from(v: u64) -> Self {
        Key::Token(v)
    }
}
