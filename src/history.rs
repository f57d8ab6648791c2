//! HistoryRing: fixed-capacity circular buffer of fixed-width records.
//!
//! Capacity is a power of two so a monotonic cursor maps to a slot by
//! masking. Writers go through a two-phase protocol: `allocate` claims the
//! next slot under the ring's lock and hands back a [`Reservation`]; the
//! payload is written through the reservation and `commit` publishes it and
//! releases the lock. Readers therefore never see a half-written record.
//! A reservation dropped without `commit` leaves its slot unreadable.
//!
//! Old records are overwritten silently once the cursor wraps.

use crate::error::{Miss, Result, StoreError};
use parking_lot::{Mutex, MutexGuard};

/// Publication state of one slot.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SlotState {
    Empty,
    Reserved,
    Committed,
}

#[derive(Debug)]
struct RingState {
    cursor: u64,
    data: Box<[u8]>,
    states: Box<[SlotState]>,
}

#[derive(Debug)]
pub struct HistoryRing {
    width: usize,
    mask: usize,
    inner: Mutex<RingState>,
}

impl HistoryRing {
    /// Ring of `capacity` records, `width` bytes each.
    ///
    /// Fails with `InvalidConfiguration` unless `capacity` is a power of two
    /// and `width` is non-zero.
    pub fn new(capacity: usize, width: usize) -> Result<Self> {
        if !capacity.is_power_of_two() {
            return Err(StoreError::invalid(format!(
                "history depth {capacity} is not a power of two"
            )));
        }
        if width == 0 {
            return Err(StoreError::invalid("record width must be non-zero"));
        }
        let len = capacity
            .checked_mul(width)
            .ok_or_else(|| StoreError::invalid("history buffer size overflows"))?;
        Ok(Self {
            width,
            mask: capacity - 1,
            inner: Mutex::new(RingState {
                cursor: 0,
                data: vec![0u8; len].into_boxed_slice(),
                states: vec![SlotState::Empty; capacity].into_boxed_slice(),
            }),
        })
    }

    pub fn capacity(&self) -> usize {
        self.mask + 1
    }

    pub fn width(&self) -> usize {
        self.width
    }

    /// Total records ever allocated, including overwritten ones.
    pub fn written(&self) -> u64 {
        self.inner.lock().cursor
    }

    /// Claim the next slot. The ring stays locked until the reservation is
    /// committed or dropped.
    pub fn allocate(&self) -> Reservation<'_> {
        let mut guard = self.inner.lock();
        let slot = (guard.cursor as usize) & self.mask;
        guard.cursor = guard.cursor.wrapping_add(1);
        guard.states[slot] = SlotState::Reserved;
        Reservation {
            guard,
            slot,
            width: self.width,
            committed: false,
        }
    }

    /// Append one record. `record` must be exactly `width` bytes.
    #[cfg(test)]
    pub fn push(&self, record: &[u8]) {
        let mut r = self.allocate();
        r.payload_mut().copy_from_slice(record);
        r.commit();
    }

    fn locate(&self, st: &RingState, back: usize) -> core::result::Result<usize, Miss> {
        if back > self.mask {
            return Err(Miss::BeyondCapacity {
                back,
                capacity: self.capacity(),
            });
        }
        if back as u64 >= st.cursor {
            return Err(Miss::NeverWritten { back });
        }
        let slot = ((st.cursor - 1 - back as u64) as usize) & self.mask;
        if st.states[slot] != SlotState::Committed {
            return Err(Miss::NeverWritten { back });
        }
        Ok(slot)
    }

    /// Copy the record `back` entries behind the newest (0 = newest) into
    /// `out`, which must be `width` bytes.
    pub fn get(&self, back: usize, out: &mut [u8]) -> core::result::Result<(), Miss> {
        let st = self.inner.lock();
        debug_assert_eq!(out.len(), self.width, "record buffer length");
        let slot = self.locate(&st, back)?;
        let off = slot * self.width;
        out.copy_from_slice(&st.data[off..off + self.width]);
        Ok(())
    }

    /// Copy the `n` newest records, newest first, into `out` (`n * width`
    /// bytes). Reads under one lock acquisition, so the records form a
    /// consistent window. Nothing is copied if any slot is missing.
    pub fn get_recent(&self, n: usize, out: &mut [u8]) -> core::result::Result<(), Miss> {
        debug_assert_eq!(Some(out.len()), n.checked_mul(self.width), "window buffer length");
        let st = self.inner.lock();
        let slots = (0..n)
            .map(|back| self.locate(&st, back))
            .collect::<core::result::Result<Vec<_>, _>>()?;
        for (chunk, slot) in out.chunks_exact_mut(self.width).zip(slots) {
            let off = slot * self.width;
            chunk.copy_from_slice(&st.data[off..off + self.width]);
        }
        Ok(())
    }
}

/// A claimed, not yet visible slot. Holds the ring's lock.
pub struct Reservation<'a> {
    guard: MutexGuard<'a, RingState>,
    slot: usize,
    width: usize,
    committed: bool,
}

impl<'a> Reservation<'a> {
    pub fn payload_mut(&mut self) -> &mut [u8] {
        let off = self.slot * self.width;
        &mut self.guard.data[off..off + self.width]
    }

    /// Mark the slot readable and release the ring.
    pub fn commit(mut self) {
        self.guard.states[self.slot] = SlotState::Committed;
        self.committed = true;
    }
}

impl<'a> Drop for Reservation<'a> {
    fn drop(&mut self) {
        if !self.committed {
            self.guard.states[self.slot] = SlotState::Empty;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn push_u64(r: &HistoryRing, v: u64) {
        r.push(&v.to_le_bytes());
    }

    fn get_u64(r: &HistoryRing, back: usize) -> core::result::Result<u64, Miss> {
        let mut b = [0u8; 8];
        r.get(back, &mut b)?;
        Ok(u64::from_le_bytes(b))
    }

    /// Invariant: construction rejects non-power-of-two capacities.
    #[test]
    fn non_power_of_two_rejected() {
        for cap in [0usize, 3, 6, 12] {
            match HistoryRing::new(cap, 8) {
                Err(StoreError::InvalidConfiguration(_)) => {}
                other => panic!("capacity {cap}: unexpected {:?}", other.map(|_| ())),
            }
        }
        assert!(HistoryRing::new(1, 8).is_ok());
        assert!(HistoryRing::new(16, 8).is_ok());
        assert!(HistoryRing::new(4, 0).is_err());
    }

    /// Invariant: a fresh ring reports never-written rather than garbage.
    #[test]
    fn cold_ring_misses() {
        let r = HistoryRing::new(4, 8).unwrap();
        assert_eq!(get_u64(&r, 0), Err(Miss::NeverWritten { back: 0 }));
        push_u64(&r, 1);
        assert_eq!(get_u64(&r, 0), Ok(1));
        assert_eq!(get_u64(&r, 1), Err(Miss::NeverWritten { back: 1 }));
    }

    /// Invariant: after `sz + k` pushes, `get(i)` succeeds for `i < sz` with the
    /// newest values and fails for `i >= sz`.
    #[test]
    fn wrap_overwrites_oldest() {
        let r = HistoryRing::new(4, 8).unwrap();
        for v in 0..7u64 {
            push_u64(&r, v);
        }
        assert_eq!(r.written(), 7);
        for back in 0..4 {
            assert_eq!(get_u64(&r, back), Ok(6 - back as u64));
        }
        assert_eq!(
            get_u64(&r, 4),
            Err(Miss::BeyondCapacity { back: 4, capacity: 4 })
        );
    }

    /// Invariant: a reservation dropped without commit leaves its slot unreadable,
    /// even when it held an older committed record.
    #[test]
    fn aborted_reservation_is_invisible() {
        let r = HistoryRing::new(1, 8).unwrap();
        push_u64(&r, 11);
        {
            let mut res = r.allocate();
            res.payload_mut().copy_from_slice(&22u64.to_le_bytes());
        }
        assert_eq!(get_u64(&r, 0), Err(Miss::NeverWritten { back: 0 }));
        push_u64(&r, 33);
        assert_eq!(get_u64(&r, 0), Ok(33));
    }

    /// Invariant: `get_recent` returns newest first and is all-or-nothing.
    #[test]
    fn get_recent_newest_first() {
        let r = HistoryRing::new(8, 2).unwrap();
        for v in [1u8, 2, 3] {
            r.push(&[v, v]);
        }
        let mut out = [0u8; 6];
        r.get_recent(3, &mut out).unwrap();
        assert_eq!(out, [3, 3, 2, 2, 1, 1]);

        let mut too_many = [0xffu8; 8];
        assert_eq!(
            r.get_recent(4, &mut too_many),
            Err(Miss::NeverWritten { back: 3 })
        );
        assert_eq!(too_many, [0xff; 8]);
    }

    /// Invariant: a window buffer of the wrong length never yields a
    /// partial copy; debug builds stop at the mismatch.
    #[cfg(debug_assertions)]
    #[test]
    fn short_window_buffer_trips_debug_check() {
        let r = HistoryRing::new(4, 8).unwrap();
        push_u64(&r, 1);
        push_u64(&r, 2);
        let res = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let mut short = [0u8; 8];
            let _ = r.get_recent(2, &mut short);
        }));
        assert!(res.is_err());
        let mut one = [0u8; 4];
        assert!(std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _ = r.get(0, &mut one);
        }))
        .is_err());
    }

    /// Invariant: concurrent writers each land in a distinct slot.
    #[test]
    fn concurrent_pushes_fill_distinct_slots() {
        let r = std::sync::Arc::new(HistoryRing::new(64, 8).unwrap());
        let hs: Vec<_> = (0..4u64)
            .map(|t| {
                let r = r.clone();
                std::thread::spawn(move || {
                    for i in 0..16u64 {
                        push_u64(&r, t * 100 + i);
                    }
                })
            })
            .collect();
        for h in hs {
            h.join().unwrap();
        }
        let mut seen: Vec<u64> = (0..64).map(|b| get_u64(&r, b).unwrap()).collect();
        seen.sort_unstable();
        seen.dedup();
        assert_eq!(seen.len(), 64);
    }
}
