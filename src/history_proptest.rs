#![cfg(test)]

// Property tests for HistoryRing retrieval across wrap-around.

use crate::error::Miss;
use crate::history::HistoryRing;
use proptest::prelude::*;

// Property: after any number of pushes into a ring of capacity `2^p`,
// - `get(i)` returns the i-th newest pushed value for `i < min(pushed, cap)`;
// - `get(i)` is `NeverWritten` for `pushed <= i < cap`;
// - `get(i)` is `BeyondCapacity` for every `i >= cap`.
proptest! {
    #![proptest_config(ProptestConfig { cases: 128, .. ProptestConfig::default() })]
    #[test]
    fn prop_ring_retrieval(pow in 0u32..5, values in proptest::collection::vec(any::<u64>(), 0..40)) {
        let cap = 1usize << pow;
        let ring = HistoryRing::new(cap, 8).unwrap();
        for v in &values {
            ring.push(&v.to_le_bytes());
        }
        prop_assert_eq!(ring.written(), values.len() as u64);

        for back in 0..cap + 3 {
            let mut buf = [0u8; 8];
            let got = ring.get(back, &mut buf).map(|_| u64::from_le_bytes(buf));
            if back >= cap {
                prop_assert_eq!(got, Err(Miss::BeyondCapacity { back, capacity: cap }));
            } else if back >= values.len() {
                prop_assert_eq!(got, Err(Miss::NeverWritten { back }));
            } else {
                prop_assert_eq!(got, Ok(values[values.len() - 1 - back]));
            }
        }

        let n = values.len().min(cap);
        let mut window = vec![0u8; n * 8];
        ring.get_recent(n, &mut window).unwrap();
        let newest_first: Vec<u64> = values.iter().rev().take(n).copied().collect();
        let decoded: Vec<u64> = window
            .chunks_exact(8)
            .map(|c| u64::from_le_bytes(c.try_into().unwrap()))
            .collect();
        prop_assert_eq!(decoded, newest_first);
    }
}
