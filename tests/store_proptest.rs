use fstore::{Identity, Key, Lookup, ScratchWindow, Store, StoreConfig, StoreError, Table};
use proptest::prelude::*;

// Property: for a key kind with W bytes of scratch, exactly the first
// floor(W / 8) maps registered against it are scratch-backed, at
// consecutive offsets from the window start; every later map is
// hash-backed. Registrations on other kinds do not consume its room.
proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_scratch_selection(words in 0usize..6, extra in 0usize..8, base in 0usize..4, n in 1usize..10) {
        let s = Store::new(StoreConfig::default().with_hash_table(8, 1)).unwrap();
        let w = Some(ScratchWindow::new(base * 8, words * 8 + extra));
        let mut scratch_offsets = Vec::new();
        for i in 0..n {
            let m = s.register_map(format!("m{i}"), "kind", w, 2).unwrap();
            // Interleave another kind; it has its own window.
            s.register_map(format!("o{i}"), "other", w, 2).unwrap();
            if let Some(off) = m.scratch_offset() {
                scratch_offsets.push(off);
            }
        }
        let expect_scratch = n.min((words * 8 + extra) / 8);
        let expected: Vec<usize> = (0..expect_scratch).map(|j| base * 8 + j * 8).collect();
        prop_assert_eq!(scratch_offsets, expected);
    }
}

// Property: the map table accepts exactly `max_maps` registrations; every
// later one fails with CapacityExceeded and earlier maps remain usable.
proptest! {
    #![proptest_config(ProptestConfig { cases: 32, .. ProptestConfig::default() })]
    #[test]
    fn prop_map_capacity(cap in 1usize..12, attempts in 1usize..20) {
        let s = Store::new(StoreConfig::default().with_max_maps(cap).with_hash_table(4, 1)).unwrap();
        let mut ok = Vec::new();
        for i in 0..attempts {
            match s.register_map(format!("m{i}"), "k", None, 1) {
                Ok(m) => ok.push(m),
                Err(e) => {
                    prop_assert!(i >= cap);
                    prop_assert_eq!(e, StoreError::CapacityExceeded { table: Table::Maps, capacity: cap });
                }
            }
        }
        prop_assert_eq!(ok.len(), attempts.min(cap));
        for (i, m) in ok.iter().enumerate() {
            s.insert(m, Key::token(i as u64), 1).unwrap();
            prop_assert_eq!(s.lookup(m, &Key::token(i as u64)).unwrap(), 1);
        }
    }
}

// Property: with keys shared across two maps, broadcast from either map
// computes the difference for that map's newest key.
proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_broadcast_uses_source_newest(events in proptest::collection::vec((0u64..16, 0u64..1000, any::<bool>()), 1..40)) {
        let s = Store::new(StoreConfig::default().with_hash_table(64, 1)).unwrap();
        let a = s.register_map("a", "k", None, 4).unwrap();
        let b = s.register_map("b", "k", None, 4).unwrap();
        let c = s
            .register_combiner(
                &[Identity::named("a"), Identity::named("b")],
                |v: &[u64], out: &mut [u8]| out.copy_from_slice(&v[1].wrapping_sub(v[0]).to_le_bytes()),
                8,
                4,
            )
            .unwrap();

        let mut va = std::collections::HashMap::new();
        let mut vb = std::collections::HashMap::new();
        let mut last_a = None;
        for (k, v, to_a) in events {
            if to_a {
                s.insert(&a, Key::token(k), v).unwrap();
                va.insert(k, v);
                last_a = Some(k);
            } else {
                s.insert(&b, Key::token(k), v).unwrap();
                vb.insert(k, v);
            }
        }

        let res = s.combine(&c, Lookup::Broadcast(0));
        match last_a.map(|k| (va.get(&k), vb.get(&k))) {
            Some((Some(x), Some(y))) => {
                res.unwrap();
                prop_assert_eq!(s.query_past_u64(&c, 1).unwrap(), vec![y.wrapping_sub(*x)]);
            }
            _ => prop_assert!(res.unwrap_err().is_miss()),
        }
    }
}
