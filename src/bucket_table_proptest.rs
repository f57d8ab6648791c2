#![cfg(test)]

// Property tests for BucketTable kept inside the crate so they can reach
// the module directly.

use crate::bucket_table::{BucketTable, Insertion};
use proptest::prelude::*;
use std::collections::HashMap;

#[derive(Clone, Debug)]
enum Op {
    Insert(u64, u64),
    Lookup(u64),
}

fn arb_scenario() -> impl Strategy<Value = (usize, usize, Vec<Op>)> {
    let op = prop_oneof![
        (0u64..32, any::<u64>()).prop_map(|(k, v)| Op::Insert(k, v)),
        (0u64..32).prop_map(Op::Lookup),
    ];
    (1usize..=8, 1usize..=3, proptest::collection::vec(op, 1..80))
}

// Reference model: per bucket, a cursor and `assoc` optional slots, using
// the same overwrite-else-round-robin policy spelled out naively.
struct Model {
    size: usize,
    assoc: usize,
    buckets: Vec<(usize, Vec<Option<(u64, u64)>>)>,
}

impl Model {
    fn new(size: usize, assoc: usize) -> Self {
        Self {
            size,
            assoc,
            buckets: (0..size).map(|_| (0, vec![None; assoc])).collect(),
        }
    }

    fn insert(&mut self, k: u64, v: u64) -> Insertion {
        let (cursor, slots) = &mut self.buckets[(k % self.size as u64) as usize];
        for (sk, sv) in slots.iter_mut().flatten() {
            if *sk == k {
                *sv = v;
                return Insertion::Updated;
            }
        }
        let pos = *cursor % self.assoc;
        *cursor += 1;
        match slots[pos].replace((k, v)) {
            Some((old, _)) => Insertion::Evicted { key: old },
            None => Insertion::Inserted,
        }
    }

    fn lookup(&self, k: u64) -> Option<u64> {
        let (_, slots) = &self.buckets[(k % self.size as u64) as usize];
        slots.iter().flatten().find(|(sk, _)| *sk == k).map(|(_, v)| *v)
    }

    fn len(&self) -> usize {
        self.buckets.iter().map(|(_, s)| s.iter().flatten().count()).sum()
    }
}

// Property: state-machine equivalence against the naive model.
// Invariants exercised across random operation sequences:
// - Resident keys are overwritten in place; the latest value wins.
// - A bucket never holds more than `assoc` keys; eviction is round-robin.
// - Lookups return exactly what the model holds; `len` matches.
proptest! {
    #![proptest_config(ProptestConfig { cases: 128, .. ProptestConfig::default() })]
    #[test]
    fn prop_matches_model((size, assoc, ops) in arb_scenario()) {
        let sut = BucketTable::new(size, assoc);
        let mut model = Model::new(size, assoc);
        let mut last: HashMap<u64, u64> = HashMap::new();

        for op in ops {
            match op {
                Op::Insert(k, v) => {
                    prop_assert_eq!(sut.insert(k, v), model.insert(k, v));
                    last.insert(k, v);
                    // The key just written is always resident.
                    prop_assert_eq!(sut.lookup(k), Some(v));
                }
                Op::Lookup(k) => {
                    let got = sut.lookup(k);
                    prop_assert_eq!(got, model.lookup(k));
                    if let Some(v) = got {
                        prop_assert_eq!(Some(&v), last.get(&k));
                    }
                }
            }
            prop_assert!(sut.len() <= size * assoc);
            prop_assert_eq!(sut.len(), model.len());
        }
    }
}
