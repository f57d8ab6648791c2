// Concurrency tests: many threads reporting into shared maps while others
// combine. These check that the data plane never loses a committed
// insert, never exposes a torn result, and never needs the registration
// lock.
use fstore::{Identity, Key, Lookup, ScratchArea, ScratchWindow, Store, StoreConfig};
use std::sync::Arc;
use std::thread;

const THREADS: u64 = 4;
const PER_THREAD: u64 = 500;

// Test: concurrent inserts of distinct keys into one hash-backed map.
// Assumes: keys are dense and the table large enough that none collide.
// Verifies: every value is visible afterwards and the key history holds
// exactly `depth` of the inserted keys.
#[test]
fn concurrent_inserts_distinct_keys() {
    let store = Arc::new(
        Store::new(StoreConfig::default().with_hash_table(4096, 1)).unwrap(),
    );
    let map = store.register_map("events", "seq", None, 64).unwrap();

    let hs: Vec<_> = (0..THREADS)
        .map(|t| {
            let (store, map) = (Arc::clone(&store), map.clone());
            thread::spawn(move || {
                for i in 0..PER_THREAD {
                    let k = t * PER_THREAD + i;
                    store.insert(&map, Key::token(k), k + 1).unwrap();
                }
            })
        })
        .collect();
    for h in hs {
        h.join().unwrap();
    }

    for k in 0..THREADS * PER_THREAD {
        assert_eq!(store.lookup(&map, &Key::token(k)).unwrap(), k + 1);
    }
    let recent = store.past_keys(&map, 64).unwrap();
    assert_eq!(recent.len(), 64);
    assert!(recent.iter().all(|k| k.raw() < THREADS * PER_THREAD));
}

// Test: multi-byte results are never observed half-written.
// Assumes: the combiner writes the same byte across a 64-byte result.
// Verifies: every result a reader sees is uniform.
#[test]
fn readers_never_see_torn_results() {
    let store = Arc::new(Store::new(StoreConfig::default().with_hash_table(64, 1)).unwrap());
    let m = store.register_map("m", "k", None, 4).unwrap();
    let c = store
        .register_combiner(
            &[Identity::named("m")],
            |a: &[u64], out: &mut [u8]| {
                for b in out.iter_mut() {
                    *b = a[0] as u8;
                    std::hint::spin_loop();
                }
            },
            64,
            8,
        )
        .unwrap();

    let writer = {
        let (store, m, c) = (Arc::clone(&store), m.clone(), c.clone());
        thread::spawn(move || {
            for v in 0..2000u64 {
                store.insert(&m, Key::token(1), v).unwrap();
                store.combine(&c, Lookup::Independent).unwrap();
            }
        })
    };
    let reader = {
        let (store, c) = (Arc::clone(&store), c.clone());
        thread::spawn(move || {
            let mut buf = [0u8; 64];
            for _ in 0..2000 {
                if store.query_past_into(&c, 1, &mut buf).is_ok() {
                    assert!(buf.iter().all(|b| *b == buf[0]), "torn result: {:?}", buf);
                }
            }
        })
    };
    writer.join().unwrap();
    reader.join().unwrap();
    assert_eq!(store.query_past(&c, 1).unwrap()[0], vec![(1999u64 as u8); 64]);
}

// Test: scratch-backed reporting from many threads, one object per thread.
// Verifies: each thread's object holds its own start/end values and a
// broadcast combine on the latest key yields a non-negative latency.
#[test]
fn scratch_objects_per_thread() {
    let store = Arc::new(Store::with_defaults());
    let w = Some(ScratchWindow::new(0, 16));
    let start = store.register_map("start", "req", w, 16).unwrap();
    let end = store.register_map("end", "req", w, 16).unwrap();
    let deps = [Identity::named("start"), Identity::named("end")];
    let lat = store
        .register_combiner(
            &deps,
            |a: &[u64], out: &mut [u8]| out.copy_from_slice(&(a[1] - a[0]).to_le_bytes()),
            8,
            16,
        )
        .unwrap();

    // Objects outlive every use of their keys: the store is dropped first.
    let objects: Arc<Vec<ScratchArea>> =
        Arc::new((0..THREADS).map(|_| ScratchArea::new(16)).collect());

    let hs: Vec<_> = (0..THREADS as usize)
        .map(|t| {
            let (store, start, end, objects) =
                (Arc::clone(&store), start.clone(), end.clone(), Arc::clone(&objects));
            thread::spawn(move || {
                let k = unsafe { Key::inline(&objects[t]) };
                store.insert(&start, k, 100 * t as u64).unwrap();
                store.insert(&end, k, 100 * t as u64 + t as u64 + 1).unwrap();
            })
        })
        .collect();
    for h in hs {
        h.join().unwrap();
    }

    for (t, obj) in objects.iter().enumerate() {
        let k = unsafe { Key::inline(obj) };
        assert_eq!(store.lookup(&start, &k).unwrap(), 100 * t as u64);
        let steps = [k, k];
        store.combine(&lat, Lookup::Explicit(&steps)).unwrap();
        assert_eq!(store.query_past_u64(&lat, 1).unwrap(), vec![t as u64 + 1]);
    }
    store.combine(&lat, Lookup::Broadcast(1)).unwrap();
    drop(store);
}
