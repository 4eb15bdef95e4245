// ==============================================
// MULTI-THREADED INTEGRITY (integration)
// ==============================================
//
// Hammers the sharded façade from many threads and checks that nothing
// panics, reads never observe foreign values, and the capacity bound holds
// at quiescence. Throughput itself is measured in benches/, not here.

use std::thread;

use fifokit::builder::CacheBuilder;

#[test]
fn mixed_workload_preserves_integrity() {
    const THREADS: u64 = 8;
    const OPS_PER_THREAD: u64 = 100_000;
    const KEY_SPACE: u64 = 100_000;
    const CAPACITY: usize = 10_000;

    let cache = CacheBuilder::new(CAPACITY).build().unwrap();

    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let cache = cache.clone();
            thread::spawn(move || {
                // Cheap xorshift so threads walk different key sequences.
                let mut state = t * 0x9e37_79b9 + 1;
                for _ in 0..OPS_PER_THREAD {
                    state ^= state << 13;
                    state ^= state >> 7;
                    state ^= state << 17;
                    let key = state % KEY_SPACE;

                    // 75% reads, 25% writes.
                    if state % 4 != 0 {
                        if let Some(value) = cache.get(&key) {
                            assert_eq!(value, key * 3, "foreign value for key {}", key);
                        }
                    } else {
                        cache.insert(key, key * 3);
                    }
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    assert!(
        cache.len() <= CAPACITY + cache.shard_count(),
        "len {} exceeds capacity bound",
        cache.len()
    );

    // Every surviving entry still maps to its own value.
    for key in 0..KEY_SPACE {
        if let Some(value) = cache.get(&key) {
            assert_eq!(value, key * 3);
        }
    }
}

#[test]
fn concurrent_writers_on_one_hot_key_keep_last_write() {
    let cache = CacheBuilder::new(100).build().unwrap();

    let handles: Vec<_> = (0..4u64)
        .map(|t| {
            let cache = cache.clone();
            thread::spawn(move || {
                for i in 0..10_000u64 {
                    cache.insert("hot", t * 1_000_000 + i);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    // The surviving value is the last write of some thread.
    let value = cache.get(&"hot").expect("hot key missing");
    assert_eq!(value % 1_000_000, 9_999);
}

#[test]
fn close_races_cleanly_with_writers() {
    let cache = CacheBuilder::new(1_000).build().unwrap();

    let writers: Vec<_> = (0..4u64)
        .map(|t| {
            let cache = cache.clone();
            thread::spawn(move || {
                for i in 0..50_000u64 {
                    cache.insert(t * 100_000 + i, i);
                }
            })
        })
        .collect();

    let closer = {
        let cache = cache.clone();
        thread::spawn(move || {
            // Let some writes land first.
            thread::yield_now();
            cache.close();
        })
    };

    for handle in writers {
        handle.join().unwrap();
    }
    closer.join().unwrap();

    // Once closed, the cache stays empty and inert.
    assert!(cache.is_closed());
    assert_eq!(cache.len(), 0);
    cache.insert(1, 1);
    assert_eq!(cache.get(&1), None);
}

#[test]
fn readers_and_removers_do_not_interfere_across_shards() {
    let cache = CacheBuilder::new(8_192).shards(8).build().unwrap();

    for i in 0..8_192u64 {
        cache.insert(i, i);
    }

    let reader = {
        let cache = cache.clone();
        thread::spawn(move || {
            for _ in 0..20 {
                for i in 0..8_192u64 {
                    if let Some(v) = cache.get(&i) {
                        assert_eq!(v, i);
                    }
                }
            }
        })
    };

    let remover = {
        let cache = cache.clone();
        thread::spawn(move || {
            for i in (0..8_192u64).step_by(3) {
                cache.remove(&i);
            }
        })
    };

    reader.join().unwrap();
    remover.join().unwrap();

    for i in (0..8_192u64).step_by(3) {
        assert_eq!(cache.get(&i), None, "removed key {} reappeared", i);
    }
}
