//! Concurrency stress tests.
//!
//! Many application threads allocate, write, verify and free objects while
//! the trim thread compacts underneath them. Every object carries a
//! fingerprint of its owner, so a lost update or an overlapping span shows
//! up as a corrupted read.
//!
//! Run with: cargo test --test concurrency_stress -- --nocapture

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use trimheap_core::{HeapConfig, HeapError, HeapHandle, MemoryManager, TrimState};

/// Fills `len` bytes with a pattern unique to `(thread, seq)`.
fn fingerprint(thread: usize, seq: usize, len: usize) -> Vec<u8> {
    (0..len)
        .map(|k| (thread.wrapping_mul(31) ^ seq.wrapping_mul(7) ^ k) as u8)
        .collect()
}

fn stress_config() -> HeapConfig {
    HeapConfig {
        capacity: 64 * 1024,
        max_slots: 1024,
        trim_interval_ms: 1,
        background_trim: true,
        scrub_freed: true,
    }
}

#[test]
fn concurrent_alloc_free_with_trim_thread() {
    let heap = Arc::new(MemoryManager::new(stress_config()).unwrap());
    let num_threads = 8;
    let ops_per_thread = 2_000;
    let out_of_memory = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..num_threads)
        .map(|t| {
            let heap = Arc::clone(&heap);
            let out_of_memory = Arc::clone(&out_of_memory);

            thread::spawn(move || {
                let mut rng = StdRng::seed_from_u64(t as u64);
                let mut owned: Vec<(HeapHandle, usize)> = Vec::new();

                for seq in 0..ops_per_thread {
                    let free_one = !owned.is_empty() && (owned.len() > 32 || rng.gen_bool(0.4));

                    if free_one {
                        let victim = rng.gen_range(0..owned.len());
                        let (handle, owner_seq) = owned.swap_remove(victim);
                        let len = heap.size_of(handle).unwrap();
                        assert_eq!(
                            heap.read_bytes(handle).unwrap(),
                            fingerprint(t, owner_seq, len),
                            "thread {t} object {owner_seq} corrupted"
                        );
                        heap.deallocate(handle).unwrap();
                        continue;
                    }

                    let size = rng.gen_range(1..=64);
                    match heap.allocate(size) {
                        Ok(handle) => {
                            heap.write_bytes(handle, 0, &fingerprint(t, seq, size)).unwrap();
                            owned.push((handle, seq));
                        }
                        Err(HeapError::OutOfMemory { .. }) => {
                            out_of_memory.fetch_add(1, Ordering::Relaxed);
                        }
                        Err(other) => panic!("unexpected error: {other}"),
                    }
                }

                for (handle, owner_seq) in owned {
                    let len = heap.size_of(handle).unwrap();
                    assert_eq!(heap.read_bytes(handle).unwrap(), fingerprint(t, owner_seq, len));
                    heap.deallocate(handle).unwrap();
                }
            })
        })
        .collect();

    for h in handles {
        h.join().unwrap();
    }

    heap.check_invariants().unwrap();

    let deadline = Instant::now() + Duration::from_secs(5);
    while heap.stats().trim_passes == 0 && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(1));
    }
    heap.collect().unwrap();

    let stats = heap.stats();
    println!("\n=== Concurrency Stress ===");
    println!("Passes: {} ({} by trim thread)", stats.passes, stats.trim_passes);
    println!("Reclaimed: {} slots, {} bytes", stats.reclaimed_slots, stats.reclaimed_bytes);
    println!("OOM retries: {}", out_of_memory.load(Ordering::Relaxed));

    assert_eq!(stats.count, 0);
    assert_eq!(stats.used, 0);
    assert!(stats.trim_passes > 0);
    heap.check_invariants().unwrap();
}

#[test]
fn invariants_hold_under_stop_the_world_checks() {
    let heap = Arc::new(MemoryManager::new(stress_config()).unwrap());
    let running = Arc::new(AtomicBool::new(true));

    let workers: Vec<_> = (0..4)
        .map(|t| {
            let heap = Arc::clone(&heap);
            let running = Arc::clone(&running);
            thread::spawn(move || {
                let mut rng = StdRng::seed_from_u64(1000 + t);
                let mut owned = Vec::new();
                while running.load(Ordering::Relaxed) {
                    if owned.len() < 16 {
                        if let Ok(h) = heap.allocate(rng.gen_range(1..=32)) {
                            owned.push(h);
                        }
                    } else {
                        let h = owned.swap_remove(rng.gen_range(0..owned.len()));
                        heap.deallocate(h).unwrap();
                    }
                }
                owned
            })
        })
        .collect();

    let deadline = Instant::now() + Duration::from_millis(300);
    let mut checks = 0;
    while Instant::now() < deadline {
        heap.check_invariants().unwrap();
        let snap = heap.snapshot().unwrap();
        assert!(snap.used <= snap.capacity);
        assert!(snap.count() <= snap.max_slots);
        checks += 1;
    }
    running.store(false, Ordering::Relaxed);

    let mut survivors = 0;
    for w in workers {
        survivors += w.join().unwrap().len();
    }

    heap.collect().unwrap();
    assert_eq!(heap.stats().live, survivors);
    assert!(checks > 0);
    heap.check_invariants().unwrap();
}

#[test]
fn teardown_stops_background_passes() {
    let heap = MemoryManager::new(stress_config()).unwrap();
    assert!(matches!(
        heap.trim_state(),
        TrimState::Running | TrimState::CollectingPass
    ));

    let deadline = Instant::now() + Duration::from_secs(5);
    while heap.stats().trim_passes < 3 && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(1));
    }
    assert!(heap.stats().trim_passes >= 3);

    heap.destroy().unwrap();
    assert_eq!(heap.trim_state(), TrimState::Stopped);

    let passes = heap.stats().trim_passes;
    thread::sleep(Duration::from_millis(20));
    assert_eq!(heap.stats().trim_passes, passes);

    assert_eq!(heap.destroy(), Err(HeapError::AlreadyDestroyed));
    assert_eq!(heap.allocate(8), Err(HeapError::Destroyed));
}

#[test]
fn concurrent_destroy_is_reported_once() {
    let heap = Arc::new(MemoryManager::new(stress_config()).unwrap());
    let successes = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let heap = Arc::clone(&heap);
            let successes = Arc::clone(&successes);
            thread::spawn(move || match heap.destroy() {
                Ok(()) => {
                    successes.fetch_add(1, Ordering::Relaxed);
                }
                Err(err) => assert_eq!(err, HeapError::AlreadyDestroyed),
            })
        })
        .collect();

    for h in handles {
        h.join().unwrap();
    }
    assert_eq!(successes.load(Ordering::Relaxed), 1);
}
