// Copyright 2026 oncecache Project Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Barrier,
    },
    thread,
    time::Duration,
};

use itertools::Itertools;
use oncecache::{Cache, CacheBuilder, ErrorKind, SlotState};
use rand::{rngs::SmallRng, Rng, SeedableRng};

const THREADS: usize = 8;

/// Run `f` on `THREADS` threads that start together, and collect the results in thread order.
fn race<T, F>(f: F) -> Vec<T>
where
    T: Send + 'static,
    F: Fn(usize) -> T + Send + Sync + 'static,
{
    let f = Arc::new(f);
    let barrier = Arc::new(Barrier::new(THREADS));
    let handles = (0..THREADS)
        .map(|i| {
            let f = f.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                f(i)
            })
        })
        .collect_vec();
    handles.into_iter().map(|h| h.join().unwrap()).collect()
}

#[test_log::test]
fn test_concurrent_reads_after_insert() {
    let produced = Arc::new(AtomicUsize::new(0));
    let cache = Cache::with_default_producer({
        let produced = produced.clone();
        move |_: &u64| {
            produced.fetch_add(1, Ordering::SeqCst);
            0u64
        }
    });

    cache.insert(3, 29).unwrap();
    let values = race({
        let cache = cache.clone();
        move |_| cache.get(&3).unwrap()
    });

    assert_eq!(values, vec![29; THREADS]);
    assert_eq!(produced.load(Ordering::SeqCst), 0);
}

#[test_log::test]
fn test_remove_absent() {
    let cache: Cache<u64, u64> = Cache::new();

    assert!(cache.keys().is_empty());
    assert_eq!(cache.try_remove(&3).unwrap(), None);
    assert!(cache.keys().is_empty());
}

#[test_log::test]
fn test_concurrent_producers_run_once() {
    let cache: Cache<u64, u64> = Cache::new();
    let counter = Arc::new(AtomicUsize::new(0));

    let values = race({
        let cache = cache.clone();
        let counter = counter.clone();
        move |_| {
            // Every thread brings its own closure.
            let counter = counter.clone();
            cache
                .get_or_insert_with(3, move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                    thread::sleep(Duration::from_millis(10));
                    29
                })
                .unwrap()
        }
    });

    assert_eq!(values, vec![29; THREADS]);
    assert_eq!(counter.load(Ordering::SeqCst), 1);
}

#[test_log::test]
fn test_concurrent_try_insert_single_winner() {
    let cache: Cache<u64, usize> = Cache::new();

    let inserted = race({
        let cache = cache.clone();
        move |i| cache.try_insert(3, i).unwrap()
    });

    let winners = inserted.iter().positions(|inserted| *inserted).collect_vec();
    assert_eq!(winners.len(), 1);
    assert_eq!(cache.get(&3).unwrap(), winners[0]);
}

#[test_log::test]
fn test_concurrent_faults_are_shared() {
    let cache: Cache<u64, u64> = Cache::new();
    let counter = Arc::new(AtomicUsize::new(0));

    let errors = race({
        let cache = cache.clone();
        let counter = counter.clone();
        move |_| {
            let counter = counter.clone();
            cache
                .try_get_or_insert_with(3, move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                    thread::sleep(Duration::from_millis(10));
                    Err::<u64, _>(anyhow::anyhow!("connection refused"))
                })
                .unwrap_err()
        }
    });

    assert_eq!(counter.load(Ordering::SeqCst), 1);
    assert!(errors.iter().all(|e| e.kind() == ErrorKind::External));
    assert!(errors.iter().tuple_windows().all(|(a, b)| a.is_same(b)));
    assert_eq!(cache.slot(&3).unwrap().state(), SlotState::Faulted);

    // The failure stays until the key is removed.
    assert!(cache.try_remove(&3).is_err());
    assert_eq!(cache.get_or_insert_with(3, || 29).unwrap(), 29);
}

#[test_log::test]
fn test_concurrent_remove_during_production() {
    let cache: Cache<u64, u64> = Cache::new();
    let counter = Arc::new(AtomicUsize::new(0));

    let handle = thread::spawn({
        let cache = cache.clone();
        let counter = counter.clone();
        move || {
            cache.get_or_insert_with(3, move || {
                counter.fetch_add(1, Ordering::SeqCst);
                thread::sleep(Duration::from_millis(50));
                29
            })
        }
    });

    while !cache.contains(&3) {
        thread::yield_now();
    }

    // Removal shares the single producer run with the inserting caller.
    assert_eq!(cache.try_remove(&3).unwrap(), Some(29));
    assert_eq!(handle.join().unwrap().unwrap(), 29);
    assert_eq!(counter.load(Ordering::SeqCst), 1);
    assert!(!cache.contains(&3));
}

#[test_log::test]
fn test_overwrite_does_not_affect_waiters() {
    let cache: Cache<u64, u64> = Cache::new();
    let (tx, rx) = std::sync::mpsc::channel();

    let handle = thread::spawn({
        let cache = cache.clone();
        move || {
            cache.get_or_insert_with(3, move || {
                tx.send(()).unwrap();
                thread::sleep(Duration::from_millis(50));
                1
            })
        }
    });

    rx.recv().unwrap();
    cache.insert(3, 2).unwrap();

    // The waiter observes the slot it found, later readers observe the overwrite.
    assert_eq!(handle.join().unwrap().unwrap(), 1);
    assert_eq!(cache.get(&3).unwrap(), 2);
}

#[test_log::test]
fn test_max_entries_under_contention() {
    let cache: Cache<usize, usize> = CacheBuilder::new().with_shards(4).with_max_entries(64).build().unwrap();

    let results = race({
        let cache = cache.clone();
        move |i| {
            (0..32)
                .map(|j| cache.get_or_insert_with(i * 32 + j, move || j))
                .filter(|res| res.is_ok())
                .count()
        }
    });

    assert_eq!(results.into_iter().sum::<usize>(), 64);
    assert_eq!(cache.len(), 64);
    assert_eq!(cache.keys().len(), 64);
}

mod fuzzy {
    use super::*;

    #[test_log::test]
    fn test_cache_fuzzy() {
        const KEYS: u64 = 128;

        let cache: Cache<u64, u64> = CacheBuilder::new().with_shards(8).build().unwrap();

        let handles = (0..THREADS as u64)
            .map(|i| {
                let cache = cache.clone();
                thread::spawn(move || {
                    let mut rng = SmallRng::seed_from_u64(i);
                    for _ in 0..20000 {
                        let key = rng.random_range(0..KEYS);
                        match rng.random_range(0..10) {
                            0 => {
                                if let Some(value) = cache.try_remove(&key).unwrap() {
                                    assert_eq!(value, key);
                                }
                            }
                            1 => {
                                cache.try_insert(key, key).unwrap();
                            }
                            _ => {
                                let value = cache.get_or_insert_with(key, move || key).unwrap();
                                assert_eq!(value, key);
                            }
                        }
                    }
                })
            })
            .collect_vec();

        handles.into_iter().for_each(|handle| handle.join().unwrap());

        assert_eq!(cache.len(), cache.keys().len());
        assert!(cache.len() <= KEYS as usize);
        assert!(cache.entries().into_iter().all(|(key, slot)| slot.evaluate().unwrap() == key));
    }
}
