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
    fmt::Debug,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

use hashbrown::hash_table::Entry as HashTableEntry;
use itertools::Itertools;
use oncecache_common::{
    code::{Key, Value},
    error::{Error, Result},
    event::Event,
    metrics::model::Metrics,
    scope::Scope,
    strict_assert,
};
use parking_lot::RwLock;

use crate::{comparer::KeyComparer, indexer::HashTableIndexer, listener::EventListener, record::Record, slot::Slot};

pub struct RawCacheConfig<K, V, C> {
    pub name: String,
    pub shards: usize,
    pub max_entries: Option<usize>,
    pub comparer: C,
    pub event_listener: Option<Arc<dyn EventListener<Key = K, Value = V>>>,
    pub metrics: Arc<Metrics>,
}

struct RawCacheShard<K, V> {
    indexer: HashTableIndexer<K, V>,
}

struct RawCacheInner<K, V, C> {
    name: String,
    shards: Vec<RwLock<RawCacheShard<K, V>>>,
    comparer: C,

    entries: AtomicUsize,
    max_entries: Option<usize>,

    event_listener: Option<Arc<dyn EventListener<Key = K, Value = V>>>,
    metrics: Arc<Metrics>,
}

/// The sharded backing map and the at-most-once insertion protocol.
///
/// Shard locks only guard hash table operations. Producers always run after the shard lock has been released, inside
/// the slot they belong to.
pub struct RawCache<K, V, C> {
    inner: Arc<RawCacheInner<K, V, C>>,
}

impl<K, V, C> Clone for RawCache<K, V, C> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<K, V, C> Debug for RawCache<K, V, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawCache")
            .field("name", &self.inner.name)
            .field("shards", &self.inner.shards.len())
            .field("entries", &self.inner.entries.load(Ordering::Relaxed))
            .field("max_entries", &self.inner.max_entries)
            .finish()
    }
}

impl<K, V, C> RawCache<K, V, C>
where
    K: Key,
    V: Value,
    C: KeyComparer<K>,
{
    pub fn new(config: RawCacheConfig<K, V, C>) -> Self {
        strict_assert!(config.shards > 0);

        let shards = (0..config.shards)
            .map(|_| {
                RwLock::new(RawCacheShard {
                    indexer: HashTableIndexer::default(),
                })
            })
            .collect_vec();

        tracing::debug!(
            name = %config.name,
            shards = config.shards,
            max_entries = ?config.max_entries,
            "[raw cache]: created"
        );

        let inner = RawCacheInner {
            name: config.name,
            shards,
            comparer: config.comparer,
            entries: AtomicUsize::new(0),
            max_entries: config.max_entries,
            event_listener: config.event_listener,
            metrics: config.metrics,
        };
        Self { inner: Arc::new(inner) }
    }

    /// Insert an evaluated slot only if the key is absent.
    pub fn try_insert(&self, key: K, value: V) -> Result<bool> {
        let hash = self.inner.comparer.hash_key(&key);

        let mut shard = self.inner.shards[self.shard(hash)].write();
        match shard.indexer.entry(hash, &key, &self.inner.comparer) {
            HashTableEntry::Occupied(_) => Ok(false),
            HashTableEntry::Vacant(v) => {
                self.reserve()?;
                v.insert(Record::new(hash, key, Arc::new(Slot::ready(value))));
                self.inner.metrics.insert.increase(1);
                Ok(true)
            }
        }
    }

    /// Insert an evaluated slot unconditionally, replacing the slot of the key if any.
    ///
    /// Evaluations already waiting on the replaced slot are not affected.
    pub fn insert(&self, key: K, value: V) -> Result<()> {
        let hash = self.inner.comparer.hash_key(&key);
        let record = Record::new(hash, key, Arc::new(Slot::ready(value)));

        let old = self.inner.shards[self.shard(hash)]
            .write()
            .indexer
            .insert(record, &self.inner.comparer, || self.reserve())?;

        match old {
            Some(old) => {
                self.inner.metrics.replace.increase(1);
                self.notify(Event::Replace, old);
            }
            None => self.inner.metrics.insert.increase(1),
        }
        Ok(())
    }

    /// Get the canonical slot of the key, or install `producer` as a new candidate slot, then evaluate it.
    ///
    /// The candidate is built before the insertion attempt. If another caller installed a slot first, the candidate
    /// is dropped without running its producer.
    pub fn get_or_insert<F>(&self, key: K, producer: F) -> Result<V>
    where
        F: FnOnce() -> Result<V> + Send + 'static,
    {
        let hash = self.inner.comparer.hash_key(&key);

        if let Some(slot) = self.lookup(hash, &key) {
            self.inner.metrics.hit.increase(1);
            return slot.evaluate();
        }

        let candidate = Arc::new(Slot::pending_with_metrics(producer, self.inner.metrics.clone()));

        let slot = {
            let mut shard = self.inner.shards[self.shard(hash)].write();
            match shard.indexer.entry(hash, &key, &self.inner.comparer) {
                HashTableEntry::Occupied(o) => {
                    self.inner.metrics.hit.increase(1);
                    o.get().slot().clone()
                }
                HashTableEntry::Vacant(v) => {
                    self.reserve()?;
                    v.insert(Record::new(hash, key, candidate.clone()));
                    self.inner.metrics.miss.increase(1);
                    self.inner.metrics.insert.increase(1);
                    candidate.clone()
                }
            }
        };

        if !Arc::ptr_eq(&slot, &candidate) {
            strict_assert!(!candidate.is_evaluated());
            self.inner.metrics.discard.increase(1);
            tracing::trace!(hash, "[raw cache]: candidate slot lost the insertion race, discarded");
        }
        drop(candidate);

        slot.evaluate()
    }

    /// Detach the slot of the key and evaluate it.
    ///
    /// A slot that has never been evaluated runs its producer here so that a value can be returned.
    pub fn try_remove(&self, key: &K) -> Result<Option<V>> {
        let hash = self.inner.comparer.hash_key(key);

        let record = self.inner.shards[self.shard(hash)]
            .write()
            .indexer
            .remove(hash, key, &self.inner.comparer);

        let Some(record) = record else {
            return Ok(None);
        };
        self.release(1);
        self.inner.metrics.remove.increase(1);

        let slot = record.slot().clone();
        let res = slot.evaluate();
        self.notify(Event::Remove, record);
        res.map(Some)
    }

    /// Get the canonical slot of the key without evaluating it.
    pub fn get_slot(&self, key: &K) -> Option<Arc<Slot<V>>> {
        let hash = self.inner.comparer.hash_key(key);
        self.lookup(hash, key)
    }

    pub fn contains(&self, key: &K) -> bool {
        let hash = self.inner.comparer.hash_key(key);
        self.inner.shards[self.shard(hash)]
            .read()
            .indexer
            .get(hash, key, &self.inner.comparer)
            .is_some()
    }

    /// Snapshot of all keys and their slots, shard by shard.
    pub fn entries(&self) -> Vec<(K, Arc<Slot<V>>)> {
        self.inner
            .shards
            .iter()
            .flat_map(|shard| {
                shard
                    .read()
                    .indexer
                    .iter()
                    .map(|r| (r.key().clone(), r.slot().clone()))
                    .collect_vec()
            })
            .collect()
    }

    pub fn keys(&self) -> Vec<K> {
        self.inner
            .shards
            .iter()
            .flat_map(|shard| shard.read().indexer.iter().map(|r| r.key().clone()).collect_vec())
            .collect()
    }

    pub fn values(&self) -> Vec<Arc<Slot<V>>> {
        self.inner
            .shards
            .iter()
            .flat_map(|shard| shard.read().indexer.iter().map(|r| r.slot().clone()).collect_vec())
            .collect()
    }

    /// Remove all slots without evaluating them.
    pub fn clear(&self) {
        let mut garbages = vec![];
        for shard in self.inner.shards.iter() {
            let records = shard.write().with(|mut shard| shard.indexer.drain().collect_vec());
            self.release(records.len());
            garbages.extend(records);
        }
        for record in garbages {
            self.notify(Event::Clear, record);
        }
    }

    pub fn len(&self) -> usize {
        self.inner.entries.load(Ordering::Acquire)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn shards(&self) -> usize {
        self.inner.shards.len()
    }

    pub fn max_entries(&self) -> Option<usize> {
        self.inner.max_entries
    }

    pub fn metrics(&self) -> &Metrics {
        &self.inner.metrics
    }

    fn lookup(&self, hash: u64, key: &K) -> Option<Arc<Slot<V>>> {
        self.inner.shards[self.shard(hash)]
            .read()
            .indexer
            .get(hash, key, &self.inner.comparer)
            .map(|r| r.slot().clone())
    }

    /// Account for one more entry. Must be called with the shard lock held, right before the table grows.
    fn reserve(&self) -> Result<()> {
        let res = match self.inner.max_entries {
            None => {
                self.inner.entries.fetch_add(1, Ordering::AcqRel);
                Ok(())
            }
            Some(max) => self
                .inner
                .entries
                .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                    (current < max).then_some(current + 1)
                })
                .map(|_| ())
                .map_err(|current| Error::no_space(max, current, 1).with_context("name", &self.inner.name)),
        };
        if res.is_ok() {
            self.inner.metrics.entries.increase(1);
        }
        res
    }

    fn release(&self, count: usize) {
        if count == 0 {
            return;
        }
        let old = self.inner.entries.fetch_sub(count, Ordering::AcqRel);
        strict_assert!(old >= count);
        self.inner.metrics.entries.decrease(count as u64);
    }

    fn notify(&self, event: Event, record: Record<K, V>) {
        if let Some(listener) = self.inner.event_listener.as_ref() {
            let (key, slot) = record.into_parts();
            listener.on_leave(event, &key, &slot);
        }
    }

    fn shard(&self, hash: u64) -> usize {
        hash as usize % self.inner.shards.len()
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{atomic::AtomicU64, Barrier},
        thread,
        time::Duration,
    };

    use oncecache_common::{
        error::ErrorKind,
        metrics::{
            registry::noop::NoopMetricsRegistry, BoxedCounter, BoxedCounterVec, BoxedGaugeVec, BoxedHistogramVec,
            CounterOps, CounterVecOps, RegistryOps,
        },
        test_utils::ModHasher,
    };
    use parking_lot::Mutex;
    use rand::{rngs::SmallRng, Rng, SeedableRng};

    use super::*;
    use crate::{comparer::NaturalComparer, slot::SlotState};

    type TestRawCache = RawCache<u64, u64, NaturalComparer<ModHasher>>;

    fn cache_for_test(shards: usize, max_entries: Option<usize>) -> TestRawCache {
        cache_with_metrics(shards, max_entries, Metrics::noop())
    }

    fn cache_with_metrics(shards: usize, max_entries: Option<usize>, metrics: Metrics) -> TestRawCache {
        RawCache::new(RawCacheConfig {
            name: "test".to_string(),
            shards,
            max_entries,
            comparer: NaturalComparer::with_hash_builder(ModHasher::default()),
            event_listener: None,
            metrics: Arc::new(metrics),
        })
    }

    /// Install a pending slot for the key the way `get_or_insert` builds its candidate, without evaluating it.
    fn install_pending(cache: &TestRawCache, key: u64, producer: impl FnOnce() -> Result<u64> + Send + 'static) {
        let hash = cache.inner.comparer.hash_key(&key);
        let slot = Arc::new(Slot::pending_with_metrics(producer, cache.inner.metrics.clone()));
        let old = cache.inner.shards[cache.shard(hash)]
            .write()
            .indexer
            .insert(Record::new(hash, key, slot), &cache.inner.comparer, || cache.reserve())
            .unwrap();
        assert!(old.is_none());
    }

    /// Counts the `produce` series and drops everything else.
    #[derive(Debug, Default, Clone)]
    struct ProduceCountingRegistry {
        produced: Arc<AtomicU64>,
    }

    #[derive(Debug)]
    struct ProduceCounter(Arc<AtomicU64>);

    impl CounterOps for ProduceCounter {
        fn increase(&self, val: u64) {
            self.0.fetch_add(val, Ordering::Relaxed);
        }
    }

    impl CounterVecOps for ProduceCountingRegistry {
        fn counter(&self, labels: &[&str]) -> BoxedCounter {
            match labels {
                [_, "produce"] => Box::new(ProduceCounter(self.produced.clone())),
                _ => NoopMetricsRegistry.counter(labels),
            }
        }
    }

    impl RegistryOps for ProduceCountingRegistry {
        fn register_counter_vec(
            &self,
            _: &'static str,
            _: &'static str,
            _: &'static [&'static str],
        ) -> BoxedCounterVec {
            Box::new(self.clone())
        }

        fn register_gauge_vec(
            &self,
            name: &'static str,
            desc: &'static str,
            label_names: &'static [&'static str],
        ) -> BoxedGaugeVec {
            NoopMetricsRegistry.register_gauge_vec(name, desc, label_names)
        }

        fn register_histogram_vec(
            &self,
            name: &'static str,
            desc: &'static str,
            label_names: &'static [&'static str],
        ) -> BoxedHistogramVec {
            NoopMetricsRegistry.register_histogram_vec(name, desc, label_names)
        }
    }

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<(Event, u64, SlotState)>>,
    }

    impl EventListener for Recorder {
        type Key = u64;
        type Value = u64;

        fn on_leave(&self, reason: Event, key: &u64, slot: &Slot<u64>) {
            self.events.lock().push((reason, *key, slot.state()));
        }
    }

    #[test]
    fn test_raw_cache_send_sync_static() {
        fn is_send_sync_static<T: Send + Sync + 'static>() {}
        is_send_sync_static::<TestRawCache>();
    }

    #[test]
    fn test_raw_cache_try_insert() {
        let cache = cache_for_test(4, None);

        assert!(cache.try_insert(1, 10).unwrap());
        assert!(!cache.try_insert(1, 11).unwrap());
        assert_eq!(cache.get_or_insert(1, || Ok(12)).unwrap(), 10);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_raw_cache_shards() {
        let cache = cache_for_test(4, None);
        for key in 0..16 {
            cache.insert(key, key).unwrap();
        }
        assert_eq!(cache.len(), 16);
        for shard in cache.inner.shards.iter() {
            assert_eq!(shard.read().indexer.iter().count(), 4);
        }
    }

    #[test]
    fn test_raw_cache_candidate_discarded() {
        let cache = cache_for_test(1, None);
        let produced = Arc::new(AtomicU64::new(0));

        let threads = 16;
        let barrier = Arc::new(Barrier::new(threads));
        let handles = (0..threads as u64)
            .map(|i| {
                let cache = cache.clone();
                let produced = produced.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    barrier.wait();
                    cache
                        .get_or_insert(42, move || {
                            produced.fetch_add(1, Ordering::Relaxed);
                            thread::sleep(Duration::from_millis(10));
                            Ok(i)
                        })
                        .unwrap()
                })
            })
            .collect_vec();
        let values = handles.into_iter().map(|h| h.join().unwrap()).collect_vec();

        assert_eq!(produced.load(Ordering::Relaxed), 1);
        assert!(values.iter().all_equal());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_raw_cache_remove() {
        let listener = Arc::new(Recorder::default());
        let cache = RawCache::new(RawCacheConfig {
            name: "test".to_string(),
            shards: 2,
            max_entries: None,
            comparer: NaturalComparer::with_hash_builder(ModHasher::default()),
            event_listener: Some(listener.clone() as Arc<dyn EventListener<Key = u64, Value = u64>>),
            metrics: Arc::new(Metrics::noop()),
        });

        cache.insert(1, 10).unwrap();
        cache.insert(1, 11).unwrap();
        assert_eq!(cache.try_remove(&1).unwrap(), Some(11));
        assert_eq!(cache.try_remove(&1).unwrap(), None);
        assert!(cache.is_empty());

        cache.insert(2, 20).unwrap();
        cache.insert(3, 30).unwrap();
        cache.clear();
        assert!(cache.is_empty());
        assert!(cache.keys().is_empty());

        let mut events = listener.events.lock().clone();
        events[2..].sort_by_key(|(_, key, _)| *key);
        assert_eq!(
            events,
            vec![
                (Event::Replace, 1, SlotState::Ready),
                (Event::Remove, 1, SlotState::Ready),
                (Event::Clear, 2, SlotState::Ready),
                (Event::Clear, 3, SlotState::Ready),
            ]
        );
    }

    #[test_log::test]
    fn test_raw_cache_remove_runs_never_evaluated_producer() {
        let cache = cache_for_test(4, None);
        let runs = Arc::new(AtomicU64::new(0));

        install_pending(&cache, 5, {
            let runs = runs.clone();
            move || {
                runs.fetch_add(1, Ordering::SeqCst);
                Ok(77)
            }
        });

        // Present but never evaluated: lookups that do not evaluate leave the producer alone.
        assert!(cache.contains(&5));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get_slot(&5).unwrap().state(), SlotState::Pending);
        assert_eq!(cache.keys(), vec![5]);
        assert_eq!(runs.load(Ordering::SeqCst), 0);

        // Nobody evaluated the slot, so removal runs the producer itself.
        assert_eq!(cache.try_remove(&5).unwrap(), Some(77));
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert!(!cache.contains(&5));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_raw_cache_slot_handle_records_produce() {
        let registry = ProduceCountingRegistry::default();
        let cache = cache_with_metrics(4, None, Metrics::new("test", &registry));

        assert_eq!(cache.get_or_insert(1, || Ok(10)).unwrap(), 10);
        assert_eq!(registry.produced.load(Ordering::Relaxed), 1);

        // A pending slot evaluated through a handle still reports to the cache that created it.
        install_pending(&cache, 2, || Ok(20));
        let slot = cache.get_slot(&2).unwrap();
        assert_eq!(registry.produced.load(Ordering::Relaxed), 1);
        assert_eq!(slot.evaluate().unwrap(), 20);
        assert_eq!(registry.produced.load(Ordering::Relaxed), 2);

        // Evaluated slots are not produced again, whichever path reads them.
        assert_eq!(cache.get_or_insert(2, || Ok(0)).unwrap(), 20);
        assert!(cache.values().iter().all(|slot| slot.evaluate().is_ok()));
        assert_eq!(registry.produced.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn test_raw_cache_max_entries() {
        let cache = cache_for_test(4, Some(2));

        assert!(cache.try_insert(1, 1).unwrap());
        cache.insert(2, 2).unwrap();

        // Overwriting a present key does not grow the cache.
        cache.insert(2, 3).unwrap();

        let e = cache.try_insert(3, 3).unwrap_err();
        assert_eq!(e.kind(), ErrorKind::NoSpace);
        let e = cache.insert(3, 3).unwrap_err();
        assert_eq!(e.kind(), ErrorKind::NoSpace);
        let e = cache.get_or_insert(3, || Ok(3)).unwrap_err();
        assert_eq!(e.kind(), ErrorKind::NoSpace);
        assert!(!cache.contains(&3));
        assert_eq!(cache.len(), 2);

        // Present keys are still served.
        assert_eq!(cache.get_or_insert(2, || Ok(0)).unwrap(), 3);

        cache.try_remove(&1).unwrap();
        assert!(cache.try_insert(3, 3).unwrap());
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_raw_cache_snapshots() {
        let cache = cache_for_test(4, None);
        for key in 0..8 {
            cache.insert(key, key * 10).unwrap();
        }

        assert_eq!(cache.keys().into_iter().sorted().collect_vec(), (0..8).collect_vec());
        assert_eq!(
            cache
                .values()
                .into_iter()
                .map(|slot| slot.evaluate().unwrap())
                .sorted()
                .collect_vec(),
            (0..8).map(|key| key * 10).collect_vec()
        );
        assert!(cache
            .entries()
            .into_iter()
            .all(|(key, slot)| slot.evaluate().unwrap() == key * 10));
        assert!(cache.get_slot(&8).is_none());
        assert_eq!(cache.get_slot(&7).unwrap().evaluate().unwrap(), 70);
    }

    mod fuzzy {
        use super::*;

        #[test_log::test]
        fn test_raw_cache_fuzzy() {
            let cache = cache_for_test(4, None);
            let produced = Arc::new(AtomicU64::new(0));

            let handles = (0..8)
                .map(|i| {
                    let cache = cache.clone();
                    let produced = produced.clone();
                    thread::spawn(move || {
                        let mut rng = SmallRng::seed_from_u64(i);
                        for _ in 0..10000 {
                            let key = rng.random_range(0..256u64);
                            let produced = produced.clone();
                            let value = cache
                                .get_or_insert(key, move || {
                                    produced.fetch_add(1, Ordering::Relaxed);
                                    Ok(key)
                                })
                                .unwrap();
                            assert_eq!(value, key);
                        }
                    })
                })
                .collect_vec();

            handles.into_iter().for_each(|handle| handle.join().unwrap());

            assert_eq!(cache.len(), 256);
            assert_eq!(produced.load(Ordering::Relaxed), 256);
        }
    }
}
