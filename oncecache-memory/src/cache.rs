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

use std::{fmt::Debug, hash::Hash, sync::Arc};

use oncecache_common::{
    code::{HashBuilder, Key, Value},
    error::{Error, Result},
    metrics::{model::Metrics, registry::noop::NoopMetricsRegistry, BoxedRegistry},
};

use crate::{
    comparer::{KeyComparer, NaturalComparer},
    listener::EventListener,
    raw::{RawCache, RawCacheConfig},
    slot::Slot,
};

/// The producer used by [`Cache::get`] for absent keys.
pub type DefaultProducer<K, V> = Arc<dyn Fn(&K) -> V + Send + Sync + 'static>;

const DEFAULT_SHARDS: usize = 64;

/// Builder of [`Cache`].
pub struct CacheBuilder<K, V, C = NaturalComparer> {
    name: String,
    shards: usize,
    max_entries: Option<usize>,
    comparer: C,
    default_producer: DefaultProducer<K, V>,
    event_listener: Option<Arc<dyn EventListener<Key = K, Value = V>>>,
    registry: BoxedRegistry,
}

impl<K, V> Default for CacheBuilder<K, V, NaturalComparer>
where
    K: Key,
    V: Value + Default,
{
    fn default() -> Self {
        Self::with_producer(|_| V::default())
    }
}

impl<K, V> CacheBuilder<K, V, NaturalComparer>
where
    K: Key,
    V: Value + Default,
{
    /// Create a cache builder whose default producer returns `V::default()`.
    pub fn new() -> Self {
        Self::default()
    }
}

impl<K, V> CacheBuilder<K, V, NaturalComparer>
where
    K: Key,
    V: Value,
{
    /// Create a cache builder with the given default producer.
    pub fn with_producer(default_producer: impl Fn(&K) -> V + Send + Sync + 'static) -> Self {
        Self {
            name: "oncecache".to_string(),
            shards: DEFAULT_SHARDS,
            max_entries: None,
            comparer: NaturalComparer::default(),
            default_producer: Arc::new(default_producer),
            event_listener: None,
            registry: Box::new(NoopMetricsRegistry),
        }
    }
}

impl<K, V, C> CacheBuilder<K, V, C> {
    /// Set the name of the cache. The name is used as the `name` label of the metrics and in logs.
    ///
    /// The default value is `oncecache`.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set cache sharding count. Keys are distributed to shards based on their hash. Operations on different shards
    /// never contend on the same lock.
    ///
    /// The default value is 64.
    pub fn with_shards(mut self, shards: usize) -> Self {
        self.shards = shards;
        self
    }

    /// Set the entry ceiling. Inserting a new key while the ceiling is reached fails with a `NoSpace` error.
    ///
    /// The cache is unbounded by default.
    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = Some(max_entries);
        self
    }

    /// Set the key equality policy.
    pub fn with_comparer<OC>(self, comparer: OC) -> CacheBuilder<K, V, OC> {
        CacheBuilder {
            name: self.name,
            shards: self.shards,
            max_entries: self.max_entries,
            comparer,
            default_producer: self.default_producer,
            event_listener: self.event_listener,
            registry: self.registry,
        }
    }

    /// Use the natural key equality with the given hash builder.
    pub fn with_hash_builder<S>(self, hash_builder: S) -> CacheBuilder<K, V, NaturalComparer<S>>
    where
        S: HashBuilder,
    {
        self.with_comparer(NaturalComparer::with_hash_builder(hash_builder))
    }

    /// Set the producer used by [`Cache::get`] for absent keys.
    pub fn with_default_producer(mut self, default_producer: impl Fn(&K) -> V + Send + Sync + 'static) -> Self {
        self.default_producer = Arc::new(default_producer);
        self
    }

    /// Set the event listener.
    pub fn with_event_listener(mut self, event_listener: Arc<dyn EventListener<Key = K, Value = V>>) -> Self {
        self.event_listener = Some(event_listener);
        self
    }

    /// Set the metrics registry.
    ///
    /// The default value is a noop registry.
    pub fn with_metrics_registry(mut self, registry: BoxedRegistry) -> Self {
        self.registry = registry;
        self
    }
}

impl<K, V, C> CacheBuilder<K, V, C>
where
    K: Key,
    V: Value,
    C: KeyComparer<K>,
{
    /// Build the cache with the given configuration.
    pub fn build(self) -> Result<Cache<K, V, C>> {
        if self.shards == 0 {
            return Err(Error::config("shards must be greater than 0").with_context("name", &self.name));
        }
        if self.max_entries == Some(0) {
            return Err(Error::config("max entries must be greater than 0").with_context("name", &self.name));
        }
        Ok(self.build_unchecked())
    }

    fn build_unchecked(self) -> Cache<K, V, C> {
        let metrics = Arc::new(Metrics::new(&self.name, self.registry.as_ref()));
        let raw = RawCache::new(RawCacheConfig {
            name: self.name,
            shards: self.shards,
            max_entries: self.max_entries,
            comparer: self.comparer,
            event_listener: self.event_listener,
            metrics,
        });
        Cache {
            raw,
            default_producer: self.default_producer,
        }
    }
}

/// A concurrent map from keys to lazily evaluated values that runs at most one producer per key.
///
/// Each key maps to a [`Slot`]. Racing callers of the `get_or_insert*` family on an absent key agree on a single
/// slot, and only the producer of that slot runs. Callers block while it runs, then all of them observe its outcome.
/// Failed or panicked producers leave the slot faulted, and the failure is returned until the key is removed or
/// overwritten.
///
/// A producer must not evaluate the key it is producing, or it deadlocks.
///
/// ```rust
/// use oncecache_memory::Cache;
///
/// let cache: Cache<u64, String> = Cache::new();
///
/// assert_eq!(cache.get_or_insert_with(1, || "one".to_string()).unwrap(), "one");
/// // The key is present, the producer is never called.
/// assert_eq!(cache.get_or_insert_with(1, || unreachable!()).unwrap(), "one");
/// // The default producer of `Cache::new` returns `V::default()`.
/// assert_eq!(cache.get(&2).unwrap(), "");
/// ```
pub struct Cache<K, V, C = NaturalComparer> {
    raw: RawCache<K, V, C>,
    default_producer: DefaultProducer<K, V>,
}

impl<K, V, C> Clone for Cache<K, V, C> {
    fn clone(&self) -> Self {
        Self {
            raw: self.raw.clone(),
            default_producer: self.default_producer.clone(),
        }
    }
}

impl<K, V, C> Debug for Cache<K, V, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cache").field("raw", &self.raw).finish()
    }
}

impl<K, V> Default for Cache<K, V, NaturalComparer>
where
    K: Key + Hash + Eq,
    V: Value + Default,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> Cache<K, V, NaturalComparer>
where
    K: Key + Hash + Eq,
    V: Value + Default,
{
    /// Create a cache with natural key equality. Absent keys read by [`Cache::get`] get `V::default()`.
    pub fn new() -> Self {
        CacheBuilder::new().build_unchecked()
    }
}

impl<K, V> Cache<K, V, NaturalComparer>
where
    K: Key + Hash + Eq,
    V: Value,
{
    /// Create a cache with natural key equality and the given default producer.
    pub fn with_default_producer(default_producer: impl Fn(&K) -> V + Send + Sync + 'static) -> Self {
        CacheBuilder::with_producer(default_producer).build_unchecked()
    }
}

impl<K, V, C> Cache<K, V, C>
where
    K: Key,
    V: Value,
    C: KeyComparer<K>,
{
    /// Create a cache with the given key equality policy. Absent keys read by [`Cache::get`] get `V::default()`.
    pub fn with_comparer(comparer: C) -> Self
    where
        V: Default,
    {
        CacheBuilder::new().with_comparer(comparer).build_unchecked()
    }

    /// Create a cache with the given key equality policy and default producer.
    pub fn with_comparer_and_default_producer(
        comparer: C,
        default_producer: impl Fn(&K) -> V + Send + Sync + 'static,
    ) -> Self {
        CacheBuilder::with_producer(default_producer)
            .with_comparer(comparer)
            .build_unchecked()
    }

    /// Insert the value only if the key is absent.
    ///
    /// Returns `true` if the value was inserted, `false` if the key was already present. A present key is left
    /// untouched.
    pub fn try_insert(&self, key: K, value: V) -> Result<bool> {
        self.raw.try_insert(key, value)
    }

    /// Insert the value, overwriting the slot of the key if any.
    ///
    /// Callers already evaluating the overwritten slot still observe its outcome.
    pub fn insert(&self, key: K, value: V) -> Result<()> {
        self.raw.insert(key, value)
    }

    /// Remove the key and return its value.
    ///
    /// A slot that has never been evaluated runs its producer before being returned. A faulted slot returns its
    /// failure, the key is removed all the same.
    pub fn try_remove(&self, key: &K) -> Result<Option<V>> {
        self.raw.try_remove(key)
    }

    /// Get the value of the key, or produce it with `f` if absent.
    pub fn get_or_insert_with<F>(&self, key: K, f: F) -> Result<V>
    where
        F: FnOnce() -> V + Send + 'static,
    {
        self.raw.get_or_insert(key, move || Ok(f()))
    }

    /// Get the value of the key, or produce it with `f` from the key if absent.
    pub fn get_or_insert_with_key<F>(&self, key: K, f: F) -> Result<V>
    where
        F: FnOnce(&K) -> V + Send + 'static,
    {
        let k = key.clone();
        self.raw.get_or_insert(key, move || Ok(f(&k)))
    }

    /// Get the value of the key, or produce it with the fallible `f` if absent.
    ///
    /// An error returned by `f` faults the slot as an `External` error carrying it as the source.
    pub fn try_get_or_insert_with<F, E>(&self, key: K, f: F) -> Result<V>
    where
        F: FnOnce() -> std::result::Result<V, E> + Send + 'static,
        E: Into<anyhow::Error>,
    {
        self.raw.get_or_insert(key, move || f().map_err(Error::external))
    }

    /// Get the value of the key, or produce it with the default producer if absent.
    pub fn get(&self, key: &K) -> Result<V> {
        let producer = self.default_producer.clone();
        let k = key.clone();
        self.raw.get_or_insert(key.clone(), move || Ok(producer(&k)))
    }

    /// Check if the key is present. Never evaluates.
    pub fn contains(&self, key: &K) -> bool {
        self.raw.contains(key)
    }

    /// Get the slot of the key without evaluating it.
    pub fn slot(&self, key: &K) -> Option<Arc<Slot<V>>> {
        self.raw.get_slot(key)
    }

    /// Snapshot of the present keys.
    ///
    /// The snapshot is weakly consistent with concurrent mutations.
    pub fn keys(&self) -> Vec<K> {
        self.raw.keys()
    }

    /// Snapshot of the present slots. Pending slots are returned unevaluated.
    pub fn values(&self) -> Vec<Arc<Slot<V>>> {
        self.raw.values()
    }

    /// Snapshot of the present keys with their slots.
    pub fn entries(&self) -> Vec<(K, Arc<Slot<V>>)> {
        self.raw.entries()
    }

    /// Remove all keys. Pending slots are dropped without running their producers.
    pub fn clear(&self) {
        self.raw.clear()
    }

    /// Get the count of present keys.
    pub fn len(&self) -> usize {
        self.raw.len()
    }

    /// Check if no key is present.
    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    /// Get the name of the cache.
    pub fn name(&self) -> &str {
        self.raw.name()
    }

    /// Get the shard count of the cache.
    pub fn shards(&self) -> usize {
        self.raw.shards()
    }

    /// Get the entry ceiling of the cache.
    pub fn max_entries(&self) -> Option<usize> {
        self.raw.max_entries()
    }

    /// Get the metrics of the cache.
    pub fn metrics(&self) -> &Metrics {
        self.raw.metrics()
    }
}
