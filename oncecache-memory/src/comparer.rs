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

use std::hash::Hash;

use oncecache_common::code::{DefaultHasher, HashBuilder};

/// Key equality policy of the cache.
///
/// Two keys that compare equal must produce the same hash.
pub trait KeyComparer<K>: Send + Sync + 'static {
    /// Hash the key.
    fn hash_key(&self, key: &K) -> u64;

    /// Check if two keys are equal.
    fn eq_key(&self, a: &K, b: &K) -> bool;
}

/// Compare keys with their natural [`Hash`] and [`Eq`] implementations.
#[derive(Debug, Clone, Default)]
pub struct NaturalComparer<S = DefaultHasher> {
    hash_builder: S,
}

impl<S> NaturalComparer<S> {
    /// Create a natural comparer with the given hash builder.
    pub fn with_hash_builder(hash_builder: S) -> Self {
        Self { hash_builder }
    }
}

impl<K, S> KeyComparer<K> for NaturalComparer<S>
where
    K: Hash + Eq,
    S: HashBuilder,
{
    fn hash_key(&self, key: &K) -> u64 {
        self.hash_builder.hash_one(key)
    }

    fn eq_key(&self, a: &K, b: &K) -> bool {
        a == b
    }
}

/// Build a comparer from a pair of closures.
///
/// ```rust
/// # use oncecache_memory::{FnComparer, KeyComparer};
/// let ci = FnComparer::new(
///     |k: &String| k.to_ascii_lowercase().bytes().fold(0u64, |h, b| h.wrapping_mul(31).wrapping_add(b as u64)),
///     |a: &String, b: &String| a.eq_ignore_ascii_case(b),
/// );
/// assert!(ci.eq_key(&"Hello".to_string(), &"hELLO".to_string()));
/// ```
pub struct FnComparer<H, E> {
    hash: H,
    eq: E,
}

impl<H, E> FnComparer<H, E> {
    /// Create a comparer with the hash and the equality function.
    pub fn new(hash: H, eq: E) -> Self {
        Self { hash, eq }
    }
}

impl<K, H, E> KeyComparer<K> for FnComparer<H, E>
where
    H: Fn(&K) -> u64 + Send + Sync + 'static,
    E: Fn(&K, &K) -> bool + Send + Sync + 'static,
{
    fn hash_key(&self, key: &K) -> u64 {
        (self.hash)(key)
    }

    fn eq_key(&self, a: &K, b: &K) -> bool {
        (self.eq)(a, b)
    }
}
