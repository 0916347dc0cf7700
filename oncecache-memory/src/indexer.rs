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

use hashbrown::hash_table::{Entry as HashTableEntry, HashTable};
use oncecache_common::error::Result;

use crate::{comparer::KeyComparer, record::Record};

/// The hash table of one shard.
///
/// Hashing and equality are delegated to the comparer passed to each call, so the table never requires `K: Hash`.
pub struct HashTableIndexer<K, V> {
    table: HashTable<Record<K, V>>,
}

impl<K, V> Default for HashTableIndexer<K, V> {
    fn default() -> Self {
        Self {
            table: HashTable::new(),
        }
    }
}

impl<K, V> HashTableIndexer<K, V> {
    pub fn get<C>(&self, hash: u64, key: &K, comparer: &C) -> Option<&Record<K, V>>
    where
        C: KeyComparer<K>,
    {
        self.table.find(hash, |r| comparer.eq_key(key, r.key()))
    }

    pub fn entry<'a, C>(&'a mut self, hash: u64, key: &K, comparer: &C) -> HashTableEntry<'a, Record<K, V>>
    where
        C: KeyComparer<K>,
    {
        self.table.entry(hash, |r| comparer.eq_key(key, r.key()), |r| r.hash())
    }

    /// Insert the record, returning the record it replaced.
    ///
    /// `admit` is called only if the key is absent, right before the table grows. Its error aborts the insertion.
    pub fn insert<C, F>(&mut self, mut record: Record<K, V>, comparer: &C, admit: F) -> Result<Option<Record<K, V>>>
    where
        C: KeyComparer<K>,
        F: FnOnce() -> Result<()>,
    {
        match self
            .table
            .entry(record.hash(), |r| comparer.eq_key(record.key(), r.key()), |r| r.hash())
        {
            HashTableEntry::Occupied(mut o) => {
                std::mem::swap(o.get_mut(), &mut record);
                Ok(Some(record))
            }
            HashTableEntry::Vacant(v) => {
                admit()?;
                v.insert(record);
                Ok(None)
            }
        }
    }

    pub fn remove<C>(&mut self, hash: u64, key: &K, comparer: &C) -> Option<Record<K, V>>
    where
        C: KeyComparer<K>,
    {
        match self.entry(hash, key, comparer) {
            HashTableEntry::Occupied(o) => {
                let (r, _) = o.remove();
                Some(r)
            }
            HashTableEntry::Vacant(_) => None,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Record<K, V>> {
        self.table.iter()
    }

    pub fn drain(&mut self) -> impl Iterator<Item = Record<K, V>> + '_ {
        self.table.drain()
    }
}
