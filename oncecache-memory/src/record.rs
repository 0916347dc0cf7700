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

use std::sync::Arc;

use crate::slot::Slot;

/// An entry of the backing map: the key, its cached hash and its canonical slot.
#[derive(Debug)]
pub struct Record<K, V> {
    hash: u64,
    key: K,
    slot: Arc<Slot<V>>,
}

impl<K, V> Record<K, V> {
    pub fn new(hash: u64, key: K, slot: Arc<Slot<V>>) -> Self {
        Self { hash, key, slot }
    }

    pub fn hash(&self) -> u64 {
        self.hash
    }

    pub fn key(&self) -> &K {
        &self.key
    }

    pub fn slot(&self) -> &Arc<Slot<V>> {
        &self.slot
    }

    pub fn into_parts(self) -> (K, Arc<Slot<V>>) {
        (self.key, self.slot)
    }
}
