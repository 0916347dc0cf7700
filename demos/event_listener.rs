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

use oncecache::{CacheBuilder, Event, EventListener, Slot};

struct EchoEventListener;

impl EventListener for EchoEventListener {
    type Key = u64;
    type Value = String;

    fn on_leave(&self, reason: Event, key: &Self::Key, slot: &Slot<Self::Value>) {
        println!("Slot [key = {key}] [state = {:?}] left the cache with reason {reason:?}.", slot.state())
    }
}

/// Output:
///
/// ```plain
/// Slot [key = 1] [state = Ready] left the cache with reason Replace.
/// Slot [key = 1] [state = Ready] left the cache with reason Remove.
/// Slot [key = 2] [state = Ready] left the cache with reason Clear.
/// ```
fn main() {
    let cache = CacheBuilder::<u64, String>::new()
        .with_event_listener(Arc::new(EchoEventListener))
        .with_shards(1)
        .build()
        .unwrap();

    cache.insert(1, "First".to_string()).unwrap();
    cache.insert(1, "Second".to_string()).unwrap();
    cache.try_remove(&1).unwrap();
    cache.get_or_insert_with(2, || "Third".to_string()).unwrap();
    cache.clear();
}
