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

use oncecache::{Cache, FnComparer};

fn main() {
    // FNV-1a over the lowercased bytes.
    let hash = |s: &String| {
        s.bytes()
            .fold(0xcbf29ce484222325u64, |h, b| (h ^ b.to_ascii_lowercase() as u64).wrapping_mul(0x100000001b3))
    };
    let comparer = FnComparer::new(hash, |a: &String, b: &String| a.eq_ignore_ascii_case(b));
    let cache = Cache::with_comparer_and_default_producer(comparer, |key: &String| key.to_ascii_uppercase());

    assert_eq!(cache.get(&"Hello".to_string()).unwrap(), "HELLO");
    assert!(cache.contains(&"hello".to_string()));
    assert!(cache.contains(&"HELLO".to_string()));

    // The first spelling is the one kept.
    assert_eq!(cache.keys(), vec!["Hello".to_string()]);
}
