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
        Arc,
    },
    thread,
    time::Duration,
};

use oncecache::Cache;

fn main() {
    let cache: Cache<String, String> = Cache::new();
    let connects = Arc::new(AtomicUsize::new(0));

    let handles = (0..8)
        .map(|_| {
            let cache = cache.clone();
            let connects = connects.clone();
            thread::spawn(move || {
                cache
                    .get_or_insert_with_key("db.example.com".to_string(), move |host| {
                        connects.fetch_add(1, Ordering::SeqCst);
                        thread::sleep(Duration::from_millis(100));
                        format!("connection to {host}")
                    })
                    .unwrap()
            })
        })
        .collect::<Vec<_>>();

    for handle in handles {
        assert_eq!(handle.join().unwrap(), "connection to db.example.com");
    }
    assert_eq!(connects.load(Ordering::SeqCst), 1);

    cache.insert("cache.example.com".to_string(), "preset".to_string()).unwrap();
    assert!(!cache.try_insert("cache.example.com".to_string(), "ignored".to_string()).unwrap());
    assert_eq!(cache.get(&"cache.example.com".to_string()).unwrap(), "preset");

    // Absent keys read with `get` go through the default producer, `String::default` here.
    assert_eq!(cache.get(&"unknown".to_string()).unwrap(), "");

    assert_eq!(
        cache.try_remove(&"db.example.com".to_string()).unwrap(),
        Some("connection to db.example.com".to_string())
    );
    assert!(!cache.contains(&"db.example.com".to_string()));
}
