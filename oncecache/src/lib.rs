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

//! oncecache is a concurrent key-value cache that runs the producer of each key at most once.
//!
//! Callers racing on an absent key agree on a single lazily evaluated slot. Only its producer runs, and every caller
//! observes the same value or the same failure.
//!
//! ```rust
//! use oncecache::{Cache, CacheBuilder};
//!
//! let cache: Cache<String, usize> = CacheBuilder::new().with_name("lengths").with_shards(16).build().unwrap();
//!
//! let len = cache.get_or_insert_with_key("hello".to_string(), |k| k.len()).unwrap();
//! assert_eq!(len, 5);
//! assert!(cache.contains(&"hello".to_string()));
//! assert_eq!(cache.try_remove(&"hello".to_string()).unwrap(), Some(5));
//! ```

/// Common components.
pub mod common {
    pub use oncecache_common::*;
}

/// In-memory cache.
pub mod memory {
    pub use oncecache_memory::*;
}

mod prelude;
pub use prelude::*;
