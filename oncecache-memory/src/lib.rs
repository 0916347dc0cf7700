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

//! In-memory at-most-once cache for oncecache.
//!
//! The cache maps each key to a [`Slot`]. A slot is either ready with a value, or pending with a producer that runs on
//! the first evaluation. Racing callers agree on one slot per key, so each producer runs at most once and every caller
//! observes the same outcome.

mod cache;
mod comparer;
mod indexer;
mod listener;
mod raw;
mod record;
mod slot;

mod prelude;
pub use prelude::*;
