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

use std::hash::BuildHasher;

/// Key trait for the cache.
///
/// Hashing and equality are not part of the bound. They are provided by the key comparer the cache is built with,
/// which defaults to the natural [`Hash`](std::hash::Hash) + [`Eq`] of the key.
pub trait Key: Send + Sync + 'static + Clone {}
impl<T> Key for T where T: Send + Sync + 'static + Clone {}

/// Value trait for the cache.
///
/// Values are handed out by clone. Wrap expensive values in [`Arc`](std::sync::Arc).
pub trait Value: Send + Sync + 'static + Clone {}
impl<T> Value for T where T: Send + Sync + 'static + Clone {}

/// Hash builder trait.
pub trait HashBuilder: BuildHasher + Send + Sync + 'static {}
impl<T> HashBuilder for T where T: BuildHasher + Send + Sync + 'static {}

/// The default hash builder for oncecache.
pub type DefaultHasher = ahash::RandomState;
