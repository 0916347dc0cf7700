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

//! Shared components and utils for oncecache.

/// Allow enable debug assertions in release profile with feature "strict_assertion".
pub mod assert;
/// Traits for key and value types of the cache.
pub mod code;
/// Error type for oncecache.
pub mod error;
/// Reasons for a slot leaving the cache.
pub mod event;
/// Metrics ops and registries.
pub mod metrics;
/// Scoped functional programming extensions.
pub mod scope;
#[cfg(any(test, feature = "test_utils"))]
pub mod test_utils;
