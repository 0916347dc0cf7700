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

use super::{BoxedCounter, BoxedGauge, BoxedHistogram, RegistryOps};

/// Metrics of one cache instance.
///
/// All series carry a `name` label so that several caches can share a registry.
#[derive(Debug)]
pub struct Metrics {
    /// Slots installed by `try_insert` or by a winning candidate.
    pub insert: BoxedCounter,
    /// Slots overwritten by an unconditional insertion.
    pub replace: BoxedCounter,
    /// Lookups that found an existing slot.
    pub hit: BoxedCounter,
    /// Lookups that installed a new candidate slot.
    pub miss: BoxedCounter,
    /// Keys detached by `try_remove`.
    pub remove: BoxedCounter,
    /// Candidate slots dropped unevaluated after losing an insertion race.
    pub discard: BoxedCounter,
    /// Producer invocations.
    pub produce: BoxedCounter,
    /// Producer invocations that failed or panicked.
    pub fault: BoxedCounter,

    /// Current entry count.
    pub entries: BoxedGauge,

    /// Producer execution duration in seconds.
    pub produce_duration: BoxedHistogram,
}

impl Metrics {
    /// Create a new metric with the given name.
    pub fn new(name: &str, registry: &dyn RegistryOps) -> Self {
        let op_total = registry.register_counter_vec("oncecache_op_total", "oncecache operations", &["name", "op"]);
        let entries = registry.register_gauge_vec("oncecache_entries", "oncecache entry count", &["name"]);
        let produce_duration = registry.register_histogram_vec(
            "oncecache_produce_duration",
            "oncecache producer durations",
            &["name"],
        );

        Self {
            insert: op_total.counter(&[name, "insert"]),
            replace: op_total.counter(&[name, "replace"]),
            hit: op_total.counter(&[name, "hit"]),
            miss: op_total.counter(&[name, "miss"]),
            remove: op_total.counter(&[name, "remove"]),
            discard: op_total.counter(&[name, "discard"]),
            produce: op_total.counter(&[name, "produce"]),
            fault: op_total.counter(&[name, "fault"]),
            entries: entries.gauge(&[name]),
            produce_duration: produce_duration.histogram(&[name]),
        }
    }

    /// Build noop metrics.
    pub fn noop() -> Self {
        use super::registry::noop::NoopMetricsRegistry;

        Self::new("noop", &NoopMetricsRegistry)
    }
}
