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

use oncecache::{Cache, CacheBuilder, PrometheusMetricsRegistry};
use prometheus::{Encoder, Registry, TextEncoder};

fn main() -> anyhow::Result<()> {
    let registry = Registry::new();
    let metrics = PrometheusMetricsRegistry::new(registry.clone());

    // Caches sharing a registry are told apart by the `name` label.
    let users: Cache<u64, String> = CacheBuilder::new()
        .with_name("users")
        .with_metrics_registry(Box::new(metrics.clone()))
        .build()?;
    let sessions: Cache<u64, u64> = CacheBuilder::new()
        .with_name("sessions")
        .with_metrics_registry(Box::new(metrics))
        .build()?;

    for id in 0..16 {
        users.get_or_insert_with(id % 4, move || format!("user-{id}"))?;
        sessions.insert(id, id * 100)?;
    }
    sessions.try_remove(&0)?;

    let mut buffer = vec![];
    TextEncoder::new().encode(&registry.gather(), &mut buffer)?;
    println!("{}", String::from_utf8(buffer)?);

    Ok(())
}
