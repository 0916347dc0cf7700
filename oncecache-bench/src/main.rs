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

//! A load generator for oncecache.
//!
//! Worker threads hammer a shared cache with `get_or_insert_with` on keys drawn from a uniform or zipf distribution.
//! Each producer sleeps for the simulated latency and counts itself, so the run can check that no key was ever produced
//! twice.

mod workload;

use std::{
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc, Barrier,
    },
    thread,
    time::{Duration, Instant},
};

use anyhow::Context;
use clap::Parser;
use hdrhistogram::Histogram;
use itertools::Itertools;
use oncecache::{Cache, CacheBuilder, PrometheusMetricsRegistry};
use prometheus::{Encoder, Registry, TextEncoder};
use workload::{Distribution, KeyGenerator};

#[cfg(all(feature = "jemalloc", not(target_env = "msvc")))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about)]
pub struct Args {
    /// Worker thread count.
    #[arg(short, long, default_value_t = 16)]
    threads: usize,

    /// Keys are drawn from `[0, key_range)`.
    #[arg(long, default_value_t = 100_000)]
    key_range: u64,

    /// Key distribution.
    #[arg(long, value_enum, default_value_t = Distribution::Uniform)]
    distribution: Distribution,

    /// For `--distribution zipf` only.
    #[arg(long, default_value_t = 1.0)]
    zipf_s: f64,

    /// Simulated producer latency.
    #[arg(long, value_parser = humantime::parse_duration, default_value = "100us")]
    producer_latency: Duration,

    /// Benchmark duration.
    #[arg(long, value_parser = humantime::parse_duration, default_value = "10s")]
    time: Duration,

    /// Cache shard count.
    #[arg(long, default_value_t = 64)]
    shards: usize,

    /// Entry ceiling of the cache. Unbounded if not set.
    #[arg(long)]
    max_entries: Option<usize>,

    /// Dump the prometheus metrics of the cache after the run.
    #[arg(long, default_value_t = false)]
    metrics: bool,
}

struct Stats {
    ops: u64,
    errors: u64,
    latency: Histogram<u64>,
}

fn init_logger() {
    use tracing_subscriber::{prelude::*, EnvFilter};

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_line_number(true))
        .with(EnvFilter::from_default_env())
        .init();
}

fn work(
    mut generator: KeyGenerator,
    cache: &Cache<u64, u64>,
    args: &Args,
    invocations: &Arc<AtomicU64>,
    barrier: &Barrier,
    stop: &AtomicBool,
) -> anyhow::Result<Stats> {
    let mut stats = Stats {
        ops: 0,
        errors: 0,
        latency: Histogram::new(3)?,
    };

    barrier.wait();

    while !stop.load(Ordering::Relaxed) {
        let key = generator.next_key();
        let invocations = invocations.clone();
        let producer_latency = args.producer_latency;

        let start = Instant::now();
        let res = cache.get_or_insert_with(key, move || {
            invocations.fetch_add(1, Ordering::Relaxed);
            if !producer_latency.is_zero() {
                thread::sleep(producer_latency);
            }
            key
        });
        stats.latency.saturating_record(start.elapsed().as_micros() as u64);
        stats.ops += 1;

        match res {
            Ok(value) => anyhow::ensure!(value == key, "key {key} resolved to value {value}"),
            Err(e) => {
                stats.errors += 1;
                tracing::debug!("[bench]: get or insert key {key} failed: {e}");
            }
        }
    }

    Ok(stats)
}

fn main() -> anyhow::Result<()> {
    init_logger();

    #[cfg(feature = "deadlock")]
    {
        std::thread::spawn(move || loop {
            std::thread::sleep(Duration::from_secs(1));
            let deadlocks = parking_lot::deadlock::check_deadlock();
            if deadlocks.is_empty() {
                continue;
            }

            println!("{} deadlocks detected", deadlocks.len());
            for (i, threads) in deadlocks.iter().enumerate() {
                println!("Deadlock #{}", i);
                for t in threads {
                    println!("Thread Id {:#?}", t.thread_id());
                    println!("{:#?}", t.backtrace());
                }
            }
        });
    }

    let args = Args::parse();
    anyhow::ensure!(args.threads > 0, "thread count must be greater than 0");

    println!("{args:#?}");

    let registry = Registry::new();
    let mut builder = CacheBuilder::<u64, u64>::new()
        .with_name("bench")
        .with_shards(args.shards)
        .with_metrics_registry(Box::new(PrometheusMetricsRegistry::new(registry.clone())));
    if let Some(max_entries) = args.max_entries {
        builder = builder.with_max_entries(max_entries);
    }
    let cache = builder.build()?;

    let generators = (0..args.threads)
        .map(|i| KeyGenerator::new(args.distribution, args.key_range, args.zipf_s, i as u64))
        .collect::<Result<Vec<_>, _>>()?;

    let invocations = Arc::new(AtomicU64::new(0));
    let barrier = Barrier::new(args.threads + 1);
    let stop = AtomicBool::new(false);

    let (elapsed, stats) = thread::scope(|s| -> anyhow::Result<_> {
        let handles = generators
            .into_iter()
            .map(|generator| s.spawn(|| work(generator, &cache, &args, &invocations, &barrier, &stop)))
            .collect_vec();

        barrier.wait();
        let start = Instant::now();
        thread::sleep(args.time);
        stop.store(true, Ordering::Relaxed);

        let stats = handles
            .into_iter()
            .map(|handle| {
                handle
                    .join()
                    .map_err(|_| anyhow::anyhow!("worker thread panicked"))
                    .and_then(|res| res)
            })
            .collect::<anyhow::Result<Vec<_>>>()?;
        Ok((start.elapsed(), stats))
    })?;

    let mut latency = Histogram::<u64>::new(3)?;
    for s in stats.iter() {
        latency.add(&s.latency).context("merge latency histogram")?;
    }
    let ops = stats.iter().map(|s| s.ops).sum::<u64>();
    let errors = stats.iter().map(|s| s.errors).sum::<u64>();
    let invocations = invocations.load(Ordering::Relaxed);

    println!();
    println!("elapsed: {:?}", elapsed);
    println!("ops: {ops}, errors: {errors}");
    println!("throughput: {:.2} ops/s", ops as f64 / elapsed.as_secs_f64());
    println!(
        "latency (us): p50 {}, p90 {}, p99 {}, p999 {}, max {}",
        latency.value_at_quantile(0.5),
        latency.value_at_quantile(0.9),
        latency.value_at_quantile(0.99),
        latency.value_at_quantile(0.999),
        latency.max(),
    );
    println!("producer invocations: {invocations}, distinct keys: {}", cache.len());

    if args.metrics {
        let mut buffer = vec![];
        TextEncoder::new().encode(&registry.gather(), &mut buffer)?;
        println!();
        println!("{}", String::from_utf8(buffer)?);
    }

    anyhow::ensure!(
        invocations == cache.len() as u64,
        "{invocations} producer invocations for {} distinct keys",
        cache.len()
    );

    Ok(())
}
