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

use std::{collections::HashMap, sync::Arc};

use parking_lot::Mutex;
use prometheus::{Histogram, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, IntGaugeVec, Opts, Registry};

use crate::metrics::{
    BoxedCounter, BoxedCounterVec, BoxedGauge, BoxedGaugeVec, BoxedHistogram, BoxedHistogramVec, Boxer, CounterOps,
    CounterVecOps, GaugeOps, GaugeVecOps, HistogramOps, HistogramVecOps, RegistryOps,
};

#[derive(Debug, Clone)]
enum MetricVec {
    Counter(IntCounterVec),
    Gauge(IntGaugeVec),
    Histogram(HistogramVec),
}

impl CounterOps for IntCounter {
    fn increase(&self, val: u64) {
        self.inc_by(val);
    }
}

impl CounterVecOps for IntCounterVec {
    fn counter(&self, labels: &[&str]) -> BoxedCounter {
        self.with_label_values(labels).boxed()
    }
}

impl GaugeOps for IntGauge {
    fn increase(&self, val: u64) {
        self.add(val as _);
    }

    fn decrease(&self, val: u64) {
        self.sub(val as _);
    }

    fn absolute(&self, val: u64) {
        self.set(val as _);
    }
}

impl GaugeVecOps for IntGaugeVec {
    fn gauge(&self, labels: &[&str]) -> BoxedGauge {
        self.with_label_values(labels).boxed()
    }
}

impl HistogramOps for Histogram {
    fn record(&self, val: f64) {
        self.observe(val);
    }
}

impl HistogramVecOps for HistogramVec {
    fn histogram(&self, labels: &[&str]) -> BoxedHistogram {
        self.with_label_values(labels).boxed()
    }
}

/// Prometheus metric registry with lib `prometheus`.
///
/// The [`PrometheusMetricsRegistry`] can be cloned and shared by multiple caches. Each metric vector is registered
/// to the underlying [`Registry`] only once; later registrations with the same name reuse it.
#[derive(Debug, Clone)]
pub struct PrometheusMetricsRegistry {
    registry: Registry,
    vecs: Arc<Mutex<HashMap<&'static str, MetricVec>>>,
}

impl PrometheusMetricsRegistry {
    /// Create an Prometheus metrics registry.
    pub fn new(registry: Registry) -> Self {
        Self {
            registry,
            vecs: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// The underlying registry.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    fn get_or_register(&self, name: &'static str, create: impl FnOnce() -> MetricVec) -> MetricVec {
        let mut vecs = self.vecs.lock();
        vecs.entry(name)
            .or_insert_with(|| {
                let vec = create();
                let res = match &vec {
                    MetricVec::Counter(v) => self.registry.register(Box::new(v.clone())),
                    MetricVec::Gauge(v) => self.registry.register(Box::new(v.clone())),
                    MetricVec::Histogram(v) => self.registry.register(Box::new(v.clone())),
                };
                res.unwrap_or_else(|e| panic!("failed to register metric vector {name}: {e}"));
                vec
            })
            .clone()
    }
}

impl RegistryOps for PrometheusMetricsRegistry {
    fn register_counter_vec(
        &self,
        name: &'static str,
        desc: &'static str,
        label_names: &'static [&'static str],
    ) -> BoxedCounterVec {
        let vec = self.get_or_register(name, || {
            MetricVec::Counter(IntCounterVec::new(Opts::new(name, desc), label_names).unwrap())
        });
        match vec {
            MetricVec::Counter(v) => v.boxed(),
            _ => panic!("metric {name} has been registered with another type"),
        }
    }

    fn register_gauge_vec(
        &self,
        name: &'static str,
        desc: &'static str,
        label_names: &'static [&'static str],
    ) -> BoxedGaugeVec {
        let vec = self.get_or_register(name, || {
            MetricVec::Gauge(IntGaugeVec::new(Opts::new(name, desc), label_names).unwrap())
        });
        match vec {
            MetricVec::Gauge(v) => v.boxed(),
            _ => panic!("metric {name} has been registered with another type"),
        }
    }

    fn register_histogram_vec(
        &self,
        name: &'static str,
        desc: &'static str,
        label_names: &'static [&'static str],
    ) -> BoxedHistogramVec {
        let vec = self.get_or_register(name, || {
            MetricVec::Histogram(HistogramVec::new(HistogramOpts::new(name, desc), label_names).unwrap())
        });
        match vec {
            MetricVec::Histogram(v) => v.boxed(),
            _ => panic!("metric {name} has been registered with another type"),
        }
    }
}
