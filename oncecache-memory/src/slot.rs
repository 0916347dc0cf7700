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
    fmt::Debug,
    panic::{catch_unwind, AssertUnwindSafe},
    sync::{Arc, LazyLock, OnceLock},
    time::Instant,
};

use oncecache_common::{
    code::Value,
    error::{Error, ErrorKind, Result},
    metrics::model::Metrics,
    strict_assert,
};
use parking_lot::Mutex;

static NOOP: LazyLock<Arc<Metrics>> = LazyLock::new(|| Arc::new(Metrics::noop()));

/// A boxed producer waiting inside a pending [`Slot`].
pub type Producer<V> = Box<dyn FnOnce() -> Result<V> + Send + 'static>;

/// Observable state of a [`Slot`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SlotState {
    /// The producer has not finished yet. It may be running right now.
    Pending,
    /// The producer finished with a value, or the slot was created with one.
    Ready,
    /// The producer failed or panicked. The failure is returned to every evaluator.
    Faulted,
}

/// Per-key deferred-initialization cell.
///
/// A slot is created either [`Slot::ready`] with a value or [`Slot::pending`] with a producer. Creating a pending
/// slot never runs the producer. The first call to [`Slot::evaluate`] runs it; concurrent evaluators block until it
/// returns and then observe the same outcome. The outcome is assigned once and never changes, failures included.
pub struct Slot<V> {
    /// Published outcome. Set exactly once, while `producer` is locked.
    outcome: OnceLock<Result<V>>,
    /// The producer of a pending slot. The lock is held for the whole producer execution.
    producer: Mutex<Option<Producer<V>>>,
    /// Metrics of the cache that created the slot. Producer runs are recorded here whoever evaluates the slot.
    metrics: Arc<Metrics>,
}

impl<V> Debug for Slot<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Slot").field("state", &self.state()).finish()
    }
}

impl<V> Slot<V> {
    /// Create a slot that is already evaluated.
    pub fn ready(value: V) -> Self {
        Self {
            outcome: OnceLock::from(Ok(value)),
            producer: Mutex::new(None),
            metrics: NOOP.clone(),
        }
    }

    /// Create a slot with a producer that has not run yet.
    pub fn pending<F>(producer: F) -> Self
    where
        F: FnOnce() -> Result<V> + Send + 'static,
    {
        Self::pending_with_metrics(producer, NOOP.clone())
    }

    pub(crate) fn pending_with_metrics<F>(producer: F, metrics: Arc<Metrics>) -> Self
    where
        F: FnOnce() -> Result<V> + Send + 'static,
    {
        Self {
            outcome: OnceLock::new(),
            producer: Mutex::new(Some(Box::new(producer))),
            metrics,
        }
    }

    /// Get the state of the slot without evaluating it.
    pub fn state(&self) -> SlotState {
        match self.outcome.get() {
            None => SlotState::Pending,
            Some(Ok(_)) => SlotState::Ready,
            Some(Err(_)) => SlotState::Faulted,
        }
    }

    /// Check if the slot has left the pending state.
    pub fn is_evaluated(&self) -> bool {
        self.outcome.get().is_some()
    }
}

impl<V> Slot<V>
where
    V: Value,
{
    /// Get the outcome if the slot has been evaluated. Never runs the producer.
    pub fn peek(&self) -> Option<Result<V>> {
        self.outcome.get().cloned()
    }

    /// Evaluate the slot.
    ///
    /// Runs the producer if nobody has run it yet, otherwise returns the published outcome. Blocks while another
    /// thread is running the producer of this slot.
    pub fn evaluate(&self) -> Result<V> {
        if let Some(outcome) = self.outcome.get() {
            return outcome.clone();
        }

        let mut producer = self.producer.lock();
        // Another evaluator may have finished while we were waiting for the lock.
        if let Some(outcome) = self.outcome.get() {
            return outcome.clone();
        }

        let f = producer.take();
        strict_assert!(f.is_some(), "pending slot without producer");
        let outcome = match f {
            Some(f) => Self::produce(f, &self.metrics),
            None => Err(Error::new(ErrorKind::Panicked, "pending slot without producer")),
        };
        let outcome = self.outcome.get_or_init(|| outcome).clone();
        drop(producer);

        tracing::trace!(state = ?self.state(), "[slot]: evaluated");
        outcome
    }

    fn produce(f: Producer<V>, metrics: &Metrics) -> Result<V> {
        metrics.produce.increase(1);
        let start = Instant::now();

        // `OnceLock` would retry after a panic; catching it keeps the slot poisoned instead.
        let outcome = match catch_unwind(AssertUnwindSafe(f)) {
            Ok(res) => res,
            Err(payload) => Err(Error::panicked(payload)),
        };

        metrics.produce_duration.record(start.elapsed().as_secs_f64());
        if let Err(e) = &outcome {
            metrics.fault.increase(1);
            tracing::warn!("[slot]: producer faulted, the slot is poisoned until removed: {e}");
        }
        outcome
    }
}
