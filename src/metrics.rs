//! Latency histograms for the translation pipeline.
//! Each named metric keeps a fixed-capacity ring of recent samples (ms),
//! summarized at p50/p95/p99 on demand.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::time::Instant;

use parking_lot::Mutex;
use serde::Serialize;

const RING_CAPACITY: usize = 1024;

/// Records elapsed time from creation until `finish`.
/// Dropping it without finishing records nothing.
pub struct TimingSpan {
    name: &'static str,
    start: Instant,
    registry: Arc<MetricsRegistry>,
}

impl TimingSpan {
    pub fn finish(self) -> f64 {
        let elapsed_ms = self.start.elapsed().as_secs_f64() * 1000.0;
        self.registry.record(self.name, elapsed_ms);
        elapsed_ms
    }
}

#[derive(Default)]
struct SampleRing {
    samples: VecDeque<f64>,
}

impl SampleRing {
    fn push(&mut self, value: f64) {
        if self.samples.len() == RING_CAPACITY {
            self.samples.pop_front();
        }
        self.samples.push_back(value);
    }

    /// Nearest-rank percentile over the retained samples.
    fn percentile(sorted: &[f64], p: f64) -> f64 {
        if sorted.is_empty() {
            return 0.0;
        }
        let idx = ((p / 100.0) * (sorted.len() as f64 - 1.0)).round() as usize;
        sorted[idx.min(sorted.len() - 1)]
    }

    fn summary(&self) -> MetricSummary {
        let mut sorted: Vec<f64> = self.samples.iter().copied().collect();
        sorted.sort_by(|a, b| a.total_cmp(b));
        MetricSummary {
            p50_ms: Self::percentile(&sorted, 50.0),
            p95_ms: Self::percentile(&sorted, 95.0),
            p99_ms: Self::percentile(&sorted, 99.0),
            count: sorted.len(),
        }
    }
}

#[derive(Default)]
pub struct MetricsRegistry {
    histograms: Mutex<HashMap<&'static str, SampleRing>>,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, name: &'static str, value_ms: f64) {
        self.histograms
            .lock()
            .entry(name)
            .or_default()
            .push(value_ms);
        tracing::trace!(metric = name, value_ms, "metric_recorded");
    }

    pub fn span(self: &Arc<Self>, name: &'static str) -> TimingSpan {
        TimingSpan {
            name,
            start: Instant::now(),
            registry: Arc::clone(self),
        }
    }

    pub fn summary(&self) -> HashMap<String, MetricSummary> {
        self.histograms
            .lock()
            .iter()
            .map(|(name, ring)| (name.to_string(), ring.summary()))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricSummary {
    pub p50_ms: f64,
    pub p95_ms: f64,
    pub p99_ms: f64,
    pub count: usize,
}

pub mod metric_names {
    pub const TRANSLATE_DONE: &str = "translate_done";
    pub const RUNTIME_CALL: &str = "runtime_call";
    pub const BATCH_DONE: &str = "batch_done";
}
