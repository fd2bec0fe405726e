//! Scheduling counters and callback latency for a pool.

use hdrhistogram::Histogram;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Longest callback invocation the histogram tracks: one hour in nanoseconds.
const MAX_TRACKED_LATENCY_NS: u64 = 3_600_000_000_000;

/// Runtime metrics collector
#[derive(Debug)]
pub struct Metrics {
    tasks_submitted: AtomicU64,
    tasks_completed: AtomicU64,
    invocations: AtomicU64,
    reruns: AtomicU64,
    requeues: AtomicU64,
    tasks_purged: AtomicU64,
    tasks_panicked: AtomicU64,

    // per-invocation callback latency
    latency_histogram: RwLock<Histogram<u64>>,

    start_time: Instant,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            tasks_submitted: AtomicU64::new(0),
            tasks_completed: AtomicU64::new(0),
            invocations: AtomicU64::new(0),
            reruns: AtomicU64::new(0),
            requeues: AtomicU64::new(0),
            tasks_purged: AtomicU64::new(0),
            tasks_panicked: AtomicU64::new(0),
            latency_histogram: RwLock::new(
                Histogram::new_with_max(MAX_TRACKED_LATENCY_NS, 3)
                    .expect("constant histogram bounds are valid"),
            ),
            start_time: Instant::now(),
        }
    }

    pub fn record_submitted(&self, count: usize) {
        self.tasks_submitted.fetch_add(count as u64, Ordering::Relaxed);
    }

    /// Record one callback invocation and how long it ran.
    pub fn record_invocation(&self, duration: Duration) {
        self.invocations.fetch_add(1, Ordering::Relaxed);

        // contention only costs a sample
        if let Some(mut hist) = self.latency_histogram.try_write() {
            let ns = u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX);
            let _ = hist.record(ns.min(MAX_TRACKED_LATENCY_NS));
        }
    }

    pub fn record_completed(&self) {
        self.tasks_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rerun(&self) {
        self.reruns.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_requeue(&self) {
        self.requeues.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_purged(&self, count: usize) {
        self.tasks_purged.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn record_panic(&self) {
        self.tasks_panicked.fetch_add(1, Ordering::Relaxed);
    }

    /// Get a snapshot of current metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        let histogram = self.latency_histogram.read();

        MetricsSnapshot {
            uptime: self.start_time.elapsed(),
            tasks_submitted: self.tasks_submitted.load(Ordering::Relaxed),
            tasks_completed: self.tasks_completed.load(Ordering::Relaxed),
            invocations: self.invocations.load(Ordering::Relaxed),
            reruns: self.reruns.load(Ordering::Relaxed),
            requeues: self.requeues.load(Ordering::Relaxed),
            tasks_purged: self.tasks_purged.load(Ordering::Relaxed),
            tasks_panicked: self.tasks_panicked.load(Ordering::Relaxed),
            avg_latency_ns: if histogram.len() > 0 {
                histogram.mean() as u64
            } else {
                0
            },
            p50_latency_ns: histogram.value_at_quantile(0.50),
            p99_latency_ns: histogram.value_at_quantile(0.99),
            max_latency_ns: histogram.max(),
        }
    }
}

/// Snapshot of metrics at a point in time
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub uptime: Duration,
    pub tasks_submitted: u64,
    /// Tasks that reached `Done`, including ones whose callback panicked.
    pub tasks_completed: u64,
    /// Every callback call, counting each rerun and requeue separately.
    pub invocations: u64,
    pub reruns: u64,
    pub requeues: u64,
    pub tasks_purged: u64,
    pub tasks_panicked: u64,
    pub avg_latency_ns: u64,
    pub p50_latency_ns: u64,
    pub p99_latency_ns: u64,
    pub max_latency_ns: u64,
}

impl MetricsSnapshot {
    /// Calculate completed tasks per second
    pub fn tasks_per_second(&self) -> f64 {
        let seconds = self.uptime.as_secs_f64();
        if seconds == 0.0 {
            return 0.0;
        }
        self.tasks_completed as f64 / seconds
    }

    /// Tasks submitted but neither completed nor purged yet.
    pub fn outstanding(&self) -> u64 {
        self.tasks_submitted
            .saturating_sub(self.tasks_completed + self.tasks_purged)
    }
}
