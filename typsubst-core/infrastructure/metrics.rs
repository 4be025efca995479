//! Counters and timings for substitution runs

use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashMap;
use std::time::{Duration, Instant};

pub const SUBSTITUTED: &str = "substituted";
pub const CONFLICTS: &str = "conflicts";
pub const CACHE_HITS: &str = "cache_hits";
pub const CACHE_MISSES: &str = "cache_misses";

/// Shared metrics collector. All methods take `&self`.
pub struct SubstitutionMetrics {
    timings: RwLock<HashMap<String, Vec<Duration>>>,
    counters: RwLock<HashMap<String, u64>>,
    start_time: Instant,
}

impl SubstitutionMetrics {
    pub fn new() -> Self {
        Self {
            timings: RwLock::new(HashMap::new()),
            counters: RwLock::new(HashMap::new()),
            start_time: Instant::now(),
        }
    }

    pub fn record_timing(&self, name: impl Into<String>, duration: Duration) {
        let mut timings = self.timings.write();
        timings.entry(name.into()).or_default().push(duration);
    }

    /// Run `f` and record how long it took under `name`.
    pub fn time<T>(&self, name: &str, f: impl FnOnce() -> T) -> T {
        let start = Instant::now();
        let value = f();
        self.record_timing(name, start.elapsed());
        value
    }

    pub fn increment(&self, name: impl Into<String>) {
        self.add(name, 1);
    }

    pub fn add(&self, name: impl Into<String>, value: u64) {
        let mut counters = self.counters.write();
        *counters.entry(name.into()).or_default() += value;
    }

    pub fn get_timing_stats(&self, name: &str) -> Option<TimingStats> {
        let timings = self.timings.read();
        timings.get(name).map(|durations| TimingStats::from_durations(durations))
    }

    pub fn get_counter(&self, name: &str) -> u64 {
        self.counters.read().get(name).copied().unwrap_or(0)
    }

    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    pub fn reset(&self) {
        self.timings.write().clear();
        self.counters.write().clear();
    }

    pub fn summary(&self) -> MetricsSummary {
        let timings = self.timings.read();
        let counters = self.counters.read();

        MetricsSummary {
            uptime: self.uptime(),
            timings: timings
                .iter()
                .map(|(name, durations)| (name.clone(), TimingStats::from_durations(durations)))
                .collect(),
            counters: counters.clone(),
        }
    }
}

impl Default for SubstitutionMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimingStats {
    pub count: usize,
    pub total: Duration,
    pub mean: Duration,
    pub min: Duration,
    pub max: Duration,
    pub p50: Duration,
    pub p95: Duration,
    pub p99: Duration,
}

impl TimingStats {
    fn from_durations(durations: &[Duration]) -> Self {
        if durations.is_empty() {
            return Self {
                count: 0,
                total: Duration::ZERO,
                mean: Duration::ZERO,
                min: Duration::ZERO,
                max: Duration::ZERO,
                p50: Duration::ZERO,
                p95: Duration::ZERO,
                p99: Duration::ZERO,
            };
        }

        let mut sorted = durations.to_vec();
        sorted.sort();

        let count = sorted.len();
        let total: Duration = sorted.iter().sum();
        let mean = total / count as u32;

        let percentile = |p: f64| {
            let idx = ((count as f64 * p) as usize).min(count - 1);
            sorted[idx]
        };

        Self {
            count,
            total,
            mean,
            min: sorted[0],
            max: sorted[count - 1],
            p50: percentile(0.50),
            p95: percentile(0.95),
            p99: percentile(0.99),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricsSummary {
    pub uptime: Duration,
    pub timings: HashMap<String, TimingStats>,
    pub counters: HashMap<String, u64>,
}

impl MetricsSummary {
    /// Human-readable report, names sorted.
    pub fn report(&self) -> String {
        let mut lines = vec![format!("Uptime: {:.2?}", self.uptime), String::new(), "=== Timings ===".to_string()];

        let mut timing_names: Vec<_> = self.timings.keys().collect();
        timing_names.sort();
        for name in timing_names {
            let stats = &self.timings[name];
            lines.push(format!("{}:", name));
            lines.push(format!("  count: {}", stats.count));
            lines.push(format!("  mean:  {:.2?}", stats.mean));
            lines.push(format!("  p50:   {:.2?}", stats.p50));
            lines.push(format!("  p99:   {:.2?}", stats.p99));
        }

        lines.push(String::new());
        lines.push("=== Counters ===".to_string());

        let mut counter_names: Vec<_> = self.counters.keys().collect();
        counter_names.sort();
        for name in counter_names {
            lines.push(format!("{}: {}", name, self.counters[name]));
        }

        lines.join("\n")
    }
}
