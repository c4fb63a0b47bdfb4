// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! In-process metrics for MCP connections.
//!
//! Durations for opens, discovery and tool calls, plus per-batch outcome
//! counters. Suitable for a CLI where an exporter would be overkill.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};
use std::time::{Duration, Instant};

use once_cell::sync::Lazy;

/// Global metrics instance.
pub static GLOBAL_METRICS: Lazy<Metrics> = Lazy::new(Metrics::new);

/// Central metrics collection.
#[derive(Debug)]
pub struct Metrics {
    /// Tool call metrics by `mcp.<server>.<tool>`.
    tools: RwLock<HashMap<String, ToolMetrics>>,

    /// Protocol operation metrics (`mcp.open`, `mcp.list_tools`).
    operations: RwLock<HashMap<String, OperationMetrics>>,

    opened: AtomicU64,
    skipped: AtomicU64,
    failed: AtomicU64,

    start_time: Instant,
}

impl Metrics {
    /// Create a new metrics collector.
    pub fn new() -> Self {
        Self {
            tools: RwLock::new(HashMap::new()),
            operations: RwLock::new(HashMap::new()),
            opened: AtomicU64::new(0),
            skipped: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    /// Record a tool call.
    pub fn record_tool(&self, name: &str, duration: Duration, success: bool) {
        let mut tools = self.tools.write().unwrap_or_else(PoisonError::into_inner);
        tools
            .entry(name.to_string())
            .or_default()
            .record(duration, success);
    }

    /// Record a protocol operation.
    pub fn record_operation(&self, name: &str, duration: Duration) {
        let mut ops = self.operations.write().unwrap_or_else(PoisonError::into_inner);
        ops.entry(name.to_string()).or_default().record(duration);
    }

    /// Count the outcomes of one batch open.
    pub fn record_batch(&self, opened: usize, skipped: usize, failed: usize) {
        self.opened.fetch_add(opened as u64, Ordering::Relaxed);
        self.skipped.fetch_add(skipped as u64, Ordering::Relaxed);
        self.failed.fetch_add(failed as u64, Ordering::Relaxed);
    }

    /// Get metrics for a specific tool.
    pub fn tool_metrics(&self, name: &str) -> Option<ToolMetrics> {
        self.tools
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    /// Get metrics for a specific operation.
    pub fn operation_metrics(&self, name: &str) -> Option<OperationMetrics> {
        self.operations
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    /// Take a snapshot of all metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            tools: self
                .tools
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .clone(),
            operations: self
                .operations
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .clone(),
            servers_opened: self.opened.load(Ordering::Relaxed),
            servers_skipped: self.skipped.load(Ordering::Relaxed),
            servers_failed: self.failed.load(Ordering::Relaxed),
            uptime: self.start_time.elapsed(),
        }
    }

    /// Reset all metrics.
    pub fn reset(&self) {
        self.tools.write().unwrap_or_else(PoisonError::into_inner).clear();
        self.operations
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        self.opened.store(0, Ordering::Relaxed);
        self.skipped.store(0, Ordering::Relaxed);
        self.failed.store(0, Ordering::Relaxed);
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Metrics for a specific tool.
#[derive(Debug, Clone)]
pub struct ToolMetrics {
    pub invocations: u64,
    pub successes: u64,
    pub failures: u64,
    pub total_duration: Duration,
    pub max_duration: Duration,
}

impl ToolMetrics {
    /// Record a tool call.
    pub fn record(&mut self, duration: Duration, success: bool) {
        self.invocations += 1;
        if success {
            self.successes += 1;
        } else {
            self.failures += 1;
        }
        self.total_duration += duration;
        self.max_duration = self.max_duration.max(duration);
    }

    /// Success rate (0.0 to 1.0).
    pub fn success_rate(&self) -> f64 {
        if self.invocations == 0 {
            1.0
        } else {
            self.successes as f64 / self.invocations as f64
        }
    }
}

impl Default for ToolMetrics {
    fn default() -> Self {
        Self {
            invocations: 0,
            successes: 0,
            failures: 0,
            total_duration: Duration::ZERO,
            max_duration: Duration::ZERO,
        }
    }
}

/// Operation metrics with a latency histogram.
#[derive(Debug, Clone)]
pub struct OperationMetrics {
    pub count: u64,
    pub total_duration: Duration,
    pub min_duration: Duration,
    pub max_duration: Duration,
    pub histogram: Histogram,
}

impl OperationMetrics {
    /// Record an operation.
    pub fn record(&mut self, duration: Duration) {
        self.count += 1;
        self.total_duration += duration;
        self.min_duration = self.min_duration.min(duration);
        self.max_duration = self.max_duration.max(duration);
        self.histogram.record(duration);
    }

    /// Calculate average duration.
    pub fn avg_duration(&self) -> Duration {
        if self.count == 0 {
            Duration::ZERO
        } else {
            self.total_duration / self.count as u32
        }
    }
}

impl Default for OperationMetrics {
    fn default() -> Self {
        Self {
            count: 0,
            total_duration: Duration::ZERO,
            min_duration: Duration::MAX,
            max_duration: Duration::ZERO,
            histogram: Histogram::default(),
        }
    }
}

/// Fixed-bucket latency histogram.
///
/// Buckets are tuned for network round trips: 1ms up to the 30s default
/// server timeout.
#[derive(Debug, Clone)]
pub struct Histogram {
    /// Upper bounds in milliseconds.
    buckets: Vec<u64>,

    /// Count per bucket, plus one overflow slot.
    counts: Vec<u64>,
}

impl Histogram {
    /// Create a histogram with custom bucket bounds (in milliseconds).
    pub fn with_buckets(buckets: Vec<u64>) -> Self {
        let counts = vec![0; buckets.len() + 1];
        Self { buckets, counts }
    }

    /// Record a duration value.
    pub fn record(&mut self, duration: Duration) {
        let millis = duration.as_millis() as u64;
        let idx = self
            .buckets
            .iter()
            .position(|&b| millis <= b)
            .unwrap_or(self.buckets.len());
        self.counts[idx] += 1;
    }

    /// Counts per bucket.
    pub fn counts(&self) -> &[u64] {
        &self.counts
    }

    /// Approximate percentile, reported as the bucket's upper bound.
    pub fn percentile(&self, p: f64) -> Duration {
        let total: u64 = self.counts.iter().sum();
        if total == 0 {
            return Duration::ZERO;
        }

        let target = (total as f64 * p / 100.0).ceil() as u64;
        let mut cumulative = 0u64;
        for (i, &count) in self.counts.iter().enumerate() {
            cumulative += count;
            if cumulative >= target {
                let millis = match self.buckets.get(i) {
                    Some(bound) => *bound,
                    None => self.buckets.last().copied().unwrap_or(0) * 2,
                };
                return Duration::from_millis(millis);
            }
        }

        Duration::ZERO
    }

    /// Median latency.
    pub fn p50(&self) -> Duration {
        self.percentile(50.0)
    }

    /// 90th percentile latency.
    pub fn p90(&self) -> Duration {
        self.percentile(90.0)
    }
}

impl Default for Histogram {
    fn default() -> Self {
        Self::with_buckets(vec![1, 10, 100, 1_000, 5_000, 30_000])
    }
}

/// Point-in-time copy of all metrics.
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub tools: HashMap<String, ToolMetrics>,
    pub operations: HashMap<String, OperationMetrics>,
    pub servers_opened: u64,
    pub servers_skipped: u64,
    pub servers_failed: u64,
    pub uptime: Duration,
}

impl MetricsSnapshot {
    /// Human-readable summary, one line per entry, sorted by name.
    pub fn summary(&self) -> String {
        let mut lines = vec![format!(
            "servers: {} opened, {} skipped, {} failed",
            self.servers_opened, self.servers_skipped, self.servers_failed
        )];

        let mut ops: Vec<_> = self.operations.iter().collect();
        ops.sort_by(|a, b| a.0.cmp(b.0));
        for (name, op) in ops {
            lines.push(format!(
                "{}: count={} avg={:?} p90={:?}",
                name,
                op.count,
                op.avg_duration(),
                op.histogram.p90()
            ));
        }

        let mut tools: Vec<_> = self.tools.iter().collect();
        tools.sort_by(|a, b| a.0.cmp(b.0));
        for (name, tool) in tools {
            lines.push(format!(
                "{}: calls={} success={:.0}% max={:?}",
                name,
                tool.invocations,
                tool.success_rate() * 100.0,
                tool.max_duration
            ));
        }

        lines.join("\n")
    }
}
