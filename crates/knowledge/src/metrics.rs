//! Rolling per-request metrics.
//!
//! A fixed-capacity FIFO window of recent requests. Not persisted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

/// Outcome of one completed request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RagMetric {
    pub timestamp: DateTime<Utc>,
    pub query: String,
    pub latency_ms: u64,
    pub citation_count: usize,
    pub fallback_used: bool,
    pub docs_used: usize,
}

impl RagMetric {
    pub fn new(
        query: impl Into<String>,
        latency_ms: u64,
        citation_count: usize,
        fallback_used: bool,
        docs_used: usize,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            query: query.into(),
            latency_ms,
            citation_count,
            fallback_used,
            docs_used,
        }
    }
}

/// Aggregate over the current window. All zeros when empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSummary {
    pub total: usize,
    pub avg_latency_ms: f64,
    pub p95_latency_ms: u64,
    pub avg_citations: f64,
    pub avg_docs_used: f64,
    /// Share of requests answered by the fallback, in [0, 1]
    pub fallback_rate: f64,
}

/// Bounded buffer of [`RagMetric`]s, oldest evicted first.
#[derive(Debug)]
pub struct MetricsAggregator {
    capacity: usize,
    window: Mutex<VecDeque<RagMetric>>,
}

impl MetricsAggregator {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            window: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn window(&self) -> MutexGuard<'_, VecDeque<RagMetric>> {
        self.window.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn record(&self, metric: RagMetric) {
        let mut window = self.window();
        while window.len() >= self.capacity {
            window.pop_front();
        }
        window.push_back(metric);
    }

    pub fn len(&self) -> usize {
        self.window().len()
    }

    pub fn is_empty(&self) -> bool {
        self.window().is_empty()
    }

    /// Copy of the window, oldest first.
    pub fn snapshot(&self) -> Vec<RagMetric> {
        self.window().iter().cloned().collect()
    }

    pub fn summary(&self) -> MetricsSummary {
        let window = self.snapshot();
        let total = window.len();
        if total == 0 {
            return MetricsSummary::default();
        }

        let n = total as f64;
        let mut latencies: Vec<u64> = window.iter().map(|m| m.latency_ms).collect();
        latencies.sort_unstable();

        MetricsSummary {
            total,
            avg_latency_ms: latencies.iter().sum::<u64>() as f64 / n,
            p95_latency_ms: nearest_rank(&latencies, 95),
            avg_citations: window.iter().map(|m| m.citation_count).sum::<usize>() as f64 / n,
            avg_docs_used: window.iter().map(|m| m.docs_used).sum::<usize>() as f64 / n,
            fallback_rate: window.iter().filter(|m| m.fallback_used).count() as f64 / n,
        }
    }
}

/// Nearest-rank percentile of an ascending, non-empty slice.
fn nearest_rank(sorted: &[u64], percentile: usize) -> u64 {
    let rank = (percentile * sorted.len()).div_ceil(100).max(1);
    sorted[rank.min(sorted.len()) - 1]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn metric(query: &str, latency_ms: u64) -> RagMetric {
        RagMetric::new(query, latency_ms, 3, false, 5)
    }

    #[test]
    fn test_empty_summary() {
        let metrics = MetricsAggregator::new(10);
        assert!(metrics.is_empty());
        assert_eq!(metrics.summary(), MetricsSummary::default());
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let metrics = MetricsAggregator::new(200);
        for i in 0..=200 {
            metrics.record(metric(&format!("q{}", i), i));
        }

        assert_eq!(metrics.len(), 200);
        let window = metrics.snapshot();
        assert_eq!(window[0].query, "q1");
        assert!(!window.iter().any(|m| m.query == "q0"));
        assert_eq!(metrics.summary().total, 200);
    }

    #[test]
    fn test_summary_values() {
        let metrics = MetricsAggregator::new(50);
        for latency in 1..=20 {
            metrics.record(RagMetric::new("q", latency * 10, 4, latency % 4 == 0, 2));
        }

        let summary = metrics.summary();
        assert_eq!(summary.total, 20);
        assert!((summary.avg_latency_ms - 105.0).abs() < 1e-9);
        assert_eq!(summary.p95_latency_ms, 190);
        assert!((summary.avg_citations - 4.0).abs() < 1e-9);
        assert!((summary.avg_docs_used - 2.0).abs() < 1e-9);
        assert!((summary.fallback_rate - 0.25).abs() < 1e-9);
    }

    #[test]
    fn test_nearest_rank() {
        assert_eq!(nearest_rank(&[7], 95), 7);
        assert_eq!(nearest_rank(&[1, 2, 3, 4], 95), 4);
        assert_eq!(nearest_rank(&[1, 2, 3, 4], 50), 2);
    }

    #[test]
    fn test_zero_capacity_is_raised_to_one() {
        let metrics = MetricsAggregator::new(0);
        metrics.record(metric("a", 1));
        metrics.record(metric("b", 2));
        assert_eq!(metrics.capacity(), 1);
        assert_eq!(metrics.snapshot()[0].query, "b");
    }

    #[tokio::test]
    async fn test_concurrent_records_stay_bounded() {
        let metrics = Arc::new(MetricsAggregator::new(64));
        let handles: Vec<_> = (0..8)
            .map(|worker| {
                let metrics = Arc::clone(&metrics);
                tokio::spawn(async move {
                    for i in 0..100 {
                        metrics.record(metric(&format!("w{}-{}", worker, i), i));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(metrics.len(), 64);
    }
}
