//! Process-wide limiter metrics.
//!
//! One `Metrics` instance is created at startup and handed to every
//! component by `Arc`. Counters are monotonic for the process lifetime and
//! safe to read concurrently with updates; readers take a point-in-time
//! [`MetricsSnapshot`].

use std::fmt::Write as _;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashSet;
use serde::Serialize;

/// Counter and gauge state updated by the limiters.
#[derive(Debug, Default)]
pub struct Metrics {
    admitted: AtomicU64,
    rejected: AtomicU64,
    local_hits: AtomicU64,
    remote_hits: AtomicU64,
    remote_failures: AtomicU64,
    remote_latency_micros: AtomicU64,
    remote_latency_samples: AtomicU64,
    seen_keys: DashSet<String>,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// A request was admitted, by any layer.
    pub fn record_admitted(&self) {
        self.admitted.fetch_add(1, Ordering::Relaxed);
    }

    /// A request was finally rejected.
    pub fn record_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    /// The hot-key layer made a local decision (either way).
    pub fn record_local_hit(&self) {
        self.local_hits.fetch_add(1, Ordering::Relaxed);
    }

    /// A store round trip completed.
    pub fn record_remote_hit(&self) {
        self.remote_hits.fetch_add(1, Ordering::Relaxed);
    }

    /// A store round trip failed or timed out.
    pub fn record_remote_failure(&self) {
        self.remote_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Latency of a completed store round trip.
    pub fn record_remote_latency(&self, latency: Duration) {
        self.remote_latency_micros
            .fetch_add(latency.as_micros() as u64, Ordering::Relaxed);
        self.remote_latency_samples.fetch_add(1, Ordering::Relaxed);
    }

    /// Track keys for the distinct-key cardinality gauge.
    pub fn record_keys(&self, keys: &[String]) {
        for key in keys {
            if !self.seen_keys.contains(key) {
                self.seen_keys.insert(key.clone());
            }
        }
    }

    /// Point-in-time view of all counters and gauges.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let samples = self.remote_latency_samples.load(Ordering::Relaxed);
        let avg_remote_latency_ms = if samples == 0 {
            0.0
        } else {
            self.remote_latency_micros.load(Ordering::Relaxed) as f64 / samples as f64 / 1000.0
        };

        MetricsSnapshot {
            admitted: self.admitted.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            local_hits: self.local_hits.load(Ordering::Relaxed),
            remote_hits: self.remote_hits.load(Ordering::Relaxed),
            remote_failures: self.remote_failures.load(Ordering::Relaxed),
            avg_remote_latency_ms,
            key_cardinality: self.seen_keys.len(),
        }
    }
}

/// Serializable snapshot for the reporting surfaces.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub admitted: u64,
    pub rejected: u64,
    pub local_hits: u64,
    pub remote_hits: u64,
    pub remote_failures: u64,
    pub avg_remote_latency_ms: f64,
    pub key_cardinality: usize,
}

impl MetricsSnapshot {
    /// Render in the Prometheus text exposition format (version 0.0.4).
    pub fn to_prometheus(&self) -> String {
        let mut out = String::new();
        let counters = [
            ("floodgate_admitted_requests", "Total admitted requests", self.admitted),
            ("floodgate_rejected_requests", "Total rejected requests", self.rejected),
            ("floodgate_local_hits", "Local hot-key layer decisions", self.local_hits),
            ("floodgate_remote_hits", "Completed store round trips", self.remote_hits),
            ("floodgate_remote_failures", "Failed store round trips", self.remote_failures),
        ];
        for (name, help, value) in counters {
            let _ = writeln!(out, "# HELP {name} {help}");
            let _ = writeln!(out, "# TYPE {name} counter");
            let _ = writeln!(out, "{name} {value}");
            out.push('\n');
        }

        let _ = writeln!(
            out,
            "# HELP floodgate_remote_latency_avg_ms Average store latency in ms"
        );
        let _ = writeln!(out, "# TYPE floodgate_remote_latency_avg_ms gauge");
        let _ = writeln!(
            out,
            "floodgate_remote_latency_avg_ms {:.2}",
            self.avg_remote_latency_ms
        );
        out.push('\n');

        let _ = writeln!(out, "# HELP floodgate_key_cardinality Distinct keys observed");
        let _ = writeln!(out, "# TYPE floodgate_key_cardinality gauge");
        let _ = writeln!(out, "floodgate_key_cardinality {}", self.key_cardinality);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_accumulate() {
        let metrics = Metrics::new();
        metrics.record_admitted();
        metrics.record_admitted();
        metrics.record_rejected();
        metrics.record_local_hit();
        metrics.record_remote_hit();
        metrics.record_remote_failure();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.admitted, 2);
        assert_eq!(snapshot.rejected, 1);
        assert_eq!(snapshot.local_hits, 1);
        assert_eq!(snapshot.remote_hits, 1);
        assert_eq!(snapshot.remote_failures, 1);
    }

    #[test]
    fn test_average_latency() {
        let metrics = Metrics::new();
        assert_eq!(metrics.snapshot().avg_remote_latency_ms, 0.0);

        metrics.record_remote_latency(Duration::from_millis(10));
        metrics.record_remote_latency(Duration::from_millis(20));

        let avg = metrics.snapshot().avg_remote_latency_ms;
        assert!((avg - 15.0).abs() < 0.01);
    }

    #[test]
    fn test_key_cardinality_counts_distinct_keys() {
        let metrics = Metrics::new();
        metrics.record_keys(&["a".into(), "b".into()]);
        metrics.record_keys(&["b".into(), "c".into()]);

        assert_eq!(metrics.snapshot().key_cardinality, 3);
    }

    #[test]
    fn test_snapshot_serializes_to_json() {
        let metrics = Metrics::new();
        metrics.record_admitted();

        let value = serde_json::to_value(metrics.snapshot()).unwrap();
        assert_eq!(value["admitted"], 1);
        assert_eq!(value["key_cardinality"], 0);
    }

    #[test]
    fn test_prometheus_rendering() {
        let metrics = Metrics::new();
        metrics.record_admitted();
        metrics.record_keys(&["a".into()]);

        let text = metrics.snapshot().to_prometheus();
        assert!(text.contains("# TYPE floodgate_admitted_requests counter"));
        assert!(text.contains("floodgate_admitted_requests 1"));
        assert!(text.contains("floodgate_key_cardinality 1"));
        assert!(text.contains("floodgate_remote_latency_avg_ms 0.00"));
    }
}
