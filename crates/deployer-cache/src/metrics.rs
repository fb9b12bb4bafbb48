//! Counters for declaration cache activity.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Declaration cache metrics (thread-safe counters).
#[derive(Debug, Clone, Default)]
pub struct CacheMetrics {
    /// Requests answered from the cache
    pub hits: Arc<AtomicU64>,
    /// Successful uploads (misses)
    pub uploads: Arc<AtomicU64>,
    /// Failed uploads; none of these were cached
    pub failures: Arc<AtomicU64>,
    /// Requests that waited on another request's in-flight upload
    pub waits: Arc<AtomicU64>,
}

impl CacheMetrics {
    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_upload(&self) {
        self.uploads.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_wait(&self) {
        self.waits.fetch_add(1, Ordering::Relaxed);
    }

    /// Get a snapshot of current metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            hits: self.hits.load(Ordering::Relaxed),
            uploads: self.uploads.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            waits: self.waits.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of metrics (for reporting).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub hits: u64,
    pub uploads: u64,
    pub failures: u64,
    pub waits: u64,
}

impl MetricsSnapshot {
    pub fn total_requests(&self) -> u64 {
        self.hits + self.uploads + self.failures
    }

    pub fn hit_rate(&self) -> f64 {
        let total = self.total_requests();
        if total == 0 {
            return 0.0;
        }
        self.hits as f64 / total as f64
    }

    /// One-line summary for end-of-run logging.
    pub fn summary(&self) -> String {
        format!(
            "declares: {} uploaded, {} cached ({:.0}% hit rate), {} failed",
            self.uploads,
            self.hits,
            self.hit_rate() * 100.0,
            self.failures
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_and_rates() {
        let metrics = CacheMetrics::default();
        metrics.record_upload();
        metrics.record_hit();
        metrics.record_hit();
        metrics.record_hit();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.total_requests(), 4);
        assert!((snapshot.hit_rate() - 0.75).abs() < f64::EPSILON);
        assert!(snapshot.summary().contains("1 uploaded"));
    }

    #[test]
    fn test_clones_share_counters() {
        let metrics = CacheMetrics::default();
        let clone = metrics.clone();
        clone.record_failure();
        assert_eq!(metrics.snapshot().failures, 1);
        assert_eq!(CacheMetrics::default().snapshot().hit_rate(), 0.0);
    }
}
