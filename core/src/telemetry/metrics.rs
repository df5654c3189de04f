use std::sync::Mutex;

use serde::Serialize;

/// Counters accumulated across `compute_signals` calls.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub derived: usize,
    pub failed: usize,
    pub not_ready: usize,
    pub designs: usize,
}

pub struct MetricsRecorder {
    inner: Mutex<MetricsSnapshot>,
}

impl MetricsRecorder {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(MetricsSnapshot::default()),
        }
    }

    pub fn record_derived(&self) {
        if let Ok(mut metrics) = self.inner.lock() {
            metrics.derived += 1;
        }
    }

    pub fn record_failed(&self) {
        if let Ok(mut metrics) = self.inner.lock() {
            metrics.failed += 1;
        }
    }

    pub fn record_not_ready(&self) {
        if let Ok(mut metrics) = self.inner.lock() {
            metrics.not_ready += 1;
        }
    }

    pub fn record_designs(&self, count: usize) {
        if let Ok(mut metrics) = self.inner.lock() {
            metrics.designs += count;
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        if let Ok(metrics) = self.inner.lock() {
            *metrics
        } else {
            MetricsSnapshot::default()
        }
    }
}

impl Default for MetricsRecorder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate() {
        let metrics = MetricsRecorder::new();
        metrics.record_derived();
        metrics.record_derived();
        metrics.record_failed();
        metrics.record_designs(3);
        assert_eq!(
            metrics.snapshot(),
            MetricsSnapshot {
                derived: 2,
                failed: 1,
                not_ready: 0,
                designs: 3
            }
        );
    }
}
