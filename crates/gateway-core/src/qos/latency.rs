use hdrhistogram::Histogram;
use parking_lot::Mutex;
use std::time::Duration;

const SIGNIFICANT_FIGURES: u8 = 3;

/// Streaming latency sketch for a single node.
///
/// Samples are stored in microseconds; quantiles are reported in milliseconds.
pub struct LatencyTracker {
    histogram: Mutex<Histogram<u64>>,
}

impl std::fmt::Debug for LatencyTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LatencyTracker").field("samples", &self.sample_count()).finish()
    }
}

impl Default for LatencyTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl LatencyTracker {
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn new() -> Self {
        // Auto-resizing histogram; construction only fails on sigfig > 5.
        let histogram = Histogram::new(SIGNIFICANT_FIGURES).expect("valid histogram sigfig");
        Self { histogram: Mutex::new(histogram) }
    }

    pub fn record(&self, latency: Duration) {
        let micros = u64::try_from(latency.as_micros()).unwrap_or(u64::MAX).max(1);
        let _ = self.histogram.lock().record(micros);
    }

    #[must_use]
    pub fn sample_count(&self) -> u64 {
        self.histogram.lock().len()
    }

    /// 90th percentile in milliseconds, `0.0` when nothing was recorded.
    #[must_use]
    pub fn p90_ms(&self) -> f64 {
        self.quantile_ms(0.90)
    }

    #[must_use]
    pub fn quantile_ms(&self, quantile: f64) -> f64 {
        let histogram = self.histogram.lock();
        if histogram.is_empty() {
            return 0.0;
        }
        #[allow(clippy::cast_precision_loss)]
        let micros = histogram.value_at_quantile(quantile) as f64;
        micros / 1000.0
    }
}
