//! Session-wide RTT percentiles for the final report

use crate::client::constants::*;
use crate::client::error::{ClientError, Result};
use hdrhistogram::Histogram;
use tracing::{debug, warn};

/// Session-wide RTT distribution, kept alongside the rolling window for the
/// end-of-run report.
#[derive(Debug, Clone)]
pub struct RttSummary {
    hist: Histogram<u64>,
    real_min: u64,
    real_max: u64,
    clamped_count: usize,
}

impl RttSummary {
    pub fn new() -> Result<Self> {
        let hist = Histogram::<u64>::new_with_bounds(
            HISTOGRAM_LOW_BOUND_MS,
            HISTOGRAM_HIGH_BOUND_MS,
            HISTOGRAM_SIGNIFICANT_DIGITS,
        )
        .map_err(|e| ClientError::Measurement(format!("Failed to create histogram: {}", e)))?;

        Ok(Self {
            hist,
            real_min: u64::MAX,
            real_max: 0,
            clamped_count: 0,
        })
    }

    /// Records one RTT. Values outside the histogram bounds are clamped for
    /// percentile purposes but still tracked exactly for min/max.
    pub fn record(&mut self, rtt_ms: u64) {
        self.real_min = self.real_min.min(rtt_ms);
        self.real_max = self.real_max.max(rtt_ms);

        let clamped = rtt_ms.clamp(HISTOGRAM_LOW_BOUND_MS, HISTOGRAM_HIGH_BOUND_MS);
        if clamped != rtt_ms {
            self.clamped_count += 1;
            debug!(rtt_ms = rtt_ms, clamped = clamped, "RTT clamped to histogram bounds");
        }

        if let Err(e) = self.hist.record(clamped) {
            warn!(rtt_ms = rtt_ms, error = %e, "Failed to record RTT");
        }
    }

    pub fn reset(&mut self) {
        self.hist.reset();
        self.real_min = u64::MAX;
        self.real_max = 0;
        self.clamped_count = 0;
    }

    pub fn mean(&self) -> f64 {
        self.hist.mean()
    }

    /// Smallest recorded RTT (unclamped), 0 when empty
    pub fn min(&self) -> u64 {
        if self.real_min == u64::MAX {
            0
        } else {
            self.real_min
        }
    }

    /// Largest recorded RTT (unclamped)
    pub fn max(&self) -> u64 {
        self.real_max
    }

    pub fn percentile(&self, quantile: f64) -> u64 {
        self.hist.value_at_quantile(quantile)
    }

    pub fn clamped_count(&self) -> usize {
        self.clamped_count
    }

    pub fn count(&self) -> u64 {
        self.hist.len()
    }
}
