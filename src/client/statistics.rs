//! Live metrics and quality classification
//!
//! Everything here is a pure function of the session counters and the
//! rolling sample window, cheap enough to recompute after every mutation.

use crate::client::constants::*;
use crate::client::window::SampleWindow;
use colored::{ColoredString, Colorize};
use std::fmt;

/// Session packet counters. All of them only ever grow within a session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counters {
    pub packets_sent: u64,
    pub packets_received: u64,
    pub lost: u64,
    /// Probes dropped unanswered because the channel disconnected
    pub discarded: u64,
}

/// Snapshot of live metrics
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Metrics {
    pub last_latency_ms: u64,
    pub avg_latency_ms: f64,
    pub jitter_ms: f64,
    pub packet_loss_pct: f64,
    pub packets_sent: u64,
    pub packets_received: u64,
    pub lost: u64,
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Mean of the window, rounded to two decimals; 0 when empty
pub fn average(window: &SampleWindow) -> f64 {
    if window.is_empty() {
        return 0.0;
    }
    let sum: u64 = window.iter().sum();
    round2(sum as f64 / window.len() as f64)
}

/// Mean absolute difference between consecutive samples, rounded to two
/// decimals; 0 with fewer than two samples
pub fn jitter(window: &SampleWindow) -> f64 {
    if window.len() < 2 {
        return 0.0;
    }
    let mut samples = window.iter();
    let Some(mut previous) = samples.next() else {
        return 0.0;
    };
    let mut total = 0u64;
    for sample in samples {
        total += sample.abs_diff(previous);
        previous = sample;
    }
    round2(total as f64 / (window.len() - 1) as f64)
}

/// Lost probes as a percentage of those sent, rounded to two decimals
pub fn packet_loss_pct(counters: &Counters) -> f64 {
    round2(counters.lost as f64 / counters.packets_sent.max(1) as f64 * 100.0)
}

impl Metrics {
    pub fn compute(counters: &Counters, window: &SampleWindow) -> Self {
        Self {
            last_latency_ms: window.last().unwrap_or(0),
            avg_latency_ms: average(window),
            jitter_ms: jitter(window),
            packet_loss_pct: packet_loss_pct(counters),
            packets_sent: counters.packets_sent,
            packets_received: counters.packets_received,
            lost: counters.lost,
        }
    }
}

/// Upper bounds (exclusive) for each quality band
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QualityThresholds {
    pub min_packets: u64,
    pub good_latency_ms: f64,
    pub good_jitter_ms: f64,
    pub good_loss_pct: f64,
    pub moderate_latency_ms: f64,
    pub moderate_jitter_ms: f64,
    pub moderate_loss_pct: f64,
}

impl Default for QualityThresholds {
    fn default() -> Self {
        Self {
            min_packets: MIN_PACKETS_FOR_QUALITY,
            good_latency_ms: GOOD_LATENCY_MS,
            good_jitter_ms: GOOD_JITTER_MS,
            good_loss_pct: GOOD_LOSS_PCT,
            moderate_latency_ms: MODERATE_LATENCY_MS,
            moderate_jitter_ms: MODERATE_JITTER_MS,
            moderate_loss_pct: MODERATE_LOSS_PCT,
        }
    }
}

impl QualityThresholds {
    pub fn validate(&self) -> Result<(), String> {
        let all = [
            self.good_latency_ms,
            self.good_jitter_ms,
            self.good_loss_pct,
            self.moderate_latency_ms,
            self.moderate_jitter_ms,
            self.moderate_loss_pct,
        ];
        if all.iter().any(|t| !t.is_finite() || *t <= 0.0) {
            return Err("quality thresholds must be positive".into());
        }
        if self.moderate_latency_ms < self.good_latency_ms
            || self.moderate_jitter_ms < self.good_jitter_ms
            || self.moderate_loss_pct < self.good_loss_pct
        {
            return Err("moderate thresholds must not be tighter than good thresholds".into());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quality {
    /// Not enough probes sent yet to judge
    Unknown,
    Good,
    Moderate,
    Poor,
}

impl Quality {
    pub fn classify(metrics: &Metrics, thresholds: &QualityThresholds) -> Self {
        if metrics.packets_sent < thresholds.min_packets {
            Quality::Unknown
        } else if metrics.avg_latency_ms < thresholds.good_latency_ms
            && metrics.jitter_ms < thresholds.good_jitter_ms
            && metrics.packet_loss_pct < thresholds.good_loss_pct
        {
            Quality::Good
        } else if metrics.avg_latency_ms < thresholds.moderate_latency_ms
            && metrics.jitter_ms < thresholds.moderate_jitter_ms
            && metrics.packet_loss_pct < thresholds.moderate_loss_pct
        {
            Quality::Moderate
        } else {
            Quality::Poor
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Quality::Unknown => "UNKNOWN",
            Quality::Good => "GOOD",
            Quality::Moderate => "MODERATE",
            Quality::Poor => "POOR",
        }
    }

    pub fn colored(&self) -> ColoredString {
        match self {
            Quality::Unknown => self.label().dimmed(),
            Quality::Good => self.label().green().bold(),
            Quality::Moderate => self.label().yellow().bold(),
            Quality::Poor => self.label().red().bold(),
        }
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window_of(samples: &[u64]) -> SampleWindow {
        let mut window = SampleWindow::new(DEFAULT_WINDOW_CAPACITY);
        for &s in samples {
            window.push(s);
        }
        window
    }

    fn metrics(avg: f64, jitter: f64, loss: f64, sent: u64) -> Metrics {
        Metrics {
            avg_latency_ms: avg,
            jitter_ms: jitter,
            packet_loss_pct: loss,
            packets_sent: sent,
            ..Metrics::default()
        }
    }

    #[test]
    fn test_empty_window_metrics_are_zero() {
        let m = Metrics::compute(&Counters::default(), &window_of(&[]));
        assert_eq!(m.last_latency_ms, 0);
        assert_eq!(m.avg_latency_ms, 0.0);
        assert_eq!(m.jitter_ms, 0.0);
        assert_eq!(m.packet_loss_pct, 0.0);
    }

    #[test]
    fn test_average_and_last() {
        let window = window_of(&[10, 20, 31]);
        let m = Metrics::compute(&Counters::default(), &window);
        assert_eq!(m.last_latency_ms, 31);
        assert_eq!(m.avg_latency_ms, 20.33);
    }

    #[test]
    fn test_jitter_uses_adjacent_pairs() {
        // |20-10| + |15-20| + |40-15| = 40 over 3 pairs
        assert_eq!(jitter(&window_of(&[10, 20, 15, 40])), 13.33);
        assert_eq!(jitter(&window_of(&[42])), 0.0);
    }

    #[test]
    fn test_constant_rtt_has_no_jitter() {
        assert_eq!(jitter(&window_of(&[25; 30])), 0.0);
    }

    #[test]
    fn test_loss_percentage() {
        let counters = Counters {
            packets_sent: 5,
            packets_received: 3,
            lost: 2,
            discarded: 0,
        };
        assert_eq!(packet_loss_pct(&counters), 40.0);

        let counters = Counters {
            packets_sent: 3,
            lost: 1,
            ..Counters::default()
        };
        assert_eq!(packet_loss_pct(&counters), 33.33);
    }

    #[test]
    fn test_loss_with_nothing_sent_is_zero() {
        assert_eq!(packet_loss_pct(&Counters::default()), 0.0);
    }

    #[test]
    fn test_quality_unknown_below_min_packets() {
        let t = QualityThresholds::default();
        assert_eq!(Quality::classify(&metrics(10.0, 1.0, 0.0, 4), &t), Quality::Unknown);
    }

    #[test]
    fn test_quality_good_boundary() {
        let t = QualityThresholds::default();
        assert_eq!(Quality::classify(&metrics(119.0, 29.0, 0.9, 5), &t), Quality::Good);
        assert_eq!(
            Quality::classify(&metrics(120.0, 29.0, 0.9, 5), &t),
            Quality::Moderate
        );
    }

    #[test]
    fn test_quality_moderate_and_poor() {
        let t = QualityThresholds::default();
        assert_eq!(
            Quality::classify(&metrics(200.0, 50.0, 2.0, 10), &t),
            Quality::Moderate
        );
        assert_eq!(Quality::classify(&metrics(250.0, 10.0, 0.0, 10), &t), Quality::Poor);
        assert_eq!(Quality::classify(&metrics(20.0, 10.0, 3.0, 10), &t), Quality::Poor);
        assert_eq!(Quality::classify(&metrics(20.0, 80.0, 0.0, 10), &t), Quality::Poor);
    }

    #[test]
    fn test_thresholds_validation() {
        assert!(QualityThresholds::default().validate().is_ok());

        let inverted = QualityThresholds {
            moderate_latency_ms: 100.0,
            ..QualityThresholds::default()
        };
        assert!(inverted.validate().is_err());

        let negative = QualityThresholds {
            good_loss_pct: -1.0,
            ..QualityThresholds::default()
        };
        assert!(negative.validate().is_err());
    }
}
