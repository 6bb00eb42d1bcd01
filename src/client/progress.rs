use crate::client::constants::*;
use crate::client::error::{ClientError, Result};
use crate::client::session::{SessionSnapshot, SessionState};
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;
use tracing::info;

/// Spinner with live session metrics
#[derive(Clone)]
pub struct LiveDisplay {
    pb: Option<ProgressBar>,
}

impl LiveDisplay {
    /// Create a spinner, or a log-only display when `quiet`
    pub fn new(quiet: bool) -> Result<Self> {
        if quiet {
            return Ok(Self { pb: None });
        }

        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::with_template("{spinner:.cyan} [{elapsed_precise}] {msg}")
                .map_err(|e| {
                    ClientError::Measurement(format!("Failed to create progress style: {}", e))
                })?
                .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏ "),
        );
        pb.enable_steady_tick(Duration::from_millis(PROGRESS_TICK_INTERVAL_MS));
        Ok(Self { pb: Some(pb) })
    }

    pub fn update(&self, snapshot: &SessionSnapshot) {
        match &self.pb {
            Some(pb) => pb.set_message(Self::render(snapshot)),
            None => {
                let m = &snapshot.metrics;
                info!(
                    state = ?snapshot.state,
                    last_ms = m.last_latency_ms,
                    avg_ms = m.avg_latency_ms,
                    jitter_ms = m.jitter_ms,
                    loss_pct = m.packet_loss_pct,
                    sent = m.packets_sent,
                    received = m.packets_received,
                    lost = m.lost,
                    pending = snapshot.pending,
                    quality = %snapshot.quality,
                    "Live metrics"
                );
            }
        }
    }

    fn color_latency(value: f64, text: String) -> ColoredString {
        if value < GOOD_LATENCY_MS {
            text.green()
        } else if value < MODERATE_LATENCY_MS {
            text.yellow()
        } else {
            text.red()
        }
    }

    /// One status line for the spinner message
    pub fn render(snapshot: &SessionSnapshot) -> String {
        let m = &snapshot.metrics;
        if snapshot.state != SessionState::Connected && m.packets_sent == 0 {
            return format!("{:?}...", snapshot.state).dimmed().to_string();
        }

        let last = Self::color_latency(m.last_latency_ms as f64, format!("{}ms", m.last_latency_ms));
        let avg = Self::color_latency(m.avg_latency_ms, format!("{:.2}ms", m.avg_latency_ms));
        let loss = if m.packet_loss_pct > 0.0 {
            format!("{:.2}%", m.packet_loss_pct).red()
        } else {
            format!("{:.2}%", m.packet_loss_pct).green()
        };

        format!(
            "→ {}  Avg: {}  Jitter: {:.2}ms  Loss: {}  [{} sent / {} recv / {} lost / {} pending]  {}  @{}ms",
            last,
            avg,
            m.jitter_ms,
            loss,
            m.packets_sent,
            m.packets_received,
            m.lost,
            snapshot.pending,
            snapshot.quality.colored(),
            snapshot.ping_interval_ms
        )
    }

    pub fn finish(&self) {
        if let Some(pb) = &self.pb {
            pb.finish_and_clear();
        }
    }
}
