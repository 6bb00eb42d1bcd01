use crate::client::session::SessionSnapshot;
use crate::client::statistics::Quality;
use crate::client::summary::RttSummary;
use colored::*;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Reporter for printing the end-of-run summary
pub struct Reporter;

impl Reporter {
    fn verdict(quality: Quality) -> ColoredString {
        match quality {
            Quality::Good => "✓ GOOD: latency, jitter and loss are all within good thresholds"
                .green()
                .bold(),
            Quality::Moderate => "~ MODERATE: connection usable but degraded".yellow().bold(),
            Quality::Poor => "✗ POOR: latency, jitter or loss beyond moderate thresholds"
                .red()
                .bold(),
            Quality::Unknown => "? UNKNOWN: not enough probes sent to judge".dimmed(),
        }
    }

    /// Print the complete results summary
    pub fn print_results(&self, snapshot: &SessionSnapshot, summary: &RttSummary, elapsed: Duration) {
        let counters = &snapshot.counters;
        let m = &snapshot.metrics;
        debug!(
            packets_sent = counters.packets_sent,
            packets_received = counters.packets_received,
            lost = counters.lost,
            discarded = counters.discarded,
            "Printing session results"
        );

        println!("\n{}", "┌─────────────────────────────┐".cyan());
        println!("{}", "│  Pingwatch Results          │".cyan());
        println!("{}", "└─────────────────────────────┘".cyan());
        println!();

        println!(
            "Packets:  {} sent, {} received, {} lost ({:.2}%)",
            counters.packets_sent, counters.packets_received, counters.lost, m.packet_loss_pct
        );
        if counters.discarded > 0 {
            println!(
                "          └─ {} still in flight at disconnect (not counted as lost)",
                counters.discarded
            );
        }
        println!(
            "Duration: {:.2}s at {}ms ping interval",
            elapsed.as_secs_f64(),
            snapshot.ping_interval_ms
        );
        println!();

        if summary.count() == 0 {
            warn!("No echoes received");
            println!("{}\n", "No echoes received.".red());
            println!("{}", Self::verdict(snapshot.quality));
            return;
        }

        println!("Rolling window (most recent samples):");
        println!("  Last:      {:>8} ms", m.last_latency_ms);
        println!("  Average:   {:>8.2} ms", m.avg_latency_ms);
        println!("  Jitter:    {:>8.2} ms  ← mean change between consecutive RTTs", m.jitter_ms);
        println!();

        println!("Whole session (round-trip time):");
        println!("  Min:       {:>8} ms", summary.min());
        println!("  Mean:      {:>8.2} ms", summary.mean());
        println!("  P50:       {:>8} ms", summary.percentile(0.5));
        println!("  P90:       {:>8} ms", summary.percentile(0.9));
        println!("  P99:       {:>8} ms", summary.percentile(0.99));
        println!("  Max:       {:>8} ms", summary.max());
        if summary.clamped_count() > 0 {
            println!(
                "  ⚠ Note: {} sample(s) fell outside histogram bounds and were clamped",
                summary.clamped_count()
            );
        }
        println!();

        println!("Quality:  {}", snapshot.quality.colored());
        println!("{}", Self::verdict(snapshot.quality));

        info!(
            avg_latency_ms = m.avg_latency_ms,
            jitter_ms = m.jitter_ms,
            packet_loss_pct = m.packet_loss_pct,
            quality = %snapshot.quality,
            "Results reported"
        );
    }
}
