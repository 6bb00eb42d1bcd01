//! Server counters and live status line

use colored::*;
use std::io::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Time without probes before the server is shown as idle (milliseconds)
const IDLE_THRESHOLD_MS: u64 = 1500;

/// Blink interval for the activity indicator (milliseconds)
const BLINK_INTERVAL_MS: u64 = 200;

#[derive(Debug, Default)]
struct Counts {
    received: AtomicU64,
    echoed: AtomicU64,
    ignored: AtomicU64,
    errors: AtomicU64,
}

/// Tracks what the echo loops do and optionally renders it.
///
/// Counters are atomics so echo threads never wait on the display thread.
pub struct ServerMonitor {
    counts: Arc<Counts>,
    start_time: Instant,
    update_interval: Duration,
}

impl ServerMonitor {
    pub fn new(update_interval_ms: u64) -> Self {
        Self {
            counts: Arc::new(Counts::default()),
            start_time: Instant::now(),
            update_interval: Duration::from_millis(update_interval_ms),
        }
    }

    /// Counters handle for the echo loops
    pub fn counters(&self) -> ServerCounters {
        ServerCounters {
            counts: Arc::clone(&self.counts),
        }
    }

    /// Start the background status-line thread.
    pub fn start_display(&self) {
        let counts = Arc::clone(&self.counts);
        let update_interval = self.update_interval;

        thread::spawn(move || {
            let mut last_received = 0u64;
            let mut last_packet_time = Instant::now();
            let mut blink_state = false;
            let mut last_blink_time = Instant::now();

            loop {
                thread::sleep(update_interval);

                let received = counts.received.load(Ordering::Relaxed);
                let now = Instant::now();

                if received > last_received {
                    last_packet_time = now;
                }
                let is_idle = now.duration_since(last_packet_time)
                    >= Duration::from_millis(IDLE_THRESHOLD_MS);

                if is_idle {
                    blink_state = false;
                } else if now.duration_since(last_blink_time)
                    >= Duration::from_millis(BLINK_INTERVAL_MS)
                {
                    blink_state = !blink_state;
                    last_blink_time = now;
                }

                let line = Self::status_line(
                    is_idle,
                    blink_state,
                    received,
                    counts.echoed.load(Ordering::Relaxed),
                    counts.ignored.load(Ordering::Relaxed),
                    counts.errors.load(Ordering::Relaxed),
                );
                print!("\r{}", line);
                std::io::stdout().flush().ok();

                last_received = received;
            }
        });
    }

    fn render_indicator(is_idle: bool, blink_state: bool) -> String {
        if is_idle {
            "░".normal().to_string()
        } else if blink_state {
            "█".green().bold().to_string()
        } else {
            "░".green().to_string()
        }
    }

    fn status_line(
        is_idle: bool,
        blink_state: bool,
        received: u64,
        echoed: u64,
        ignored: u64,
        errors: u64,
    ) -> String {
        let status = if is_idle { "IDLE" } else { "ACTIVE" };
        format!(
            "{} [{}] Received: {} | Echoed: {} | Ignored: {} | Errors: {}",
            Self::render_indicator(is_idle, blink_state),
            status,
            received,
            echoed,
            ignored,
            errors
        )
    }

    pub fn stats(&self) -> ServerStats {
        ServerStats {
            received: self.counts.received.load(Ordering::Relaxed),
            echoed: self.counts.echoed.load(Ordering::Relaxed),
            ignored: self.counts.ignored.load(Ordering::Relaxed),
            errors: self.counts.errors.load(Ordering::Relaxed),
            elapsed: self.start_time.elapsed(),
        }
    }
}

/// Cloneable counter handle used by the echo loops.
#[derive(Clone)]
pub struct ServerCounters {
    counts: Arc<Counts>,
}

impl ServerCounters {
    #[inline]
    pub fn increment_received(&self) {
        self.counts.received.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn increment_echoed(&self) {
        self.counts.echoed.fetch_add(1, Ordering::Relaxed);
    }

    /// Valid message the server has no reply for
    #[inline]
    pub fn increment_ignored(&self) {
        self.counts.ignored.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn increment_error(&self) {
        self.counts.errors.fetch_add(1, Ordering::Relaxed);
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ServerStats {
    pub received: u64,
    pub echoed: u64,
    pub ignored: u64,
    pub errors: u64,
    pub elapsed: Duration,
}
