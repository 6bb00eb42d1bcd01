use crate::channel::Transport;
use crate::client::constants::*;
use crate::client::error::{ClientError, Result};
use crate::client::session::SessionSettings;
use crate::client::statistics::QualityThresholds;
use clap::Parser;
use std::time::Duration;
use tracing::debug;

#[derive(Parser, Debug, Clone)]
#[command(name = "pingwatch-client")]
#[command(about = "Live round-trip latency, jitter and packet loss monitor")]
pub struct Config {
    /// Server address to connect to
    #[arg(long, default_value = "127.0.0.1:8080")]
    pub server: String,

    /// Transport used for probes and echoes
    #[arg(long, value_enum, default_value_t = Transport::Udp)]
    pub transport: Transport,

    /// Milliseconds between probes (presets: 250, 500, 1000, 2000)
    #[arg(long, default_value_t = DEFAULT_PING_INTERVAL_MS)]
    pub interval_ms: u64,

    /// Number of RTT samples in the rolling window
    #[arg(long, default_value_t = DEFAULT_WINDOW_CAPACITY)]
    pub window: usize,

    /// A probe is lost after this many ping intervals without an echo
    #[arg(long, default_value_t = DEFAULT_LOSS_TIMEOUT_FACTOR)]
    pub loss_timeout_factor: u64,

    /// Minimum milliseconds between loss sweeps
    #[arg(long, default_value_t = DEFAULT_SWEEP_FLOOR_MS)]
    pub sweep_floor_ms: u64,

    /// Stop after this many seconds (0 runs until disconnected)
    #[arg(long, default_value_t = 0)]
    pub duration_secs: u64,

    /// Average latency below which quality is good (ms)
    #[arg(long, default_value_t = GOOD_LATENCY_MS)]
    pub good_latency_ms: f64,

    /// Jitter below which quality is good (ms)
    #[arg(long, default_value_t = GOOD_JITTER_MS)]
    pub good_jitter_ms: f64,

    /// Packet loss below which quality is good (%)
    #[arg(long, default_value_t = GOOD_LOSS_PCT)]
    pub good_loss_pct: f64,

    /// Average latency below which quality is moderate (ms)
    #[arg(long, default_value_t = MODERATE_LATENCY_MS)]
    pub moderate_latency_ms: f64,

    /// Jitter below which quality is moderate (ms)
    #[arg(long, default_value_t = MODERATE_JITTER_MS)]
    pub moderate_jitter_ms: f64,

    /// Packet loss below which quality is moderate (%)
    #[arg(long, default_value_t = MODERATE_LOSS_PCT)]
    pub moderate_loss_pct: f64,

    /// Disable the live display and log metrics instead
    #[arg(long)]
    pub quiet: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Log format (text or json)
    #[arg(long, default_value = "text", value_parser = ["text", "json"])]
    pub log_format: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: "127.0.0.1:8080".to_string(),
            transport: Transport::Udp,
            interval_ms: DEFAULT_PING_INTERVAL_MS,
            window: DEFAULT_WINDOW_CAPACITY,
            loss_timeout_factor: DEFAULT_LOSS_TIMEOUT_FACTOR,
            sweep_floor_ms: DEFAULT_SWEEP_FLOOR_MS,
            duration_secs: 0,
            good_latency_ms: GOOD_LATENCY_MS,
            good_jitter_ms: GOOD_JITTER_MS,
            good_loss_pct: GOOD_LOSS_PCT,
            moderate_latency_ms: MODERATE_LATENCY_MS,
            moderate_jitter_ms: MODERATE_JITTER_MS,
            moderate_loss_pct: MODERATE_LOSS_PCT,
            quiet: false,
            log_level: "info".to_string(),
            log_format: "text".to_string(),
        }
    }
}

impl Config {
    /// Run length, if bounded
    pub fn duration(&self) -> Option<Duration> {
        (self.duration_secs > 0).then(|| Duration::from_secs(self.duration_secs))
    }

    pub fn thresholds(&self) -> QualityThresholds {
        QualityThresholds {
            min_packets: MIN_PACKETS_FOR_QUALITY,
            good_latency_ms: self.good_latency_ms,
            good_jitter_ms: self.good_jitter_ms,
            good_loss_pct: self.good_loss_pct,
            moderate_latency_ms: self.moderate_latency_ms,
            moderate_jitter_ms: self.moderate_jitter_ms,
            moderate_loss_pct: self.moderate_loss_pct,
        }
    }

    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            ping_interval_ms: self.interval_ms,
            window_capacity: self.window,
            loss_timeout_factor: self.loss_timeout_factor,
            sweep_floor_ms: self.sweep_floor_ms,
            thresholds: self.thresholds(),
        }
    }

    pub fn is_preset_interval(&self) -> bool {
        PRESET_PING_INTERVALS_MS.contains(&self.interval_ms)
    }

    /// Returns true if JSON format logging is enabled
    pub fn is_json_format(&self) -> bool {
        self.log_format.to_lowercase() == "json"
    }

    /// Validates the configuration values
    pub fn validate(&self) -> Result<()> {
        debug!("Validating configuration");
        if self.interval_ms == 0 {
            return Err(ClientError::Config("interval_ms must be > 0".into()));
        }
        if self.window == 0 {
            return Err(ClientError::Config("window must be > 0".into()));
        }
        if self.loss_timeout_factor == 0 {
            return Err(ClientError::Config("loss_timeout_factor must be > 0".into()));
        }
        self.thresholds().validate().map_err(ClientError::Config)?;

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(ClientError::Config(format!(
                "log_level must be one of: {}",
                valid_levels.join(", ")
            )));
        }
        debug!("Configuration validated successfully");
        Ok(())
    }
}
