//! Constants used throughout the client application

/// Default ping interval in milliseconds
pub const DEFAULT_PING_INTERVAL_MS: u64 = 1000;

/// Ping intervals offered as presets; any positive value is accepted
pub const PRESET_PING_INTERVALS_MS: [u64; 4] = [250, 500, 1000, 2000];

/// Default number of RTT samples kept in the rolling window
pub const DEFAULT_WINDOW_CAPACITY: usize = 50;

/// A probe is lost once unanswered for this many ping intervals
pub const DEFAULT_LOSS_TIMEOUT_FACTOR: u64 = 5;

/// Lower bound for the loss sweep cadence in milliseconds
pub const DEFAULT_SWEEP_FLOOR_MS: u64 = 500;

/// Probes that must be sent before a quality rating is given
pub const MIN_PACKETS_FOR_QUALITY: u64 = 5;

/// Quality thresholds: "good" requires all three below these
pub const GOOD_LATENCY_MS: f64 = 120.0;
pub const GOOD_JITTER_MS: f64 = 30.0;
pub const GOOD_LOSS_PCT: f64 = 1.0;

/// Quality thresholds: "moderate" requires all three below these
pub const MODERATE_LATENCY_MS: f64 = 250.0;
pub const MODERATE_JITTER_MS: f64 = 80.0;
pub const MODERATE_LOSS_PCT: f64 = 3.0;

/// Spinner tick interval in milliseconds
pub const PROGRESS_TICK_INTERVAL_MS: u64 = 100;

/// Live statistics update interval in milliseconds
pub const LIVE_STATS_UPDATE_INTERVAL_MS: u64 = 500;

/// Histogram lower bound in milliseconds
pub const HISTOGRAM_LOW_BOUND_MS: u64 = 1;

/// Histogram upper bound in milliseconds (one hour)
pub const HISTOGRAM_HIGH_BOUND_MS: u64 = 3_600_000;

/// Histogram significant digits for precision
pub const HISTOGRAM_SIGNIFICANT_DIGITS: u8 = 3;
