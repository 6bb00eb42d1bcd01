//! Client module for Pingwatch latency monitoring

pub mod config;
pub mod constants;
pub mod error;
pub mod logging;
pub mod monitor;
pub mod pending;
pub mod progress;
pub mod reporter;
pub mod scheduler;
pub mod session;
pub mod statistics;
pub mod summary;
pub mod window;

pub use config::Config;
pub use constants::*;
pub use error::{ClientError, Result};
pub use logging::init_logging_with_config;
pub use monitor::LatencyMonitor;
pub use pending::{PendingProbe, PendingTable};
pub use progress::LiveDisplay;
pub use reporter::Reporter;
pub use scheduler::{schedule, ScheduleHandle};
pub use session::{EchoOutcome, Session, SessionSettings, SessionSnapshot, SessionState};
pub use statistics::{Counters, Metrics, Quality, QualityThresholds};
pub use summary::RttSummary;
pub use window::SampleWindow;
