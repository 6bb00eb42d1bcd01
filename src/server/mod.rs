//! Server module for the Pingwatch echo responder

pub mod config;
pub mod error;
pub mod listener;
pub mod monitor;
pub mod responder;

pub use config::ServerConfig;
pub use error::{Result, ServerError};
pub use listener::{TcpEchoServer, UdpEchoServer};
pub use monitor::{ServerCounters, ServerMonitor, ServerStats};
pub use responder::EchoResponder;
