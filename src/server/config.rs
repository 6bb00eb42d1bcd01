//! Server configuration module
//!
//! Provides CLI argument parsing and validation for the echo server.

use crate::channel::Transport;
use crate::server::error::{Result, ServerError};
use clap::Parser;
use tracing::debug;

#[derive(Parser, Debug, Clone)]
#[command(name = "pingwatch-server")]
#[command(about = "Echo responder for pingwatch latency probes")]
pub struct ServerConfig {
    /// Bind address
    #[arg(long, default_value = "0.0.0.0")]
    pub bind: String,

    /// Bind port
    #[arg(long, default_value_t = 8080)]
    pub port: u16,

    /// Transport to accept probes on
    #[arg(long, value_enum, default_value_t = Transport::Udp)]
    pub transport: Transport,

    /// Status line update interval in milliseconds
    #[arg(long, default_value_t = 250)]
    pub update_interval: u64,

    /// Disable terminal UI (useful for Docker/systemd/non-interactive environments)
    #[arg(long)]
    pub quiet: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Log format (text or json)
    #[arg(long, default_value = "text", value_parser = ["text", "json"])]
    pub log_format: String,
}

impl ServerConfig {
    /// Returns the full bind address as a string (bind:port)
    pub fn address(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }

    /// Validates the configuration values
    pub fn validate(&self) -> Result<()> {
        debug!("Validating server configuration");

        if self.port == 0 {
            return Err(ServerError::Config("port must be > 0".into()));
        }
        if self.update_interval == 0 {
            return Err(ServerError::Config("update_interval must be > 0".into()));
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(ServerError::Config(format!(
                "log_level must be one of: {}",
                valid_levels.join(", ")
            )));
        }

        debug!("Server configuration validated successfully");
        Ok(())
    }

    /// Returns true if JSON format logging is enabled
    pub fn is_json_format(&self) -> bool {
        self.log_format.to_lowercase() == "json"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> ServerConfig {
        ServerConfig::parse_from(["pingwatch-server"])
    }

    #[test]
    fn test_default_config() {
        let config = base();
        assert_eq!(config.address(), "0.0.0.0:8080");
        assert_eq!(config.transport, Transport::Udp);
        assert!(!config.is_json_format());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_custom_config() {
        let config = ServerConfig::parse_from([
            "pingwatch-server",
            "--bind",
            "127.0.0.1",
            "--port",
            "9000",
            "--transport",
            "tcp",
            "--quiet",
            "--log-format",
            "json",
        ]);

        assert_eq!(config.address(), "127.0.0.1:9000");
        assert_eq!(config.transport, Transport::Tcp);
        assert!(config.quiet);
        assert!(config.is_json_format());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_port() {
        let config = ServerConfig { port: 0, ..base() };
        assert!(matches!(config.validate(), Err(ServerError::Config(_))));
    }

    #[test]
    fn test_invalid_update_interval() {
        let config = ServerConfig {
            update_interval: 0,
            ..base()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_log_level() {
        let config = ServerConfig {
            log_level: "invalid".to_string(),
            ..base()
        };
        assert!(config.validate().is_err());
    }
}
