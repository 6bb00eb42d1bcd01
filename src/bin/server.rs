use anyhow::{Context, Result};
use clap::Parser;
use pingwatch::channel::Transport;
use pingwatch::client::init_logging_with_config;
use pingwatch::server::{ServerConfig, ServerError, ServerMonitor, TcpEchoServer, UdpEchoServer};
use tracing::{error, info};

fn main() {
    let config = ServerConfig::parse();

    init_logging_with_config(&config.log_level, config.is_json_format());

    if let Err(e) = config.validate() {
        error!(error = %e, "Invalid configuration");
        eprintln!("{}", e);
        std::process::exit(1);
    }

    if let Err(e) = run(config) {
        error!(error = %e, "Server failed");
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn explain_bind_error(e: ServerError) -> anyhow::Error {
    match e {
        ServerError::Bind { addr, source } if source.kind() == std::io::ErrorKind::AddrInUse => {
            anyhow::anyhow!(
                "Failed to bind to {}: Address already in use. Try a different port or ensure no other process is using it.",
                addr
            )
        }
        other => anyhow::Error::new(other),
    }
}

fn run(config: ServerConfig) -> Result<()> {
    let addr = config.address();

    let monitor = ServerMonitor::new(config.update_interval);
    let counters = monitor.counters();

    match config.transport {
        Transport::Udp => {
            let server = UdpEchoServer::bind(&addr).map_err(explain_bind_error)?;
            announce(&config, &monitor);
            server.serve(&counters).context("UDP echo loop failed")?;
        }
        Transport::Tcp => {
            let server = TcpEchoServer::bind(&addr).map_err(explain_bind_error)?;
            announce(&config, &monitor);
            server.serve(&counters).context("TCP accept loop failed")?;
        }
    }

    let stats = monitor.stats();
    info!(
        received = stats.received,
        echoed = stats.echoed,
        errors = stats.errors,
        uptime_secs = stats.elapsed.as_secs(),
        "Server stopped"
    );
    Ok(())
}

fn announce(config: &ServerConfig, monitor: &ServerMonitor) {
    info!(
        address = %config.address(),
        transport = %config.transport,
        update_interval_ms = config.update_interval,
        quiet_mode = config.quiet,
        "Pingwatch echo server listening"
    );

    if config.quiet {
        info!("Running in quiet mode (terminal UI disabled)");
    } else {
        monitor.start_display();
    }
    info!("Ready to echo probes...");
}
