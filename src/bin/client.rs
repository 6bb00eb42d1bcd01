use anyhow::{Context, Result};
use clap::Parser;
use pingwatch::channel;
use pingwatch::client::{
    init_logging_with_config, schedule, Config, LatencyMonitor, LiveDisplay, Reporter,
    LIVE_STATS_UPDATE_INTERVAL_MS, PRESET_PING_INTERVALS_MS,
};
use std::io::BufRead;
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

fn main() {
    let config = Config::parse();

    init_logging_with_config(&config.log_level, config.is_json_format());

    if let Err(e) = config.validate() {
        error!(error = %e, "Invalid configuration");
        eprintln!("{}", e);
        std::process::exit(1);
    }

    if let Err(e) = run(config) {
        error!(error = %e, "Client failed");
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

/// Reads commands from stdin: a number changes the ping interval, `q` quits.
fn spawn_command_reader(monitor: Arc<LatencyMonitor>) {
    let reader = move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            let command = line.trim();
            match command {
                "" => {}
                "q" | "quit" => {
                    info!("Quit requested");
                    monitor.disconnect();
                    break;
                }
                _ => match command.parse::<u64>() {
                    Ok(interval_ms) => {
                        if let Err(e) = monitor.set_interval(interval_ms) {
                            warn!(error = %e, "Interval change rejected");
                        }
                    }
                    Err(_) => warn!(
                        input = command,
                        presets = ?PRESET_PING_INTERVALS_MS,
                        "Expected a ping interval in milliseconds or 'q'"
                    ),
                },
            }
        }
    };

    if let Err(e) = thread::Builder::new().name("commands".into()).spawn(reader) {
        warn!(error = %e, "Interactive commands unavailable");
    }
}

fn run(config: Config) -> Result<()> {
    let (events_tx, events_rx) = mpsc::channel();
    let channel = channel::open(config.transport, &config.server, events_tx);
    let monitor = Arc::new(LatencyMonitor::new(channel, config.session_settings())?);

    info!(
        server = %config.server,
        transport = %config.transport,
        interval_ms = config.interval_ms,
        preset = config.is_preset_interval(),
        window = config.window,
        loss_timeout_factor = config.loss_timeout_factor,
        "Starting latency monitor"
    );

    monitor
        .connect()
        .with_context(|| format!("Failed to connect to {}", config.server))?;

    let display = LiveDisplay::new(config.quiet)?;
    let refresher = {
        let monitor = Arc::clone(&monitor);
        let display = display.clone();
        schedule(
            "live-display",
            Duration::from_millis(LIVE_STATS_UPDATE_INTERVAL_MS),
            true,
            move || display.update(&monitor.snapshot()),
        )?
    };

    if !config.quiet {
        println!("Type a ping interval in ms to change it, or 'q' to stop.");
    }
    spawn_command_reader(Arc::clone(&monitor));

    let started = Instant::now();
    monitor.run(&events_rx, config.duration().map(|d| started + d));

    refresher.cancel();
    monitor.disconnect();
    display.finish();

    Reporter.print_results(&monitor.snapshot(), &monitor.summary(), started.elapsed());
    Ok(())
}
