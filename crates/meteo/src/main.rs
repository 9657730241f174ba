//! ypmeteo
//!
//! Reads a Yocto-Meteo USB sensor and prints its temperature, humidity and
//! pressure at a fixed interval until interrupted.

use anyhow::{Context, Result};
use clap::Parser;
use common::setup_logging;
use meteo::{Driver, DriverMonitor, MeteoConfig, MeteoError, OutputSettings};
use std::path::PathBuf;
use std::time::Duration;
use tokio::signal;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "ypmeteo")]
#[command(author, version, about = "Read a Yocto-Meteo USB sensor")]
#[command(long_about = "
Connects to a Yocto-Meteo (USB 24e0:0018) and prints its readings as
temperature,humidity,pressure. The device is reconnected automatically
if it is unplugged.

EXAMPLES:
    # Print a reading every 10 seconds
    ypmeteo

    # One reading as JSON, give up if no sensor shows up within 30 seconds
    ypmeteo --once --json --timeout 30

    # Run with debug logging
    ypmeteo --log-level debug

CONFIGURATION:
    The configuration is looked up in the following order:
    1. Path specified with --config
    2. ~/.config/ypmeteo/meteo.toml
    3. /etc/ypmeteo/meteo.toml
    4. Built-in defaults
")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Save default configuration to default location and exit
    #[arg(long)]
    save_config: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, value_name = "LEVEL")]
    log_level: Option<String>,

    /// Give up if the sensor is not connected within this many seconds
    #[arg(short, long, value_name = "SECS")]
    timeout: Option<f64>,

    /// Seconds between two printed readings
    #[arg(short, long, value_name = "SECS")]
    interval: Option<f64>,

    /// Print a single reading and exit
    #[arg(long)]
    once: bool,

    /// Print readings as JSON
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Handle --save-config flag early (before loading config)
    if args.save_config {
        let config = MeteoConfig::default();
        let path = MeteoConfig::default_path();
        config.save(&path).context("Failed to save configuration")?;
        println!("Configuration saved to: {}", path.display());
        return Ok(());
    }

    let mut config = if let Some(ref path) = args.config {
        let path = path.to_string_lossy();
        meteo::config::load_config(&path).context("Failed to load configuration")?
    } else {
        MeteoConfig::load_or_default()
    };
    apply_args(&mut config, &args)?;

    // Use CLI log level if specified, otherwise use config value
    let log_level = args
        .log_level
        .as_deref()
        .unwrap_or(&config.logging.level);

    setup_logging(log_level).context("Failed to setup logging")?;

    info!("ypmeteo v{}", env!("CARGO_PKG_VERSION"));
    info!("Log level: {}", log_level);

    let driver = Driver::new(config.driver.clone());
    let monitor = driver.monitor();
    let startup = config.startup.clone();

    // Waiting for the device blocks, keep it off the runtime threads
    let mut start = tokio::task::spawn_blocking(move || driver.start_guarded(&startup));
    let started = tokio::select! {
        result = &mut start => result.context("Startup task failed")?,
        _ = signal::ctrl_c() => {
            info!("Received Ctrl+C while waiting for the sensor");
            monitor.request_stop();
            start.await.context("Startup task failed")?
        }
    };

    let guard = match started {
        Ok(guard) => guard,
        Err(MeteoError::Cancelled) => return Ok(()),
        Err(e) => return Err(e).context("Failed to connect to the sensor"),
    };

    let result = report(&monitor, &config.output, args.once).await;

    info!("Shutting down driver...");
    tokio::task::spawn_blocking(move || guard.finish())
        .await
        .context("Shutdown task failed")?
        .context("Driver did not stop cleanly")?;

    result
}

/// Fold command line overrides into the loaded configuration
fn apply_args(config: &mut MeteoConfig, args: &Args) -> Result<()> {
    if let Some(secs) = args.timeout {
        let timeout = Duration::try_from_secs_f64(secs).context("Invalid --timeout")?;
        config.startup.connect_timeout = Some(timeout);
    }
    if let Some(secs) = args.interval {
        config.output.interval = Duration::try_from_secs_f64(secs).context("Invalid --interval")?;
    }
    config.output.json |= args.json;

    config.validate()
}

/// Print readings every `output.interval` until Ctrl+C
async fn report(monitor: &DriverMonitor, output: &OutputSettings, once: bool) -> Result<()> {
    // The first values arrive only after the device settled
    let mut ticker = tokio::time::interval_at(Instant::now() + output.interval, output.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                print_reading(monitor, output.json)?;
                if once {
                    return Ok(());
                }
            }
            result = signal::ctrl_c() => {
                match result {
                    Ok(()) => info!("Received Ctrl+C, shutting down gracefully..."),
                    Err(e) => error!("Error waiting for Ctrl+C: {}", e),
                }
                return Ok(());
            }
        }
    }
}

fn print_reading(monitor: &DriverMonitor, json: bool) -> Result<()> {
    if json {
        let line = serde_json::to_string(&monitor.status()).context("Failed to encode reading")?;
        println!("{}", line);
    } else {
        println!("{}", monitor.envstr());
    }
    Ok(())
}
