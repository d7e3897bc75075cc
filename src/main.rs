//! NMEA 0183 / Seatalk instrument multiplexer.
//!
//! Usage:
//!   st-mux -c /etc/st-mux/config.json
//!   st-mux -c ./config.json --stderr   # log to stderr

mod config;
mod device;
mod error;
mod nmea;
mod queue;
mod seatalk;
mod settime;
mod state;
mod supervisor;
mod transport;
mod types;
mod watchdog;

use std::path::PathBuf;
use std::process;
use std::time::Duration;

use clap::Parser;
use log::{error, info};

use config::{DeviceConfig, DeviceKind, MuxConfig};
use device::DeviceCommon;
use error::Result;
use nmea::NmeaDevice;
use seatalk::SeatalkDevice;
use settime::SetTimeDevice;
use state::ShipState;
use supervisor::Supervisor;
use transport::Io;
use watchdog::ResetCounter;

// ── CLI ───────────────────────────────────────────────────────────────────────

#[derive(Debug, Parser)]
#[command(name = "st-mux", about = "NMEA 0183 / Seatalk instrument multiplexer")]
struct Cli {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config", default_value = "config.json")]
    config: PathBuf,

    /// Log to stderr instead of syslog (useful for debugging).
    #[arg(long)]
    stderr: bool,
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let cfg = match config::load_config(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("st-mux: config error: {e}");
            process::exit(1);
        }
    };
    if let Err(e) = config::validate_config(&cfg) {
        eprintln!("st-mux: config validation: {e}");
        process::exit(1);
    }

    let use_syslog = cfg.log_syslog && !cli.stderr;
    setup_logging(use_syslog).expect("failed to set up logging");

    info!("st-mux starting with {} devices", cfg.devices.len());

    let state = ShipState::new(Duration::from_secs(cfg.max_data_age));

    let counter = ResetCounter::new(&cfg.reset_counter_file);
    let resets = counter.load(cfg.watchdog.previous_resets);
    let mut supervisor = Supervisor::new(counter, resets);
    supervisor.arm_watchdog(&cfg.watchdog);

    let mut devices = Vec::new();
    for dev_cfg in &cfg.devices {
        match build_device(dev_cfg, &cfg, &state).await {
            Ok((device, tasks)) => {
                supervisor.add_tasks(&dev_cfg.name, tasks);
                devices.push(device);
            }
            Err(e) => {
                error!("{}: bootstrap failed: {e}", dev_cfg.name);
                eprintln!("st-mux: cannot bring up device {}: {e}", dev_cfg.name);
                process::exit(1);
            }
        }
    }

    tokio::select! {
        _ = supervisor.run() => unreachable!("supervisor loop never returns"),
        _ = tokio::signal::ctrl_c() => {
            info!("st-mux: shutdown signal received");
        }
    }

    for device in &devices {
        device.shutdown().await;
    }
    supervisor.shutdown();
    info!("st-mux: clean shutdown");
}

// ── Device construction ───────────────────────────────────────────────────────

enum Device {
    Nmea(NmeaDevice),
    Seatalk(SeatalkDevice),
    SetTime,
}

impl Device {
    async fn shutdown(&self) {
        match self {
            Device::Nmea(d) => d.shutdown().await,
            Device::Seatalk(d) => d.shutdown().await,
            Device::SetTime => {}
        }
    }
}

async fn build_device(
    dev_cfg: &DeviceConfig,
    cfg: &MuxConfig,
    state: &ShipState,
) -> Result<(Device, Vec<tokio::task::JoinHandle<()>>)> {
    let max_item_age = dev_cfg.max_item_age.map(Duration::from_secs);

    match dev_cfg.kind {
        DeviceKind::Nmea => {
            let io = Io::from_config(&dev_cfg.io)?;
            let common = DeviceCommon::new(
                dev_cfg.name.clone(),
                io,
                state.clone(),
                &cfg.log_dir,
                dev_cfg.auto_flush,
                max_item_age,
            )?;
            let device =
                NmeaDevice::new(common, max_item_age.unwrap_or(device::DEFAULT_MAX_ITEM_AGE));
            let tasks = device.start().await?;
            Ok((Device::Nmea(device), tasks))
        }
        DeviceKind::Seatalk => {
            let io = Io::from_config(&dev_cfg.io)?;
            let common = DeviceCommon::new(
                dev_cfg.name.clone(),
                io,
                state.clone(),
                &cfg.log_dir,
                dev_cfg.auto_flush,
                max_item_age,
            )?;
            let device =
                SeatalkDevice::new(common, max_item_age.unwrap_or(device::DEFAULT_MAX_ITEM_AGE));
            let tasks = device.start().await?;
            Ok((Device::Seatalk(device), tasks))
        }
        DeviceKind::SetTime => {
            let device = SetTimeDevice::new(dev_cfg.name.clone(), state.clone());
            let tasks = device.start();
            Ok((Device::SetTime, tasks))
        }
    }
}

// ── Logging setup ─────────────────────────────────────────────────────────────

fn setup_logging(use_syslog: bool) -> anyhow::Result<()> {
    if use_syslog {
        let formatter = syslog::Formatter3164 {
            facility: syslog::Facility::LOG_DAEMON,
            hostname: None,
            process:  "st-mux".into(),
            pid:      process::id(),
        };
        let logger = syslog::unix(formatter)
            .map_err(|e| anyhow::anyhow!("syslog connect failed: {e}"))?;
        log::set_boxed_logger(Box::new(syslog::BasicLogger::new(logger)))
            .map(|()| log::set_max_level(log::LevelFilter::Info))
            .map_err(|e| anyhow::anyhow!("set_logger: {e}"))?;
    } else {
        env_logger::Builder::from_default_env()
            .filter_level(log::LevelFilter::Debug)
            .init();
    }
    Ok(())
}

// ── End-to-end bridging scenarios ─────────────────────────────────────────────
