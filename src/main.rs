// src/main.rs - Kiln controller host
mod clock;
mod config;
mod control;
mod gpio;
mod oven;
mod profile;
mod sensor;
mod thermocouple;
mod timer;
mod watcher;

#[cfg(test)]
mod integration_test;

use clap::Parser;
use clock::Clock;
use gpio::Gpio;
use profile::Profile;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thermocouple::Max31855;

#[derive(Debug, Parser)]
#[command(name = "kiln-host", about = "Electric kiln firing controller")]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(long)]
    config: PathBuf,

    /// Firing profile to run at startup (JSON schedule file).
    #[arg(long)]
    profile: Option<PathBuf>,

    /// Minutes into the schedule to start at.
    #[arg(long, default_value_t = 0.0)]
    start_at: f64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync + 'static>> {
    let args = Args::parse();

    let cfg = config::Config::load(&args.config).map_err(|e| {
        eprintln!("Failed to load config from '{}': {}", args.config.display(), e);
        Box::new(e) as Box<dyn std::error::Error + Send + Sync + 'static>
    })?;

    let level: tracing::Level = cfg.log_level.parse().unwrap_or(tracing::Level::INFO);
    tracing_subscriber::fmt().with_max_level(level).init();

    tracing::info!("Starting kiln controller");
    tracing::info!("Configuration loaded from: {}", args.config.display());

    let clock = Clock::new();
    let speed = if cfg.simulated { cfg.simulate.speed } else { 1.0 };

    let mut sensor = None;
    let oven = if cfg.simulated {
        tracing::info!(speed = cfg.simulate.speed, "running in simulation");
        oven::spawn_simulated(&cfg, clock.clone())
    } else {
        let gpio = platform_gpio()?;
        let thermocouple = Max31855::from_config(&cfg.thermocouple, cfg.temp_scale, gpio.clone())?;
        let handle = sensor::spawn(&cfg, thermocouple, clock.clone());
        sensor = Some(handle.clone());
        oven::spawn_real(&cfg, clock.clone(), gpio, handle)
    };

    let watcher = watcher::spawn(
        oven.clone(),
        Duration::from_secs_f64(cfg.sensor_time_wait / speed),
    );

    if let Some(path) = &args.profile {
        let json = std::fs::read_to_string(path).map_err(|e| {
            tracing::error!("Failed to read profile '{}': {}", path.display(), e);
            Box::new(e) as Box<dyn std::error::Error + Send + Sync + 'static>
        })?;
        let profile = Profile::from_json(&json)?;
        tracing::info!(
            profile = %profile.name,
            start_at_minutes = args.start_at,
            "starting schedule"
        );
        watcher.record(profile.clone());
        oven.run_profile(profile, args.start_at);
    }

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down");
    oven.shutdown();
    if let Some(sensor) = &sensor {
        sensor.shutdown();
    }
    watcher.shutdown();

    Ok(())
}

/// The control core only speaks to logical pins. A physical build links a
/// platform crate that implements `gpio::Gpio` for its register map and
/// returns it from here.
fn platform_gpio() -> Result<Arc<Mutex<dyn Gpio>>, Box<dyn std::error::Error + Send + Sync + 'static>>
{
    tracing::error!("no GPIO backend linked for physical operation");
    Err("physical mode requires a platform GPIO backend".into())
}
