//! pedal-mapper daemon
//!
//! Polls a USB foot pedal and replays configured key combinations on a
//! virtual keyboard.

mod device;
mod injector;
mod mapper;
mod poller;

use std::path::Path;

use anyhow::Result;
use clap::Parser;
use pedal_mapper_config::{Button, ConfigError, MapperSettings};
use tokio::signal::unix::{signal, SignalKind};
use tracing_subscriber::EnvFilter;

use crate::mapper::PedalMapper;

#[derive(Parser, Debug)]
#[command(name = "pedal-mapperd")]
#[command(about = "Map foot pedal buttons to keyboard shortcuts")]
#[command(version)]
struct Args {
    /// Default configuration file (required to exist)
    #[arg(long, default_value = pedal_mapper_config::DEFAULT_CONFIG_PATH)]
    default_config: String,

    /// User configuration file merged over the default (optional)
    #[arg(long, default_value = pedal_mapper_config::USER_CONFIG_PATH)]
    user_config: String,

    /// Validate the configuration and exit
    #[arg(long)]
    check: bool,

    /// List hidraw devices and exit
    #[arg(long)]
    list_devices: bool,
}

fn load_settings(default_path: &Path, user_path: &Path) -> Result<MapperSettings, ConfigError> {
    let config = pedal_mapper_config::load_layered(default_path, user_path)?;
    pedal_mapper_config::parse_mapping(&config)
}

fn print_summary(settings: &MapperSettings) {
    println!("Configuration is valid!");
    println!("  Polling rate: {:?}", settings.polling_rate);
    for button in Button::ALL {
        let combos = settings.mapping.combos(button);
        if combos.is_empty() {
            println!("  {}: (none)", button);
        } else {
            let combos: Vec<String> = combos.iter().map(ToString::to_string).collect();
            println!("  {}: {}", button, combos.join(", "));
        }
    }
}

fn list_devices() -> Result<()> {
    println!("Available hidraw devices:\n");

    for info in device::enumerate_devices()? {
        let marker = if info.is_pedal() { "  <- pedal" } else { "" };
        println!("  {}  {}{}", info.path.display(), info.vendor_product(), marker);
    }

    Ok(())
}

/// Resolves with the name of the first termination signal received
async fn wait_for_signal() -> std::io::Result<&'static str> {
    let mut sigterm = signal(SignalKind::terminate())?;

    tokio::select! {
        result = tokio::signal::ctrl_c() => result.map(|_| "SIGINT"),
        _ = sigterm.recv() => Ok("SIGTERM"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    if args.list_devices {
        return list_devices();
    }

    let default_path = pedal_mapper_config::expand_path(&args.default_config);
    let user_path = pedal_mapper_config::expand_path(&args.user_config);

    let settings = match load_settings(&default_path, &user_path) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("{:?}", miette::Report::new(e));
            std::process::exit(1);
        }
    };

    if args.check {
        print_summary(&settings);
        return Ok(());
    }

    let mapper = PedalMapper::open(settings)?;

    tracing::info!("pedal-mapper daemon started");
    mapper.run_until(wait_for_signal()).await?;

    tracing::info!("Shut down cleanly");
    Ok(())
}
