//! `relayhub` command line.
//!
//! Drives relay cards directly (`info`, `get`, `set`) or runs the HTTP
//! service (`serve`).
//!
//! # Usage
//!
//! ```bash
//! relayhub info
//! relayhub set 3 on -s A9GXV5R9
//! relayhub get 3
//! relayhub serve -c /etc/relayhub.toml Lamp Pump
//! ```

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use relayhub_boards::RelayhubConfig;
use relayhub_core::constants::DEFAULT_CONFIG_FILE;
use relayhub_core::{RelayIndex, RelayState};
use relayhub_hardware::{DeviceHandle, DriverRegistry, ShadowCache};
use relayhub_network::{HttpServer, HttpServerConfig, Router};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

const NO_DEVICE: &str = "No compatible device detected.";
const PRIVILEGES_HINT: &str =
    "You might need root privileges or a udev rule granting access to the relay card.";

#[derive(Debug, Parser)]
#[command(name = "relayhub", version)]
#[command(about = "Control USB and GPIO relay cards", long_about = None)]
struct Cli {
    /// Configuration file
    #[arg(short, long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// List detected relay cards
    Info,

    /// Print the state of a relay
    Get {
        /// Relay number (1-16)
        relay: RelayIndex,

        /// Serial of the card to use (default: first detected)
        #[arg(short, long)]
        serial: Option<String>,
    },

    /// Switch a relay
    Set {
        /// Relay number (1-16)
        relay: RelayIndex,

        /// on, off or pulse
        state: RelayState,

        /// Serial of the card to use (default: first detected)
        #[arg(short, long)]
        serial: Option<String>,
    },

    /// List supported relay card families
    Families,

    /// Run the HTTP service
    Serve {
        /// Relay labels, overriding the first labels of the configuration
        labels: Vec<String>,
    },
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn registry(config: &RelayhubConfig) -> Result<DriverRegistry> {
    let registry = DriverRegistry::with_hardware(ShadowCache::new(), config.gpio.clone())
        .context("Invalid GPIO configuration")?;
    Ok(registry.with_pulse_duration(config.server.pulse_duration))
}

fn no_device() -> anyhow::Error {
    anyhow!("{NO_DEVICE}\n{PRIVILEGES_HINT}")
}

fn detect(registry: &DriverRegistry, serial: Option<&str>) -> Result<DeviceHandle> {
    registry.detect(serial).map_err(|e| {
        warn!(error = %e, "Detection failed");
        no_device()
    })
}

fn info_command(registry: &DriverRegistry) -> Result<()> {
    let inventory = registry.enumerate_all();
    if inventory.is_empty() {
        return Err(no_device());
    }
    for (i, device) in inventory.iter().enumerate() {
        println!(
            "#{} {} (serial {})",
            i + 1,
            registry.card_name(device.family),
            device.serial
        );
    }
    Ok(())
}

fn get_command(registry: &DriverRegistry, relay: RelayIndex, serial: Option<&str>) -> Result<()> {
    let device = detect(registry, serial)?;
    let state = registry.get_relay(&device, relay);
    registry.release(device);
    println!("Relay {relay} is {}", state.context("Cannot read relay")?);
    Ok(())
}

fn set_command(
    registry: &DriverRegistry,
    relay: RelayIndex,
    state: RelayState,
    serial: Option<&str>,
) -> Result<()> {
    let device = detect(registry, serial)?;
    let result = registry.set_relay(&device, relay, state);
    registry.release(device);
    result.with_context(|| format!("Cannot switch relay {relay} {state}"))
}

fn families_command(registry: &DriverRegistry) {
    for family in registry.families() {
        println!("{family}");
    }
}

/// Completes on Ctrl-C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Cannot listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}

async fn serve_command(mut config: RelayhubConfig, labels: &[String]) -> Result<()> {
    config.server.override_labels(labels);
    let registry = registry(&config)?;
    let server_config = HttpServerConfig::from(&config.server);

    let router = Router::from_config(registry, config);
    let server = HttpServer::bind(server_config, router)
        .await
        .inspect_err(|e| error!(error = %e, "HTTP server failed to start"))?;

    info!(addr = %server.local_addr()?, "relayhub ready");
    server.run_until(shutdown_signal()).await?;
    Ok(())
}

async fn run(cli: Cli) -> Result<()> {
    let config = RelayhubConfig::load_or_default(&cli.config);

    match cli.command {
        Commands::Info => info_command(&registry(&config)?),
        Commands::Get { relay, serial } => {
            get_command(&registry(&config)?, relay, serial.as_deref())
        }
        Commands::Set {
            relay,
            state,
            serial,
        } => set_command(&registry(&config)?, relay, state, serial.as_deref()),
        Commands::Families => {
            families_command(&registry(&config)?);
            Ok(())
        }
        Commands::Serve { labels } => serve_command(config, &labels).await,
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    init_logging();

    match run(Cli::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{e:#}");
            ExitCode::FAILURE
        }
    }
}
