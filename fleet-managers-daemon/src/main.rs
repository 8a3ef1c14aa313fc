//! # fleet-managers
//!
//! One-shot front end for the manager resolution service.
//!
//! ```bash
//! # List known managers
//! fleet-managers
//!
//! # Fetch a sub-resource of a manager from its plugin
//! fleet-managers /redfish/v1/Managers/<uuid>:1 EthernetInterfaces
//!
//! # With debug logging
//! RUST_LOG=debug fleet-managers /redfish/v1/Managers/<uuid>:1 EthernetInterfaces
//! ```
//!
//! Configuration is read from `$XDG_CONFIG_HOME/fleet-managers/config.toml`.

use std::process::ExitCode;

use anyhow::Result;
use fleet_managers_core::ManagerError;
use fleet_managers_daemon::config::Config;
use fleet_managers_daemon::interface::{get_external_interface, ExternalInterface};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    // Load configuration from config.toml
    let (config, load_error) = match Config::load_default() {
        Ok(cfg) => (cfg, None),
        Err(e) => (Config::default(), Some(e)),
    };

    // Initialize logging; RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.service.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    info!("Starting fleet-managers v{}", env!("CARGO_PKG_VERSION"));
    match load_error {
        None => info!("Loaded configuration from default path"),
        Some(e) => info!("Failed to load config, using defaults: {:#}", e),
    }

    match run(&config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            match e.downcast_ref::<ManagerError>() {
                Some(err) => {
                    error!(kind = ?err.kind(), "{}", err);
                    eprintln!("error[{:?}]: {}", err.kind(), err);
                }
                None => {
                    error!("{:#}", e);
                    eprintln!("error: {:#}", e);
                }
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(config: &Config) -> Result<()> {
    let interface = get_external_interface(config)?;

    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.as_slice() {
        [] => list_managers(&interface, config).await,
        [manager_url] => fetch(&interface, manager_url, "").await,
        [manager_url, sub_resource] => fetch(&interface, manager_url, sub_resource).await,
        _ => anyhow::bail!("usage: fleet-managers [<manager-url> [<sub-resource>]]"),
    }
}

async fn fetch(interface: &ExternalInterface, manager_url: &str, sub_resource: &str) -> Result<()> {
    let body = interface
        .fetch_device_info(manager_url, sub_resource)
        .await?;
    println!("{}", body);
    Ok(())
}

async fn list_managers(interface: &ExternalInterface, config: &Config) -> Result<()> {
    let service_url = config.service_manager_url();
    let managers = interface.devices.list_managers().await?;
    info!("Found {} manager(s)", managers.len());

    for url in managers {
        if service_url.as_deref() == Some(url.as_str()) {
            println!("{} (service)", url);
        } else {
            println!("{}", url);
        }
    }
    Ok(())
}
