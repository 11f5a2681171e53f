pub mod device;
pub mod init;
pub mod listing;

use std::path::Path;

use anyhow::{Context, bail};
use devprov_core::DevprovConfig;
use devprov_lifecycle::LifecycleService;
use devprov_store::RecordStore;
use serde::Serialize;
use tracing::debug;

/// Load the config (defaults when the file is absent) and open the store.
pub fn open_service(config_path: &Path) -> anyhow::Result<LifecycleService> {
    let config = if config_path.exists() {
        DevprovConfig::from_file(config_path)
            .with_context(|| format!("reading {}", config_path.display()))?
    } else {
        debug!(path = %config_path.display(), "no config file, using defaults");
        DevprovConfig::default()
    };
    if config.provisioning.swm_integration_enabled {
        bail!("swm_integration_enabled requires a vehicle sync client, which the CLI does not provide");
    }

    let store = RecordStore::open(&config.database.path)
        .with_context(|| format!("opening {}", config.database.path.display()))?;
    Ok(LifecycleService::new(store, config.provisioning))
}

/// Parse a `key=value` listing parameter.
pub fn parse_param(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{raw}'"))?;
    if key.trim().is_empty() {
        return Err(format!("empty parameter name in '{raw}'"));
    }
    Ok((key.trim().to_string(), value.to_string()))
}

pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
