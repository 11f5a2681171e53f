//! devprov.toml configuration parser.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DevprovConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub provisioning: ProvisioningSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite database file.
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("devprov.db"),
        }
    }
}

/// How devices enter the system. Only `SwmIntegration` turns on update VIN checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceCreationType {
    #[default]
    Default,
    GuestUser,
    SwmIntegration,
}

/// Flags consulted by the lifecycle service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProvisioningSettings {
    #[serde(default)]
    pub creation_type: DeviceCreationType,
    /// Mirror updates and deletes into the external vehicle system.
    #[serde(default)]
    pub swm_integration_enabled: bool,
}

impl ProvisioningSettings {
    /// Whether updates are checked against, and may replace, the VIN on file.
    pub fn vin_checks_enabled(&self) -> bool {
        self.creation_type == DeviceCreationType::SwmIntegration
    }
}

impl DevprovConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: DevprovConfig = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Scaffold a config pointing at the given database file.
    pub fn scaffold(db_path: &Path) -> Self {
        DevprovConfig {
            database: DatabaseConfig {
                path: db_path.to_path_buf(),
            },
            provisioning: ProvisioningSettings::default(),
        }
    }
}
