//! devprov-core: shared types for the device provisioning workspace.
//!
//! Holds the factory record and history domain types, the identifier and
//! date validation helpers used before any storage access, and the
//! `devprov.toml` configuration parser.

pub mod config;
pub mod types;
pub mod validation;

pub use config::{DeviceCreationType, DevprovConfig, ProvisioningSettings};
pub use types::*;
pub use validation::ValidationError;
