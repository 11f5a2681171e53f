//! Domain types for device factory provisioning.
//!
//! These types describe the persisted factory records, the append-only
//! history snapshots written on every state-changing action, and the raw
//! input payloads accepted by the lifecycle service. All types serialize
//! with camelCase field names.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Primary key of a factory record.
pub type FactoryId = i64;

// ── Device state ───────────────────────────────────────────────────

/// Lifecycle state stored in the `state` column of a factory record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeviceState {
    Provisioned,
    Active,
    Stolen,
    Faulty,
    ReadyToActivate,
    Deactivated,
    ProvisionedAlive,
}

impl DeviceState {
    /// Every state, in declaration order.
    pub const ALL: [DeviceState; 7] = [
        DeviceState::Provisioned,
        DeviceState::Active,
        DeviceState::Stolen,
        DeviceState::Faulty,
        DeviceState::ReadyToActivate,
        DeviceState::Deactivated,
        DeviceState::ProvisionedAlive,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceState::Provisioned => "PROVISIONED",
            DeviceState::Active => "ACTIVE",
            DeviceState::Stolen => "STOLEN",
            DeviceState::Faulty => "FAULTY",
            DeviceState::ReadyToActivate => "READY_TO_ACTIVATE",
            DeviceState::Deactivated => "DEACTIVATED",
            DeviceState::ProvisionedAlive => "PROVISIONED_ALIVE",
        }
    }
}

impl fmt::Display for DeviceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stored state string that names no known [`DeviceState`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown device state: {0}")]
pub struct UnknownStateError(pub String);

impl FromStr for DeviceState {
    type Err = UnknownStateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DeviceState::ALL
            .into_iter()
            .find(|state| state.as_str() == s)
            .ok_or_else(|| UnknownStateError(s.to_string()))
    }
}

/// Action tag attached to every history snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HistoryAction {
    Provisioned,
    Updated,
    Deactivated,
}

impl HistoryAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            HistoryAction::Provisioned => "PROVISIONED",
            HistoryAction::Updated => "UPDATED",
            HistoryAction::Deactivated => "DEACTIVATED",
        }
    }
}

impl fmt::Display for HistoryAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HistoryAction {
    type Err = UnknownStateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PROVISIONED" => Ok(HistoryAction::Provisioned),
            "UPDATED" => Ok(HistoryAction::Updated),
            "DEACTIVATED" => Ok(HistoryAction::Deactivated),
            other => Err(UnknownStateError(other.to_string())),
        }
    }
}

// ── Factory record ─────────────────────────────────────────────────

/// One row of the device factory table, joined with its VIN (if any).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceFactoryRecord {
    pub id: FactoryId,
    pub imei: Option<String>,
    pub serial_number: String,
    pub package_serial_number: Option<String>,
    pub iccid: Option<String>,
    pub ssid: Option<String>,
    pub bssid: Option<String>,
    pub msisdn: Option<String>,
    pub imsi: Option<String>,
    pub model: String,
    pub platform_version: Option<String>,
    pub device_type: Option<String>,
    /// Epoch milliseconds (UTC midnight of the factory date).
    pub manufacturing_date: i64,
    /// Epoch milliseconds (UTC midnight of the factory date).
    pub record_date: i64,
    /// Epoch milliseconds when the row was inserted.
    pub created_date: i64,
    pub factory_admin: Option<String>,
    /// Raw state column. Parse through the state machine, never directly.
    pub state: String,
    pub stolen: bool,
    pub faulty: bool,
    pub vin: Option<String>,
}

/// Validated column values for inserting or overwriting a factory record.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DeviceFields {
    pub imei: Option<String>,
    pub serial_number: String,
    pub package_serial_number: Option<String>,
    pub iccid: Option<String>,
    pub ssid: Option<String>,
    pub bssid: Option<String>,
    pub msisdn: Option<String>,
    pub imsi: Option<String>,
    pub model: String,
    pub platform_version: Option<String>,
    pub device_type: Option<String>,
    pub manufacturing_date: i64,
    pub record_date: i64,
}

/// Raw create request for a single device, as supplied by the factory.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NewDeviceRecord {
    pub imei: Option<String>,
    pub serial_number: Option<String>,
    pub package_serial_number: Option<String>,
    pub iccid: Option<String>,
    pub ssid: Option<String>,
    pub bssid: Option<String>,
    pub msisdn: Option<String>,
    pub imsi: Option<String>,
    pub model: Option<String>,
    pub platform_version: Option<String>,
    pub device_type: Option<String>,
    /// `yyyy/MM/dd`
    pub manufacturing_date: Option<String>,
    /// `yyyy/MM/dd`
    pub record_date: Option<String>,
    pub vin: Option<String>,
}

/// One side of an update request: either the values currently on file or
/// the values that replace them.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DeviceUpdatePayload {
    pub imei: Option<String>,
    pub serial_number: Option<String>,
    pub package_serial_number: Option<String>,
    pub iccid: Option<String>,
    pub ssid: Option<String>,
    pub bssid: Option<String>,
    pub msisdn: Option<String>,
    pub imsi: Option<String>,
    pub model: Option<String>,
    pub platform_version: Option<String>,
    pub device_type: Option<String>,
    pub manufacturing_date: Option<String>,
    pub record_date: Option<String>,
    pub vin: Option<String>,
    pub chassis_number: Option<String>,
    pub production_week: Option<String>,
    pub plant: Option<String>,
    pub model_year: Option<String>,
}

// ── History ────────────────────────────────────────────────────────

/// Immutable snapshot of a factory record taken when an action completed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceHistoryEntry {
    pub id: i64,
    pub factory_id: FactoryId,
    pub action: HistoryAction,
    /// Epoch milliseconds when the snapshot was written.
    pub created_at: i64,
    /// Record as it looked at `created_at`. `device.id` equals `factory_id`.
    pub device: DeviceFactoryRecord,
}

// ── Associations ───────────────────────────────────────────────────

/// External association of a factory record with a platform device id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceAssociation {
    pub factory_id: FactoryId,
    /// External (harman) device id. Blank until the device is associated.
    pub harman_id: Option<String>,
    pub association_status: String,
}

impl DeviceAssociation {
    /// Whether the association carries a usable external id.
    pub fn has_external_id(&self) -> bool {
        self.harman_id
            .as_deref()
            .is_some_and(|id| !id.trim().is_empty())
    }
}

// ── Listings ───────────────────────────────────────────────────────

/// Device count per known lifecycle bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateCounts {
    pub provisioned: u64,
    pub active: u64,
    pub stolen: u64,
    pub faulty: u64,
}

impl StateCounts {
    /// Add `count` to the bucket named by `state`.
    ///
    /// Returns false (and changes nothing) for states outside the four
    /// tracked buckets.
    pub fn record(&mut self, state: &str, count: u64) -> bool {
        let bucket = match state.parse::<DeviceState>() {
            Ok(DeviceState::Provisioned) => &mut self.provisioned,
            Ok(DeviceState::Active) => &mut self.active,
            Ok(DeviceState::Stolen) => &mut self.stolen,
            Ok(DeviceState::Faulty) => &mut self.faulty,
            _ => return false,
        };
        *bucket += count;
        true
    }
}

/// One page of a device listing plus the aggregate over the whole match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceListing {
    pub total: u64,
    pub page: u32,
    pub size: u32,
    pub counts: StateCounts,
    /// Empty unless details were requested.
    pub devices: Vec<DeviceFactoryRecord>,
}

/// One page of history snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryListing {
    pub total: u64,
    pub page: u32,
    pub size: u32,
    /// Empty unless details were requested.
    pub entries: Vec<DeviceHistoryEntry>,
}

/// Current wall-clock time in epoch milliseconds.
pub fn now_millis() -> i64 {
    let nanos = time::OffsetDateTime::now_utc().unix_timestamp_nanos();
    i64::try_from(nanos / 1_000_000).unwrap_or(i64::MAX)
}
