//! Request-field to column mappings.
//!
//! Every column name that reaches SQL comes from one of these tables. They
//! are built once on first use and never mutated.

use std::collections::HashMap;
use std::sync::LazyLock;

/// How a filterable column is matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    /// Text column matched with `LIKE '%value%'`.
    Text,
    /// 0/1 flag column matched by equality on `true`/`false`.
    Flag,
}

/// A contains-like column a request field resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
    pub name: &'static str,
    pub kind: ColumnKind,
}

const fn text(name: &'static str) -> Column {
    Column {
        name,
        kind: ColumnKind::Text,
    }
}

const fn flag(name: &'static str) -> Column {
    Column {
        name,
        kind: ColumnKind::Flag,
    }
}

const CONTAINS_LIKE: [(&str, Column); 13] = [
    ("model", text("model")),
    ("imei", text("imei")),
    ("serialNumber", text("serial_number")),
    ("iccid", text("iccid")),
    ("ssid", text("ssid")),
    ("bssid", text("bssid")),
    ("msisdn", text("msisdn")),
    ("imsi", text("imsi")),
    ("factoryAdmin", text("factory_admin")),
    ("state", text("state")),
    ("isStolen", flag("is_stolen")),
    ("isFaulty", flag("is_faulty")),
    ("packageSerialNumber", text("package_serial_number")),
];

const RANGE: [(&str, &str); 3] = [
    ("manufacturingDate", "manufacturing_date"),
    ("recordDate", "record_date"),
    ("createdDate", "created_date"),
];

const DEVICE_SORT: [(&str, &str); 19] = [
    ("id", "id"),
    ("imei", "imei"),
    ("serialNumber", "serial_number"),
    ("packageSerialNumber", "package_serial_number"),
    ("iccid", "iccid"),
    ("ssid", "ssid"),
    ("bssid", "bssid"),
    ("msisdn", "msisdn"),
    ("imsi", "imsi"),
    ("model", "model"),
    ("platformVersion", "platform_version"),
    ("deviceType", "device_type"),
    ("manufacturingDate", "manufacturing_date"),
    ("recordDate", "record_date"),
    ("createdDate", "created_date"),
    ("factoryAdmin", "factory_admin"),
    ("state", "state"),
    ("isStolen", "is_stolen"),
    ("isFaulty", "is_faulty"),
];

const HISTORY_SORT: [(&str, &str); 10] = [
    ("id", "id"),
    ("factoryId", "factory_id"),
    ("imei", "imei"),
    ("serialNumber", "serial_number"),
    ("model", "model"),
    ("state", "state"),
    ("action", "action"),
    ("createdTimestamp", "created_at"),
    ("manufacturingDate", "manufacturing_date"),
    ("recordDate", "record_date"),
];

const DEVICE_ID_HISTORY_SORT: [(&str, &str); 3] = [
    ("createdTimestamp", "created_at"),
    ("action", "action"),
    ("state", "state"),
];

pub static CONTAINS_LIKE_COLUMNS: LazyLock<HashMap<&'static str, Column>> =
    LazyLock::new(|| HashMap::from(CONTAINS_LIKE));

/// Epoch-millisecond columns matched with `BETWEEN`.
pub static RANGE_COLUMNS: LazyLock<HashMap<&'static str, &'static str>> =
    LazyLock::new(|| HashMap::from(RANGE));

/// Sortable columns for device detail listings.
pub static DEVICE_SORT_COLUMNS: LazyLock<HashMap<&'static str, &'static str>> =
    LazyLock::new(|| HashMap::from(DEVICE_SORT));

/// Sortable columns for state history listings across devices.
pub static HISTORY_SORT_COLUMNS: LazyLock<HashMap<&'static str, &'static str>> =
    LazyLock::new(|| HashMap::from(HISTORY_SORT));

/// Sortable columns when the history listing is pinned to one device id.
pub static DEVICE_ID_HISTORY_SORT_COLUMNS: LazyLock<HashMap<&'static str, &'static str>> =
    LazyLock::new(|| HashMap::from(DEVICE_ID_HISTORY_SORT));
