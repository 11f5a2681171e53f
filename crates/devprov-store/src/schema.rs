//! SQLite schema for the record store.
//!
//! The history table deliberately has no foreign key to `device_factory`:
//! snapshots outlive the record they describe. The association table does,
//! so an associated record cannot be deleted.

/// Device factory records.
pub const DEVICE_FACTORY: &str = "device_factory";

/// Append-only history snapshots.
pub const DEVICE_HISTORY: &str = "device_history";

/// Idempotent DDL applied on open.
pub const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS device_factory (
    id                    INTEGER PRIMARY KEY AUTOINCREMENT,
    imei                  TEXT,
    serial_number         TEXT    NOT NULL,
    package_serial_number TEXT,
    iccid                 TEXT,
    ssid                  TEXT,
    bssid                 TEXT,
    msisdn                TEXT,
    imsi                  TEXT,
    model                 TEXT    NOT NULL,
    platform_version      TEXT,
    device_type           TEXT,
    manufacturing_date    INTEGER NOT NULL,
    record_date           INTEGER NOT NULL,
    created_date          INTEGER NOT NULL,
    factory_admin         TEXT,
    state                 TEXT    NOT NULL DEFAULT 'PROVISIONED',
    is_stolen             INTEGER NOT NULL DEFAULT 0,
    is_faulty             INTEGER NOT NULL DEFAULT 0
);
CREATE INDEX IF NOT EXISTS idx_device_factory_imei ON device_factory(imei);
CREATE INDEX IF NOT EXISTS idx_device_factory_serial ON device_factory(serial_number);
CREATE INDEX IF NOT EXISTS idx_device_factory_state ON device_factory(state);

CREATE TABLE IF NOT EXISTS device_vin (
    factory_id INTEGER NOT NULL UNIQUE REFERENCES device_factory(id) ON DELETE CASCADE,
    vin        TEXT    NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS device_history (
    id                    INTEGER PRIMARY KEY AUTOINCREMENT,
    factory_id            INTEGER NOT NULL,
    action                TEXT    NOT NULL,
    created_at            INTEGER NOT NULL,
    imei                  TEXT,
    serial_number         TEXT    NOT NULL,
    package_serial_number TEXT,
    iccid                 TEXT,
    ssid                  TEXT,
    bssid                 TEXT,
    msisdn                TEXT,
    imsi                  TEXT,
    model                 TEXT    NOT NULL,
    platform_version      TEXT,
    device_type           TEXT,
    manufacturing_date    INTEGER NOT NULL,
    record_date           INTEGER NOT NULL,
    created_date          INTEGER NOT NULL,
    factory_admin         TEXT,
    state                 TEXT    NOT NULL,
    is_stolen             INTEGER NOT NULL,
    is_faulty             INTEGER NOT NULL,
    vin                   TEXT
);
CREATE INDEX IF NOT EXISTS idx_device_history_factory ON device_history(factory_id);

CREATE TABLE IF NOT EXISTS device_association (
    id                 INTEGER PRIMARY KEY AUTOINCREMENT,
    factory_id         INTEGER NOT NULL UNIQUE REFERENCES device_factory(id),
    harman_id          TEXT,
    association_status TEXT    NOT NULL
);
";

/// Record columns joined with the VIN, in [`crate::store`] row order.
pub const DEVICE_SELECT: &str = "
SELECT id, imei, serial_number, package_serial_number, iccid, ssid, bssid,
       msisdn, imsi, model, platform_version, device_type, manufacturing_date,
       record_date, created_date, factory_admin, state, is_stolen, is_faulty, vin
FROM device_factory
LEFT JOIN device_vin ON device_vin.factory_id = device_factory.id";

/// History columns, in [`crate::store`] row order.
pub const HISTORY_SELECT: &str = "
SELECT id, factory_id, action, created_at, imei, serial_number,
       package_serial_number, iccid, ssid, bssid, msisdn, imsi, model,
       platform_version, device_type, manufacturing_date, record_date,
       created_date, factory_admin, state, is_stolen, is_faulty, vin
FROM device_history";
