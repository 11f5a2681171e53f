//! RecordStore: SQLite-backed persistence for device factory records.
//!
//! Provides typed operations over the factory, VIN, history and
//! association tables. The store supports both on-disk and in-memory
//! backends (the latter for testing).

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use devprov_core::{
    now_millis, DeviceAssociation, DeviceFactoryRecord, DeviceFields, DeviceHistoryEntry,
    DeviceListing, DeviceState, FactoryId, HistoryAction, HistoryListing, StateCounts,
};
use rusqlite::types::Type;
use rusqlite::{params, params_from_iter, Connection, ErrorCode, OptionalExtension, Row};
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::query::{ListQuery, QueryError, WhereClause};
use crate::schema::*;

/// Convert any `Display` error into a `StoreError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| StoreError::$variant(e.to_string())
    };
}

/// Map a failed write, keeping constraint violations distinct.
fn write_err(e: rusqlite::Error) -> StoreError {
    match &e {
        rusqlite::Error::SqliteFailure(failure, _)
            if failure.code == ErrorCode::ConstraintViolation =>
        {
            StoreError::Constraint(e.to_string())
        }
        _ => StoreError::Write(e.to_string()),
    }
}

/// Predicate shared by every write that requires an untouched, provisioned record.
const PROVISIONED_ONLY: &str = "state = 'PROVISIONED' AND is_stolen = 0 AND is_faulty = 0";

/// Thread-safe record store backed by SQLite.
#[derive(Clone)]
pub struct RecordStore {
    conn: Arc<Mutex<Connection>>,
}

impl RecordStore {
    /// Open (or create) a persistent record store at the given path.
    pub fn open(path: &Path) -> StoreResult<Self> {
        let conn = Connection::open(path).map_err(map_err!(Open))?;
        conn.busy_timeout(Duration::from_secs(5))
            .map_err(map_err!(Open))?;
        conn.query_row("PRAGMA journal_mode=WAL;", [], |_| Ok(()))
            .map_err(map_err!(Open))?;
        let store = Self::from_connection(conn)?;
        debug!(?path, "record store opened");
        Ok(store)
    }

    /// Create an ephemeral in-memory record store (for testing).
    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory().map_err(map_err!(Open))?;
        let store = Self::from_connection(conn)?;
        debug!("in-memory record store opened");
        Ok(store)
    }

    fn from_connection(conn: Connection) -> StoreResult<Self> {
        conn.execute_batch("PRAGMA foreign_keys=ON;")
            .map_err(map_err!(Open))?;
        conn.execute_batch(SCHEMA).map_err(map_err!(Schema))?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn conn(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Transaction("connection lock poisoned".to_string()))
    }

    // ── Records ────────────────────────────────────────────────────

    /// Insert a record in `PROVISIONED` state with its VIN and a
    /// `PROVISIONED` history snapshot, all in one transaction.
    pub fn insert_device(
        &self,
        fields: &DeviceFields,
        vin: Option<&str>,
        factory_admin: Option<&str>,
    ) -> StoreResult<DeviceFactoryRecord> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(map_err!(Transaction))?;
        tx.execute(
            "INSERT INTO device_factory (
                imei, serial_number, package_serial_number, iccid, ssid, bssid,
                msisdn, imsi, model, platform_version, device_type,
                manufacturing_date, record_date, created_date, factory_admin, state
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
            params![
                fields.imei,
                fields.serial_number,
                fields.package_serial_number,
                fields.iccid,
                fields.ssid,
                fields.bssid,
                fields.msisdn,
                fields.imsi,
                fields.model,
                fields.platform_version,
                fields.device_type,
                fields.manufacturing_date,
                fields.record_date,
                now_millis(),
                factory_admin,
                DeviceState::Provisioned.as_str(),
            ],
        )
        .map_err(write_err)?;
        let id = tx.last_insert_rowid();

        if let Some(vin) = vin {
            tx.execute(
                "INSERT INTO device_vin (factory_id, vin) VALUES (?1, ?2)",
                params![id, vin],
            )
            .map_err(write_err)?;
        }

        let record = select_device(&tx, id)?
            .ok_or_else(|| StoreError::NotFound(format!("inserted device {id}")))?;
        insert_history(&tx, &record, HistoryAction::Provisioned)?;
        tx.commit().map_err(map_err!(Transaction))?;
        debug!(id, serial = %record.serial_number, "device inserted");
        Ok(record)
    }

    /// Get a record by primary key.
    pub fn get_device(&self, id: FactoryId) -> StoreResult<Option<DeviceFactoryRecord>> {
        let conn = self.conn()?;
        select_device(&conn, id)
    }

    /// Get a record by primary key only if its imei also matches.
    pub fn find_by_id_and_imei(
        &self,
        id: FactoryId,
        imei: &str,
    ) -> StoreResult<Option<DeviceFactoryRecord>> {
        let conn = self.conn()?;
        conn.query_row(
            &format!("{DEVICE_SELECT} WHERE id = ?1 AND imei = ?2"),
            params![id, imei],
            device_from_row,
        )
        .optional()
        .map_err(map_err!(Read))
    }

    /// Get the lowest-id record carrying the given imei.
    pub fn find_by_imei(&self, imei: &str) -> StoreResult<Option<DeviceFactoryRecord>> {
        let conn = self.conn()?;
        conn.query_row(
            &format!("{DEVICE_SELECT} WHERE imei = ?1 ORDER BY id ASC LIMIT 1"),
            params![imei],
            device_from_row,
        )
        .optional()
        .map_err(map_err!(Read))
    }

    /// List records matching the supplied identifiers (absent ones match anything).
    pub fn find_devices(
        &self,
        imei: Option<&str>,
        serial_number: Option<&str>,
    ) -> StoreResult<Vec<DeviceFactoryRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(&format!(
                "{DEVICE_SELECT}
                 WHERE (?1 IS NULL OR imei = ?1) AND (?2 IS NULL OR serial_number = ?2)
                 ORDER BY id ASC"
            ))
            .map_err(map_err!(Read))?;
        let rows = stmt
            .query_map(params![imei, serial_number], device_from_row)
            .map_err(map_err!(Read))?;
        rows.collect::<Result<Vec<_>, _>>().map_err(map_err!(Read))
    }

    /// Find the record whose columns equal `fields`.
    ///
    /// `device_type` is never compared; `package_serial_number` only when
    /// `fields` carries one.
    pub fn find_matching(&self, fields: &DeviceFields) -> StoreResult<Option<DeviceFactoryRecord>> {
        let conn = self.conn()?;
        conn.query_row(
            &format!(
                "{DEVICE_SELECT}
                 WHERE imei IS ?1 AND serial_number = ?2
                   AND (?3 IS NULL OR package_serial_number = ?3)
                   AND iccid IS ?4 AND ssid IS ?5 AND bssid IS ?6 AND msisdn IS ?7
                   AND imsi IS ?8 AND model = ?9 AND platform_version IS ?10
                   AND manufacturing_date = ?11 AND record_date = ?12
                 ORDER BY id ASC LIMIT 1"
            ),
            params![
                fields.imei,
                fields.serial_number,
                fields.package_serial_number,
                fields.iccid,
                fields.ssid,
                fields.bssid,
                fields.msisdn,
                fields.imsi,
                fields.model,
                fields.platform_version,
                fields.manufacturing_date,
                fields.record_date,
            ],
            device_from_row,
        )
        .optional()
        .map_err(map_err!(Read))
    }

    /// Persist a state change and its `UPDATED` snapshot.
    ///
    /// The write only applies while the row still carries the state and
    /// flags observed in `current`.
    pub fn set_state(
        &self,
        current: &DeviceFactoryRecord,
        state: DeviceState,
        stolen: bool,
        faulty: bool,
    ) -> StoreResult<DeviceFactoryRecord> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(map_err!(Transaction))?;
        let changed = tx
            .execute(
                "UPDATE device_factory SET state = ?1, is_stolen = ?2, is_faulty = ?3
                 WHERE id = ?4 AND state = ?5 AND is_stolen = ?6 AND is_faulty = ?7",
                params![
                    state.as_str(),
                    stolen,
                    faulty,
                    current.id,
                    current.state,
                    current.stolen,
                    current.faulty,
                ],
            )
            .map_err(write_err)?;
        if changed == 0 {
            return Err(StoreError::Precondition {
                id: current.id,
                expected: current.state.clone(),
            });
        }
        let record = select_device(&tx, current.id)?
            .ok_or_else(|| StoreError::NotFound(format!("device {}", current.id)))?;
        insert_history(&tx, &record, HistoryAction::Updated)?;
        tx.commit().map_err(map_err!(Transaction))?;
        debug!(id = current.id, from = %current.state, to = %state, "device state changed");
        Ok(record)
    }

    /// Overwrite a provisioned record's fields, optionally replace its VIN,
    /// and append an `UPDATED` snapshot.
    pub fn update_device(
        &self,
        id: FactoryId,
        fields: &DeviceFields,
        new_vin: Option<&str>,
    ) -> StoreResult<DeviceFactoryRecord> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(map_err!(Transaction))?;
        let changed = tx
            .execute(
                &format!(
                    "UPDATE device_factory SET
                        imei = ?1, serial_number = ?2, package_serial_number = ?3,
                        iccid = ?4, ssid = ?5, bssid = ?6, msisdn = ?7, imsi = ?8,
                        model = ?9, platform_version = ?10, device_type = ?11,
                        manufacturing_date = ?12, record_date = ?13
                     WHERE id = ?14 AND {PROVISIONED_ONLY}"
                ),
                params![
                    fields.imei,
                    fields.serial_number,
                    fields.package_serial_number,
                    fields.iccid,
                    fields.ssid,
                    fields.bssid,
                    fields.msisdn,
                    fields.imsi,
                    fields.model,
                    fields.platform_version,
                    fields.device_type,
                    fields.manufacturing_date,
                    fields.record_date,
                    id,
                ],
            )
            .map_err(write_err)?;
        if changed == 0 {
            return Err(StoreError::Precondition {
                id,
                expected: DeviceState::Provisioned.to_string(),
            });
        }

        if let Some(vin) = new_vin {
            tx.execute(
                "INSERT INTO device_vin (factory_id, vin) VALUES (?1, ?2)
                 ON CONFLICT(factory_id) DO UPDATE SET vin = excluded.vin",
                params![id, vin],
            )
            .map_err(write_err)?;
        }

        let record = select_device(&tx, id)?
            .ok_or_else(|| StoreError::NotFound(format!("device {id}")))?;
        insert_history(&tx, &record, HistoryAction::Updated)?;
        tx.commit().map_err(map_err!(Transaction))?;
        debug!(id, vin_replaced = new_vin.is_some(), "device updated");
        Ok(record)
    }

    /// Delete provisioned records, writing a `DEACTIVATED` snapshot of each.
    ///
    /// All-or-nothing: if any record is no longer provisioned, or a
    /// constraint rejects a delete, nothing is removed.
    pub fn delete_provisioned(
        &self,
        records: &[DeviceFactoryRecord],
    ) -> StoreResult<Vec<DeviceHistoryEntry>> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(map_err!(Transaction))?;
        let mut entries = Vec::with_capacity(records.len());
        for record in records {
            let deleted = tx
                .execute(
                    &format!("DELETE FROM device_factory WHERE id = ?1 AND {PROVISIONED_ONLY}"),
                    params![record.id],
                )
                .map_err(write_err)?;
            if deleted == 0 {
                return Err(StoreError::Precondition {
                    id: record.id,
                    expected: DeviceState::Provisioned.to_string(),
                });
            }
            let entry_id = insert_history(&tx, record, HistoryAction::Deactivated)?;
            entries.push(entry_id);
        }
        let entries = entries
            .into_iter()
            .map(|entry_id| select_history_entry(&tx, entry_id))
            .collect::<StoreResult<Vec<_>>>()?;
        tx.commit().map_err(map_err!(Transaction))?;
        debug!(count = entries.len(), "devices deleted");
        Ok(entries)
    }

    // ── VINs ───────────────────────────────────────────────────────

    /// Record that owns a VIN, if any.
    pub fn find_by_vin(&self, vin: &str) -> StoreResult<Option<FactoryId>> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT factory_id FROM device_vin WHERE vin = ?1",
            params![vin],
            |row| row.get(0),
        )
        .optional()
        .map_err(map_err!(Read))
    }

    // ── History ────────────────────────────────────────────────────

    /// All snapshots for a record, oldest first.
    pub fn history_for(&self, factory_id: FactoryId) -> StoreResult<Vec<DeviceHistoryEntry>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(&format!(
                "{HISTORY_SELECT} WHERE factory_id = ?1 ORDER BY created_at ASC, id ASC"
            ))
            .map_err(map_err!(Read))?;
        let rows = stmt
            .query_map(params![factory_id], history_from_row)
            .map_err(map_err!(Read))?;
        rows.collect::<Result<Vec<_>, _>>().map_err(map_err!(Read))
    }

    // ── Associations ───────────────────────────────────────────────

    /// Insert or replace the association row for a record.
    pub fn put_association(&self, association: &DeviceAssociation) -> StoreResult<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO device_association (factory_id, harman_id, association_status)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(factory_id) DO UPDATE SET
                harman_id = excluded.harman_id,
                association_status = excluded.association_status",
            params![
                association.factory_id,
                association.harman_id,
                association.association_status,
            ],
        )
        .map_err(write_err)?;
        debug!(factory_id = association.factory_id, "association stored");
        Ok(())
    }

    /// Association row for a record, if any.
    pub fn get_association(&self, factory_id: FactoryId) -> StoreResult<Option<DeviceAssociation>> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT factory_id, harman_id, association_status
             FROM device_association WHERE factory_id = ?1",
            params![factory_id],
            |row| {
                Ok(DeviceAssociation {
                    factory_id: row.get(0)?,
                    harman_id: row.get(1)?,
                    association_status: row.get(2)?,
                })
            },
        )
        .optional()
        .map_err(map_err!(Read))
    }

    // ── Listings ───────────────────────────────────────────────────

    /// Run a validated device listing.
    ///
    /// The total is computed first; a filtered listing that matches nothing
    /// fails with [`QueryError::NoMatch`]. Rows are only fetched when
    /// details were requested.
    pub fn list_devices(&self, query: &ListQuery) -> StoreResult<DeviceListing> {
        let conn = self.conn()?;
        let clause = query.where_clause();
        let total = count(&conn, DEVICE_FACTORY, &clause)?;
        if total == 0 {
            check_empty(&conn, DEVICE_FACTORY, query)?;
        }

        let counts = state_counts(&conn, &clause)?;
        let devices = if query.details_required && total > 0 {
            let sql = format!(
                "{DEVICE_SELECT}{}{} LIMIT ? OFFSET ?",
                clause.sql,
                query.order_clause()
            );
            let mut stmt = conn.prepare(&sql).map_err(map_err!(Read))?;
            let page = query.page_params();
            let bound = clause.params.iter().chain(page.iter());
            let rows = stmt
                .query_map(params_from_iter(bound), device_from_row)
                .map_err(map_err!(Read))?;
            rows.collect::<Result<Vec<_>, _>>().map_err(map_err!(Read))?
        } else {
            Vec::new()
        };

        debug!(total, page = query.page, returned = devices.len(), "devices listed");
        Ok(DeviceListing {
            total,
            page: query.page,
            size: query.size,
            counts,
            devices,
        })
    }

    /// Run a validated history listing.
    pub fn list_history(&self, query: &ListQuery) -> StoreResult<HistoryListing> {
        let conn = self.conn()?;
        let clause = query.where_clause();
        let total = count(&conn, DEVICE_HISTORY, &clause)?;
        if total == 0 {
            check_empty(&conn, DEVICE_HISTORY, query)?;
        }

        let entries = if query.details_required && total > 0 {
            let sql = format!(
                "{HISTORY_SELECT}{}{} LIMIT ? OFFSET ?",
                clause.sql,
                query.order_clause()
            );
            let mut stmt = conn.prepare(&sql).map_err(map_err!(Read))?;
            let page = query.page_params();
            let bound = clause.params.iter().chain(page.iter());
            let rows = stmt
                .query_map(params_from_iter(bound), history_from_row)
                .map_err(map_err!(Read))?;
            rows.collect::<Result<Vec<_>, _>>().map_err(map_err!(Read))?
        } else {
            Vec::new()
        };

        debug!(total, page = query.page, returned = entries.len(), "history listed");
        Ok(HistoryListing {
            total,
            page: query.page,
            size: query.size,
            entries,
        })
    }
}

// ── Row helpers ────────────────────────────────────────────────────

fn select_device(conn: &Connection, id: FactoryId) -> StoreResult<Option<DeviceFactoryRecord>> {
    conn.query_row(
        &format!("{DEVICE_SELECT} WHERE id = ?1"),
        params![id],
        device_from_row,
    )
    .optional()
    .map_err(map_err!(Read))
}

fn select_history_entry(conn: &Connection, id: i64) -> StoreResult<DeviceHistoryEntry> {
    conn.query_row(
        &format!("{HISTORY_SELECT} WHERE id = ?1"),
        params![id],
        history_from_row,
    )
    .map_err(map_err!(Read))
}

/// Append a snapshot of `record`. Timestamps never run backwards for a
/// given record, even if the wall clock does.
fn insert_history(
    conn: &Connection,
    record: &DeviceFactoryRecord,
    action: HistoryAction,
) -> StoreResult<i64> {
    conn.execute(
        "INSERT INTO device_history (
            factory_id, action, created_at, imei, serial_number,
            package_serial_number, iccid, ssid, bssid, msisdn, imsi, model,
            platform_version, device_type, manufacturing_date, record_date,
            created_date, factory_admin, state, is_stolen, is_faulty, vin
        ) VALUES (
            ?1, ?2,
            MAX(?3, COALESCE((SELECT MAX(created_at) FROM device_history WHERE factory_id = ?1), 0)),
            ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22
        )",
        params![
            record.id,
            action.as_str(),
            now_millis(),
            record.imei,
            record.serial_number,
            record.package_serial_number,
            record.iccid,
            record.ssid,
            record.bssid,
            record.msisdn,
            record.imsi,
            record.model,
            record.platform_version,
            record.device_type,
            record.manufacturing_date,
            record.record_date,
            record.created_date,
            record.factory_admin,
            record.state,
            record.stolen,
            record.faulty,
            record.vin,
        ],
    )
    .map_err(write_err)?;
    Ok(conn.last_insert_rowid())
}

fn device_from_row(row: &Row<'_>) -> rusqlite::Result<DeviceFactoryRecord> {
    Ok(DeviceFactoryRecord {
        id: row.get(0)?,
        imei: row.get(1)?,
        serial_number: row.get(2)?,
        package_serial_number: row.get(3)?,
        iccid: row.get(4)?,
        ssid: row.get(5)?,
        bssid: row.get(6)?,
        msisdn: row.get(7)?,
        imsi: row.get(8)?,
        model: row.get(9)?,
        platform_version: row.get(10)?,
        device_type: row.get(11)?,
        manufacturing_date: row.get(12)?,
        record_date: row.get(13)?,
        created_date: row.get(14)?,
        factory_admin: row.get(15)?,
        state: row.get(16)?,
        stolen: row.get(17)?,
        faulty: row.get(18)?,
        vin: row.get(19)?,
    })
}

fn history_from_row(row: &Row<'_>) -> rusqlite::Result<DeviceHistoryEntry> {
    let factory_id: FactoryId = row.get(1)?;
    let action: String = row.get(2)?;
    let action = action
        .parse::<HistoryAction>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(2, Type::Text, Box::new(e)))?;
    Ok(DeviceHistoryEntry {
        id: row.get(0)?,
        factory_id,
        action,
        created_at: row.get(3)?,
        device: DeviceFactoryRecord {
            id: factory_id,
            imei: row.get(4)?,
            serial_number: row.get(5)?,
            package_serial_number: row.get(6)?,
            iccid: row.get(7)?,
            ssid: row.get(8)?,
            bssid: row.get(9)?,
            msisdn: row.get(10)?,
            imsi: row.get(11)?,
            model: row.get(12)?,
            platform_version: row.get(13)?,
            device_type: row.get(14)?,
            manufacturing_date: row.get(15)?,
            record_date: row.get(16)?,
            created_date: row.get(17)?,
            factory_admin: row.get(18)?,
            state: row.get(19)?,
            stolen: row.get(20)?,
            faulty: row.get(21)?,
            vin: row.get(22)?,
        },
    })
}

fn count(conn: &Connection, table: &str, clause: &WhereClause) -> StoreResult<u64> {
    let total: i64 = conn
        .query_row(
            &format!("SELECT COUNT(*) FROM {table}{}", clause.sql),
            params_from_iter(clause.params.iter()),
            |row| row.get(0),
        )
        .map_err(map_err!(Read))?;
    u64::try_from(total).map_err(map_err!(Read))
}

/// Turn an empty filtered result into the matching `NoMatch` error.
fn check_empty(conn: &Connection, table: &str, query: &ListQuery) -> StoreResult<()> {
    if !query.has_filters() {
        return Ok(());
    }
    let scope_matched = if query.needs_scope_count() {
        count(conn, table, &query.scope_clause())? > 0
    } else {
        true
    };
    let contains_alone_matched = if scope_matched && query.needs_split_count() {
        count(conn, table, &query.contains_clause())? > 0
    } else {
        false
    };
    match query.empty_result_family(scope_matched, contains_alone_matched) {
        Some(family) => Err(QueryError::NoMatch(family).into()),
        None => Ok(()),
    }
}

/// Aggregate the filtered set onto the four tracked state buckets.
fn state_counts(conn: &Connection, clause: &WhereClause) -> StoreResult<StateCounts> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT state, COUNT(*) FROM {DEVICE_FACTORY}{} GROUP BY state",
            clause.sql
        ))
        .map_err(map_err!(Read))?;
    let rows = stmt
        .query_map(params_from_iter(clause.params.iter()), |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })
        .map_err(map_err!(Read))?;

    let mut counts = StateCounts::default();
    for row in rows {
        let (state, n) = row.map_err(map_err!(Read))?;
        let n = u64::try_from(n).map_err(map_err!(Read))?;
        if !counts.record(&state, n) {
            debug!(%state, count = n, "state outside aggregate buckets dropped");
        }
    }
    Ok(counts)
}

/// Raw access for tests that need to plant rows the public API refuses to write.
#[cfg(test)]
impl RecordStore {
    pub(crate) fn execute_raw(
        &self,
        sql: &str,
        values: &[rusqlite::types::Value],
    ) -> StoreResult<usize> {
        let conn = self.conn()?;
        conn.execute(sql, params_from_iter(values.iter()))
            .map_err(write_err)
    }
}
