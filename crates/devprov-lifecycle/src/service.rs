//! Lifecycle service: create, update, delete, state change and listings.
//!
//! Validation and state checks run before any write. Local writes commit
//! before the vehicle system is called, and a failing vehicle call does not
//! undo them.

use std::collections::HashMap;
use std::sync::Arc;

use devprov_core::validation::{require, validate_imei, validate_serial_number, validate_vin};
use devprov_core::{
    DeviceFactoryRecord, DeviceHistoryEntry, DeviceListing, DeviceState, DeviceUpdatePayload,
    FactoryId, HistoryListing, NewDeviceRecord, ProvisioningSettings,
};
use devprov_store::{ListQuery, RecordStore};
use tracing::{debug, info, warn};

use crate::error::{LifecycleError, LifecycleResult};
use crate::machine;
use crate::sync::{AssociationLookup, VehicleSync, VehicleUpdate};

/// How a caller identifies a single device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceRef {
    IdAndImei { id: FactoryId, imei: String },
    Id(FactoryId),
    Imei(String),
}

impl DeviceRef {
    /// Build a reference from optional parts; a blank imei counts as absent.
    pub fn from_parts(id: Option<FactoryId>, imei: Option<&str>) -> LifecycleResult<Self> {
        let imei = imei.map(str::trim).filter(|s| !s.is_empty());
        if let Some(imei) = imei {
            validate_imei(imei)?;
        }
        match (id, imei) {
            (Some(id), Some(imei)) => Ok(DeviceRef::IdAndImei {
                id,
                imei: imei.to_string(),
            }),
            (Some(id), None) => Ok(DeviceRef::Id(id)),
            (None, Some(imei)) => Ok(DeviceRef::Imei(imei.to_string())),
            (None, None) => Err(LifecycleError::MissingParameter("factoryId or imei")),
        }
    }
}

/// Orchestrates device lifecycle operations over a [`RecordStore`].
#[derive(Clone)]
pub struct LifecycleService {
    store: RecordStore,
    settings: ProvisioningSettings,
    associations: Arc<dyn AssociationLookup>,
    vehicle_sync: Option<Arc<dyn VehicleSync>>,
}

impl LifecycleService {
    /// Associations are read from `store` unless replaced with
    /// [`with_associations`](Self::with_associations).
    pub fn new(store: RecordStore, settings: ProvisioningSettings) -> Self {
        Self {
            associations: Arc::new(store.clone()),
            store,
            settings,
            vehicle_sync: None,
        }
    }

    pub fn with_vehicle_sync(mut self, sync: Arc<dyn VehicleSync>) -> Self {
        self.vehicle_sync = Some(sync);
        self
    }

    pub fn with_associations(mut self, associations: Arc<dyn AssociationLookup>) -> Self {
        self.associations = associations;
        self
    }

    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    // ── State changes ──────────────────────────────────────────────

    /// Move one device to `new_state`.
    pub fn change_state(
        &self,
        device: &DeviceRef,
        new_state: Option<DeviceState>,
    ) -> LifecycleResult<DeviceFactoryRecord> {
        let target = new_state.ok_or(LifecycleError::MissingParameter("state"))?;
        let record = self.resolve(device)?;
        let current = machine::effective_state(&record)?;

        let association = if target == DeviceState::Active {
            self.associations
                .find_association(record.id)
                .map_err(LifecycleError::Association)?
        } else {
            None
        };
        machine::validate_transition(record.id, current, target, association.as_ref())?;

        let (stolen, faulty) = machine::flags_for(target);
        let updated = self.store.set_state(&record, target, stolen, faulty)?;
        info!(id = record.id, from = %current, to = %target, "device state changed");
        Ok(updated)
    }

    // ── Create ─────────────────────────────────────────────────────

    /// Create each record independently; one result per input, in order.
    pub fn create(
        &self,
        records: &[NewDeviceRecord],
        actor: &str,
    ) -> Vec<LifecycleResult<DeviceFactoryRecord>> {
        let actor = Some(actor.trim()).filter(|a| !a.is_empty());
        let results: Vec<_> = records
            .iter()
            .map(|record| self.create_one(record, actor))
            .collect();
        let created = results.iter().filter(|r| r.is_ok()).count();
        info!(
            requested = records.len(),
            created,
            actor = actor.unwrap_or("-"),
            "device records created"
        );
        results
    }

    fn create_one(
        &self,
        record: &NewDeviceRecord,
        actor: Option<&str>,
    ) -> LifecycleResult<DeviceFactoryRecord> {
        let (fields, vin) = record.validate()?;
        if let Some(vin) = &vin
            && self.store.find_by_vin(vin)?.is_some()
        {
            return Err(LifecycleError::VinAlreadyExists(vin.clone()));
        }
        let created = self.store.insert_device(&fields, vin.as_deref(), actor)?;
        debug!(id = created.id, serial = %created.serial_number, "device record created");
        Ok(created)
    }

    // ── Update ─────────────────────────────────────────────────────

    /// Replace the fields of the provisioned device matching `current`.
    pub fn update(
        &self,
        current: &DeviceUpdatePayload,
        replacement: &DeviceUpdatePayload,
    ) -> LifecycleResult<DeviceFactoryRecord> {
        let current_fields = current.to_fields()?;
        let replacement_fields = replacement.to_fields()?;
        let sync = self.vehicle_sync()?;
        if sync.is_some() {
            for payload in [current, replacement] {
                require("chassisNumber", payload.chassis_number.as_ref())?;
                require("productionWeek", payload.production_week.as_ref())?;
            }
        }

        let record = self.store.find_matching(&current_fields)?.ok_or_else(|| {
            LifecycleError::NotFound(format!("serial number {}", current_fields.serial_number))
        })?;
        let state = machine::effective_state(&record)?;
        if state != DeviceState::Provisioned {
            return Err(LifecycleError::InvalidState {
                id: record.id,
                state,
            });
        }

        let new_vin = if self.settings.vin_checks_enabled() {
            self.check_vins(&record, current, replacement)?
        } else {
            None
        };
        let sync_vin = match sync {
            Some(_) => Some(new_vin.clone().or_else(|| record.vin.clone()).ok_or(
                LifecycleError::VinNotFound {
                    operation: "update",
                    id: record.id,
                },
            )?),
            None => None,
        };

        let updated = self
            .store
            .update_device(record.id, &replacement_fields, new_vin.as_deref())
            .map_err(LifecycleError::update)?;
        info!(id = updated.id, vin_replaced = new_vin.is_some(), "device updated");

        if let (Some(sync), Some(vin)) = (sync, sync_vin) {
            let update = VehicleUpdate {
                chassis_number: require("chassisNumber", replacement.chassis_number.as_ref())?
                    .to_string(),
                production_week: require(
                    "productionWeek",
                    replacement.production_week.as_ref(),
                )?
                .to_string(),
                plant: replacement.plant.clone(),
                vin,
                model_year: replacement.model_year.clone(),
            };
            push_vehicle("update", &update.vin, sync.update_vehicle(&update))?;
        }
        Ok(updated)
    }

    /// VIN ownership checks; returns the VIN to store when it changes.
    fn check_vins(
        &self,
        record: &DeviceFactoryRecord,
        current: &DeviceUpdatePayload,
        replacement: &DeviceUpdatePayload,
    ) -> LifecycleResult<Option<String>> {
        if current.vin() != record.vin {
            return Err(LifecycleError::DetailsNotFound(format!(
                "VIN does not match device {}",
                record.id
            )));
        }
        let Some(vin) = replacement.vin() else {
            return Ok(None);
        };
        if record.vin.as_deref() == Some(vin.as_str()) {
            return Ok(None);
        }
        validate_vin(&vin)?;
        match self.store.find_by_vin(&vin)? {
            Some(owner) if owner != record.id => Err(LifecycleError::VinAlreadyExists(vin)),
            _ => Ok(Some(vin)),
        }
    }

    // ── Delete ─────────────────────────────────────────────────────

    /// Delete every provisioned device matching the given identifiers.
    pub fn delete(
        &self,
        imei: Option<&str>,
        serial_number: Option<&str>,
    ) -> LifecycleResult<Vec<DeviceHistoryEntry>> {
        let imei = imei.map(str::trim).filter(|s| !s.is_empty());
        let serial_number = serial_number.map(str::trim).filter(|s| !s.is_empty());
        if imei.is_none() && serial_number.is_none() {
            return Err(LifecycleError::MissingParameter("imei or serialNumber"));
        }
        if let Some(imei) = imei {
            validate_imei(imei)?;
        }
        if let Some(serial) = serial_number {
            validate_serial_number(serial)?;
        }
        let sync = self.vehicle_sync()?;

        let records = self.store.find_devices(imei, serial_number)?;
        if records.is_empty() {
            return Err(LifecycleError::NotFound(format!(
                "imei {} serial number {}",
                imei.unwrap_or("-"),
                serial_number.unwrap_or("-")
            )));
        }

        let vins = if sync.is_some() {
            records
                .iter()
                .map(|r| {
                    r.vin.clone().ok_or(LifecycleError::VinNotFound {
                        operation: "delete",
                        id: r.id,
                    })
                })
                .collect::<LifecycleResult<Vec<_>>>()?
        } else {
            Vec::new()
        };

        let entries = self
            .store
            .delete_provisioned(&records)
            .map_err(LifecycleError::delete)?;
        info!(count = entries.len(), "devices deleted");

        if let Some(sync) = sync {
            let mut first_failure = None;
            for vin in &vins {
                if let Err(e) = push_vehicle("delete", vin, sync.delete_vehicle(vin)) {
                    first_failure.get_or_insert(e);
                }
            }
            if let Some(e) = first_failure {
                return Err(e);
            }
        }
        Ok(entries)
    }

    // ── Reads ──────────────────────────────────────────────────────

    pub fn list_devices(&self, params: &HashMap<String, String>) -> LifecycleResult<DeviceListing> {
        let query = ListQuery::for_devices(params)?;
        Ok(self.store.list_devices(&query)?)
    }

    pub fn list_history(&self, params: &HashMap<String, String>) -> LifecycleResult<HistoryListing> {
        let query = ListQuery::for_history(params)?;
        Ok(self.store.list_history(&query)?)
    }

    pub fn get_device(&self, device: &DeviceRef) -> LifecycleResult<DeviceFactoryRecord> {
        self.resolve(device)
    }

    /// Every snapshot recorded for a factory id, including deleted devices.
    pub fn device_history(&self, id: FactoryId) -> LifecycleResult<Vec<DeviceHistoryEntry>> {
        let entries = self.store.history_for(id)?;
        if entries.is_empty() {
            return Err(LifecycleError::NotFoundById(id));
        }
        Ok(entries)
    }

    // ── Internal ───────────────────────────────────────────────────

    /// Resolve a reference, preferring id+imei, then id, then imei.
    fn resolve(&self, device: &DeviceRef) -> LifecycleResult<DeviceFactoryRecord> {
        match device {
            DeviceRef::IdAndImei { id, imei } => self
                .store
                .find_by_id_and_imei(*id, imei)?
                .ok_or_else(|| LifecycleError::NotFoundByIdAndImei {
                    id: *id,
                    imei: imei.clone(),
                }),
            DeviceRef::Id(id) => self
                .store
                .get_device(*id)?
                .ok_or(LifecycleError::NotFoundById(*id)),
            DeviceRef::Imei(imei) => self
                .store
                .find_by_imei(imei)?
                .ok_or_else(|| LifecycleError::NotFoundByImei(imei.clone())),
        }
    }

    /// The vehicle client, when sync is enabled.
    fn vehicle_sync(&self) -> LifecycleResult<Option<&dyn VehicleSync>> {
        if !self.settings.swm_integration_enabled {
            return Ok(None);
        }
        self.vehicle_sync
            .as_deref()
            .map(Some)
            .ok_or(LifecycleError::VehicleSyncNotConfigured)
    }
}

fn push_vehicle(
    operation: &'static str,
    vin: &str,
    outcome: Result<bool, crate::sync::SyncError>,
) -> LifecycleResult<()> {
    let reason = match outcome {
        Ok(true) => {
            debug!(operation, vin, "vehicle sync applied");
            return Ok(());
        }
        Ok(false) => "vehicle system declined the request".to_string(),
        Err(e) => e.to_string(),
    };
    warn!(operation, vin, %reason, "vehicle sync failed; local change kept");
    Err(LifecycleError::VehicleSync {
        operation,
        vin: vin.to_string(),
        reason,
    })
}
