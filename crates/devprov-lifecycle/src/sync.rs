//! Collaborator contracts: external vehicle sync and association lookup.
//!
//! Both are injected into the [`LifecycleService`](crate::LifecycleService)
//! so tests can substitute fakes.

use devprov_core::{DeviceAssociation, FactoryId};
use devprov_store::RecordStore;
use serde::Serialize;
use thiserror::Error;

/// Errors reported by an external collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    #[error("collaborator unavailable: {0}")]
    Unavailable(String),

    #[error("collaborator rejected request: {0}")]
    Rejected(String),
}

/// Fields sent to the vehicle system when a device's details change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VehicleUpdate {
    pub chassis_number: String,
    pub production_week: String,
    pub plant: Option<String>,
    pub vin: String,
    pub model_year: Option<String>,
}

/// External vehicle-management system.
///
/// `Ok(false)` means the system answered but did not apply the change.
pub trait VehicleSync: Send + Sync {
    /// Remove the vehicle identified by `vin`.
    fn delete_vehicle(&self, vin: &str) -> Result<bool, SyncError>;
    /// Push updated vehicle details.
    fn update_vehicle(&self, update: &VehicleUpdate) -> Result<bool, SyncError>;
}

/// Source of device association rows.
pub trait AssociationLookup: Send + Sync {
    fn find_association(&self, factory_id: FactoryId)
    -> Result<Option<DeviceAssociation>, SyncError>;
}

impl AssociationLookup for RecordStore {
    fn find_association(
        &self,
        factory_id: FactoryId,
    ) -> Result<Option<DeviceAssociation>, SyncError> {
        self.get_association(factory_id)
            .map_err(|e| SyncError::Unavailable(e.to_string()))
    }
}
