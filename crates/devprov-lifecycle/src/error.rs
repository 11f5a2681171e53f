//! Error types for lifecycle operations.

use devprov_core::{DeviceState, FactoryId, ValidationError};
use devprov_store::{QueryError, StoreError};
use serde::Serialize;
use thiserror::Error;

use crate::machine::MachineError;
use crate::sync::SyncError;

/// Result type alias for lifecycle operations.
pub type LifecycleResult<T> = Result<T, LifecycleError>;

/// Coarse classification of a [`LifecycleError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    NotFound,
    State,
    Storage,
    External,
}

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("missing required parameter: {0}")]
    MissingParameter(&'static str),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Query(QueryError),

    #[error("device not found for id {0}")]
    NotFoundById(FactoryId),

    #[error("device not found for imei {0}")]
    NotFoundByImei(String),

    #[error("device not found for id {id} and imei {imei}")]
    NotFoundByIdAndImei { id: FactoryId, imei: String },

    #[error("device not found: {0}")]
    NotFound(String),

    /// Supplied identifiers do not line up with what is on file.
    #[error("device details not found: {0}")]
    DetailsNotFound(String),

    #[error("device already exists by VIN {0}")]
    VinAlreadyExists(String),

    /// Vehicle sync needs a VIN the device does not have.
    #[error("{operation} failed: no VIN associated with device {id}")]
    VinNotFound {
        operation: &'static str,
        id: FactoryId,
    },

    #[error("device {id} is in state {state}, expected PROVISIONED")]
    InvalidState { id: FactoryId, state: DeviceState },

    #[error(transparent)]
    Transition(#[from] MachineError),

    /// A concurrent change moved the device before this write landed.
    #[error("device {id} is no longer in the expected state ({expected})")]
    Precondition { id: FactoryId, expected: String },

    #[error("delete failed: {0}")]
    Delete(StoreError),

    #[error("update failed: {0}")]
    Update(StoreError),

    #[error("vehicle sync {operation} failed for VIN {vin}: {reason}")]
    VehicleSync {
        operation: &'static str,
        vin: String,
        reason: String,
    },

    #[error("vehicle sync is enabled but no client is configured")]
    VehicleSyncNotConfigured,

    #[error("association lookup failed: {0}")]
    Association(SyncError),

    #[error(transparent)]
    Store(StoreError),
}

impl LifecycleError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LifecycleError::MissingParameter(_)
            | LifecycleError::Validation(_)
            | LifecycleError::DetailsNotFound(_)
            | LifecycleError::VinAlreadyExists(_) => ErrorKind::Validation,
            LifecycleError::Query(e) if e.is_no_match() => ErrorKind::NotFound,
            LifecycleError::Query(_) => ErrorKind::Validation,
            LifecycleError::NotFoundById(_)
            | LifecycleError::NotFoundByImei(_)
            | LifecycleError::NotFoundByIdAndImei { .. }
            | LifecycleError::NotFound(_) => ErrorKind::NotFound,
            LifecycleError::InvalidState { .. }
            | LifecycleError::Transition(_)
            | LifecycleError::Precondition { .. } => ErrorKind::State,
            LifecycleError::Delete(_)
            | LifecycleError::Update(_)
            | LifecycleError::VinNotFound { .. }
            | LifecycleError::Store(_) => ErrorKind::Storage,
            LifecycleError::VehicleSync { .. }
            | LifecycleError::VehicleSyncNotConfigured
            | LifecycleError::Association(_) => ErrorKind::External,
        }
    }

    /// Wrap a store error raised by a delete.
    pub(crate) fn delete(e: StoreError) -> Self {
        Self::classify(e, LifecycleError::Delete)
    }

    /// Wrap a store error raised by an update.
    pub(crate) fn update(e: StoreError) -> Self {
        Self::classify(e, LifecycleError::Update)
    }

    fn classify(e: StoreError, wrap: fn(StoreError) -> Self) -> Self {
        match e {
            StoreError::Precondition { id, expected } => {
                LifecycleError::Precondition { id, expected }
            }
            StoreError::Query(q) => LifecycleError::Query(q),
            other => wrap(other),
        }
    }
}

impl From<StoreError> for LifecycleError {
    fn from(e: StoreError) -> Self {
        Self::classify(e, LifecycleError::Store)
    }
}

impl From<QueryError> for LifecycleError {
    fn from(e: QueryError) -> Self {
        LifecycleError::Query(e)
    }
}
