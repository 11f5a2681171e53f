//! devprov-lifecycle: device state machine and lifecycle service.
//!
//! This crate moves factory records through their lifecycle. Every
//! mutation is mirrored into the history table by the record store, and
//! updates and deletes can optionally be pushed to an external vehicle
//! system.
//!
//! # Components
//!
//! - **`machine`**: transition table, effective state, `ACTIVE` guard
//! - **`service`**: create, update, delete, state change, listings
//! - **`sync`**: vehicle sync and association lookup contracts
//! - **`error`**: `LifecycleError` and its `ErrorKind`

pub mod error;
pub mod machine;
pub mod service;
pub mod sync;

pub use error::{ErrorKind, LifecycleError, LifecycleResult};
pub use machine::MachineError;
pub use service::{DeviceRef, LifecycleService};
pub use sync::{AssociationLookup, SyncError, VehicleSync, VehicleUpdate};
