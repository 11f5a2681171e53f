//! Device state machine: pure transition decisions.
//!
//! Transitions are a table lookup. Moving a device to `ACTIVE` is further
//! gated on the device having an association with an external id.

use devprov_core::{DeviceAssociation, DeviceFactoryRecord, DeviceState, FactoryId};
use thiserror::Error;

/// Errors produced while deciding a transition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MachineError {
    /// The stored state string is not a known state.
    #[error("device {device_id} has invalid state {state:?}")]
    InvalidDeviceState { device_id: FactoryId, state: String },

    #[error("device {device_id} cannot move from {from} to {to}")]
    Transition {
        device_id: FactoryId,
        from: DeviceState,
        to: DeviceState,
    },

    /// `ACTIVE` needs an association carrying an external device id.
    #[error("device {device_id} has no associated external device id")]
    NotAssociated { device_id: FactoryId },
}

/// States reachable in one step from `from`.
pub fn allowed_targets(from: DeviceState) -> &'static [DeviceState] {
    use DeviceState::*;
    match from {
        Provisioned | Active => &[Stolen, Faulty],
        Stolen => &[Active, Provisioned],
        Faulty => &[Stolen, Active, Provisioned],
        ReadyToActivate | Deactivated | ProvisionedAlive => &[],
    }
}

pub fn is_transition_allowed(from: DeviceState, to: DeviceState) -> bool {
    allowed_targets(from).contains(&to)
}

/// State a record is treated as being in. The faulty flag wins over the
/// stolen flag, which wins over the stored state.
pub fn effective_state(record: &DeviceFactoryRecord) -> Result<DeviceState, MachineError> {
    if record.faulty {
        return Ok(DeviceState::Faulty);
    }
    if record.stolen {
        return Ok(DeviceState::Stolen);
    }
    record
        .state
        .parse()
        .map_err(|_| MachineError::InvalidDeviceState {
            device_id: record.id,
            state: record.state.clone(),
        })
}

/// Check `from -> to` for one device. `association` is only consulted for
/// the `ACTIVE` target.
pub fn validate_transition(
    device_id: FactoryId,
    from: DeviceState,
    to: DeviceState,
    association: Option<&DeviceAssociation>,
) -> Result<(), MachineError> {
    if !is_transition_allowed(from, to) {
        return Err(MachineError::Transition {
            device_id,
            from,
            to,
        });
    }
    if to == DeviceState::Active && !association.is_some_and(DeviceAssociation::has_external_id) {
        return Err(MachineError::NotAssociated { device_id });
    }
    Ok(())
}

/// Stolen/faulty flags a record carries after moving to `target`.
pub fn flags_for(target: DeviceState) -> (bool, bool) {
    match target {
        DeviceState::Stolen => (true, false),
        DeviceState::Faulty => (false, true),
        _ => (false, false),
    }
}
