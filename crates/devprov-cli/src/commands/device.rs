use std::path::Path;

use anyhow::Context;
use devprov_core::{DeviceFactoryRecord, DeviceState, DeviceUpdatePayload, NewDeviceRecord};
use devprov_lifecycle::{DeviceRef, ErrorKind, LifecycleService};
use serde::Serialize;
use serde::de::DeserializeOwned;

use super::print_json;

/// Per-record outcome of a create request.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateOutcome {
    index: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    device: Option<DeviceFactoryRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<ErrorReport>,
}

#[derive(Serialize)]
struct ErrorReport {
    kind: ErrorKind,
    message: String,
}

fn read_json<T: DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let content =
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("parsing {}", path.display()))
}

pub fn create(service: &LifecycleService, file: &Path, actor: &str) -> anyhow::Result<()> {
    let records: Vec<NewDeviceRecord> = read_json(file)?;
    let outcomes: Vec<_> = service
        .create(&records, actor)
        .into_iter()
        .enumerate()
        .map(|(index, result)| match result {
            Ok(device) => CreateOutcome {
                index,
                device: Some(device),
                error: None,
            },
            Err(e) => CreateOutcome {
                index,
                device: None,
                error: Some(ErrorReport {
                    kind: e.kind(),
                    message: e.to_string(),
                }),
            },
        })
        .collect();
    print_json(&outcomes)
}

pub fn change_state(
    service: &LifecycleService,
    id: Option<i64>,
    imei: Option<&str>,
    state: Option<DeviceState>,
) -> anyhow::Result<()> {
    let device = DeviceRef::from_parts(id, imei)?;
    let record = service.change_state(&device, state)?;
    print_json(&record)
}

pub fn update(service: &LifecycleService, current: &Path, replacement: &Path) -> anyhow::Result<()> {
    let current: DeviceUpdatePayload = read_json(current)?;
    let replacement: DeviceUpdatePayload = read_json(replacement)?;
    let record = service.update(&current, &replacement)?;
    print_json(&record)
}

pub fn delete(
    service: &LifecycleService,
    imei: Option<&str>,
    serial: Option<&str>,
) -> anyhow::Result<()> {
    let entries = service.delete(imei, serial)?;
    print_json(&entries)
}

pub fn show(
    service: &LifecycleService,
    id: Option<i64>,
    imei: Option<&str>,
    with_history: bool,
) -> anyhow::Result<()> {
    let device = DeviceRef::from_parts(id, imei)?;
    let record = service.get_device(&device)?;
    if with_history {
        let history = service.device_history(record.id)?;
        print_json(&serde_json::json!({ "device": record, "history": history }))
    } else {
        print_json(&record)
    }
}
