//! End-to-end lifecycle tests: service → state machine → record store.
//!
//! Vehicle sync is replaced by a `RecordingSync` that logs every call and
//! answers with a configurable outcome.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use devprov_core::{
    DeviceAssociation, DeviceCreationType, DeviceState, DeviceUpdatePayload, FactoryId,
    HistoryAction, NewDeviceRecord, ProvisioningSettings,
};
use devprov_lifecycle::{
    AssociationLookup, DeviceRef, ErrorKind, LifecycleError, LifecycleService, SyncError,
    VehicleSync, VehicleUpdate,
};
use devprov_store::{QueryError, RecordStore, StoreError};

const VIN_A: &str = "1HGCM82633A004352";
const VIN_B: &str = "2HGCM82633A004352";

// ── Fakes ──────────────────────────────────────────────────────────

#[derive(Clone, Copy)]
enum Outcome {
    Applied,
    Declined,
    Down,
}

struct RecordingSync {
    outcome: Outcome,
    calls: Mutex<Vec<String>>,
}

impl RecordingSync {
    fn new(outcome: Outcome) -> Arc<Self> {
        Arc::new(Self {
            outcome,
            calls: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn answer(&self) -> Result<bool, SyncError> {
        match self.outcome {
            Outcome::Applied => Ok(true),
            Outcome::Declined => Ok(false),
            Outcome::Down => Err(SyncError::Unavailable("connection refused".to_string())),
        }
    }
}

impl VehicleSync for RecordingSync {
    fn delete_vehicle(&self, vin: &str) -> Result<bool, SyncError> {
        self.calls.lock().unwrap().push(format!("delete:{vin}"));
        self.answer()
    }

    fn update_vehicle(&self, update: &VehicleUpdate) -> Result<bool, SyncError> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("update:{}:{}", update.vin, update.chassis_number));
        self.answer()
    }
}

struct BrokenAssociations;

impl AssociationLookup for BrokenAssociations {
    fn find_association(
        &self,
        _factory_id: FactoryId,
    ) -> Result<Option<DeviceAssociation>, SyncError> {
        Err(SyncError::Unavailable("association service timed out".to_string()))
    }
}

// ── Helpers ────────────────────────────────────────────────────────

fn service(settings: ProvisioningSettings) -> LifecycleService {
    LifecycleService::new(RecordStore::open_in_memory().unwrap(), settings)
}

fn vin_mode() -> ProvisioningSettings {
    ProvisioningSettings {
        creation_type: DeviceCreationType::SwmIntegration,
        swm_integration_enabled: false,
    }
}

fn sync_mode() -> ProvisioningSettings {
    ProvisioningSettings {
        creation_type: DeviceCreationType::SwmIntegration,
        swm_integration_enabled: true,
    }
}

fn new_device(imei: &str, serial: &str, vin: Option<&str>) -> NewDeviceRecord {
    NewDeviceRecord {
        imei: Some(imei.to_string()),
        serial_number: Some(serial.to_string()),
        iccid: Some("8991101200003204510".to_string()),
        ssid: Some("factory-ap".to_string()),
        bssid: Some("00:1a:2b:3c:4d:5e".to_string()),
        msisdn: Some("15550100".to_string()),
        imsi: Some("310150123456789".to_string()),
        model: Some("MX1".to_string()),
        platform_version: Some("1.0".to_string()),
        manufacturing_date: Some("2019/01/01".to_string()),
        record_date: Some("2019/01/01".to_string()),
        vin: vin.map(str::to_string),
        ..Default::default()
    }
}

fn payload(imei: &str, serial: &str, vin: Option<&str>) -> DeviceUpdatePayload {
    DeviceUpdatePayload {
        imei: Some(imei.to_string()),
        serial_number: Some(serial.to_string()),
        iccid: Some("8991101200003204510".to_string()),
        ssid: Some("factory-ap".to_string()),
        bssid: Some("00:1a:2b:3c:4d:5e".to_string()),
        msisdn: Some("15550100".to_string()),
        imsi: Some("310150123456789".to_string()),
        model: Some("MX1".to_string()),
        platform_version: Some("1.0".to_string()),
        manufacturing_date: Some("2019/01/01".to_string()),
        record_date: Some("2019/01/01".to_string()),
        vin: vin.map(str::to_string),
        chassis_number: Some("CH0001".to_string()),
        production_week: Some("2019-01".to_string()),
        ..Default::default()
    }
}

fn create(svc: &LifecycleService, record: NewDeviceRecord) -> FactoryId {
    let mut results = svc.create(&[record], "factory-admin");
    results.remove(0).unwrap().id
}

fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn associate(svc: &LifecycleService, id: FactoryId, harman_id: Option<&str>) {
    svc.store()
        .put_association(&DeviceAssociation {
            factory_id: id,
            harman_id: harman_id.map(str::to_string),
            association_status: "ASSOCIATED".to_string(),
        })
        .unwrap();
}

// ── Create ─────────────────────────────────────────────────────────

#[test]
fn create_reports_per_record_outcomes() {
    let svc = service(ProvisioningSettings::default());
    let bad_imei = new_device("99000A", "2001", None);
    let mut no_model = new_device("2002", "2002", None);
    no_model.model = None;

    let results = svc.create(
        &[
            new_device("9900008624711007", "1007", Some(VIN_A)),
            bad_imei,
            new_device("9900008624711008", "1008", Some(VIN_A)),
            no_model,
        ],
        "alice",
    );

    let created = results[0].as_ref().unwrap();
    assert_eq!(created.state, "PROVISIONED");
    assert_eq!(created.factory_admin.as_deref(), Some("alice"));
    assert_eq!(results[1].as_ref().unwrap_err().kind(), ErrorKind::Validation);
    assert!(matches!(
        results[2],
        Err(LifecycleError::VinAlreadyExists(ref vin)) if vin == VIN_A
    ));
    assert_eq!(results[3].as_ref().unwrap_err().kind(), ErrorKind::Validation);

    let listing = svc
        .list_devices(&params(&[("isDetailsRequired", "true")]))
        .unwrap();
    assert_eq!(listing.total, 1);
}

// ── State changes ──────────────────────────────────────────────────

#[test]
fn stolen_then_provisioned_history() {
    let svc = service(ProvisioningSettings::default());
    let id = create(&svc, new_device("9900008624711007", "1007", None));
    let device = DeviceRef::Id(id);

    let stolen = svc.change_state(&device, Some(DeviceState::Stolen)).unwrap();
    assert_eq!(stolen.state, "STOLEN");
    assert!(stolen.stolen && !stolen.faulty);

    let back = svc
        .change_state(&device, Some(DeviceState::Provisioned))
        .unwrap();
    assert_eq!(back.state, "PROVISIONED");
    assert!(!back.stolen && !back.faulty);

    let history = svc.device_history(id).unwrap();
    let actions: Vec<_> = history.iter().map(|e| e.action).collect();
    assert_eq!(
        actions,
        vec![
            HistoryAction::Provisioned,
            HistoryAction::Updated,
            HistoryAction::Updated
        ]
    );
    assert!(history.windows(2).all(|w| w[0].created_at <= w[1].created_at));
}

#[test]
fn faulty_clears_stolen() {
    let svc = service(ProvisioningSettings::default());
    let id = create(&svc, new_device("9900008624711007", "1007", None));
    let device = DeviceRef::IdAndImei {
        id,
        imei: "9900008624711007".to_string(),
    };

    svc.change_state(&device, Some(DeviceState::Stolen)).unwrap();
    let faulty = svc.change_state(&device, Some(DeviceState::Faulty)).unwrap();
    assert!(faulty.faulty && !faulty.stolen);
    assert_eq!(faulty.state, "FAULTY");
}

#[test]
fn disallowed_transition_leaves_record_untouched() {
    let svc = service(ProvisioningSettings::default());
    let id = create(&svc, new_device("9900008624711007", "1007", None));

    let err = svc
        .change_state(&DeviceRef::Id(id), Some(DeviceState::Deactivated))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::State);
    assert_eq!(svc.device_history(id).unwrap().len(), 1);
}

#[test]
fn active_requires_external_id() {
    let svc = service(ProvisioningSettings::default());
    let id = create(&svc, new_device("9900008624711007", "1007", None));
    let device = DeviceRef::Imei("9900008624711007".to_string());
    svc.change_state(&device, Some(DeviceState::Stolen)).unwrap();

    let err = svc
        .change_state(&device, Some(DeviceState::Active))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::State);

    associate(&svc, id, Some(" "));
    assert!(svc.change_state(&device, Some(DeviceState::Active)).is_err());

    associate(&svc, id, Some("HU4X9B2"));
    let active = svc.change_state(&device, Some(DeviceState::Active)).unwrap();
    assert_eq!(active.state, "ACTIVE");
}

#[test]
fn association_outage_is_external() {
    let svc = service(ProvisioningSettings::default())
        .with_associations(Arc::new(BrokenAssociations));
    let id = create(&svc, new_device("9900008624711007", "1007", None));
    svc.change_state(&DeviceRef::Id(id), Some(DeviceState::Faulty))
        .unwrap();

    let err = svc
        .change_state(&DeviceRef::Id(id), Some(DeviceState::Active))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::External);
}

#[test]
fn not_found_per_reference_kind() {
    let svc = service(ProvisioningSettings::default());
    let id = create(&svc, new_device("9900008624711007", "1007", None));

    let by_id = svc.get_device(&DeviceRef::Id(id + 1)).unwrap_err();
    assert!(matches!(by_id, LifecycleError::NotFoundById(_)));
    let by_imei = svc.get_device(&DeviceRef::Imei("1".to_string())).unwrap_err();
    assert!(matches!(by_imei, LifecycleError::NotFoundByImei(_)));
    let both = svc
        .get_device(&DeviceRef::IdAndImei {
            id,
            imei: "1".to_string(),
        })
        .unwrap_err();
    assert!(matches!(both, LifecycleError::NotFoundByIdAndImei { .. }));
    assert_eq!(both.kind(), ErrorKind::NotFound);
}

// ── Delete ─────────────────────────────────────────────────────────

#[test]
fn delete_then_delete_again() {
    let svc = service(ProvisioningSettings::default());
    let id = create(&svc, new_device("9900008624711007", "1007", None));

    let entries = svc.delete(Some("9900008624711007"), Some("1007")).unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].action, HistoryAction::Deactivated);
    assert_eq!(entries[0].factory_id, id);

    let history = svc.device_history(id).unwrap();
    assert_eq!(history.last().unwrap().action, HistoryAction::Deactivated);

    let err = svc.delete(Some("9900008624711007"), None).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn delete_requires_an_identifier() {
    let svc = service(ProvisioningSettings::default());
    let err = svc.delete(None, Some("  ")).unwrap_err();
    assert!(matches!(err, LifecycleError::MissingParameter(_)));
    let err = svc.delete(None, Some("a-b")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[test]
fn flags_block_delete() {
    let svc = service(ProvisioningSettings::default());
    let id = create(&svc, new_device("9900008624711007", "1007", None));
    svc.change_state(&DeviceRef::Id(id), Some(DeviceState::Stolen))
        .unwrap();

    let err = svc.delete(None, Some("1007")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::State);
    let record = svc.get_device(&DeviceRef::Id(id)).unwrap();
    assert!(record.stolen);
    assert_eq!(svc.device_history(id).unwrap().len(), 2);
}

#[test]
fn delete_of_associated_device_is_typed_error() {
    let svc = service(ProvisioningSettings::default());
    let id = create(&svc, new_device("9900008624711007", "1007", None));
    associate(&svc, id, Some("HU4X9B2"));

    let err = svc.delete(None, Some("1007")).unwrap_err();
    assert!(matches!(err, LifecycleError::Delete(StoreError::Constraint(_))));
    assert!(svc.get_device(&DeviceRef::Id(id)).is_ok());
}

#[test]
fn delete_pushes_vin_to_vehicle_system() {
    let sync = RecordingSync::new(Outcome::Applied);
    let svc = service(sync_mode()).with_vehicle_sync(sync.clone());
    create(&svc, new_device("9900008624711007", "1007", Some(VIN_A)));

    svc.delete(Some("9900008624711007"), None).unwrap();
    assert_eq!(sync.calls(), vec![format!("delete:{VIN_A}")]);
}

#[test]
fn vehicle_failure_after_delete_is_not_compensated() {
    let sync = RecordingSync::new(Outcome::Down);
    let svc = service(sync_mode()).with_vehicle_sync(sync.clone());
    let id = create(&svc, new_device("9900008624711007", "1007", Some(VIN_A)));

    let err = svc.delete(Some("9900008624711007"), None).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::External);
    assert!(svc.get_device(&DeviceRef::Id(id)).is_err());
}

#[test]
fn delete_with_sync_requires_vin() {
    let sync = RecordingSync::new(Outcome::Applied);
    let svc = service(sync_mode()).with_vehicle_sync(sync.clone());
    let id = create(&svc, new_device("9900008624711007", "1007", None));

    let err = svc.delete(Some("9900008624711007"), None).unwrap_err();
    assert!(matches!(
        err,
        LifecycleError::VinNotFound { operation: "delete", id: found } if found == id
    ));
    assert_eq!(err.kind(), ErrorKind::Storage);
    assert!(svc.get_device(&DeviceRef::Id(id)).is_ok());
    assert!(sync.calls().is_empty());
}

// ── Update ─────────────────────────────────────────────────────────

#[test]
fn update_replaces_fields() {
    let svc = service(ProvisioningSettings::default());
    let id = create(&svc, new_device("9900008624711007", "1007", None));

    let mut replacement = payload("9900008624711009", "1009", None);
    replacement.model = Some("MX2".to_string());
    let updated = svc
        .update(&payload("9900008624711007", "1007", None), &replacement)
        .unwrap();

    assert_eq!(updated.id, id);
    assert_eq!(updated.serial_number, "1009");
    assert_eq!(updated.model, "MX2");
    let history = svc.device_history(id).unwrap();
    assert_eq!(history.last().unwrap().action, HistoryAction::Updated);
}

#[test]
fn update_changes_device_type() {
    let svc = service(ProvisioningSettings::default());
    let mut record = new_device("9900008624711007", "1007", None);
    record.device_type = Some("TCU".to_string());
    let id = create(&svc, record);

    let mut replacement = payload("9900008624711007", "1007", None);
    replacement.device_type = Some("HU".to_string());
    let updated = svc
        .update(&payload("9900008624711007", "1007", None), &replacement)
        .unwrap();
    assert_eq!(updated.device_type.as_deref(), Some("HU"));

    let history = svc.device_history(id).unwrap();
    assert_eq!(history[0].device.device_type.as_deref(), Some("TCU"));
    assert_eq!(history[1].device.device_type.as_deref(), Some("HU"));
}

#[test]
fn update_requires_full_payload() {
    let svc = service(ProvisioningSettings::default());
    create(&svc, new_device("9900008624711007", "1007", None));
    let mut current = payload("9900008624711007", "1007", None);
    current.platform_version = None;

    let err = svc
        .update(&current, &payload("9900008624711009", "1009", None))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[test]
fn update_of_unknown_device_is_not_found() {
    let svc = service(ProvisioningSettings::default());
    let err = svc
        .update(
            &payload("9900008624711007", "1007", None),
            &payload("9900008624711009", "1009", None),
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn update_requires_provisioned() {
    let svc = service(ProvisioningSettings::default());
    let id = create(&svc, new_device("9900008624711007", "1007", None));
    svc.change_state(&DeviceRef::Id(id), Some(DeviceState::Faulty))
        .unwrap();

    let err = svc
        .update(
            &payload("9900008624711007", "1007", None),
            &payload("9900008624711009", "1009", None),
        )
        .unwrap_err();
    assert!(matches!(
        err,
        LifecycleError::InvalidState {
            state: DeviceState::Faulty,
            ..
        }
    ));
}

#[test]
fn update_with_mismatched_vin_leaves_record_unchanged() {
    let svc = service(vin_mode());
    let id = create(&svc, new_device("9900008624711007", "1007", Some(VIN_A)));

    let err = svc
        .update(
            &payload("9900008624711007", "1007", Some(VIN_B)),
            &payload("9900008624711009", "1009", Some(VIN_B)),
        )
        .unwrap_err();
    assert!(matches!(err, LifecycleError::DetailsNotFound(_)));
    assert_eq!(err.kind(), ErrorKind::Validation);

    let record = svc.get_device(&DeviceRef::Id(id)).unwrap();
    assert_eq!(record.serial_number, "1007");
    assert_eq!(record.vin.as_deref(), Some(VIN_A));
    assert_eq!(svc.device_history(id).unwrap().len(), 1);
}

#[test]
fn update_moves_vin() {
    let svc = service(vin_mode());
    let id = create(&svc, new_device("9900008624711007", "1007", Some(VIN_A)));

    let updated = svc
        .update(
            &payload("9900008624711007", "1007", Some(VIN_A)),
            &payload("9900008624711007", "1007", Some(VIN_B)),
        )
        .unwrap();
    assert_eq!(updated.vin.as_deref(), Some(VIN_B));
    assert_eq!(svc.store().find_by_vin(VIN_B).unwrap(), Some(id));
}

#[test]
fn update_rejects_vin_owned_elsewhere() {
    let svc = service(vin_mode());
    create(&svc, new_device("9900008624711007", "1007", Some(VIN_A)));
    create(&svc, new_device("9900008624711008", "1008", Some(VIN_B)));

    let err = svc
        .update(
            &payload("9900008624711007", "1007", Some(VIN_A)),
            &payload("9900008624711007", "1007", Some(VIN_B)),
        )
        .unwrap_err();
    assert!(matches!(err, LifecycleError::VinAlreadyExists(_)));
}

#[test]
fn update_pushes_to_vehicle_system() {
    let sync = RecordingSync::new(Outcome::Applied);
    let svc = service(sync_mode()).with_vehicle_sync(sync.clone());
    create(&svc, new_device("9900008624711007", "1007", Some(VIN_A)));

    let mut replacement = payload("9900008624711007", "1007", Some(VIN_A));
    replacement.chassis_number = Some("CH0002".to_string());
    svc.update(&payload("9900008624711007", "1007", Some(VIN_A)), &replacement)
        .unwrap();
    assert_eq!(sync.calls(), vec![format!("update:{VIN_A}:CH0002")]);
}

#[test]
fn update_with_sync_requires_chassis_number() {
    let sync = RecordingSync::new(Outcome::Applied);
    let svc = service(sync_mode()).with_vehicle_sync(sync.clone());
    create(&svc, new_device("9900008624711007", "1007", Some(VIN_A)));

    let mut current = payload("9900008624711007", "1007", Some(VIN_A));
    current.chassis_number = None;
    let err = svc
        .update(&current, &payload("9900008624711007", "1007", Some(VIN_A)))
        .unwrap_err();
    assert!(matches!(err, LifecycleError::Validation(_)));
    assert!(sync.calls().is_empty());
}

#[test]
fn update_with_sync_requires_vin_before_writing() {
    let sync = RecordingSync::new(Outcome::Applied);
    let svc = service(sync_mode()).with_vehicle_sync(sync.clone());
    let id = create(&svc, new_device("9900008624711007", "1007", None));

    let mut replacement = payload("9900008624711007", "1007", None);
    replacement.model = Some("MX9".to_string());
    let err = svc
        .update(&payload("9900008624711007", "1007", None), &replacement)
        .unwrap_err();
    assert!(matches!(
        err,
        LifecycleError::VinNotFound { operation: "update", id: found } if found == id
    ));
    assert_eq!(err.kind(), ErrorKind::Storage);

    let record = svc.get_device(&DeviceRef::Id(id)).unwrap();
    assert_eq!(Some(record.model.as_str()), Some("MX1"));
    assert_eq!(svc.device_history(id).unwrap().len(), 1);
    assert!(sync.calls().is_empty());
}

#[test]
fn update_with_sync_uses_replacement_vin() {
    let sync = RecordingSync::new(Outcome::Applied);
    let svc = service(sync_mode()).with_vehicle_sync(sync.clone());
    create(&svc, new_device("9900008624711007", "1007", None));

    svc.update(
        &payload("9900008624711007", "1007", None),
        &payload("9900008624711007", "1007", Some(VIN_B)),
    )
    .unwrap();
    assert_eq!(sync.calls(), vec![format!("update:{VIN_B}:CH0001")]);
}

#[test]
fn declined_vehicle_update_keeps_local_change() {
    let sync = RecordingSync::new(Outcome::Declined);
    let svc = service(sync_mode()).with_vehicle_sync(sync.clone());
    let id = create(&svc, new_device("9900008624711007", "1007", Some(VIN_A)));

    let mut replacement = payload("9900008624711007", "1007", Some(VIN_A));
    replacement.model = Some("MX9".to_string());
    let err = svc
        .update(&payload("9900008624711007", "1007", Some(VIN_A)), &replacement)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::External);
    assert_eq!(svc.get_device(&DeviceRef::Id(id)).unwrap().model, "MX9");
}

// ── Listings ───────────────────────────────────────────────────────

#[test]
fn list_by_imei_and_reject_unknown_field() {
    let svc = service(ProvisioningSettings::default());
    create(&svc, new_device("9900008624711007", "1007", None));
    create(&svc, new_device("9900008624711008", "1008", None));

    let listing = svc
        .list_devices(&params(&[
            ("isDetailsRequired", "true"),
            ("containsLikeFields", "imei"),
            ("containsLikeValues", "9900008624711007"),
        ]))
        .unwrap();
    assert_eq!(listing.total, 1);
    assert_eq!(listing.devices[0].serial_number, "1007");

    let err = svc
        .list_devices(&params(&[
            ("isDetailsRequired", "true"),
            ("containsLikeFields", "vin"),
            ("containsLikeValues", VIN_A),
        ]))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[test]
fn pagination_bounds() {
    let svc = service(ProvisioningSettings::default());
    for i in 0..25 {
        create(&svc, new_device(&format!("99000086247110{i:02}"), &format!("SN{i:03}"), None));
    }

    let listing = svc
        .list_devices(&params(&[
            ("isDetailsRequired", "true"),
            ("size", "20"),
            ("page", "1"),
        ]))
        .unwrap();
    assert!(listing.devices.len() <= 20);
    assert_eq!(listing.page, 1);

    for (key, value) in [("size", "0"), ("size", "5001"), ("page", "0")] {
        let err = svc
            .list_devices(&params(&[("isDetailsRequired", "true"), (key, value)]))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation, "{key}={value}");
    }

    let defaulted = svc
        .list_devices(&params(&[("isDetailsRequired", "true"), ("size", "10")]))
        .unwrap();
    assert_eq!(defaulted.page, 1);
    assert_eq!(defaulted.devices[0].serial_number, "SN000");
}

#[test]
fn listing_counts_by_state() {
    let svc = service(ProvisioningSettings::default());
    let a = create(&svc, new_device("9900008624711007", "1007", None));
    let b = create(&svc, new_device("9900008624711008", "1008", None));
    create(&svc, new_device("9900008624711009", "1009", None));
    svc.change_state(&DeviceRef::Id(a), Some(DeviceState::Stolen))
        .unwrap();
    svc.change_state(&DeviceRef::Id(b), Some(DeviceState::Faulty))
        .unwrap();

    let listing = svc
        .list_devices(&params(&[("isDetailsRequired", "false")]))
        .unwrap();
    assert_eq!(listing.total, 3);
    assert!(listing.devices.is_empty());
    assert_eq!(listing.counts.provisioned, 1);
    assert_eq!(listing.counts.stolen, 1);
    assert_eq!(listing.counts.faulty, 1);

    let stolen_only = svc
        .list_devices(&params(&[
            ("isDetailsRequired", "true"),
            ("containsLikeFields", "isStolen"),
            ("containsLikeValues", "true"),
        ]))
        .unwrap();
    assert_eq!(stolen_only.total, 1);
    assert_eq!(stolen_only.devices[0].id, a);
}

#[test]
fn empty_filter_result_is_not_found() {
    let svc = service(ProvisioningSettings::default());
    create(&svc, new_device("9900008624711007", "1007", None));

    let err = svc
        .list_devices(&params(&[
            ("isDetailsRequired", "true"),
            ("rangeFields", "recordDate"),
            ("rangeValues", "0_1"),
        ]))
        .unwrap_err();
    assert!(matches!(
        err,
        LifecycleError::Query(QueryError::NoMatch(_))
    ));
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn history_listing_survives_delete() {
    let svc = service(ProvisioningSettings::default());
    create(&svc, new_device("9900008624711007", "1007", None));
    svc.delete(None, Some("1007")).unwrap();

    let listing = svc
        .list_history(&params(&[
            ("isDetailsRequired", "true"),
            ("containsLikeFields", "serialNumber"),
            ("containsLikeValues", "1007"),
            ("sortBy", "createdTimestamp"),
            ("sortingOrder", "asc"),
        ]))
        .unwrap();
    assert_eq!(listing.total, 2);
    assert_eq!(listing.entries[1].action, HistoryAction::Deactivated);
}

// ── Persistence ────────────────────────────────────────────────────

#[test]
fn lifecycle_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("devprov.db");

    let id = {
        let svc = LifecycleService::new(
            RecordStore::open(&path).unwrap(),
            ProvisioningSettings::default(),
        );
        let id = create(&svc, new_device("9900008624711007", "1007", None));
        svc.change_state(&DeviceRef::Id(id), Some(DeviceState::Stolen))
            .unwrap();
        id
    };

    let svc = LifecycleService::new(
        RecordStore::open(&path).unwrap(),
        ProvisioningSettings::default(),
    );
    let record = svc.get_device(&DeviceRef::Id(id)).unwrap();
    assert_eq!(record.state, "STOLEN");
    assert_eq!(svc.device_history(id).unwrap().len(), 2);
}
