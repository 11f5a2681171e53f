//! Input validation applied before any storage access.
//!
//! Identifier formats, mandatory-attribute checks, and factory date parsing
//! for create and update payloads.

use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;
use time::Date;
use time::macros::format_description;

use crate::types::{DeviceFields, DeviceUpdatePayload, NewDeviceRecord};

/// Required length of a vehicle identification number.
pub const VIN_LENGTH: usize = 17;

static NUMERIC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]+$").expect("numeric pattern compiles"));

static ALPHANUMERIC_MIN_3: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9]{3,}$").expect("alphanumeric pattern compiles"));

/// Rejected input. Never produced after storage has been touched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("missing mandatory attribute: {0}")]
    MissingAttribute(String),

    #[error("invalid imei '{0}': must be numeric")]
    InvalidImei(String),

    #[error("invalid serial number '{0}': must be alphanumeric, at least 3 characters")]
    InvalidSerialNumber(String),

    #[error("invalid device id '{0}': must be alphanumeric, at least 3 characters")]
    InvalidDeviceId(String),

    #[error("invalid vin '{0}': must be exactly {VIN_LENGTH} characters")]
    InvalidVin(String),

    #[error("invalid {field} '{value}': expected yyyy/MM/dd")]
    InvalidDate { field: String, value: String },
}

pub fn validate_imei(imei: &str) -> Result<(), ValidationError> {
    if NUMERIC.is_match(imei) {
        Ok(())
    } else {
        Err(ValidationError::InvalidImei(imei.to_string()))
    }
}

pub fn validate_serial_number(serial: &str) -> Result<(), ValidationError> {
    if ALPHANUMERIC_MIN_3.is_match(serial) {
        Ok(())
    } else {
        Err(ValidationError::InvalidSerialNumber(serial.to_string()))
    }
}

pub fn validate_device_id(device_id: &str) -> Result<(), ValidationError> {
    if ALPHANUMERIC_MIN_3.is_match(device_id) {
        Ok(())
    } else {
        Err(ValidationError::InvalidDeviceId(device_id.to_string()))
    }
}

pub fn validate_vin(vin: &str) -> Result<(), ValidationError> {
    if vin.chars().count() == VIN_LENGTH {
        Ok(())
    } else {
        Err(ValidationError::InvalidVin(vin.to_string()))
    }
}

/// Parse a `yyyy/MM/dd` factory date into epoch milliseconds at UTC midnight.
pub fn parse_factory_date(field: &str, value: &str) -> Result<i64, ValidationError> {
    let invalid = || ValidationError::InvalidDate {
        field: field.to_string(),
        value: value.to_string(),
    };
    let date = Date::parse(value.trim(), format_description!("[year]/[month]/[day]"))
        .map_err(|_| invalid())?;
    Ok(date.midnight().assume_utc().unix_timestamp() * 1000)
}

/// Return the trimmed value of a mandatory attribute. Blank counts as absent.
pub fn require<'a>(field: &str, value: Option<&'a String>) -> Result<&'a str, ValidationError> {
    match value.map(|v| v.trim()) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(ValidationError::MissingAttribute(field.to_string())),
    }
}

/// Normalize an optional attribute: trim it and treat blank as absent.
fn optional(value: Option<&String>) -> Option<String> {
    value
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

impl NewDeviceRecord {
    /// Validate a create request, returning the column values and the VIN.
    pub fn validate(&self) -> Result<(DeviceFields, Option<String>), ValidationError> {
        let serial_number = require("serialNumber", self.serial_number.as_ref())?;
        validate_serial_number(serial_number)?;
        let model = require("model", self.model.as_ref())?;
        let manufacturing_date = parse_factory_date(
            "manufacturingDate",
            require("manufacturingDate", self.manufacturing_date.as_ref())?,
        )?;
        let record_date =
            parse_factory_date("recordDate", require("recordDate", self.record_date.as_ref())?)?;

        let imei = optional(self.imei.as_ref());
        if let Some(imei) = &imei {
            validate_imei(imei)?;
        }
        let vin = optional(self.vin.as_ref());
        if let Some(vin) = &vin {
            validate_vin(vin)?;
        }

        let fields = DeviceFields {
            imei,
            serial_number: serial_number.to_string(),
            package_serial_number: optional(self.package_serial_number.as_ref()),
            iccid: optional(self.iccid.as_ref()),
            ssid: optional(self.ssid.as_ref()),
            bssid: optional(self.bssid.as_ref()),
            msisdn: optional(self.msisdn.as_ref()),
            imsi: optional(self.imsi.as_ref()),
            model: model.to_string(),
            platform_version: optional(self.platform_version.as_ref()),
            device_type: optional(self.device_type.as_ref()),
            manufacturing_date,
            record_date,
        };
        Ok((fields, vin))
    }
}

impl DeviceUpdatePayload {
    /// Check every attribute except `packageSerialNumber` and `deviceType`
    /// is present and convert the payload into column values.
    pub fn to_fields(&self) -> Result<DeviceFields, ValidationError> {
        let imei = require("imei", self.imei.as_ref())?;
        validate_imei(imei)?;
        let serial_number = require("serialNumber", self.serial_number.as_ref())?;
        validate_serial_number(serial_number)?;
        let iccid = require("iccid", self.iccid.as_ref())?;
        let ssid = require("ssid", self.ssid.as_ref())?;
        let bssid = require("bssid", self.bssid.as_ref())?;
        let msisdn = require("msisdn", self.msisdn.as_ref())?;
        let imsi = require("imsi", self.imsi.as_ref())?;
        let model = require("model", self.model.as_ref())?;
        let platform_version = require("platformVersion", self.platform_version.as_ref())?;
        let manufacturing_date = parse_factory_date(
            "manufacturingDate",
            require("manufacturingDate", self.manufacturing_date.as_ref())?,
        )?;
        let record_date =
            parse_factory_date("recordDate", require("recordDate", self.record_date.as_ref())?)?;

        Ok(DeviceFields {
            imei: Some(imei.to_string()),
            serial_number: serial_number.to_string(),
            package_serial_number: optional(self.package_serial_number.as_ref()),
            iccid: Some(iccid.to_string()),
            ssid: Some(ssid.to_string()),
            bssid: Some(bssid.to_string()),
            msisdn: Some(msisdn.to_string()),
            imsi: Some(imsi.to_string()),
            model: model.to_string(),
            platform_version: Some(platform_version.to_string()),
            device_type: optional(self.device_type.as_ref()),
            manufacturing_date,
            record_date,
        })
    }

    /// Trimmed VIN, if one was supplied.
    pub fn vin(&self) -> Option<String> {
        optional(self.vin.as_ref())
    }
}
