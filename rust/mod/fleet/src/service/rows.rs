//! Row → record mapping shared by the service modules.

use std::str::FromStr;

use flashback_sql::Row;

use super::FleetError;
use crate::model::*;

/// Versions with their type and model names.
pub(crate) const VERSION_SELECT: &str = "SELECT v.*, t.name AS usb_type_name, m.name AS model_name
     FROM versions v
     JOIN usb_types t ON t.id = v.usb_type_id
     LEFT JOIN models m ON m.id = v.model_id";

/// Drive columns with every display name joined in. Pair with [`DRIVE_FROM`].
pub(crate) const DRIVE_COLUMNS: &str = "u.*,
        p.name AS platform_name,
        t.name AS usb_type_name,
        m.name AS model_name,
        v.version_code AS version_code,
        tech.name AS technician_name";

pub(crate) const DRIVE_FROM: &str = "FROM usb_drives u
     JOIN platforms p ON p.id = u.platform_id
     JOIN usb_types t ON t.id = u.usb_type_id
     LEFT JOIN models m ON m.id = u.model_id
     JOIN versions v ON v.id = u.version_id
     LEFT JOIN technicians tech ON tech.id = u.technician_id";

pub(crate) fn drive_select() -> String {
    format!("SELECT {} {}", DRIVE_COLUMNS, DRIVE_FROM)
}

fn text(row: &Row, name: &str) -> Option<String> {
    row.get_str(name).map(str::to_string)
}

fn required(row: &Row, name: &str) -> Result<String, FleetError> {
    Ok(row.require_str(name)?.to_string())
}

fn parsed<T: FromStr<Err = String>>(row: &Row, name: &str) -> Result<T, FleetError> {
    row.require_str(name)?.parse().map_err(FleetError::Internal)
}

pub(crate) fn platform(row: &Row) -> Result<Platform, FleetError> {
    Ok(Platform {
        id: row.require_i64("id")?,
        name: required(row, "name")?,
        status: parsed(row, "status")?,
        created_at: required(row, "created_at")?,
    })
}

pub(crate) fn usb_type(row: &Row) -> Result<UsbType, FleetError> {
    Ok(UsbType {
        id: row.require_i64("id")?,
        platform_id: row.require_i64("platform_id")?,
        name: required(row, "name")?,
        requires_model: row.get_bool("requires_model"),
        supports_legacy: row.get_bool("supports_legacy"),
        status: parsed(row, "status")?,
        created_at: required(row, "created_at")?,
        platform_name: text(row, "platform_name"),
    })
}

pub(crate) fn model(row: &Row) -> Result<Model, FleetError> {
    Ok(Model {
        id: row.require_i64("id")?,
        name: required(row, "name")?,
        model_number: text(row, "model_number"),
        notes: text(row, "notes"),
        status: parsed(row, "status")?,
        created_at: required(row, "created_at")?,
    })
}

pub(crate) fn technician(row: &Row) -> Result<Technician, FleetError> {
    Ok(Technician {
        id: row.require_i64("id")?,
        name: required(row, "name")?,
        notes: text(row, "notes"),
        status: parsed(row, "status")?,
        created_at: required(row, "created_at")?,
    })
}

pub(crate) fn version(row: &Row) -> Result<Version, FleetError> {
    Ok(Version {
        id: row.require_i64("id")?,
        usb_type_id: row.require_i64("usb_type_id")?,
        model_id: row.get_i64("model_id"),
        version_code: required(row, "version_code")?,
        is_current: row.get_bool("is_current"),
        is_legacy_valid: row.get_bool("is_legacy_valid"),
        official_link: text(row, "official_link"),
        internal_link: text(row, "internal_link"),
        comments: text(row, "comments"),
        created_at: required(row, "created_at")?,
        marked_current_at: text(row, "marked_current_at"),
        status: parsed(row, "status")?,
        usb_type_name: text(row, "usb_type_name"),
        model_name: text(row, "model_name"),
    })
}

pub(crate) fn drive(row: &Row) -> Result<UsbDrive, FleetError> {
    Ok(UsbDrive {
        id: row.require_i64("id")?,
        usb_id: parsed(row, "usb_id")?,
        platform_id: row.require_i64("platform_id")?,
        usb_type_id: row.require_i64("usb_type_id")?,
        model_id: row.get_i64("model_id"),
        version_id: row.require_i64("version_id")?,
        technician_id: row.get_i64("technician_id"),
        custom_text: text(row, "custom_text"),
        hardware_model: text(row, "hardware_model"),
        hardware_serial: text(row, "hardware_serial"),
        capacity_gb: row.get_f64("capacity_gb"),
        status: parsed(row, "status")?,
        created_at: required(row, "created_at")?,
        updated_at: required(row, "updated_at")?,
        platform_name: text(row, "platform_name"),
        usb_type_name: text(row, "usb_type_name"),
        model_name: text(row, "model_name"),
        version_code: text(row, "version_code"),
        technician_name: text(row, "technician_name"),
    })
}

pub(crate) fn event(row: &Row) -> Result<EventLog, FleetError> {
    Ok(EventLog {
        id: row.require_i64("id")?,
        drive_id: row.require_i64("usb_id")?,
        event_type: parsed(row, "event_type")?,
        details: required(row, "details")?,
        username: required(row, "username")?,
        timestamp: required(row, "timestamp")?,
    })
}

pub(crate) fn all<T>(
    rows: Vec<Row>,
    map: impl Fn(&Row) -> Result<T, FleetError>,
) -> Result<Vec<T>, FleetError> {
    rows.iter().map(map).collect()
}
