//! Append-only drive history.

use flashback_core::now_rfc3339;
use flashback_sql::{Executor, Value};

use super::{rows, FleetError};
use crate::model::{DbId, EventType, UsbDrive};

/// Append one event row.
pub(crate) fn log_event<X: Executor + ?Sized>(
    db: &X,
    drive_id: DbId,
    event_type: EventType,
    details: &str,
    username: &str,
) -> Result<(), FleetError> {
    db.exec(
        "INSERT INTO event_logs (usb_id, event_type, details, username, timestamp)
         VALUES (?, ?, ?, ?, ?)",
        &[
            Value::from(drive_id),
            Value::from(event_type.as_str()),
            Value::from(details),
            Value::from(username),
            Value::from(now_rfc3339()),
        ],
    )?;
    Ok(())
}

/// How a holder change is recorded, or `None` when nothing changed.
pub fn technician_change(
    old: Option<DbId>,
    new: Option<DbId>,
    old_name: Option<&str>,
    new_name: Option<&str>,
) -> Option<(EventType, String)> {
    let old_name = old_name.unwrap_or("Unknown");
    let new_name = new_name.unwrap_or("Unknown");
    match (old, new) {
        (None, Some(_)) => Some((
            EventType::Assigned,
            format!("Assigned to technician: {}", new_name),
        )),
        (Some(_), None) => Some((
            EventType::Updated,
            format!("Unassigned from technician: {}", old_name),
        )),
        (Some(a), Some(b)) if a != b => Some((
            EventType::Reassigned,
            format!("Reassigned from {} to {}", old_name, new_name),
        )),
        _ => None,
    }
}

/// Log a holder change. The new holder's name is looked up here.
pub(crate) fn log_technician_change<X: Executor + ?Sized>(
    db: &X,
    drive_id: DbId,
    old: Option<DbId>,
    new: Option<DbId>,
    old_name: Option<&str>,
    username: &str,
) -> Result<bool, FleetError> {
    if old == new {
        return Ok(false);
    }
    let new_name = match new {
        Some(id) => lookup_name(db, "technicians", "name", id)?,
        None => None,
    };
    match technician_change(old, new, old_name, new_name.as_deref()) {
        Some((event_type, details)) => {
            log_event(db, drive_id, event_type, &details, username)?;
            Ok(true)
        }
        None => Ok(false),
    }
}

/// Display names of a drive's placement.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct EntityNames {
    pub usb_type: String,
    pub model: Option<String>,
    pub version: String,
    pub technician: Option<String>,
}

impl EntityNames {
    /// Names already joined onto a loaded drive.
    pub fn of_drive(drive: &UsbDrive) -> Self {
        Self {
            usb_type: drive.usb_type_name.clone().unwrap_or_default(),
            model: drive.model_name.clone(),
            version: drive.version_code.clone().unwrap_or_default(),
            technician: drive.technician_name.clone(),
        }
    }

    /// `Type/Model/Version`, or `Type/Version` without a model.
    pub fn descriptor(&self) -> String {
        match &self.model {
            Some(m) => format!("{}/{}/{}", self.usb_type, m, self.version),
            None => format!("{}/{}", self.usb_type, self.version),
        }
    }

    pub fn creation_details(&self) -> String {
        match &self.model {
            Some(m) => format!(
                "USB drive created: Type={}, Model={}, Version={}",
                self.usb_type, m, self.version
            ),
            None => format!(
                "USB drive created: Type={}, Version={}",
                self.usb_type, self.version
            ),
        }
    }
}

pub(crate) fn fetch_entity_names<X: Executor + ?Sized>(
    db: &X,
    usb_type_id: DbId,
    model_id: Option<DbId>,
    version_id: DbId,
    technician_id: Option<DbId>,
) -> Result<EntityNames, FleetError> {
    let usb_type = lookup_name(db, "usb_types", "name", usb_type_id)?
        .ok_or_else(|| FleetError::not_found("usb_type", usb_type_id))?;
    let version = lookup_name(db, "versions", "version_code", version_id)?
        .ok_or_else(|| FleetError::not_found("version", version_id))?;
    let model = match model_id {
        Some(id) => lookup_name(db, "models", "name", id)?,
        None => None,
    };
    let technician = match technician_id {
        Some(id) => lookup_name(db, "technicians", "name", id)?,
        None => None,
    };
    Ok(EntityNames { usb_type, model, version, technician })
}

fn lookup_name<X: Executor + ?Sized>(
    db: &X,
    table: &str,
    column: &str,
    id: DbId,
) -> Result<Option<String>, FleetError> {
    let sql = format!("SELECT {} AS name FROM {} WHERE id = ?", column, table);
    Ok(db
        .query_one(&sql, &[Value::from(id)])?
        .and_then(|r| r.get_str("name").map(str::to_string)))
}

/// A drive's history, newest first.
pub(crate) fn events_for<X: Executor + ?Sized>(
    db: &X,
    drive_id: DbId,
) -> Result<Vec<crate::model::EventLog>, FleetError> {
    let rows = db.query(
        "SELECT * FROM event_logs WHERE usb_id = ? ORDER BY timestamp DESC, id DESC",
        &[Value::from(drive_id)],
    )?;
    rows::all(rows, rows::event)
}
