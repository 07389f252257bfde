//! Subcommand handlers. Each one prints a single JSON document to stdout.

use anyhow::Result;
use flashback_core::ServiceError;
use flashback_sql::SqliteStore;
use fleet::model::{DbId, DriveFilters, DriveStatus, UsbId};
use fleet::FleetService;
use serde::Serialize;
use serde_json::json;
use tracing::info;

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// A drive given on the command line, by row id or by label.
#[derive(Debug, Clone, PartialEq)]
pub enum DriveRef {
    Id(DbId),
    Label(UsbId),
}

impl std::str::FromStr for DriveRef {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Ok(id) = s.parse::<DbId>() {
            return Ok(DriveRef::Id(id));
        }
        s.to_ascii_uppercase().parse::<UsbId>().map(DriveRef::Label)
    }
}

pub fn init(svc: &FleetService) -> Result<()> {
    let next = svc.peek_next_usb_id()?;
    info!("Schema ready");
    print_json(&json!({ "initialized": true, "nextUsbId": next }))
}

pub fn status(store: &SqliteStore, svc: &FleetService, database: &str) -> Result<()> {
    let health = store.health_check();
    let next = svc.peek_next_usb_id()?;
    let stats = svc.dashboard_stats()?;
    print_json(&json!({
        "database": database,
        "healthy": health.healthy,
        "latencyMs": health.latency_ms,
        "error": health.error,
        "nextUsbId": next,
        "drives": {
            "total": stats.total,
            "assigned": stats.assigned,
            "ready": stats.ready,
            "pendingUpdate": stats.pending_update,
            "lost": stats.lost,
            "retired": stats.retired,
        },
    }))
}

pub fn promote(svc: &FleetService, version_id: DbId, user: &str) -> Result<()> {
    let result = svc.promote_to_current(version_id, user)?;
    print_json(&json!({
        "versionId": version_id,
        "markedPending": result.marked_pending,
        "clearedPending": result.cleared_pending,
    }))
}

pub fn pending(svc: &FleetService) -> Result<()> {
    print_json(&svc.list_pending()?)
}

pub fn mark_updated(svc: &FleetService, ids: &[DbId], user: &str) -> Result<()> {
    print_json(&svc.mark_updated(ids, user)?)
}

pub fn events(svc: &FleetService, drive: &DriveRef) -> Result<()> {
    let id = match drive {
        DriveRef::Id(id) => *id,
        DriveRef::Label(usb_id) => svc.find_drive_by_usb_id(usb_id)?.id,
    };
    print_json(&svc.drive_events(id)?)
}

pub fn drives(svc: &FleetService, status: Option<&str>, search: Option<String>) -> Result<()> {
    let status = status
        .map(|s| s.parse::<DriveStatus>())
        .transpose()
        .map_err(ServiceError::Validation)?;
    let filters = DriveFilters {
        status,
        search,
        ..Default::default()
    };
    print_json(&svc.list_drives(&filters)?)
}

pub fn stats(svc: &FleetService) -> Result<()> {
    print_json(&svc.dashboard_stats()?)
}
