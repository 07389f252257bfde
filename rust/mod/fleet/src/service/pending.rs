//! The re-flash queue: drives in `pending_update` and their way back.

use flashback_core::now_rfc3339;
use flashback_sql::Value;
use tracing::info;

use super::drive::find_drive;
use super::version::current_in_scope;
use super::{audit, rows, FleetError, FleetService};
use crate::model::*;

impl FleetService {
    /// Pending drives with the version they should be re-flashed to,
    /// ordered by holder then identifier.
    pub fn list_pending(&self) -> Result<Vec<PendingDrive>, FleetError> {
        let sql = format!(
            "SELECT {},
                    cv.id AS current_version_id,
                    cv.version_code AS current_version_code
             {}
             LEFT JOIN versions cv
                ON cv.usb_type_id = u.usb_type_id
               AND cv.model_id IS u.model_id
               AND cv.is_current = 1
             WHERE u.status = ?
             ORDER BY tech.name, u.usb_id",
            rows::DRIVE_COLUMNS,
            rows::DRIVE_FROM
        );
        self.read("list_pending", |db| {
            db.query(&sql, &[Value::from(DriveStatus::PendingUpdate.as_str())])?
                .iter()
                .map(|row| -> Result<PendingDrive, FleetError> {
                    Ok(PendingDrive {
                        drive: rows::drive(row)?,
                        current_version_id: row.get_i64("current_version_id"),
                        current_version_code: row
                            .get_str("current_version_code")
                            .map(str::to_string),
                    })
                })
                .collect()
        })
    }

    /// Record that pending drives were re-flashed to their scope's current
    /// version. Drives that are not pending, or whose scope has no current
    /// version, are skipped.
    pub fn mark_updated(&self, ids: &[DbId], username: &str) -> Result<MarkUpdatedResult, FleetError> {
        let result = self.in_tx("mark_updated", |tx| {
            let mut result = MarkUpdatedResult::default();
            for &id in ids {
                let drive = match find_drive(tx, id)? {
                    Some(d) if d.status == DriveStatus::PendingUpdate => d,
                    _ => {
                        result.skipped += 1;
                        continue;
                    }
                };
                let scope = Scope {
                    usb_type_id: drive.usb_type_id,
                    model_id: drive.model_id,
                };
                let current = match current_in_scope(tx, scope)? {
                    Some(v) => v,
                    None => {
                        result.skipped += 1;
                        continue;
                    }
                };
                tx.exec(
                    "UPDATE usb_drives SET version_id = ?, status = ?, updated_at = ? WHERE id = ?",
                    &[
                        Value::from(current.id),
                        Value::from(DriveStatus::Assigned.as_str()),
                        Value::from(now_rfc3339()),
                        Value::from(id),
                    ],
                )?;
                audit::log_event(
                    tx,
                    id,
                    EventType::Updated,
                    &format!(
                        "Version updated from {} to {}",
                        drive.version_code.as_deref().unwrap_or("Unknown"),
                        current.version_code
                    ),
                    username,
                )?;
                result.updated += 1;
            }
            Ok(result)
        })?;
        info!(
            "marked updated by {}: {} updated, {} skipped",
            username, result.updated, result.skipped
        );
        Ok(result)
    }
}
