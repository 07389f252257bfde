use flashback_sql::{Executor, Row, Value};

use super::{rows, FleetError, FleetService};
use crate::model::*;

const TOP_TECHNICIANS: i64 = 10;
const RECENT_EVENTS: i64 = 20;

fn named_counts(rows: Vec<Row>) -> Result<Vec<NamedCount>, FleetError> {
    rows.iter()
        .map(|row| -> Result<NamedCount, FleetError> {
            Ok(NamedCount {
                name: row.require_str("name")?.to_string(),
                count: row.require_i64("count")?,
            })
        })
        .collect()
}

fn status_counts<X: Executor + ?Sized>(db: &X, stats: &mut DashboardStats) -> Result<(), FleetError> {
    for row in db.query("SELECT status, COUNT(*) AS count FROM usb_drives GROUP BY status", &[])? {
        let count = row.require_i64("count")?;
        let status: DriveStatus = row.require_str("status")?.parse().map_err(FleetError::Internal)?;
        stats.total += count;
        match status {
            DriveStatus::Assigned => stats.assigned = count,
            DriveStatus::Ready => stats.ready = count,
            DriveStatus::PendingUpdate => stats.pending_update = count,
            DriveStatus::Lost => stats.lost = count,
            DriveStatus::Retired => stats.retired = count,
        }
    }
    Ok(())
}

impl FleetService {
    pub fn dashboard_stats(&self) -> Result<DashboardStats, FleetError> {
        self.read("dashboard_stats", |db| {
            let mut stats = DashboardStats::default();
            status_counts(db, &mut stats)?;

            stats.by_technician = named_counts(db.query(
                "SELECT tech.name AS name, COUNT(u.id) AS count
                 FROM technicians tech JOIN usb_drives u ON u.technician_id = tech.id
                 WHERE tech.status = 'active'
                 GROUP BY tech.id
                 ORDER BY count DESC, tech.name
                 LIMIT ?",
                &[Value::from(TOP_TECHNICIANS)],
            )?)?;

            stats.by_platform = named_counts(db.query(
                "SELECT p.name AS name, COUNT(u.id) AS count
                 FROM platforms p JOIN usb_drives u ON u.platform_id = p.id
                 GROUP BY p.id
                 ORDER BY count DESC, p.name",
                &[],
            )?)?;

            stats.recent_events = db
                .query(
                    "SELECT e.*, u.usb_id AS drive_label
                     FROM event_logs e JOIN usb_drives u ON u.id = e.usb_id
                     ORDER BY e.timestamp DESC, e.id DESC
                     LIMIT ?",
                    &[Value::from(RECENT_EVENTS)],
                )?
                .iter()
                .map(|row| -> Result<RecentEvent, FleetError> {
                    Ok(RecentEvent {
                        event: rows::event(row)?,
                        usb_id: row
                            .require_str("drive_label")?
                            .parse()
                            .map_err(FleetError::Internal)?,
                    })
                })
                .collect::<Result<_, _>>()?;

            stats.warnings = db
                .query(
                    "SELECT u.id AS drive_id, u.usb_id, tech.id AS technician_id,
                            tech.name AS technician_name
                     FROM usb_drives u JOIN technicians tech ON tech.id = u.technician_id
                     WHERE tech.status = 'inactive' AND u.status NOT IN ('lost', 'retired')
                     ORDER BY u.usb_id",
                    &[],
                )?
                .iter()
                .map(|row| -> Result<InactiveHolderWarning, FleetError> {
                    Ok(InactiveHolderWarning {
                        drive_id: row.require_i64("drive_id")?,
                        usb_id: row.require_str("usb_id")?.parse().map_err(FleetError::Internal)?,
                        technician_id: row.require_i64("technician_id")?,
                        technician_name: row.require_str("technician_name")?.to_string(),
                    })
                })
                .collect::<Result<_, _>>()?;

            Ok(stats)
        })
    }
}
