//! Version currency engine.
//!
//! Promoting a version makes it the single current version of its scope and
//! reconciles every drive in that scope against it, in one transaction:
//! drives on older non-legacy versions go `pending_update`, and pending
//! drives on the promoted version or a newer one (after a rollback to an
//! older release) go back to `ready`. Lost and retired drives are never
//! touched.

use flashback_core::now_rfc3339;
use flashback_sql::{Executor, Predicates, Value};
use tracing::{debug, info};

use super::version::load_version;
use super::{audit, FleetError, FleetService};
use crate::model::*;

impl FleetService {
    /// Make `version_id` the current version of its scope and cascade.
    pub fn promote_to_current(
        &self,
        version_id: DbId,
        username: &str,
    ) -> Result<PromotionResult, FleetError> {
        self.in_tx("promote_to_current", |tx| promote_in_tx(tx, version_id, username))
    }
}

/// The engine proper. Runs inside the caller's transaction.
pub(crate) fn promote_in_tx<X: Executor + ?Sized>(
    db: &X,
    version_id: DbId,
    username: &str,
) -> Result<PromotionResult, FleetError> {
    let target = load_version(db, version_id)?;
    let scope = target.scope();

    let mut others = Predicates::new();
    others
        .eq("usb_type_id", scope.usb_type_id)
        .eq_null_aware("model_id", scope.model_id)
        .raw("id != ?", [Value::from(target.id)]);
    let demoted = db.exec(
        &format!("UPDATE versions SET is_current = 0 WHERE is_current = 1{}", others.and_sql()),
        others.params(),
    )?;
    debug!("demoted {} version(s) in {}", demoted, scope);

    db.exec(
        "UPDATE versions SET is_current = 1, marked_current_at = ? WHERE id = ?",
        &[Value::from(now_rfc3339()), Value::from(target.id)],
    )?;

    let marked_pending = cascade_forward(db, &target, username)?;
    let cleared_pending = cascade_backward(db, &target, username)?;

    info!(
        "promoted version/{} ({}) in {} by {}: {} marked pending, {} cleared",
        target.id, target.version_code, scope, username, marked_pending, cleared_pending
    );
    Ok(PromotionResult { marked_pending, cleared_pending })
}

/// Drives in the target's scope, joined with their version.
fn scope_predicates(target: &Version) -> Predicates {
    let mut p = Predicates::new();
    p.eq("u.usb_type_id", target.usb_type_id)
        .eq_null_aware("u.model_id", target.model_id);
    p
}

/// `(created_at, id)` strictly before the target's.
fn older_than(p: &mut Predicates, target: &Version) {
    p.raw(
        "(v.created_at < ? OR (v.created_at = ? AND v.id < ?))",
        [
            Value::from(target.created_at.as_str()),
            Value::from(target.created_at.as_str()),
            Value::from(target.id),
        ],
    );
}

/// `(created_at, id)` equal to or after the target's.
fn not_older_than(p: &mut Predicates, target: &Version) {
    p.raw(
        "(v.created_at > ? OR (v.created_at = ? AND v.id >= ?))",
        [
            Value::from(target.created_at.as_str()),
            Value::from(target.created_at.as_str()),
            Value::from(target.id),
        ],
    );
}

fn cascade_forward<X: Executor + ?Sized>(
    db: &X,
    target: &Version,
    username: &str,
) -> Result<usize, FleetError> {
    let mut p = scope_predicates(target);
    p.raw("u.version_id != ?", [Value::from(target.id)])
        .eq("v.is_legacy_valid", false);
    older_than(&mut p, target);
    // Terminal drives are out of the fleet; pending ones are already flagged.
    let untouchable: Vec<Value> = DriveStatus::TERMINAL
        .iter()
        .chain([DriveStatus::PendingUpdate].iter())
        .map(|s| Value::from(s.as_str()))
        .collect();
    let placeholders = vec!["?"; untouchable.len()].join(", ");
    p.raw(&format!("u.status NOT IN ({})", placeholders), untouchable);

    let outdated = db.query(
        &format!(
            "SELECT u.id, v.version_code FROM usb_drives u
             JOIN versions v ON v.id = u.version_id{}
             ORDER BY u.usb_id",
            p.where_sql()
        ),
        p.params(),
    )?;

    let now = now_rfc3339();
    for row in &outdated {
        let drive_id = row.require_i64("id")?;
        let old_code = row.require_str("version_code")?;
        db.exec(
            "UPDATE usb_drives SET status = ?, updated_at = ? WHERE id = ?",
            &[
                Value::from(DriveStatus::PendingUpdate.as_str()),
                Value::from(now.as_str()),
                Value::from(drive_id),
            ],
        )?;
        audit::log_event(
            db,
            drive_id,
            EventType::MarkedPending,
            &format!(
                "Marked for update: current version {} is outdated (new current: {})",
                old_code, target.version_code
            ),
            username,
        )?;
    }
    Ok(outdated.len())
}

fn cascade_backward<X: Executor + ?Sized>(
    db: &X,
    target: &Version,
    username: &str,
) -> Result<usize, FleetError> {
    let mut p = scope_predicates(target);
    not_older_than(&mut p, target);
    p.eq("u.status", DriveStatus::PendingUpdate.as_str());

    let ahead = db.query(
        &format!(
            "SELECT u.id, u.version_id, v.version_code FROM usb_drives u
             JOIN versions v ON v.id = u.version_id{}
             ORDER BY u.usb_id",
            p.where_sql()
        ),
        p.params(),
    )?;

    let now = now_rfc3339();
    for row in &ahead {
        let drive_id = row.require_i64("id")?;
        let code = row.require_str("version_code")?;
        let details = if row.require_i64("version_id")? == target.id {
            format!("Cleared pending status: drive version {} is current again", code)
        } else {
            format!(
                "Cleared pending status: drive version {} is newer than current {}",
                code, target.version_code
            )
        };
        db.exec(
            "UPDATE usb_drives SET status = ?, updated_at = ? WHERE id = ?",
            &[
                Value::from(DriveStatus::Ready.as_str()),
                Value::from(now.as_str()),
                Value::from(drive_id),
            ],
        )?;
        audit::log_event(
            db,
            drive_id,
            EventType::StatusCleared,
            &details,
            username,
        )?;
    }
    Ok(ahead.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::testutil::{self, new_drive};

    fn status_of(svc: &FleetService, id: DbId) -> DriveStatus {
        svc.get_drive(id).unwrap().status
    }

    #[test]
    fn forward_cascade_marks_older_drives() {
        let svc = testutil::service();
        let f = testutil::fixture(&svc);
        let a = svc.create_drive(new_drive(&f, f.v1.id), "admin").unwrap();
        let b = svc.create_drive(new_drive(&f, f.v2.id), "admin").unwrap();

        let result = svc.promote_to_current(f.v2.id, "admin").unwrap();
        assert_eq!(result, PromotionResult { marked_pending: 1, cleared_pending: 0 });
        assert_eq!(status_of(&svc, a.id), DriveStatus::PendingUpdate);
        assert_eq!(status_of(&svc, b.id), DriveStatus::Ready);

        let events = svc.drive_events(a.id).unwrap();
        assert_eq!(events[0].event_type, EventType::MarkedPending);
        assert_eq!(
            events[0].details,
            "Marked for update: current version V1 is outdated (new current: V2)"
        );
    }

    #[test]
    fn backward_cascade_clears_newer_drives() {
        let svc = testutil::service();
        let f = testutil::fixture(&svc);
        let a = svc.create_drive(new_drive(&f, f.v2.id), "admin").unwrap();
        svc.store()
            .exec(
                "UPDATE usb_drives SET status = 'pending_update' WHERE id = ?",
                &[Value::from(a.id)],
            )
            .unwrap();

        let result = svc.promote_to_current(f.v1.id, "admin").unwrap();
        assert_eq!(result, PromotionResult { marked_pending: 0, cleared_pending: 1 });
        assert_eq!(status_of(&svc, a.id), DriveStatus::Ready);
        let events = svc.drive_events(a.id).unwrap();
        assert_eq!(
            events[0].details,
            "Cleared pending status: drive version V2 is newer than current V1"
        );
    }

    #[test]
    fn rollback_clears_drives_on_promoted_version() {
        let svc = testutil::service();
        let f = testutil::fixture(&svc);
        let a = svc.create_drive(new_drive(&f, f.v1.id), "admin").unwrap();
        svc.promote_to_current(f.v2.id, "admin").unwrap();
        assert_eq!(status_of(&svc, a.id), DriveStatus::PendingUpdate);

        let result = svc.promote_to_current(f.v1.id, "admin").unwrap();
        assert_eq!(result, PromotionResult { marked_pending: 0, cleared_pending: 1 });
        assert_eq!(status_of(&svc, a.id), DriveStatus::Ready);
        let events = svc.drive_events(a.id).unwrap();
        assert_eq!(events[0].event_type, EventType::StatusCleared);
        assert_eq!(
            events[0].details,
            "Cleared pending status: drive version V1 is current again"
        );
    }

    #[test]
    fn promotion_demotes_previous_current() {
        let svc = testutil::service();
        let f = testutil::fixture(&svc);
        svc.promote_to_current(f.v1.id, "admin").unwrap();
        svc.promote_to_current(f.v2.id, "admin").unwrap();
        assert!(!svc.get_version(f.v1.id).unwrap().is_current);
        assert!(svc.get_version(f.v2.id).unwrap().is_current);
    }

    #[test]
    fn repeated_promotion_is_quiet() {
        let svc = testutil::service();
        let f = testutil::fixture(&svc);
        let a = svc.create_drive(new_drive(&f, f.v1.id), "admin").unwrap();
        assert_eq!(svc.promote_to_current(f.v2.id, "admin").unwrap().marked_pending, 1);
        assert_eq!(
            svc.promote_to_current(f.v2.id, "admin").unwrap(),
            PromotionResult::default()
        );
        let marked = svc
            .drive_events(a.id)
            .unwrap()
            .into_iter()
            .filter(|e| e.event_type == EventType::MarkedPending)
            .count();
        assert_eq!(marked, 1);
    }

    #[test]
    fn equal_timestamps_break_ties_by_id() {
        let svc = testutil::service();
        let f = testutil::fixture(&svc);
        let twin = |code: &str| {
            svc.create_version(
                CreateVersion {
                    usb_type_id: f.usb_type.id,
                    version_code: code.into(),
                    created_at: Some("2024-03-01".into()),
                    ..Default::default()
                },
                "admin",
            )
            .unwrap()
        };
        let first = twin("R1");
        let second = twin("R2");
        let on_first = svc.create_drive(new_drive(&f, first.id), "admin").unwrap();
        let on_second = svc.create_drive(new_drive(&f, second.id), "admin").unwrap();

        svc.promote_to_current(second.id, "admin").unwrap();
        assert_eq!(status_of(&svc, on_first.id), DriveStatus::PendingUpdate);
        assert_eq!(status_of(&svc, on_second.id), DriveStatus::Ready);
    }

    #[test]
    fn missing_version_is_not_found() {
        let svc = testutil::service();
        let err = svc.promote_to_current(404, "admin").unwrap_err();
        assert!(matches!(err, FleetError::NotFound(_)));
        assert!(err.to_string().contains("version/404"));
    }
}
