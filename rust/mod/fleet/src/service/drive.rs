//! Drive lifecycle: creation, edits, repurposing and bulk edits.
//!
//! Every operation validates, mutates and writes its audit rows in a single
//! transaction.

use flashback_core::now_rfc3339;
use flashback_sql::{Executor, Predicates, Value};
use tracing::info;

use super::audit::{self, EntityNames};
use super::catalog::{
    as_validation, clean_text, insert_returning_id, load_model, load_platform, load_technician,
    load_usb_type,
};
use super::version::load_version;
use super::{allocator, rows, FleetError, FleetService};
use crate::model::*;

/// Columns a drive search term may match.
const SEARCH_COLUMNS: [&str; 8] = [
    "u.usb_id",
    "tech.name",
    "m.name",
    "m.model_number",
    "t.name",
    "p.name",
    "u.custom_text",
    "v.version_code",
];

pub(crate) fn find_drive<X: Executor + ?Sized>(
    db: &X,
    id: DbId,
) -> Result<Option<UsbDrive>, FleetError> {
    let sql = format!("{} WHERE u.id = ?", rows::drive_select());
    db.query_one(&sql, &[Value::from(id)])?
        .map(|row| rows::drive(&row))
        .transpose()
}

pub(crate) fn load_drive<X: Executor + ?Sized>(db: &X, id: DbId) -> Result<UsbDrive, FleetError> {
    find_drive(db, id)?.ok_or_else(|| FleetError::not_found("usb_drive", id))
}

/// Check that a placement is complete, active and self-consistent.
pub(crate) fn validate_placement<X: Executor + ?Sized>(
    db: &X,
    platform_id: DbId,
    usb_type_id: DbId,
    model_id: Option<DbId>,
    version_id: DbId,
) -> Result<(), FleetError> {
    let platform = load_platform(db, platform_id).map_err(as_validation)?;
    if platform.status != EntityStatus::Active {
        return Err(inactive("platform", platform.id, &platform.name));
    }

    let usb_type = load_usb_type(db, usb_type_id).map_err(as_validation)?;
    if usb_type.status != EntityStatus::Active {
        return Err(inactive("usb_type", usb_type.id, &usb_type.name));
    }
    if usb_type.platform_id != platform_id {
        return Err(FleetError::Validation(format!(
            "usb_type/{} does not belong to platform/{}",
            usb_type_id, platform_id
        )));
    }

    match model_id {
        Some(id) => {
            let model = load_model(db, id).map_err(as_validation)?;
            if model.status != EntityStatus::Active {
                return Err(inactive("model", model.id, &model.name));
            }
        }
        None if usb_type.requires_model => {
            return Err(FleetError::Validation(format!(
                "usb_type/{} ({}) requires a model",
                usb_type.id, usb_type.name
            )));
        }
        None => {}
    }

    let version = load_version(db, version_id).map_err(as_validation)?;
    if version.status != EntityStatus::Active {
        return Err(inactive("version", version.id, &version.version_code));
    }
    let scope = Scope { usb_type_id, model_id };
    if version.scope() != scope {
        return Err(FleetError::Validation(format!(
            "version/{} belongs to {}, not {}",
            version.id,
            version.scope(),
            scope
        )));
    }
    Ok(())
}

fn inactive(kind: &str, id: DbId, name: &str) -> FleetError {
    FleetError::Validation(format!("{}/{} ({}) is inactive", kind, id, name))
}

/// A given technician must exist; inactive ones may still hold drives.
fn check_technician<X: Executor + ?Sized>(db: &X, id: Option<DbId>) -> Result<(), FleetError> {
    if let Some(id) = id {
        load_technician(db, id)?;
    }
    Ok(())
}

/// Validate a creation request once and resolve its display names.
fn prepare_new<X: Executor + ?Sized>(db: &X, input: &NewDrive) -> Result<EntityNames, FleetError> {
    validate_placement(
        db,
        input.platform_id,
        input.usb_type_id,
        input.model_id,
        input.version_id,
    )?;
    check_technician(db, input.technician_id)?;
    audit::fetch_entity_names(
        db,
        input.usb_type_id,
        input.model_id,
        input.version_id,
        input.technician_id,
    )
}

fn insert_drive<X: Executor + ?Sized>(
    db: &X,
    input: &NewDrive,
    hardware: &HardwareInfo,
    names: &EntityNames,
    username: &str,
) -> Result<CreatedDrive, FleetError> {
    let usb_id = allocator::allocate(db)?;
    let status = if input.technician_id.is_some() {
        DriveStatus::Assigned
    } else {
        DriveStatus::Ready
    };
    let now = now_rfc3339();
    let id = insert_returning_id(
        db,
        "INSERT INTO usb_drives (usb_id, platform_id, usb_type_id, model_id, version_id,
                                 technician_id, custom_text, hardware_model, hardware_serial,
                                 capacity_gb, status, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) RETURNING id",
        &[
            Value::from(usb_id.as_str()),
            Value::from(input.platform_id),
            Value::from(input.usb_type_id),
            Value::from(input.model_id),
            Value::from(input.version_id),
            Value::from(input.technician_id),
            Value::from(clean_text(input.custom_text.as_deref())),
            Value::from(clean_text(hardware.hardware_model.as_deref())),
            Value::from(clean_text(hardware.hardware_serial.as_deref())),
            Value::from(hardware.capacity_gb),
            Value::from(status.as_str()),
            Value::from(now.as_str()),
            Value::from(now.as_str()),
        ],
    )?;

    audit::log_event(db, id, EventType::Created, &names.creation_details(), username)?;
    audit::log_technician_change(db, id, None, input.technician_id, None, username)?;
    Ok(CreatedDrive { id, usb_id })
}

/// The editable state of a drive row.
#[derive(Debug, Clone, PartialEq)]
struct DriveState {
    platform_id: DbId,
    usb_type_id: DbId,
    model_id: Option<DbId>,
    version_id: DbId,
    technician_id: Option<DbId>,
    status: DriveStatus,
    custom_text: Option<String>,
}

impl DriveState {
    fn of(drive: &UsbDrive) -> Self {
        Self {
            platform_id: drive.platform_id,
            usb_type_id: drive.usb_type_id,
            model_id: drive.model_id,
            version_id: drive.version_id,
            technician_id: drive.technician_id,
            status: drive.status,
            custom_text: drive.custom_text.clone(),
        }
    }

    fn scope(&self) -> Scope {
        Scope {
            usb_type_id: self.usb_type_id,
            model_id: self.model_id,
        }
    }
}

fn write_state<X: Executor + ?Sized>(
    db: &X,
    drive_id: DbId,
    state: &DriveState,
) -> Result<(), FleetError> {
    db.exec(
        "UPDATE usb_drives
         SET platform_id = ?, usb_type_id = ?, model_id = ?, version_id = ?,
             technician_id = ?, status = ?, custom_text = ?, updated_at = ?
         WHERE id = ?",
        &[
            Value::from(state.platform_id),
            Value::from(state.usb_type_id),
            Value::from(state.model_id),
            Value::from(state.version_id),
            Value::from(state.technician_id),
            Value::from(state.status.as_str()),
            Value::from(state.custom_text.clone()),
            Value::from(now_rfc3339()),
            Value::from(drive_id),
        ],
    )?;
    Ok(())
}

/// How a status change is recorded, or `None` when nothing changed.
pub fn status_change(old: DriveStatus, new: DriveStatus) -> Option<(EventType, String)> {
    if old == new {
        return None;
    }
    let details = format!("Status changed from {} to {}", old, new);
    if let Some(event_type) = EventType::for_terminal(new) {
        Some((event_type, details))
    } else if old.is_terminal() {
        Some((EventType::Reactivated, format!("Reactivated: {}", details)))
    } else {
        Some((EventType::Updated, details))
    }
}

fn custom_text_change(old: &Option<String>, new: &Option<String>) -> Option<(EventType, String)> {
    if old == new {
        return None;
    }
    let details = match new {
        Some(text) => format!("Custom text set to: {}", text),
        None => "Custom text cleared".to_string(),
    };
    Some((EventType::Updated, details))
}

/// Audit entries for an edit, one per changed dimension.
#[derive(Debug, Default)]
struct DriveDiff {
    placement: Option<(EventType, String)>,
    technician: Option<(EventType, String)>,
    rest: Vec<(EventType, String)>,
}

impl DriveDiff {
    fn is_empty(&self) -> bool {
        self.placement.is_none() && self.technician.is_none() && self.rest.is_empty()
    }

    /// All entries in log order: placement, holder, status, custom text.
    fn into_entries(self) -> impl Iterator<Item = (EventType, String)> {
        self.placement.into_iter().chain(self.technician).chain(self.rest)
    }
}

/// Diff a drive against its edited state. `verb` words a version change
/// ("updated" for single edits, "changed" for bulk edits).
fn diff_entries<X: Executor + ?Sized>(
    db: &X,
    before: &UsbDrive,
    after: &DriveState,
    verb: &str,
) -> Result<DriveDiff, FleetError> {
    let mut diff = DriveDiff::default();
    if DriveState::of(before) == *after {
        return Ok(diff);
    }
    let old = EntityNames::of_drive(before);
    let new = audit::fetch_entity_names(
        db,
        after.usb_type_id,
        after.model_id,
        after.version_id,
        after.technician_id,
    )?;

    if before.usb_type_id != after.usb_type_id || before.model_id != after.model_id {
        diff.placement = Some((
            EventType::Repurpose,
            format!("Repurposed from {} to {}", old.descriptor(), new.descriptor()),
        ));
    } else if before.version_id != after.version_id {
        diff.placement = Some((
            EventType::Updated,
            format!("Version {} from {} to {}", verb, old.version, new.version),
        ));
    }
    diff.technician = audit::technician_change(
        before.technician_id,
        after.technician_id,
        old.technician.as_deref(),
        new.technician.as_deref(),
    );
    diff.rest.extend(status_change(before.status, after.status));
    diff.rest.extend(custom_text_change(&before.custom_text, &after.custom_text));
    Ok(diff)
}

impl FleetService {
    /// Register one drive. Its identifier is allocated in the same transaction.
    pub fn create_drive(&self, input: NewDrive, username: &str) -> Result<CreatedDrive, FleetError> {
        let created = self.in_tx("create_drive", |tx| {
            let names = prepare_new(tx, &input)?;
            insert_drive(tx, &input, &input.hardware, &names, username)
        })?;
        info!("created drive {} (usb_drive/{}) by {}", created.usb_id, created.id, username);
        Ok(created)
    }

    /// Register `quantity` identical drives.
    pub fn create_series(
        &self,
        input: NewDrive,
        quantity: usize,
        username: &str,
    ) -> Result<Vec<CreatedDrive>, FleetError> {
        if quantity == 0 {
            return Err(FleetError::Validation("quantity must be at least 1".into())
                .context("create_series"));
        }
        let created = self.in_tx("create_series", |tx| {
            let names = prepare_new(tx, &input)?;
            (0..quantity)
                .map(|_| insert_drive(tx, &input, &input.hardware, &names, username))
                .collect::<Result<Vec<_>, _>>()
        })?;
        log_batch("series", &created, username);
        Ok(created)
    }

    /// Register one drive per detected device, merging each device's
    /// hardware attributes over the common ones.
    pub fn bulk_register(
        &self,
        input: NewDrive,
        devices: Vec<HardwareInfo>,
        username: &str,
    ) -> Result<Vec<CreatedDrive>, FleetError> {
        if devices.is_empty() {
            return Err(FleetError::Validation("no devices to register".into())
                .context("bulk_register"));
        }
        let created = self.in_tx("bulk_register", |tx| {
            let names = prepare_new(tx, &input)?;
            devices
                .iter()
                .map(|device| {
                    let hardware = device.merged_over(&input.hardware);
                    insert_drive(tx, &input, &hardware, &names, username)
                })
                .collect::<Result<Vec<_>, _>>()
        })?;
        log_batch("bulk registration", &created, username);
        Ok(created)
    }

    pub fn get_drive(&self, id: DbId) -> Result<UsbDrive, FleetError> {
        self.read("get_drive", |db| load_drive(db, id))
    }

    pub fn find_drive_by_usb_id(&self, usb_id: &UsbId) -> Result<UsbDrive, FleetError> {
        self.read("find_drive_by_usb_id", |db| {
            let sql = format!("{} WHERE u.usb_id = ?", rows::drive_select());
            let row = db
                .query_one(&sql, &[Value::from(usb_id.as_str())])?
                .ok_or_else(|| FleetError::NotFound(format!("usb_drive/{}", usb_id)))?;
            rows::drive(&row)
        })
    }

    /// Drives matching every given filter, ordered by identifier.
    pub fn list_drives(&self, filters: &DriveFilters) -> Result<Vec<UsbDrive>, FleetError> {
        let mut p = Predicates::new();
        p.eq_opt("u.platform_id", filters.platform_id)
            .eq_opt("u.usb_type_id", filters.usb_type_id)
            .eq_opt("u.model_id", filters.model_id)
            .eq_opt("u.technician_id", filters.technician_id)
            .eq_opt("u.status", filters.status.map(|s| s.as_str()));
        if let Some(search) = &filters.search {
            for term in search.split_whitespace() {
                p.like_any(&SEARCH_COLUMNS, term);
            }
        }
        let sql = format!("{}{} ORDER BY u.usb_id", rows::drive_select(), p.where_sql());
        self.read("list_drives", |db| {
            rows::all(db.query(&sql, p.params())?, rows::drive)
        })
    }

    /// A drive's history, newest first.
    pub fn drive_events(&self, id: DbId) -> Result<Vec<EventLog>, FleetError> {
        self.read("drive_events", |db| {
            load_drive(db, id)?;
            audit::events_for(db, id)
        })
    }

    /// Replace version, holder, status and custom text, logging each change.
    pub fn update_drive(
        &self,
        id: DbId,
        input: DriveUpdate,
        username: &str,
    ) -> Result<UsbDrive, FleetError> {
        self.in_tx("update_drive", |tx| {
            let before = load_drive(tx, id)?;
            let current = DriveState::of(&before);
            if input.version_id != before.version_id {
                let version = load_version(tx, input.version_id).map_err(as_validation)?;
                if version.scope() != current.scope() {
                    return Err(FleetError::Validation(format!(
                        "version/{} belongs to {}, not the drive's {}",
                        version.id,
                        version.scope(),
                        current.scope()
                    )));
                }
            }
            check_technician(tx, input.technician_id)?;

            let after = DriveState {
                version_id: input.version_id,
                technician_id: input.technician_id,
                status: input.status,
                custom_text: clean_text(input.custom_text.as_deref()),
                ..current
            };
            let diff = diff_entries(tx, &before, &after, "updated")?;
            if !diff.is_empty() {
                write_state(tx, id, &after)?;
                if let Some((event_type, details)) = &diff.placement {
                    audit::log_event(tx, id, *event_type, details, username)?;
                }
                audit::log_technician_change(
                    tx,
                    id,
                    before.technician_id,
                    after.technician_id,
                    before.technician_name.as_deref(),
                    username,
                )?;
                for (event_type, details) in &diff.rest {
                    audit::log_event(tx, id, *event_type, details, username)?;
                }
            }
            load_drive(tx, id)
        })
    }

    /// Move a drive to a new placement. The drive ends up `assigned`.
    pub fn repurpose_drive(
        &self,
        id: DbId,
        input: Repurpose,
        username: &str,
    ) -> Result<UsbDrive, FleetError> {
        self.in_tx("repurpose_drive", |tx| {
            let before = load_drive(tx, id)?;
            validate_placement(
                tx,
                input.platform_id,
                input.usb_type_id,
                input.model_id,
                input.version_id,
            )?;
            check_technician(tx, input.technician_id)?;

            let old = EntityNames::of_drive(&before);
            let new = audit::fetch_entity_names(
                tx,
                input.usb_type_id,
                input.model_id,
                input.version_id,
                input.technician_id,
            )?;
            let mut details = format!("Repurposed from {} to {}", old.descriptor(), new.descriptor());
            if input.technician_id.is_some() && input.technician_id != before.technician_id {
                details.push_str(&format!(
                    ", assigned to {}",
                    new.technician.as_deref().unwrap_or("Unknown")
                ));
            }

            write_state(
                tx,
                id,
                &DriveState {
                    platform_id: input.platform_id,
                    usb_type_id: input.usb_type_id,
                    model_id: input.model_id,
                    version_id: input.version_id,
                    technician_id: input.technician_id,
                    status: DriveStatus::Assigned,
                    custom_text: clean_text(input.custom_text.as_deref()),
                },
            )?;
            audit::log_event(tx, id, EventType::Repurpose, &details, username)?;
            load_drive(tx, id)
        })
    }

    /// Apply the same edit to many drives. Unknown ids and drives the edit
    /// would not change are skipped.
    pub fn bulk_update(
        &self,
        ids: &[DbId],
        update: BulkUpdate,
        username: &str,
    ) -> Result<BulkUpdateResult, FleetError> {
        let result = self.in_tx("bulk_update", |tx| {
            let placement = match &update.repurpose {
                Some(r) => {
                    let usb_type = load_usb_type(tx, r.usb_type_id).map_err(as_validation)?;
                    validate_placement(
                        tx,
                        usb_type.platform_id,
                        r.usb_type_id,
                        r.model_id,
                        r.version_id,
                    )?;
                    Some((usb_type.platform_id, r))
                }
                None => None,
            };
            let version = match update.version_id {
                Some(v) if placement.is_none() => {
                    Some(load_version(tx, v).map_err(as_validation)?)
                }
                _ => None,
            };
            if let Some(Some(t)) = update.technician_id {
                load_technician(tx, t)?;
            }

            let mut result = BulkUpdateResult::default();
            for &id in ids {
                let before = match find_drive(tx, id)? {
                    Some(d) => d,
                    None => {
                        result.skipped += 1;
                        continue;
                    }
                };
                let mut after = DriveState::of(&before);
                if let Some((platform_id, r)) = placement {
                    after.platform_id = platform_id;
                    after.usb_type_id = r.usb_type_id;
                    after.model_id = r.model_id;
                    after.version_id = r.version_id;
                } else if let Some(v) = &version {
                    if v.scope() != after.scope() {
                        return Err(FleetError::Validation(format!(
                            "version/{} does not belong to the scope of drive {}",
                            v.id, before.usb_id
                        )));
                    }
                    after.version_id = v.id;
                }
                if let Some(t) = update.technician_id {
                    after.technician_id = t;
                }
                if let Some(s) = update.status {
                    after.status = s;
                }
                if let Some(text) = &update.custom_text {
                    after.custom_text = clean_text(text.as_deref());
                }

                let diff = diff_entries(tx, &before, &after, "changed")?;
                if diff.is_empty() {
                    result.skipped += 1;
                    continue;
                }
                write_state(tx, id, &after)?;
                for (event_type, details) in diff.into_entries() {
                    let details = format!("[Bulk Edit] {}", details);
                    audit::log_event(tx, id, event_type, &details, username)?;
                }
                result.updated += 1;
            }
            Ok(result)
        })?;
        info!(
            "bulk edit by {}: {} updated, {} skipped",
            username, result.updated, result.skipped
        );
        Ok(result)
    }
}

fn log_batch(kind: &str, created: &[CreatedDrive], username: &str) {
    if let (Some(first), Some(last)) = (created.first(), created.last()) {
        info!(
            "created {} drive(s) by {} ({}): {}..{}",
            created.len(),
            kind,
            username,
            first.usb_id,
            last.usb_id
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::catalog::CatalogKind;
    use crate::service::testutil::{self, new_drive};

    fn event_types(svc: &FleetService, id: DbId) -> Vec<EventType> {
        let mut events = svc.drive_events(id).unwrap();
        events.reverse();
        events.into_iter().map(|e| e.event_type).collect()
    }

    #[test]
    fn create_logs_created_and_assigned() {
        let svc = testutil::service();
        let f = testutil::fixture(&svc);

        let ready = svc.create_drive(new_drive(&f, f.v1.id), "admin").unwrap();
        assert_eq!(ready.usb_id.as_str(), "A001");
        let drive = svc.get_drive(ready.id).unwrap();
        assert_eq!(drive.status, DriveStatus::Ready);
        assert_eq!(drive.version_code.as_deref(), Some("V1"));
        let events = svc.drive_events(ready.id).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(
            events[0].details,
            "USB drive created: Type=Win11 Installer, Version=V1"
        );

        let held = svc
            .create_drive(
                NewDrive { technician_id: Some(f.tech.id), ..new_drive(&f, f.v1.id) },
                "admin",
            )
            .unwrap();
        assert_eq!(svc.get_drive(held.id).unwrap().status, DriveStatus::Assigned);
        assert_eq!(event_types(&svc, held.id), [EventType::Created, EventType::Assigned]);
        let events = svc.drive_events(held.id).unwrap();
        assert_eq!(events[0].details, "Assigned to technician: Alice");
    }

    #[test]
    fn create_rejects_bad_placement() {
        let svc = testutil::service();
        let f = testutil::fixture(&svc);
        let other = svc.create_platform(CreatePlatform { name: "Linux".into() }).unwrap();

        let err = svc
            .create_drive(NewDrive { platform_id: other.id, ..new_drive(&f, f.v1.id) }, "admin")
            .unwrap_err();
        assert!(matches!(err, FleetError::Validation(_)));

        let err = svc
            .create_drive(NewDrive { model_id: Some(9), ..new_drive(&f, f.v1.id) }, "admin")
            .unwrap_err();
        assert!(matches!(err, FleetError::Validation(_)));

        let err = svc
            .create_drive(NewDrive { technician_id: Some(99), ..new_drive(&f, f.v1.id) }, "admin")
            .unwrap_err();
        assert!(matches!(err, FleetError::NotFound(_)));

        svc.set_status(CatalogKind::Version, f.v1.id, EntityStatus::Inactive).unwrap();
        let err = svc.create_drive(new_drive(&f, f.v1.id), "admin").unwrap_err();
        assert!(err.to_string().contains("inactive"));

        // Nothing was allocated by the failed attempts.
        assert_eq!(svc.peek_next_usb_id().unwrap().unwrap().as_str(), "A001");
    }

    #[test]
    fn inactive_technician_may_hold_drives() {
        let svc = testutil::service();
        let f = testutil::fixture(&svc);
        svc.set_status(CatalogKind::Technician, f.tech.id, EntityStatus::Inactive).unwrap();
        let created = svc
            .create_drive(
                NewDrive { technician_id: Some(f.tech.id), ..new_drive(&f, f.v1.id) },
                "admin",
            )
            .unwrap();
        assert_eq!(svc.get_drive(created.id).unwrap().technician_id, Some(f.tech.id));
    }

    #[test]
    fn series_and_bulk_registration() {
        let svc = testutil::service();
        let f = testutil::fixture(&svc);
        let series = svc.create_series(new_drive(&f, f.v2.id), 3, "admin").unwrap();
        let ids: Vec<_> = series.iter().map(|c| c.usb_id.to_string()).collect();
        assert_eq!(ids, ["A001", "A002", "A003"]);
        assert!(svc.create_series(new_drive(&f, f.v2.id), 0, "admin").is_err());

        let common = NewDrive {
            hardware: HardwareInfo {
                hardware_model: Some("Cruzer".into()),
                capacity_gb: Some(32.0),
                ..Default::default()
            },
            ..new_drive(&f, f.v2.id)
        };
        let devices = vec![
            HardwareInfo { hardware_serial: Some("SN-1".into()), ..Default::default() },
            HardwareInfo {
                hardware_serial: Some("SN-2".into()),
                capacity_gb: Some(64.0),
                ..Default::default()
            },
        ];
        let created = svc.bulk_register(common, devices, "admin").unwrap();
        assert_eq!(created.len(), 2);
        let second = svc.get_drive(created[1].id).unwrap();
        assert_eq!(second.usb_id.as_str(), "A005");
        assert_eq!(second.hardware_model.as_deref(), Some("Cruzer"));
        assert_eq!(second.hardware_serial.as_deref(), Some("SN-2"));
        assert_eq!(second.capacity_gb, Some(64.0));
        assert_eq!(svc.drive_events(second.id).unwrap().len(), 1);
    }

    #[test]
    fn update_logs_each_changed_field() {
        let svc = testutil::service();
        let f = testutil::fixture(&svc);
        let d = svc.create_drive(new_drive(&f, f.v1.id), "admin").unwrap();

        let drive = svc
            .update_drive(
                d.id,
                DriveUpdate {
                    version_id: f.v2.id,
                    technician_id: Some(f.tech.id),
                    status: DriveStatus::Assigned,
                    custom_text: Some("lab".into()),
                },
                "bob",
            )
            .unwrap();
        assert_eq!(drive.version_id, f.v2.id);
        assert_eq!(
            event_types(&svc, d.id),
            [
                EventType::Created,
                EventType::Updated,
                EventType::Assigned,
                EventType::Updated,
                EventType::Updated
            ]
        );
        let details: Vec<String> =
            svc.drive_events(d.id).unwrap().into_iter().rev().map(|e| e.details).collect();
        assert_eq!(details[1], "Version updated from V1 to V2");
        assert_eq!(details[2], "Assigned to technician: Alice");
        assert_eq!(details[3], "Status changed from ready to assigned");
        assert_eq!(details[4], "Custom text set to: lab");

        // Same values again: nothing logged.
        svc.update_drive(
            d.id,
            DriveUpdate {
                version_id: f.v2.id,
                technician_id: Some(f.tech.id),
                status: DriveStatus::Assigned,
                custom_text: Some("lab".into()),
            },
            "bob",
        )
        .unwrap();
        assert_eq!(svc.drive_events(d.id).unwrap().len(), 5);
    }

    #[test]
    fn terminal_transitions() {
        let svc = testutil::service();
        let f = testutil::fixture(&svc);
        let d = svc.create_drive(new_drive(&f, f.v1.id), "admin").unwrap();
        let update = |status| DriveUpdate {
            version_id: f.v1.id,
            technician_id: None,
            status,
            custom_text: None,
        };
        svc.update_drive(d.id, update(DriveStatus::Lost), "admin").unwrap();
        svc.update_drive(d.id, update(DriveStatus::Ready), "admin").unwrap();
        svc.update_drive(d.id, update(DriveStatus::Retired), "admin").unwrap();
        assert_eq!(
            event_types(&svc, d.id),
            [
                EventType::Created,
                EventType::Lost,
                EventType::Reactivated,
                EventType::Retired
            ]
        );
    }

    #[test]
    fn update_rejects_version_from_other_scope() {
        let svc = testutil::service();
        let f = testutil::fixture(&svc);
        let model = svc
            .create_model(CreateModel { name: "T14".into(), ..Default::default() })
            .unwrap();
        let scoped = svc
            .create_version(
                CreateVersion {
                    usb_type_id: f.usb_type.id,
                    model_id: Some(model.id),
                    version_code: "T14-1".into(),
                    ..Default::default()
                },
                "admin",
            )
            .unwrap();
        let d = svc.create_drive(new_drive(&f, f.v1.id), "admin").unwrap();
        let err = svc
            .update_drive(
                d.id,
                DriveUpdate {
                    version_id: scoped.id,
                    technician_id: None,
                    status: DriveStatus::Ready,
                    custom_text: None,
                },
                "admin",
            )
            .unwrap_err();
        assert!(matches!(err, FleetError::Validation(_)));
    }

    #[test]
    fn repurpose_rewrites_placement() {
        let svc = testutil::service();
        let f = testutil::fixture(&svc);
        let model = svc
            .create_model(CreateModel { name: "T14".into(), ..Default::default() })
            .unwrap();
        let bios = svc
            .create_usb_type(CreateUsbType {
                platform_id: f.platform.id,
                name: "BIOS".into(),
                requires_model: true,
                supports_legacy: false,
            })
            .unwrap();
        let bios_v = svc
            .create_version(
                CreateVersion {
                    usb_type_id: bios.id,
                    model_id: Some(model.id),
                    version_code: "1.07".into(),
                    ..Default::default()
                },
                "admin",
            )
            .unwrap();
        let d = svc.create_drive(new_drive(&f, f.v1.id), "admin").unwrap();

        let drive = svc
            .repurpose_drive(
                d.id,
                Repurpose {
                    platform_id: f.platform.id,
                    usb_type_id: bios.id,
                    model_id: Some(model.id),
                    version_id: bios_v.id,
                    technician_id: Some(f.tech.id),
                    custom_text: None,
                },
                "admin",
            )
            .unwrap();
        assert_eq!(drive.status, DriveStatus::Assigned);
        assert_eq!(drive.usb_type_id, bios.id);
        let events = svc.drive_events(d.id).unwrap();
        assert_eq!(events[0].event_type, EventType::Repurpose);
        assert_eq!(
            events[0].details,
            "Repurposed from Win11 Installer/V1 to BIOS/T14/1.07, assigned to Alice"
        );
    }

    #[test]
    fn bulk_update_skips_unknown_and_unchanged() {
        let svc = testutil::service();
        let f = testutil::fixture(&svc);
        let a = svc.create_drive(new_drive(&f, f.v1.id), "admin").unwrap();
        let b = svc
            .create_drive(
                NewDrive { technician_id: Some(f.tech.id), ..new_drive(&f, f.v1.id) },
                "admin",
            )
            .unwrap();

        let result = svc
            .bulk_update(
                &[a.id, b.id, 999],
                BulkUpdate { technician_id: Some(Some(f.tech.id)), ..Default::default() },
                "admin",
            )
            .unwrap();
        assert_eq!(result, BulkUpdateResult { updated: 1, skipped: 2 });
        let events = svc.drive_events(a.id).unwrap();
        assert_eq!(events[0].details, "[Bulk Edit] Assigned to technician: Alice");

        let result = svc
            .bulk_update(
                &[a.id, b.id],
                BulkUpdate {
                    version_id: Some(f.v2.id),
                    custom_text: Some(None),
                    ..Default::default()
                },
                "admin",
            )
            .unwrap();
        assert_eq!(result.updated, 2);
        assert_eq!(svc.get_drive(b.id).unwrap().version_id, f.v2.id);
        let events = svc.drive_events(b.id).unwrap();
        assert_eq!(events[0].details, "[Bulk Edit] Version changed from V1 to V2");
    }

    #[test]
    fn bulk_repurpose_follows_type_platform() {
        let svc = testutil::service();
        let f = testutil::fixture(&svc);
        let linux = svc.create_platform(CreatePlatform { name: "Linux".into() }).unwrap();
        let ubuntu = svc
            .create_usb_type(CreateUsbType {
                platform_id: linux.id,
                name: "Ubuntu".into(),
                ..Default::default()
            })
            .unwrap();
        let noble = svc
            .create_version(
                CreateVersion {
                    usb_type_id: ubuntu.id,
                    version_code: "24.04".into(),
                    ..Default::default()
                },
                "admin",
            )
            .unwrap();
        let d = svc.create_drive(new_drive(&f, f.v1.id), "admin").unwrap();
        svc.bulk_update(
            &[d.id],
            BulkUpdate {
                repurpose: Some(BulkRepurpose {
                    usb_type_id: ubuntu.id,
                    model_id: None,
                    version_id: noble.id,
                }),
                ..Default::default()
            },
            "admin",
        )
        .unwrap();
        let drive = svc.get_drive(d.id).unwrap();
        assert_eq!(drive.platform_id, linux.id);
        assert_eq!(drive.platform_name.as_deref(), Some("Linux"));
        let events = svc.drive_events(d.id).unwrap();
        assert_eq!(
            events[0].details,
            "[Bulk Edit] Repurposed from Win11 Installer/V1 to Ubuntu/24.04"
        );
    }

    #[test]
    fn list_drives_filters_and_search() {
        let svc = testutil::service();
        let f = testutil::fixture(&svc);
        svc.create_drive(new_drive(&f, f.v1.id), "admin").unwrap();
        svc.create_drive(
            NewDrive {
                technician_id: Some(f.tech.id),
                custom_text: Some("Front desk".into()),
                ..new_drive(&f, f.v2.id)
            },
            "admin",
        )
        .unwrap();

        let all = svc.list_drives(&DriveFilters::default()).unwrap();
        assert_eq!(all.len(), 2);
        let assigned = svc
            .list_drives(&DriveFilters { status: Some(DriveStatus::Assigned), ..Default::default() })
            .unwrap();
        assert_eq!(assigned.len(), 1);

        let hits = svc
            .list_drives(&DriveFilters { search: Some("alice desk".into()), ..Default::default() })
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].usb_id.as_str(), "A002");
        let none = svc
            .list_drives(&DriveFilters { search: Some("alice V1".into()), ..Default::default() })
            .unwrap();
        assert!(none.is_empty());

        let found = svc.find_drive_by_usb_id(&"A001".parse().unwrap()).unwrap();
        assert_eq!(found.version_code.as_deref(), Some("V1"));
        assert_eq!(svc.drives_for_technician(f.tech.id).unwrap().len(), 1);
    }

    #[test]
    fn status_change_wording() {
        assert_eq!(status_change(DriveStatus::Ready, DriveStatus::Ready), None);
        assert_eq!(
            status_change(DriveStatus::Assigned, DriveStatus::Lost),
            Some((EventType::Lost, "Status changed from assigned to lost".into()))
        );
        assert_eq!(
            status_change(DriveStatus::Retired, DriveStatus::Ready),
            Some((
                EventType::Reactivated,
                "Reactivated: Status changed from retired to ready".into()
            ))
        );
    }
}
