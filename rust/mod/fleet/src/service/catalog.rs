//! Platforms, USB types, models and technicians.
//!
//! Catalog rows are never deleted; they are toggled `inactive` instead.

use std::fmt;
use std::str::FromStr;

use flashback_core::{names_are_similar, now_rfc3339};
use flashback_sql::{Executor, Predicates, Value};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{rows, FleetError, FleetService};
use crate::model::*;

/// Entity kinds that carry an active/inactive status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CatalogKind {
    Platform,
    UsbType,
    Model,
    Technician,
    Version,
}

impl CatalogKind {
    fn table(&self) -> &'static str {
        match self {
            Self::Platform => "platforms",
            Self::UsbType => "usb_types",
            Self::Model => "models",
            Self::Technician => "technicians",
            Self::Version => "versions",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Platform => "platform",
            Self::UsbType => "usb_type",
            Self::Model => "model",
            Self::Technician => "technician",
            Self::Version => "version",
        }
    }
}

impl fmt::Display for CatalogKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for CatalogKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "platform" => Ok(Self::Platform),
            "usb_type" => Ok(Self::UsbType),
            "model" => Ok(Self::Model),
            "technician" => Ok(Self::Technician),
            "version" => Ok(Self::Version),
            other => Err(format!("unknown catalog kind: {}", other)),
        }
    }
}

/// Trimmed, non-empty name.
pub(crate) fn require_name(name: &str, field: &str) -> Result<String, FleetError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(FleetError::Validation(format!("{} must not be empty", field)));
    }
    Ok(name.to_string())
}

/// Blank optional text is stored as NULL.
pub(crate) fn clean_text(text: Option<&str>) -> Option<String> {
    text.map(str::trim).filter(|t| !t.is_empty()).map(str::to_string)
}

pub(crate) fn insert_returning_id<X: Executor + ?Sized>(
    db: &X,
    sql: &str,
    params: &[Value],
) -> Result<DbId, FleetError> {
    let row = db
        .query_one(sql, params)?
        .ok_or_else(|| FleetError::Internal("insert returned no id".into()))?;
    Ok(row.require_i64("id")?)
}

pub(crate) fn load_platform<X: Executor + ?Sized>(db: &X, id: DbId) -> Result<Platform, FleetError> {
    let row = db
        .query_one("SELECT * FROM platforms WHERE id = ?", &[Value::from(id)])?
        .ok_or_else(|| FleetError::not_found("platform", id))?;
    rows::platform(&row)
}

pub(crate) fn load_usb_type<X: Executor + ?Sized>(db: &X, id: DbId) -> Result<UsbType, FleetError> {
    let row = db
        .query_one(
            "SELECT t.*, p.name AS platform_name
             FROM usb_types t JOIN platforms p ON p.id = t.platform_id
             WHERE t.id = ?",
            &[Value::from(id)],
        )?
        .ok_or_else(|| FleetError::not_found("usb_type", id))?;
    rows::usb_type(&row)
}

pub(crate) fn load_model<X: Executor + ?Sized>(db: &X, id: DbId) -> Result<Model, FleetError> {
    let row = db
        .query_one("SELECT * FROM models WHERE id = ?", &[Value::from(id)])?
        .ok_or_else(|| FleetError::not_found("model", id))?;
    rows::model(&row)
}

pub(crate) fn load_technician<X: Executor + ?Sized>(
    db: &X,
    id: DbId,
) -> Result<Technician, FleetError> {
    let row = db
        .query_one("SELECT * FROM technicians WHERE id = ?", &[Value::from(id)])?
        .ok_or_else(|| FleetError::not_found("technician", id))?;
    rows::technician(&row)
}

fn status_filter(active_only: bool) -> Option<&'static str> {
    active_only.then_some(EntityStatus::Active.as_str())
}

impl FleetService {
    // ── Platforms ──

    pub fn create_platform(&self, input: CreatePlatform) -> Result<Platform, FleetError> {
        self.in_tx("create_platform", |tx| {
            let name = require_name(&input.name, "platform name")?;
            let id = insert_returning_id(
                tx,
                "INSERT INTO platforms (name, created_at) VALUES (?, ?) RETURNING id",
                &[Value::from(name), Value::from(now_rfc3339())],
            )?;
            load_platform(tx, id)
        })
    }

    pub fn get_platform(&self, id: DbId) -> Result<Platform, FleetError> {
        self.read("get_platform", |db| load_platform(db, id))
    }

    pub fn list_platforms(&self, active_only: bool) -> Result<Vec<Platform>, FleetError> {
        let mut p = Predicates::new();
        p.eq_opt("status", status_filter(active_only));
        let sql = format!("SELECT * FROM platforms{} ORDER BY name, id", p.where_sql());
        self.read("list_platforms", |db| rows::all(db.query(&sql, p.params())?, rows::platform))
    }

    pub fn update_platform(&self, id: DbId, input: UpdatePlatform) -> Result<Platform, FleetError> {
        self.in_tx("update_platform", |tx| {
            load_platform(tx, id)?;
            let name = require_name(&input.name, "platform name")?;
            tx.exec(
                "UPDATE platforms SET name = ? WHERE id = ?",
                &[Value::from(name), Value::from(id)],
            )?;
            load_platform(tx, id)
        })
    }

    pub fn similar_platforms(
        &self,
        name: &str,
        exclude_id: Option<DbId>,
    ) -> Result<Vec<Platform>, FleetError> {
        Ok(self
            .list_platforms(false)?
            .into_iter()
            .filter(|p| Some(p.id) != exclude_id && names_are_similar(&p.name, name))
            .collect())
    }

    // ── USB types ──

    pub fn create_usb_type(&self, input: CreateUsbType) -> Result<UsbType, FleetError> {
        self.in_tx("create_usb_type", |tx| {
            let name = require_name(&input.name, "usb type name")?;
            require_platform(tx, input.platform_id)?;
            let id = insert_returning_id(
                tx,
                "INSERT INTO usb_types (platform_id, name, requires_model, supports_legacy, created_at)
                 VALUES (?, ?, ?, ?, ?) RETURNING id",
                &[
                    Value::from(input.platform_id),
                    Value::from(name),
                    Value::from(input.requires_model),
                    Value::from(input.supports_legacy),
                    Value::from(now_rfc3339()),
                ],
            )?;
            load_usb_type(tx, id)
        })
    }

    pub fn get_usb_type(&self, id: DbId) -> Result<UsbType, FleetError> {
        self.read("get_usb_type", |db| load_usb_type(db, id))
    }

    pub fn list_usb_types(
        &self,
        platform_id: Option<DbId>,
        active_only: bool,
    ) -> Result<Vec<UsbType>, FleetError> {
        let mut p = Predicates::new();
        p.eq_opt("t.platform_id", platform_id)
            .eq_opt("t.status", status_filter(active_only));
        let sql = format!(
            "SELECT t.*, p.name AS platform_name
             FROM usb_types t JOIN platforms p ON p.id = t.platform_id{}
             ORDER BY p.name, t.name, t.id",
            p.where_sql()
        );
        self.read("list_usb_types", |db| rows::all(db.query(&sql, p.params())?, rows::usb_type))
    }

    pub fn update_usb_type(&self, id: DbId, input: UpdateUsbType) -> Result<UsbType, FleetError> {
        self.in_tx("update_usb_type", |tx| {
            load_usb_type(tx, id)?;
            let name = require_name(&input.name, "usb type name")?;
            require_platform(tx, input.platform_id)?;
            tx.exec(
                "UPDATE usb_types SET platform_id = ?, name = ?, requires_model = ?, supports_legacy = ?
                 WHERE id = ?",
                &[
                    Value::from(input.platform_id),
                    Value::from(name),
                    Value::from(input.requires_model),
                    Value::from(input.supports_legacy),
                    Value::from(id),
                ],
            )?;
            load_usb_type(tx, id)
        })
    }

    /// Types under the same platform with a similar name.
    pub fn similar_usb_types(
        &self,
        platform_id: DbId,
        name: &str,
        exclude_id: Option<DbId>,
    ) -> Result<Vec<UsbType>, FleetError> {
        Ok(self
            .list_usb_types(Some(platform_id), false)?
            .into_iter()
            .filter(|t| Some(t.id) != exclude_id && names_are_similar(&t.name, name))
            .collect())
    }

    // ── Models ──

    pub fn create_model(&self, input: CreateModel) -> Result<Model, FleetError> {
        self.in_tx("create_model", |tx| {
            let name = require_name(&input.name, "model name")?;
            let id = insert_returning_id(
                tx,
                "INSERT INTO models (name, model_number, notes, created_at)
                 VALUES (?, ?, ?, ?) RETURNING id",
                &[
                    Value::from(name),
                    Value::from(clean_text(input.model_number.as_deref())),
                    Value::from(clean_text(input.notes.as_deref())),
                    Value::from(now_rfc3339()),
                ],
            )?;
            load_model(tx, id)
        })
    }

    pub fn get_model(&self, id: DbId) -> Result<Model, FleetError> {
        self.read("get_model", |db| load_model(db, id))
    }

    pub fn list_models(&self, active_only: bool) -> Result<Vec<Model>, FleetError> {
        let mut p = Predicates::new();
        p.eq_opt("status", status_filter(active_only));
        let sql = format!("SELECT * FROM models{} ORDER BY name, id", p.where_sql());
        self.read("list_models", |db| rows::all(db.query(&sql, p.params())?, rows::model))
    }

    pub fn update_model(&self, id: DbId, input: UpdateModel) -> Result<Model, FleetError> {
        self.in_tx("update_model", |tx| {
            load_model(tx, id)?;
            let name = require_name(&input.name, "model name")?;
            tx.exec(
                "UPDATE models SET name = ?, model_number = ?, notes = ? WHERE id = ?",
                &[
                    Value::from(name),
                    Value::from(clean_text(input.model_number.as_deref())),
                    Value::from(clean_text(input.notes.as_deref())),
                    Value::from(id),
                ],
            )?;
            load_model(tx, id)
        })
    }

    pub fn similar_models(
        &self,
        name: &str,
        exclude_id: Option<DbId>,
    ) -> Result<Vec<Model>, FleetError> {
        Ok(self
            .list_models(false)?
            .into_iter()
            .filter(|m| Some(m.id) != exclude_id && names_are_similar(&m.name, name))
            .collect())
    }

    // ── Technicians ──

    pub fn create_technician(&self, input: CreateTechnician) -> Result<Technician, FleetError> {
        self.in_tx("create_technician", |tx| {
            let name = require_name(&input.name, "technician name")?;
            let id = insert_returning_id(
                tx,
                "INSERT INTO technicians (name, notes, created_at) VALUES (?, ?, ?) RETURNING id",
                &[
                    Value::from(name),
                    Value::from(clean_text(input.notes.as_deref())),
                    Value::from(now_rfc3339()),
                ],
            )?;
            load_technician(tx, id)
        })
    }

    pub fn get_technician(&self, id: DbId) -> Result<Technician, FleetError> {
        self.read("get_technician", |db| load_technician(db, id))
    }

    pub fn list_technicians(&self, active_only: bool) -> Result<Vec<Technician>, FleetError> {
        let mut p = Predicates::new();
        p.eq_opt("status", status_filter(active_only));
        let sql = format!("SELECT * FROM technicians{} ORDER BY name, id", p.where_sql());
        self.read("list_technicians", |db| rows::all(db.query(&sql, p.params())?, rows::technician))
    }

    pub fn update_technician(
        &self,
        id: DbId,
        input: UpdateTechnician,
    ) -> Result<Technician, FleetError> {
        self.in_tx("update_technician", |tx| {
            load_technician(tx, id)?;
            let name = require_name(&input.name, "technician name")?;
            tx.exec(
                "UPDATE technicians SET name = ?, notes = ? WHERE id = ?",
                &[
                    Value::from(name),
                    Value::from(clean_text(input.notes.as_deref())),
                    Value::from(id),
                ],
            )?;
            load_technician(tx, id)
        })
    }

    pub fn similar_technicians(
        &self,
        name: &str,
        exclude_id: Option<DbId>,
    ) -> Result<Vec<Technician>, FleetError> {
        Ok(self
            .list_technicians(false)?
            .into_iter()
            .filter(|t| Some(t.id) != exclude_id && names_are_similar(&t.name, name))
            .collect())
    }

    // ── Status ──

    /// Soft-toggle any catalog row. Drives referencing it are untouched.
    pub fn set_status(
        &self,
        kind: CatalogKind,
        id: DbId,
        status: EntityStatus,
    ) -> Result<EntityStatus, FleetError> {
        self.in_tx("set_status", |tx| {
            let sql = format!("UPDATE {} SET status = ? WHERE id = ?", kind.table());
            let changed = tx.exec(&sql, &[Value::from(status.as_str()), Value::from(id)])?;
            if changed == 0 {
                return Err(FleetError::NotFound(format!("{}/{}", kind.label(), id)));
            }
            info!("{}/{} is now {}", kind, id, status.as_str());
            Ok(status)
        })
    }

    /// Flip active/inactive and return the new status.
    pub fn toggle_status(&self, kind: CatalogKind, id: DbId) -> Result<EntityStatus, FleetError> {
        let current: EntityStatus = self.read("toggle_status", |db| {
            let sql = format!("SELECT status FROM {} WHERE id = ?", kind.table());
            let row = db
                .query_one(&sql, &[Value::from(id)])?
                .ok_or_else(|| FleetError::NotFound(format!("{}/{}", kind.label(), id)))?;
            row.require_str("status")?.parse().map_err(FleetError::Internal)
        })?;
        self.set_status(kind, id, current.toggled())
    }

    // ── References ──

    pub fn drives_for_model(&self, model_id: DbId) -> Result<Vec<UsbDrive>, FleetError> {
        self.list_drives(&DriveFilters {
            model_id: Some(model_id),
            ..Default::default()
        })
    }

    pub fn drives_for_technician(&self, technician_id: DbId) -> Result<Vec<UsbDrive>, FleetError> {
        self.list_drives(&DriveFilters {
            technician_id: Some(technician_id),
            ..Default::default()
        })
    }
}

fn require_platform<X: Executor + ?Sized>(db: &X, platform_id: DbId) -> Result<(), FleetError> {
    load_platform(db, platform_id).map_err(as_validation)?;
    Ok(())
}

/// A missing referenced row is bad input, not a missing target.
pub(crate) fn as_validation(e: FleetError) -> FleetError {
    match e {
        FleetError::NotFound(m) => FleetError::Validation(format!("{} does not exist", m)),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::testutil;

    #[test]
    fn create_and_list_catalog() {
        let svc = testutil::service();
        let win = svc.create_platform(CreatePlatform { name: " Windows ".into() }).unwrap();
        assert_eq!(win.name, "Windows");
        assert_eq!(win.status, EntityStatus::Active);

        let ty = svc
            .create_usb_type(CreateUsbType {
                platform_id: win.id,
                name: "BIOS Update".into(),
                requires_model: true,
                supports_legacy: false,
            })
            .unwrap();
        assert!(ty.requires_model);
        assert_eq!(ty.platform_name.as_deref(), Some("Windows"));

        let linux = svc.create_platform(CreatePlatform { name: "Linux".into() }).unwrap();
        svc.create_usb_type(CreateUsbType {
            platform_id: linux.id,
            name: "Ubuntu".into(),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(svc.list_usb_types(Some(win.id), false).unwrap().len(), 1);
        assert_eq!(svc.list_usb_types(None, false).unwrap().len(), 2);
    }

    #[test]
    fn validation_errors() {
        let svc = testutil::service();
        let err = svc.create_platform(CreatePlatform { name: "   ".into() }).unwrap_err();
        assert!(matches!(err, FleetError::Validation(_)));

        let err = svc
            .create_usb_type(CreateUsbType {
                platform_id: 99,
                name: "Orphan".into(),
                ..Default::default()
            })
            .unwrap_err();
        assert!(matches!(err, FleetError::Validation(_)));
        assert!(err.to_string().contains("platform/99"));

        let err = svc.get_model(5).unwrap_err();
        assert_eq!(err.to_string(), "not found: get_model: model/5");
    }

    #[test]
    fn toggle_status_is_soft() {
        let svc = testutil::service();
        let t = svc
            .create_technician(CreateTechnician { name: "Bob".into(), notes: Some("  ".into()) })
            .unwrap();
        assert_eq!(t.notes, None);

        assert_eq!(
            svc.toggle_status(CatalogKind::Technician, t.id).unwrap(),
            EntityStatus::Inactive
        );
        assert!(svc.list_technicians(true).unwrap().is_empty());
        assert_eq!(svc.list_technicians(false).unwrap().len(), 1);
        assert_eq!(
            svc.toggle_status(CatalogKind::Technician, t.id).unwrap(),
            EntityStatus::Active
        );

        let err = svc.set_status(CatalogKind::Model, 42, EntityStatus::Inactive).unwrap_err();
        assert!(matches!(err, FleetError::NotFound(_)));
    }

    #[test]
    fn similar_names_ignore_case_and_spaces() {
        let svc = testutil::service();
        let m = svc
            .create_model(CreateModel { name: "OptiPlex 7090".into(), ..Default::default() })
            .unwrap();
        assert_eq!(svc.similar_models("optiplex7090", None).unwrap().len(), 1);
        assert!(svc.similar_models("optiplex7090", Some(m.id)).unwrap().is_empty());
        assert!(svc.similar_models("OptiPlex 7010", None).unwrap().is_empty());

        let p = svc.create_platform(CreatePlatform { name: "Windows".into() }).unwrap();
        let other = svc.create_platform(CreatePlatform { name: "Linux".into() }).unwrap();
        svc.create_usb_type(CreateUsbType {
            platform_id: p.id,
            name: "Win 11".into(),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(svc.similar_usb_types(p.id, "WIN11", None).unwrap().len(), 1);
        assert!(svc.similar_usb_types(other.id, "WIN11", None).unwrap().is_empty());
    }

    #[test]
    fn update_model_replaces_fields() {
        let svc = testutil::service();
        let m = svc
            .create_model(CreateModel {
                name: "X1".into(),
                model_number: Some("20XW".into()),
                notes: None,
            })
            .unwrap();
        let m = svc
            .update_model(
                m.id,
                UpdateModel { name: "X1 Carbon".into(), model_number: None, notes: Some("gen 9".into()) },
            )
            .unwrap();
        assert_eq!(m.name, "X1 Carbon");
        assert_eq!(m.model_number, None);
        assert_eq!(m.notes.as_deref(), Some("gen 9"));
    }

    #[test]
    fn drives_for_model_lists_only_that_model() {
        let svc = testutil::service();
        let f = testutil::fixture(&svc);
        let x1 = svc.create_model(CreateModel { name: "X1".into(), ..Default::default() }).unwrap();
        let t14 = svc.create_model(CreateModel { name: "T14".into(), ..Default::default() }).unwrap();
        let x1_build = svc
            .create_version(
                CreateVersion {
                    usb_type_id: f.usb_type.id,
                    model_id: Some(x1.id),
                    version_code: "X1-2024".into(),
                    ..Default::default()
                },
                "admin",
            )
            .unwrap();

        let on_x1 = svc
            .create_drive(
                NewDrive { model_id: Some(x1.id), ..testutil::new_drive(&f, x1_build.id) },
                "admin",
            )
            .unwrap();
        svc.create_drive(testutil::new_drive(&f, f.v1.id), "admin").unwrap();

        let drives = svc.drives_for_model(x1.id).unwrap();
        assert_eq!(drives.len(), 1);
        assert_eq!(drives[0].id, on_x1.id);
        assert_eq!(drives[0].model_name.as_deref(), Some("X1"));
        assert!(svc.drives_for_model(t14.id).unwrap().is_empty());
    }
}
