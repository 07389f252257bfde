//! Version catalog. Currency changes go through [`super::currency`].

use flashback_core::{names_are_similar, normalize_timestamp, now_rfc3339};
use flashback_sql::{Executor, Predicates, Value};
use tracing::info;

use super::catalog::{
    as_validation, clean_text, insert_returning_id, load_model, load_usb_type, require_name,
};
use super::{currency, rows, FleetError, FleetService};
use crate::model::*;

pub(crate) fn load_version<X: Executor + ?Sized>(db: &X, id: DbId) -> Result<Version, FleetError> {
    let sql = format!("{} WHERE v.id = ?", rows::VERSION_SELECT);
    let row = db
        .query_one(&sql, &[Value::from(id)])?
        .ok_or_else(|| FleetError::not_found("version", id))?;
    rows::version(&row)
}

/// The current version of a scope, if one is designated.
pub(crate) fn current_in_scope<X: Executor + ?Sized>(
    db: &X,
    scope: Scope,
) -> Result<Option<Version>, FleetError> {
    let mut p = Predicates::new();
    p.eq("v.usb_type_id", scope.usb_type_id)
        .eq_null_aware("v.model_id", scope.model_id)
        .eq("v.is_current", true);
    let sql = format!("{}{}", rows::VERSION_SELECT, p.where_sql());
    db.query_one(&sql, p.params())?
        .map(|row| rows::version(&row))
        .transpose()
}

fn versions_in_scope<X: Executor + ?Sized>(
    db: &X,
    scope: Scope,
) -> Result<Vec<Version>, FleetError> {
    let mut p = Predicates::new();
    p.eq("v.usb_type_id", scope.usb_type_id)
        .eq_null_aware("v.model_id", scope.model_id);
    let sql = format!(
        "{}{} ORDER BY v.created_at DESC, v.id DESC",
        rows::VERSION_SELECT,
        p.where_sql()
    );
    rows::all(db.query(&sql, p.params())?, rows::version)
}

/// Check that `(usb_type_id, model_id)` names an existing scope.
fn validate_scope<X: Executor + ?Sized>(
    db: &X,
    usb_type_id: DbId,
    model_id: Option<DbId>,
) -> Result<(), FleetError> {
    let usb_type = load_usb_type(db, usb_type_id).map_err(as_validation)?;
    match model_id {
        Some(id) => {
            load_model(db, id).map_err(as_validation)?;
        }
        None if usb_type.requires_model => {
            return Err(FleetError::Validation(format!(
                "usb_type/{} ({}) requires a model",
                usb_type.id, usb_type.name
            )));
        }
        None => {}
    }
    Ok(())
}

impl FleetService {
    /// Create a version. With `is_current`, it is promoted through the
    /// currency engine in the same transaction.
    pub fn create_version(&self, input: CreateVersion, username: &str) -> Result<Version, FleetError> {
        self.in_tx("create_version", |tx| {
            let code = require_name(&input.version_code, "version code")?;
            validate_scope(tx, input.usb_type_id, input.model_id)?;
            let created_at = match input.created_at.as_deref() {
                Some(raw) => normalize_timestamp(raw).ok_or_else(|| {
                    FleetError::Validation(format!("invalid created_at: {:?}", raw))
                })?,
                None => now_rfc3339(),
            };
            let id = insert_returning_id(
                tx,
                "INSERT INTO versions (usb_type_id, model_id, version_code, is_legacy_valid,
                                       official_link, internal_link, comments, created_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?) RETURNING id",
                &[
                    Value::from(input.usb_type_id),
                    Value::from(input.model_id),
                    Value::from(code.as_str()),
                    Value::from(input.is_legacy_valid),
                    Value::from(clean_text(input.official_link.as_deref())),
                    Value::from(clean_text(input.internal_link.as_deref())),
                    Value::from(clean_text(input.comments.as_deref())),
                    Value::from(created_at),
                ],
            )?;
            info!("created version/{} ({})", id, code);
            if input.is_current {
                currency::promote_in_tx(tx, id, username)?;
            }
            load_version(tx, id)
        })
    }

    pub fn get_version(&self, id: DbId) -> Result<Version, FleetError> {
        self.read("get_version", |db| load_version(db, id))
    }

    /// Versions newest first, optionally narrowed by type and model.
    pub fn list_versions(
        &self,
        usb_type_id: Option<DbId>,
        model: ModelFilter,
        active_only: bool,
    ) -> Result<Vec<Version>, FleetError> {
        let mut p = Predicates::new();
        p.eq_opt("v.usb_type_id", usb_type_id);
        match model {
            ModelFilter::Any => {}
            ModelFilter::Unassigned => {
                p.eq_null_aware("v.model_id", None);
            }
            ModelFilter::Model(id) => {
                p.eq("v.model_id", id);
            }
        }
        if active_only {
            p.eq("v.status", EntityStatus::Active.as_str());
        }
        let sql = format!(
            "{}{} ORDER BY v.created_at DESC, v.id DESC",
            rows::VERSION_SELECT,
            p.where_sql()
        );
        self.read("list_versions", |db| {
            rows::all(db.query(&sql, p.params())?, rows::version)
        })
    }

    /// Edit descriptive fields. `is_current` is not touched.
    pub fn update_version(&self, id: DbId, input: UpdateVersion) -> Result<Version, FleetError> {
        self.in_tx("update_version", |tx| {
            load_version(tx, id)?;
            let code = require_name(&input.version_code, "version code")?;
            tx.exec(
                "UPDATE versions
                 SET version_code = ?, is_legacy_valid = ?, official_link = ?,
                     internal_link = ?, comments = ?
                 WHERE id = ?",
                &[
                    Value::from(code),
                    Value::from(input.is_legacy_valid),
                    Value::from(clean_text(input.official_link.as_deref())),
                    Value::from(clean_text(input.internal_link.as_deref())),
                    Value::from(clean_text(input.comments.as_deref())),
                    Value::from(id),
                ],
            )?;
            load_version(tx, id)
        })
    }

    pub fn current_version(&self, scope: Scope) -> Result<Option<Version>, FleetError> {
        self.read("current_version", |db| current_in_scope(db, scope))
    }

    /// Versions in the same scope whose code matches ignoring case and
    /// whitespace.
    pub fn similar_versions(
        &self,
        scope: Scope,
        version_code: &str,
        exclude_id: Option<DbId>,
    ) -> Result<Vec<Version>, FleetError> {
        let versions = self.read("similar_versions", |db| versions_in_scope(db, scope))?;
        Ok(versions
            .into_iter()
            .filter(|v| Some(v.id) != exclude_id && names_are_similar(&v.version_code, version_code))
            .collect())
    }
}
