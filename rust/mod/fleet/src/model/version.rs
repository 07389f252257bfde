use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::{DbId, EntityStatus};

/// Version: a firmware/software image published for a scope.
///
/// At most one version per scope is current. Currency only changes through
/// the currency engine, never through a plain update.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Version {
    pub id: DbId,
    pub usb_type_id: DbId,

    /// `None` is the "no model" scope, distinct from every concrete model.
    #[serde(default)]
    pub model_id: Option<DbId>,

    pub version_code: String,

    #[serde(default)]
    pub is_current: bool,

    /// Drives on a legacy-valid version are never flagged for update.
    #[serde(default)]
    pub is_legacy_valid: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub official_link: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub internal_link: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comments: Option<String>,

    pub created_at: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub marked_current_at: Option<String>,

    #[serde(default)]
    pub status: EntityStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usb_type_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_name: Option<String>,
}

impl Version {
    pub fn scope(&self) -> Scope {
        Scope {
            usb_type_id: self.usb_type_id,
            model_id: self.model_id,
        }
    }

    /// Release order: `created_at` first, id breaks ties.
    pub fn release_order(&self, other: &Version) -> Ordering {
        self.created_at
            .cmp(&other.created_at)
            .then(self.id.cmp(&other.id))
    }

    pub fn is_older_than(&self, other: &Version) -> bool {
        self.release_order(other) == Ordering::Less
    }
}

/// The `(usb_type, model)` pair within which currency is decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scope {
    pub usb_type_id: DbId,
    #[serde(default)]
    pub model_id: Option<DbId>,
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.model_id {
            Some(m) => write!(f, "usb_type/{} model/{}", self.usb_type_id, m),
            None => write!(f, "usb_type/{} (no model)", self.usb_type_id),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CreateVersion {
    pub usb_type_id: DbId,
    #[serde(default)]
    pub model_id: Option<DbId>,
    pub version_code: String,

    /// Promote through the currency engine as part of creation.
    #[serde(default)]
    pub is_current: bool,

    #[serde(default)]
    pub is_legacy_valid: bool,
    #[serde(default)]
    pub official_link: Option<String>,
    #[serde(default)]
    pub internal_link: Option<String>,
    #[serde(default)]
    pub comments: Option<String>,

    /// Release timestamp for backfilled versions (RFC 3339 or YYYY-MM-DD).
    /// Defaults to now.
    #[serde(default)]
    pub created_at: Option<String>,
}

/// Descriptive fields of a version. Currency is not editable here.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UpdateVersion {
    pub version_code: String,
    #[serde(default)]
    pub is_legacy_valid: bool,
    #[serde(default)]
    pub official_link: Option<String>,
    #[serde(default)]
    pub internal_link: Option<String>,
    #[serde(default)]
    pub comments: Option<String>,
}

/// Model dimension of a version listing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ModelFilter {
    #[default]
    Any,
    /// Versions with no model.
    Unassigned,
    Model(DbId),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromotionResult {
    /// Drives moved to `pending_update`.
    pub marked_pending: usize,
    /// Drives moved from `pending_update` back to `ready`.
    pub cleared_pending: usize,
}
