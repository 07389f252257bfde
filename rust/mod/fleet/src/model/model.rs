use serde::{Deserialize, Serialize};

use super::{DbId, EntityStatus};

/// Model: a hardware model that versions and drives can be scoped to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Model {
    pub id: DbId,

    /// Human-readable name (e.g. "OptiPlex 7090").
    pub name: String,

    /// Vendor model number.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_number: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,

    #[serde(default)]
    pub status: EntityStatus,

    pub created_at: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CreateModel {
    pub name: String,
    #[serde(default)]
    pub model_number: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

pub type UpdateModel = CreateModel;
