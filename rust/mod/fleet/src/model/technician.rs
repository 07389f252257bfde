use serde::{Deserialize, Serialize};

use super::{DbId, EntityStatus};

/// Technician: a person who holds drives in the field.
///
/// Inactive technicians may still hold drives; the dashboard warns about them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Technician {
    pub id: DbId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default)]
    pub status: EntityStatus,
    pub created_at: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CreateTechnician {
    pub name: String,
    #[serde(default)]
    pub notes: Option<String>,
}

pub type UpdateTechnician = CreateTechnician;
