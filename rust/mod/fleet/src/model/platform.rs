use serde::{Deserialize, Serialize};

use super::{DbId, EntityStatus};

/// Platform: top of the hierarchy (e.g. "Windows", "Linux"). Owns USB types.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Platform {
    pub id: DbId,
    pub name: String,
    #[serde(default)]
    pub status: EntityStatus,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CreatePlatform {
    pub name: String,
}

pub type UpdatePlatform = CreatePlatform;
