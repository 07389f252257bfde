use serde::{Deserialize, Serialize};

use super::{DbId, EntityStatus};

/// UsbType: a kind of installer drive under a platform
/// (e.g. "Windows 11 Installer", "BIOS Update").
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UsbType {
    pub id: DbId,
    pub platform_id: DbId,
    pub name: String,

    /// Versions and drives of this type must reference a Model.
    #[serde(default)]
    pub requires_model: bool,

    #[serde(default)]
    pub supports_legacy: bool,

    #[serde(default)]
    pub status: EntityStatus,

    pub created_at: String,

    /// Joined from `platforms` by list queries.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform_name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CreateUsbType {
    pub platform_id: DbId,
    pub name: String,
    #[serde(default)]
    pub requires_model: bool,
    #[serde(default)]
    pub supports_legacy: bool,
}

pub type UpdateUsbType = CreateUsbType;
