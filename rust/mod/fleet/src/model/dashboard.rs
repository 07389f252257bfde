use serde::{Deserialize, Serialize};

use super::{DbId, UsbId};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NamedCount {
    pub name: String,
    pub count: i64,
}

/// A drive still held by a technician who was deactivated.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InactiveHolderWarning {
    pub drive_id: DbId,
    pub usb_id: UsbId,
    pub technician_id: DbId,
    pub technician_name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total: i64,
    pub assigned: i64,
    pub ready: i64,
    pub pending_update: i64,
    pub lost: i64,
    pub retired: i64,
    /// Active technicians with the most drives, at most ten.
    pub by_technician: Vec<NamedCount>,
    pub by_platform: Vec<NamedCount>,
    pub recent_events: Vec<super::RecentEvent>,
    pub warnings: Vec<InactiveHolderWarning>,
}
