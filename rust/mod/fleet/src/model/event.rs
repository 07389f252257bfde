use serde::{Deserialize, Serialize};

use super::{DbId, EventType, UsbId};

/// One append-only audit row.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EventLog {
    pub id: DbId,
    /// Numeric id of the drive.
    pub drive_id: DbId,
    pub event_type: EventType,
    pub details: String,
    pub username: String,
    pub timestamp: String,
}

/// An event joined with its drive's human identifier.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RecentEvent {
    #[serde(flatten)]
    pub event: EventLog,
    pub usb_id: UsbId,
}
