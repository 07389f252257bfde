use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Soft-delete status shared by every catalog entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityStatus {
    Active,
    Inactive,
}

impl Default for EntityStatus {
    fn default() -> Self {
        Self::Active
    }
}

impl EntityStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            Self::Active => Self::Inactive,
            Self::Inactive => Self::Active,
        }
    }
}

impl FromStr for EntityStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "inactive" => Ok(Self::Inactive),
            other => Err(format!("unknown entity status: {}", other)),
        }
    }
}

/// Physical drive status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriveStatus {
    /// Held by a technician.
    Assigned,
    /// Flashed and on the shelf.
    Ready,
    /// Carries a version older than its scope's current version.
    PendingUpdate,
    Lost,
    Retired,
}

impl Default for DriveStatus {
    fn default() -> Self {
        Self::Ready
    }
}

impl DriveStatus {
    /// Statuses outside the operational fleet. The currency cascade never
    /// touches a drive in one of these.
    pub const TERMINAL: [DriveStatus; 2] = [DriveStatus::Lost, DriveStatus::Retired];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Assigned => "assigned",
            Self::Ready => "ready",
            Self::PendingUpdate => "pending_update",
            Self::Lost => "lost",
            Self::Retired => "retired",
        }
    }

    pub fn is_terminal(&self) -> bool {
        Self::TERMINAL.contains(self)
    }
}

impl FromStr for DriveStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "assigned" => Ok(Self::Assigned),
            "ready" => Ok(Self::Ready),
            "pending_update" => Ok(Self::PendingUpdate),
            "lost" => Ok(Self::Lost),
            "retired" => Ok(Self::Retired),
            other => Err(format!("unknown drive status: {}", other)),
        }
    }
}

impl fmt::Display for DriveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of an audit log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Created,
    Assigned,
    Reassigned,
    Updated,
    MarkedPending,
    StatusCleared,
    Repurpose,
    Reactivated,
    Lost,
    Retired,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Assigned => "assigned",
            Self::Reassigned => "reassigned",
            Self::Updated => "updated",
            Self::MarkedPending => "marked_pending",
            Self::StatusCleared => "status_cleared",
            Self::Repurpose => "repurpose",
            Self::Reactivated => "reactivated",
            Self::Lost => "lost",
            Self::Retired => "retired",
        }
    }

    /// The event logged when a drive enters a terminal status.
    pub fn for_terminal(status: DriveStatus) -> Option<Self> {
        match status {
            DriveStatus::Lost => Some(Self::Lost),
            DriveStatus::Retired => Some(Self::Retired),
            _ => None,
        }
    }
}

impl FromStr for EventType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "created" => Self::Created,
            "assigned" => Self::Assigned,
            "reassigned" => Self::Reassigned,
            "updated" => Self::Updated,
            "marked_pending" => Self::MarkedPending,
            "status_cleared" => Self::StatusCleared,
            "repurpose" => Self::Repurpose,
            "reactivated" => Self::Reactivated,
            "lost" => Self::Lost,
            "retired" => Self::Retired,
            other => return Err(format!("unknown event type: {}", other)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_set() {
        assert!(DriveStatus::Lost.is_terminal());
        assert!(DriveStatus::Retired.is_terminal());
        assert!(!DriveStatus::PendingUpdate.is_terminal());
        assert!(!DriveStatus::Assigned.is_terminal());
    }

    #[test]
    fn db_strings_match_serde() {
        for status in [
            DriveStatus::Assigned,
            DriveStatus::Ready,
            DriveStatus::PendingUpdate,
            DriveStatus::Lost,
            DriveStatus::Retired,
        ] {
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{}\"", status.as_str()));
            assert_eq!(status.as_str().parse::<DriveStatus>().unwrap(), status);
        }
        assert_eq!(
            serde_json::to_string(&EventType::MarkedPending).unwrap(),
            "\"marked_pending\""
        );
        assert!("archived".parse::<DriveStatus>().is_err());
    }

    #[test]
    fn terminal_events() {
        assert_eq!(EventType::for_terminal(DriveStatus::Lost), Some(EventType::Lost));
        assert_eq!(EventType::for_terminal(DriveStatus::Ready), None);
    }

    #[test]
    fn entity_status_toggle() {
        assert_eq!(EntityStatus::Active.toggled(), EntityStatus::Inactive);
        assert_eq!("inactive".parse::<EntityStatus>().unwrap(), EntityStatus::Inactive);
    }
}
