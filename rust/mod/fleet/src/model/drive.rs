use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

use super::{DbId, DriveStatus};

/// Human identifier printed on a drive: one letter and three digits.
///
/// Issued in the order `A001 … A999, B001 … Z999`; string order equals
/// issuance order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UsbId(String);

impl UsbId {
    pub const PER_LETTER: i64 = 999;
    pub const CAPACITY: i64 = 26 * Self::PER_LETTER;

    /// The identifier for counter value `n`, or `None` outside `1..=CAPACITY`.
    pub fn from_sequence(n: i64) -> Option<Self> {
        if !(1..=Self::CAPACITY).contains(&n) {
            return None;
        }
        let letter = (b'A' + ((n - 1) / Self::PER_LETTER) as u8) as char;
        let number = (n - 1) % Self::PER_LETTER + 1;
        Some(Self(format!("{}{:03}", letter, number)))
    }

    /// Inverse of [`UsbId::from_sequence`].
    pub fn sequence(&self) -> i64 {
        let bytes = self.0.as_bytes();
        let letter = (bytes[0] - b'A') as i64;
        let number: i64 = self.0[1..].parse().unwrap_or(0);
        letter * Self::PER_LETTER + number
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for UsbId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = s.as_bytes();
        let well_formed = bytes.len() == 4
            && bytes[0].is_ascii_uppercase()
            && bytes[1..].iter().all(u8::is_ascii_digit)
            && &s[1..] != "000";
        if well_formed {
            Ok(Self(s.to_string()))
        } else {
            Err(format!("invalid usb id: {:?}", s))
        }
    }
}

impl TryFrom<String> for UsbId {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<UsbId> for String {
    fn from(id: UsbId) -> Self {
        id.0
    }
}

impl fmt::Display for UsbId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// UsbDrive: one physical drive.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UsbDrive {
    pub id: DbId,
    pub usb_id: UsbId,
    pub platform_id: DbId,
    pub usb_type_id: DbId,
    #[serde(default)]
    pub model_id: Option<DbId>,
    pub version_id: DbId,
    #[serde(default)]
    pub technician_id: Option<DbId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hardware_model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hardware_serial: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capacity_gb: Option<f64>,
    pub status: DriveStatus,
    pub created_at: String,
    pub updated_at: String,

    // Joined display names.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usb_type_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub technician_name: Option<String>,
}

/// Placement and holder of a drive to be created.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NewDrive {
    pub platform_id: DbId,
    pub usb_type_id: DbId,
    #[serde(default)]
    pub model_id: Option<DbId>,
    pub version_id: DbId,
    #[serde(default)]
    pub technician_id: Option<DbId>,
    #[serde(default)]
    pub custom_text: Option<String>,
    #[serde(flatten)]
    pub hardware: HardwareInfo,
}

/// Attributes read off the physical device during bulk registration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HardwareInfo {
    #[serde(default)]
    pub hardware_model: Option<String>,
    #[serde(default)]
    pub hardware_serial: Option<String>,
    #[serde(default)]
    pub capacity_gb: Option<f64>,
}

impl HardwareInfo {
    /// `self` over `base`, field by field.
    pub fn merged_over(&self, base: &HardwareInfo) -> HardwareInfo {
        HardwareInfo {
            hardware_model: self.hardware_model.clone().or_else(|| base.hardware_model.clone()),
            hardware_serial: self.hardware_serial.clone().or_else(|| base.hardware_serial.clone()),
            capacity_gb: self.capacity_gb.or(base.capacity_gb),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CreatedDrive {
    pub id: DbId,
    pub usb_id: UsbId,
}

/// Full replacement of the editable fields of a drive.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DriveUpdate {
    pub version_id: DbId,
    #[serde(default)]
    pub technician_id: Option<DbId>,
    pub status: DriveStatus,
    #[serde(default)]
    pub custom_text: Option<String>,
}

/// New placement for a drive that is re-flashed for another purpose.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Repurpose {
    pub platform_id: DbId,
    pub usb_type_id: DbId,
    #[serde(default)]
    pub model_id: Option<DbId>,
    pub version_id: DbId,
    #[serde(default)]
    pub technician_id: Option<DbId>,
    #[serde(default)]
    pub custom_text: Option<String>,
}

/// Changes applied to many drives at once. Absent fields are left alone;
/// for nullable fields `Some(None)` clears the value.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BulkUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_id: Option<DbId>,
    #[serde(
        default,
        deserialize_with = "double_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub technician_id: Option<Option<DbId>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<DriveStatus>,
    #[serde(
        default,
        deserialize_with = "double_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub custom_text: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repurpose: Option<BulkRepurpose>,
}

/// Type/model/version reassignment within a bulk edit. The platform follows
/// the type.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BulkRepurpose {
    pub usb_type_id: DbId,
    #[serde(default)]
    pub model_id: Option<DbId>,
    pub version_id: DbId,
}

fn double_option<'de, D, T>(de: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(de).map(Some)
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BulkUpdateResult {
    pub updated: usize,
    pub skipped: usize,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MarkUpdatedResult {
    pub updated: usize,
    pub skipped: usize,
}

/// Drive listing filters. Every set field must match; `search` is split on
/// whitespace and every term must match some displayed column.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DriveFilters {
    #[serde(default)]
    pub platform_id: Option<DbId>,
    #[serde(default)]
    pub usb_type_id: Option<DbId>,
    #[serde(default)]
    pub model_id: Option<DbId>,
    #[serde(default)]
    pub technician_id: Option<DbId>,
    #[serde(default)]
    pub status: Option<DriveStatus>,
    #[serde(default)]
    pub search: Option<String>,
}

/// A drive awaiting re-flash, with the version it should carry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PendingDrive {
    #[serde(flatten)]
    pub drive: UsbDrive,
    #[serde(default)]
    pub current_version_id: Option<DbId>,
    #[serde(default)]
    pub current_version_code: Option<String>,
}
