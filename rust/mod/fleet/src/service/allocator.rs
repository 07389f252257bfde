//! Sequential drive identifiers.

use flashback_sql::Executor;

use super::{FleetError, FleetService};
use crate::model::UsbId;

/// Issue the next identifier. Must run inside an open write transaction:
/// the counter advance and the drive insert commit or roll back together.
///
/// On exhaustion the counter has already been advanced within the
/// transaction; the caller's rollback restores it.
pub(crate) fn allocate<X: Executor + ?Sized>(db: &X) -> Result<UsbId, FleetError> {
    let row = db
        .query_one(
            "UPDATE usb_id_counter SET value = value + 1 WHERE id = 1 RETURNING value",
            &[],
        )?
        .ok_or_else(|| FleetError::Internal("usb_id_counter row missing".into()))?;
    let n = row.require_i64("value")?;
    UsbId::from_sequence(n).ok_or_else(|| {
        FleetError::AllocatorExhausted(format!(
            "sequence {} exceeds the {} available identifiers",
            n,
            UsbId::CAPACITY
        ))
    })
}

impl FleetService {
    /// The identifier the next created drive will receive, if any remain.
    pub fn peek_next_usb_id(&self) -> Result<Option<UsbId>, FleetError> {
        let row = self
            .sql
            .query_one("SELECT value FROM usb_id_counter WHERE id = 1", &[])
            .map_err(|e| FleetError::from(e).context("peek_next_usb_id"))?;
        let issued = row.and_then(|r| r.get_i64("value")).unwrap_or(0);
        Ok(UsbId::from_sequence(issued + 1))
    }
}
