pub mod allocator;
pub mod audit;
pub mod catalog;
pub mod currency;
pub mod dashboard;
pub mod drive;
pub mod pending;
pub mod schema;
pub mod version;

mod rows;

use std::sync::Arc;

use flashback_core::ServiceError;
use flashback_sql::{with_transaction, SQLError, SQLStore, Transaction};

/// Fleet service errors.
#[derive(Debug, thiserror::Error)]
pub enum FleetError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("validation: {0}")]
    Validation(String),

    /// Storage unreachable or busy. Safe to retry.
    #[error("connection: {0}")]
    Connection(String),

    #[error("query: {0}")]
    Query(String),

    /// Every drive identifier has been issued.
    #[error("usb id space exhausted: {0}")]
    AllocatorExhausted(String),

    #[error("internal: {0}")]
    Internal(String),
}

impl FleetError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, FleetError::Connection(_))
    }

    /// Prefix the message with the failing operation.
    pub fn context(self, op: &str) -> Self {
        let wrap = |m: String| format!("{}: {}", op, m);
        match self {
            FleetError::NotFound(m) => FleetError::NotFound(wrap(m)),
            FleetError::Validation(m) => FleetError::Validation(wrap(m)),
            FleetError::Connection(m) => FleetError::Connection(wrap(m)),
            FleetError::Query(m) => FleetError::Query(wrap(m)),
            FleetError::AllocatorExhausted(m) => FleetError::AllocatorExhausted(wrap(m)),
            FleetError::Internal(m) => FleetError::Internal(wrap(m)),
        }
    }

    pub(crate) fn not_found(kind: &str, id: i64) -> Self {
        FleetError::NotFound(format!("{}/{}", kind, id))
    }
}

impl From<SQLError> for FleetError {
    fn from(e: SQLError) -> Self {
        match e {
            SQLError::Connection(m) => FleetError::Connection(m),
            SQLError::Query(m) | SQLError::Execution(m) => FleetError::Query(m),
        }
    }
}

impl From<FleetError> for ServiceError {
    fn from(e: FleetError) -> Self {
        match e {
            FleetError::NotFound(m) => ServiceError::NotFound(m),
            FleetError::Validation(m) => ServiceError::Validation(m),
            FleetError::Connection(m) => ServiceError::Unavailable(m),
            FleetError::Query(m) => ServiceError::Storage(m),
            FleetError::AllocatorExhausted(m) => ServiceError::Exhausted(m),
            FleetError::Internal(m) => ServiceError::Internal(m),
        }
    }
}

/// The fleet service. Every mutating operation runs in one transaction.
pub struct FleetService {
    pub(crate) sql: Arc<dyn SQLStore>,
}

impl FleetService {
    /// Create a new FleetService, initializing the DB schema.
    pub fn new(sql: Arc<dyn SQLStore>) -> Result<Self, FleetError> {
        schema::init_schema(sql.as_ref())?;
        Ok(Self { sql })
    }

    pub fn store(&self) -> &dyn SQLStore {
        self.sql.as_ref()
    }

    /// Run `f` in a transaction, tagging any error with `op`.
    pub(crate) fn in_tx<T>(
        &self,
        op: &str,
        f: impl FnOnce(&dyn Transaction) -> Result<T, FleetError>,
    ) -> Result<T, FleetError> {
        with_transaction(self.sql.as_ref(), f).map_err(|e| e.context(op))
    }

    /// Run autocommit reads, tagging any error with `op`.
    pub(crate) fn read<T>(
        &self,
        op: &str,
        f: impl FnOnce(&dyn SQLStore) -> Result<T, FleetError>,
    ) -> Result<T, FleetError> {
        f(self.sql.as_ref()).map_err(|e| e.context(op))
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sql_errors_map_to_fleet_errors() {
        assert!(FleetError::from(SQLError::Connection("busy".into())).is_retryable());
        assert!(matches!(
            FleetError::from(SQLError::Execution("constraint".into())),
            FleetError::Query(_)
        ));
    }

    #[test]
    fn context_prefixes_operation() {
        let e = FleetError::not_found("version", 42).context("promote_to_current");
        assert_eq!(e.to_string(), "not found: promote_to_current: version/42");
    }

    #[test]
    fn service_error_codes() {
        let e: ServiceError = FleetError::AllocatorExhausted("Z999".into()).into();
        assert_eq!(e.error_code(), flashback_core::error::error_code::EXHAUSTED);
        let e: ServiceError = FleetError::Connection("locked".into()).into();
        assert!(e.is_retryable());
    }
}
