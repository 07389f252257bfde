use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SQLError {
    #[error("query error: {0}")]
    Query(String),

    #[error("execution error: {0}")]
    Execution(String),

    /// Transient: lost/refused connection, busy database, exhausted pool.
    #[error("connection error: {0}")]
    Connection(String),
}

impl SQLError {
    /// Only connection failures are worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SQLError::Connection(_))
    }

    /// Whether the statement was rejected by a UNIQUE constraint.
    pub fn is_unique_violation(&self) -> bool {
        match self {
            SQLError::Query(m) | SQLError::Execution(m) => m.contains("UNIQUE constraint"),
            SQLError::Connection(_) => false,
        }
    }
}
