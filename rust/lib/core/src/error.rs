use thiserror::Error;

// ── Error codes ─────────────────────────────────────────────────────
//
// Stable, machine-readable identifiers. Callers match on these, never on
// the human-readable message string.

/// Stable error code constants.
///
/// Callers should match on `code` from `{"code": "NOT_FOUND", "message": "..."}`.
/// Codes never change; messages may be reworded.
pub mod error_code {
    pub const NOT_FOUND: &str = "NOT_FOUND";
    pub const ALREADY_EXISTS: &str = "ALREADY_EXISTS";
    pub const VALIDATION_FAILED: &str = "VALIDATION_FAILED";
    pub const UNAVAILABLE: &str = "UNAVAILABLE";
    pub const STORAGE_ERROR: &str = "STORAGE_ERROR";
    pub const EXHAUSTED: &str = "EXHAUSTED";
    pub const INTERNAL: &str = "INTERNAL";
}

// ── ServiceError ────────────────────────────────────────────────────

/// Unified error type surfaced to callers of the fleet service.
///
/// Each variant maps to a stable error code (see [`error_code`]). The JSON
/// form always includes both:
///
/// ```json
/// {"code": "NOT_FOUND", "message": "version/42 not found"}
/// ```
#[derive(Error, Debug)]
pub enum ServiceError {
    /// Referenced entity does not exist.
    #[error("{0}")]
    NotFound(String),

    /// Duplicate key / resource already exists.
    #[error("{0}")]
    Conflict(String),

    /// Input data is malformed or referentially inconsistent.
    #[error("{0}")]
    Validation(String),

    /// Storage is temporarily unreachable. Safe to resubmit.
    #[error("{0}")]
    Unavailable(String),

    /// Storage rejected the operation.
    #[error("{0}")]
    Storage(String),

    /// A finite resource (the drive identifier space) is used up.
    /// Needs operator intervention.
    #[error("{0}")]
    Exhausted(String),

    /// Unexpected internal error.
    #[error("{0}")]
    Internal(String),
}

impl ServiceError {
    /// Stable, machine-readable error code.
    pub fn error_code(&self) -> &'static str {
        match self {
            ServiceError::NotFound(_) => error_code::NOT_FOUND,
            ServiceError::Conflict(_) => error_code::ALREADY_EXISTS,
            ServiceError::Validation(_) => error_code::VALIDATION_FAILED,
            ServiceError::Unavailable(_) => error_code::UNAVAILABLE,
            ServiceError::Storage(_) => error_code::STORAGE_ERROR,
            ServiceError::Exhausted(_) => error_code::EXHAUSTED,
            ServiceError::Internal(_) => error_code::INTERNAL,
        }
    }

    /// Whether the whole operation may be resubmitted as-is.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ServiceError::Unavailable(_))
    }

    /// JSON body used by the CLI when reporting a failure.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "code": self.error_code(),
            "message": self.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_code_mapping() {
        assert_eq!(ServiceError::NotFound("x".into()).error_code(), "NOT_FOUND");
        assert_eq!(ServiceError::Conflict("x".into()).error_code(), "ALREADY_EXISTS");
        assert_eq!(ServiceError::Validation("x".into()).error_code(), "VALIDATION_FAILED");
        assert_eq!(ServiceError::Unavailable("x".into()).error_code(), "UNAVAILABLE");
        assert_eq!(ServiceError::Storage("x".into()).error_code(), "STORAGE_ERROR");
        assert_eq!(ServiceError::Exhausted("x".into()).error_code(), "EXHAUSTED");
        assert_eq!(ServiceError::Internal("x".into()).error_code(), "INTERNAL");
    }

    #[test]
    fn only_unavailable_is_retryable() {
        assert!(ServiceError::Unavailable("pool".into()).is_retryable());
        assert!(!ServiceError::Storage("constraint".into()).is_retryable());
        assert!(!ServiceError::Exhausted("ids".into()).is_retryable());
    }

    #[test]
    fn json_body_format() {
        let err = ServiceError::NotFound("version/42 not found".into());
        assert_eq!(
            err.to_json(),
            serde_json::json!({"code": "NOT_FOUND", "message": "version/42 not found"})
        );
    }

    #[test]
    fn error_display_is_just_message() {
        assert_eq!(ServiceError::NotFound("drive 123".into()).to_string(), "drive 123");
        assert_eq!(ServiceError::Validation("bad input".into()).to_string(), "bad input");
    }
}
