//! Domain error model.

use thiserror::Error;

/// Result type used when building or validating rule data.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Raised only while rule data is being assembled into a snapshot. Evaluating
/// a snapshot never produces a `DomainError`: missing data is a denial.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A value failed validation (e.g. empty role id, unknown condition).
    #[error("validation failed: {0}")]
    Validation(String),

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// Two pieces of rule data claim the same key.
    #[error("conflict: {0}")]
    Conflict(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }
}
