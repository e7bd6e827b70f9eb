//! Application-wide error types.

use thiserror::Error;

/// Result type alias using `AppError`.
pub type AppResult<T> = Result<T, AppError>;

/// Application error types.
#[derive(Debug, Error)]
pub enum AppError {
    /// Access denied.
    #[error("Access denied: {0}")]
    Forbidden(String),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Malformed input.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Business-rule violation (cancelled trip, closed booking window,
    /// duplicate ticket, stale price, …). Recoverable by the caller.
    #[error("Transaction rule violation: {0}")]
    TransactionRule(String),

    /// Payment gateway declined or was unreachable. The caller may retry
    /// with the same idempotency key.
    #[error("Charge failed: {0}")]
    Charge(String),

    /// Database error.
    #[error("Database error: {0}")]
    Database(String),

    /// Invariant violation. Fatal; surfaced as 5xx.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::Forbidden(_) => 403,
            Self::NotFound(_) => 404,
            Self::Validation(_) => 400,
            Self::TransactionRule(_) => 422,
            Self::Charge(_) => 402,
            Self::Database(_) | Self::Internal(_) => 500,
        }
    }

    /// Returns the error code for API responses.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::Forbidden(_) => "FORBIDDEN",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::TransactionRule(_) => "TRANSACTION_RULE_VIOLATION",
            Self::Charge(_) => "CHARGE_ERROR",
            Self::Database(_) => "DATABASE_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Returns true if the caller may retry the operation unchanged.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Charge(_) | Self::Database(_))
    }
}
