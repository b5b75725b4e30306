//! Error types for Scriptorium
//!
//! One variant per failure kind the library reports. Transport code maps
//! them to HTTP status codes via [`LibraryError::status_code`].

use hyper::StatusCode;

/// Main error type for library operations
#[derive(Debug, thiserror::Error)]
pub enum LibraryError {
    /// Participant, work or review absent (also used for cross-store divergence)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Missing or invalid credentials
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Role below the required minimum, or self-review
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Malformed payload or missing mandatory fields
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Already purchased, duplicate participant, illegal status change
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Review submission for a work that has no review rows at all
    #[error("No reviews: {0}")]
    NoReviews(String),

    /// Ledger refused the payment for lack of funds
    #[error("Insufficient funds: {0}")]
    InsufficientFunds(String),

    #[error("Ledger error: {0}")]
    Ledger(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl LibraryError {
    /// Convert error to HTTP status code
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::NoReviews(_) => StatusCode::NOT_FOUND,
            Self::InsufficientFunds(_) => StatusCode::PAYMENT_REQUIRED,
            Self::Ledger(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Short machine-readable code for JSON error bodies
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "NOT_FOUND",
            Self::Unauthorized(_) => "UNAUTHORIZED",
            Self::Forbidden(_) => "FORBIDDEN",
            Self::BadRequest(_) => "VALIDATION_FAILED",
            Self::Conflict(_) => "CONFLICT",
            Self::NoReviews(_) => "NO_REVIEWS",
            Self::InsufficientFunds(_) => "INSUFFICIENT_FUNDS",
            Self::Ledger(_) => "LEDGER_ERROR",
            Self::Database(_) => "DB_ERROR",
            Self::Config(_) => "CONFIG_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Whether the failure came from a store or the ledger rather than the caller.
    /// Callers never get an automatic retry for these.
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            Self::Ledger(_) | Self::Database(_) | Self::Internal(_)
        )
    }

    /// Convert to status code and body tuple for HTTP response
    pub fn into_status_code_and_body(self) -> (StatusCode, String) {
        let status = self.status_code();
        let body = self.to_string();
        (status, body)
    }
}

// Implement From conversions for common error types

impl From<std::io::Error> for LibraryError {
    fn from(err: std::io::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<serde_json::Error> for LibraryError {
    fn from(err: serde_json::Error) -> Self {
        Self::BadRequest(format!("JSON error: {}", err))
    }
}

impl From<hyper::Error> for LibraryError {
    fn from(err: hyper::Error) -> Self {
        Self::Internal(format!("HTTP error: {}", err))
    }
}

impl From<mongodb::error::Error> for LibraryError {
    fn from(err: mongodb::error::Error) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<bson::ser::Error> for LibraryError {
    fn from(err: bson::ser::Error) -> Self {
        Self::Database(format!("BSON encode error: {}", err))
    }
}

impl From<sqlx::Error> for LibraryError {
    fn from(err: sqlx::Error) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<reqwest::Error> for LibraryError {
    fn from(err: reqwest::Error) -> Self {
        Self::Ledger(err.to_string())
    }
}

impl From<jsonwebtoken::errors::Error> for LibraryError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        Self::Unauthorized(format!("JWT error: {}", err))
    }
}

/// Result type alias for library operations
pub type Result<T> = std::result::Result<T, LibraryError>;
