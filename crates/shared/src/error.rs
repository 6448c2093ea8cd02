//! Application-wide error types.

use thiserror::Error;

/// Result type alias using `AppError`.
pub type AppResult<T> = Result<T, AppError>;

/// Application error types.
///
/// Domain crates map their own errors into this envelope. `code` carries the
/// machine-readable domain code (e.g. `RUN_ALREADY_EXISTS`).
#[derive(Debug, Error)]
pub enum AppError {
    /// Resource not found.
    #[error("Not found: {message}")]
    NotFound {
        /// Domain error code.
        code: &'static str,
        /// Human-readable message.
        message: String,
    },

    /// Validation error.
    #[error("Validation error: {message}")]
    Validation {
        /// Domain error code.
        code: &'static str,
        /// Human-readable message.
        message: String,
    },

    /// Business rule violation.
    #[error("Business rule violation: {message}")]
    BusinessRule {
        /// Domain error code.
        code: &'static str,
        /// Human-readable message.
        message: String,
    },

    /// Conflict (e.g., duplicate entry, concurrent modification).
    #[error("Conflict: {message}")]
    Conflict {
        /// Domain error code.
        code: &'static str,
        /// Human-readable message.
        message: String,
    },

    /// Database error.
    #[error("Database error: {0}")]
    Database(String),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::NotFound { .. } => 404,
            Self::Validation { .. } => 400,
            Self::BusinessRule { .. } => 422,
            Self::Conflict { .. } => 409,
            Self::Database(_) | Self::Internal(_) => 500,
        }
    }

    /// Returns the error code for API responses.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound { code, .. }
            | Self::Validation { code, .. }
            | Self::BusinessRule { code, .. }
            | Self::Conflict { code, .. } => code,
            Self::Database(_) => "DATABASE_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Message safe to show to callers.
    ///
    /// Infrastructure errors never expose their underlying detail.
    #[must_use]
    pub fn public_message(&self) -> String {
        match self {
            Self::Database(_) | Self::Internal(_) => "An unexpected error occurred".to_string(),
            Self::NotFound { message, .. }
            | Self::Validation { message, .. }
            | Self::BusinessRule { message, .. }
            | Self::Conflict { message, .. } => message.clone(),
        }
    }

    /// Builds the JSON error body returned by an API layer.
    #[must_use]
    pub fn to_response_body(&self) -> serde_json::Value {
        serde_json::json!({
            "error": {
                "code": self.error_code(),
                "message": self.public_message(),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn not_found() -> AppError {
        AppError::NotFound {
            code: "GROUP_NOT_FOUND",
            message: "Consolidation group 42 not found".to_string(),
        }
    }

    #[test]
    fn test_error_status_codes() {
        assert_eq!(not_found().status_code(), 404);
        assert_eq!(
            AppError::Validation { code: "X", message: String::new() }.status_code(),
            400
        );
        assert_eq!(
            AppError::BusinessRule { code: "X", message: String::new() }.status_code(),
            422
        );
        assert_eq!(
            AppError::Conflict { code: "X", message: String::new() }.status_code(),
            409
        );
        assert_eq!(AppError::Database(String::new()).status_code(), 500);
        assert_eq!(AppError::Internal(String::new()).status_code(), 500);
    }

    #[test]
    fn test_domain_code_passes_through() {
        assert_eq!(not_found().error_code(), "GROUP_NOT_FOUND");
        assert_eq!(AppError::Database(String::new()).error_code(), "DATABASE_ERROR");
        assert_eq!(AppError::Internal(String::new()).error_code(), "INTERNAL_ERROR");
    }

    #[test]
    fn test_infrastructure_detail_is_hidden() {
        let err = AppError::Database("connection refused on 10.0.0.4:5432".to_string());
        assert_eq!(err.public_message(), "An unexpected error occurred");
        assert!(!err.to_response_body().to_string().contains("10.0.0.4"));
    }

    #[test]
    fn test_response_body_shape() {
        let body = not_found().to_response_body();
        assert_eq!(body["error"]["code"], "GROUP_NOT_FOUND");
        assert_eq!(body["error"]["message"], "Consolidation group 42 not found");
    }

    #[test]
    fn test_error_display() {
        assert_eq!(not_found().to_string(), "Not found: Consolidation group 42 not found");
        assert_eq!(
            AppError::Database("msg".into()).to_string(),
            "Database error: msg"
        );
    }
}
