//! Application error type and HTTP error rendering.
//!
//! Every failure that reaches a caller is one of five kinds. Validation, not-found
//! and rate-limit errors are final for the given input; dependency errors mean a
//! downstream store or the relay was unreachable (or its breaker is open).

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::{Value, json};

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorInfo,
}

#[derive(Serialize)]
struct ErrorInfo {
    code: &'static str,
    message: String,
    details: Value,
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{message}")]
    Validation { message: String, details: Value },

    #[error("{message}")]
    NotFound { message: String, details: Value },

    #[error("{message}")]
    RateLimited { message: String, details: Value },

    #[error("{dependency} unavailable: {message}")]
    Dependency {
        dependency: &'static str,
        message: String,
    },

    #[error("{message}")]
    Internal { message: String, details: Value },
}

impl AppError {
    pub fn bad_request(message: impl Into<String>, details: Value) -> Self {
        Self::Validation {
            message: message.into(),
            details,
        }
    }

    pub fn not_found(message: impl Into<String>, details: Value) -> Self {
        Self::NotFound {
            message: message.into(),
            details,
        }
    }

    pub fn rate_limited(message: impl Into<String>, details: Value) -> Self {
        Self::RateLimited {
            message: message.into(),
            details,
        }
    }

    pub fn dependency(dependency: &'static str, message: impl Into<String>) -> Self {
        Self::Dependency {
            dependency,
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>, details: Value) -> Self {
        Self::Internal {
            message: message.into(),
            details,
        }
    }

    /// Short label used for metrics and structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Validation { .. } => "validation",
            AppError::NotFound { .. } => "not_found",
            AppError::RateLimited { .. } => "rate_limited",
            AppError::Dependency { .. } => "dependency",
            AppError::Internal { .. } => "internal",
        }
    }

    /// Returns `true` when retrying the same input can never succeed.
    ///
    /// The relay consumer acknowledges such messages instead of leaving them
    /// for redelivery.
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            AppError::Validation { .. } | AppError::NotFound { .. } | AppError::Internal { .. }
        )
    }

    /// Returns `true` when the request, not the dependency, was at fault.
    ///
    /// Breakers record such calls as successes: the dependency answered.
    pub fn is_caller_fault(&self) -> bool {
        matches!(
            self,
            AppError::Validation { .. } | AppError::NotFound { .. } | AppError::RateLimited { .. }
        )
    }

    /// Maps a PostgreSQL SQLSTATE that blames the input to a caller error.
    ///
    /// Class 22 (data exception) and class 23 (integrity constraint
    /// violation) are final for the given input. A foreign key violation can
    /// only come from `clicks.ad_id`, so it reads as an unknown advertisement.
    /// Every other code returns `None`.
    pub fn from_sqlstate(code: &str, constraint: Option<&str>) -> Option<Self> {
        let details = json!({ "sqlstate": code, "constraint": constraint });
        match code {
            FOREIGN_KEY_VIOLATION => Some(AppError::not_found("advertisement not found", details)),
            c if c.starts_with("22") => Some(AppError::bad_request("invalid click data", details)),
            c if c.starts_with("23") => {
                Some(AppError::bad_request("constraint violation", details))
            }
            _ => None,
        }
    }
}

const FOREIGN_KEY_VIOLATION: &str = "23503";

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message, details) = match self {
            AppError::Validation { message, details } => (
                StatusCode::BAD_REQUEST,
                "validation_error",
                message,
                details,
            ),
            AppError::NotFound { message, details } => {
                (StatusCode::NOT_FOUND, "not_found", message, details)
            }
            AppError::RateLimited { message, details } => (
                StatusCode::TOO_MANY_REQUESTS,
                "rate_limited",
                message,
                details,
            ),
            AppError::Dependency {
                dependency,
                message,
            } => (
                StatusCode::SERVICE_UNAVAILABLE,
                "dependency_unavailable",
                message,
                json!({ "dependency": dependency }),
            ),
            AppError::Internal { message, details } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                message,
                details,
            ),
        };

        let body = ErrorBody {
            error: ErrorInfo {
                code,
                message,
                details,
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        if let Some(db) = e.as_database_error()
            && let Some(code) = db.code()
            && let Some(rejected) = AppError::from_sqlstate(&code, db.constraint())
        {
            tracing::warn!(sqlstate = %code, error = %e, "Database rejected input");
            return rejected;
        }

        tracing::error!(error = %e, "Database error");
        AppError::dependency("postgres", e.to_string())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(e: validator::ValidationErrors) -> Self {
        AppError::bad_request("invalid request body", json!(e))
    }
}
