// Error handling and response envelope for the HTTP surface
// Every response body has the shape { "data": ..., "error": ... }

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use chrono::Utc;
use serde::Serialize;
use tracing::{debug, error, warn};

use crate::auth::AuthError;
use crate::automations::AutomationError;
use crate::finance::FinanceError;

/// Main error type for the API
///
/// Each variant maps to a specific HTTP status code. Handlers return
/// `Result<_, ApiError>` and domain errors convert into it with `?`.
#[derive(Debug)]
pub enum ApiError {
    /// Maps to HTTP 400 Bad Request
    ValidationError(validator::ValidationErrors),

    /// Maps to HTTP 400 Bad Request
    BadRequest(String),

    /// Maps to HTTP 404 Not Found
    NotFound { resource: String, id: String },

    /// Maps to HTTP 500; details stay in the logs
    DatabaseError(sqlx::Error),

    /// Maps to HTTP 401 Unauthorized
    Unauthorized(String),

    /// Maps to HTTP 403 Forbidden
    Forbidden(String),
}

/// Error half of the envelope
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Machine-readable error code (e.g. "VALIDATION_ERROR")
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    /// RFC 3339 timestamp of when the error occurred
    pub timestamp: String,
}

/// Uniform response envelope. `error` is null on success, `data` is null on failure.
#[derive(Debug, Serialize)]
pub struct Envelope<T: Serialize> {
    pub data: Option<T>,
    pub error: Option<ErrorBody>,
}

impl<T: Serialize> Envelope<T> {
    pub fn ok(data: T) -> Self {
        Self {
            data: Some(data),
            error: None,
        }
    }
}

/// Wrap a successful payload in the envelope
pub fn ok<T: Serialize>(data: T) -> Json<Envelope<T>> {
    Json(Envelope::ok(data))
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = self.to_error_body();
        let envelope: Envelope<()> = Envelope {
            data: None,
            error: Some(body),
        };
        (status, Json(envelope)).into_response()
    }
}

impl ApiError {
    fn to_error_body(&self) -> (StatusCode, ErrorBody) {
        let timestamp = Utc::now().to_rfc3339();
        match self {
            ApiError::ValidationError(errors) => {
                debug!("Validation error: {:?}", errors);
                (
                    StatusCode::BAD_REQUEST,
                    ErrorBody {
                        code: "VALIDATION_ERROR".to_string(),
                        message: "Request validation failed".to_string(),
                        details: serde_json::to_value(errors).ok(),
                        timestamp,
                    },
                )
            }
            ApiError::BadRequest(message) => {
                debug!("Bad request: {}", message);
                (
                    StatusCode::BAD_REQUEST,
                    ErrorBody {
                        code: "BAD_REQUEST".to_string(),
                        message: message.clone(),
                        details: None,
                        timestamp,
                    },
                )
            }
            ApiError::NotFound { resource, id } => {
                debug!("Resource not found: {} with id {}", resource, id);
                (
                    StatusCode::NOT_FOUND,
                    ErrorBody {
                        code: "NOT_FOUND".to_string(),
                        message: format!("{} with id {} not found", resource, id),
                        details: None,
                        timestamp,
                    },
                )
            }
            ApiError::DatabaseError(db_error) => {
                error!("Database error: {:?}", db_error);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorBody {
                        code: "DATABASE_ERROR".to_string(),
                        message: "A database error occurred".to_string(),
                        details: None,
                        timestamp,
                    },
                )
            }
            ApiError::Unauthorized(message) => {
                warn!("Unauthorized access attempt: {}", message);
                (
                    StatusCode::UNAUTHORIZED,
                    ErrorBody {
                        code: "UNAUTHORIZED".to_string(),
                        message: message.clone(),
                        details: None,
                        timestamp,
                    },
                )
            }
            ApiError::Forbidden(message) => {
                warn!("Forbidden access attempt: {}", message);
                (
                    StatusCode::FORBIDDEN,
                    ErrorBody {
                        code: "FORBIDDEN".to_string(),
                        message: message.clone(),
                        details: None,
                        timestamp,
                    },
                )
            }
        }
    }

    /// HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::ValidationError(_) | ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound { .. } => StatusCode::NOT_FOUND,
            ApiError::DatabaseError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
        }
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(error: sqlx::Error) -> Self {
        ApiError::DatabaseError(error)
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        ApiError::ValidationError(errors)
    }
}

impl From<AuthError> for ApiError {
    fn from(error: AuthError) -> Self {
        match error {
            AuthError::InsufficientPermissions { .. } => ApiError::Forbidden(error.to_string()),
            other => ApiError::Unauthorized(other.to_string()),
        }
    }
}

impl From<AutomationError> for ApiError {
    fn from(error: AutomationError) -> Self {
        match error {
            AutomationError::Database(e) => ApiError::DatabaseError(e),
            AutomationError::NotFound(id) => ApiError::NotFound {
                resource: "Automation".to_string(),
                id: id.to_string(),
            },
            AutomationError::InvalidTriggerConfig { .. }
            | AutomationError::UnknownType { .. }
            | AutomationError::UnregisteredTrigger(_) => ApiError::BadRequest(error.to_string()),
        }
    }
}

impl From<FinanceError> for ApiError {
    fn from(error: FinanceError) -> Self {
        match error {
            FinanceError::Database(e) => ApiError::DatabaseError(e),
            FinanceError::InvalidDate { .. } | FinanceError::InvalidRange(_) => {
                ApiError::BadRequest(error.to_string())
            }
        }
    }
}
