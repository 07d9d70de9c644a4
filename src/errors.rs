//! HTTP error type. Every failing handler returns an [`AppError`], which
//! renders the `{message, errors, code, success: false}` envelope.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use compute::ComputeError;
use model::TransitionError;
use sea_orm::{DbErr, SqlErr};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{error, warn};

use crate::schemas::ErrorResponse;

#[derive(Debug, Error)]
pub enum AppError {
    /// Input that breaks a validation or business rule (400).
    #[error("{message}")]
    BadRequest { message: String, errors: Option<Value> },

    /// Missing, malformed, expired or revoked credentials (401).
    #[error("{0}")]
    Unauthorized(String),

    /// Authenticated but not allowed to act on the resource (403).
    #[error("Permission denied")]
    PermissionDenied(String),

    #[error("{0}")]
    NotFound(String),

    #[error(transparent)]
    Database(#[from] DbErr),

    /// Failure whose details stay in the logs (500).
    #[error("{0}")]
    Internal(String),
}

impl AppError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        AppError::BadRequest { message: message.into(), errors: None }
    }

    /// 400 with the message attached to one field, `{field: [message]}`.
    pub fn field(field: &str, message: impl Into<String>) -> Self {
        let message = message.into();
        AppError::BadRequest {
            errors: Some(json!({ field: [message.clone()] })),
            message,
        }
    }

    pub fn forbidden(detail: impl Into<String>) -> Self {
        AppError::PermissionDenied(detail.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        AppError::NotFound(format!("{} not found.", what.into()))
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        AppError::Unauthorized(message.into())
    }
}

/// Column named in a unique-constraint message, e.g. `users.email` in
/// SQLite's "UNIQUE constraint failed: users.email".
fn unique_field(detail: &str) -> Option<String> {
    let columns = detail.split("failed:").nth(1)?;
    let first = columns.split(',').next()?.trim();
    let column = first.rsplit('.').next()?.trim();
    (!column.is_empty()).then(|| column.to_string())
}

impl From<ComputeError> for AppError {
    fn from(err: ComputeError) -> Self {
        match err {
            ComputeError::Database(db) => AppError::Database(db),
            ComputeError::Validation(message) => AppError::bad_request(message),
            ComputeError::NotFound(what) => AppError::not_found(what),
            ComputeError::MissingTemplateVariable(name) => {
                AppError::field("variables", format!("Missing template variable: {name}"))
            }
            ComputeError::Runtime(message) => AppError::Internal(message),
        }
    }
}

impl From<TransitionError> for AppError {
    fn from(err: TransitionError) -> Self {
        AppError::field("status", err.to_string())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errs: validator::ValidationErrors) -> Self {
        let mut fields = serde_json::Map::new();
        for (field, problems) in errs.field_errors() {
            let messages: Vec<String> = problems
                .iter()
                .map(|problem| match &problem.message {
                    Some(message) => message.to_string(),
                    None => format!("Invalid value ({}).", problem.code),
                })
                .collect();
            fields.insert(field.to_string(), json!(messages));
        }
        AppError::BadRequest { message: "Validation failed.".to_string(), errors: Some(Value::Object(fields)) }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message, errors) = match self {
            AppError::BadRequest { message, errors } => {
                warn!(%message, "rejecting invalid request");
                (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", message, errors)
            }
            AppError::Unauthorized(message) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", message, None),
            AppError::PermissionDenied(detail) => (
                StatusCode::FORBIDDEN,
                "PERMISSION_DENIED",
                "Permission denied".to_string(),
                Some(json!({ "detail": detail })),
            ),
            AppError::NotFound(message) => (StatusCode::NOT_FOUND, "NOT_FOUND", message, None),
            AppError::Database(db_err) => match db_err.sql_err() {
                Some(SqlErr::UniqueConstraintViolation(detail)) => {
                    warn!(%detail, "unique constraint violated");
                    let field = unique_field(&detail).unwrap_or_else(|| "non_field_errors".to_string());
                    let message = format!("A record with this {} already exists.", field.replace('_', " "));
                    let errors = Some(json!({ field: [message.clone()] }));
                    (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", message, errors)
                }
                _ => {
                    error!(error = %db_err, "database error");
                    (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", "Internal server error".to_string(), None)
                }
            },
            AppError::Internal(details) => {
                error!(%details, "internal error");
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", "Internal server error".to_string(), None)
            }
        };

        let body = ErrorResponse { message, errors, code: code.to_string(), success: false };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unique_messages_name_the_column() {
        assert_eq!(unique_field("UNIQUE constraint failed: users.email"), Some("email".to_string()));
        assert_eq!(
            unique_field("UNIQUE constraint failed: bookings.service_id, bookings.booking_date"),
            Some("service_id".to_string())
        );
        assert_eq!(unique_field("duplicate key value violates unique constraint"), None);
    }

    #[test]
    fn permission_denied_carries_detail() {
        let response = AppError::forbidden("Only admins may do this.").into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }
}
