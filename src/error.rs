use crate::adapters::push::apns::token::AuthTokenError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::{Value, json};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("{message}: {details}")]
    Upstream { message: &'static str, details: String },
    #[error("Missing APNs secrets: {}", .0.join(", "))]
    MissingConfig(Vec<&'static str>),
    #[error("Missing store configuration: {}", .0.join(", "))]
    MissingStoreConfig(Vec<&'static str>),
    #[error("Invalid request: {0}")]
    BadRequest(String),
    #[error("Unauthorized")]
    Unauthorized,
    #[error("Method not allowed")]
    MethodNotAllowed,
    #[error("Not found")]
    NotFound,
    #[error("Failed to create APNs JWT: {0}")]
    Signing(#[from] AuthTokenError),
    #[error("Request timed out")]
    Timeout,
    #[error("Internal server error")]
    Internal,
}

pub type Result<T> = std::result::Result<T, AppError>;

impl AppError {
    /// Names a failed store operation, keeping the driver message as details.
    #[must_use]
    pub fn context(self, message: &'static str) -> Self {
        match self {
            Self::Database(e) => Self::Upstream { message, details: e.to_string() },
            Self::Internal => Self::Upstream { message, details: "internal error".to_string() },
            other => other,
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<Value>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, details) = match self {
            Self::Database(e) => {
                tracing::error!(error = %e, "Database error");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string(), None)
            }
            Self::Upstream { message, details } => {
                tracing::error!(error = %details, "{message}");
                (StatusCode::INTERNAL_SERVER_ERROR, message.to_string(), Some(Value::String(details)))
            }
            Self::MissingConfig(missing) => {
                tracing::error!(missing = ?missing, "APNs configuration incomplete");
                (StatusCode::INTERNAL_SERVER_ERROR, "Missing APNs secrets".to_string(), Some(json!({ "missing": missing })))
            }
            Self::MissingStoreConfig(missing) => {
                tracing::error!(missing = ?missing, "Store configuration incomplete");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Missing store configuration".to_string(),
                    Some(json!({ "missing": missing })),
                )
            }
            Self::BadRequest(msg) => {
                tracing::debug!(message = %msg, "Bad request");
                (StatusCode::BAD_REQUEST, msg, None)
            }
            Self::Unauthorized => {
                tracing::debug!("Unauthorized");
                (StatusCode::UNAUTHORIZED, "Unauthorized".to_string(), None)
            }
            Self::MethodNotAllowed => (StatusCode::METHOD_NOT_ALLOWED, "Method not allowed".to_string(), None),
            Self::NotFound => (StatusCode::NOT_FOUND, "Not found".to_string(), None),
            Self::Signing(e) => {
                tracing::error!(error = %e, "Failed to create APNs JWT");
                (StatusCode::INTERNAL_SERVER_ERROR, "Failed to create APNs JWT".to_string(), Some(Value::String(e.to_string())))
            }
            Self::Timeout => {
                tracing::warn!("Invocation timed out");
                (StatusCode::GATEWAY_TIMEOUT, "Request timed out".to_string(), None)
            }
            Self::Internal => {
                tracing::error!("Internal server error occurred");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string(), None)
            }
        };

        (status, Json(ErrorBody { error, details })).into_response()
    }
}
