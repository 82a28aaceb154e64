use crate::api::AppState;
use crate::api::schemas::push::SendPushRequest;
use crate::error::{AppError, Result};
use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::HeaderMap,
    response::IntoResponse,
};
use tokio::time::timeout;

pub const CRON_SECRET_HEADER: &str = "x-cron-secret";

/// Sends an alert to every iOS device of the requested users.
///
/// # Errors
/// Returns `AppError::MissingStoreConfig` before reading the body if the store is not configured.
/// Returns `AppError::MissingConfig` before reading the body if signing secrets are absent.
/// Returns `AppError::BadRequest` if the body is not valid JSON or fails validation.
/// Returns `AppError::Upstream` if device tokens cannot be loaded.
/// Returns `AppError::Signing` if the provider token cannot be created.
/// Returns `AppError::Timeout` if the invocation exceeds the request timeout.
pub async fn send_push_ios(
    State(state): State<AppState>,
    payload: std::result::Result<Json<SendPushRequest>, JsonRejection>,
) -> Result<impl IntoResponse> {
    state.require_store()?;
    let credential = state.push_service.credential()?;

    let Json(request) = payload.map_err(|e| {
        tracing::debug!(error = %e, "Rejected request body");
        AppError::BadRequest("Invalid JSON".into())
    })?;
    let command = request.validate().map_err(AppError::BadRequest)?;

    let report = timeout(state.request_timeout, state.push_service.send(&credential, command))
        .await
        .map_err(|_| AppError::Timeout)??;

    Ok(Json(report))
}

/// Drains one batch of the push outbox; called by an external scheduler.
///
/// # Errors
/// Returns `AppError::Unauthorized` if the cron secret does not match.
/// Returns `AppError::MissingStoreConfig` if the store is not configured.
/// Returns `AppError::MissingConfig` if signing secrets are absent.
/// Returns `AppError::Upstream` if the outbox or its tokens cannot be loaded.
/// Returns `AppError::Timeout` if the drain exceeds the request timeout.
pub async fn process_push_outbox(State(state): State<AppState>, headers: HeaderMap) -> Result<impl IntoResponse> {
    let supplied = headers.get(CRON_SECRET_HEADER).and_then(|v| v.to_str().ok());
    state.outbox_service.authorize(supplied)?;
    state.require_store()?;

    let credential = state.push_service.credential()?;

    let report =
        timeout(state.request_timeout, state.outbox_service.drain(&credential)).await.map_err(|_| AppError::Timeout)??;

    Ok(Json(report))
}

pub async fn method_not_allowed() -> AppError {
    AppError::MethodNotAllowed
}

pub async fn not_found() -> AppError {
    AppError::NotFound
}
