use crate::error::{AppError, Result};
use crate::services::health_service::HealthService;
use crate::services::outbox_service::OutboxService;
use crate::services::push_service::PushService;
use axum::body::Body;
use axum::http::Request;
use axum::{Router, middleware::from_fn, routing::get, routing::post};
use std::time::Duration;
use tower_http::request_id::{PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

pub mod health;
pub mod middleware;
pub mod push;
pub mod schemas;

#[derive(Clone, Debug)]
pub struct AppState {
    pub push_service: PushService,
    pub outbox_service: OutboxService,
    pub request_timeout: Duration,
    /// Store settings that are absent; non-empty fails every invocation.
    pub missing_store_config: Vec<&'static str>,
}

impl AppState {
    /// # Errors
    /// Returns `AppError::MissingStoreConfig` if the device-token store is not configured.
    pub fn require_store(&self) -> Result<()> {
        if self.missing_store_config.is_empty() {
            Ok(())
        } else {
            Err(AppError::MissingStoreConfig(self.missing_store_config.clone()))
        }
    }
}

#[derive(Clone, Debug)]
pub struct MgmtState {
    pub health_service: HealthService,
}

/// Configures and returns the public application router.
pub fn app_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/send_push_ios", post(push::send_push_ios).fallback(push::method_not_allowed))
        .route("/process_push_outbox", post(push::process_push_outbox).fallback(push::method_not_allowed));

    Router::new()
        .nest("/v1", api_routes)
        .fallback(push::not_found)
        .with_state(state)
        .layer(PropagateRequestIdLayer::new(middleware::request_id_header()))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &Request<Body>| {
                    let request_id = request
                        .extensions()
                        .get::<tower_http::request_id::RequestId>()
                        .map(|id| id.header_value().to_str().unwrap_or_default())
                        .unwrap_or_default()
                        .to_string();

                    tracing::info_span!(
                        "request",
                        "request_id" = %request_id,
                        "http.request.method" = %request.method(),
                        "url.path" = %request.uri().path(),
                        "http.response.status_code" = tracing::field::Empty,
                        "otel.kind" = "server",
                    )
                })
                .on_response(
                    |response: &axum::http::Response<_>, latency: Duration, span: &tracing::Span| {
                        let status = response.status();
                        span.record("http.response.status_code", status.as_u16());

                        tracing::info!(
                            latency_ms = %latency.as_millis(),
                            status = %status.as_u16(),
                            "request completed"
                        );
                    },
                )
                .on_failure(|error, _latency, _span: &tracing::Span| {
                    tracing::error!(error = %error, "request failed");
                }),
        )
        .layer(SetRequestIdLayer::new(middleware::request_id_header(), middleware::MakeRequestUuidOrHeader))
        .layer(from_fn(middleware::cors))
}

pub fn mgmt_router(state: MgmtState) -> Router {
    Router::new().route("/livez", get(health::livez)).route("/readyz", get(health::readyz)).with_state(state)
}
