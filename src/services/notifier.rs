use crate::adapters::push::apns::cache::AuthTokenCache;
use crate::adapters::push::{DeviceRequest, PushTransport};
use crate::config::ApnsConfig;
use crate::domain::credential::SigningCredential;
use crate::domain::notification::{
    DeliveryReport, DeliveryResult, InvalidTokenReason, NotificationPayload, TokenCleanupPolicy,
};
use crate::error::{AppError, Result};
use crate::services::store::DeviceTokenStore;
use bytes::Bytes;
use futures::stream::{self, StreamExt};
use opentelemetry::{KeyValue, global, metrics::Counter};
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone, Debug)]
struct Metrics {
    sent: Counter<u64>,
    errors: Counter<u64>,
    invalidated_tokens: Counter<u64>,
}

impl Metrics {
    fn new() -> Self {
        let meter = global::meter("movee-push");
        Self {
            sent: meter
                .u64_counter("push_sent_total")
                .with_description("Total number of push notifications accepted by APNs")
                .build(),
            errors: meter
                .u64_counter("push_errors_total")
                .with_description("Total number of push notification delivery errors")
                .build(),
            invalidated_tokens: meter
                .u64_counter("push_invalidated_tokens_total")
                .with_description("Total number of push tokens removed after APNs rejected them permanently")
                .build(),
        }
    }
}

/// Signs one provider token per invocation and fans a payload out to many devices.
#[derive(Debug)]
pub struct ApnsNotifier {
    transport: Arc<dyn PushTransport>,
    token_store: Arc<dyn DeviceTokenStore>,
    auth_tokens: AuthTokenCache,
    max_concurrency: usize,
    metrics: Metrics,
}

impl ApnsNotifier {
    pub fn new(transport: Arc<dyn PushTransport>, token_store: Arc<dyn DeviceTokenStore>, config: &ApnsConfig) -> Self {
        Self {
            transport,
            token_store,
            auth_tokens: AuthTokenCache::new(Duration::from_secs(config.token_ttl_secs)),
            max_concurrency: config.max_concurrency.max(1),
            metrics: Metrics::new(),
        }
    }

    /// Delivers `payload` to every device token.
    ///
    /// Nothing is signed when `device_tokens` is empty. Otherwise the provider
    /// token is resolved before the first request and shared by all of them.
    ///
    /// # Errors
    /// Returns `AppError::Signing` if no provider token can be produced; no
    /// request is sent in that case. Per-device failures never error.
    #[tracing::instrument(level = "debug", skip_all, fields(devices = device_tokens.len()))]
    pub async fn notify(
        &self,
        credential: &SigningCredential,
        device_tokens: &[String],
        payload: &NotificationPayload,
        policy: TokenCleanupPolicy,
    ) -> Result<DeliveryReport> {
        if device_tokens.is_empty() {
            return Ok(DeliveryReport::empty());
        }

        let auth_token = self.auth_token(credential)?;
        let body = encode_payload(payload)?;

        Ok(self.deliver(&auth_token, credential.bundle_id(), device_tokens, body, policy).await)
    }

    /// Provider token for `credential`, reused while the cache window allows.
    ///
    /// # Errors
    /// Returns `AppError::Signing` if the key cannot be imported or used.
    pub fn auth_token(&self, credential: &SigningCredential) -> Result<String> {
        Ok(self.auth_tokens.get_or_sign(credential)?)
    }

    /// Sends the pre-serialized `payload` to each device with bounded concurrency.
    ///
    /// Results keep the order of `device_tokens`.
    pub async fn deliver(
        &self,
        auth_token: &str,
        topic: &str,
        device_tokens: &[String],
        payload: Bytes,
        policy: TokenCleanupPolicy,
    ) -> DeliveryReport {
        let deliveries: Vec<_> = device_tokens
            .iter()
            .map(|device_token| {
                let request = DeviceRequest { device_token, auth_token, topic };
                self.deliver_one(request, payload.clone(), policy)
            })
            .collect();
        let results: Vec<DeliveryResult> = stream::iter(deliveries).buffered(self.max_concurrency).collect().await;

        let report = DeliveryReport::from_results(results);
        tracing::info!(devices = device_tokens.len(), sent = report.sent, "APNs batch finished");
        report
    }

    #[tracing::instrument(level = "debug", skip_all, fields(token = %token_prefix(request.device_token)))]
    async fn deliver_one(&self, request: DeviceRequest<'_>, payload: Bytes, policy: TokenCleanupPolicy) -> DeliveryResult {
        let token = request.device_token;

        match self.transport.send(request, payload).await {
            Ok(response) if response.is_success() => {
                self.metrics.sent.add(1, &[]);
                tracing::debug!(status = response.status, "APNs send OK");
                DeliveryResult { token: token.to_string(), ok: true, status: response.status, body: response.body }
            }
            Ok(response) => {
                self.metrics.errors.add(1, &[KeyValue::new("reason", "rejected")]);
                tracing::warn!(status = response.status, body = %response.body, "APNs send rejected");
                self.remove_if_invalid(token, &response.body, policy).await;
                DeliveryResult { token: token.to_string(), ok: false, status: response.status, body: response.body }
            }
            Err(e) => {
                self.metrics.errors.add(1, &[KeyValue::new("reason", "transport")]);
                tracing::warn!(error = %e, "APNs request failed (transport error)");
                DeliveryResult::transport_failure(token, e)
            }
        }
    }

    async fn remove_if_invalid(&self, token: &str, body: &str, policy: TokenCleanupPolicy) {
        let Some(reason) = InvalidTokenReason::from_response_body(body) else {
            return;
        };
        if !policy.should_delete(reason) {
            tracing::debug!(reason = reason.as_str(), "Keeping token despite permanent failure");
            return;
        }

        match self.token_store.delete_token(token).await {
            Ok(()) => {
                self.metrics.invalidated_tokens.add(1, &[KeyValue::new("reason", reason.as_str())]);
                tracing::info!(reason = reason.as_str(), "Removed invalid push token");
            }
            Err(e) => tracing::warn!(error = %e, "Failed to remove invalid push token"),
        }
    }
}

/// Serializes a payload once so every delivery of a batch shares the same bytes.
///
/// # Errors
/// Returns `AppError::Internal` if the payload cannot be encoded.
pub fn encode_payload(payload: &NotificationPayload) -> Result<Bytes> {
    serde_json::to_vec(payload).map(Bytes::from).map_err(|e| {
        tracing::error!(error = %e, "Failed to serialize notification payload");
        AppError::Internal
    })
}

/// Device tokens are only ever logged by prefix.
#[must_use]
pub fn token_prefix(token: &str) -> &str {
    token.get(..8).unwrap_or(token)
}
