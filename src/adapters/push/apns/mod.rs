//! Apple Push Notification service: provider tokens and the HTTP/2 device endpoint.

pub mod cache;
pub mod der;
pub mod token;

use super::{DeviceRequest, PushError, PushTransport, TransportResponse};
use crate::config::ApnsConfig;
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::CONTENT_TYPE;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ApnsClient {
    http: reqwest::Client,
    base_url: String,
}

impl ApnsClient {
    /// Builds the HTTP client for the configured APNs host.
    ///
    /// # Errors
    /// Returns `reqwest::Error` if the TLS backend cannot be initialised.
    pub fn new(config: &ApnsConfig) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().timeout(Duration::from_secs(config.request_timeout_secs)).build()?;
        Ok(Self::with_client(http, config.base_url()))
    }

    #[must_use]
    pub fn with_client(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self { http, base_url: base_url.into() }
    }

    #[must_use]
    pub fn device_url(&self, device_token: &str) -> String {
        format!("{}/3/device/{}", self.base_url, device_token)
    }
}

#[async_trait]
impl PushTransport for ApnsClient {
    async fn send(&self, request: DeviceRequest<'_>, payload: Bytes) -> Result<TransportResponse, PushError> {
        let response = self
            .http
            .post(self.device_url(request.device_token))
            .header("authorization", format!("bearer {}", request.auth_token))
            .header("apns-topic", request.topic)
            .header("apns-push-type", "alert")
            .header("apns-priority", "10")
            .header(CONTENT_TYPE, "application/json")
            .body(payload)
            .send()
            .await?;

        let status = response.status().as_u16();
        // APNs explains failures in a JSON body, so it is read for every status.
        let body = response.text().await?;
        Ok(TransportResponse { status, body })
    }
}
