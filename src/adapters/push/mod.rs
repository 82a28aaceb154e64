pub mod apns;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PushError {
    #[error("{0}")]
    Transport(#[from] reqwest::Error),
    #[error("External service error: {0}")]
    Other(#[from] anyhow::Error),
}

/// What the push service answered for one device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

impl TransportResponse {
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }
}

/// A single device delivery as prepared by the notifier.
#[derive(Debug, Clone, Copy)]
pub struct DeviceRequest<'a> {
    pub device_token: &'a str,
    pub auth_token: &'a str,
    pub topic: &'a str,
}

#[async_trait]
pub trait PushTransport: Send + Sync + std::fmt::Debug {
    /// Posts a pre-serialized payload to one device.
    ///
    /// # Errors
    /// Returns `PushError` only when no HTTP response was received; error
    /// statuses are returned as a `TransportResponse`.
    async fn send(&self, request: DeviceRequest<'_>, payload: Bytes) -> Result<TransportResponse, PushError>;
}
