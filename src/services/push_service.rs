use crate::config::ApnsConfig;
use crate::domain::credential::SigningCredential;
use crate::domain::notification::{
    DeliveryReport, NotificationPayload, PayloadDefaults, Platform, SendPushCommand, TokenCleanupPolicy,
};
use crate::error::{AppError, Result};
use crate::services::notifier::ApnsNotifier;
use crate::services::store::DeviceTokenStore;
use std::sync::Arc;

/// Direct sends: resolve users to iOS devices and deliver one alert to all of them.
#[derive(Clone, Debug)]
pub struct PushService {
    config: ApnsConfig,
    defaults: PayloadDefaults,
    notifier: Arc<ApnsNotifier>,
    token_store: Arc<dyn DeviceTokenStore>,
}

impl PushService {
    #[must_use]
    pub fn new(config: ApnsConfig, notifier: Arc<ApnsNotifier>, token_store: Arc<dyn DeviceTokenStore>) -> Self {
        let defaults = config.payload_defaults();
        Self { config, defaults, notifier, token_store }
    }

    /// # Errors
    /// Returns `AppError::MissingConfig` naming every absent signing variable.
    pub fn credential(&self) -> Result<SigningCredential> {
        self.config.credential().map_err(AppError::MissingConfig)
    }

    /// Delivers `command` to every registered iOS device of its users.
    ///
    /// # Errors
    /// Returns `AppError::Upstream` if the token store fails.
    /// Returns `AppError::Signing` if the provider token cannot be created.
    #[tracing::instrument(err(level = "warn"), skip_all, fields(users = command.user_ids.len()))]
    pub async fn send(&self, credential: &SigningCredential, command: SendPushCommand) -> Result<DeliveryReport> {
        if command.user_ids.is_empty() {
            tracing::debug!("No target users, nothing to send");
            return Ok(DeliveryReport::empty());
        }

        let device_tokens: Vec<String> = self
            .token_store
            .find_tokens(&command.user_ids, Platform::Ios)
            .await
            .map_err(|e| e.context("Failed to load tokens"))?
            .into_iter()
            .map(|t| t.token)
            .collect();

        tracing::info!(tokens = device_tokens.len(), "Resolved iOS device tokens");

        let payload =
            NotificationPayload::alert(&self.defaults, command.title, command.body, command.kind.as_deref(), command.data);

        self.notifier.notify(credential, &device_tokens, &payload, TokenCleanupPolicy::BadOrUnregistered).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::push::{DeviceRequest, PushError, PushTransport, TransportResponse};
    use crate::config::Config;
    use crate::domain::notification::DeviceToken;
    use async_trait::async_trait;
    use bytes::Bytes;
    use clap::Parser;
    use serde_json::{Map, Value};
    use std::sync::Mutex;

    const TEST_KEY: &str = include_str!("../../tests/fixtures/apns_test_key.p8");

    #[derive(Debug, Default)]
    struct CapturingTransport {
        payloads: Mutex<Vec<(String, Value)>>,
    }

    #[async_trait]
    impl PushTransport for CapturingTransport {
        async fn send(&self, request: DeviceRequest<'_>, payload: Bytes) -> std::result::Result<TransportResponse, PushError> {
            let body: Value = serde_json::from_slice(&payload).unwrap();
            self.payloads.lock().unwrap().push((request.device_token.to_string(), body));
            Ok(TransportResponse { status: 200, body: String::new() })
        }
    }

    #[derive(Debug, Default)]
    struct FixedStore {
        tokens: Vec<DeviceToken>,
        fail: bool,
        lookups: Mutex<usize>,
    }

    #[async_trait]
    impl DeviceTokenStore for FixedStore {
        async fn find_tokens(&self, user_ids: &[String], _platform: Platform) -> Result<Vec<DeviceToken>> {
            *self.lookups.lock().unwrap() += 1;
            if self.fail {
                return Err(AppError::Database(sqlx::Error::PoolTimedOut));
            }
            Ok(self.tokens.iter().filter(|t| user_ids.contains(&t.user_id)).cloned().collect())
        }

        async fn delete_token(&self, _token: &str) -> Result<()> {
            Ok(())
        }
    }

    fn service(store: Arc<FixedStore>, transport: Arc<CapturingTransport>) -> PushService {
        let config = Config::parse_from([
            "movee-push",
            "--database-url",
            "postgres://localhost/movee",
            "--apns-team-id",
            "TEAM",
            "--apns-key-id",
            "KEY",
            "--apns-private-key",
            TEST_KEY,
            "--apns-bundle-id",
            "app.movee.ios",
        ]);
        let notifier = Arc::new(ApnsNotifier::new(transport, store.clone(), &config.apns));
        PushService::new(config.apns, notifier, store)
    }

    fn command(user_ids: &[&str]) -> SendPushCommand {
        let mut data = Map::new();
        let _ = data.insert("challenge_id".into(), Value::from("c-9"));
        SendPushCommand {
            user_ids: user_ids.iter().map(|u| (*u).to_string()).collect(),
            title: "MOVEE".into(),
            body: "Challenge started".into(),
            kind: Some("challenge_started".into()),
            data,
        }
    }

    fn token(user_id: &str, token: &str) -> DeviceToken {
        DeviceToken { user_id: user_id.into(), token: token.into() }
    }

    #[tokio::test]
    async fn test_send_delivers_to_every_device_of_the_users() {
        let store = Arc::new(FixedStore {
            tokens: vec![token("u1", "t1"), token("u1", "t2"), token("u2", "t3"), token("u3", "t4")],
            ..FixedStore::default()
        });
        let transport = Arc::new(CapturingTransport::default());
        let service = service(store, Arc::clone(&transport));
        let credential = service.credential().unwrap();

        let report = service.send(&credential, command(&["u1", "u2"])).await.unwrap();

        assert_eq!(report.sent, 3);
        let payloads = transport.payloads.lock().unwrap();
        let devices: Vec<&str> = payloads.iter().map(|(t, _)| t.as_str()).collect();
        assert_eq!(devices, vec!["t1", "t2", "t3"]);
        assert_eq!(payloads[0].1["data"]["type"], "challenge_started");
        assert_eq!(payloads[0].1["data"]["challenge_id"], "c-9");
        assert_eq!(payloads[0].1["aps"]["alert"]["body"], "Challenge started");
    }

    #[tokio::test]
    async fn test_empty_targets_skip_the_store() {
        let store = Arc::new(FixedStore::default());
        let service = service(Arc::clone(&store), Arc::new(CapturingTransport::default()));
        let credential = service.credential().unwrap();

        let report = service.send(&credential, command(&[])).await.unwrap();

        assert_eq!(report, DeliveryReport::empty());
        assert_eq!(*store.lookups.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_store_failure_is_reported_as_token_load_failure() {
        let store = Arc::new(FixedStore { fail: true, ..FixedStore::default() });
        let service = service(store, Arc::new(CapturingTransport::default()));
        let credential = service.credential().unwrap();

        let err = service.send(&credential, command(&["u1"])).await.unwrap_err();

        assert!(matches!(err, AppError::Upstream { message: "Failed to load tokens", .. }));
    }

    #[tokio::test]
    async fn test_users_without_devices_yield_empty_report() {
        let store = Arc::new(FixedStore { tokens: vec![token("other", "t9")], ..FixedStore::default() });
        let transport = Arc::new(CapturingTransport::default());
        let service = service(store, Arc::clone(&transport));
        let credential = service.credential().unwrap();

        let report = service.send(&credential, command(&["u1"])).await.unwrap();

        assert_eq!(report, DeliveryReport::empty());
        assert!(transport.payloads.lock().unwrap().is_empty());
    }
}
