use crate::config::{ApnsConfig, OutboxConfig};
use crate::domain::credential::SigningCredential;
use crate::domain::notification::{
    DeliveryReport, NotificationPayload, PayloadDefaults, Platform, TokenCleanupPolicy,
};
use crate::domain::outbox::{OutboxEntry, OutboxReport, OutboxResult, OutboxStatus};
use crate::error::{AppError, Result};
use crate::services::notifier::{ApnsNotifier, encode_payload};
use crate::services::store::{DeviceTokenStore, OutboxStore};
use opentelemetry::{KeyValue, global, metrics::Counter};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use time::{Duration, OffsetDateTime};

pub const SKIPPED_OPT_OUT: &str = "Skipped: push notifications disabled by user";
pub const NO_DEVICE_TOKEN: &str = "No push token registered for user";

/// Failures quoted in a row's `last_error`.
const MAX_QUOTED_FAILURES: usize = 2;

#[derive(Clone, Debug)]
struct Metrics {
    rows: Counter<u64>,
}

impl Metrics {
    fn new() -> Self {
        let meter = global::meter("movee-push");
        Self {
            rows: meter
                .u64_counter("push_outbox_rows_total")
                .with_description("Outbox rows handled by a drain, by outcome")
                .build(),
        }
    }

    fn record(&self, outcome: &'static str) {
        self.rows.add(1, &[KeyValue::new("outcome", outcome)]);
    }
}

#[derive(Serialize)]
struct QuotedFailure<'a> {
    status: u16,
    body: &'a str,
}

/// Drains the notification outbox written by other components.
#[derive(Clone, Debug)]
pub struct OutboxService {
    config: OutboxConfig,
    apns_host: String,
    defaults: PayloadDefaults,
    outbox: Arc<dyn OutboxStore>,
    token_store: Arc<dyn DeviceTokenStore>,
    notifier: Arc<ApnsNotifier>,
    metrics: Metrics,
}

impl OutboxService {
    #[must_use]
    pub fn new(
        config: OutboxConfig,
        apns: &ApnsConfig,
        outbox: Arc<dyn OutboxStore>,
        token_store: Arc<dyn DeviceTokenStore>,
        notifier: Arc<ApnsNotifier>,
    ) -> Self {
        Self {
            config,
            apns_host: apns.host.trim().to_string(),
            defaults: apns.payload_defaults(),
            outbox,
            token_store,
            notifier,
            metrics: Metrics::new(),
        }
    }

    /// Checks the scheduler's shared secret, when one is configured.
    ///
    /// # Errors
    /// Returns `AppError::Unauthorized` if the supplied secret is missing or differs.
    pub fn authorize(&self, supplied: Option<&str>) -> Result<()> {
        let Some(expected) = self.config.cron_secret.as_deref().map(str::trim).filter(|s| !s.is_empty()) else {
            return Ok(());
        };

        match supplied.map(str::trim) {
            Some(secret) if !secret.is_empty() && secret == expected => Ok(()),
            _ => Err(AppError::Unauthorized),
        }
    }

    /// Processes one batch of due rows, sequentially and oldest first.
    ///
    /// # Errors
    /// Returns `AppError::Upstream` if the batch, its tokens or preferences cannot be loaded.
    /// Returns `AppError::Signing` if the provider token cannot be created.
    #[tracing::instrument(err(level = "warn"), skip_all)]
    pub async fn drain(&self, credential: &SigningCredential) -> Result<OutboxReport> {
        let stale_before = OffsetDateTime::now_utc() - Duration::seconds(self.config.sending_timeout_secs);

        let rows = self
            .outbox
            .load_due(self.config.batch, self.config.max_attempts, stale_before)
            .await
            .map_err(|e| e.context("Failed to load push_outbox"))?;

        if rows.is_empty() {
            return Ok(OutboxReport { ok: true, processed: 0, results: Vec::new() });
        }

        let mut owners: Vec<String> = rows.iter().map(|r| r.user_id.clone()).collect();
        owners.sort_unstable();
        owners.dedup();

        let mut tokens_by_user: HashMap<String, Vec<String>> = HashMap::new();
        for device in self
            .token_store
            .find_tokens(&owners, Platform::Ios)
            .await
            .map_err(|e| e.context("Failed to load tokens"))?
        {
            tokens_by_user.entry(device.user_id).or_default().push(device.token);
        }

        let push_enabled = self
            .outbox
            .push_preferences(&owners)
            .await
            .map_err(|e| e.context("Failed to load user preferences"))?;

        let auth_token = self.notifier.auth_token(credential)?;

        tracing::info!(rows = rows.len(), users = owners.len(), "Draining push outbox");

        let mut results = Vec::with_capacity(rows.len());
        for row in &rows {
            let devices = tokens_by_user.get(&row.user_id).map(Vec::as_slice).unwrap_or_default();
            let opted_out = push_enabled.get(&row.user_id) == Some(&false);

            if let Some(result) = self.process(row, devices, opted_out, credential, &auth_token, stale_before).await {
                results.push(result);
            }
        }

        Ok(OutboxReport { ok: true, processed: rows.len(), results })
    }

    #[tracing::instrument(level = "debug", skip_all, fields(outbox_id = %row.id))]
    async fn process(
        &self,
        row: &OutboxEntry,
        devices: &[String],
        opted_out: bool,
        credential: &SigningCredential,
        auth_token: &str,
        stale_before: OffsetDateTime,
    ) -> Option<OutboxResult> {
        if opted_out {
            if let Err(e) = self.outbox.mark_skipped(&row.id, SKIPPED_OPT_OUT).await {
                tracing::warn!(error = %e, "Failed to mark opted-out outbox row");
            }
            self.metrics.record("skipped");
            return Some(OutboxResult::skipped(&row.id));
        }

        match self.outbox.claim(&row.id, stale_before).await {
            Ok(true) => {}
            Ok(false) => {
                tracing::debug!("Outbox row already claimed elsewhere");
                return None;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to claim outbox row");
                return None;
            }
        }

        if devices.is_empty() {
            self.record_failure(row, OutboxStatus::Failed, NO_DEVICE_TOKEN).await;
            self.metrics.record("no_device");
            return Some(OutboxResult::failed(&row.id, NO_DEVICE_TOKEN));
        }

        let payload = NotificationPayload::alert(&self.defaults, &row.title, &row.body, Some(row.kind.as_str()), row.data_bag());
        let report = match encode_payload(&payload) {
            Ok(body) => {
                self.notifier
                    .deliver(auth_token, credential.bundle_id(), devices, body, TokenCleanupPolicy::UnregisteredOnly)
                    .await
            }
            Err(e) => {
                let error = e.to_string();
                let status = OutboxStatus::after_failed_attempt(row.attempts + 1, self.config.max_attempts);
                self.record_failure(row, status, &error).await;
                self.metrics.record("failed");
                return Some(OutboxResult::failed(&row.id, error));
            }
        };

        if report.sent > 0 {
            if let Err(e) = self.outbox.mark_sent(&row.id).await {
                tracing::warn!(error = %e, "Failed to mark outbox row sent");
            }
            self.metrics.record("sent");
            return Some(OutboxResult::sent(&row.id, report.sent));
        }

        let error = self.failure_message(credential, &report);
        let status = OutboxStatus::after_failed_attempt(row.attempts + 1, self.config.max_attempts);
        self.record_failure(row, status, &error).await;
        self.metrics.record("failed");
        Some(OutboxResult::failed(&row.id, error))
    }

    async fn record_failure(&self, row: &OutboxEntry, status: OutboxStatus, error: &str) {
        if let Err(e) = self.outbox.mark_attempt_failed(&row.id, row.attempts + 1, status, error).await {
            tracing::warn!(error = %e, "Failed to record outbox attempt");
        }
    }

    fn failure_message(&self, credential: &SigningCredential, report: &DeliveryReport) -> String {
        let quoted: Vec<QuotedFailure<'_>> = report
            .results
            .iter()
            .filter(|r| !r.ok)
            .take(MAX_QUOTED_FAILURES)
            .map(|r| QuotedFailure { status: r.status, body: &r.body })
            .collect();
        let quoted = serde_json::to_string(&quoted).unwrap_or_else(|_| "[]".to_string());

        format!("Push send failed: iOS (host={}, topic={}): {quoted}", self.apns_host, credential.bundle_id())
    }
}
