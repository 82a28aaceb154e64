use crate::adapters::database::DbPool;
use opentelemetry::{KeyValue, global, metrics::Gauge};
use std::time::Duration;
use tokio::time::timeout;

#[derive(Clone, Debug)]
pub struct Metrics {
    pub status: Gauge<i64>,
}

impl Metrics {
    #[must_use]
    pub(crate) fn new() -> Self {
        let meter = global::meter("movee-push");
        Self {
            status: meter
                .i64_gauge("movee_health_status")
                .with_description("Status of health checks (1 for ok, 0 for error)")
                .build(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct HealthService {
    pool: Option<DbPool>,
    db_timeout: Duration,
    metrics: Metrics,
}

impl HealthService {
    #[must_use]
    pub fn new(pool: Option<DbPool>, db_timeout_ms: u64) -> Self {
        Self { pool, db_timeout: Duration::from_millis(db_timeout_ms), metrics: Metrics::new() }
    }

    /// Checks connectivity to the device-token store.
    ///
    /// # Errors
    /// Returns a string describing the failure if the database is unconfigured or unreachable.
    pub async fn check_db(&self) -> Result<(), String> {
        let outcome = match &self.pool {
            None => Err("Database not configured".to_string()),
            Some(pool) => match timeout(self.db_timeout, sqlx::query("SELECT 1").execute(pool)).await {
                Ok(Ok(_)) => Ok(()),
                Ok(Err(e)) => Err(format!("Database connection failed: {e}")),
                Err(_) => Err("Database connection timed out".to_string()),
            },
        };

        self.metrics.status.record(i64::from(outcome.is_ok()), &[KeyValue::new("component", "database")]);
        outcome
    }
}
