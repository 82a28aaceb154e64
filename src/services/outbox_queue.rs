use crate::adapters::database::DbPool;
use crate::adapters::database::outbox_repo::OutboxRepository;
use crate::domain::outbox::{OutboxEntry, OutboxStatus};
use crate::error::Result;
use crate::services::store::OutboxStore;
use async_trait::async_trait;
use std::collections::HashMap;
use time::OffsetDateTime;

#[derive(Clone, Debug)]
pub struct OutboxQueue {
    pool: DbPool,
    repo: OutboxRepository,
}

impl OutboxQueue {
    #[must_use]
    pub const fn new(pool: DbPool, repo: OutboxRepository) -> Self {
        Self { pool, repo }
    }
}

#[async_trait]
impl OutboxStore for OutboxQueue {
    async fn load_due(&self, limit: i64, max_attempts: i32, stale_before: OffsetDateTime) -> Result<Vec<OutboxEntry>> {
        let mut conn = self.pool.acquire().await?;
        self.repo.load_due(&mut conn, limit, max_attempts, stale_before).await
    }

    async fn push_preferences(&self, user_ids: &[String]) -> Result<HashMap<String, bool>> {
        if user_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let mut conn = self.pool.acquire().await?;
        self.repo.push_preferences(&mut conn, user_ids).await
    }

    async fn claim(&self, id: &str, stale_before: OffsetDateTime) -> Result<bool> {
        let mut conn = self.pool.acquire().await?;
        self.repo.claim(&mut conn, id, stale_before).await
    }

    async fn mark_sent(&self, id: &str) -> Result<()> {
        let mut conn = self.pool.acquire().await?;
        self.repo.mark_sent(&mut conn, id, None).await
    }

    async fn mark_skipped(&self, id: &str, reason: &str) -> Result<()> {
        let mut conn = self.pool.acquire().await?;
        self.repo.mark_sent(&mut conn, id, Some(reason)).await
    }

    async fn mark_attempt_failed(&self, id: &str, attempts: i32, status: OutboxStatus, error: &str) -> Result<()> {
        let mut conn = self.pool.acquire().await?;
        self.repo.mark_attempt_failed(&mut conn, id, attempts, status, error).await
    }
}
