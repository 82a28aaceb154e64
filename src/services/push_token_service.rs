use crate::adapters::database::DbPool;
use crate::adapters::database::push_token_repo::PushTokenRepository;
use crate::domain::notification::{DeviceToken, Platform};
use crate::error::Result;
use crate::services::store::DeviceTokenStore;
use async_trait::async_trait;

#[derive(Clone, Debug)]
pub struct PushTokenService {
    pool: DbPool,
    repo: PushTokenRepository,
}

impl PushTokenService {
    #[must_use]
    pub const fn new(pool: DbPool, repo: PushTokenRepository) -> Self {
        Self { pool, repo }
    }
}

#[async_trait]
impl DeviceTokenStore for PushTokenService {
    async fn find_tokens(&self, user_ids: &[String], platform: Platform) -> Result<Vec<DeviceToken>> {
        if user_ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut conn = self.pool.acquire().await?;
        self.repo.find_tokens_for_users(&mut conn, user_ids, platform).await
    }

    async fn delete_token(&self, token: &str) -> Result<()> {
        let mut conn = self.pool.acquire().await?;
        let deleted = self.repo.delete_token(&mut conn, token).await?;
        tracing::debug!(deleted, "Deleted invalid push token");
        Ok(())
    }
}
