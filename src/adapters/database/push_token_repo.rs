use super::records::DeviceTokenRecord;
use crate::domain::notification::{DeviceToken, Platform};
use crate::error::{AppError, Result};
use sqlx::PgConnection;

#[derive(Clone, Debug, Default)]
pub struct PushTokenRepository {}

impl PushTokenRepository {
    #[must_use]
    pub const fn new() -> Self {
        Self {}
    }

    /// Finds the non-blank tokens registered by any of `user_ids` on `platform`.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the query fails.
    #[tracing::instrument(level = "debug", skip(self, conn, user_ids), fields(users = user_ids.len()), err)]
    pub(crate) async fn find_tokens_for_users(
        &self,
        conn: &mut PgConnection,
        user_ids: &[String],
        platform: Platform,
    ) -> Result<Vec<DeviceToken>> {
        let records = sqlx::query_as::<_, DeviceTokenRecord>(
            r"
            SELECT user_id::text AS user_id, token
            FROM device_push_tokens
            WHERE user_id::text = ANY($1)
              AND platform = $2
              AND btrim(coalesce(token, '')) <> ''
            ",
        )
        .bind(user_ids)
        .bind(platform.as_str())
        .fetch_all(conn)
        .await
        .map_err(AppError::Database)?;

        Ok(records.into_iter().map(Into::into).collect())
    }

    /// Deletes the row holding `token`, e.g. after APNs reported it unregistered.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the deletion fails.
    #[tracing::instrument(level = "debug", skip(self, conn, token), err)]
    pub(crate) async fn delete_token(&self, conn: &mut PgConnection, token: &str) -> Result<u64> {
        let result = sqlx::query("DELETE FROM device_push_tokens WHERE token = $1")
            .bind(token)
            .execute(conn)
            .await
            .map_err(AppError::Database)?;

        Ok(result.rows_affected())
    }
}
