use super::records::{OutboxRecord, PushPreferenceRecord};
use crate::domain::outbox::{OutboxEntry, OutboxStatus};
use crate::error::{AppError, Result};
use sqlx::PgConnection;
use std::collections::HashMap;
use time::OffsetDateTime;

#[derive(Clone, Debug, Default)]
pub struct OutboxRepository {}

impl OutboxRepository {
    #[must_use]
    pub const fn new() -> Self {
        Self {}
    }

    /// Loads pending rows, plus rows stuck in 'sending' since before `stale_before`, oldest first.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the query fails.
    #[tracing::instrument(level = "debug", skip(self, conn), err)]
    pub(crate) async fn load_due(
        &self,
        conn: &mut PgConnection,
        limit: i64,
        max_attempts: i32,
        stale_before: OffsetDateTime,
    ) -> Result<Vec<OutboxEntry>> {
        let records = sqlx::query_as::<_, OutboxRecord>(
            r"
            SELECT id::text AS id, user_id::text AS user_id, type AS kind, title, body, data, attempts
            FROM push_outbox
            WHERE attempts < $1
              AND (status = 'pending' OR (status = 'sending' AND sending_started_at < $2))
            ORDER BY created_at ASC
            LIMIT $3
            ",
        )
        .bind(max_attempts)
        .bind(stale_before)
        .bind(limit)
        .fetch_all(conn)
        .await
        .map_err(AppError::Database)?;

        Ok(records.into_iter().map(Into::into).collect())
    }

    /// Returns each user's global push opt-in; a NULL preference counts as opted out.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the query fails.
    #[tracing::instrument(level = "debug", skip(self, conn, user_ids), err)]
    pub(crate) async fn push_preferences(
        &self,
        conn: &mut PgConnection,
        user_ids: &[String],
    ) -> Result<HashMap<String, bool>> {
        let records = sqlx::query_as::<_, PushPreferenceRecord>(
            "SELECT id::text AS id, push_enabled FROM users WHERE id::text = ANY($1)",
        )
        .bind(user_ids)
        .fetch_all(conn)
        .await
        .map_err(AppError::Database)?;

        Ok(records.into_iter().map(|r| (r.id, r.push_enabled.unwrap_or(false))).collect())
    }

    /// Moves a row to 'sending' unless another drain owns it.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the update fails.
    #[tracing::instrument(level = "debug", skip(self, conn), err)]
    pub(crate) async fn claim(&self, conn: &mut PgConnection, id: &str, stale_before: OffsetDateTime) -> Result<bool> {
        let claimed = sqlx::query_scalar::<_, String>(
            r"
            UPDATE push_outbox
            SET status = 'sending', sending_started_at = now()
            WHERE id::text = $1
              AND (status = 'pending' OR (status = 'sending' AND sending_started_at < $2))
            RETURNING id::text
            ",
        )
        .bind(id)
        .bind(stale_before)
        .fetch_optional(conn)
        .await
        .map_err(AppError::Database)?;

        Ok(claimed.is_some())
    }

    /// Marks a row delivered; `note` is kept as `last_error` for skipped rows.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the update fails.
    #[tracing::instrument(level = "debug", skip(self, conn), err)]
    pub(crate) async fn mark_sent(&self, conn: &mut PgConnection, id: &str, note: Option<&str>) -> Result<()> {
        sqlx::query("UPDATE push_outbox SET status = 'sent', sent_at = now(), last_error = $2 WHERE id::text = $1")
            .bind(id)
            .bind(note)
            .execute(conn)
            .await
            .map_err(AppError::Database)?;

        Ok(())
    }

    /// Records a failed attempt.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the update fails.
    #[tracing::instrument(level = "debug", skip(self, conn, error), err)]
    pub(crate) async fn mark_attempt_failed(
        &self,
        conn: &mut PgConnection,
        id: &str,
        attempts: i32,
        status: OutboxStatus,
        error: &str,
    ) -> Result<()> {
        sqlx::query("UPDATE push_outbox SET status = $2, attempts = $3, last_error = $4 WHERE id::text = $1")
            .bind(id)
            .bind(status.as_str())
            .bind(attempts)
            .bind(error)
            .execute(conn)
            .await
            .map_err(AppError::Database)?;

        Ok(())
    }
}
