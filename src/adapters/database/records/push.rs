use crate::domain::notification::DeviceToken;
use crate::domain::outbox::OutboxEntry;
use serde_json::Value;

#[derive(Debug, sqlx::FromRow)]
pub struct DeviceTokenRecord {
    pub(crate) user_id: String,
    pub(crate) token: String,
}

impl From<DeviceTokenRecord> for DeviceToken {
    fn from(record: DeviceTokenRecord) -> Self {
        Self { user_id: record.user_id, token: record.token.trim().to_string() }
    }
}

#[derive(Debug, sqlx::FromRow)]
pub struct OutboxRecord {
    pub(crate) id: String,
    pub(crate) user_id: String,
    pub(crate) kind: String,
    pub(crate) title: String,
    pub(crate) body: String,
    pub(crate) data: Option<Value>,
    pub(crate) attempts: i32,
}

impl From<OutboxRecord> for OutboxEntry {
    fn from(record: OutboxRecord) -> Self {
        Self {
            id: record.id,
            user_id: record.user_id,
            kind: record.kind,
            title: record.title,
            body: record.body,
            data: record.data,
            attempts: record.attempts,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
pub struct PushPreferenceRecord {
    pub(crate) id: String,
    pub(crate) push_enabled: Option<bool>,
}
