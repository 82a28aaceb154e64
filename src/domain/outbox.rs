use serde::Serialize;
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutboxStatus {
    Pending,
    Sending,
    Sent,
    Failed,
}

impl OutboxStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Sending => "sending",
            Self::Sent => "sent",
            Self::Failed => "failed",
        }
    }

    /// Status after a failed attempt: rows give up once they reach `max_attempts`.
    #[must_use]
    pub const fn after_failed_attempt(attempts: i32, max_attempts: i32) -> Self {
        if attempts >= max_attempts { Self::Failed } else { Self::Pending }
    }
}

/// A queued notification waiting to be pushed.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboxEntry {
    pub id: String,
    pub user_id: String,
    pub kind: String,
    pub title: String,
    pub body: String,
    pub data: Option<Value>,
    pub attempts: i32,
}

impl OutboxEntry {
    /// The entry's data bag; JSON-encoded strings are decoded, anything else is empty.
    #[must_use]
    pub fn data_bag(&self) -> Map<String, Value> {
        match &self.data {
            Some(Value::Object(map)) => map.clone(),
            Some(Value::String(raw)) => match serde_json::from_str::<Value>(raw) {
                Ok(Value::Object(map)) => map,
                _ => Map::new(),
            },
            _ => Map::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutboxResult {
    pub id: String,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skipped: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sent: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl OutboxResult {
    #[must_use]
    pub fn skipped(id: impl Into<String>) -> Self {
        Self { id: id.into(), ok: true, skipped: Some(true), sent: None, error: None }
    }

    #[must_use]
    pub fn sent(id: impl Into<String>, count: usize) -> Self {
        Self { id: id.into(), ok: true, skipped: None, sent: Some(count), error: None }
    }

    #[must_use]
    pub fn failed(id: impl Into<String>, error: impl Into<String>) -> Self {
        Self { id: id.into(), ok: false, skipped: None, sent: None, error: Some(error.into()) }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutboxReport {
    pub ok: bool,
    pub processed: usize,
    pub results: Vec<OutboxResult>,
}
