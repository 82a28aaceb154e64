use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt;

pub const DEFAULT_TITLE: &str = "MOVEE";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Ios,
    Android,
}

impl Platform {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ios => "ios",
            Self::Android => "android",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A registered device, as stored in the external token table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceToken {
    pub user_id: String,
    pub token: String,
}

/// Static parts of every alert, taken from configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayloadDefaults {
    pub sound: String,
    pub badge: u32,
    pub thread_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub title: String,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Aps {
    pub alert: Alert,
    pub sound: String,
    pub badge: u32,
    #[serde(rename = "mutable-content", serialize_with = "serialize_flag", deserialize_with = "deserialize_flag")]
    pub mutable_content: bool,
    #[serde(rename = "thread-id")]
    pub thread_id: String,
}

/// The JSON document posted to every device of a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationPayload {
    pub aps: Aps,
    pub data: Map<String, Value>,
}

impl NotificationPayload {
    /// Builds an alert payload; a non-empty routing `kind` is merged into `data` last.
    #[must_use]
    pub fn alert(
        defaults: &PayloadDefaults,
        title: impl Into<String>,
        body: impl Into<String>,
        kind: Option<&str>,
        mut data: Map<String, Value>,
    ) -> Self {
        if let Some(kind) = kind.map(str::trim).filter(|k| !k.is_empty()) {
            let _ = data.insert("type".to_string(), Value::String(kind.to_string()));
        }

        Self {
            aps: Aps {
                alert: Alert { title: title.into(), body: body.into() },
                sound: defaults.sound.clone(),
                badge: defaults.badge,
                mutable_content: true,
                thread_id: defaults.thread_id.clone(),
            },
            data,
        }
    }
}

fn serialize_flag<S: Serializer>(flag: &bool, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u8(u8::from(*flag))
}

fn deserialize_flag<'de, D: serde::Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    Ok(u8::deserialize(deserializer)? != 0)
}

/// A validated request to notify a set of users.
#[derive(Debug, Clone, PartialEq)]
pub struct SendPushCommand {
    pub user_ids: Vec<String>,
    pub title: String,
    pub body: String,
    pub kind: Option<String>,
    pub data: Map<String, Value>,
}

/// Outcome of one device delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryResult {
    pub token: String,
    pub ok: bool,
    /// HTTP status, or 0 when the request never produced a response.
    pub status: u16,
    pub body: String,
}

impl DeliveryResult {
    #[must_use]
    pub fn transport_failure(token: impl Into<String>, error: impl fmt::Display) -> Self {
        Self { token: token.into(), ok: false, status: 0, body: error.to_string() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryReport {
    pub ok: bool,
    pub sent: usize,
    pub results: Vec<DeliveryResult>,
}

impl DeliveryReport {
    #[must_use]
    pub const fn empty() -> Self {
        Self { ok: true, sent: 0, results: Vec::new() }
    }

    #[must_use]
    pub fn from_results(results: Vec<DeliveryResult>) -> Self {
        let sent = results.iter().filter(|r| r.ok).count();
        Self { ok: true, sent, results }
    }
}

/// The `reason` values APNs reports for a token that will never work again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidTokenReason {
    BadDeviceToken,
    Unregistered,
}

impl InvalidTokenReason {
    /// Extracts a permanent-failure reason from an APNs error body.
    ///
    /// Bodies that are not JSON, or carry any other reason, yield `None`.
    #[must_use]
    pub fn from_response_body(body: &str) -> Option<Self> {
        let parsed: Value = serde_json::from_str(body).ok()?;
        match parsed.get("reason")?.as_str()? {
            "BadDeviceToken" => Some(Self::BadDeviceToken),
            "Unregistered" => Some(Self::Unregistered),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::BadDeviceToken => "BadDeviceToken",
            Self::Unregistered => "Unregistered",
        }
    }
}

/// Which permanent failures cause the token row to be deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenCleanupPolicy {
    BadOrUnregistered,
    /// `BadDeviceToken` often means a sandbox token hit the production host.
    UnregisteredOnly,
}

impl TokenCleanupPolicy {
    #[must_use]
    pub const fn should_delete(self, reason: InvalidTokenReason) -> bool {
        match self {
            Self::BadOrUnregistered => true,
            Self::UnregisteredOnly => matches!(reason, InvalidTokenReason::Unregistered),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn defaults() -> PayloadDefaults {
        PayloadDefaults { sound: "default".into(), badge: 1, thread_id: "movee-notifications".into() }
    }

    #[test]
    fn test_payload_wire_shape() {
        let mut data = Map::new();
        let _ = data.insert("challenge_id".into(), json!("c1"));
        let payload = NotificationPayload::alert(&defaults(), "MOVEE", "Keep walking", Some("challenge_started"), data);

        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(
            value,
            json!({
                "aps": {
                    "alert": { "title": "MOVEE", "body": "Keep walking" },
                    "sound": "default",
                    "badge": 1,
                    "mutable-content": 1,
                    "thread-id": "movee-notifications",
                },
                "data": { "challenge_id": "c1", "type": "challenge_started" },
            })
        );
    }

    #[test]
    fn test_type_overrides_data_entry() {
        let mut data = Map::new();
        let _ = data.insert("type".into(), json!("from_data"));
        let payload = NotificationPayload::alert(&defaults(), "T", "B", Some(" explicit "), data);
        assert_eq!(payload.data["type"], "explicit");
    }

    #[test]
    fn test_blank_type_is_not_merged() {
        let payload = NotificationPayload::alert(&defaults(), "T", "B", Some("  "), Map::new());
        assert!(payload.data.is_empty());
    }

    #[test]
    fn test_reason_parsing() {
        assert_eq!(
            InvalidTokenReason::from_response_body(r#"{"reason":"BadDeviceToken"}"#),
            Some(InvalidTokenReason::BadDeviceToken)
        );
        assert_eq!(
            InvalidTokenReason::from_response_body(r#"{"reason":"Unregistered","timestamp":1}"#),
            Some(InvalidTokenReason::Unregistered)
        );
        assert_eq!(InvalidTokenReason::from_response_body(r#"{"reason":"TooManyRequests"}"#), None);
        assert_eq!(InvalidTokenReason::from_response_body("<html>bad gateway</html>"), None);
        assert_eq!(InvalidTokenReason::from_response_body(""), None);
        assert_eq!(InvalidTokenReason::from_response_body(r#"{"reason":42}"#), None);
    }

    #[test]
    fn test_cleanup_policy() {
        use InvalidTokenReason::{BadDeviceToken, Unregistered};
        assert!(TokenCleanupPolicy::BadOrUnregistered.should_delete(BadDeviceToken));
        assert!(TokenCleanupPolicy::BadOrUnregistered.should_delete(Unregistered));
        assert!(!TokenCleanupPolicy::UnregisteredOnly.should_delete(BadDeviceToken));
        assert!(TokenCleanupPolicy::UnregisteredOnly.should_delete(Unregistered));
    }

    #[test]
    fn test_report_counts_successes() {
        let report = DeliveryReport::from_results(vec![
            DeliveryResult { token: "a".into(), ok: true, status: 200, body: String::new() },
            DeliveryResult::transport_failure("b", "connection reset"),
        ]);
        assert!(report.ok);
        assert_eq!(report.sent, 1);
        assert_eq!(report.results[1].status, 0);
        assert_eq!(report.results[1].body, "connection reset");
    }
}
