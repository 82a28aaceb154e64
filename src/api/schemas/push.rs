use crate::domain::notification::{DEFAULT_TITLE, SendPushCommand};
use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Default, Deserialize)]
pub struct SendPushRequest {
    #[serde(default)]
    pub user_id: Option<Value>,
    #[serde(default)]
    pub user_ids: Option<Value>,
    #[serde(default)]
    pub title: Option<Value>,
    #[serde(default)]
    pub body: Option<Value>,
    #[serde(default, rename = "type")]
    pub kind: Option<Value>,
    #[serde(default)]
    pub data: Option<Value>,
}

impl SendPushRequest {
    /// Validates the request and resolves its target users.
    ///
    /// A supplied `user_ids` list, even an empty one, is a valid target set.
    /// A `user_ids` that is not a list is ignored. Scalar text fields are
    /// taken in their JSON text form.
    ///
    /// # Errors
    /// Returns an error if no target is given or the body text is blank.
    pub fn validate(self) -> Result<SendPushCommand, String> {
        let listed: Option<Vec<String>> = match &self.user_ids {
            Some(Value::Array(ids)) => Some(ids.iter().filter_map(scalar_text).collect()),
            _ => None,
        };
        let single = self.user_id.as_ref().and_then(scalar_text);

        let user_ids = match (listed, single) {
            (Some(ids), _) if !ids.is_empty() => ids,
            (_, Some(id)) => vec![id],
            (Some(ids), None) => ids,
            (None, None) => return Err("user_id or user_ids is required".into()),
        };

        let Some(body) = self.body.as_ref().and_then(scalar_text) else {
            return Err("body is required".into());
        };

        let title = self.title.as_ref().and_then(scalar_text).unwrap_or_else(|| DEFAULT_TITLE.to_string());

        let data = match self.data {
            Some(Value::Object(map)) => map,
            _ => Map::new(),
        };

        Ok(SendPushCommand { user_ids, title, body, kind: self.kind.as_ref().and_then(scalar_text), data })
    }
}

/// Scalars as trimmed text; blanks, nulls and containers are dropped.
fn scalar_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}
