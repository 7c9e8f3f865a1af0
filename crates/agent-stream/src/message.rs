use serde_json::{Map, Value};

/// Normalized output unit delivered to callers.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayMessage {
    /// Text to show. Empty for the plain terminal message.
    pub content: String,
    /// `true` only for the single terminal message of a session.
    pub done: bool,
    /// Session the message belongs to, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    /// Extra details such as the source discriminator or a tool duration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
}

impl DisplayMessage {
    /// Creates a non-terminal message.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            done: false,
            session_id: None,
            metadata: None,
        }
    }

    /// Creates a terminal message with empty content.
    pub fn terminal() -> Self {
        Self {
            content: String::new(),
            done: true,
            session_id: None,
            metadata: None,
        }
    }

    /// Sets the session id.
    pub fn with_session_id(mut self, session_id: Option<String>) -> Self {
        self.session_id = session_id;
        self
    }

    /// Adds one metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata
            .get_or_insert_with(Map::new)
            .insert(key.into(), value.into());
        self
    }

    /// Looks up a metadata entry.
    pub fn metadata_value(&self, key: &str) -> Option<&Value> {
        self.metadata.as_ref().and_then(|map| map.get(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_session_id_in_camel_case_and_skips_empty_fields() {
        let message = DisplayMessage::text("hi").with_session_id(Some("s1".into()));
        let value = serde_json::to_value(&message).expect("serialize");
        assert_eq!(
            value,
            serde_json::json!({"content":"hi","done":false,"sessionId":"s1"})
        );
    }

    #[test]
    fn metadata_accumulates() {
        let message = DisplayMessage::terminal()
            .with_metadata("synthetic", true)
            .with_metadata("event", "RunCompleted");
        assert!(message.done);
        assert_eq!(message.metadata_value("synthetic"), Some(&Value::Bool(true)));
        assert_eq!(
            message.metadata_value("event").and_then(Value::as_str),
            Some("RunCompleted")
        );
    }
}
