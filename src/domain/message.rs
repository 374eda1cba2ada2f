//! Cross-context messages posted by the hosted payment window.
//!
//! The hosted page posts `{eventName, eventStatus, eventMessage}` to its
//! opener. `eventName` is `<prefix>-<sessionToken>` and is the only thing
//! tying a message to an attempt, so anything that does not parse, or names
//! another session, is dropped by the adapter.

use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EventStatus {
    Hide,
    Aborted,
    Success,
}

/// Which browsing context posted the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageOrigin {
    /// The in-page iframe.
    Embedded,
    /// The fallback top-level window.
    Popup,
}

/// A raw message as delivered by the message bus.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageEnvelope {
    pub origin: MessageOrigin,
    pub data: Value,
}

impl MessageEnvelope {
    pub fn new(origin: MessageOrigin, data: Value) -> Self {
        Self { origin, data }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostedMessage {
    pub event_name: String,
    pub event_status: EventStatus,
    #[serde(default)]
    pub event_message: Value,
}

impl HostedMessage {
    /// Returns `None` for anything that is not a hosted payment event.
    pub fn from_value(data: &Value) -> Option<Self> {
        HostedMessage::deserialize(data).ok()
    }

    /// Human readable text of an `ABORTED` event, if the provider sent one.
    pub fn message_text(&self) -> Option<String> {
        let text = match &self.event_message {
            Value::String(s) => s.clone(),
            Value::Object(map) => map
                .get("message")
                .or_else(|| map.get("error"))
                .and_then(Value::as_str)
                .map(str::to_owned)?,
            _ => return None,
        };
        let text = text.trim();
        (!text.is_empty()).then(|| text.to_owned())
    }
}

/// Fields of a `SUCCESS` event that the backend needs for validation.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionPayload {
    pub raw_data: Value,
    pub hash: String,
}

impl CompletionPayload {
    /// Extracts `{data, hash}` from an event message that may be a JSON
    /// string or an object, with the pair either at the top level or nested
    /// once under `data`.
    pub fn extract(event_message: &Value) -> Option<Self> {
        let parsed;
        let message = match event_message {
            Value::String(s) => {
                parsed = serde_json::from_str::<Value>(s).ok()?;
                &parsed
            }
            other => other,
        };

        Self::from_object(message).or_else(|| message.get("data").and_then(Self::from_object))
    }

    fn from_object(value: &Value) -> Option<Self> {
        let raw_data = value.get("data").filter(|d| !d.is_null())?;
        let hash = value
            .get("hash")
            .and_then(Value::as_str)
            .filter(|h| !h.is_empty())?;
        Some(Self {
            raw_data: raw_data.clone(),
            hash: hash.to_owned(),
        })
    }
}

/// The tag a hosted event must carry to belong to `session_token`.
pub fn session_event_name(prefix: &str, session_token: &str) -> String {
    format!("{prefix}-{session_token}")
}
