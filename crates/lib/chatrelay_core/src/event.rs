//! Relay events: the normalized envelope written to the client.
//!
//! Every event is framed as `data: <json>\n\n`. Structured upstream payloads
//! are re-serialized as-is (key order preserved); anything that is not JSON
//! is wrapped as `{"message": "<raw text>"}`.

use serde_json::{Value, json};

/// In-band message sent when the upstream stream fails after streaming began.
pub const STREAM_ERROR_MESSAGE: &str =
    "I apologize, but I encountered an error. Please try again.";

/// In-band message sent when the relay fails before streaming began.
pub const UNAVAILABLE_MESSAGE: &str =
    "I apologize, but I'm having trouble responding right now. Please try again.";

/// Payload carried by a [`RelayEvent`].
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// A decoded upstream JSON value.
    Structured(Value),
    /// Text that did not parse as JSON.
    RawText(String),
}

/// One event written to the client.
#[derive(Debug, Clone, PartialEq)]
pub struct RelayEvent {
    payload: Payload,
}

impl RelayEvent {
    pub fn structured(value: Value) -> Self {
        Self {
            payload: Payload::Structured(value),
        }
    }

    pub fn raw(text: impl Into<String>) -> Self {
        Self {
            payload: Payload::RawText(text.into()),
        }
    }

    /// Fallback event for a mid-stream upstream failure.
    pub fn stream_error() -> Self {
        Self::raw(STREAM_ERROR_MESSAGE)
    }

    /// Fallback event for a failure before streaming began.
    pub fn unavailable() -> Self {
        Self::raw(UNAVAILABLE_MESSAGE)
    }

    /// The JSON value written inside the frame.
    pub fn to_json(&self) -> Value {
        match &self.payload {
            Payload::Structured(value) => value.clone(),
            Payload::RawText(text) => json!({ "message": text }),
        }
    }

    /// Serialize as a wire frame: `data: <json>\n\n`.
    pub fn encode(&self) -> String {
        let body = match &self.payload {
            Payload::Structured(value) => value.to_string(),
            Payload::RawText(text) => json!({ "message": text }).to_string(),
        };
        format!("data: {body}\n\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structured_event_is_reserialized_compactly() {
        let value: Value = serde_json::from_str(r#"{ "b": 1,  "a": [true, null] }"#).unwrap();
        let frame = RelayEvent::structured(value).encode();
        assert_eq!(frame, "data: {\"b\":1,\"a\":[true,null]}\n\n");
    }

    #[test]
    fn raw_text_is_wrapped_and_escaped() {
        let frame = RelayEvent::raw("say \"hi\"").encode();
        assert_eq!(frame, "data: {\"message\":\"say \\\"hi\\\"\"}\n\n");
    }

    #[test]
    fn fallback_events_carry_fixed_messages() {
        assert_eq!(
            RelayEvent::stream_error().to_json(),
            json!({"message": STREAM_ERROR_MESSAGE})
        );
        assert_eq!(
            RelayEvent::unavailable(),
            RelayEvent::raw(UNAVAILABLE_MESSAGE)
        );
    }
}
