//! Inbound chat message and the payload forwarded upstream.
//!
//! Inbound bodies use camelCase keys; the upstream service's own key names
//! (`Text`, `UserName`, `is_draft`, ...) are accepted as aliases so callers
//! written against the upstream API keep working.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use uuid::Uuid;

/// User name sent upstream when the caller does not provide one.
pub const DEFAULT_USER_NAME: &str = "anonymous@user.com";

/// Channel label sent upstream when the caller does not provide one.
pub const DEFAULT_SOURCE_NAME: &str = "WebChat";

/// Errors raised while validating an inbound chat body.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Text is required")]
    MissingText,

    #[error("Invalid request body: {0}")]
    InvalidBody(#[from] serde_json::Error),
}

/// Chat message as posted by the client.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncomingRequest {
    #[serde(default, alias = "Text")]
    pub text: Option<String>,
    #[serde(default, alias = "UserName")]
    pub user_name: Option<String>,
    #[serde(default, alias = "SourceName")]
    pub source_name: Option<String>,
    #[serde(default, alias = "SessionId")]
    pub session_id: Option<String>,
    /// Opaque value passed through to the upstream service.
    #[serde(default, alias = "Context")]
    pub context: Option<Value>,
    #[serde(default, alias = "is_draft")]
    pub is_draft: Option<bool>,
}

impl IncomingRequest {
    /// Deserialize a raw request body. Only a JSON object is accepted;
    /// arrays and scalars are invalid even when they would fill the fields
    /// positionally.
    pub fn from_slice(body: &[u8]) -> Result<Self, ValidationError> {
        let object: Map<String, Value> = serde_json::from_slice(body)?;
        Ok(serde_json::from_value(Value::Object(object))?)
    }

    /// Check the required `text` field and apply defaults.
    ///
    /// An empty `text` is valid; an absent or `null` one is not. Empty
    /// `userName`, `sourceName` and `sessionId` count as absent.
    pub fn validate(self) -> Result<ChatMessage, ValidationError> {
        let text = self.text.ok_or(ValidationError::MissingText)?;
        Ok(ChatMessage {
            text,
            user_name: non_empty(self.user_name).unwrap_or_else(|| DEFAULT_USER_NAME.into()),
            source_name: non_empty(self.source_name)
                .unwrap_or_else(|| DEFAULT_SOURCE_NAME.into()),
            session_id: non_empty(self.session_id).unwrap_or_else(new_session_id),
            context: self.context,
            is_draft: self.is_draft.unwrap_or(false),
        })
    }
}

/// A validated chat message with defaults applied.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatMessage {
    pub text: String,
    pub user_name: String,
    pub source_name: String,
    pub session_id: String,
    pub context: Option<Value>,
    pub is_draft: bool,
}

impl ChatMessage {
    /// Build the upstream payload, injecting the configured domain identifier.
    pub fn into_upstream(self, domain_name: &str) -> UpstreamRequest {
        UpstreamRequest {
            text: self.text,
            user_name: self.user_name,
            source_name: self.source_name,
            session_id: self.session_id,
            domain_name: domain_name.to_string(),
            is_draft: self.is_draft,
            context: self.context,
        }
    }
}

/// JSON body POSTed to the upstream streaming endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct UpstreamRequest {
    pub text: String,
    pub user_name: String,
    pub source_name: String,
    pub session_id: String,
    pub domain_name: String,
    #[serde(rename = "is_draft")]
    pub is_draft: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<Value>,
}

/// Generate a session identifier for callers that did not send one:
/// `session_` followed by a time-ordered UUIDv7.
pub fn new_session_id() -> String {
    format!("session_{}", Uuid::now_v7().simple())
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}
