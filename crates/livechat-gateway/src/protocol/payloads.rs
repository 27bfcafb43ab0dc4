//! Payloads carried inside DDP frames

use livechat_core::{DomainError, LivechatMessage, MessageMeta};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Parameters of the `login` method (username + password)
#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
    user: LoginUser,
    password: String,
}

#[derive(Debug, Clone, Serialize)]
struct LoginUser {
    username: String,
}

impl LoginRequest {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            user: LoginUser {
                username: username.into(),
            },
            password: password.into(),
        }
    }
}

/// Result of a successful `login`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResult {
    /// Id of the authenticated user
    pub id: String,
    #[serde(default)]
    pub token: Option<String>,
}

/// One message notification from the room-messages stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamEvent {
    pub message: LivechatMessage,
    pub meta: MessageMeta,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StreamFields {
    #[serde(default)]
    event_name: Option<String>,
    args: (LivechatMessage, MessageMeta),
}

impl StreamEvent {
    pub fn new(message: LivechatMessage, meta: MessageMeta) -> Self {
        Self { message, meta }
    }

    /// Decode the `fields` object of a `changed` frame
    ///
    /// Returns the event together with the stream event name, if any.
    pub fn from_fields(fields: Value) -> Result<(Option<String>, Self), DomainError> {
        let StreamFields {
            event_name,
            args: (message, meta),
        } = serde_json::from_value(fields)?;
        Ok((event_name, Self { message, meta }))
    }
}
