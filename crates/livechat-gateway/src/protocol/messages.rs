//! DDP message format
//!
//! Every frame exchanged with the backend is a JSON object tagged by `msg`.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Protocol version negotiated on connect
pub const DDP_VERSION: &str = "1";

/// Error object attached to `result`, `nosub`, and method failures
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MethodError {
    /// Error code; the backend uses both numbers and strings
    #[serde(default)]
    pub error: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
}

impl MethodError {
    /// Build an error with a code and a human-readable reason
    pub fn new(error: impl Into<Value>, reason: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            reason: Some(reason.into()),
            message: None,
            error_type: None,
        }
    }
}

impl fmt::Display for MethodError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let code = match &self.error {
            Value::String(s) => s.clone(),
            Value::Null => "unknown".to_string(),
            other => other.to_string(),
        };
        match self.reason.as_deref().or(self.message.as_deref()) {
            Some(reason) => write!(f, "[{code}] {reason}"),
            None => write!(f, "[{code}]"),
        }
    }
}

/// DDP frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "msg", rename_all = "lowercase")]
pub enum DdpMessage {
    // === Connection ===
    Connect {
        version: String,
        support: Vec<String>,
    },
    Connected {
        session: String,
    },
    Failed {
        version: String,
    },
    Ping {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
    },
    Pong {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
    },

    // === Remote procedure calls ===
    Method {
        method: String,
        params: Vec<Value>,
        id: String,
    },
    #[serde(rename = "result")]
    MethodResult {
        id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        result: Option<Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<MethodError>,
    },
    Updated {
        #[serde(default)]
        methods: Vec<String>,
    },

    // === Subscriptions ===
    Sub {
        id: String,
        name: String,
        params: Vec<Value>,
    },
    Unsub {
        id: String,
    },
    Ready {
        subs: Vec<String>,
    },
    Nosub {
        id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<MethodError>,
    },
    Added {
        collection: String,
        id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        fields: Option<Value>,
    },
    Changed {
        collection: String,
        id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        fields: Option<Value>,
    },
    Removed {
        collection: String,
        id: String,
    },

    // === Errors ===
    #[serde(rename = "error")]
    ProtocolError {
        reason: String,
        #[serde(
            rename = "offendingMessage",
            default,
            skip_serializing_if = "Option::is_none"
        )]
        offending_message: Option<Value>,
    },
}

impl DdpMessage {
    // === Client Messages ===

    /// Create the opening handshake
    #[must_use]
    pub fn connect() -> Self {
        Self::Connect {
            version: DDP_VERSION.to_string(),
            support: vec![DDP_VERSION.to_string()],
        }
    }

    /// Create a pong answering a server ping
    #[must_use]
    pub fn pong(id: Option<String>) -> Self {
        Self::Pong { id }
    }

    /// Create a remote method invocation
    #[must_use]
    pub fn method(id: impl Into<String>, method: impl Into<String>, params: Vec<Value>) -> Self {
        Self::Method {
            method: method.into(),
            params,
            id: id.into(),
        }
    }

    /// Create a subscription request
    #[must_use]
    pub fn sub(id: impl Into<String>, name: impl Into<String>, params: Vec<Value>) -> Self {
        Self::Sub {
            id: id.into(),
            name: name.into(),
            params,
        }
    }

    // === Utilities ===

    /// Frame kind as it appears in the `msg` field
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Connect { .. } => "connect",
            Self::Connected { .. } => "connected",
            Self::Failed { .. } => "failed",
            Self::Ping { .. } => "ping",
            Self::Pong { .. } => "pong",
            Self::Method { .. } => "method",
            Self::MethodResult { .. } => "result",
            Self::Updated { .. } => "updated",
            Self::Sub { .. } => "sub",
            Self::Unsub { .. } => "unsub",
            Self::Ready { .. } => "ready",
            Self::Nosub { .. } => "nosub",
            Self::Added { .. } => "added",
            Self::Changed { .. } => "changed",
            Self::Removed { .. } => "removed",
            Self::ProtocolError { .. } => "error",
        }
    }

    /// Serialize to JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

impl fmt::Display for DdpMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Method { method, id, .. } => write!(f, "DdpMessage(method={method}, id={id})"),
            Self::MethodResult { id, .. } | Self::Sub { id, .. } | Self::Nosub { id, .. } => {
                write!(f, "DdpMessage({}, id={id})", self.kind())
            }
            Self::Changed { collection, .. } => {
                write!(f, "DdpMessage(changed, collection={collection})")
            }
            _ => write!(f, "DdpMessage({})", self.kind()),
        }
    }
}
