//! Guest entities - livechat visitors issued by the backend

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Details submitted when registering a new guest
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct GuestDetails {
    #[validate(length(min = 1, max = 128, message = "Guest name must be 1-128 characters"))]
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,

    /// Visitor session token; generated by the gateway when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    /// Department id; defaults to the configured department when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
}

impl GuestDetails {
    /// Create details for a guest with only a display name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Set the contact email
    #[must_use]
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// Set an explicit visitor token
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Route to an explicit department id
    #[must_use]
    pub fn with_department(mut self, department: impl Into<String>) -> Self {
        self.department = Some(department.into());
        self
    }
}

/// Contact address attached to a visitor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisitorEmail {
    pub address: String,
}

/// Visitor profile as issued by the backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Visitor {
    pub name: String,
    /// Secret session token; required on every message the guest sends
    pub token: String,
    pub username: String,
    #[serde(default)]
    pub visitor_emails: Vec<VisitorEmail>,
}

/// Backend-issued identity for a registered guest
///
/// Never mutated after registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuestIdentity {
    pub user_id: String,
    pub visitor: Visitor,
}

impl GuestIdentity {
    /// Display name of the visitor
    #[inline]
    pub fn name(&self) -> &str {
        &self.visitor.name
    }

    /// Backend-generated username of the visitor
    #[inline]
    pub fn username(&self) -> &str {
        &self.visitor.username
    }

    /// Session token used when sending on behalf of the visitor
    #[inline]
    pub fn token(&self) -> &str {
        &self.visitor.token
    }

    /// Check whether a message author id is this guest
    #[inline]
    pub fn is_author(&self, user_id: &str) -> bool {
        self.user_id == user_id
    }
}
