//! Backend transport
//!
//! The narrow async surface the gateway needs from the chat backend: connect,
//! authenticate, subscribe to the shared message stream, and invoke remote
//! methods. `DdpClient` implements it over a WebSocket.

mod ddp;
mod filter;

pub use ddp::{DdpClient, DdpClientConfig};
pub use filter::{MessageStream, StreamFilter};

use crate::error::{StreamFault, TransportResult};
use crate::protocol::StreamEvent;
use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use tokio::sync::mpsc;

/// One item of the shared message stream
pub type StreamItem = Result<StreamEvent, StreamFault>;

/// Login credentials for the gateway's bot user
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Connection to the chat backend
///
/// All remote calls multiplex over one authenticated link. Implementations
/// must be safe to call concurrently.
#[async_trait]
pub trait BackendTransport: Send + Sync {
    /// Open (or re-open) the link
    async fn connect(&self) -> TransportResult<()>;

    /// Authenticate, returning the logged-in user id
    async fn login(&self, credentials: &Credentials) -> TransportResult<String>;

    /// Subscribe to every message visible to the logged-in user
    async fn subscribe_to_messages(&self) -> TransportResult<mpsc::Receiver<StreamItem>>;

    /// Invoke a remote method
    async fn call(&self, method: &str, params: Vec<Value>) -> TransportResult<Value>;

    /// Close the link, failing anything still in flight
    async fn disconnect(&self);
}
