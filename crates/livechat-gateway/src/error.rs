//! Gateway error types

use crate::protocol::MethodError;
use livechat_core::{DomainError, RoomKey};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Failures of the backend link or of a single remote call
#[derive(Debug, Error)]
pub enum TransportError {
    /// WebSocket I/O or handshake failure
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// Backend refused the DDP handshake
    #[error("Handshake rejected: {0}")]
    Handshake(String),

    /// Remote method returned an error object
    #[error("Remote method failed: {0}")]
    Method(MethodError),

    /// Subscription refused by the backend
    #[error("Subscription rejected: {0}")]
    SubscriptionRejected(MethodError),

    /// Remote call did not complete in time
    #[error("Remote call timed out after {0:?}")]
    Timeout(Duration),

    /// Link is not established (or was lost while waiting)
    #[error("Not connected to backend")]
    Disconnected,

    /// Reply could not be decoded
    #[error("Malformed reply: {0}")]
    Decode(#[from] serde_json::Error),
}

impl From<tokio_tungstenite::tungstenite::Error> for TransportError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::WebSocket(err.to_string())
    }
}

/// Result type for transport operations
pub type TransportResult<T> = Result<T, TransportError>;

/// Faults delivered on the message stream instead of an event
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StreamFault {
    /// Link dropped; the stream can be re-established
    #[error("Stream disconnected: {0}")]
    Disconnected(String),

    /// Backend ended the subscription
    #[error("Subscription rejected: {0}")]
    SubscriptionRejected(String),

    /// Backend sent something the gateway cannot interpret
    #[error("Protocol violation: {0}")]
    Protocol(String),
}

impl StreamFault {
    /// Transient faults are worth a resubscription attempt
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Disconnected(_))
    }
}

/// Step of the connect sequence that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectStage {
    Transport,
    Login,
    Subscribe,
    InitialData,
}

impl fmt::Display for ConnectStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Transport => "transport",
            Self::Login => "login",
            Self::Subscribe => "subscribe",
            Self::InitialData => "initial data",
        })
    }
}

/// Gateway error type
#[derive(Debug, Error)]
pub enum GatewayError {
    /// A connect step failed; the gateway must not be used
    #[error("Connect failed during {stage}: {source}")]
    Connect {
        stage: ConnectStage,
        #[source]
        source: TransportError,
    },

    /// `connect` was called twice
    #[error("Gateway already connected")]
    AlreadyConnected,

    /// Operation requires a connected gateway
    #[error("Gateway not connected")]
    NotConnected,

    /// Backend rejected the guest registration
    #[error("Guest registration failed: {0}")]
    Registration(#[source] TransportError),

    /// Backend rejected the outgoing message
    #[error("Send failed: {0}")]
    Send(#[source] TransportError),

    /// Room key was never issued by this gateway or has been closed
    #[error("Unknown session: {0}")]
    UnknownSession(RoomKey),

    /// Stream fault that could not be recovered
    #[error("Stream fault: {0}")]
    StreamFault(StreamFault),

    /// Invalid input
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// Background task ended abnormally
    #[error("Internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    pub(crate) fn connect(stage: ConnectStage) -> impl FnOnce(TransportError) -> Self {
        move |source| Self::Connect { stage, source }
    }

    /// Get an error code string
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Connect { .. } => "CONNECT_FAILURE",
            Self::AlreadyConnected => "ALREADY_CONNECTED",
            Self::NotConnected => "NOT_CONNECTED",
            Self::Registration(_) => "REGISTRATION_FAILURE",
            Self::Send(_) | Self::UnknownSession(_) => "SEND_FAILURE",
            Self::StreamFault(_) => "STREAM_FAULT",
            Self::Domain(e) => e.code(),
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Check if this error is the caller's fault rather than the backend's
    #[must_use]
    pub fn is_caller_error(&self) -> bool {
        match self {
            Self::UnknownSession(_) | Self::AlreadyConnected | Self::NotConnected => true,
            Self::Domain(e) => e.is_validation(),
            _ => false,
        }
    }
}

/// Gateway result type
pub type GatewayResult<T> = Result<T, GatewayError>;
