//! # livechat-gateway
//!
//! Bridges the chat backend's livechat message stream to per-guest handlers.
//! One authenticated DDP link carries a single message subscription, which is
//! demultiplexed into guest sessions keyed by gateway-issued room keys.

pub mod connection;
pub mod error;
pub mod gateway;
pub mod handler;
pub mod protocol;
pub mod registry;
pub mod router;
pub mod transport;

pub use error::{ConnectStage, GatewayError, GatewayResult, StreamFault, TransportError, TransportResult};
pub use gateway::{GatewayOptions, LivechatGateway};
pub use handler::MessageHandler;
pub use protocol::StreamEvent;
pub use router::{RetryPolicy, RouteOutcome};
pub use transport::{BackendTransport, Credentials, StreamFilter, StreamItem};
