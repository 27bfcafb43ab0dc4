//! Backend wire protocol definitions
//!
//! Meteor DDP frames, remote method names, and stream payloads used to talk
//! to the chat backend's realtime API.

mod messages;
mod names;
mod payloads;

pub use messages::{DdpMessage, MethodError, DDP_VERSION};
pub use names::{collections, methods, streams};
pub use payloads::{LoginRequest, LoginResult, StreamEvent};
