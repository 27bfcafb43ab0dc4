//! Connection management
//!
//! Owns the single authenticated link to the backend and the stream opened
//! over it.

mod session;

pub use session::ConnectionSession;
