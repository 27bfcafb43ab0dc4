//! Guest registry
//!
//! The single source of truth for which guest sessions exist. Written by
//! registration, read by the stream router and by outgoing sends.

mod manager;
mod session;

pub use manager::GuestRegistry;
pub use session::GuestSession;
