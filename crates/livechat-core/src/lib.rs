//! # livechat-core
//!
//! Domain layer containing the livechat entities, value objects, and domain errors.
//! This crate has zero dependencies on infrastructure (transport, runtime, etc.).

pub mod entities;
pub mod error;
pub mod value_objects;

// Re-export commonly used types at crate root
pub use entities::{
    Department, GuestDetails, GuestIdentity, InitialData, LivechatMessage, MessageAuthor,
    MessageMeta, RoomType, Visitor, VisitorEmail,
};
pub use error::DomainError;
pub use value_objects::{generate_id, RoomKey};
