//! Message router
//!
//! Applies the per-event routing decision: livechat rooms only, known rooms
//! only, never the guest's own messages.

use crate::protocol::StreamEvent;
use crate::registry::GuestRegistry;
use std::fmt;
use std::sync::Arc;

/// What happened to one stream event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteOutcome {
    /// Handed to the session's handler
    Delivered,
    /// Room is not a livechat room
    NotLivechat,
    /// No session registered for the room
    UnknownRoom,
    /// Sent by the session's own guest
    SelfEcho,
}

impl fmt::Display for RouteOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Delivered => "delivered",
            Self::NotLivechat => "not_livechat",
            Self::UnknownRoom => "unknown_room",
            Self::SelfEcho => "self_echo",
        })
    }
}

/// Routes stream events to the registered guest sessions
#[derive(Debug, Clone)]
pub struct MessageRouter {
    registry: Arc<GuestRegistry>,
}

impl MessageRouter {
    pub fn new(registry: Arc<GuestRegistry>) -> Self {
        Self { registry }
    }

    /// Route one event
    ///
    /// The handler is looked up in the registry on every event, so a room
    /// registered after an event arrived does not see that event.
    pub fn route(&self, event: &StreamEvent) -> RouteOutcome {
        if !event.meta.room_type.is_livechat() {
            return RouteOutcome::NotLivechat;
        }

        let Some(session) = self.registry.get(&event.message.rid) else {
            return RouteOutcome::UnknownRoom;
        };

        let guest = session.guest();
        if guest.is_author(event.message.sender_id()) {
            tracing::debug!(
                guest = %guest.name(),
                room = %event.message.rid,
                "Ignoring input from guest"
            );
            return RouteOutcome::SelfEcho;
        }

        tracing::debug!(
            guest = %guest.name(),
            room = %event.message.rid,
            from = %event.message.sender_username(),
            "Calling handler for guest"
        );
        session.deliver(&event.message, &event.meta);

        RouteOutcome::Delivered
    }

    pub fn registry(&self) -> &Arc<GuestRegistry> {
        &self.registry
    }
}
