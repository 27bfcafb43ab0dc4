//! Guest registry
//!
//! Maps room keys to guest sessions using DashMap for thread-safe access from
//! the registration path and the stream task at the same time.

use super::GuestSession;
use crate::handler::MessageHandler;
use dashmap::DashMap;
use livechat_core::{GuestIdentity, RoomKey};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;

/// All live guest sessions, keyed by room key
pub struct GuestRegistry {
    sessions: DashMap<RoomKey, Arc<GuestSession>>,
}

impl GuestRegistry {
    /// Create a new registry
    #[must_use]
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
        }
    }

    /// Create a new registry wrapped in Arc
    #[must_use]
    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Register a session under `room_key`
    ///
    /// An existing session under the same key is replaced.
    pub fn insert(
        &self,
        room_key: RoomKey,
        guest: GuestIdentity,
        handler: Arc<dyn MessageHandler>,
    ) -> Arc<GuestSession> {
        let session = GuestSession::new(room_key.clone(), guest, handler);
        if self.sessions.insert(room_key.clone(), session.clone()).is_some() {
            tracing::warn!(room = %room_key, "Guest session replaced");
        }

        tracing::debug!(
            room = %room_key,
            guest = %session.guest().username(),
            "Guest session added"
        );

        session
    }

    /// Get a session by room key
    pub fn get(&self, room_key: &str) -> Option<Arc<GuestSession>> {
        self.sessions.get(room_key).map(|r| r.clone())
    }

    /// Remove a session
    pub fn remove(&self, room_key: &str) -> Option<Arc<GuestSession>> {
        let removed = self.sessions.remove(room_key).map(|(_, session)| session);
        if removed.is_some() {
            tracing::debug!(room = %room_key, "Guest session removed");
        }
        removed
    }

    /// Check if a session exists
    pub fn contains(&self, room_key: &str) -> bool {
        self.sessions.contains_key(room_key)
    }

    /// Get the number of live sessions
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Get all room keys
    pub fn room_keys(&self) -> Vec<RoomKey> {
        self.sessions.iter().map(|r| r.key().clone()).collect()
    }

    /// Remove every session
    pub fn clear(&self) -> usize {
        let count = self.sessions.len();
        self.sessions.clear();
        count
    }

    /// Remove sessions idle for at least `max_idle`
    pub fn remove_idle(&self, max_idle: Duration) -> usize {
        let before = self.sessions.len();
        self.sessions.retain(|room_key, session| {
            let keep = session.idle_for() < max_idle;
            if !keep {
                tracing::debug!(
                    room = %room_key,
                    guest = %session.guest().username(),
                    delivered = session.delivered_count(),
                    "Guest session expired"
                );
            }
            keep
        });

        let count = before.saturating_sub(self.sessions.len());
        if count > 0 {
            tracing::info!(count = count, "Cleaned up idle guest sessions");
        }

        count
    }

    /// Periodically expire idle sessions
    ///
    /// The task ends by itself once the registry is dropped.
    pub fn spawn_reaper(self: &Arc<Self>, max_idle: Duration, interval: Duration) -> JoinHandle<()> {
        let registry: Weak<Self> = Arc::downgrade(self);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;

            loop {
                ticker.tick().await;
                match registry.upgrade() {
                    Some(registry) => {
                        registry.remove_idle(max_idle);
                    }
                    None => break,
                }
            }

            tracing::debug!("Session reaper stopped");
        })
    }
}

impl Default for GuestRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for GuestRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GuestRegistry")
            .field("sessions", &self.sessions.len())
            .finish()
    }
}
