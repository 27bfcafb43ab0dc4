//! A registered guest and its delivery handler

use crate::handler::MessageHandler;
use chrono::{DateTime, Utc};
use livechat_core::{GuestIdentity, LivechatMessage, MessageMeta, RoomKey};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// One guest session
pub struct GuestSession {
    /// Handle given out to the caller of `register_guest`
    room_key: RoomKey,

    /// Backend identity; never mutated
    guest: GuestIdentity,

    handler: Arc<dyn MessageHandler>,

    /// Registration time
    created_at: DateTime<Utc>,

    /// Last delivery or send
    last_activity: Mutex<Instant>,

    /// Messages handed to the handler so far
    delivered: AtomicU64,
}

impl GuestSession {
    pub fn new(room_key: RoomKey, guest: GuestIdentity, handler: Arc<dyn MessageHandler>) -> Arc<Self> {
        Arc::new(Self {
            room_key,
            guest,
            handler,
            created_at: Utc::now(),
            last_activity: Mutex::new(Instant::now()),
            delivered: AtomicU64::new(0),
        })
    }

    pub fn room_key(&self) -> &RoomKey {
        &self.room_key
    }

    pub fn guest(&self) -> &GuestIdentity {
        &self.guest
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Hand a message to the bound handler
    pub fn deliver(&self, message: &LivechatMessage, meta: &MessageMeta) {
        self.handler.on_message(message, meta);
        self.delivered.fetch_add(1, Ordering::SeqCst);
        self.touch();
    }

    /// Number of messages delivered to the handler
    pub fn delivered_count(&self) -> u64 {
        self.delivered.load(Ordering::SeqCst)
    }

    /// Record activity on the session
    pub fn touch(&self) {
        *self.last_activity.lock() = Instant::now();
    }

    /// Time since the last delivery or send
    pub fn idle_for(&self) -> Duration {
        self.last_activity.lock().elapsed()
    }
}

impl std::fmt::Debug for GuestSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GuestSession")
            .field("room_key", &self.room_key)
            .field("guest", &self.guest.username())
            .field("created_at", &self.created_at)
            .field("delivered", &self.delivered_count())
            .finish()
    }
}
