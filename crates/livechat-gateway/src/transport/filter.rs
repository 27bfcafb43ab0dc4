//! Stream consumer filter
//!
//! Decides which raw stream notifications reach the router at all, before any
//! per-guest routing happens.

use super::StreamItem;
use crate::protocol::StreamEvent;
use chrono::{DateTime, Utc};
use tokio::sync::mpsc;

/// Which rooms and message kinds the stream consumer accepts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamFilter {
    /// Rooms accepted even when `all_public` is off
    pub rooms: Vec<String>,
    /// Accept public rooms the bot does not participate in
    pub all_public: bool,
    /// Accept direct-message rooms
    pub dm: bool,
    /// Accept livechat rooms
    pub livechat: bool,
    /// Accept edited messages
    pub edited: bool,
}

impl StreamFilter {
    /// All public rooms and livechat, edits included, no direct messages
    #[must_use]
    pub fn livechat() -> Self {
        Self {
            rooms: Vec::new(),
            all_public: true,
            dm: false,
            livechat: true,
            edited: true,
        }
    }

    /// Check the static part of the filter (everything except recency)
    pub fn permits(&self, event: &StreamEvent) -> bool {
        let room_type = event.meta.room_type;

        if room_type.is_direct() && !self.dm {
            return false;
        }
        if room_type.is_livechat() && !self.livechat {
            return false;
        }
        if !self.all_public
            && !room_type.is_direct()
            && !event.meta.room_participant
            && !self.rooms.iter().any(|r| *r == event.message.rid)
        {
            return false;
        }
        if event.message.is_edited() && !self.edited {
            return false;
        }
        true
    }
}

impl Default for StreamFilter {
    fn default() -> Self {
        Self::livechat()
    }
}

/// Filtered view over the transport's stream
///
/// Drops the bot's own messages, anything the filter rejects, and replayed
/// history older than the newest message already accepted. Faults pass
/// through untouched.
#[derive(Debug)]
pub struct MessageStream {
    receiver: mpsc::Receiver<StreamItem>,
    filter: StreamFilter,
    own_user_id: String,
    last_read: DateTime<Utc>,
}

impl MessageStream {
    pub fn new(receiver: mpsc::Receiver<StreamItem>, filter: StreamFilter, own_user_id: String) -> Self {
        let now = Utc::now();
        Self {
            receiver,
            filter,
            own_user_id,
            last_read: DateTime::from_timestamp_millis(now.timestamp_millis()).unwrap_or(now),
        }
    }

    /// Swap in a freshly subscribed receiver, keeping the recency watermark
    pub fn resume(&mut self, receiver: mpsc::Receiver<StreamItem>, own_user_id: String) {
        self.receiver = receiver;
        self.own_user_id = own_user_id;
    }

    /// Id of the user the stream was opened as
    pub fn own_user_id(&self) -> &str {
        &self.own_user_id
    }

    /// Apply the filter, advancing the recency watermark on acceptance
    pub fn accepts(&mut self, event: &StreamEvent) -> bool {
        if event.message.sender_id() == self.own_user_id {
            return false;
        }
        if !self.filter.permits(event) {
            return false;
        }

        let current = event.message.effective_time();
        if current < self.last_read {
            return false;
        }
        self.last_read = current;
        true
    }

    /// Wait for the next accepted event or fault
    ///
    /// Returns `None` once the transport side of the stream is gone.
    pub async fn next(&mut self) -> Option<StreamItem> {
        loop {
            match self.receiver.recv().await? {
                Ok(event) => {
                    if self.accepts(&event) {
                        return Some(Ok(event));
                    }
                    tracing::trace!(
                        message_id = %event.message.id,
                        room = %event.message.rid,
                        "Stream message filtered out"
                    );
                }
                Err(fault) => return Some(Err(fault)),
            }
        }
    }
}
