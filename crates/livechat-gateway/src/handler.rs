//! Delivery handlers bound to guest sessions

use crate::protocol::StreamEvent;
use livechat_core::{LivechatMessage, MessageMeta};
use tokio::sync::mpsc;

/// Callback receiving the messages routed to one guest session
///
/// Invoked from the stream task, one message at a time and in stream order.
/// Implementations must not block; hand work off to another task instead.
pub trait MessageHandler: Send + Sync + 'static {
    fn on_message(&self, message: &LivechatMessage, meta: &MessageMeta);
}

impl<F> MessageHandler for F
where
    F: Fn(&LivechatMessage, &MessageMeta) + Send + Sync + 'static,
{
    fn on_message(&self, message: &LivechatMessage, meta: &MessageMeta) {
        self(message, meta);
    }
}

/// Forward routed messages into a channel
impl MessageHandler for mpsc::UnboundedSender<StreamEvent> {
    fn on_message(&self, message: &LivechatMessage, meta: &MessageMeta) {
        if self.send(StreamEvent::new(message.clone(), meta.clone())).is_err() {
            tracing::debug!(room = %message.rid, "Handler channel closed, message dropped");
        }
    }
}
