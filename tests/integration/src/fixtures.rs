//! Test fixtures and data generators
//!
//! Provides reusable backend payloads and stream events.

use chrono::{DateTime, Utc};
use livechat_core::{LivechatMessage, MessageAuthor, MessageMeta, RoomKey, RoomType};
use livechat_gateway::StreamEvent;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};

/// Counter for unique test data
static COUNTER: AtomicU64 = AtomicU64::new(1);

/// Get a unique suffix for test data
pub fn unique_suffix() -> u64 {
    COUNTER.fetch_add(1, Ordering::SeqCst)
}

/// User id the mock backend logs the bot in as
pub const BOT_USER_ID: &str = "bot-user";

/// Agent answering in livechat rooms
pub const AGENT_ID: &str = "agent-1";

/// Initial livechat data with a "Support" (d0) and a "Sales" (d1) department
pub fn initial_data() -> Value {
    json!({
        "enabled": true,
        "title": "Rocket.Chat",
        "color": "#C1272D",
        "registrationForm": true,
        "room": null,
        "triggers": [],
        "departments": [
            {
                "_id": "d0",
                "enabled": true,
                "name": "Support",
                "description": "",
                "numAgents": 2,
                "showOnRegistration": true,
                "_updatedAt": { "$date": 1_700_000_000_000_i64 }
            },
            {
                "_id": "d1",
                "enabled": true,
                "name": "Sales",
                "description": "",
                "numAgents": 3,
                "showOnRegistration": true,
                "_updatedAt": { "$date": 1_700_000_000_000_i64 }
            }
        ],
        "allowSwitchingDepartments": true,
        "online": true,
        "offlineColor": "#666666",
        "offlineMessage": "We are not online right now. Please leave us a message:",
        "displayOfflineForm": true,
        "videoCall": false,
        "fileUpload": false,
        "conversationFinishedMessage": "",
        "nameFieldRegistrationForm": true,
        "emailFieldRegistrationForm": true,
        "language": "",
        "transcript": false
    })
}

/// Stream event sent at `ts`
pub fn event_at(room: &str, sender_id: &str, text: &str, room_type: RoomType, ts: DateTime<Utc>) -> StreamEvent {
    StreamEvent::new(
        LivechatMessage {
            id: format!("msg-{}", unique_suffix()),
            rid: room.to_string(),
            msg: text.to_string(),
            ts,
            u: MessageAuthor {
                id: sender_id.to_string(),
                username: format!("{sender_id}.name"),
                name: None,
            },
            token: None,
            alias: None,
            edited_at: None,
            updated_at: None,
            new_room: false,
            show_connecting: false,
        },
        MessageMeta {
            room_type,
            room_participant: true,
        },
    )
}

/// Livechat event sent now
pub fn livechat_event(room: &RoomKey, sender_id: &str, text: &str) -> StreamEvent {
    event_at(room.as_str(), sender_id, text, RoomType::Livechat, Utc::now())
}

/// Event sent now in a room of the given type
pub fn room_event(room: &RoomKey, sender_id: &str, text: &str, room_type: RoomType) -> StreamEvent {
    event_at(room.as_str(), sender_id, text, room_type, Utc::now())
}
