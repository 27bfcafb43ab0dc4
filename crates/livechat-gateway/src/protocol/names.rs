//! Remote method, collection, and stream names

/// Remote methods invoked through `call`
pub mod methods {
    /// Authenticate the gateway's bot user
    pub const LOGIN: &str = "login";
    /// Fetch the livechat configuration snapshot
    pub const GET_INITIAL_DATA: &str = "livechat:getInitialData";
    /// Create a livechat visitor
    pub const REGISTER_GUEST: &str = "livechat:registerGuest";
    /// Post a message into a livechat room on behalf of a visitor
    pub const SEND_MESSAGE: &str = "sendMessageLivechat";
}

/// Subscription names
pub mod streams {
    /// Room message stream publication
    pub const ROOM_MESSAGES: &str = "stream-room-messages";
    /// Pseudo-room delivering every message visible to the logged-in user
    pub const MY_MESSAGES: &str = "__my_messages__";
}

/// Collections carried in `changed` frames
pub mod collections {
    pub const ROOM_MESSAGES: &str = super::streams::ROOM_MESSAGES;
}
