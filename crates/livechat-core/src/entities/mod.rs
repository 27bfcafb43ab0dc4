//! Domain entities

mod department;
mod guest;
mod initial_data;
mod message;

pub use department::Department;
pub use guest::{GuestDetails, GuestIdentity, Visitor, VisitorEmail};
pub use initial_data::InitialData;
pub use message::{ejson_date, LivechatMessage, MessageAuthor, MessageMeta, RoomType};
