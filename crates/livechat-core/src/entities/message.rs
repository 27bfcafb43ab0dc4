//! Message entities - livechat messages observed on the shared stream

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::value_objects::RoomKey;

/// Room type tag carried in stream metadata
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RoomType {
    #[serde(rename = "c")]
    Channel,
    #[serde(rename = "p")]
    PrivateGroup,
    #[serde(rename = "d")]
    Direct,
    #[serde(rename = "l")]
    Livechat,
    #[serde(other)]
    Unknown,
}

impl RoomType {
    #[inline]
    pub fn is_livechat(self) -> bool {
        matches!(self, Self::Livechat)
    }

    #[inline]
    pub fn is_direct(self) -> bool {
        matches!(self, Self::Direct)
    }
}

/// Metadata delivered alongside every stream message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageMeta {
    pub room_type: RoomType,
    #[serde(default)]
    pub room_participant: bool,
}

impl MessageMeta {
    pub fn new(room_type: RoomType) -> Self {
        Self {
            room_type,
            room_participant: false,
        }
    }
}

/// Message author
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageAuthor {
    #[serde(rename = "_id")]
    pub id: String,
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// A livechat message, either observed on the stream or acknowledged by a send
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LivechatMessage {
    #[serde(rename = "_id")]
    pub id: String,
    pub rid: String,
    #[serde(default)]
    pub msg: String,
    #[serde(with = "ejson_date")]
    pub ts: DateTime<Utc>,
    pub u: MessageAuthor,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "ejson_date::option")]
    pub edited_at: Option<DateTime<Utc>>,
    #[serde(
        rename = "_updatedAt",
        default,
        skip_serializing_if = "Option::is_none",
        with = "ejson_date::option"
    )]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub new_room: bool,
    #[serde(default)]
    pub show_connecting: bool,
}

impl LivechatMessage {
    /// Room key this message belongs to
    pub fn room_key(&self) -> RoomKey {
        RoomKey::new(self.rid.clone())
    }

    /// Id of the user who sent the message
    #[inline]
    pub fn sender_id(&self) -> &str {
        &self.u.id
    }

    /// Username of the user who sent the message
    #[inline]
    pub fn sender_username(&self) -> &str {
        &self.u.username
    }

    #[inline]
    pub fn is_edited(&self) -> bool {
        self.edited_at.is_some()
    }

    /// Time the message last changed (edit time, else creation time)
    pub fn effective_time(&self) -> DateTime<Utc> {
        self.edited_at.unwrap_or(self.ts)
    }
}

/// EJSON date encoding (`{"$date": <millis>}`) for chrono timestamps
pub mod ejson_date {
    use chrono::{DateTime, TimeZone, Utc};
    use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

    #[derive(Serialize, Deserialize)]
    struct EjsonDate {
        #[serde(rename = "$date")]
        date: i64,
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Ejson(EjsonDate),
        Millis(i64),
    }

    fn from_millis<E: de::Error>(millis: i64) -> Result<DateTime<Utc>, E> {
        Utc.timestamp_millis_opt(millis)
            .single()
            .ok_or_else(|| E::custom(format!("timestamp out of range: {millis}")))
    }

    pub fn serialize<S>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        EjsonDate {
            date: value.timestamp_millis(),
        }
        .serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Repr::deserialize(deserializer)? {
            Repr::Ejson(EjsonDate { date }) | Repr::Millis(date) => from_millis(date),
        }
    }

    pub mod option {
        use super::{from_millis, EjsonDate, Repr};
        use chrono::{DateTime, Utc};
        use serde::{Deserialize, Deserializer, Serialize, Serializer};

        pub fn serialize<S>(value: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            value
                .map(|v| EjsonDate {
                    date: v.timestamp_millis(),
                })
                .serialize(serializer)
        }

        pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
        where
            D: Deserializer<'de>,
        {
            match Option::<Repr>::deserialize(deserializer)? {
                Some(Repr::Ejson(EjsonDate { date }) | Repr::Millis(date)) => from_millis(date).map(Some),
                None => Ok(None),
            }
        }
    }
}
