//! Random correlation identifiers
//!
//! Room keys and message ids are 128 bits drawn from the operating system's
//! CSPRNG and rendered as lowercase hex. Collisions are treated as impossible.

use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Write};

/// Number of random bytes behind every generated id
const ID_BYTES: usize = 16;

/// Generate a random unique id, optionally prefixed with its type
///
/// Returns 32 hex characters, or `"{prefix}_{hex}"` when a prefix is given.
pub fn generate_id(prefix: Option<&str>) -> String {
    let mut bytes = [0u8; ID_BYTES];
    OsRng.fill_bytes(&mut bytes);

    let hex = bytes.iter().fold(String::with_capacity(ID_BYTES * 2), |mut out, b| {
        let _ = write!(out, "{b:02x}");
        out
    });

    match prefix {
        Some(prefix) if !prefix.is_empty() => format!("{prefix}_{hex}"),
        _ => hex,
    }
}

/// Gateway-issued handle for a livechat conversation
///
/// The same value is used as the backend room id, so it routes messages in
/// both directions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomKey(String);

impl RoomKey {
    /// Generate a fresh room key
    #[must_use]
    pub fn generate() -> Self {
        Self(generate_id(None))
    }

    /// Wrap an existing room id (e.g. the `rid` of a stream message)
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw id
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Take the raw id
    #[inline]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for RoomKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for RoomKey {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for RoomKey {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl AsRef<str> for RoomKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::borrow::Borrow<str> for RoomKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}
