//! Department entity - a backend queue that livechat conversations route to

use serde::{Deserialize, Serialize};

use super::initial_data::null_as_default;

/// Livechat department as listed in the initial configuration snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Department {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub enabled: bool,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub num_agents: u32,
    #[serde(default, deserialize_with = "null_as_default")]
    pub show_on_registration: bool,
}

impl Department {
    /// Check whether this department carries the given name (case-sensitive, exact)
    #[inline]
    pub fn is_named(&self, name: &str) -> bool {
        self.name == name
    }

    /// Check if any agent is attached to the department
    #[inline]
    pub fn has_agents(&self) -> bool {
        self.num_agents > 0
    }
}
