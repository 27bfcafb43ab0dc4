//! Initial livechat configuration snapshot

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use super::Department;

/// Backend livechat settings fetched once at connect time
///
/// Only `departments` drives gateway behavior; everything else is held as
/// read-only passthrough state. The backend leaves unset settings as `null`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InitialData {
    pub enabled: Option<bool>,
    pub title: Option<String>,
    pub color: Option<String>,
    pub registration_form: Option<bool>,
    #[serde(deserialize_with = "null_as_default")]
    pub departments: Vec<Department>,
    pub allow_switching_departments: Option<bool>,
    pub online: Option<bool>,
    pub offline_message: Option<String>,
    pub display_offline_form: Option<bool>,
    pub video_call: Option<bool>,
    pub file_upload: Option<bool>,
    pub conversation_finished_message: Option<String>,
    pub language: Option<String>,
    pub transcript: Option<bool>,
    #[serde(deserialize_with = "null_as_default")]
    pub triggers: Vec<Value>,
    /// Settings the gateway does not interpret
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

/// Read `null` as the type's default
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl InitialData {
    /// Find a department by exact, case-sensitive name
    pub fn find_department(&self, name: &str) -> Option<&Department> {
        self.departments.iter().find(|d| d.is_named(name))
    }
}
