use crate::types::ProfileId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Mapping from server name to its process definition.
///
/// A `BTreeMap` keeps iteration (and therefore validation and serialization)
/// order stable.
pub type ServerMap = BTreeMap<String, ServerConfig>;

/// One external process the host application spawns.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct ServerConfig {
    #[serde(default)]
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env: Option<BTreeMap<String, String>>,
}

impl ServerConfig {
    /// Keys a server entry can carry. Anything else is not stored in a profile.
    pub const FIELDS: [&'static str; 3] = ["command", "args", "env"];

    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            args: Vec::new(),
            env: None,
        }
    }

    #[must_use]
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env
            .get_or_insert_with(BTreeMap::new)
            .insert(key.into(), value.into());
        self
    }
}

/// A named, user-managed bundle of server configurations.
///
/// `id` and `created_at` are fixed at creation. The switch engine never
/// mutates a stored profile; `last_used` is stamped by the repository when
/// the profile becomes active.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub id: ProfileId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "mcpServers", default)]
    pub servers: ServerMap,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_used: Option<DateTime<Utc>>,
}

impl Profile {
    /// Create a new profile with a freshly generated id.
    pub fn new(name: impl Into<String>, servers: ServerMap) -> Self {
        let name = name.into();
        let created_at = Utc::now();
        Self {
            id: ProfileId::generate(&name, created_at),
            name,
            description: None,
            servers,
            created_at,
            last_used: None,
        }
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Case-insensitive name comparison used for uniqueness checks.
    pub fn name_matches(&self, other: &str) -> bool {
        self.name.to_lowercase() == other.to_lowercase()
    }
}
