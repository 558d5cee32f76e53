//! Newtype wrapper for profile identifiers.
//!
//! Serializes as a plain string so stored profiles stay readable.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Deref;

/// Opaque, stable profile identifier. Generated once and never reused.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProfileId(String);

impl ProfileId {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Derive a fresh identifier from the profile name and the creation instant.
    ///
    /// The nanosecond timestamp makes two profiles created with the same name
    /// (e.g. after a delete) receive distinct ids.
    pub fn generate(name: &str, created_at: chrono::DateTime<chrono::Utc>) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(name.as_bytes());
        hasher.update(
            created_at
                .timestamp_nanos_opt()
                .unwrap_or_default()
                .to_le_bytes()
                .as_slice(),
        );
        hasher.update(std::process::id().to_le_bytes().as_slice());
        let hex = hasher.finalize().to_hex();
        Self(hex[..16].to_owned())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl Deref for ProfileId {
    type Target = str;
    fn deref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProfileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ProfileId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for ProfileId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for ProfileId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

impl From<String> for ProfileId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ProfileId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn profile_id_display_and_as_ref() {
        let id = ProfileId::new("abc123");
        assert_eq!(id.to_string(), "abc123");
        assert_eq!(id.as_str(), "abc123");
        assert_eq!(AsRef::<str>::as_ref(&id), "abc123");
    }

    #[test]
    fn profile_id_serializes_as_plain_string() {
        let id = ProfileId::new("deadbeef");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"deadbeef\"");
        let back: ProfileId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn generated_ids_differ_by_instant() {
        let t1 = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let t2 = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 1).unwrap();
        let a = ProfileId::generate("dev", t1);
        let b = ProfileId::generate("dev", t2);
        assert_ne!(a, b);
        assert_eq!(a.len(), 16);
    }

    #[test]
    fn generated_id_is_hex() {
        let id = ProfileId::generate("dev", Utc::now());
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
