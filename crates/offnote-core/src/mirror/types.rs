//! Note records held in the local mirror.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A user's note as mirrored from the remote store.
///
/// Field names follow the remote wire format (camelCase). Attributes the
/// mirror does not model are kept in `extra` so a save/load cycle never drops
/// server-side fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    /// Remote-assigned identifier
    pub id: String,

    pub title: String,

    pub content: String,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,

    #[serde(default)]
    pub tags: Vec<String>,

    /// Unmodelled remote attributes, preserved verbatim
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Note {
    /// Create a note stamped with the current time.
    pub fn new(id: impl Into<String>, title: impl Into<String>, content: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            title: title.into(),
            content: content.into(),
            created_at: now,
            updated_at: now,
            tags: Vec::new(),
            extra: serde_json::Map::new(),
        }
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    #[cfg(test)]
    pub fn with_timestamps(mut self, created_at: DateTime<Utc>, updated_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self.updated_at = updated_at;
        self
    }

    /// Replace the content and bump `updated_at`.
    pub fn edit(&mut self, title: impl Into<String>, content: impl Into<String>) {
        self.title = title.into();
        self.content = content.into();
        self.updated_at = Utc::now();
    }
}
