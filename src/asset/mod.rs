//! Asset catalog records.
//!
//! Each asset is one JSON file. Only the fields the maintenance commands
//! touch are typed; everything else rides along in [`AssetRecord::extra`]
//! and is written back untouched.

mod store;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub use store::AssetStore;

/// One catalog entry.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct AssetRecord {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub project_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stars: Option<u64>,
    /// Seconds since the Unix epoch at which the asset was added.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<f64>,
    /// Newest first.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub releases: Vec<ReleaseEntry>,
    /// Newest first, independent of `releases`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub release_tags: Vec<TagEntry>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A published release as stored in an asset record.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct ReleaseEntry {
    #[serde(default)]
    pub zip: String,
    pub tag: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub published_at: String,
    /// Minimum engine version advertised by a badge in the release notes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_defold_version: Option<String>,
}

/// A bare git tag as stored in an asset record.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct TagEntry {
    pub version: String,
    #[serde(default)]
    pub published_at: String,
    #[serde(default)]
    pub zip: String,
}

impl AssetRecord {
    /// Whether the project lives on a host the enrichment commands understand.
    pub fn is_github_project(&self) -> bool {
        self.project_url.contains("github.com")
    }

    /// The `id` field when present.
    pub fn id(&self) -> Option<&str> {
        self.extra.get("id").and_then(Value::as_str)
    }

    /// Replace every occurrence of `from` with `to` inside the record's
    /// free-form string values (images and other pass-through fields).
    ///
    /// Returns true if anything changed.
    pub fn replace_text(&mut self, from: &str, to: &str) -> bool {
        let mut changed = false;
        for value in self.extra.values_mut() {
            changed |= replace_in_value(value, from, to);
        }
        changed
    }
}

fn replace_in_value(value: &mut Value, from: &str, to: &str) -> bool {
    match value {
        Value::String(s) if s.contains(from) => {
            *s = s.replace(from, to);
            true
        }
        Value::Array(items) => items
            .iter_mut()
            .fold(false, |acc, v| replace_in_value(v, from, to) | acc),
        Value::Object(map) => map
            .values_mut()
            .fold(false, |acc, v| replace_in_value(v, from, to) | acc),
        _ => false,
    }
}
