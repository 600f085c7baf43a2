//! Core data models used throughout the synchronizer.
//!
//! These types represent the documents read from disk, the records sent to
//! the search index, and the report persisted after every run.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Metadata recognised in a document's front-matter block.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrontMatter {
    pub slug: Option<String>,
    pub title: Option<String>,
    /// Raw date text; parsed when the record is built.
    pub date: Option<String>,
    pub excerpt: Option<String>,
    pub categories: Vec<String>,
    pub author: Option<String>,
    /// `featuredImage.url`, falling back to `media.url`.
    pub image: Option<String>,
}

/// One Markdown file as read from the content root.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    pub path: PathBuf,
    /// Name of the enclosing subdirectory for nested documents.
    pub subdirectory: Option<String>,
    pub front_matter: FrontMatter,
    pub body: String,
}

/// The normalized unit stored in the search index.
///
/// Field names on the wire follow the index's existing schema, so
/// `id` is sent as `objectID` and `body` as `content`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexRecord {
    #[serde(rename = "objectID")]
    pub id: String,
    pub title: String,
    #[serde(rename = "content")]
    pub body: String,
    pub excerpt: String,
    pub categories: Vec<String>,
    /// Milliseconds since the Unix epoch.
    #[serde(rename = "date")]
    pub published_at: Option<i64>,
    pub permalink: String,
    #[serde(rename = "fullPath")]
    pub full_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subdirectory: Option<String>,
    #[serde(rename = "featuredImage")]
    pub image: Option<String>,
    pub author: Option<String>,
    #[serde(rename = "timeToRead")]
    pub estimated_reading_minutes: u64,
}

/// Outcome of one synchronizer run, persisted to disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncReport {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub added: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub removed: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl SyncReport {
    /// A report for a run that stopped before touching the index.
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            added: None,
            removed: None,
            total: None,
            error: Some(error.into()),
            timestamp: Utc::now(),
        }
    }
}

/// Statistics about the remote index.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexStats {
    pub number_of_records: u64,
    pub data_size: Option<u64>,
    pub last_build_time_utc: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_uses_index_field_names() {
        let record = IndexRecord {
            id: "mcpx_hello".into(),
            title: "Hello".into(),
            body: "Body".into(),
            excerpt: "Body...".into(),
            categories: vec!["news".into()],
            published_at: Some(1_700_000_000_000),
            permalink: "/mcpx/hello".into(),
            full_path: "/mcpx/hello".into(),
            subdirectory: None,
            image: None,
            author: Some("Ana".into()),
            estimated_reading_minutes: 1,
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["objectID"], "mcpx_hello");
        assert_eq!(json["content"], "Body");
        assert_eq!(json["date"], 1_700_000_000_000i64);
        assert_eq!(json["fullPath"], "/mcpx/hello");
        assert_eq!(json["timeToRead"], 1);
        assert!(json["featuredImage"].is_null());
        assert!(json.get("subdirectory").is_none());
    }

    #[test]
    fn failed_report_omits_counts() {
        let report = SyncReport::failed("no credentials");
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["error"], "no credentials");
        assert!(json.get("added").is_none());
        assert!(json.get("timestamp").is_some());
    }
}
