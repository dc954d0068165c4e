// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Data model for the ingestion core: content, chunks, entities, links, and jobs.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Detected content kind. Values outside the closed set fall back to
/// `OctetStream` (binary) or `Text` (everything else).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    Text,
    Markdown,
    Html,
    Json,
    Xml,
    Code,
    Pdf,
    Image,
    Video,
    OctetStream,
}

impl ContentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text/plain",
            Self::Markdown => "text/markdown",
            Self::Html => "text/html",
            Self::Json => "application/json",
            Self::Xml => "application/xml",
            Self::Code => "code",
            Self::Pdf => "application/pdf",
            Self::Image => "image",
            Self::Video => "video",
            Self::OctetStream => "application/octet-stream",
        }
    }

    /// Whether the Chunker applies to this kind (only textual kinds, §4.3).
    pub fn is_chunkable(&self) -> bool {
        matches!(
            self,
            Self::Text | Self::Markdown | Self::Html | Self::Json | Self::Xml
        )
    }

    /// Whether the RuleExtractor has a dispatch path for this kind (§4.4).
    pub fn has_rule_extractor(&self) -> bool {
        !matches!(self, Self::Image | Self::Video)
    }
}

impl std::fmt::Display for ContentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The eight canonical entity types (§4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Person,
    Organization,
    Location,
    Date,
    Product,
    Technology,
    Event,
    Other,
}

impl EntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Person => "person",
            Self::Organization => "organization",
            Self::Location => "location",
            Self::Date => "date",
            Self::Product => "product",
            Self::Technology => "technology",
            Self::Event => "event",
            Self::Other => "other",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "person" => Some(Self::Person),
            "organization" | "org" => Some(Self::Organization),
            "location" => Some(Self::Location),
            "date" => Some(Self::Date),
            "product" => Some(Self::Product),
            "technology" | "tech" => Some(Self::Technology),
            "event" => Some(Self::Event),
            "other" => Some(Self::Other),
            _ => None,
        }
    }

    /// Whether names of this type are title-cased during normalization
    /// (person/organization/location/event); dates and product/technology
    /// names pass through unchanged (§4.5 step 3).
    pub fn is_title_cased(&self) -> bool {
        matches!(
            self,
            Self::Person | Self::Organization | Self::Location | Self::Event
        )
    }
}

impl std::fmt::Display for EntityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Lifecycle status of a ContentRecord.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentStatus {
    Queued,
    Processing,
    Completed,
    Failed,
}

impl ContentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "processing" => Self::Processing,
            "completed" => Self::Completed,
            "failed" => Self::Failed,
            _ => Self::Queued,
        }
    }
}

/// A stored, content-addressed piece of ingested content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentRecord {
    pub id: String,
    pub kind: ContentKind,
    pub filename: Option<String>,
    pub source_uri: Option<String>,
    pub hash: String,
    pub size: u64,
    pub metadata: HashMap<String, serde_json::Value>,
    pub status: ContentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

/// A bounded-size substring of a content body, dense 0-based within its content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkRecord {
    pub content_id: String,
    pub index: u32,
    pub text: String,
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

/// A deduplicated, normalized entity, keyed by (name, type).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityCanonical {
    pub id: String,
    pub name: String,
    pub entity_type: EntityType,
    pub description: Option<String>,
    pub metadata: HashMap<String, serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An edge between a ContentRecord and an EntityCanonical.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentEntityLink {
    pub content_id: String,
    pub content_kind: ContentKind,
    pub entity_id: String,
    pub relevance: f32,
    pub context: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// State machine for a batch job. `pending -> processing -> {completed | failed | canceled}`;
/// reverse transitions are forbidden.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Pending,
    Processing,
    Completed,
    Failed,
    Canceled,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Canceled)
    }
}

/// A durable summary of a batch job's progress and outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingJob {
    pub job_id: String,
    pub kind: JobKind,
    pub state: JobState,
    pub progress: u8,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub items_total: usize,
    pub items_successful: usize,
    pub items_failed: usize,
    pub error_summary: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    Analyze,
    Extract,
    Batch,
}

/// A single unit of work submitted to the BatchEngine.
#[derive(Debug, Clone)]
pub struct BatchItem {
    pub id: String,
    pub body: BatchItemBody,
    pub kind: Option<ContentKind>,
    pub priority: i32,
}

#[derive(Debug, Clone)]
pub enum BatchItemBody {
    Text(String),
    Bytes(Vec<u8>),
    Path(std::path::PathBuf),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_kind_chunkable() {
        assert!(ContentKind::Text.is_chunkable());
        assert!(ContentKind::Json.is_chunkable());
        assert!(!ContentKind::Code.is_chunkable());
        assert!(!ContentKind::Image.is_chunkable());
    }

    #[test]
    fn test_content_kind_rule_extractor() {
        assert!(ContentKind::Text.has_rule_extractor());
        assert!(ContentKind::Code.has_rule_extractor());
        assert!(!ContentKind::Image.has_rule_extractor());
        assert!(!ContentKind::Video.has_rule_extractor());
    }

    #[test]
    fn test_entity_type_roundtrip() {
        for t in [
            EntityType::Person,
            EntityType::Organization,
            EntityType::Location,
            EntityType::Date,
            EntityType::Product,
            EntityType::Technology,
            EntityType::Event,
            EntityType::Other,
        ] {
            let s = t.as_str();
            assert_eq!(EntityType::from_str(s), Some(t));
        }
    }

    #[test]
    fn test_entity_type_title_case_flag() {
        assert!(EntityType::Person.is_title_cased());
        assert!(!EntityType::Date.is_title_cased());
        assert!(!EntityType::Product.is_title_cased());
    }

    #[test]
    fn test_job_state_terminal() {
        assert!(!JobState::Pending.is_terminal());
        assert!(!JobState::Processing.is_terminal());
        assert!(JobState::Completed.is_terminal());
        assert!(JobState::Failed.is_terminal());
        assert!(JobState::Canceled.is_terminal());
    }
}
