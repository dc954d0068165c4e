// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! ContentProcessor: the single-item pipeline — probe, chunk, extract,
//! normalize, persist — run by each WorkerPool executor.

use std::path::PathBuf;

use chrono::Utc;
use sha2::{Digest, Sha256};

use crate::chunk::{Chunker, ChunkerConfig};
use crate::extract::{Extractor, ExtractOptions, LlmTransport, NormalizeOptions};
use crate::probe;
use crate::store::{
    ChunkRecord, ContentEntityLink, ContentKind, ContentRecord, ContentStatus, EntityCanonical,
    Store,
};

/// Input to [`ContentProcessor::process`]: either an in-memory body or a
/// path to read/reference, per §4.6 step 2.
#[derive(Debug, Clone)]
pub enum IngestInput {
    Text(String),
    Bytes(Vec<u8>),
    Path(PathBuf),
}

/// Per-item options threaded from [`crate::batch::BatchOptions`] or the
/// single-item `ingest` entry point.
#[derive(Debug, Clone)]
pub struct ProcessOptions {
    pub max_file_size: u64,
    pub extract_entities: bool,
    pub continue_on_error: bool,
    pub chunker: ChunkerConfig,
    pub extract: ExtractOptions,
    pub normalize: NormalizeOptions,
    pub filename: Option<String>,
}

impl Default for ProcessOptions {
    fn default() -> Self {
        Self {
            max_file_size: 50 * 1024 * 1024,
            extract_entities: true,
            continue_on_error: true,
            chunker: ChunkerConfig::default(),
            extract: ExtractOptions::default(),
            normalize: NormalizeOptions::default(),
            filename: None,
        }
    }
}

/// Outcome of processing one item. Never an `Err` — every failure path
/// folds into `success: false` with `error` set, per §4.6/§7.
#[derive(Debug, Clone)]
pub struct ContentProcessingResult {
    pub content_id: String,
    pub kind: ContentKind,
    pub chunks: usize,
    pub success: bool,
    pub error: Option<String>,
    pub entity_ids: Vec<String>,
}

/// Owns one [`Store`] connection and one extractor stack; instantiated once
/// per WorkerPool executor thread and reused across every item it handles.
pub struct ContentProcessor<T: LlmTransport> {
    store: Store,
    extractor: Extractor<T>,
}

impl<T: LlmTransport> ContentProcessor<T> {
    pub fn new(store: Store, extractor: Extractor<T>) -> Self {
        Self { store, extractor }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn process(&mut self, input: IngestInput, kind: Option<ContentKind>, opts: &ProcessOptions) -> ContentProcessingResult {
        let (bytes, path_ref): (Vec<u8>, Option<PathBuf>) = match &input {
            IngestInput::Text(s) => (s.as_bytes().to_vec(), None),
            IngestInput::Bytes(b) => (b.clone(), None),
            IngestInput::Path(p) => match std::fs::read(p) {
                Ok(bytes) => (bytes, Some(p.clone())),
                Err(e) => {
                    return ContentProcessingResult {
                        content_id: String::new(),
                        kind: kind.unwrap_or(ContentKind::OctetStream),
                        chunks: 0,
                        success: false,
                        error: Some(format!("failed to read {}: {e}", p.display())),
                        entity_ids: Vec::new(),
                    };
                }
            },
        };

        if bytes.len() as u64 > opts.max_file_size {
            return ContentProcessingResult {
                content_id: String::new(),
                kind: kind.unwrap_or(ContentKind::OctetStream),
                chunks: 0,
                success: false,
                error: Some(format!(
                    "input of {} bytes exceeds max_file_size of {} bytes",
                    bytes.len(),
                    opts.max_file_size
                )),
                entity_ids: Vec::new(),
            };
        }

        let resolved_kind = match kind {
            Some(k) if k != ContentKind::OctetStream => k,
            _ => probe::probe(&bytes, opts.filename.as_deref()),
        };

        let hash = hex_sha256(&bytes);
        let now = Utc::now();

        let record = ContentRecord {
            id: crate::store::new_id(),
            kind: resolved_kind,
            filename: opts.filename.clone(),
            source_uri: path_ref.as_ref().map(|p| p.display().to_string()),
            hash: hash.clone(),
            size: bytes.len() as u64,
            metadata: std::collections::HashMap::new(),
            status: ContentStatus::Processing,
            created_at: now,
            updated_at: now,
            processed_at: None,
        };

        let stored = match self.store.upsert_content(&record) {
            Ok(r) => r,
            Err(e) => {
                return ContentProcessingResult {
                    content_id: String::new(),
                    kind: resolved_kind,
                    chunks: 0,
                    success: false,
                    error: Some(format!("store error: {e}")),
                    entity_ids: Vec::new(),
                };
            }
        };

        let chunk_texts = if resolved_kind.is_chunkable() {
            match String::from_utf8(bytes.clone()) {
                Ok(text) => {
                    let chunker = Chunker::new(opts.chunker);
                    let chunked = chunker.chunk(&text);
                    if chunked.is_empty() {
                        vec![text]
                    } else {
                        chunked.into_iter().map(|c| c.text).collect()
                    }
                }
                Err(_) => vec![String::from_utf8_lossy(&bytes).to_string()],
            }
        } else {
            vec![String::from_utf8_lossy(&bytes).to_string()]
        };

        let chunk_records: Vec<ChunkRecord> = chunk_texts
            .iter()
            .enumerate()
            .map(|(i, text)| ChunkRecord {
                content_id: stored.id.clone(),
                index: i as u32,
                text: text.clone(),
                metadata: None,
                created_at: now,
            })
            .collect();

        if let Err(e) = self.store.replace_chunks(&stored.id, &chunk_records) {
            let _ = self.store.update_content_status(&stored.id, ContentStatus::Failed, None);
            return ContentProcessingResult {
                content_id: stored.id,
                kind: resolved_kind,
                chunks: 0,
                success: false,
                error: Some(format!("failed to persist chunks: {e}")),
                entity_ids: Vec::new(),
            };
        }

        if !opts.extract_entities {
            let _ = self.store.update_content_status(&stored.id, ContentStatus::Completed, Some(Utc::now()));
            return ContentProcessingResult {
                content_id: stored.id,
                kind: resolved_kind,
                chunks: chunk_records.len(),
                success: true,
                error: None,
                entity_ids: Vec::new(),
            };
        }

        let mut raw_entities = Vec::new();
        let mut extraction_error = None;
        for text in &chunk_texts {
            let result = self.extractor.extract(text, resolved_kind);
            raw_entities.extend(result.entities);
        }
        if raw_entities.is_empty() && !chunk_texts.is_empty() && !opts.continue_on_error {
            extraction_error = None; // empty extraction is a valid outcome, not a failure
        }

        let normalized = crate::extract::normalize(raw_entities, &opts.normalize);

        let link_result = self.store.tx(|txn| {
            let mut entity_ids = Vec::new();
            for entity in &normalized {
                let canonical = EntityCanonical {
                    id: crate::store::new_id(),
                    name: entity.name.clone(),
                    entity_type: entity.entity_type,
                    description: entity.context.clone(),
                    metadata: std::collections::HashMap::new(),
                    created_at: now,
                    updated_at: now,
                };
                txn.execute(
                    "INSERT INTO entities (id, name, entity_type, description, metadata, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
                     ON CONFLICT(name, entity_type) DO UPDATE SET updated_at = ?6",
                    rusqlite::params![
                        canonical.id,
                        canonical.name,
                        canonical.entity_type.as_str(),
                        canonical.description,
                        "{}",
                        canonical.created_at.to_rfc3339(),
                    ],
                )?;
                let entity_id: String = txn.query_row(
                    "SELECT id FROM entities WHERE name = ?1 AND entity_type = ?2",
                    rusqlite::params![canonical.name, canonical.entity_type.as_str()],
                    |row| row.get(0),
                )?;
                txn.execute(
                    "INSERT INTO content_entities (content_id, entity_id, relevance, context, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5)
                     ON CONFLICT(content_id, entity_id) DO UPDATE SET relevance = excluded.relevance",
                    rusqlite::params![
                        stored.id,
                        entity_id,
                        entity.confidence,
                        entity.context,
                        now.to_rfc3339(),
                    ],
                )?;
                entity_ids.push(entity_id);
            }
            Ok(entity_ids)
        });

        match link_result {
            Ok(entity_ids) => {
                let _ = self.store.update_content_status(&stored.id, ContentStatus::Completed, Some(Utc::now()));
                ContentProcessingResult {
                    content_id: stored.id,
                    kind: resolved_kind,
                    chunks: chunk_records.len(),
                    success: true,
                    error: extraction_error,
                    entity_ids,
                }
            }
            Err(e) => {
                let _ = self.store.update_content_status(&stored.id, ContentStatus::Failed, None);
                ContentProcessingResult {
                    content_id: stored.id,
                    kind: resolved_kind,
                    chunks: chunk_records.len(),
                    success: false,
                    error: Some(format!("failed to persist entities: {e}")),
                    entity_ids: Vec::new(),
                }
            }
        }
    }
}

fn hex_sha256(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::llm::MockLlmTransport;

    fn processor() -> ContentProcessor<MockLlmTransport> {
        let store = Store::open_in_memory().unwrap();
        let extractor = Extractor::new(None, ExtractOptions::default());
        ContentProcessor::new(store, extractor)
    }

    #[test]
    fn test_simple_text_single_chunk_rule_extraction() {
        let mut processor = processor();
        let result = processor.process(
            IngestInput::Text("Acme Corp was founded on 2020-01-01.".to_string()),
            None,
            &ProcessOptions::default(),
        );
        assert!(result.success);
        assert_eq!(result.chunks, 1);
        assert!(!result.entity_ids.is_empty());
    }

    #[test]
    fn test_json_payload_kind_detection() {
        let mut processor = processor();
        let result = processor.process(
            IngestInput::Text(r#"{"title": "Quarterly Report"}"#.to_string()),
            None,
            &ProcessOptions::default(),
        );
        assert!(result.success);
        assert_eq!(result.kind, ContentKind::Json);
    }

    #[test]
    fn test_duplicate_ingestion_is_idempotent() {
        let mut processor = processor();
        let text = "Same text, ingested twice.".to_string();
        let first = processor.process(IngestInput::Text(text.clone()), None, &ProcessOptions::default());
        let second = processor.process(IngestInput::Text(text), None, &ProcessOptions::default());
        assert_eq!(first.content_id, second.content_id);
    }

    #[test]
    fn test_large_text_chunking_produces_multiple_chunks() {
        let mut processor = processor();
        let body = "paragraph text here. ".repeat(10_000);
        let mut opts = ProcessOptions::default();
        opts.chunker.max_size = 4096;
        opts.chunker.overlap = 256;
        let result = processor.process(IngestInput::Text(body), None, &opts);
        assert!(result.success);
        assert!(result.chunks > 1);
    }

    #[test]
    fn test_oversized_input_rejected() {
        let mut processor = processor();
        let mut opts = ProcessOptions::default();
        opts.max_file_size = 10;
        let result = processor.process(IngestInput::Text("this is definitely more than 10 bytes".to_string()), None, &opts);
        assert!(!result.success);
        assert!(result.error.is_some());
    }

    #[test]
    fn test_extraction_disabled_yields_no_entities() {
        let mut processor = processor();
        let mut opts = ProcessOptions::default();
        opts.extract_entities = false;
        let result = processor.process(
            IngestInput::Text("Acme Corp was founded on 2020-01-01.".to_string()),
            None,
            &opts,
        );
        assert!(result.success);
        assert!(result.entity_ids.is_empty());
    }
}
