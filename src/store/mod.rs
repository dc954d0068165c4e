// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! The embedded store: a single-file SQLite database holding content,
//! chunks, entities, and their links, with FTS5 full-text search over both
//! chunk text and entity names/descriptions.

pub mod models;
mod schema;

use std::path::Path;
use std::sync::Mutex;
use std::time::Instant;

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use crate::error::StoreError;
#[cfg(feature = "telemetry")]
use crate::telemetry::GLOBAL_METRICS;

pub use models::{
    BatchItem, BatchItemBody, ChunkRecord, ContentEntityLink, ContentKind, ContentRecord,
    ContentStatus, EntityCanonical, EntityType, JobKind, JobState, ProcessingJob,
};

/// A hit from [`Store::search_content`] or [`Store::search_entities`].
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub id: String,
    pub snippet: String,
    pub rank: f64,
}

/// Wraps a single-file SQLite connection behind a mutex. rusqlite's
/// `Connection` is `!Sync`, so a single `Store` can't be shared by reference
/// across threads without one; in practice each WorkerPool executor opens
/// its own `Store` against the same WAL-mode file rather than sharing one,
/// so the mutex here only ever serializes a processor's own chunk/entity
/// writes against its single-item transactions.
pub struct Store {
    conn: Mutex<Connection>,
    path: std::path::PathBuf,
}

impl Store {
    /// Open (creating if absent) the database at `path`, set WAL pragmas,
    /// and install the schema if it is not already present.
    pub fn open(path: impl AsRef<Path>, journal_mode: &str, auto_vacuum: &str) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", journal_mode)?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.pragma_update(None, "auto_vacuum", auto_vacuum)?;
        conn.pragma_update(None, "cache_size", -64000)?;

        let store = Self {
            conn: Mutex::new(conn),
            path: path.to_path_buf(),
        };
        store.install_schema()?;
        Ok(store)
    }

    /// Open an in-memory database, primarily for tests.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        let store = Self {
            conn: Mutex::new(conn),
            path: std::path::PathBuf::from(":memory:"),
        };
        store.install_schema()?;
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Idempotent: checks `sqlite_master` for the `content` table before
    /// running the DDL batch, so re-opening an existing database is a no-op.
    fn install_schema(&self) -> Result<(), StoreError> {
        let conn = self.conn.lock().expect("store mutex poisoned");
        let exists: bool = conn
            .query_row(
                "SELECT 1 FROM sqlite_master WHERE type='table' AND name='content'",
                [],
                |_| Ok(true),
            )
            .optional()?
            .unwrap_or(false);

        if exists {
            return Ok(());
        }

        conn.execute_batch(schema::SCHEMA_DDL)?;
        conn.execute(
            "INSERT OR REPLACE INTO db_metadata (key, value) VALUES ('schema_version', ?1)",
            params![schema::SCHEMA_VERSION.to_string()],
        )?;
        Ok(())
    }

    pub fn schema_version(&self) -> Result<i64, StoreError> {
        let conn = self.conn.lock().expect("store mutex poisoned");
        let v: String = conn.query_row(
            "SELECT value FROM db_metadata WHERE key = 'schema_version'",
            [],
            |row| row.get(0),
        )?;
        Ok(v.parse().unwrap_or(0))
    }

    /// Run `f` inside a serializable transaction. On `Err`, the transaction
    /// is rolled back; on `Ok`, committed.
    pub fn tx<F, T>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&rusqlite::Transaction<'_>) -> Result<T, StoreError>,
    {
        let mut conn = self.conn.lock().expect("store mutex poisoned");
        let txn = conn.transaction()?;
        let result = f(&txn)?;
        txn.commit()?;
        Ok(result)
    }

    /// Insert a content record, or return the existing record with the same
    /// hash unchanged (duplicate ingestion, §8). `ON CONFLICT(hash)` makes
    /// this a single round trip; the upsert is a no-op update so
    /// `last_insert_rowid` stays meaningless and we re-query by hash.
    pub fn upsert_content(&self, record: &ContentRecord) -> Result<ContentRecord, StoreError> {
        let start = Instant::now();
        let result = self.tx(|txn| {
            txn.execute(
                "INSERT INTO content (id, kind, filename, source_uri, hash, size, metadata, status, created_at, updated_at, processed_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9, ?10)
                 ON CONFLICT(hash) DO UPDATE SET updated_at = updated_at",
                params![
                    record.id,
                    record.kind.as_str(),
                    record.filename,
                    record.source_uri,
                    record.hash,
                    record.size as i64,
                    serde_json::to_string(&record.metadata).unwrap_or_else(|_| "{}".to_string()),
                    record.status.as_str(),
                    record.created_at.to_rfc3339(),
                    record.processed_at.map(|t| t.to_rfc3339()),
                ],
            )?;
            row_to_content(txn, &record.hash)
        });
        #[cfg(feature = "telemetry")]
        GLOBAL_METRICS.record_operation("store.upsert_content", start.elapsed());
        #[cfg(not(feature = "telemetry"))]
        let _ = start;
        result
    }

    pub fn get_content(&self, id: &str) -> Result<Option<ContentRecord>, StoreError> {
        let conn = self.conn.lock().expect("store mutex poisoned");
        conn.query_row(CONTENT_SELECT_BY_ID, params![id], map_content_row)
            .optional()
            .map_err(StoreError::from)
    }

    pub fn get_content_by_hash(&self, hash: &str) -> Result<Option<ContentRecord>, StoreError> {
        let conn = self.conn.lock().expect("store mutex poisoned");
        conn.query_row(CONTENT_SELECT_BY_HASH, params![hash], map_content_row)
            .optional()
            .map_err(StoreError::from)
    }

    pub fn update_content_status(
        &self,
        id: &str,
        status: ContentStatus,
        processed_at: Option<chrono::DateTime<Utc>>,
    ) -> Result<(), StoreError> {
        let conn = self.conn.lock().expect("store mutex poisoned");
        conn.execute(
            "UPDATE content SET status = ?1, updated_at = ?2, processed_at = ?3 WHERE id = ?4",
            params![
                status.as_str(),
                Utc::now().to_rfc3339(),
                processed_at.map(|t| t.to_rfc3339()),
                id,
            ],
        )?;
        Ok(())
    }

    pub fn delete_content(&self, id: &str) -> Result<(), StoreError> {
        let conn = self.conn.lock().expect("store mutex poisoned");
        conn.execute("DELETE FROM content WHERE id = ?1", params![id])?;
        Ok(())
    }

    /// Replaces all chunks for `content_id` (delete-then-reinsert, same
    /// idiom as a full re-chunk on re-ingestion).
    pub fn replace_chunks(&self, content_id: &str, chunks: &[ChunkRecord]) -> Result<(), StoreError> {
        self.tx(|txn| {
            txn.execute(
                "DELETE FROM content_chunks WHERE content_id = ?1",
                params![content_id],
            )?;
            let mut stmt = txn.prepare(
                "INSERT INTO content_chunks (content_id, chunk_index, text, metadata, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for chunk in chunks {
                stmt.execute(params![
                    chunk.content_id,
                    chunk.index,
                    chunk.text,
                    chunk.metadata.as_ref().map(|v| v.to_string()),
                    chunk.created_at.to_rfc3339(),
                ])?;
            }
            Ok(())
        })
    }

    pub fn get_chunks(&self, content_id: &str) -> Result<Vec<ChunkRecord>, StoreError> {
        let conn = self.conn.lock().expect("store mutex poisoned");
        let mut stmt = conn.prepare(
            "SELECT content_id, chunk_index, text, metadata, created_at
             FROM content_chunks WHERE content_id = ?1 ORDER BY chunk_index",
        )?;
        let rows = stmt
            .query_map(params![content_id], map_chunk_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Insert an entity, or return the existing row for (name, entity_type)
    /// unchanged.
    pub fn upsert_entity(&self, entity: &EntityCanonical) -> Result<EntityCanonical, StoreError> {
        self.tx(|txn| {
            txn.execute(
                "INSERT INTO entities (id, name, entity_type, description, metadata, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
                 ON CONFLICT(name, entity_type) DO UPDATE SET updated_at = updated_at",
                params![
                    entity.id,
                    entity.name,
                    entity.entity_type.as_str(),
                    entity.description,
                    serde_json::to_string(&entity.metadata).unwrap_or_else(|_| "{}".to_string()),
                    entity.created_at.to_rfc3339(),
                ],
            )?;
            txn.query_row(
                "SELECT id, name, entity_type, description, metadata, created_at, updated_at
                 FROM entities WHERE name = ?1 AND entity_type = ?2",
                params![entity.name, entity.entity_type.as_str()],
                map_entity_row,
            )
            .map_err(StoreError::from)
        })
    }

    pub fn get_entity(&self, id: &str) -> Result<Option<EntityCanonical>, StoreError> {
        let conn = self.conn.lock().expect("store mutex poisoned");
        conn.query_row(
            "SELECT id, name, entity_type, description, metadata, created_at, updated_at
             FROM entities WHERE id = ?1",
            params![id],
            map_entity_row,
        )
        .optional()
        .map_err(StoreError::from)
    }

    pub fn link_entity(&self, link: &ContentEntityLink) -> Result<(), StoreError> {
        let conn = self.conn.lock().expect("store mutex poisoned");
        conn.execute(
            "INSERT INTO content_entities (content_id, entity_id, relevance, context, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(content_id, entity_id) DO UPDATE SET relevance = excluded.relevance, context = excluded.context",
            params![
                link.content_id,
                link.entity_id,
                link.relevance,
                link.context,
                link.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn get_entities_for_content(&self, content_id: &str) -> Result<Vec<EntityCanonical>, StoreError> {
        let conn = self.conn.lock().expect("store mutex poisoned");
        let mut stmt = conn.prepare(
            "SELECT e.id, e.name, e.entity_type, e.description, e.metadata, e.created_at, e.updated_at
             FROM entities e
             JOIN content_entities ce ON ce.entity_id = e.id
             WHERE ce.content_id = ?1
             ORDER BY ce.relevance DESC",
        )?;
        let rows = stmt
            .query_map(params![content_id], map_entity_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn search_content(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>, StoreError> {
        let conn = self.conn.lock().expect("store mutex poisoned");
        let mut stmt = conn.prepare(
            "SELECT content_id, snippet(content_fts, 1, '[', ']', '...', 8), bm25(content_fts)
             FROM content_fts WHERE content_fts MATCH ?1 ORDER BY bm25(content_fts) LIMIT ?2",
        )?;
        let rows = stmt
            .query_map(params![query, limit as i64], |row| {
                Ok(SearchHit {
                    id: row.get(0)?,
                    snippet: row.get(1)?,
                    rank: row.get(2)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn search_entities(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>, StoreError> {
        let conn = self.conn.lock().expect("store mutex poisoned");
        let mut stmt = conn.prepare(
            "SELECT entity_id, snippet(entity_fts, 1, '[', ']', '...', 8), bm25(entity_fts)
             FROM entity_fts WHERE entity_fts MATCH ?1 ORDER BY bm25(entity_fts) LIMIT ?2",
        )?;
        let rows = stmt
            .query_map(params![query, limit as i64], |row| {
                Ok(SearchHit {
                    id: row.get(0)?,
                    snippet: row.get(1)?,
                    rank: row.get(2)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn upsert_job(&self, job: &ProcessingJob) -> Result<(), StoreError> {
        let conn = self.conn.lock().expect("store mutex poisoned");
        conn.execute(
            "INSERT INTO jobs (job_id, kind, state, progress, started_at, ended_at, items_total, items_successful, items_failed, error_summary)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
             ON CONFLICT(job_id) DO UPDATE SET
                state = excluded.state, progress = excluded.progress, ended_at = excluded.ended_at,
                items_total = excluded.items_total, items_successful = excluded.items_successful,
                items_failed = excluded.items_failed, error_summary = excluded.error_summary",
            params![
                job.job_id,
                job_kind_str(job.kind),
                job_state_str(job.state),
                job.progress,
                job.started_at.to_rfc3339(),
                job.ended_at.map(|t| t.to_rfc3339()),
                job.items_total as i64,
                job.items_successful as i64,
                job.items_failed as i64,
                job.error_summary,
            ],
        )?;
        Ok(())
    }

    pub fn get_job(&self, job_id: &str) -> Result<Option<ProcessingJob>, StoreError> {
        let conn = self.conn.lock().expect("store mutex poisoned");
        conn.query_row(
            "SELECT job_id, kind, state, progress, started_at, ended_at, items_total, items_successful, items_failed, error_summary
             FROM jobs WHERE job_id = ?1",
            params![job_id],
            map_job_row,
        )
        .optional()
        .map_err(StoreError::from)
    }

    /// Rebuild the FTS indexes and reclaim free pages. Safe to call
    /// periodically from an idle maintenance hook; not called automatically.
    pub fn vacuum(&self) -> Result<(), StoreError> {
        let conn = self.conn.lock().expect("store mutex poisoned");
        conn.execute_batch(
            "INSERT INTO content_fts(content_fts) VALUES ('rebuild');
             INSERT INTO entity_fts(entity_fts) VALUES ('rebuild');
             ANALYZE;
             PRAGMA incremental_vacuum;",
        )?;
        Ok(())
    }
}

const CONTENT_SELECT_BY_ID: &str = "SELECT id, kind, filename, source_uri, hash, size, metadata, status, created_at, updated_at, processed_at FROM content WHERE id = ?1";
const CONTENT_SELECT_BY_HASH: &str = "SELECT id, kind, filename, source_uri, hash, size, metadata, status, created_at, updated_at, processed_at FROM content WHERE hash = ?1";

fn row_to_content(txn: &rusqlite::Transaction<'_>, hash: &str) -> Result<ContentRecord, StoreError> {
    txn.query_row(CONTENT_SELECT_BY_HASH, params![hash], map_content_row)
        .map_err(StoreError::from)
}

fn map_content_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ContentRecord> {
    let kind_str: String = row.get(1)?;
    let status_str: String = row.get(7)?;
    let metadata_str: String = row.get(6)?;
    let created_at: String = row.get(8)?;
    let updated_at: String = row.get(9)?;
    let processed_at: Option<String> = row.get(10)?;

    Ok(ContentRecord {
        id: row.get(0)?,
        kind: parse_content_kind(&kind_str),
        filename: row.get(2)?,
        source_uri: row.get(3)?,
        hash: row.get(4)?,
        size: row.get::<_, i64>(5)? as u64,
        metadata: serde_json::from_str(&metadata_str).unwrap_or_default(),
        status: ContentStatus::from_str(&status_str),
        created_at: parse_dt(&created_at),
        updated_at: parse_dt(&updated_at),
        processed_at: processed_at.map(|s| parse_dt(&s)),
    })
}

fn map_chunk_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ChunkRecord> {
    let metadata_str: Option<String> = row.get(3)?;
    let created_at: String = row.get(4)?;
    Ok(ChunkRecord {
        content_id: row.get(0)?,
        index: row.get(1)?,
        text: row.get(2)?,
        metadata: metadata_str.and_then(|s| serde_json::from_str(&s).ok()),
        created_at: parse_dt(&created_at),
    })
}

fn map_entity_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<EntityCanonical> {
    let type_str: String = row.get(2)?;
    let metadata_str: String = row.get(4)?;
    let created_at: String = row.get(5)?;
    let updated_at: String = row.get(6)?;
    Ok(EntityCanonical {
        id: row.get(0)?,
        name: row.get(1)?,
        entity_type: EntityType::from_str(&type_str).unwrap_or(EntityType::Other),
        description: row.get(3)?,
        metadata: serde_json::from_str(&metadata_str).unwrap_or_default(),
        created_at: parse_dt(&created_at),
        updated_at: parse_dt(&updated_at),
    })
}

fn map_job_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ProcessingJob> {
    let kind_str: String = row.get(1)?;
    let state_str: String = row.get(2)?;
    let started_at: String = row.get(4)?;
    let ended_at: Option<String> = row.get(5)?;
    Ok(ProcessingJob {
        job_id: row.get(0)?,
        kind: parse_job_kind(&kind_str),
        state: parse_job_state(&state_str),
        progress: row.get(3)?,
        started_at: parse_dt(&started_at),
        ended_at: ended_at.map(|s| parse_dt(&s)),
        items_total: row.get::<_, i64>(6)? as usize,
        items_successful: row.get::<_, i64>(7)? as usize,
        items_failed: row.get::<_, i64>(8)? as usize,
        error_summary: row.get(9)?,
    })
}

fn parse_dt(s: &str) -> chrono::DateTime<Utc> {
    chrono::DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn parse_content_kind(s: &str) -> ContentKind {
    match s {
        "text/markdown" => ContentKind::Markdown,
        "text/html" => ContentKind::Html,
        "application/json" => ContentKind::Json,
        "application/xml" => ContentKind::Xml,
        "code" => ContentKind::Code,
        "application/pdf" => ContentKind::Pdf,
        "image" => ContentKind::Image,
        "video" => ContentKind::Video,
        "application/octet-stream" => ContentKind::OctetStream,
        _ => ContentKind::Text,
    }
}

fn job_kind_str(kind: JobKind) -> &'static str {
    match kind {
        JobKind::Analyze => "analyze",
        JobKind::Extract => "extract",
        JobKind::Batch => "batch",
    }
}

fn parse_job_kind(s: &str) -> JobKind {
    match s {
        "analyze" => JobKind::Analyze,
        "extract" => JobKind::Extract,
        _ => JobKind::Batch,
    }
}

fn job_state_str(state: JobState) -> &'static str {
    match state {
        JobState::Pending => "pending",
        JobState::Processing => "processing",
        JobState::Completed => "completed",
        JobState::Failed => "failed",
        JobState::Canceled => "canceled",
    }
}

fn parse_job_state(s: &str) -> JobState {
    match s {
        "processing" => JobState::Processing,
        "completed" => JobState::Completed,
        "failed" => JobState::Failed,
        "canceled" => JobState::Canceled,
        _ => JobState::Pending,
    }
}

/// Generates a fresh content/entity id. Broken out so tests can assert on
/// format without constructing a full record.
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn sample_content(hash: &str) -> ContentRecord {
        let now = Utc::now();
        ContentRecord {
            id: new_id(),
            kind: ContentKind::Text,
            filename: Some("note.txt".to_string()),
            source_uri: None,
            hash: hash.to_string(),
            size: 42,
            metadata: HashMap::new(),
            status: ContentStatus::Queued,
            created_at: now,
            updated_at: now,
            processed_at: None,
        }
    }

    #[test]
    fn test_open_in_memory_installs_schema() {
        let store = Store::open_in_memory().unwrap();
        assert_eq!(store.schema_version().unwrap(), schema::SCHEMA_VERSION);
    }

    #[test]
    fn test_upsert_content_duplicate_hash_is_noop() {
        let store = Store::open_in_memory().unwrap();
        let record = sample_content("abc123");
        let first = store.upsert_content(&record).unwrap();

        let mut dup = sample_content("abc123");
        dup.id = new_id();
        let second = store.upsert_content(&dup).unwrap();

        assert_eq!(first.id, second.id);
    }

    #[test]
    fn test_get_content_roundtrip() {
        let store = Store::open_in_memory().unwrap();
        let record = sample_content("xyz789");
        let stored = store.upsert_content(&record).unwrap();
        let fetched = store.get_content(&stored.id).unwrap().unwrap();
        assert_eq!(fetched.hash, "xyz789");
        assert_eq!(fetched.kind, ContentKind::Text);
    }

    #[test]
    fn test_replace_chunks_and_search() {
        let store = Store::open_in_memory().unwrap();
        let record = sample_content("chunked-content");
        let stored = store.upsert_content(&record).unwrap();

        let chunks = vec![ChunkRecord {
            content_id: stored.id.clone(),
            index: 0,
            text: "the quick brown fox jumps over the lazy dog".to_string(),
            metadata: None,
            created_at: Utc::now(),
        }];
        store.replace_chunks(&stored.id, &chunks).unwrap();

        let hits = store.search_content("fox", 10).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, stored.id);
    }

    #[test]
    fn test_entity_upsert_dedup_by_name_and_type() {
        let store = Store::open_in_memory().unwrap();
        let now = Utc::now();
        let entity = EntityCanonical {
            id: new_id(),
            name: "Ada Lovelace".to_string(),
            entity_type: EntityType::Person,
            description: None,
            metadata: HashMap::new(),
            created_at: now,
            updated_at: now,
        };
        let first = store.upsert_entity(&entity).unwrap();

        let mut dup = entity.clone();
        dup.id = new_id();
        let second = store.upsert_entity(&dup).unwrap();

        assert_eq!(first.id, second.id);
    }

    #[test]
    fn test_job_upsert_and_fetch() {
        let store = Store::open_in_memory().unwrap();
        let job = ProcessingJob {
            job_id: new_id(),
            kind: JobKind::Batch,
            state: JobState::Pending,
            progress: 0,
            started_at: Utc::now(),
            ended_at: None,
            items_total: 10,
            items_successful: 0,
            items_failed: 0,
            error_summary: None,
        };
        store.upsert_job(&job).unwrap();

        let mut updated = job.clone();
        updated.state = JobState::Completed;
        updated.progress = 100;
        updated.items_successful = 10;
        updated.ended_at = Some(Utc::now());
        store.upsert_job(&updated).unwrap();

        let fetched = store.get_job(&job.job_id).unwrap().unwrap();
        assert_eq!(fetched.state, JobState::Completed);
        assert_eq!(fetched.items_successful, 10);
    }
}
