// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! ingest-core - content ingestion pipeline with entity extraction.
//!
//! Detects the kind of an arbitrary input (text, JSON, code, binary),
//! chunks it when large, extracts named entities via an LLM with a
//! rule-based fallback, normalizes and deduplicates the result, and
//! persists everything into an embedded SQLite store with full-text
//! search. Single items go through [`ingest`]; many items go through
//! [`ingest_batch`], which runs a pool of OS-thread executors with
//! adaptive concurrency.
//!
//! # Architecture
//!
//! - [`error`] - error types per subsystem, plus the `IngestError` union
//! - [`config`] - environment-variable-driven configuration
//! - [`telemetry`] - tracing, metrics, and correlation IDs
//! - [`store`] - the embedded SQLite store and its data model
//! - [`probe`] - cheap, local content-kind detection
//! - [`chunk`] - splitting large bodies into overlapping pieces
//! - [`extract`] - LLM-backed entity extraction with a rule-based fallback
//! - [`pipeline`] - `ContentProcessor`, the single-item pipeline
//! - [`pool`] - `WorkerPool`, the executor thread pool
//! - [`resource`] - `ResourceMonitor`, CPU/memory sampling for concurrency
//! - [`batch`] - `BatchEngine`, the batch orchestrator
//!
//! # Example
//!
//! ```rust,ignore
//! use ingest_core::{ingest, IngestOptions};
//! use ingest_core::pipeline::IngestInput;
//! use ingest_core::store::Store;
//!
//! let store = Store::open_in_memory()?;
//! let result = ingest(store, IngestInput::Text("Ada Lovelace wrote the first algorithm.".into()), &IngestOptions::default());
//! assert!(result.success);
//! ```

pub mod batch;
pub mod chunk;
pub mod config;
pub mod error;
pub mod extract;
pub mod pipeline;
pub mod pool;
pub mod probe;
pub mod resource;
pub mod store;
pub mod telemetry;

pub use batch::{BatchEngine, BatchEvent, BatchOptions, BatchResult, ItemOutcome};
pub use config::IngestConfig;
pub use error::{ConfigError, ExtractorError, IngestError, NotFoundError, Result, StoreError, ValidationError};
pub use pipeline::{ContentProcessingResult, ContentProcessor, IngestInput};
pub use pool::{ProcessorFactory, WorkerPool};
pub use store::{BatchItem, ContentKind, EntityType, Store};

use std::path::PathBuf;
use std::sync::Arc;

/// `ingest-core` version, matching `CARGO_PKG_VERSION`.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Options for a single-item call to [`ingest`]. A thin wrapper over
/// [`pipeline::ProcessOptions`] at the crate root for callers that don't
/// need the rest of `pipeline`.
pub type IngestOptions = pipeline::ProcessOptions;

/// Process one item through probe → chunk → extract → normalize →
/// persist, using the rule extractor only (no LLM client). For LLM-backed
/// extraction, construct a [`ContentProcessor`] directly with an
/// [`extract::LlmClient`]; for many items, use [`ingest_batch`].
///
/// Never fails hard: errors are folded into
/// [`ContentProcessingResult::error`].
pub fn ingest(store: Store, input: IngestInput, opts: &IngestOptions) -> ContentProcessingResult {
    let extractor = extract::Extractor::rule_only(extract::ExtractOptions {
        max_retries: 0,
        timeout_secs: opts.extract.timeout_secs,
    });
    let mut processor = ContentProcessor::new(store, extractor);
    processor.process(input, None, opts)
}

/// Run `items` through a [`BatchEngine`] backed by the rule extractor only,
/// with each executor thread opening its own connection to the store at
/// `db_path` (safe under WAL, per `store::Store::open`).
///
/// Never fails hard: per-item failures are folded into the returned
/// [`BatchResult`]'s `item_results`.
pub fn ingest_batch(db_path: impl Into<PathBuf>, items: Vec<BatchItem>, opts: &BatchOptions) -> BatchResult {
    let db_path = db_path.into();
    let timeout_secs = opts.process.extract.timeout_secs;
    let factory: ProcessorFactory<extract::HttpLlmTransport> = Arc::new(move || {
        let store = Store::open(&db_path, "WAL", "INCREMENTAL").expect("failed to open store for executor thread");
        let extractor = extract::Extractor::rule_only(extract::ExtractOptions { max_retries: 0, timeout_secs });
        ContentProcessor::new(store, extractor)
    });
    let mut engine = BatchEngine::new(factory, opts);
    engine.run(items, opts)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_ingest_end_to_end_rule_extraction() {
        let store = Store::open_in_memory().unwrap();
        let result = ingest(
            store,
            IngestInput::Text("Acme Corp was founded on 2020-01-01.".to_string()),
            &IngestOptions::default(),
        );
        assert!(result.success);
        assert!(!result.entity_ids.is_empty());
    }

    #[test]
    fn test_ingest_batch_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("batch.sqlite3");

        let items = vec![
            BatchItem {
                id: "one".to_string(),
                body: store::BatchItemBody::Text("Acme Corp was founded on 2020-01-01.".to_string()),
                kind: None,
                priority: 0,
            },
            BatchItem {
                id: "two".to_string(),
                body: store::BatchItemBody::Text("Beta LLC opened an office.".to_string()),
                kind: None,
                priority: 0,
            },
        ];

        let opts = BatchOptions { dynamic_concurrency: false, ..BatchOptions::with_cores(2) };
        let result = ingest_batch(db_path, items, &opts);
        assert_eq!(result.job.items_total, 2);
        assert_eq!(result.item_results.len(), 2);
    }
}
