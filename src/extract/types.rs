// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Shared types for the extraction stack: raw extractor output and the
//! canonicalized result handed to the normalizer.

use serde::{Deserialize, Serialize};

use crate::store::EntityType;

/// An entity mention as produced by either the LLM client or the rule
/// extractor, before normalization. `confidence` is in `[0, 1]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawEntity {
    pub name: String,
    pub entity_type: EntityType,
    pub confidence: f32,
    pub context: Option<String>,
}

/// Which extractor produced a given [`ExtractionResult`], recorded for
/// observability and for tests that assert the fallback cascade engaged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractorSource {
    Llm,
    Rule,
}

/// The output of one extractor pass over one chunk.
#[derive(Debug, Clone)]
pub struct ExtractionResult {
    pub source: ExtractorSource,
    pub entities: Vec<RawEntity>,
}

/// Tunable knobs threaded through to both extractors.
#[derive(Debug, Clone)]
pub struct ExtractOptions {
    pub max_retries: u32,
    pub timeout_secs: u64,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            max_retries: 3,
            timeout_secs: 60,
        }
    }
}
