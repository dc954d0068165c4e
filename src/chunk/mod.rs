// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Chunking: splitting content bodies into bounded, overlapping pieces
//! suitable for entity extraction.

mod strategies;

use serde::{Deserialize, Serialize};

pub use strategies::split;

/// Selects how [`Chunker`] finds split boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkStrategy {
    /// Split on blank-line-delimited paragraphs, falling back to fixed-size
    /// windows for paragraphs that exceed `max_size` on their own.
    Paragraph,
    /// Split on line boundaries, packing as many whole lines as fit.
    Line,
    /// Split on whitespace-delimited tokens, packing as many as fit.
    Token,
    /// Split on raw byte offsets, respecting UTF-8 character boundaries.
    Character,
}

impl std::fmt::Display for ChunkStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Paragraph => "paragraph",
            Self::Line => "line",
            Self::Token => "token",
            Self::Character => "character",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for ChunkStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "paragraph" => Ok(Self::Paragraph),
            "line" => Ok(Self::Line),
            "token" => Ok(Self::Token),
            "character" => Ok(Self::Character),
            other => Err(format!("unknown chunk strategy: {other}")),
        }
    }
}

/// Tunable parameters for [`Chunker`].
#[derive(Debug, Clone, Copy)]
pub struct ChunkerConfig {
    pub max_size: usize,
    pub overlap: usize,
    pub strategy: ChunkStrategy,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            max_size: 4 * 1024 * 1024,
            overlap: 4 * 1024 * 1024 / 10,
            strategy: ChunkStrategy::Paragraph,
        }
    }
}

/// A single chunk of a larger body, along with its byte offset within it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub index: u32,
    pub offset: usize,
    pub text: String,
}

/// Splits a text body into overlapping [`Chunk`]s per a [`ChunkerConfig`].
///
/// Bodies at or under `max_size` are returned as a single chunk unchanged.
pub struct Chunker {
    config: ChunkerConfig,
}

impl Chunker {
    pub fn new(config: ChunkerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ChunkerConfig {
        &self.config
    }

    /// Split `body` into chunks. Never panics on malformed UTF-8 boundaries;
    /// all splits land on `char` boundaries.
    pub fn chunk(&self, body: &str) -> Vec<Chunk> {
        if body.len() <= self.config.max_size {
            if body.is_empty() {
                return Vec::new();
            }
            return vec![Chunk {
                index: 0,
                offset: 0,
                text: body.to_string(),
            }];
        }

        strategies::split(body, &self.config)
            .into_iter()
            .enumerate()
            .map(|(i, (offset, text))| Chunk {
                index: i as u32,
                offset,
                text,
            })
            .collect()
    }
}
