// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! The IPC-shaped envelope exchanged between the BatchEngine main loop and
//! each executor thread over `std::sync::mpsc`. Serde-derived so the same
//! shape could cross a real process boundary without redesign, even though
//! this core only ever moves these in-process.

use serde::{Deserialize, Serialize};

use crate::pipeline::{IngestInput, ProcessOptions};
use crate::store::ContentKind;

/// Main loop → executor.
#[derive(Debug, Clone)]
pub enum ToExecutor {
    Task {
        item_id: String,
        body: IngestInput,
        kind: Option<ContentKind>,
        options: Box<ProcessOptions>,
    },
    Cancel,
    Shutdown,
}

/// Executor → main loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FromExecutor {
    Started { item_id: String },
    Progress { item_id: String, percent: u8 },
    Completed {
        item_id: String,
        content_id: String,
        chunks: usize,
        entity_ids: Vec<String>,
    },
    Failed { item_id: String, error: String },
    Log { item_id: String, message: String },
}

impl FromExecutor {
    pub fn item_id(&self) -> &str {
        match self {
            Self::Started { item_id }
            | Self::Progress { item_id, .. }
            | Self::Completed { item_id, .. }
            | Self::Failed { item_id, .. }
            | Self::Log { item_id, .. } => item_id,
        }
    }
}
