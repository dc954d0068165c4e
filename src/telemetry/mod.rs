// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Telemetry, tracing, and metrics infrastructure.
//!
//! This module provides observability infrastructure for the ingestion core:
//!
//! - **Tracing**: Structured logging with spans for pipeline stage tracking
//! - **Metrics**: Counters and histograms for per-operation performance
//! - **Correlation IDs**: Job tracing across worker threads
//!
//! # Usage
//!
//! Initialize telemetry at process startup:
//!
//! ```rust,ignore
//! use ingest_core::telemetry::{init_telemetry, TelemetryConfig};
//!
//! let config = TelemetryConfig::default();
//! init_telemetry(&config)?;
//! ```
//!
//! Use the `#[instrument]` attribute or manual spans in your code:
//!
//! ```rust,ignore
//! use tracing::instrument;
//!
//! #[instrument(skip(body), fields(kind = %kind, size = body.len()))]
//! fn probe_and_chunk(kind: &str, body: &str) -> usize {
//!     // Operation is automatically traced
//! }
//! ```
//!
//! # Integration guidelines
//!
//! 1. Add `#[instrument]` to public pipeline-stage functions.
//! 2. Record meaningful fields (content kind, sizes, counts, not bearer tokens).
//! 3. Use appropriate log levels (trace for details, info for events, warn/error for issues).
//! 4. Track metrics for operations that should be monitored.

mod correlation;
mod init;
pub mod metrics;
mod spans;

pub use correlation::{CorrelationId, CorrelationIdExt};
pub use init::{init_telemetry, TelemetryConfig, TelemetryGuard};
pub use metrics::{
    Histogram, Metrics, MetricsSnapshot, OperationMetrics, ToolMetrics, GLOBAL_METRICS,
};
pub use spans::{SpanExt, ToolSpan};
