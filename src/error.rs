// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Error types for the content ingestion core.
//!
//! This module provides strongly-typed errors for each subsystem, using
//! `thiserror` for ergonomic error definitions and `anyhow` for error
//! propagation at call sites that only need to bubble an error up, not
//! match on it.

use thiserror::Error;

/// Errors surfaced by the embedded store.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("not connected to a database")]
    ConnectionError(String),

    #[error("integrity violation: {0}")]
    IntegrityViolation(String),

    #[error("query error: {0}")]
    QueryError(String),

    #[error("io error: {0}")]
    IoError(String),
}

impl StoreError {
    /// True for violations that should be swallowed as a no-op upsert
    /// rather than surfaced (concurrent duplicate ingestion of the same
    /// content hash, for example).
    pub fn is_duplicate(&self) -> bool {
        matches!(self, Self::IntegrityViolation(_))
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(e, _)
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Self::IntegrityViolation(err.to_string())
            }
            _ => Self::QueryError(err.to_string()),
        }
    }
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        Self::IoError(err.to_string())
    }
}

/// Errors surfaced by the extraction stack (LLM client and rule fallback).
#[derive(Error, Debug)]
pub enum ExtractorError {
    #[error("LLM transport error: {0}")]
    LLMTransportError(String),

    #[error("LLM rate limited: {0}")]
    LLMRateLimited(String),

    #[error("LLM response parse error: {0}")]
    LLMParseError(String),

    #[error("extractor unsupported for this content kind: {0}")]
    ExtractorUnsupported(String),
}

impl ExtractorError {
    /// Whether this error should advance the fallback cascade rather than
    /// being treated as final. `ExtractorUnsupported` is final.
    pub fn triggers_fallback(&self) -> bool {
        !matches!(self, Self::ExtractorUnsupported(_))
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::LLMTransportError(_) | Self::LLMRateLimited(_))
    }
}

impl From<reqwest::Error> for ExtractorError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() || err.is_connect() {
            Self::LLMTransportError(err.to_string())
        } else if err.status().map(|s| s.as_u16() == 429).unwrap_or(false) {
            Self::LLMRateLimited(err.to_string())
        } else {
            Self::LLMTransportError(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ExtractorError {
    fn from(err: serde_json::Error) -> Self {
        Self::LLMParseError(err.to_string())
    }
}

/// Errors surfaced by configuration loading.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("missing required field: {0}")]
    MissingField(String),

    #[error("io error reading config: {0}")]
    IoError(String),
}

impl ConfigError {
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        Self::IoError(err.to_string())
    }
}

/// Validation failures on ingestion input (size, shape).
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("input too large: {size} bytes exceeds limit of {limit} bytes")]
    TooLarge { size: u64, limit: u64 },

    #[error("invalid input: {0}")]
    Invalid(String),
}

/// Entity/content/job lookup failures.
#[derive(Error, Debug)]
pub enum NotFoundError {
    #[error("content not found: {0}")]
    Content(String),

    #[error("entity not found: {0}")]
    Entity(String),

    #[error("job not found: {0}")]
    Job(String),
}

/// The top-level union of errors that can legitimately fail hard: setup,
/// Store connection loss, pool exhaustion. The steady-state ingestion path
/// (`ContentProcessor::process`, `BatchEngine::run`) never returns this —
/// per-item failures are folded into result structs instead.
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("extractor error: {0}")]
    Extractor(#[from] ExtractorError),

    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("not found: {0}")]
    NotFound(#[from] NotFoundError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("resource limit exceeded: {0}")]
    ResourceLimit(String),

    #[error("operation canceled")]
    Cancellation,

    #[error("operation timed out after {0}ms")]
    Timeout(u64),

    #[error("internal error: {0}")]
    Internal(String),
}

/// Result type alias using anyhow for flexible error propagation at call
/// sites that only need to bubble errors up, not match on them.
pub type Result<T> = anyhow::Result<T>;

/// Convert any error type that implements std::error::Error to an anyhow::Error.
pub fn to_anyhow<E: std::error::Error + Send + Sync + 'static>(err: E) -> anyhow::Error {
    anyhow::Error::new(err)
}
