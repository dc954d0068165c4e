// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Configuration for the ingestion core.
//!
//! Configuration is flat and environment-variable driven (see each field's
//! doc comment for the variable name and default). Loading, merging, and
//! overlaying configuration files or CLI flags is the concern of whatever
//! external surface embeds this crate; `IngestConfig::from_env` is the only
//! entry point this crate provides.

use std::path::PathBuf;

use crate::chunk::ChunkStrategy;
use crate::error::ConfigError;

/// Typed, validated configuration for the ingestion core.
#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// `MAX_FILE_SIZE` — reject inputs larger than this, in bytes. Default 50 MiB.
    pub max_file_size: u64,
    /// `MAX_CHUNK_SIZE` — Chunker default max chunk size, in bytes. Default 4 MiB.
    pub max_chunk_size: usize,
    /// `CHUNK_OVERLAP` — Chunker default overlap, in bytes. Default 10% of max_chunk_size.
    pub chunk_overlap: usize,
    /// `CHUNK_STRATEGY` — one of paragraph|line|token|character. Default paragraph.
    pub chunk_strategy: ChunkStrategy,
    /// `ENTITY_CONFIDENCE_THRESHOLD` — Normalizer default, in [0,1]. Default 0.5.
    pub entity_confidence_threshold: f32,
    /// `ENTITY_MAX_COUNT` — Normalizer cap per content item. Default 50.
    pub entity_max_count: usize,
    /// `CLAUDE_MAX_RETRIES` — LLMClient retry budget. Default 3.
    pub llm_max_retries: u32,
    /// `CLAUDE_TIMEOUT` — LLMClient per-call timeout, in seconds. Default 60.
    pub llm_timeout_secs: u64,
    /// `DB_JOURNAL_MODE` — Store pragma. Default "WAL".
    pub db_journal_mode: String,
    /// `DB_AUTO_VACUUM` — Store pragma. Default "INCREMENTAL".
    pub db_auto_vacuum: String,
    /// `DEFAULT_DATABASE` — default database file stem (without extension).
    pub default_database: String,
    /// `DB_DIR` — directory holding `<name>.sqlite` files. Default `<home>/databases`.
    pub db_dir: PathBuf,
    /// `TEMP_DIR` — scratch directory for large-file staging. Default `<home>/temp`.
    pub temp_dir: PathBuf,
    /// `LOG_DIR` — directory for log output, when file logging is enabled.
    pub log_dir: PathBuf,
    /// `LOG_LEVEL` — one of debug|info|warning|error. Default "info".
    pub log_level: String,
    /// `LOG_STRUCTURED` — emit JSON logs instead of human-readable. Default false.
    pub log_structured: bool,
    /// `KEEP_TEMP_FILES` — skip cleanup of staged temp files, for debugging. Default false.
    pub keep_temp_files: bool,
}

impl Default for IngestConfig {
    fn default() -> Self {
        let home = std::env::var("HOME").map(PathBuf::from).unwrap_or_else(|_| PathBuf::from("."));
        Self {
            max_file_size: 50 * 1024 * 1024,
            max_chunk_size: 4 * 1024 * 1024,
            chunk_overlap: 4 * 1024 * 1024 / 10,
            chunk_strategy: ChunkStrategy::Paragraph,
            entity_confidence_threshold: 0.5,
            entity_max_count: 50,
            llm_max_retries: 3,
            llm_timeout_secs: 60,
            db_journal_mode: "WAL".to_string(),
            db_auto_vacuum: "INCREMENTAL".to_string(),
            default_database: "content".to_string(),
            db_dir: home.join("databases"),
            temp_dir: home.join("temp"),
            log_dir: home.join("logs"),
            log_level: "info".to_string(),
            log_structured: false,
            keep_temp_files: false,
        }
    }
}

impl IngestConfig {
    /// Build a config from environment variables, falling back to defaults
    /// for anything unset. Fails on a set-but-malformed value rather than
    /// silently ignoring it.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        Ok(Self {
            max_file_size: parse_env("MAX_FILE_SIZE", defaults.max_file_size)?,
            max_chunk_size: parse_env("MAX_CHUNK_SIZE", defaults.max_chunk_size)?,
            chunk_overlap: parse_env("CHUNK_OVERLAP", defaults.chunk_overlap)?,
            chunk_strategy: match std::env::var("CHUNK_STRATEGY") {
                Ok(v) => v
                    .parse()
                    .map_err(|_| ConfigError::invalid("CHUNK_STRATEGY", v))?,
                Err(_) => defaults.chunk_strategy,
            },
            entity_confidence_threshold: parse_env(
                "ENTITY_CONFIDENCE_THRESHOLD",
                defaults.entity_confidence_threshold,
            )?,
            entity_max_count: parse_env("ENTITY_MAX_COUNT", defaults.entity_max_count)?,
            llm_max_retries: parse_env("CLAUDE_MAX_RETRIES", defaults.llm_max_retries)?,
            llm_timeout_secs: parse_env("CLAUDE_TIMEOUT", defaults.llm_timeout_secs)?,
            db_journal_mode: std::env::var("DB_JOURNAL_MODE").unwrap_or(defaults.db_journal_mode),
            db_auto_vacuum: std::env::var("DB_AUTO_VACUUM").unwrap_or(defaults.db_auto_vacuum),
            default_database: std::env::var("DEFAULT_DATABASE").unwrap_or(defaults.default_database),
            db_dir: std::env::var("DB_DIR").map(PathBuf::from).unwrap_or(defaults.db_dir),
            temp_dir: std::env::var("TEMP_DIR").map(PathBuf::from).unwrap_or(defaults.temp_dir),
            log_dir: std::env::var("LOG_DIR").map(PathBuf::from).unwrap_or(defaults.log_dir),
            log_level: std::env::var("LOG_LEVEL").unwrap_or(defaults.log_level),
            log_structured: parse_env("LOG_STRUCTURED", defaults.log_structured)?,
            keep_temp_files: parse_env("KEEP_TEMP_FILES", defaults.keep_temp_files)?,
        })
    }

    /// Resolved path to the default database file.
    pub fn default_database_path(&self) -> PathBuf {
        self.db_dir.join(format!("{}.sqlite", self.default_database))
    }
}

fn parse_env<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
{
    match std::env::var(key) {
        Ok(v) => v.parse().map_err(|_| ConfigError::invalid(key, v)),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = IngestConfig::default();
        assert_eq!(config.max_chunk_size, 4 * 1024 * 1024);
        assert_eq!(config.chunk_strategy, ChunkStrategy::Paragraph);
        assert!((config.entity_confidence_threshold - 0.5).abs() < 0.001);
        assert_eq!(config.entity_max_count, 50);
        assert_eq!(config.llm_max_retries, 3);
    }

    #[test]
    fn test_default_database_path() {
        let config = IngestConfig {
            db_dir: PathBuf::from("/tmp/dbs"),
            default_database: "mydb".to_string(),
            ..IngestConfig::default()
        };
        assert_eq!(config.default_database_path(), PathBuf::from("/tmp/dbs/mydb.sqlite"));
    }

    #[test]
    fn test_parse_env_missing_uses_default() {
        std::env::remove_var("NOT_A_REAL_VAR_FOR_TEST");
        let v: u64 = parse_env("NOT_A_REAL_VAR_FOR_TEST", 42u64).unwrap();
        assert_eq!(v, 42);
    }
}
