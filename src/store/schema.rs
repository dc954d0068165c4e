// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Embedded schema definitions: tables, FTS5 virtual tables, and the
//! triggers that keep them in sync.

/// Current schema version. Bumped whenever `SCHEMA_DDL` changes shape.
pub const SCHEMA_VERSION: i64 = 1;

pub const SCHEMA_DDL: &str = r#"
CREATE TABLE IF NOT EXISTS content (
    id              TEXT PRIMARY KEY,
    kind            TEXT NOT NULL,
    filename        TEXT,
    source_uri      TEXT,
    hash            TEXT NOT NULL UNIQUE,
    size            INTEGER NOT NULL,
    metadata        TEXT NOT NULL DEFAULT '{}',
    status          TEXT NOT NULL DEFAULT 'queued',
    created_at      TEXT NOT NULL,
    updated_at      TEXT NOT NULL,
    processed_at    TEXT
);

CREATE INDEX IF NOT EXISTS idx_content_hash ON content(hash);
CREATE INDEX IF NOT EXISTS idx_content_status ON content(status);
CREATE INDEX IF NOT EXISTS idx_content_kind ON content(kind);

CREATE TABLE IF NOT EXISTS content_chunks (
    content_id      TEXT NOT NULL REFERENCES content(id) ON DELETE CASCADE,
    chunk_index     INTEGER NOT NULL,
    text            TEXT NOT NULL,
    metadata        TEXT,
    created_at      TEXT NOT NULL,
    PRIMARY KEY (content_id, chunk_index)
);

CREATE TABLE IF NOT EXISTS entities (
    id              TEXT PRIMARY KEY,
    name            TEXT NOT NULL,
    entity_type     TEXT NOT NULL,
    description     TEXT,
    metadata        TEXT NOT NULL DEFAULT '{}',
    created_at      TEXT NOT NULL,
    updated_at      TEXT NOT NULL,
    UNIQUE(name, entity_type)
);

CREATE INDEX IF NOT EXISTS idx_entities_type ON entities(entity_type);

CREATE TABLE IF NOT EXISTS content_entities (
    content_id      TEXT NOT NULL REFERENCES content(id) ON DELETE CASCADE,
    entity_id       TEXT NOT NULL REFERENCES entities(id) ON DELETE CASCADE,
    relevance       REAL NOT NULL,
    context         TEXT,
    created_at      TEXT NOT NULL,
    PRIMARY KEY (content_id, entity_id)
);

CREATE INDEX IF NOT EXISTS idx_content_entities_entity ON content_entities(entity_id);

CREATE TABLE IF NOT EXISTS tags (
    id              TEXT PRIMARY KEY,
    name            TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS content_tags (
    content_id      TEXT NOT NULL REFERENCES content(id) ON DELETE CASCADE,
    tag_id          TEXT NOT NULL REFERENCES tags(id) ON DELETE CASCADE,
    PRIMARY KEY (content_id, tag_id)
);

CREATE TABLE IF NOT EXISTS jobs (
    job_id              TEXT PRIMARY KEY,
    kind                TEXT NOT NULL,
    state               TEXT NOT NULL,
    progress            INTEGER NOT NULL DEFAULT 0,
    started_at          TEXT NOT NULL,
    ended_at            TEXT,
    items_total         INTEGER NOT NULL DEFAULT 0,
    items_successful    INTEGER NOT NULL DEFAULT 0,
    items_failed        INTEGER NOT NULL DEFAULT 0,
    error_summary       TEXT
);

CREATE TABLE IF NOT EXISTS db_metadata (
    key     TEXT PRIMARY KEY,
    value   TEXT NOT NULL
);

CREATE VIRTUAL TABLE IF NOT EXISTS content_fts USING fts5(
    content_id UNINDEXED,
    text,
    content='content_chunks',
    content_rowid='rowid'
);

CREATE TRIGGER IF NOT EXISTS content_chunks_ai AFTER INSERT ON content_chunks BEGIN
    INSERT INTO content_fts(rowid, content_id, text) VALUES (new.rowid, new.content_id, new.text);
END;

CREATE TRIGGER IF NOT EXISTS content_chunks_ad AFTER DELETE ON content_chunks BEGIN
    INSERT INTO content_fts(content_fts, rowid, content_id, text) VALUES ('delete', old.rowid, old.content_id, old.text);
END;

CREATE TRIGGER IF NOT EXISTS content_chunks_au AFTER UPDATE ON content_chunks BEGIN
    INSERT INTO content_fts(content_fts, rowid, content_id, text) VALUES ('delete', old.rowid, old.content_id, old.text);
    INSERT INTO content_fts(rowid, content_id, text) VALUES (new.rowid, new.content_id, new.text);
END;

CREATE VIRTUAL TABLE IF NOT EXISTS entity_fts USING fts5(
    entity_id UNINDEXED,
    name,
    description,
    content='entities',
    content_rowid='rowid'
);

CREATE TRIGGER IF NOT EXISTS entities_ai AFTER INSERT ON entities BEGIN
    INSERT INTO entity_fts(rowid, entity_id, name, description) VALUES (new.rowid, new.id, new.name, new.description);
END;

CREATE TRIGGER IF NOT EXISTS entities_ad AFTER DELETE ON entities BEGIN
    INSERT INTO entity_fts(entity_fts, rowid, entity_id, name, description) VALUES ('delete', old.rowid, old.id, old.name, old.description);
END;

CREATE TRIGGER IF NOT EXISTS entities_au AFTER UPDATE ON entities BEGIN
    INSERT INTO entity_fts(entity_fts, rowid, entity_id, name, description) VALUES ('delete', old.rowid, old.id, old.name, old.description);
    INSERT INTO entity_fts(rowid, entity_id, name, description) VALUES (new.rowid, new.id, new.name, new.description);
END;
"#;
