//! SQL migration definitions for the Newsreel database.
//!
//! Migrations are applied in order on database open. Each migration has a
//! version number and a set of SQL statements executed within a transaction.

/// A database migration with a version and SQL statements.
pub(crate) struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub sql: &'static str,
}

/// All migrations, in ascending version order.
pub(crate) fn all_migrations() -> Vec<Migration> {
    vec![Migration {
        version: 1,
        description: "Initial schema: stories, embeddings, runs",
        sql: r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_migrations (
    version   INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Finished stories, one row per lead that reached the store stage
CREATE TABLE IF NOT EXISTS stories (
    id               TEXT PRIMARY KEY,
    lead_id          TEXT NOT NULL UNIQUE,
    headline         TEXT,
    text             TEXT NOT NULL,
    script           TEXT NOT NULL,
    research_notes   TEXT,
    audio_url        TEXT,
    audio_size_bytes INTEGER,
    anchor           TEXT,
    source           TEXT NOT NULL,
    category         TEXT,
    content_hash     TEXT NOT NULL,
    created_at       TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_stories_created_at ON stories(created_at);
CREATE INDEX IF NOT EXISTS idx_stories_content_hash ON stories(content_hash);

-- Similarity-index embeddings, one row per unique lead ever indexed
CREATE TABLE IF NOT EXISTS embeddings (
    lead_id     TEXT PRIMARY KEY,
    vector      BLOB NOT NULL,
    inserted_at TEXT NOT NULL
);

-- Run report history
CREATE TABLE IF NOT EXISTS runs (
    id          TEXT PRIMARY KEY,
    outcome     TEXT NOT NULL,
    report_json TEXT NOT NULL,
    created_at  TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_runs_created_at ON runs(created_at);

INSERT INTO schema_migrations (version) VALUES (1);
"#,
    }]
}
