//! Schema creation and index maintenance.
//!
//! The schema is applied idempotently on startup. There is no migration
//! history table; every statement is `IF NOT EXISTS`.

use std::time::Instant;

use sqlx::SqlitePool;
use tracing::info;

use protoq_core::Result;

/// Core relational schema.
const SCHEMA_SQL: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS documents (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        filename TEXT NOT NULL,
        filepath TEXT NOT NULL UNIQUE,
        file_hash TEXT NOT NULL,
        file_type TEXT NOT NULL,
        title TEXT,
        protocol_id TEXT,
        version TEXT,
        sponsor TEXT,
        indication TEXT,
        phase TEXT,
        created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
        updated_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
        metadata JSON
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS sections (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        document_id INTEGER NOT NULL REFERENCES documents(id) ON DELETE CASCADE,
        section_type TEXT NOT NULL,
        section_number TEXT,
        title TEXT,
        parent_section_id INTEGER REFERENCES sections(id),
        level INTEGER DEFAULT 0,
        start_page INTEGER,
        end_page INTEGER,
        raw_text TEXT,
        created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS chunks (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        document_id INTEGER NOT NULL REFERENCES documents(id) ON DELETE CASCADE,
        section_id INTEGER REFERENCES sections(id) ON DELETE SET NULL,
        chunk_index INTEGER NOT NULL,
        chunk_text TEXT NOT NULL,
        chunk_type TEXT DEFAULT 'text',
        page_number INTEGER,
        metadata JSON,
        created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS eligibility_criteria (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        document_id INTEGER NOT NULL REFERENCES documents(id) ON DELETE CASCADE,
        criterion_type TEXT NOT NULL,
        criterion_number INTEGER,
        criterion_text TEXT NOT NULL,
        category TEXT,
        chunk_id INTEGER REFERENCES chunks(id),
        metadata JSON
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS embeddings (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        chunk_id INTEGER NOT NULL UNIQUE REFERENCES chunks(id) ON DELETE CASCADE,
        embedding BLOB NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_documents_protocol ON documents(protocol_id)",
    "CREATE INDEX IF NOT EXISTS idx_documents_hash ON documents(file_hash)",
    "CREATE INDEX IF NOT EXISTS idx_chunks_document ON chunks(document_id)",
    "CREATE INDEX IF NOT EXISTS idx_chunks_section ON chunks(section_id)",
    "CREATE INDEX IF NOT EXISTS idx_sections_document ON sections(document_id)",
    "CREATE INDEX IF NOT EXISTS idx_sections_type ON sections(section_type)",
    "CREATE INDEX IF NOT EXISTS idx_criteria_document ON eligibility_criteria(document_id)",
    "CREATE INDEX IF NOT EXISTS idx_criteria_type ON eligibility_criteria(criterion_type)",
    "CREATE INDEX IF NOT EXISTS idx_embeddings_chunk ON embeddings(chunk_id)",
];

/// FTS5 external-content mirror of `chunks.chunk_text`, kept in sync by
/// triggers so ingest and delete never touch it directly.
const FTS_SCHEMA_SQL: &[&str] = &[
    r#"
    CREATE VIRTUAL TABLE IF NOT EXISTS chunks_fts USING fts5(
        chunk_text,
        content='chunks',
        content_rowid='id',
        tokenize='porter unicode61'
    )
    "#,
    r#"
    CREATE TRIGGER IF NOT EXISTS chunks_ai AFTER INSERT ON chunks BEGIN
        INSERT INTO chunks_fts(rowid, chunk_text) VALUES (new.id, new.chunk_text);
    END
    "#,
    r#"
    CREATE TRIGGER IF NOT EXISTS chunks_ad AFTER DELETE ON chunks BEGIN
        INSERT INTO chunks_fts(chunks_fts, rowid, chunk_text)
        VALUES('delete', old.id, old.chunk_text);
    END
    "#,
    r#"
    CREATE TRIGGER IF NOT EXISTS chunks_au AFTER UPDATE ON chunks BEGIN
        INSERT INTO chunks_fts(chunks_fts, rowid, chunk_text)
        VALUES('delete', old.id, old.chunk_text);
        INSERT INTO chunks_fts(rowid, chunk_text) VALUES (new.id, new.chunk_text);
    END
    "#,
];

/// Apply the full schema (tables, indexes, FTS mirror, triggers).
///
/// Safe to call on every startup.
pub async fn initialize(pool: &SqlitePool) -> Result<()> {
    let start = Instant::now();

    for statement in SCHEMA_SQL.iter().chain(FTS_SCHEMA_SQL) {
        sqlx::query(statement).execute(pool).await?;
    }

    info!(
        subsystem = "database",
        component = "schema",
        op = "initialize",
        duration_ms = start.elapsed().as_millis() as u64,
        "Database schema applied"
    );
    Ok(())
}

/// Rebuild the FTS index from the `chunks` content table.
///
/// Recovery path for an index that has drifted from its content table, for
/// example after a restore from a partial backup.
pub async fn rebuild_fts(pool: &SqlitePool) -> Result<()> {
    let start = Instant::now();

    sqlx::query("INSERT INTO chunks_fts(chunks_fts) VALUES('rebuild')")
        .execute(pool)
        .await?;

    info!(
        subsystem = "database",
        component = "schema",
        op = "rebuild_fts",
        duration_ms = start.elapsed().as_millis() as u64,
        "FTS index rebuilt"
    );
    Ok(())
}
