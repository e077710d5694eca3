//! Document repository: ingest, lookup, listing, deletion.

use std::str::FromStr;
use std::time::Instant;

use sha2::{Digest, Sha256};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::info;

use protoq_core::models::{
    ChunkKind, ChunkRecord, Document, DocumentSummary, ParsedDocument, Section, SectionType,
};
use protoq_core::{encode_embedding, Error, Result};

/// Content hash in the stored `sha256:<hex>` form.
pub fn hash_content(content: &[u8]) -> String {
    let digest = Sha256::digest(content);
    format!("sha256:{}", hex::encode(digest))
}

/// Repository for protocol documents and everything they own.
#[derive(Debug, Clone)]
pub struct DocumentRepository {
    pool: SqlitePool,
    expected_dimension: Option<usize>,
}

impl DocumentRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            expected_dimension: None,
        }
    }

    /// Enforce a fixed embedding dimension on ingest.
    pub fn with_expected_dimension(mut self, dimension: usize) -> Self {
        self.expected_dimension = Some(dimension);
        self
    }

    /// Ingest a parsed document with its chunks and embeddings in one
    /// transaction.
    ///
    /// A document is identified by its resolved filepath. Re-ingesting an
    /// already indexed path fails unless `force` is set, in which case the
    /// existing document and all rows it owns are deleted first.
    ///
    /// `embeddings` must be parallel to `chunks`.
    pub async fn ingest(
        &self,
        doc: &ParsedDocument,
        chunks: &[ChunkRecord],
        embeddings: &[Vec<f32>],
        force: bool,
    ) -> Result<i64> {
        if chunks.len() != embeddings.len() {
            return Err(Error::InvalidInput(format!(
                "{} chunks but {} embeddings",
                chunks.len(),
                embeddings.len()
            )));
        }
        if let Some(dimension) = self.expected_dimension {
            if let Some(bad) = embeddings.iter().find(|e| e.len() != dimension) {
                return Err(Error::InvalidInput(format!(
                    "embedding dimension {} does not match configured {}",
                    bad.len(),
                    dimension
                )));
            }
        }

        let start = Instant::now();

        if let Some(existing) = self.find_by_path(&doc.filepath).await? {
            if !force {
                return Err(Error::InvalidInput(format!(
                    "document already indexed as id {} (use force to re-ingest): {}",
                    existing.id, doc.filepath
                )));
            }
            self.delete(existing.id).await?;
        }

        let file_hash = hash_content(doc.full_text().as_bytes());
        let metadata_json = match &doc.metadata {
            Some(value) => serde_json::to_string(value)?,
            None => "{}".to_string(),
        };

        let mut tx = self.pool.begin().await?;

        let document_id: i64 = sqlx::query(
            r#"
            INSERT INTO documents (filename, filepath, file_hash, file_type,
                                   title, protocol_id, version, sponsor,
                                   indication, phase, metadata)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&doc.filename)
        .bind(&doc.filepath)
        .bind(&file_hash)
        .bind(&doc.file_type)
        .bind(&doc.title)
        .bind(&doc.protocol_id)
        .bind(&doc.version)
        .bind(&doc.sponsor)
        .bind(&doc.indication)
        .bind(&doc.phase)
        .bind(&metadata_json)
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

        // Section rowids keyed by position in the parsed document, so chunk
        // records can be re-linked below.
        let mut section_ids = Vec::with_capacity(doc.sections.len());
        for section in &doc.sections {
            let section_type = section.section_type.unwrap_or(SectionType::Other);
            let section_id: i64 = sqlx::query(
                r#"
                INSERT INTO sections (document_id, section_type, section_number,
                                      title, level, start_page, end_page, raw_text)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(document_id)
            .bind(section_type.as_str())
            .bind(&section.section_number)
            .bind(&section.title)
            .bind(section.level)
            .bind(section.start_page)
            .bind(section.end_page)
            .bind(&section.raw_text)
            .execute(&mut *tx)
            .await?
            .last_insert_rowid();
            section_ids.push(section_id);
        }

        let mut criteria_count = 0u64;
        for (chunk_index, (chunk, embedding)) in chunks.iter().zip(embeddings).enumerate() {
            let section_id = chunk.section_index.and_then(|i| section_ids.get(i)).copied();

            let chunk_id: i64 = sqlx::query(
                r#"
                INSERT INTO chunks (document_id, section_id, chunk_index,
                                    chunk_text, chunk_type, page_number)
                VALUES (?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(document_id)
            .bind(section_id)
            .bind(chunk_index as i64)
            .bind(&chunk.chunk_text)
            .bind(chunk.chunk_kind.as_str())
            .bind(chunk.page_number)
            .execute(&mut *tx)
            .await?
            .last_insert_rowid();

            sqlx::query("INSERT INTO embeddings (chunk_id, embedding) VALUES (?, ?)")
                .bind(chunk_id)
                .bind(encode_embedding(embedding))
                .execute(&mut *tx)
                .await?;

            if chunk.chunk_kind == ChunkKind::Criterion {
                let criterion_type = chunk.criterion_type.ok_or_else(|| {
                    Error::InvalidInput("criterion chunk without criterion_type".to_string())
                })?;
                sqlx::query(
                    r#"
                    INSERT INTO eligibility_criteria
                        (document_id, criterion_type, criterion_number,
                         criterion_text, category, chunk_id)
                    VALUES (?, ?, ?, ?, ?, ?)
                    "#,
                )
                .bind(document_id)
                .bind(criterion_type.as_str())
                .bind(chunk.criterion_number)
                .bind(&chunk.chunk_text)
                .bind(chunk.category.map(|c| c.as_str()))
                .bind(chunk_id)
                .execute(&mut *tx)
                .await?;
                criteria_count += 1;
            }
        }

        tx.commit().await?;

        info!(
            subsystem = "database",
            component = "documents",
            op = "ingest",
            document_id = document_id,
            filepath = %doc.filepath,
            chunks = chunks.len(),
            criteria = criteria_count,
            duration_ms = start.elapsed().as_millis() as u64,
            "Document ingested"
        );
        Ok(document_id)
    }

    pub async fn find_by_id(&self, id: i64) -> Result<Option<Document>> {
        let row = sqlx::query("SELECT * FROM documents WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| map_document(&r)).transpose()
    }

    pub async fn find_by_path(&self, filepath: &str) -> Result<Option<Document>> {
        let row = sqlx::query("SELECT * FROM documents WHERE filepath = ?")
            .bind(filepath)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| map_document(&r)).transpose()
    }

    pub async fn find_by_protocol_id(&self, protocol_id: &str) -> Result<Option<Document>> {
        let row = sqlx::query("SELECT * FROM documents WHERE protocol_id = ?")
            .bind(protocol_id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| map_document(&r)).transpose()
    }

    /// Like [`find_by_protocol_id`](Self::find_by_protocol_id) but an absent
    /// protocol is an error, for callers that require the document to exist.
    pub async fn get_by_protocol_id(&self, protocol_id: &str) -> Result<Document> {
        self.find_by_protocol_id(protocol_id)
            .await?
            .ok_or_else(|| Error::ProtocolNotFound(protocol_id.to_string()))
    }

    /// All documents, newest first, with their chunk and criteria counts.
    pub async fn list(&self) -> Result<Vec<DocumentSummary>> {
        let rows = sqlx::query(
            r#"
            SELECT d.*,
                (SELECT COUNT(*) FROM chunks WHERE document_id = d.id) AS chunk_count,
                (SELECT COUNT(*) FROM eligibility_criteria WHERE document_id = d.id) AS criteria_count
            FROM documents d
            ORDER BY d.created_at DESC, d.id DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(DocumentSummary {
                    document: map_document(row)?,
                    chunk_count: row.try_get("chunk_count")?,
                    criteria_count: row.try_get("criteria_count")?,
                })
            })
            .collect()
    }

    /// Sections of a document in insertion order.
    pub async fn sections(&self, document_id: i64) -> Result<Vec<Section>> {
        let rows = sqlx::query("SELECT * FROM sections WHERE document_id = ? ORDER BY id")
            .bind(document_id)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(map_section).collect()
    }

    /// Delete a document; sections, chunks, embeddings, and criteria follow
    /// via cascade. Returns whether a row was deleted.
    pub async fn delete(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM documents WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        let deleted = result.rows_affected() > 0;

        if deleted {
            info!(
                subsystem = "database",
                component = "documents",
                op = "delete",
                document_id = id,
                "Document deleted"
            );
        }
        Ok(deleted)
    }
}

fn map_document(row: &SqliteRow) -> Result<Document> {
    let metadata: Option<String> = row.try_get("metadata")?;
    Ok(Document {
        id: row.try_get("id")?,
        filename: row.try_get("filename")?,
        filepath: row.try_get("filepath")?,
        file_hash: row.try_get("file_hash")?,
        file_type: row.try_get("file_type")?,
        title: row.try_get("title")?,
        protocol_id: row.try_get("protocol_id")?,
        version: row.try_get("version")?,
        sponsor: row.try_get("sponsor")?,
        indication: row.try_get("indication")?,
        phase: row.try_get("phase")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        metadata: metadata
            .as_deref()
            .map(serde_json::from_str)
            .transpose()?,
    })
}

fn map_section(row: &SqliteRow) -> Result<Section> {
    let section_type: String = row.try_get("section_type")?;
    Ok(Section {
        id: row.try_get("id")?,
        document_id: row.try_get("document_id")?,
        section_type: SectionType::from_str(&section_type).map_err(Error::Serialization)?,
        section_number: row.try_get("section_number")?,
        title: row.try_get("title")?,
        level: row.try_get("level")?,
        start_page: row.try_get("start_page")?,
        end_page: row.try_get("end_page")?,
        raw_text: row.try_get::<Option<String>, _>("raw_text")?.unwrap_or_default(),
    })
}
