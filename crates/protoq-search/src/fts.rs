//! Lexical search over the FTS5 index with BM25 ranking.

use std::time::Instant;

use sqlx::{Row, SqlitePool};
use tracing::debug;

use protoq_core::models::{SearchFilter, SearchHit, SearchSource, SectionType};
use protoq_core::Result;

/// FTS5 characters stripped from user queries before tokenizing.
const FTS_SPECIAL_CHARS: &[char] = &['"', '*', '^', ':', '(', ')', '{', '}', '[', ']'];

/// BM25-ranked full-text search.
#[derive(Debug, Clone)]
pub struct FtsSearch {
    pool: SqlitePool,
}

impl FtsSearch {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Search chunk text, best matches first.
    ///
    /// FTS5's raw BM25 scores are negative (smaller is better); the exposed
    /// score is the negated raw value so larger is better across all search
    /// paths.
    pub async fn search(
        &self,
        query: &str,
        limit: i64,
        filter: &SearchFilter,
    ) -> Result<Vec<SearchHit>> {
        let start = Instant::now();
        let fts_query = build_fts_query(query);

        let mut sql = String::from(
            r#"
            SELECT
                c.id AS chunk_id,
                c.document_id,
                d.protocol_id,
                c.chunk_text,
                s.section_type,
                bm25(chunks_fts) AS score
            FROM chunks_fts
            JOIN chunks c ON c.id = chunks_fts.rowid
            JOIN documents d ON d.id = c.document_id
            LEFT JOIN sections s ON s.id = c.section_id
            WHERE chunks_fts MATCH ?
            "#,
        );
        push_filter_clauses(&mut sql, filter);
        sql.push_str(" ORDER BY bm25(chunks_fts) LIMIT ?");

        let mut q = sqlx::query(&sql).bind(&fts_query);
        q = bind_filter(q, filter);
        q = q.bind(limit);

        let rows = q.fetch_all(&self.pool).await?;
        let hits = rows
            .iter()
            .map(|row| {
                let raw: f64 = row.try_get("score")?;
                let section_type: Option<String> = row.try_get("section_type")?;
                Ok(SearchHit {
                    chunk_id: row.try_get("chunk_id")?,
                    document_id: row.try_get("document_id")?,
                    protocol_id: row.try_get("protocol_id")?,
                    chunk_text: row.try_get("chunk_text")?,
                    section_type: section_type.and_then(|s| s.parse::<SectionType>().ok()),
                    score: -raw,
                    source: SearchSource::Lexical,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        debug!(
            subsystem = "search",
            component = "fts",
            op = "search",
            fts_query = %fts_query,
            hits = hits.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Lexical search complete"
        );
        Ok(hits)
    }
}

/// Translate free text into an FTS5 match expression.
///
/// Tokens become quoted prefix terms joined with OR for recall. Tokens
/// shorter than two characters are dropped. A query with no usable tokens
/// becomes `""`, which matches nothing.
pub fn build_fts_query(query: &str) -> String {
    let cleaned: String = query
        .chars()
        .map(|c| if FTS_SPECIAL_CHARS.contains(&c) { ' ' } else { c })
        .collect();

    let terms: Vec<String> = cleaned
        .split_whitespace()
        .filter(|w| w.chars().count() >= 2)
        .map(|w| format!("\"{w}\"*"))
        .collect();

    if terms.is_empty() {
        return "\"\"".to_string();
    }
    terms.join(" OR ")
}

/// Append `IN (?, ...)` clauses for the active filters, in the same order
/// [`bind_filter`] binds them.
pub(crate) fn push_filter_clauses(sql: &mut String, filter: &SearchFilter) {
    if let Some(protocol_ids) = &filter.protocol_ids {
        sql.push_str(" AND d.protocol_id IN (");
        sql.push_str(&placeholders(protocol_ids.len()));
        sql.push(')');
    }
    if let Some(section_types) = &filter.section_types {
        sql.push_str(" AND s.section_type IN (");
        sql.push_str(&placeholders(section_types.len()));
        sql.push(')');
    }
}

pub(crate) fn bind_filter<'q>(
    mut q: sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>>,
    filter: &'q SearchFilter,
) -> sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>> {
    if let Some(protocol_ids) = &filter.protocol_ids {
        for id in protocol_ids {
            q = q.bind(id);
        }
    }
    if let Some(section_types) = &filter.section_types {
        for st in section_types {
            q = q.bind(st.as_str());
        }
    }
    q
}

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_fts_query_prefix_or() {
        assert_eq!(
            build_fts_query("inclusion criteria"),
            "\"inclusion\"* OR \"criteria\"*"
        );
    }

    #[test]
    fn test_build_fts_query_strips_operators() {
        assert_eq!(build_fts_query("ECOG* (status):2"), "\"ECOG\"* OR \"status\"*");
    }

    #[test]
    fn test_build_fts_query_drops_single_chars() {
        assert_eq!(build_fts_query("a hemoglobin b"), "\"hemoglobin\"*");
    }

    #[test]
    fn test_build_fts_query_drops_single_multibyte_chars() {
        // One character even when several bytes wide.
        assert_eq!(build_fts_query("\u{2265} creatinine \u{b5}"), "\"creatinine\"*");
        assert_eq!(build_fts_query("\u{2265} \u{b5}"), "\"\"");
    }

    #[test]
    fn test_build_fts_query_empty_matches_nothing() {
        assert_eq!(build_fts_query(""), "\"\"");
        assert_eq!(build_fts_query("* ( ) :"), "\"\"");
        assert_eq!(build_fts_query("a b c"), "\"\"");
    }

    #[test]
    fn test_placeholders() {
        assert_eq!(placeholders(1), "?");
        assert_eq!(placeholders(3), "?,?,?");
    }

    #[test]
    fn test_push_filter_clauses_order() {
        let filter = SearchFilter {
            protocol_ids: Some(vec!["P-1".to_string(), "P-2".to_string()]),
            section_types: Some(vec![SectionType::InclusionCriteria]),
        };
        let mut sql = String::new();
        push_filter_clauses(&mut sql, &filter);
        assert_eq!(
            sql,
            " AND d.protocol_id IN (?,?) AND s.section_type IN (?)"
        );
    }
}
