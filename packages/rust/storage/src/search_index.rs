//! Full-text document index on FTS5.
//!
//! Each named index holds [`IndexedDocument`]s keyed by their index id. The
//! filename, extracted text and keywords are searchable; the full document is
//! kept as JSON alongside.

use chrono::{SecondsFormat, Utc};
use intake_shared::{IndexedDocument, IntakeError, Result};
use libsql::params;
use libsql::params::Params;
use serde::Serialize;

use crate::{Storage, db_err, int, scalar, text};

/// bm25 column weights: filename, text_content, keywords.
const BM25_WEIGHTS: &str = "2.0, 1.0, 1.0";

/// Exact-term restrictions applied on top of the text match.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexFilter {
    pub contact_id: Option<String>,
    pub document_type: Option<String>,
    pub status: Option<String>,
}

/// A matched document with its relevance (higher is better).
#[derive(Debug, Clone)]
pub struct IndexHit {
    pub document: IndexedDocument,
    pub score: f64,
}

/// Size of one named index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexStats {
    pub index_name: String,
    pub document_count: u64,
    /// Approximate stored size in bytes.
    pub size_bytes: u64,
}

/// Turn free text into an FTS5 expression: every alphanumeric run becomes a
/// quoted term, terms are OR-ed. `None` when nothing searchable remains.
pub fn fts_match_expression(query: &str) -> Option<String> {
    let terms: Vec<String> = query
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| format!("\"{t}\""))
        .collect();

    if terms.is_empty() {
        None
    } else {
        Some(terms.join(" OR "))
    }
}

impl Storage {
    /// Create a named index if it does not exist. Returns `true` when created.
    pub async fn ensure_index(&self, name: &str) -> Result<bool> {
        self.check_writable()?;
        let now = Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true);
        let changed = self
            .conn
            .execute(
                "INSERT INTO search_indexes (name, created_at) VALUES (?1, ?2)
                 ON CONFLICT(name) DO NOTHING",
                params![name, now.as_str()],
            )
            .await
            .map_err(db_err)?;
        if changed > 0 {
            tracing::info!(index = name, "created search index");
        }
        Ok(changed > 0)
    }

    /// Whether a named index exists.
    pub async fn index_exists(&self, name: &str) -> Result<bool> {
        let rows = self
            .conn
            .query(
                "SELECT COUNT(*) FROM search_indexes WHERE name = ?1",
                params![name],
            )
            .await
            .map_err(db_err)?;
        Ok(scalar(rows).await? > 0)
    }

    /// Insert or replace a document in a named index.
    pub async fn upsert_indexed_document(&self, index: &str, doc: &IndexedDocument) -> Result<()> {
        self.check_writable()?;
        if !self.index_exists(index).await? {
            return Err(IntakeError::Index(format!("index '{index}' does not exist")));
        }

        let json = serde_json::to_string(doc).map_err(|e| IntakeError::Index(e.to_string()))?;
        let keywords = doc.metadata.analysis.keywords.join(" ");

        self.conn
            .execute(
                "INSERT INTO indexed_documents
                   (id, index_name, contact_id, filename, document_type, status,
                    text_content, keywords, timestamp, document_json)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                 ON CONFLICT(id) DO UPDATE SET
                   index_name = excluded.index_name,
                   contact_id = excluded.contact_id,
                   filename = excluded.filename,
                   document_type = excluded.document_type,
                   status = excluded.status,
                   text_content = excluded.text_content,
                   keywords = excluded.keywords,
                   timestamp = excluded.timestamp,
                   document_json = excluded.document_json",
                params![
                    doc.id.as_str(),
                    index,
                    doc.contact_id.as_str(),
                    doc.filename.as_str(),
                    doc.document_type.as_str(),
                    doc.processing_info.status.as_str(),
                    doc.text_content.as_str(),
                    keywords,
                    doc.timestamp.as_str(),
                    json,
                ],
            )
            .await
            .map_err(|e| IntakeError::Index(e.to_string()))?;
        Ok(())
    }

    /// Fetch an indexed document by its index id.
    pub async fn get_indexed_document(&self, id: &str) -> Result<Option<IndexedDocument>> {
        let mut rows = self
            .conn
            .query(
                "SELECT document_json FROM indexed_documents WHERE id = ?1",
                params![id],
            )
            .await
            .map_err(db_err)?;

        match rows.next().await.map_err(db_err)? {
            Some(row) => Ok(Some(parse_document(&text(&row, 0)?)?)),
            None => Ok(None),
        }
    }

    /// Remove a document from the index. Returns `true` if it existed.
    pub async fn delete_indexed_document(&self, id: &str) -> Result<bool> {
        self.check_writable()?;
        let changed = self
            .conn
            .execute("DELETE FROM indexed_documents WHERE id = ?1", params![id])
            .await
            .map_err(db_err)?;
        Ok(changed > 0)
    }

    /// Full-text search within a named index, newest documents first.
    pub async fn search_index(
        &self,
        index: &str,
        query: &str,
        filter: &IndexFilter,
        limit: u32,
    ) -> Result<Vec<IndexHit>> {
        let Some(expression) = fts_match_expression(query) else {
            return Ok(Vec::new());
        };

        let mut sql = format!(
            "SELECT d.document_json, -bm25(indexed_documents_fts, {BM25_WEIGHTS}) AS score
             FROM indexed_documents_fts
             JOIN indexed_documents d ON d.rowid = indexed_documents_fts.rowid
             WHERE indexed_documents_fts MATCH ?1 AND d.index_name = ?2"
        );
        let mut values: Vec<libsql::Value> = vec![expression.into(), index.to_string().into()];

        for (column, value) in [
            ("contact_id", &filter.contact_id),
            ("document_type", &filter.document_type),
            ("status", &filter.status),
        ] {
            if let Some(value) = value {
                values.push(value.clone().into());
                sql.push_str(&format!(" AND d.{column} = ?{}", values.len()));
            }
        }

        values.push(i64::from(limit).into());
        sql.push_str(&format!(
            " ORDER BY d.timestamp DESC, score DESC LIMIT ?{}",
            values.len()
        ));

        let mut rows = self
            .conn
            .query(&sql, Params::Positional(values))
            .await
            .map_err(|e| IntakeError::Index(e.to_string()))?;

        let mut hits = Vec::new();
        while let Some(row) = rows.next().await.map_err(db_err)? {
            hits.push(IndexHit {
                document: parse_document(&text(&row, 0)?)?,
                score: row.get::<f64>(1).unwrap_or(0.0),
            });
        }
        Ok(hits)
    }

    /// Document count and approximate size of a named index.
    pub async fn index_stats(&self, index: &str) -> Result<IndexStats> {
        let mut rows = self
            .conn
            .query(
                "SELECT COUNT(*), COALESCE(SUM(length(document_json)), 0)
                 FROM indexed_documents WHERE index_name = ?1",
                params![index],
            )
            .await
            .map_err(db_err)?;

        let (document_count, size_bytes) = match rows.next().await.map_err(db_err)? {
            Some(row) => (int(&row, 0)?, int(&row, 1)?),
            None => (0, 0),
        };

        Ok(IndexStats {
            index_name: index.to_string(),
            document_count: document_count.max(0) as u64,
            size_bytes: size_bytes.max(0) as u64,
        })
    }
}

fn parse_document(json: &str) -> Result<IndexedDocument> {
    serde_json::from_str(json).map_err(|e| IntakeError::Index(format!("corrupt index entry: {e}")))
}
