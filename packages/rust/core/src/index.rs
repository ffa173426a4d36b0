//! Search indexer seam and its libSQL FTS5 implementation.

use std::future::Future;
use std::sync::Arc;

use intake_shared::{IndexedDocument, Result};
use intake_storage::{IndexFilter, IndexStats, Storage};

/// A text query against the document index.
#[derive(Debug, Clone)]
pub struct SearchQuery {
    pub text: String,
    pub filter: IndexFilter,
    pub limit: u32,
}

/// Matched documents with their relevance, newest first.
#[derive(Debug, Clone, Default)]
pub struct SearchHits {
    pub total: usize,
    pub hits: Vec<(IndexedDocument, f64)>,
}

/// Storage for searchable processed documents.
pub trait SearchIndexer: Send + Sync {
    /// Create the index if missing. Safe to call repeatedly.
    fn ensure_index(&self) -> impl Future<Output = Result<()>> + Send;

    /// Insert or replace a document by its id.
    fn index_document(&self, doc: &IndexedDocument) -> impl Future<Output = Result<()>> + Send;

    fn get_document(&self, id: &str) -> impl Future<Output = Result<Option<IndexedDocument>>> + Send;

    /// Returns `true` if the document existed.
    fn delete_document(&self, id: &str) -> impl Future<Output = Result<bool>> + Send;

    fn search(&self, query: &SearchQuery) -> impl Future<Output = Result<SearchHits>> + Send;

    fn stats(&self) -> impl Future<Output = Result<IndexStats>> + Send;
}

/// Id of an indexed document: `{contact_id}_{filename}_{unix_seconds}`.
pub fn index_document_id(contact_id: &str, filename: &str, unix_seconds: i64) -> String {
    format!("{contact_id}_{filename}_{unix_seconds}")
}

/// [`SearchIndexer`] backed by the FTS5 tables of [`Storage`].
#[derive(Clone)]
pub struct LibsqlIndexer {
    storage: Arc<Storage>,
    index_name: String,
}

impl LibsqlIndexer {
    pub fn new(storage: Arc<Storage>, index_name: impl Into<String>) -> Self {
        Self {
            storage,
            index_name: index_name.into(),
        }
    }

    pub fn index_name(&self) -> &str {
        &self.index_name
    }
}

impl SearchIndexer for LibsqlIndexer {
    async fn ensure_index(&self) -> Result<()> {
        self.storage.ensure_index(&self.index_name).await?;
        Ok(())
    }

    async fn index_document(&self, doc: &IndexedDocument) -> Result<()> {
        self.storage
            .upsert_indexed_document(&self.index_name, doc)
            .await?;
        tracing::debug!(id = %doc.id, index = %self.index_name, "indexed document");
        Ok(())
    }

    async fn get_document(&self, id: &str) -> Result<Option<IndexedDocument>> {
        self.storage.get_indexed_document(id).await
    }

    async fn delete_document(&self, id: &str) -> Result<bool> {
        self.storage.delete_indexed_document(id).await
    }

    async fn search(&self, query: &SearchQuery) -> Result<SearchHits> {
        let hits = self
            .storage
            .search_index(&self.index_name, &query.text, &query.filter, query.limit)
            .await?;
        Ok(SearchHits {
            total: hits.len(),
            hits: hits.into_iter().map(|h| (h.document, h.score)).collect(),
        })
    }

    async fn stats(&self) -> Result<IndexStats> {
        self.storage.index_stats(&self.index_name).await
    }
}
