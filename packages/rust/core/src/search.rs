//! Document search: full-text index first, record scan as fallback.

use std::collections::BTreeMap;
use std::time::Instant;

use tracing::{debug, instrument, warn};

use intake_notify::Mailer;
use intake_shared::{
    DocumentRecord, IndexedDocument, IntakeError, Result, SearchRequest, SearchResponse,
    SearchResult,
};
use intake_storage::IndexFilter;

use crate::index::{SearchIndexer, SearchQuery};
use crate::service::Service;

/// Filter keys accepted in [`SearchRequest::filters`].
pub const FILTER_KEYS: [&str; 3] = ["contact_id", "document_type", "status"];

/// Map request filters onto index filters, rejecting unknown keys.
pub fn index_filter(filters: &BTreeMap<String, String>) -> Result<IndexFilter> {
    let mut filter = IndexFilter::default();
    for (key, value) in filters {
        let slot = match key.as_str() {
            "contact_id" => &mut filter.contact_id,
            "document_type" => &mut filter.document_type,
            "status" | "processing_status" => &mut filter.status,
            other => {
                return Err(IntakeError::validation(format!(
                    "unknown search filter '{other}' (expected one of: {})",
                    FILTER_KEYS.join(", ")
                )));
            }
        };
        *slot = Some(value.clone());
    }
    Ok(filter)
}

fn from_indexed(doc: IndexedDocument, score: f64) -> SearchResult {
    SearchResult {
        document_id: doc.id,
        filename: doc.filename,
        contact_id: doc.contact_id,
        document_type: doc.document_type,
        text_content: Some(doc.text_content),
        description: None,
        tags: Vec::new(),
        metadata: Some(doc.metadata.analysis),
        upload_timestamp: doc.upload_timestamp,
        processing_status: doc.processing_info.status,
        size: Some(doc.s3_metadata.size),
        score: Some(score),
    }
}

fn from_record(record: DocumentRecord) -> SearchResult {
    SearchResult {
        document_id: record.id,
        filename: record.filename,
        contact_id: record.contact_id,
        document_type: record.document_type,
        text_content: None,
        description: Some(record.description),
        tags: record.tags,
        metadata: None,
        upload_timestamp: record.upload_timestamp,
        processing_status: record.processing_status,
        size: Some(record.size),
        score: None,
    }
}

impl<M: Mailer, I: SearchIndexer> Service<M, I> {
    /// Search processed documents.
    ///
    /// Index errors are logged and treated as no hits, so the record scan
    /// still answers.
    #[instrument(skip_all, fields(query = %request.query, limit = request.limit))]
    pub async fn search_documents(&self, request: &SearchRequest) -> Result<SearchResponse> {
        let start = Instant::now();
        request.validate()?;
        let filter = index_filter(&request.filters)?;

        let query = SearchQuery {
            text: request.query.clone(),
            filter: filter.clone(),
            limit: request.limit,
        };
        let mut results: Vec<SearchResult> = match self.indexer.search(&query).await {
            Ok(hits) => hits
                .hits
                .into_iter()
                .map(|(doc, score)| from_indexed(doc, score))
                .collect(),
            Err(e) => {
                warn!(error = %e, "index search failed");
                Vec::new()
            }
        };

        if results.is_empty() {
            debug!("no index hits, scanning document records");
            results = self
                .storage
                .scan_documents(&request.query, &filter, request.limit)
                .await?
                .into_iter()
                .map(from_record)
                .collect();
        }

        Ok(SearchResponse {
            total_count: results.len(),
            results,
            query: request.query.clone(),
            processing_time: start.elapsed().as_secs_f64(),
        })
    }
}
