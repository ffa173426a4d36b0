//! Contact enrichment from processed documents.

use std::collections::BTreeSet;

use tracing::{info, instrument, warn};

use intake_extract::complexity_score;
use intake_notify::Mailer;
use intake_shared::{
    ConfidenceLevel, ContentAnalysis, DocumentInsights, DocumentRecord, ProcessingMetadata,
    ProcessingStatus, Result, utc_timestamp,
};

use crate::index::SearchIndexer;
use crate::service::Service;

/// Word count above which the analysis is reported with high confidence.
const HIGH_CONFIDENCE_WORDS: usize = 100;

/// Aggregate a contact's documents and the freshly processed one into
/// insights. The processed document is counted once even when it has no
/// stored record.
pub fn build_insights(
    documents: &[DocumentRecord],
    metadata: &ProcessingMetadata,
    status: ProcessingStatus,
) -> DocumentInsights {
    let mut total_documents = documents.len();
    let mut total_size: u64 = documents.iter().map(|d| d.size).sum();
    let mut types: BTreeSet<&str> = documents.iter().map(|d| d.document_type.as_str()).collect();
    let mut last_upload = documents.iter().map(|d| d.upload_timestamp.as_str()).max();

    let recorded = documents
        .iter()
        .any(|d| d.s3_bucket == metadata.s3_bucket && d.s3_key == metadata.s3_key);
    if !recorded {
        total_documents += 1;
        total_size += metadata.size;
        types.insert(metadata.document_type.as_str());
        last_upload = last_upload.max(Some(metadata.upload_timestamp.as_str()));
    }

    let analysis = &metadata.analysis;
    DocumentInsights {
        total_documents,
        document_types: types.into_iter().map(String::from).collect(),
        total_size,
        last_document_upload: last_upload.map(String::from),
        processing_status: status,
        content_analysis: ContentAnalysis {
            has_business_content: analysis.has_business_keywords,
            complexity_score: complexity_score(analysis),
            confidence_level: if analysis.word_count > HIGH_CONFIDENCE_WORDS {
                ConfidenceLevel::High
            } else {
                ConfidenceLevel::Medium
            },
        },
    }
}

impl<M: Mailer, I: SearchIndexer> Service<M, I> {
    /// Recompute and store a contact's document insights.
    ///
    /// Returns `None` when the contact does not exist.
    #[instrument(skip_all, fields(contact_id = %contact_id))]
    pub async fn enrich_contact(
        &self,
        contact_id: &str,
        metadata: &ProcessingMetadata,
        status: ProcessingStatus,
    ) -> Result<Option<DocumentInsights>> {
        if self.storage.get_contact(contact_id).await?.is_none() {
            warn!("contact not found, skipping enrichment");
            return Ok(None);
        }

        let documents = self.storage.list_documents_by_contact(contact_id).await?;
        let insights = build_insights(&documents, metadata, status);

        self.storage
            .set_contact_insights(contact_id, &insights, &utc_timestamp())
            .await?;

        info!(
            total_documents = insights.total_documents,
            total_size = insights.total_size,
            "contact enriched"
        );
        Ok(Some(insights))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use intake_shared::DocumentMetadata;

    fn metadata(key: &str, words: usize) -> ProcessingMetadata {
        ProcessingMetadata {
            analysis: DocumentMetadata {
                word_count: words,
                has_business_keywords: true,
                ..Default::default()
            },
            filename: "plan.txt".into(),
            size: 40,
            content_type: "text/plain".into(),
            last_modified: "2024-05-01T10:00:00.000000Z".into(),
            s3_bucket: "intake-data".into(),
            s3_key: key.into(),
            contact_id: "contact_1_aa".into(),
            document_type: "proposal".into(),
            upload_timestamp: "2024-05-01T10:00:00.000000Z".into(),
            processing_timestamp: "2024-05-01T10:00:05.000000Z".into(),
            processing_status: ProcessingStatus::Processing,
        }
    }

    fn record(key: &str, document_type: &str, size: u64, uploaded: &str) -> DocumentRecord {
        DocumentRecord {
            id: key.into(),
            contact_id: "contact_1_aa".into(),
            filename: "x.txt".into(),
            size,
            content_type: "text/plain".into(),
            document_type: document_type.into(),
            description: String::new(),
            tags: Vec::new(),
            upload_timestamp: uploaded.into(),
            processing_status: ProcessingStatus::Pending,
            s3_bucket: "intake-data".into(),
            s3_key: key.into(),
            file_hash: String::new(),
            processing_metadata: None,
            processing_timestamp: None,
            complexity_score: None,
            indexed_timestamp: None,
            processing_error: None,
        }
    }

    #[test]
    fn aggregates_stored_documents() {
        let docs = vec![
            record("documents/a", "proposal", 100, "2024-05-02T00:00:00.000000Z"),
            record("documents/b", "invoice", 50, "2024-05-01T00:00:00.000000Z"),
            record("documents/c", "proposal", 10, "2024-04-30T00:00:00.000000Z"),
        ];
        let insights = build_insights(&docs, &metadata("documents/a", 20), ProcessingStatus::Completed);

        assert_eq!(insights.total_documents, 3);
        assert_eq!(insights.total_size, 160);
        assert_eq!(insights.document_types, vec!["invoice", "proposal"]);
        assert_eq!(
            insights.last_document_upload.as_deref(),
            Some("2024-05-02T00:00:00.000000Z")
        );
        assert_eq!(insights.processing_status, ProcessingStatus::Completed);
        assert_eq!(insights.content_analysis.confidence_level, ConfidenceLevel::Medium);
        assert!(insights.content_analysis.has_business_content);
    }

    #[test]
    fn counts_unrecorded_document_once() {
        let insights = build_insights(&[], &metadata("documents/x", 150), ProcessingStatus::Completed);
        assert_eq!(insights.total_documents, 1);
        assert_eq!(insights.total_size, 40);
        assert_eq!(insights.document_types, vec!["proposal"]);
        assert_eq!(insights.content_analysis.confidence_level, ConfidenceLevel::High);
    }

    #[test]
    fn confidence_threshold_is_exclusive() {
        let at = build_insights(&[], &metadata("k", 100), ProcessingStatus::Completed);
        assert_eq!(at.content_analysis.confidence_level, ConfidenceLevel::Medium);
        let above = build_insights(&[], &metadata("k", 101), ProcessingStatus::Completed);
        assert_eq!(above.content_analysis.confidence_level, ConfidenceLevel::High);
    }

    #[tokio::test]
    async fn missing_contact_is_skipped() {
        let service = crate::service::test_support::test_service().await;
        let result = service
            .enrich_contact("contact_0_missing", &metadata("k", 5), ProcessingStatus::Completed)
            .await
            .unwrap();
        assert!(result.is_none());
    }
}
