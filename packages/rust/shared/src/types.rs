//! Core domain types for contacts, documents, and the search index.

use std::collections::BTreeMap;

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{IntakeError, Result};

/// Status given to every freshly submitted contact.
pub const CONTACT_STATUS_NEW: &str = "new";

/// Fallback for object metadata fields that were never set.
pub const UNKNOWN: &str = "unknown";

/// Current UTC time as an ISO 8601 string with a `Z` suffix.
pub fn utc_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

// ---------------------------------------------------------------------------
// DocumentId
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper for uploaded document identifiers (time-sortable).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(pub Uuid);

impl DocumentId {
    /// Generate a new time-sortable document identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for DocumentId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for DocumentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for DocumentId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

// ---------------------------------------------------------------------------
// ProcessingStatus
// ---------------------------------------------------------------------------

/// Lifecycle of an uploaded document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessingStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl ProcessingStatus {
    /// All statuses, in lifecycle order.
    pub const ALL: [ProcessingStatus; 4] = [
        Self::Pending,
        Self::Processing,
        Self::Completed,
        Self::Failed,
    ];

    /// Storage representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for ProcessingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ProcessingStatus {
    type Err = IntakeError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| IntakeError::parse(format!("unknown processing status '{s}'")))
    }
}

// ---------------------------------------------------------------------------
// Contacts
// ---------------------------------------------------------------------------

/// A contact-form submission as received from the website.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContactForm {
    pub name: String,
    pub email: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub budget: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, rename = "userAgent", skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    #[serde(default, rename = "pageUrl", skip_serializing_if = "Option::is_none")]
    pub page_url: Option<String>,
}

/// A stored contact submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContactRecord {
    /// `contact_{unix_seconds}_{8 hex chars}`.
    pub id: String,
    pub name: String,
    pub email: String,
    pub company: String,
    pub service: String,
    pub budget: String,
    pub message: String,
    pub timestamp: String,
    pub status: String,
    pub source: String,
    #[serde(rename = "userAgent")]
    pub user_agent: String,
    #[serde(rename = "pageUrl")]
    pub page_url: String,
    pub document_processing_enabled: bool,
    pub search_capabilities: bool,
    /// Derived from the contact's processed documents.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_insights: Option<DocumentInsights>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<String>,
}

/// Result of a contact submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContactResponse {
    pub message: String,
    #[serde(rename = "contactId")]
    pub contact_id: String,
    pub timestamp: String,
    pub visitor_count: i64,
    pub documents_count: usize,
}

/// Confidence in the content analysis of a contact's documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceLevel {
    High,
    Medium,
}

/// Content analysis part of [`DocumentInsights`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentAnalysis {
    pub has_business_content: bool,
    pub complexity_score: f64,
    pub confidence_level: ConfidenceLevel,
}

/// Insights attached to a contact after one of its documents is processed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentInsights {
    pub total_documents: usize,
    pub document_types: Vec<String>,
    pub total_size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_document_upload: Option<String>,
    pub processing_status: ProcessingStatus,
    pub content_analysis: ContentAnalysis,
}

// ---------------------------------------------------------------------------
// Documents
// ---------------------------------------------------------------------------

/// Pattern matches found in a document's text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Entities {
    pub emails: Vec<String>,
    pub phones: Vec<String>,
    pub urls: Vec<String>,
    pub dates: Vec<String>,
    pub amounts: Vec<String>,
}

impl Entities {
    /// Total number of matches across all categories.
    pub fn total(&self) -> usize {
        self.emails.len() + self.phones.len() + self.urls.len() + self.dates.len() + self.amounts.len()
    }
}

/// Text-derived metadata for a single document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub word_count: usize,
    pub character_count: usize,
    pub line_count: usize,
    /// Lower-cased, with leading dot; empty when the filename has none.
    pub file_extension: String,
    pub has_email: bool,
    pub has_phone: bool,
    pub has_url: bool,
    #[serde(default)]
    pub has_business_keywords: bool,
    pub language_detected: String,
    pub keywords: Vec<String>,
    pub entities: Entities,
}

/// Facts about a stored object, as reported by the object store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectFacts {
    pub bucket: String,
    pub key: String,
    pub size: u64,
    pub content_type: String,
    pub last_modified: String,
}

/// Metadata recorded on a document while (and after) it is processed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingMetadata {
    #[serde(flatten)]
    pub analysis: DocumentMetadata,
    pub filename: String,
    pub size: u64,
    pub content_type: String,
    pub last_modified: String,
    pub s3_bucket: String,
    pub s3_key: String,
    pub contact_id: String,
    pub document_type: String,
    pub upload_timestamp: String,
    pub processing_timestamp: String,
    pub processing_status: ProcessingStatus,
}

/// A stored document record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub id: String,
    pub contact_id: String,
    pub filename: String,
    pub size: u64,
    pub content_type: String,
    pub document_type: String,
    pub description: String,
    pub tags: Vec<String>,
    pub upload_timestamp: String,
    pub processing_status: ProcessingStatus,
    pub s3_bucket: String,
    pub s3_key: String,
    pub file_hash: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processing_metadata: Option<ProcessingMetadata>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processing_timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub complexity_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub indexed_timestamp: Option<String>,
    /// Why processing failed, when it did.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processing_error: Option<String>,
}

/// Result of a document upload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentResponse {
    pub document_id: String,
    pub filename: String,
    pub size: u64,
    pub content_type: String,
    pub upload_timestamp: String,
    pub processing_status: ProcessingStatus,
    pub contact_id: String,
    /// `s3://bucket/key`.
    pub s3_path: String,
}

/// Listing entry for a contact's documents.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentSummary {
    pub document_id: String,
    pub filename: String,
    pub document_type: String,
    pub description: String,
    pub tags: Vec<String>,
    pub upload_timestamp: String,
    pub processing_status: ProcessingStatus,
    pub size: u64,
}

impl From<&DocumentRecord> for DocumentSummary {
    fn from(record: &DocumentRecord) -> Self {
        Self {
            document_id: record.id.clone(),
            filename: record.filename.clone(),
            document_type: record.document_type.clone(),
            description: record.description.clone(),
            tags: record.tags.clone(),
            upload_timestamp: record.upload_timestamp.clone(),
            processing_status: record.processing_status,
            size: record.size,
        }
    }
}

/// A contact's documents.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContactDocuments {
    pub contact_id: String,
    pub documents: Vec<DocumentSummary>,
    pub total_count: usize,
}

// ---------------------------------------------------------------------------
// Search index
// ---------------------------------------------------------------------------

/// Processing details stored with an indexed document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingInfo {
    pub status: ProcessingStatus,
    pub timestamp: String,
    pub complexity_score: f64,
}

/// A document as written to the search index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexedDocument {
    /// `{contact_id}_{filename}_{unix_seconds}`.
    pub id: String,
    pub contact_id: String,
    pub filename: String,
    pub document_type: String,
    pub content: String,
    pub text_content: String,
    pub metadata: ProcessingMetadata,
    pub s3_metadata: ObjectFacts,
    pub processing_info: ProcessingInfo,
    pub timestamp: String,
    pub upload_timestamp: String,
    pub processing_timestamp: String,
}

/// Search request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    /// Exact-match filters keyed by field name.
    #[serde(default)]
    pub filters: BTreeMap<String, String>,
    #[serde(default = "default_search_limit")]
    pub limit: u32,
}

/// Upper bound on [`SearchRequest::limit`].
pub const MAX_SEARCH_LIMIT: u32 = 100;

fn default_search_limit() -> u32 {
    10
}

impl SearchRequest {
    /// Build a request with no filters and the default limit.
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            filters: BTreeMap::new(),
            limit: default_search_limit(),
        }
    }

    /// Check query and limit bounds.
    pub fn validate(&self) -> Result<()> {
        if self.query.trim().is_empty() {
            return Err(IntakeError::validation("search query must not be empty"));
        }
        if !(1..=MAX_SEARCH_LIMIT).contains(&self.limit) {
            return Err(IntakeError::validation(format!(
                "limit must be between 1 and {MAX_SEARCH_LIMIT}"
            )));
        }
        Ok(())
    }
}

/// One search hit, from the index or the record-table fallback.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub document_id: String,
    pub filename: String,
    pub contact_id: String,
    pub document_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<DocumentMetadata>,
    pub upload_timestamp: String,
    pub processing_status: ProcessingStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

/// Search response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub results: Vec<SearchResult>,
    pub total_count: usize,
    pub query: String,
    /// Seconds spent answering the query.
    pub processing_time: f64,
}

// ---------------------------------------------------------------------------
// Reporting
// ---------------------------------------------------------------------------

/// Aggregate counts across contacts and documents.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyticsResponse {
    pub total_contacts: u64,
    pub total_documents: u64,
    pub document_types: BTreeMap<String, u64>,
    pub processing_stats: BTreeMap<String, u64>,
    pub timestamp: String,
}

/// Visitor statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsResponse {
    pub visitor_count: i64,
    pub timestamp: String,
    pub enhanced_features: bool,
}

/// Service health.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
    pub services: BTreeMap<String, String>,
    pub version: String,
    pub document_stats: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_id_roundtrip() {
        let id = DocumentId::new();
        let s = id.to_string();
        let parsed: DocumentId = s.parse().expect("parse DocumentId");
        assert_eq!(id, parsed);
    }

    #[test]
    fn processing_status_parses_and_serializes() {
        for status in ProcessingStatus::ALL {
            let parsed: ProcessingStatus = status.as_str().parse().unwrap();
            assert_eq!(parsed, status);
        }
        assert!("done".parse::<ProcessingStatus>().is_err());
        assert_eq!(
            serde_json::to_string(&ProcessingStatus::Completed).unwrap(),
            r#""completed""#
        );
    }

    #[test]
    fn contact_form_uses_camel_case_browser_fields() {
        let json = r#"{
            "name": "Ada",
            "email": "ada@example.com",
            "message": "Hello",
            "userAgent": "Mozilla/5.0",
            "pageUrl": "https://example.com/contact"
        }"#;
        let form: ContactForm = serde_json::from_str(json).expect("deserialize");
        assert_eq!(form.user_agent.as_deref(), Some("Mozilla/5.0"));
        assert_eq!(form.page_url.as_deref(), Some("https://example.com/contact"));
        assert!(form.company.is_none());
    }

    #[test]
    fn processing_metadata_flattens_analysis() {
        let meta = ProcessingMetadata {
            analysis: DocumentMetadata {
                word_count: 3,
                file_extension: ".txt".into(),
                language_detected: "en".into(),
                ..Default::default()
            },
            filename: "notes.txt".into(),
            size: 12,
            content_type: "text/plain".into(),
            last_modified: utc_timestamp(),
            s3_bucket: "bucket".into(),
            s3_key: "documents/c/notes.txt".into(),
            contact_id: "c".into(),
            document_type: "notes".into(),
            upload_timestamp: utc_timestamp(),
            processing_timestamp: utc_timestamp(),
            processing_status: ProcessingStatus::Processing,
        };
        let value = serde_json::to_value(&meta).unwrap();
        assert_eq!(value["word_count"], 3);
        assert_eq!(value["filename"], "notes.txt");
        let back: ProcessingMetadata = serde_json::from_value(value).unwrap();
        assert_eq!(back, meta);
    }

    #[test]
    fn search_request_bounds() {
        assert!(SearchRequest::new("invoice").validate().is_ok());
        assert!(SearchRequest::new("   ").validate().is_err());

        let mut req = SearchRequest::new("invoice");
        req.limit = 0;
        assert!(req.validate().is_err());
        req.limit = MAX_SEARCH_LIMIT + 1;
        assert!(req.validate().is_err());

        let parsed: SearchRequest = serde_json::from_str(r#"{"query":"q"}"#).unwrap();
        assert_eq!(parsed.limit, 10);
        assert!(parsed.filters.is_empty());
    }

    #[test]
    fn entities_total_counts_every_category() {
        let entities = Entities {
            emails: vec!["a@b.co".into()],
            phones: vec!["555-123-4567".into(), "555.123.4567".into()],
            urls: vec![],
            dates: vec!["1/2/2024".into()],
            amounts: vec!["$5".into()],
        };
        assert_eq!(entities.total(), 5);
    }

    #[test]
    fn timestamp_has_zulu_suffix() {
        assert!(utc_timestamp().ends_with('Z'));
    }
}
