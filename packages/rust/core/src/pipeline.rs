//! Object processing pipeline: read → extract → index → complete → enrich → notify.

use std::time::Instant;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};
use url::Url;

use intake_extract::{complexity_score, decode_utf8, extract_metadata, extract_text_with};
use intake_notify::{Mailer, ProcessingUpdate};
use intake_shared::{
    DocumentInsights, DocumentRecord, IndexedDocument, IntakeError, ProcessingInfo,
    ProcessingMetadata, ProcessingStatus, Result, UNKNOWN, utc_timestamp,
};

use crate::index::{SearchIndexer, index_document_id};
use crate::service::Service;

/// Result of processing one stored object.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessingOutcome {
    pub bucket: String,
    pub key: String,
    /// Id of the matching document record, when one exists.
    pub document_id: Option<String>,
    pub index_id: String,
    pub contact_id: String,
    pub filename: String,
    pub status: ProcessingStatus,
    pub complexity_score: f64,
    pub insights: Option<DocumentInsights>,
    /// Whether the contact was sent a processing update.
    pub notified: bool,
    pub elapsed_ms: u64,
}

/// Progress callback for reporting batch status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called before each object is processed.
    fn object_started(&self, key: &str, current: usize, total: usize);
    /// Called after each object, successful or not.
    fn object_finished(&self, key: &str, ok: bool);
    /// Called when the batch completes.
    fn done(&self, report: &EventReport);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn object_started(&self, _key: &str, _current: usize, _total: usize) {}
    fn object_finished(&self, _key: &str, _ok: bool) {}
    fn done(&self, _report: &EventReport) {}
}

// ---------------------------------------------------------------------------
// Object-created events
// ---------------------------------------------------------------------------

/// An S3-style notification carrying one or more object records.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ObjectEvent {
    #[serde(rename = "Records", default)]
    pub records: Vec<EventRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRecord {
    #[serde(rename = "eventName", default)]
    pub event_name: String,
    pub s3: EventEntity,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEntity {
    pub bucket: EventBucket,
    pub object: EventObject,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventBucket {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventObject {
    /// URL-encoded, `+` for spaces.
    pub key: String,
    #[serde(default)]
    pub size: Option<u64>,
}

impl EventRecord {
    /// Records without an event name are treated as creations.
    pub fn is_object_created(&self) -> bool {
        self.event_name.is_empty() || self.event_name.starts_with("ObjectCreated")
    }

    /// The object key with URL encoding removed.
    pub fn decoded_key(&self) -> String {
        decode_event_key(&self.s3.object.key)
    }
}

/// Parse an event notification from JSON.
pub fn parse_event(json: &str) -> Result<ObjectEvent> {
    serde_json::from_str(json).map_err(|e| IntakeError::parse(format!("invalid object event: {e}")))
}

/// Undo the form encoding applied to keys in event notifications.
pub fn decode_event_key(raw: &str) -> String {
    url::form_urlencoded::parse(raw.as_bytes())
        .map(|(name, value)| {
            if value.is_empty() {
                name.into_owned()
            } else {
                format!("{name}={value}")
            }
        })
        .collect::<Vec<_>>()
        .join("&")
}

/// Split `s3://bucket/key` into its bucket and key.
pub fn parse_s3_uri(uri: &str) -> Result<(String, String)> {
    let parsed = Url::parse(uri).map_err(|e| IntakeError::parse(format!("invalid object uri '{uri}': {e}")))?;
    if parsed.scheme() != "s3" {
        return Err(IntakeError::parse(format!("expected an s3:// uri, got '{uri}'")));
    }
    let bucket = parsed
        .host_str()
        .filter(|b| !b.is_empty())
        .ok_or_else(|| IntakeError::parse(format!("missing bucket in '{uri}'")))?
        .to_string();

    // Keys keep their literal characters; take them from the raw string.
    let key = uri
        .strip_prefix("s3://")
        .and_then(|rest| rest.split_once('/'))
        .map(|(_, key)| key.to_string())
        .filter(|key| !key.is_empty())
        .ok_or_else(|| IntakeError::parse(format!("missing object key in '{uri}'")))?;

    Ok((bucket, key))
}

/// A record that could not be processed.
#[derive(Debug, Clone, Serialize)]
pub struct RecordFailure {
    pub bucket: String,
    pub key: String,
    pub error: String,
}

/// Summary of an event batch.
#[derive(Debug, Clone, Default, Serialize)]
pub struct EventReport {
    pub processed: Vec<ProcessingOutcome>,
    /// Records that were not object creations.
    pub skipped: usize,
    pub failures: Vec<RecordFailure>,
}

impl EventReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Processing
// ---------------------------------------------------------------------------

/// Last path segment of an object key.
pub fn filename_from_key(key: &str) -> &str {
    key.rsplit('/').next().unwrap_or(key)
}

/// State carried from indexing into the follow-up steps.
struct Indexed {
    outcome: ProcessingOutcome,
    metadata: ProcessingMetadata,
}

impl<M: Mailer, I: SearchIndexer> Service<M, I> {
    /// Process one stored object end to end.
    ///
    /// Failures before the document is marked completed leave its record
    /// `failed` and are returned. Enrichment and notification failures are
    /// logged only.
    #[instrument(skip_all, fields(bucket = %bucket, key = %key))]
    pub async fn process_object(&self, bucket: &str, key: &str) -> Result<ProcessingOutcome> {
        let start = Instant::now();
        let record = self.storage.find_document_by_key(bucket, key).await?;

        let Indexed {
            mut outcome,
            metadata,
        } = match self.index_object(bucket, key, record.as_ref()).await {
            Ok(indexed) => indexed,
            Err(e) => {
                self.record_failure(record.as_ref(), &e).await;
                return Err(e);
            }
        };

        outcome.insights = match self
            .enrich_contact(&metadata.contact_id, &metadata, ProcessingStatus::Completed)
            .await
        {
            Ok(insights) => insights,
            Err(e) => {
                warn!(contact_id = %metadata.contact_id, error = %e, "contact enrichment failed");
                None
            }
        };

        outcome.notified = self.notify_contact(&metadata).await;
        outcome.elapsed_ms = start.elapsed().as_millis() as u64;

        info!(
            index_id = %outcome.index_id,
            complexity_score = outcome.complexity_score,
            elapsed_ms = outcome.elapsed_ms,
            "object processed"
        );
        Ok(outcome)
    }

    /// Process every object-created record in an event. One failing record
    /// does not stop the others.
    #[instrument(skip_all, fields(records = event.records.len()))]
    pub async fn process_event(
        &self,
        event: &ObjectEvent,
        progress: &dyn ProgressReporter,
    ) -> EventReport {
        let mut report = EventReport::default();
        let mut created = Vec::with_capacity(event.records.len());
        for record in &event.records {
            if record.is_object_created() {
                created.push(record);
            } else {
                debug!(event = %record.event_name, "skipping non-create record");
                report.skipped += 1;
            }
        }
        let total = created.len();

        progress.phase("Processing objects");
        for (i, record) in created.into_iter().enumerate() {
            let bucket = &record.s3.bucket.name;
            let key = record.decoded_key();
            progress.object_started(&key, i + 1, total);

            match self.process_object(bucket, &key).await {
                Ok(outcome) => {
                    progress.object_finished(&key, true);
                    report.processed.push(outcome);
                }
                Err(e) => {
                    progress.object_finished(&key, false);
                    report.failures.push(RecordFailure {
                        bucket: bucket.clone(),
                        key,
                        error: e.to_string(),
                    });
                }
            }
        }

        info!(
            processed = report.processed.len(),
            failed = report.failures.len(),
            skipped = report.skipped,
            "event processed"
        );
        progress.done(&report);
        report
    }

    /// Read, extract, index and complete one object.
    async fn index_object(
        &self,
        bucket: &str,
        key: &str,
        record: Option<&DocumentRecord>,
    ) -> Result<Indexed> {
        // --- Read ---
        let object = self.blobs.get(bucket, key).await?;
        let head = &object.head;
        let field = |name: &str| head.metadata.get(name).cloned();
        let contact_id = field("contact_id").unwrap_or_else(|| UNKNOWN.to_string());
        let document_type = field("document_type").unwrap_or_else(|| UNKNOWN.to_string());
        let upload_timestamp = field("upload_timestamp").unwrap_or_else(utc_timestamp);
        let filename = filename_from_key(key).to_string();

        // --- Extract ---
        let content = decode_utf8(&object.body)?;
        let text = extract_text_with(&self.extractors, &content, &head.content_type);
        let facts = head.facts();
        let processing_timestamp = utc_timestamp();

        let metadata = ProcessingMetadata {
            analysis: extract_metadata(&text, &filename),
            filename: filename.clone(),
            size: head.size,
            content_type: head.content_type.clone(),
            last_modified: facts.last_modified.clone(),
            s3_bucket: bucket.to_string(),
            s3_key: key.to_string(),
            contact_id: contact_id.clone(),
            document_type: document_type.clone(),
            upload_timestamp: upload_timestamp.clone(),
            processing_timestamp: processing_timestamp.clone(),
            processing_status: ProcessingStatus::Processing,
        };
        debug!(
            words = metadata.analysis.word_count,
            keywords = metadata.analysis.keywords.len(),
            "metadata extracted"
        );

        if let Some(record) = record {
            self.storage
                .mark_document_processing(&record.id, &metadata, &processing_timestamp)
                .await?;
        }

        // --- Index ---
        self.indexer.ensure_index().await?;
        let score = complexity_score(&metadata.analysis);
        let index_id = index_document_id(&contact_id, &filename, Utc::now().timestamp());

        let document = IndexedDocument {
            id: index_id.clone(),
            contact_id: contact_id.clone(),
            filename: filename.clone(),
            document_type,
            content,
            text_content: text,
            metadata: metadata.clone(),
            s3_metadata: facts,
            processing_info: ProcessingInfo {
                status: ProcessingStatus::Completed,
                timestamp: processing_timestamp.clone(),
                complexity_score: score,
            },
            timestamp: utc_timestamp(),
            upload_timestamp,
            processing_timestamp,
        };
        self.indexer.index_document(&document).await?;

        // --- Complete ---
        if let Some(record) = record {
            self.storage
                .mark_document_completed(&record.id, score, &utc_timestamp())
                .await?;
        }

        Ok(Indexed {
            outcome: ProcessingOutcome {
                bucket: bucket.to_string(),
                key: key.to_string(),
                document_id: record.map(|r| r.id.clone()),
                index_id,
                contact_id,
                filename,
                status: ProcessingStatus::Completed,
                complexity_score: score,
                insights: None,
                notified: false,
                elapsed_ms: 0,
            },
            metadata,
        })
    }

    async fn record_failure(&self, record: Option<&DocumentRecord>, error: &IntakeError) {
        warn!(error = %error, "processing failed");
        let Some(record) = record else {
            return;
        };
        if let Err(e) = self
            .storage
            .mark_document_failed(&record.id, &error.to_string(), &utc_timestamp())
            .await
        {
            warn!(document_id = %record.id, error = %e, "could not mark document failed");
        }
    }

    /// Email the owning contact a processing update. Returns whether a
    /// message was delivered.
    async fn notify_contact(&self, metadata: &ProcessingMetadata) -> bool {
        let contact = match self.storage.get_contact(&metadata.contact_id).await {
            Ok(Some(contact)) => contact,
            Ok(None) => {
                debug!(contact_id = %metadata.contact_id, "no contact to notify");
                return false;
            }
            Err(e) => {
                warn!(contact_id = %metadata.contact_id, error = %e, "contact lookup failed");
                return false;
            }
        };

        let update = ProcessingUpdate {
            contact_id: &metadata.contact_id,
            filename: &metadata.filename,
            document_type: &metadata.document_type,
            size: metadata.size,
            status: ProcessingStatus::Completed,
            timestamp: &metadata.processing_timestamp,
        };
        let message = self.composer.processing_notification(&contact.email, &update);
        self.deliver(&message).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::test_support::{MemoryIndexer, RecordingMailer, custom_service};
    use crate::upload::UploadRequest;
    use intake_shared::ContactForm;

    const PROPOSAL: &str = "Proposal for Acme Corp. Email sales@acme.test or call 555-123-4567. \
                            Budget is $5,000 with delivery by 2024-06-30.";

    type TestService = Service<RecordingMailer, MemoryIndexer>;

    async fn seeded(indexer: MemoryIndexer, mailer: RecordingMailer, body: &[u8]) -> (TestService, String, String) {
        let service = custom_service(indexer, mailer).await;
        let contact = service
            .submit_contact(&ContactForm {
                name: "Ada".into(),
                email: "ada@example.com".into(),
                message: "Please review the attached proposal.".into(),
                ..Default::default()
            })
            .await
            .expect("contact");
        let upload = service
            .upload_document(UploadRequest {
                contact_id: contact.contact_id.clone(),
                filename: "proposal.txt".into(),
                body: body.to_vec(),
                document_type: "proposal".into(),
                description: None,
                tags: None,
            })
            .await
            .expect("upload");
        let (_, key) = parse_s3_uri(&upload.s3_path).unwrap();
        (service, upload.document_id, key)
    }

    #[tokio::test]
    async fn processes_uploaded_document_end_to_end() {
        let (service, document_id, key) =
            seeded(MemoryIndexer::default(), RecordingMailer::default(), PROPOSAL.as_bytes()).await;

        let outcome = service.process_object("intake-data", &key).await.expect("process");
        assert_eq!(outcome.status, ProcessingStatus::Completed);
        assert_eq!(outcome.document_id.as_deref(), Some(document_id.as_str()));
        assert!(outcome.filename.ends_with("_proposal.txt"));
        assert!((0.0..=1.0).contains(&outcome.complexity_score));
        assert!(outcome.notified);

        let record = service.storage().get_document(&document_id).await.unwrap().unwrap();
        assert_eq!(record.processing_status, ProcessingStatus::Completed);
        assert_eq!(record.complexity_score, Some(outcome.complexity_score));
        assert!(record.indexed_timestamp.is_some());
        let stored = record.processing_metadata.expect("processing metadata");
        assert!(stored.analysis.has_email);
        assert!(stored.analysis.has_phone);

        let indexed = service
            .indexer()
            .get_document(&outcome.index_id)
            .await
            .unwrap()
            .expect("indexed");
        assert_eq!(indexed.document_type, "proposal");
        assert_eq!(indexed.content, PROPOSAL);
        assert_eq!(indexed.s3_metadata.key, key);

        let insights = outcome.insights.expect("insights");
        assert_eq!(insights.total_documents, 1);
        assert_eq!(insights.document_types, vec!["proposal"]);
        let contact = service
            .storage()
            .get_contact(&outcome.contact_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(contact.document_insights, Some(insights));
        assert!(contact.last_updated.is_some());

        let sent = service.mailer.sent.lock().unwrap().clone();
        let update = sent.last().expect("processing update");
        assert_eq!(update.subject, "Document Processing Update");
        assert_eq!(update.to, "ada@example.com");
    }

    #[tokio::test]
    async fn invalid_utf8_marks_record_failed() {
        let (service, document_id, key) =
            seeded(MemoryIndexer::default(), RecordingMailer::default(), &[0xff, 0xfe, 0x41]).await;

        let err = service.process_object("intake-data", &key).await.unwrap_err();
        assert!(matches!(err, IntakeError::Parse { .. }));

        let record = service.storage().get_document(&document_id).await.unwrap().unwrap();
        assert_eq!(record.processing_status, ProcessingStatus::Failed);
        assert!(record.processing_error.is_some());
    }

    #[tokio::test]
    async fn index_failure_marks_record_failed() {
        let indexer = MemoryIndexer {
            fail_writes: true,
            ..Default::default()
        };
        let (service, document_id, key) =
            seeded(indexer, RecordingMailer::default(), PROPOSAL.as_bytes()).await;

        let err = service.process_object("intake-data", &key).await.unwrap_err();
        assert!(matches!(err, IntakeError::Index(_)));
        let record = service.storage().get_document(&document_id).await.unwrap().unwrap();
        assert_eq!(record.processing_status, ProcessingStatus::Failed);
    }

    #[tokio::test]
    async fn mail_failure_still_completes() {
        let mailer = RecordingMailer {
            fail: true,
            ..Default::default()
        };
        let (service, document_id, key) =
            seeded(MemoryIndexer::default(), mailer, PROPOSAL.as_bytes()).await;

        let outcome = service.process_object("intake-data", &key).await.expect("process");
        assert!(!outcome.notified);
        let record = service.storage().get_document(&document_id).await.unwrap().unwrap();
        assert_eq!(record.processing_status, ProcessingStatus::Completed);
    }

    #[tokio::test]
    async fn missing_object_is_not_found() {
        let service = custom_service(MemoryIndexer::default(), RecordingMailer::default()).await;
        let err = service
            .process_object("intake-data", "documents/nobody/missing.txt")
            .await
            .unwrap_err();
        assert!(matches!(err, IntakeError::NotFound(_)));
    }

    #[tokio::test]
    async fn object_without_record_or_metadata_is_indexed() {
        let service = custom_service(MemoryIndexer::default(), RecordingMailer::default()).await;
        service
            .blobs()
            .put("intake-data", "documents/loose/notes.txt", b"hello world", "text/plain", Default::default())
            .await
            .unwrap();

        let outcome = service
            .process_object("intake-data", "documents/loose/notes.txt")
            .await
            .expect("process");
        assert_eq!(outcome.contact_id, UNKNOWN);
        assert!(outcome.document_id.is_none());
        assert!(outcome.insights.is_none());
        assert!(!outcome.notified);
        assert!(outcome.index_id.starts_with("unknown_notes.txt_"));
    }

    #[tokio::test]
    async fn event_batch_reports_each_record() {
        let (service, _, key) =
            seeded(MemoryIndexer::default(), RecordingMailer::default(), PROPOSAL.as_bytes()).await;

        let event = ObjectEvent {
            records: vec![
                record("ObjectCreated:Put", &key),
                record("ObjectCreated:Put", "documents/ghost/none.txt"),
                record("ObjectRemoved:Delete", &key),
            ],
        };
        let report = service.process_event(&event, &SilentProgress).await;
        assert_eq!(report.processed.len(), 1);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].key, "documents/ghost/none.txt");
        assert!(!report.is_success());
    }

    #[derive(Default)]
    struct CountingProgress {
        started: std::sync::Mutex<Vec<(usize, usize)>>,
    }

    impl ProgressReporter for CountingProgress {
        fn phase(&self, _name: &str) {}
        fn object_started(&self, _key: &str, current: usize, total: usize) {
            self.started.lock().unwrap().push((current, total));
        }
        fn object_finished(&self, _key: &str, _ok: bool) {}
        fn done(&self, _report: &EventReport) {}
    }

    #[tokio::test]
    async fn progress_counts_only_created_records() {
        let (service, _, key) =
            seeded(MemoryIndexer::default(), RecordingMailer::default(), PROPOSAL.as_bytes()).await;

        let event = ObjectEvent {
            records: vec![
                record("ObjectRemoved:Delete", &key),
                record("ObjectCreated:Put", &key),
                record("ObjectRemoved:Delete", &key),
                record("ObjectCreated:Put", "documents/ghost/none.txt"),
            ],
        };
        let progress = CountingProgress::default();
        let report = service.process_event(&event, &progress).await;

        assert_eq!(report.skipped, 2);
        assert_eq!(*progress.started.lock().unwrap(), vec![(1, 2), (2, 2)]);
    }

    fn record(event_name: &str, key: &str) -> EventRecord {
        EventRecord {
            event_name: event_name.into(),
            s3: EventEntity {
                bucket: EventBucket {
                    name: "intake-data".into(),
                },
                object: EventObject {
                    key: key.into(),
                    size: None,
                },
            },
        }
    }

    #[test]
    fn parses_event_json() {
        let json = r#"{
            "Records": [{
                "eventName": "ObjectCreated:Put",
                "s3": {
                    "bucket": { "name": "intake-data" },
                    "object": { "key": "documents/c1/id_my+file%281%29.txt", "size": 12 }
                }
            }]
        }"#;
        let event = parse_event(json).expect("parse");
        assert_eq!(event.records.len(), 1);
        assert!(event.records[0].is_object_created());
        assert_eq!(event.records[0].s3.object.size, Some(12));
        assert_eq!(event.records[0].decoded_key(), "documents/c1/id_my file(1).txt");

        assert!(parse_event("{not json").is_err());
        assert!(parse_event("{}").unwrap().records.is_empty());
    }

    #[test]
    fn s3_uri_parsing() {
        assert_eq!(
            parse_s3_uri("s3://intake-data/documents/c1/a.txt").unwrap(),
            ("intake-data".to_string(), "documents/c1/a.txt".to_string())
        );
        assert!(parse_s3_uri("https://intake-data/a.txt").is_err());
        assert!(parse_s3_uri("s3://intake-data").is_err());
        assert!(parse_s3_uri("s3://intake-data/").is_err());
        assert!(parse_s3_uri("not a uri").is_err());
    }

    #[test]
    fn filename_is_last_key_segment() {
        assert_eq!(filename_from_key("documents/c1/abc_plan.txt"), "abc_plan.txt");
        assert_eq!(filename_from_key("plain.txt"), "plain.txt");
    }
}
