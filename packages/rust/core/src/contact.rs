//! Contact form intake.

use chrono::{DateTime, Utc};
use tracing::{info, instrument};
use uuid::Uuid;

use intake_notify::Mailer;
use intake_shared::{
    CONTACT_STATUS_NEW, ContactDocuments, ContactForm, ContactRecord, ContactResponse,
    DocumentSummary, Result, utc_timestamp,
};
use intake_storage::VISITOR_COUNTER;

use crate::index::SearchIndexer;
use crate::service::Service;
use crate::validation::{ValidatedContact, validate_contact_input, validate_enhanced_form};

const BASIC_SUCCESS: &str = "Contact form submitted successfully!";
const ENHANCED_SUCCESS: &str =
    "Enhanced contact form submitted successfully with document processing capabilities!";

/// `contact_{unix_seconds}_{8 hex}`.
pub fn generate_contact_id(now: DateTime<Utc>) -> String {
    let hex = Uuid::now_v7().simple().to_string();
    // The tail of a v7 UUID is random; its head is the timestamp.
    format!("contact_{}_{}", now.timestamp(), &hex[hex.len() - 8..])
}

impl<M: Mailer, I: SearchIndexer> Service<M, I> {
    /// Validate, store and announce a basic contact submission.
    #[instrument(skip_all)]
    pub async fn submit_contact(&self, form: &ContactForm) -> Result<ContactResponse> {
        let valid = validate_contact_input(form)?;
        self.record_contact(valid, false).await
    }

    /// Store and announce a submission from the document-enabled form.
    #[instrument(skip_all)]
    pub async fn submit_enhanced_contact(&self, form: &ContactForm) -> Result<ContactResponse> {
        let valid = validate_enhanced_form(form)?;
        self.record_contact(valid, true).await
    }

    async fn record_contact(&self, valid: ValidatedContact, enhanced: bool) -> Result<ContactResponse> {
        let timestamp = utc_timestamp();
        let record = ContactRecord {
            id: generate_contact_id(Utc::now()),
            name: valid.name,
            email: valid.email,
            company: valid.company,
            service: valid.service,
            budget: valid.budget,
            message: valid.message,
            timestamp: timestamp.clone(),
            status: CONTACT_STATUS_NEW.to_string(),
            source: valid.source,
            user_agent: valid.user_agent,
            page_url: valid.page_url,
            document_processing_enabled: true,
            search_capabilities: true,
            document_insights: None,
            last_updated: None,
        };

        self.storage.insert_contact(&record).await?;
        let visitor_count = self.storage.increment_counter(VISITOR_COUNTER).await?;
        let documents_count = self.storage.count_documents_by_contact(&record.id).await?;

        let message = if enhanced {
            self.composer
                .enhanced_contact_notification(&record, documents_count)
        } else {
            self.composer.contact_notification(&record)
        };
        self.deliver(&message).await;

        info!(contact_id = %record.id, enhanced, visitor_count, "contact recorded");

        Ok(ContactResponse {
            message: if enhanced { ENHANCED_SUCCESS } else { BASIC_SUCCESS }.to_string(),
            contact_id: record.id,
            timestamp,
            visitor_count,
            documents_count: documents_count as usize,
        })
    }

    /// A contact's documents, newest first.
    pub async fn contact_documents(&self, contact_id: &str) -> Result<ContactDocuments> {
        let documents: Vec<DocumentSummary> = self
            .storage
            .list_documents_by_contact(contact_id)
            .await?
            .iter()
            .map(DocumentSummary::from)
            .collect();

        Ok(ContactDocuments {
            contact_id: contact_id.to_string(),
            total_count: documents.len(),
            documents,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::test_support::{
        MemoryIndexer, RecordingMailer, custom_service, test_service,
    };
    use intake_shared::IntakeError;

    fn form() -> ContactForm {
        ContactForm {
            name: " Ada Lovelace ".into(),
            email: "ada@example.com".into(),
            message: "We need a quote for the rollout.".into(),
            service: Some("Consulting".into()),
            ..Default::default()
        }
    }

    #[test]
    fn contact_id_shape() {
        let now = DateTime::from_timestamp(1_714_557_600, 0).expect("valid timestamp");
        let id = generate_contact_id(now);
        let suffix = id.strip_prefix("contact_1714557600_").expect("prefix");
        assert_eq!(suffix.len(), 8);
        assert!(suffix.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(generate_contact_id(now), generate_contact_id(now));
    }

    #[tokio::test]
    async fn basic_submission_is_stored_counted_and_announced() {
        let service = custom_service(MemoryIndexer::default(), RecordingMailer::default()).await;

        let first = service.submit_contact(&form()).await.expect("submit");
        assert_eq!(first.message, BASIC_SUCCESS);
        assert_eq!(first.visitor_count, 1);
        assert_eq!(first.documents_count, 0);

        let stored = service
            .storage()
            .get_contact(&first.contact_id)
            .await
            .unwrap()
            .expect("stored");
        assert_eq!(stored.name, "Ada Lovelace");
        assert_eq!(stored.status, "new");
        assert_eq!(stored.company, "Not specified");
        assert!(stored.document_processing_enabled);

        let sent = service.mailer.sent.lock().unwrap().clone();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].subject, "New Contact: Ada Lovelace - Consulting");
        assert_eq!(sent[0].to, "admin@example.com");

        let second = service.submit_contact(&form()).await.unwrap();
        assert_eq!(second.visitor_count, 2);
        assert_ne!(second.contact_id, first.contact_id);
    }

    #[tokio::test]
    async fn enhanced_submission_uses_enhanced_notice() {
        let service = custom_service(MemoryIndexer::default(), RecordingMailer::default()).await;
        let response = service.submit_enhanced_contact(&form()).await.unwrap();
        assert_eq!(response.message, ENHANCED_SUCCESS);

        let sent = service.mailer.sent.lock().unwrap().clone();
        assert!(sent[0].subject.starts_with("Enhanced Contact:"));
        assert!(sent[0].subject.ends_with("(Documents: 0)"));
    }

    #[tokio::test]
    async fn invalid_submission_stores_nothing() {
        let service = test_service().await;
        let mut bad = form();
        bad.email = "nope".into();
        let err = service.submit_contact(&bad).await.unwrap_err();
        assert!(matches!(err, IntakeError::Validation { .. }));
        assert_eq!(service.storage().count_contacts().await.unwrap(), 0);
        assert_eq!(service.storage().get_counter(VISITOR_COUNTER).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn mail_failure_does_not_fail_submission() {
        let mailer = RecordingMailer {
            fail: true,
            ..Default::default()
        };
        let service = custom_service(MemoryIndexer::default(), mailer).await;
        let response = service.submit_contact(&form()).await.expect("still succeeds");
        assert_eq!(response.visitor_count, 1);
    }

    #[tokio::test]
    async fn contact_documents_empty_for_unknown_contact() {
        let service = test_service().await;
        let docs = service.contact_documents("contact_0_deadbeef").await.unwrap();
        assert_eq!(docs.total_count, 0);
        assert!(docs.documents.is_empty());
    }
}
