//! Plain-text email composition.

use intake_shared::{ContactRecord, ProcessingStatus, ServiceConfig};
use serde::Serialize;

/// A composed email, ready to hand to a [`Mailer`](crate::Mailer).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmailMessage {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Facts reported in a document processing update.
#[derive(Debug, Clone)]
pub struct ProcessingUpdate<'a> {
    pub contact_id: &'a str,
    pub filename: &'a str,
    pub document_type: &'a str,
    pub size: u64,
    pub status: ProcessingStatus,
    pub timestamp: &'a str,
}

/// Builds every message the service sends.
#[derive(Debug, Clone)]
pub struct EmailComposer {
    from_address: String,
    admin_address: String,
}

impl EmailComposer {
    pub fn new(from_address: impl Into<String>, admin_address: impl Into<String>) -> Self {
        Self {
            from_address: from_address.into(),
            admin_address: admin_address.into(),
        }
    }

    pub fn from_config(config: &ServiceConfig) -> Self {
        Self::new(&config.from_address, &config.admin_address)
    }

    /// Admin notice for a basic contact submission.
    pub fn contact_notification(&self, contact: &ContactRecord) -> EmailMessage {
        let body = format!(
            "New Contact Form Submission\n\
             \n\
             {details}\n\
             \n\
             {additional}",
            details = contact_details(contact),
            additional = additional_information(contact),
        );

        self.to_admin(format!("New Contact: {} - {}", contact.name, contact.service), body)
    }

    /// Admin notice for an enhanced submission, including the document count.
    pub fn enhanced_contact_notification(
        &self,
        contact: &ContactRecord,
        document_count: u64,
    ) -> EmailMessage {
        let body = format!(
            "Enhanced Contact Form Submission with Document Processing\n\
             \n\
             Contact Information:\n\
             {details}\n\
             \n\
             Document Processing:\n\
             - Documents uploaded: {document_count}\n\
             - Processing status: Active\n\
             \n\
             {additional}\n\
             \n\
             System Status:\n\
             - Document indexing: Active\n\
             - Search capabilities: Enabled\n\
             - Analytics: Available\n",
            details = contact_details(contact),
            additional = additional_information(contact),
        );

        self.to_admin(
            format!(
                "Enhanced Contact: {} - {} (Documents: {document_count})",
                contact.name, contact.service
            ),
            body,
        )
    }

    /// Status update sent to the contact who uploaded a document.
    pub fn processing_notification(&self, to: &str, update: &ProcessingUpdate<'_>) -> EmailMessage {
        let completed = update.status == ProcessingStatus::Completed;
        let next_steps = if completed {
            "- Document is now searchable in the system\n\
             - Contact insights have been updated\n\
             - Analytics data has been refreshed"
        } else {
            "- Processing will continue automatically\n\
             - You will receive another update when it finishes"
        };

        let body = format!(
            "Document Processing Status Update\n\
             \n\
             Contact ID: {contact_id}\n\
             Document: {filename}\n\
             Status: {status}\n\
             Timestamp: {timestamp}\n\
             \n\
             Processing Details:\n\
             - Document Type: {document_type}\n\
             - File Size: {size} bytes\n\
             - Content Analysis: {analysis}\n\
             - Search Indexing: {indexing}\n\
             \n\
             Next Steps:\n\
             {next_steps}\n\
             \n\
             Best regards,\n\
             Document Processing System\n",
            contact_id = update.contact_id,
            filename = update.filename,
            status = update.status,
            timestamp = update.timestamp,
            document_type = update.document_type,
            size = update.size,
            analysis = if completed { "Completed" } else { "In Progress" },
            indexing = if completed { "Available" } else { "Pending" },
        );

        EmailMessage {
            from: self.from_address.clone(),
            to: to.to_string(),
            subject: "Document Processing Update".into(),
            body,
        }
    }

    /// Free-form notice to the admin address.
    pub fn admin_notification(&self, subject: &str, message: &str) -> EmailMessage {
        self.to_admin(subject.to_string(), message.to_string())
    }

    fn to_admin(&self, subject: String, body: String) -> EmailMessage {
        EmailMessage {
            from: self.from_address.clone(),
            to: self.admin_address.clone(),
            subject,
            body,
        }
    }
}

fn contact_details(contact: &ContactRecord) -> String {
    format!(
        "Name: {}\n\
         Email: {}\n\
         Company: {}\n\
         Service Required: {}\n\
         Budget Range: {}\n\
         \n\
         Message:\n\
         {}",
        contact.name, contact.email, contact.company, contact.service, contact.budget, contact.message
    )
}

fn additional_information(contact: &ContactRecord) -> String {
    format!(
        "Additional Information:\n\
         - Timestamp: {}\n\
         - Source: {}\n\
         - Page URL: {}\n\
         - User Agent: {}",
        contact.timestamp, contact.source, contact.page_url, contact.user_agent
    )
}
