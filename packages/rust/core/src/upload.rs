//! Document upload: validate, store the object, record it as pending.

use std::collections::BTreeMap;

use sha2::{Digest, Sha256};
use tracing::{info, instrument, warn};

use intake_notify::Mailer;
use intake_shared::{
    DocumentId, DocumentRecord, DocumentResponse, IntakeError, ProcessingStatus, Result,
    utc_timestamp,
};

use crate::index::SearchIndexer;
use crate::service::Service;
use crate::validation::{has_allowed_extension, sanitize_filename, validate_filename};

/// An uploaded file with its form fields.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub contact_id: String,
    pub filename: String,
    pub body: Vec<u8>,
    pub document_type: String,
    pub description: Option<String>,
    /// Comma-separated.
    pub tags: Option<String>,
}

/// Object key for an uploaded document.
pub fn document_key(contact_id: &str, document_id: &str, filename: &str) -> String {
    format!("documents/{contact_id}/{document_id}_{filename}")
}

/// Lower-case hex SHA-256 of a file body.
pub fn file_hash(body: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(body);
    format!("{:x}", hasher.finalize())
}

/// Content type guessed from the filename.
pub fn guess_content_type(filename: &str) -> String {
    mime_guess::from_path(filename)
        .first_or_octet_stream()
        .to_string()
}

fn split_tags(tags: Option<&str>) -> Vec<String> {
    tags.map(|t| {
        t.split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(String::from)
            .collect()
    })
    .unwrap_or_default()
}

impl<M: Mailer, I: SearchIndexer> Service<M, I> {
    /// Store an uploaded document and record it as `pending`.
    #[instrument(skip_all, fields(contact_id = %request.contact_id, filename = %request.filename))]
    pub async fn upload_document(&self, request: UploadRequest) -> Result<DocumentResponse> {
        if !has_allowed_extension(&request.filename, &self.config.allowed_extensions) {
            let allowed: Vec<&str> = self
                .config
                .allowed_extensions
                .iter()
                .map(String::as_str)
                .collect();
            return Err(IntakeError::validation(format!(
                "file type not supported. Allowed types: {}",
                allowed.join(", ")
            )));
        }

        let size = request.body.len() as u64;
        if size > self.config.max_file_size {
            return Err(IntakeError::validation(format!(
                "file size exceeds maximum limit of {}MB",
                self.config.max_file_size / (1024 * 1024)
            )));
        }

        if !validate_filename(&request.contact_id) {
            return Err(IntakeError::validation("invalid contact id"));
        }
        if request.document_type.trim().is_empty() {
            return Err(IntakeError::validation("missing required field: document_type"));
        }

        let filename = sanitize_filename(&request.filename);
        let document_id = DocumentId::new().to_string();
        let hash = file_hash(&request.body);
        let content_type = guess_content_type(&filename);
        let timestamp = utc_timestamp();
        let key = document_key(&request.contact_id, &document_id, &filename);
        let bucket = self.config.bucket.clone();

        let metadata = BTreeMap::from([
            ("contact_id".to_string(), request.contact_id.clone()),
            ("document_type".to_string(), request.document_type.clone()),
            ("upload_timestamp".to_string(), timestamp.clone()),
            ("file_hash".to_string(), hash.clone()),
        ]);
        let head = self
            .blobs
            .put(&bucket, &key, &request.body, &content_type, metadata)
            .await?;

        let record = DocumentRecord {
            id: document_id.clone(),
            contact_id: request.contact_id.clone(),
            filename: filename.clone(),
            size,
            content_type: content_type.clone(),
            document_type: request.document_type,
            description: request.description.unwrap_or_default(),
            tags: split_tags(request.tags.as_deref()),
            upload_timestamp: timestamp.clone(),
            processing_status: ProcessingStatus::Pending,
            s3_bucket: bucket,
            s3_key: key,
            file_hash: hash,
            processing_metadata: None,
            processing_timestamp: None,
            complexity_score: None,
            indexed_timestamp: None,
            processing_error: None,
        };
        if let Err(e) = self.storage.insert_document(&record).await {
            if let Err(cleanup) = self.blobs.delete(&head.bucket, &head.key).await {
                warn!(key = %head.key, error = %cleanup, "could not remove orphaned object");
            }
            return Err(e);
        }

        info!(document_id = %document_id, size, "document uploaded");

        Ok(DocumentResponse {
            document_id,
            filename,
            size,
            content_type,
            upload_timestamp: timestamp,
            processing_status: ProcessingStatus::Pending,
            contact_id: request.contact_id,
            s3_path: head.uri(),
        })
    }
}
