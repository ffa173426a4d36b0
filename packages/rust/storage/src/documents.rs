//! Document record operations.

use std::collections::BTreeMap;

use intake_shared::{DocumentRecord, ProcessingMetadata, ProcessingStatus, Result};
use libsql::params;
use libsql::params::Params;

use crate::{IndexFilter, Storage, db_err, int, opt_text, scalar, text};

const DOCUMENT_COLUMNS: &str = "id, contact_id, filename, size, content_type, document_type, \
     description, tags_json, upload_timestamp, processing_status, s3_bucket, s3_key, file_hash, \
     processing_metadata_json, processing_timestamp, complexity_score, indexed_timestamp, \
     processing_error";

impl Storage {
    /// Insert a new document record.
    pub async fn insert_document(&self, doc: &DocumentRecord) -> Result<()> {
        self.check_writable()?;
        let tags = serde_json::to_string(&doc.tags).map_err(db_err)?;
        let metadata = doc
            .processing_metadata
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(db_err)?;

        self.conn
            .execute(
                &format!(
                    "INSERT INTO documents ({DOCUMENT_COLUMNS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)"
                ),
                params![
                    doc.id.as_str(),
                    doc.contact_id.as_str(),
                    doc.filename.as_str(),
                    doc.size as i64,
                    doc.content_type.as_str(),
                    doc.document_type.as_str(),
                    doc.description.as_str(),
                    tags,
                    doc.upload_timestamp.as_str(),
                    doc.processing_status.as_str(),
                    doc.s3_bucket.as_str(),
                    doc.s3_key.as_str(),
                    doc.file_hash.as_str(),
                    metadata,
                    doc.processing_timestamp.clone(),
                    doc.complexity_score,
                    doc.indexed_timestamp.clone(),
                    doc.processing_error.clone(),
                ],
            )
            .await
            .map_err(db_err)?;
        Ok(())
    }

    /// Get a document by ID.
    pub async fn get_document(&self, id: &str) -> Result<Option<DocumentRecord>> {
        self.query_one_document(
            &format!("SELECT {DOCUMENT_COLUMNS} FROM documents WHERE id = ?1"),
            params![id],
        )
        .await
    }

    /// Find the document stored under an object location.
    pub async fn find_document_by_key(
        &self,
        bucket: &str,
        key: &str,
    ) -> Result<Option<DocumentRecord>> {
        self.query_one_document(
            &format!("SELECT {DOCUMENT_COLUMNS} FROM documents WHERE s3_bucket = ?1 AND s3_key = ?2"),
            params![bucket, key],
        )
        .await
    }

    /// All documents of a contact, newest upload first.
    pub async fn list_documents_by_contact(&self, contact_id: &str) -> Result<Vec<DocumentRecord>> {
        self.query_documents(
            &format!(
                "SELECT {DOCUMENT_COLUMNS} FROM documents
                 WHERE contact_id = ?1 ORDER BY upload_timestamp DESC, id DESC"
            ),
            params![contact_id],
        )
        .await
    }

    /// Number of documents a contact has uploaded.
    pub async fn count_documents_by_contact(&self, contact_id: &str) -> Result<u64> {
        let rows = self
            .conn
            .query(
                "SELECT COUNT(*) FROM documents WHERE contact_id = ?1",
                params![contact_id],
            )
            .await
            .map_err(db_err)?;
        Ok(scalar(rows).await?.max(0) as u64)
    }

    /// Move a document to `processing` and attach its processing metadata.
    pub async fn mark_document_processing(
        &self,
        id: &str,
        metadata: &ProcessingMetadata,
        timestamp: &str,
    ) -> Result<()> {
        self.check_writable()?;
        let json = serde_json::to_string(metadata).map_err(db_err)?;
        self.conn
            .execute(
                "UPDATE documents SET processing_status = ?1, processing_metadata_json = ?2,
                   processing_timestamp = ?3, processing_error = NULL
                 WHERE id = ?4",
                params![ProcessingStatus::Processing.as_str(), json, timestamp, id],
            )
            .await
            .map_err(db_err)?;
        Ok(())
    }

    /// Move a document to `completed` with its score and index time.
    pub async fn mark_document_completed(
        &self,
        id: &str,
        complexity_score: f64,
        indexed_timestamp: &str,
    ) -> Result<()> {
        self.check_writable()?;
        self.conn
            .execute(
                "UPDATE documents SET processing_status = ?1, complexity_score = ?2,
                   indexed_timestamp = ?3, processing_error = NULL
                 WHERE id = ?4",
                params![
                    ProcessingStatus::Completed.as_str(),
                    complexity_score,
                    indexed_timestamp,
                    id
                ],
            )
            .await
            .map_err(db_err)?;
        Ok(())
    }

    /// Move a document to `failed`, recording why.
    pub async fn mark_document_failed(&self, id: &str, error: &str, timestamp: &str) -> Result<()> {
        self.check_writable()?;
        self.conn
            .execute(
                "UPDATE documents SET processing_status = ?1, processing_error = ?2,
                   processing_timestamp = ?3
                 WHERE id = ?4",
                params![ProcessingStatus::Failed.as_str(), error, timestamp, id],
            )
            .await
            .map_err(db_err)?;
        Ok(())
    }

    /// Case-insensitive substring scan over filename and description,
    /// newest upload first. Filters apply before the limit.
    pub async fn scan_documents(
        &self,
        needle: &str,
        filter: &IndexFilter,
        limit: u32,
    ) -> Result<Vec<DocumentRecord>> {
        let mut sql = format!(
            "SELECT {DOCUMENT_COLUMNS} FROM documents
             WHERE (instr(lower(filename), lower(?1)) > 0
                OR instr(lower(description), lower(?1)) > 0)"
        );
        let mut values: Vec<libsql::Value> = vec![needle.to_string().into()];

        for (column, value) in [
            ("contact_id", &filter.contact_id),
            ("document_type", &filter.document_type),
            ("processing_status", &filter.status),
        ] {
            if let Some(value) = value {
                values.push(value.clone().into());
                sql.push_str(&format!(" AND {column} = ?{}", values.len()));
            }
        }

        values.push(i64::from(limit).into());
        sql.push_str(&format!(
            " ORDER BY upload_timestamp DESC, id DESC LIMIT ?{}",
            values.len()
        ));

        self.query_documents(&sql, Params::Positional(values)).await
    }

    /// Total number of stored documents.
    pub async fn count_documents(&self) -> Result<u64> {
        let rows = self
            .conn
            .query("SELECT COUNT(*) FROM documents", params![])
            .await
            .map_err(db_err)?;
        Ok(scalar(rows).await?.max(0) as u64)
    }

    /// Document count per document type.
    pub async fn document_type_counts(&self) -> Result<BTreeMap<String, u64>> {
        self.grouped_counts(
            "SELECT document_type, COUNT(*) FROM documents GROUP BY document_type",
        )
        .await
    }

    /// Document count per processing status.
    pub async fn status_counts(&self) -> Result<BTreeMap<String, u64>> {
        self.grouped_counts(
            "SELECT processing_status, COUNT(*) FROM documents GROUP BY processing_status",
        )
        .await
    }

    async fn grouped_counts(&self, sql: &str) -> Result<BTreeMap<String, u64>> {
        let mut rows = self.conn.query(sql, params![]).await.map_err(db_err)?;
        let mut counts = BTreeMap::new();
        while let Some(row) = rows.next().await.map_err(db_err)? {
            counts.insert(text(&row, 0)?, int(&row, 1)?.max(0) as u64);
        }
        Ok(counts)
    }

    async fn query_one_document(
        &self,
        sql: &str,
        params: impl libsql::params::IntoParams,
    ) -> Result<Option<DocumentRecord>> {
        let mut rows = self.conn.query(sql, params).await.map_err(db_err)?;
        match rows.next().await.map_err(db_err)? {
            Some(row) => Ok(Some(row_to_document(&row)?)),
            None => Ok(None),
        }
    }

    async fn query_documents(
        &self,
        sql: &str,
        params: impl libsql::params::IntoParams,
    ) -> Result<Vec<DocumentRecord>> {
        let mut rows = self.conn.query(sql, params).await.map_err(db_err)?;
        let mut results = Vec::new();
        while let Some(row) = rows.next().await.map_err(db_err)? {
            results.push(row_to_document(&row)?);
        }
        Ok(results)
    }
}

/// Convert a database row to a [`DocumentRecord`].
fn row_to_document(row: &libsql::Row) -> Result<DocumentRecord> {
    let tags: Vec<String> = serde_json::from_str(&text(row, 7)?).map_err(db_err)?;
    let processing_metadata = opt_text(row, 13)
        .map(|json| serde_json::from_str::<ProcessingMetadata>(&json))
        .transpose()
        .map_err(db_err)?;

    Ok(DocumentRecord {
        id: text(row, 0)?,
        contact_id: text(row, 1)?,
        filename: text(row, 2)?,
        size: int(row, 3)?.max(0) as u64,
        content_type: text(row, 4)?,
        document_type: text(row, 5)?,
        description: text(row, 6)?,
        tags,
        upload_timestamp: text(row, 8)?,
        processing_status: text(row, 9)?.parse()?,
        s3_bucket: text(row, 10)?,
        s3_key: text(row, 11)?,
        file_hash: text(row, 12)?,
        processing_metadata,
        processing_timestamp: opt_text(row, 14),
        complexity_score: row.get::<f64>(15).ok(),
        indexed_timestamp: opt_text(row, 16),
        processing_error: opt_text(row, 17),
    })
}

#[cfg(test)]
mod tests {
    use intake_shared::DocumentMetadata;

    use crate::test_support::test_storage;

    use super::*;

    fn sample_document(id: &str, contact_id: &str, filename: &str, uploaded: &str) -> DocumentRecord {
        DocumentRecord {
            id: id.into(),
            contact_id: contact_id.into(),
            filename: filename.into(),
            size: 1024,
            content_type: "text/plain".into(),
            document_type: "proposal".into(),
            description: "Quarterly budget draft".into(),
            tags: vec!["finance".into(), "q3".into()],
            upload_timestamp: uploaded.into(),
            processing_status: ProcessingStatus::Pending,
            s3_bucket: "intake-data".into(),
            s3_key: format!("documents/{contact_id}/{id}_{filename}"),
            file_hash: "ab".repeat(32),
            processing_metadata: None,
            processing_timestamp: None,
            complexity_score: None,
            indexed_timestamp: None,
            processing_error: None,
        }
    }

    fn sample_metadata(doc: &DocumentRecord) -> ProcessingMetadata {
        ProcessingMetadata {
            analysis: DocumentMetadata {
                word_count: 3,
                ..Default::default()
            },
            filename: doc.filename.clone(),
            size: doc.size,
            content_type: doc.content_type.clone(),
            last_modified: "2024-05-01T10:00:00.000000Z".into(),
            s3_bucket: doc.s3_bucket.clone(),
            s3_key: doc.s3_key.clone(),
            contact_id: doc.contact_id.clone(),
            document_type: doc.document_type.clone(),
            upload_timestamp: doc.upload_timestamp.clone(),
            processing_timestamp: "2024-05-01T10:00:01.000000Z".into(),
            processing_status: ProcessingStatus::Processing,
        }
    }

    #[tokio::test]
    async fn document_insert_and_lookup() {
        let storage = test_storage().await;
        let doc = sample_document("d1", "c1", "plan.txt", "2024-05-01T10:00:00.000000Z");
        storage.insert_document(&doc).await.expect("insert");

        let by_id = storage.get_document("d1").await.unwrap().expect("by id");
        assert_eq!(by_id, doc);

        let by_key = storage
            .find_document_by_key(&doc.s3_bucket, &doc.s3_key)
            .await
            .unwrap()
            .expect("by key");
        assert_eq!(by_key.id, "d1");

        assert!(
            storage
                .find_document_by_key("other-bucket", &doc.s3_key)
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn status_lifecycle() {
        let storage = test_storage().await;
        let doc = sample_document("d1", "c1", "plan.txt", "2024-05-01T10:00:00.000000Z");
        storage.insert_document(&doc).await.unwrap();

        let metadata = sample_metadata(&doc);
        storage
            .mark_document_processing("d1", &metadata, "2024-05-01T10:00:01.000000Z")
            .await
            .unwrap();
        let found = storage.get_document("d1").await.unwrap().unwrap();
        assert_eq!(found.processing_status, ProcessingStatus::Processing);
        assert_eq!(found.processing_metadata, Some(metadata));

        storage
            .mark_document_completed("d1", 0.3, "2024-05-01T10:00:02.000000Z")
            .await
            .unwrap();
        let found = storage.get_document("d1").await.unwrap().unwrap();
        assert_eq!(found.processing_status, ProcessingStatus::Completed);
        assert_eq!(found.complexity_score, Some(0.3));
        assert_eq!(
            found.indexed_timestamp.as_deref(),
            Some("2024-05-01T10:00:02.000000Z")
        );
    }

    #[tokio::test]
    async fn failure_records_reason() {
        let storage = test_storage().await;
        let doc = sample_document("d1", "c1", "plan.txt", "2024-05-01T10:00:00.000000Z");
        storage.insert_document(&doc).await.unwrap();

        storage
            .mark_document_failed("d1", "object vanished", "2024-05-01T10:00:03.000000Z")
            .await
            .unwrap();
        let found = storage.get_document("d1").await.unwrap().unwrap();
        assert_eq!(found.processing_status, ProcessingStatus::Failed);
        assert_eq!(found.processing_error.as_deref(), Some("object vanished"));
    }

    #[tokio::test]
    async fn contact_listing_is_newest_first() {
        let storage = test_storage().await;
        for (id, ts) in [
            ("d1", "2024-05-01T10:00:00.000000Z"),
            ("d2", "2024-05-03T10:00:00.000000Z"),
            ("d3", "2024-05-02T10:00:00.000000Z"),
        ] {
            storage
                .insert_document(&sample_document(id, "c1", &format!("{id}.txt"), ts))
                .await
                .unwrap();
        }
        storage
            .insert_document(&sample_document("x1", "c2", "x.txt", "2024-05-04T10:00:00.000000Z"))
            .await
            .unwrap();

        let docs = storage.list_documents_by_contact("c1").await.unwrap();
        let ids: Vec<&str> = docs.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["d2", "d3", "d1"]);
        assert_eq!(storage.count_documents_by_contact("c1").await.unwrap(), 3);
        assert_eq!(storage.count_documents_by_contact("none").await.unwrap(), 0);
        assert_eq!(storage.count_documents().await.unwrap(), 4);
    }

    #[tokio::test]
    async fn scan_matches_filename_or_description() {
        let storage = test_storage().await;
        let mut a = sample_document("d1", "c1", "Invoice-May.pdf", "2024-05-01T10:00:00.000000Z");
        a.description = "monthly bill".into();
        let mut b = sample_document("d2", "c1", "notes.txt", "2024-05-02T10:00:00.000000Z");
        b.description = "Invoice follow-up".into();
        let mut c = sample_document("d3", "c1", "photo.png", "2024-05-03T10:00:00.000000Z");
        c.description = "team picture".into();
        for doc in [&a, &b, &c] {
            storage.insert_document(doc).await.unwrap();
        }

        let all = IndexFilter::default();
        let hits = storage.scan_documents("invoice", &all, 10).await.unwrap();
        let ids: Vec<&str> = hits.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["d2", "d1"]);

        let limited = storage.scan_documents("invoice", &all, 1).await.unwrap();
        assert_eq!(limited.len(), 1);
    }

    #[tokio::test]
    async fn scan_filters_before_limit() {
        let storage = test_storage().await;
        let older = sample_document("d1", "c1", "invoice-a.txt", "2024-05-01T10:00:00.000000Z");
        let mut newer = sample_document("d2", "c2", "invoice-b.txt", "2024-05-02T10:00:00.000000Z");
        newer.document_type = "receipt".into();
        for doc in [&older, &newer] {
            storage.insert_document(doc).await.unwrap();
        }

        let by_contact = IndexFilter {
            contact_id: Some("c1".into()),
            ..Default::default()
        };
        let hits = storage.scan_documents("invoice", &by_contact, 1).await.unwrap();
        let ids: Vec<&str> = hits.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["d1"]);

        let by_type = IndexFilter {
            document_type: Some("receipt".into()),
            status: Some("pending".into()),
            ..Default::default()
        };
        let hits = storage.scan_documents("invoice", &by_type, 1).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "d2");

        let none = IndexFilter {
            status: Some("completed".into()),
            ..Default::default()
        };
        assert!(storage.scan_documents("invoice", &none, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn grouped_counts() {
        let storage = test_storage().await;
        let mut a = sample_document("d1", "c1", "a.txt", "2024-05-01T10:00:00.000000Z");
        a.document_type = "invoice".into();
        let b = sample_document("d2", "c1", "b.txt", "2024-05-01T10:00:00.000000Z");
        let c = sample_document("d3", "c1", "c.txt", "2024-05-01T10:00:00.000000Z");
        for doc in [&a, &b, &c] {
            storage.insert_document(doc).await.unwrap();
        }
        storage
            .mark_document_failed("d3", "boom", "2024-05-01T10:00:03.000000Z")
            .await
            .unwrap();

        let types = storage.document_type_counts().await.unwrap();
        assert_eq!(types.get("invoice"), Some(&1));
        assert_eq!(types.get("proposal"), Some(&2));

        let statuses = storage.status_counts().await.unwrap();
        assert_eq!(statuses.get("pending"), Some(&2));
        assert_eq!(statuses.get("failed"), Some(&1));
    }
}
