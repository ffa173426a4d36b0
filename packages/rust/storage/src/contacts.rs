//! Contact record operations.

use intake_shared::{ContactRecord, DocumentInsights, Result};
use libsql::params;

use crate::{Storage, db_err, int, opt_text, scalar, text};

const CONTACT_COLUMNS: &str = "id, name, email, company, service, budget, message, timestamp, \
     status, source, user_agent, page_url, document_processing_enabled, search_capabilities, \
     document_insights_json, last_updated";

impl Storage {
    /// Insert a new contact record.
    pub async fn insert_contact(&self, contact: &ContactRecord) -> Result<()> {
        self.check_writable()?;
        let insights = contact
            .document_insights
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(db_err)?;

        self.conn
            .execute(
                &format!(
                    "INSERT INTO contacts ({CONTACT_COLUMNS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)"
                ),
                params![
                    contact.id.as_str(),
                    contact.name.as_str(),
                    contact.email.as_str(),
                    contact.company.as_str(),
                    contact.service.as_str(),
                    contact.budget.as_str(),
                    contact.message.as_str(),
                    contact.timestamp.as_str(),
                    contact.status.as_str(),
                    contact.source.as_str(),
                    contact.user_agent.as_str(),
                    contact.page_url.as_str(),
                    i64::from(contact.document_processing_enabled),
                    i64::from(contact.search_capabilities),
                    insights,
                    contact.last_updated.clone(),
                ],
            )
            .await
            .map_err(db_err)?;
        Ok(())
    }

    /// Get a contact by ID.
    pub async fn get_contact(&self, id: &str) -> Result<Option<ContactRecord>> {
        let mut rows = self
            .conn
            .query(
                &format!("SELECT {CONTACT_COLUMNS} FROM contacts WHERE id = ?1"),
                params![id],
            )
            .await
            .map_err(db_err)?;

        match rows.next().await.map_err(db_err)? {
            Some(row) => Ok(Some(row_to_contact(&row)?)),
            None => Ok(None),
        }
    }

    /// Store document insights on a contact. Returns `false` if the contact
    /// does not exist.
    pub async fn set_contact_insights(
        &self,
        id: &str,
        insights: &DocumentInsights,
        last_updated: &str,
    ) -> Result<bool> {
        self.check_writable()?;
        let json = serde_json::to_string(insights).map_err(db_err)?;
        let changed = self
            .conn
            .execute(
                "UPDATE contacts SET document_insights_json = ?1, last_updated = ?2 WHERE id = ?3",
                params![json, last_updated, id],
            )
            .await
            .map_err(db_err)?;
        Ok(changed > 0)
    }

    /// Total number of stored contacts.
    pub async fn count_contacts(&self) -> Result<u64> {
        let rows = self
            .conn
            .query("SELECT COUNT(*) FROM contacts", params![])
            .await
            .map_err(db_err)?;
        Ok(scalar(rows).await?.max(0) as u64)
    }
}

/// Convert a database row to a [`ContactRecord`].
fn row_to_contact(row: &libsql::Row) -> Result<ContactRecord> {
    let document_insights = opt_text(row, 14)
        .map(|json| serde_json::from_str::<DocumentInsights>(&json))
        .transpose()
        .map_err(db_err)?;

    Ok(ContactRecord {
        id: text(row, 0)?,
        name: text(row, 1)?,
        email: text(row, 2)?,
        company: text(row, 3)?,
        service: text(row, 4)?,
        budget: text(row, 5)?,
        message: text(row, 6)?,
        timestamp: text(row, 7)?,
        status: text(row, 8)?,
        source: text(row, 9)?,
        user_agent: text(row, 10)?,
        page_url: text(row, 11)?,
        document_processing_enabled: int(row, 12)? != 0,
        search_capabilities: int(row, 13)? != 0,
        document_insights,
        last_updated: opt_text(row, 15),
    })
}
