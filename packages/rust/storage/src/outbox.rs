//! Outgoing email queue.
//!
//! Messages are recorded here instead of being handed to a mail relay;
//! `intake outbox` lists them.

use chrono::{SecondsFormat, Utc};
use intake_shared::Result;
use libsql::params;
use serde::Serialize;
use uuid::Uuid;

use crate::{Storage, db_err, text};

/// One queued email.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutboxEntry {
    pub id: String,
    pub from_address: String,
    pub to_address: String,
    pub subject: String,
    pub body: String,
    pub created_at: String,
}

impl Storage {
    /// Queue an email. Returns the generated message ID.
    pub async fn insert_outbox(
        &self,
        from_address: &str,
        to_address: &str,
        subject: &str,
        body: &str,
    ) -> Result<String> {
        self.check_writable()?;
        let id = Uuid::now_v7().to_string();
        let now = Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true);
        self.conn
            .execute(
                "INSERT INTO outbox (id, from_address, to_address, subject, body, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![id.as_str(), from_address, to_address, subject, body, now.as_str()],
            )
            .await
            .map_err(db_err)?;
        Ok(id)
    }

    /// Most recent queued emails, newest first.
    pub async fn list_outbox(&self, limit: u32) -> Result<Vec<OutboxEntry>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, from_address, to_address, subject, body, created_at
                 FROM outbox ORDER BY created_at DESC, id DESC LIMIT ?1",
                params![limit],
            )
            .await
            .map_err(db_err)?;

        let mut results = Vec::new();
        while let Some(row) = rows.next().await.map_err(db_err)? {
            results.push(OutboxEntry {
                id: text(&row, 0)?,
                from_address: text(&row, 1)?,
                to_address: text(&row, 2)?,
                subject: text(&row, 3)?,
                body: text(&row, 4)?,
                created_at: text(&row, 5)?,
            });
        }
        Ok(results)
    }
}
