//! Delivery seam for composed messages.

use std::future::Future;
use std::sync::Arc;

use intake_shared::{IntakeError, Result};
use intake_storage::Storage;

use crate::EmailMessage;

/// Sends composed email.
pub trait Mailer: Send + Sync {
    /// Deliver one message.
    fn send(&self, message: &EmailMessage) -> impl Future<Output = Result<()>> + Send;
}

/// Delivers by queueing into the database outbox.
#[derive(Clone)]
pub struct OutboxMailer {
    storage: Arc<Storage>,
}

impl OutboxMailer {
    pub fn new(storage: Arc<Storage>) -> Self {
        Self { storage }
    }
}

impl Mailer for OutboxMailer {
    async fn send(&self, message: &EmailMessage) -> Result<()> {
        let id = self
            .storage
            .insert_outbox(&message.from, &message.to, &message.subject, &message.body)
            .await
            .map_err(|e| IntakeError::Notify(e.to_string()))?;
        tracing::info!(id = %id, to = %message.to, subject = %message.subject, "queued email");
        Ok(())
    }
}
