//! The service handle shared by every workflow.

use std::sync::Arc;

use intake_extract::ExtractorRegistry;
use intake_notify::{EmailComposer, EmailMessage, Mailer, OutboxMailer};
use intake_shared::{Result, ServiceConfig};
use intake_storage::{BlobStore, Storage};

use crate::index::{LibsqlIndexer, SearchIndexer};

/// Bundles configuration with the storage, object store, index and mailer
/// collaborators.
pub struct Service<M = OutboxMailer, I = LibsqlIndexer> {
    pub(crate) config: ServiceConfig,
    pub(crate) storage: Arc<Storage>,
    pub(crate) blobs: BlobStore,
    pub(crate) indexer: I,
    pub(crate) mailer: M,
    pub(crate) composer: EmailComposer,
    pub(crate) extractors: ExtractorRegistry,
}

impl Service {
    /// Open (and migrate) the database under the configured data directory.
    pub async fn open(config: ServiceConfig) -> Result<Self> {
        let storage = Arc::new(Storage::open(&config.database_path()).await?);
        Ok(Self::from_storage(config, storage))
    }

    /// Open the existing database without write access.
    pub async fn open_readonly(config: ServiceConfig) -> Result<Self> {
        let storage = Arc::new(Storage::open_readonly(&config.database_path()).await?);
        Ok(Self::from_storage(config, storage))
    }

    /// Default collaborators over an already opened database.
    pub fn from_storage(config: ServiceConfig, storage: Arc<Storage>) -> Self {
        let indexer = LibsqlIndexer::new(storage.clone(), config.index_name.clone());
        let mailer = OutboxMailer::new(storage.clone());
        Service::with_components(config, storage, indexer, mailer)
    }
}

impl<M: Mailer, I: SearchIndexer> Service<M, I> {
    pub fn with_components(config: ServiceConfig, storage: Arc<Storage>, indexer: I, mailer: M) -> Self {
        Self {
            blobs: BlobStore::new(config.objects_dir()),
            composer: EmailComposer::from_config(&config),
            extractors: ExtractorRegistry::new(),
            config,
            storage,
            indexer,
            mailer,
        }
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    pub fn blobs(&self) -> &BlobStore {
        &self.blobs
    }

    pub fn indexer(&self) -> &I {
        &self.indexer
    }

    /// Send a message; delivery failures are logged and reported as `false`.
    pub(crate) async fn deliver(&self, message: &EmailMessage) -> bool {
        match self.mailer.send(message).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(to = %message.to, subject = %message.subject, error = %e, "email delivery failed");
                false
            }
        }
    }
}
