//! Analytics, visitor stats and health reporting.

use std::collections::BTreeMap;

use serde_json::json;
use tracing::warn;

use intake_notify::Mailer;
use intake_shared::{
    AnalyticsResponse, HealthResponse, ProcessingStatus, Result, StatsResponse, utc_timestamp,
};
use intake_storage::VISITOR_COUNTER;

use crate::index::SearchIndexer;
use crate::service::Service;
use crate::watcher::WatcherStatus;

const HEALTHY: &str = "healthy";

impl<M: Mailer, I: SearchIndexer> Service<M, I> {
    /// Contact and document totals with per-type and per-status counts.
    /// Every processing status appears, zero or not.
    pub async fn analytics(&self) -> Result<AnalyticsResponse> {
        let mut processing_stats: BTreeMap<String, u64> = ProcessingStatus::ALL
            .iter()
            .map(|s| (s.as_str().to_string(), 0))
            .collect();
        processing_stats.extend(self.storage.status_counts().await?);

        Ok(AnalyticsResponse {
            total_contacts: self.storage.count_contacts().await?,
            total_documents: self.storage.count_documents().await?,
            document_types: self.storage.document_type_counts().await?,
            processing_stats,
            timestamp: utc_timestamp(),
        })
    }

    pub async fn stats(&self) -> Result<StatsResponse> {
        Ok(StatsResponse {
            visitor_count: self.storage.get_counter(VISITOR_COUNTER).await?,
            timestamp: utc_timestamp(),
            enhanced_features: true,
        })
    }

    /// Probe each collaborator. Never fails: problems show up as a
    /// `degraded` status with per-service detail.
    pub async fn health(&self, watcher: Option<&WatcherStatus>) -> HealthResponse {
        let mut services = BTreeMap::new();

        services.insert(
            "database".to_string(),
            probe(self.storage.ping().await),
        );

        let objects = self.blobs.root();
        services.insert(
            "object_store".to_string(),
            if objects.is_dir() || !objects.exists() {
                HEALTHY.to_string()
            } else {
                format!("unhealthy: {} is not a directory", objects.display())
            },
        );

        services.insert(
            "search_index".to_string(),
            probe(self.indexer.stats().await.map(|_| ())),
        );

        let total_documents = match self.storage.count_documents().await {
            Ok(count) => count,
            Err(e) => {
                warn!(error = %e, "document count unavailable");
                0
            }
        };

        let status = if services.values().all(|s| s == HEALTHY) {
            HEALTHY
        } else {
            "degraded"
        };

        let background_processor = match watcher {
            Some(status) => json!(status),
            None => json!({ "running": false }),
        };

        HealthResponse {
            status: status.to_string(),
            timestamp: utc_timestamp(),
            services,
            version: env!("CARGO_PKG_VERSION").to_string(),
            document_stats: json!({
                "total_documents": total_documents,
                "objects_directory": objects.display().to_string(),
                "bucket": self.config.bucket,
                "max_file_size_mb": self.config.max_file_size / (1024 * 1024),
                "background_processor": background_processor,
            }),
        }
    }
}

fn probe(result: Result<()>) -> String {
    match result {
        Ok(()) => HEALTHY.to_string(),
        Err(e) => format!("unhealthy: {e}"),
    }
}
