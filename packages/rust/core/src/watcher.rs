//! Background watcher that processes recently stored, still pending objects.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use intake_notify::Mailer;
use intake_shared::{IntakeError, ProcessingStatus, Result, WatcherConfig, utc_timestamp};

use crate::index::SearchIndexer;
use crate::service::Service;

/// Counts from one listing pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WatchPass {
    /// Objects under the prefix modified within the recent window.
    pub recent: usize,
    pub processed: usize,
    pub failed: usize,
}

/// Running totals reported by health checks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WatcherStatus {
    pub running: bool,
    pub passes: u64,
    pub processed: u64,
    pub failed: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_pass: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl<M: Mailer, I: SearchIndexer> Service<M, I> {
    /// List objects under the watched prefix and process every recent one
    /// whose document record is still `pending`.
    pub async fn watch_once(&self, config: &WatcherConfig) -> Result<WatchPass> {
        let window = i64::try_from(config.recent_window_secs)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .ok_or_else(|| {
                IntakeError::config(format!(
                    "recent window of {}s is out of range",
                    config.recent_window_secs
                ))
            })?;
        let cutoff = Utc::now()
            .checked_sub_signed(window)
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        let bucket = &self.config.bucket;
        let mut pass = WatchPass::default();

        for head in self.blobs.list(bucket, &config.prefix).await? {
            if head.last_modified < cutoff {
                continue;
            }
            pass.recent += 1;

            let pending = self
                .storage
                .find_document_by_key(bucket, &head.key)
                .await?
                .is_some_and(|record| record.processing_status == ProcessingStatus::Pending);
            if !pending {
                continue;
            }

            match self.process_object(bucket, &head.key).await {
                Ok(_) => pass.processed += 1,
                Err(e) => {
                    warn!(key = %head.key, error = %e, "watcher could not process object");
                    pass.failed += 1;
                }
            }
        }

        debug!(recent = pass.recent, processed = pass.processed, "watch pass finished");
        Ok(pass)
    }
}

/// Handle to a spawned watcher task.
pub struct WatcherHandle {
    shutdown: watch::Sender<bool>,
    status: watch::Receiver<WatcherStatus>,
    task: JoinHandle<()>,
}

impl WatcherHandle {
    /// Latest status snapshot.
    pub fn status(&self) -> WatcherStatus {
        self.status.borrow().clone()
    }

    /// Wait for the next status change.
    pub async fn changed(&mut self) -> bool {
        self.status.changed().await.is_ok()
    }

    /// Signal the loop to stop and wait for it to exit.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            warn!(error = %e, "watcher task ended abnormally");
        }
    }
}

/// Spawn the watch loop: one pass every `interval_secs`, or after
/// `error_backoff_secs` when a pass fails, until stopped. Delays are at
/// least one second.
pub fn spawn_watcher<M, I>(service: Arc<Service<M, I>>, config: WatcherConfig) -> WatcherHandle
where
    M: Mailer + 'static,
    I: SearchIndexer + 'static,
{
    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
    let (status_tx, status_rx) = watch::channel(WatcherStatus {
        running: true,
        ..Default::default()
    });

    let task = tokio::spawn(async move {
        info!(
            prefix = %config.prefix,
            interval_secs = config.interval_secs,
            "watcher started"
        );
        loop {
            let delay = match service.watch_once(&config).await {
                Ok(pass) => {
                    status_tx.send_modify(|s| {
                        s.passes += 1;
                        s.processed += pass.processed as u64;
                        s.failed += pass.failed as u64;
                        s.last_pass = Some(utc_timestamp());
                        s.last_error = None;
                    });
                    config.interval_secs
                }
                Err(e) => {
                    warn!(error = %e, "watch pass failed");
                    status_tx.send_modify(|s| {
                        s.passes += 1;
                        s.last_pass = Some(utc_timestamp());
                        s.last_error = Some(e.to_string());
                    });
                    config.error_backoff_secs
                }
            };

            tokio::select! {
                _ = tokio::time::sleep(Duration::from_secs(delay.max(1))) => {}
                _ = shutdown_rx.changed() => break,
            }
        }
        status_tx.send_modify(|s| s.running = false);
        info!("watcher stopped");
    });

    WatcherHandle {
        shutdown: shutdown_tx,
        status: status_rx,
        task,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::test_support::test_service;
    use crate::upload::UploadRequest;

    fn upload(contact: &str, filename: &str) -> UploadRequest {
        UploadRequest {
            contact_id: contact.into(),
            filename: filename.into(),
            body: b"Quarterly budget review notes".to_vec(),
            document_type: "notes".into(),
            description: None,
            tags: None,
        }
    }

    #[tokio::test]
    async fn processes_only_pending_recent_objects() {
        let service = test_service().await;
        let first = service.upload_document(upload("c1", "a.txt")).await.unwrap();
        let second = service.upload_document(upload("c1", "b.txt")).await.unwrap();
        service
            .blobs()
            .put("intake-data", "elsewhere/c.txt", b"x", "text/plain", Default::default())
            .await
            .unwrap();

        let config = WatcherConfig::default();
        let pass = service.watch_once(&config).await.unwrap();
        assert_eq!(pass.recent, 2);
        assert_eq!(pass.processed, 2);
        assert_eq!(pass.failed, 0);

        for id in [&first.document_id, &second.document_id] {
            let record = service.storage().get_document(id).await.unwrap().unwrap();
            assert_eq!(record.processing_status, ProcessingStatus::Completed);
        }

        let again = service.watch_once(&config).await.unwrap();
        assert_eq!(again.recent, 2);
        assert_eq!(again.processed, 0);
    }

    #[tokio::test]
    async fn zero_window_ignores_everything() {
        let service = test_service().await;
        service.upload_document(upload("c1", "a.txt")).await.unwrap();
        tokio::time::sleep(Duration::from_millis(1100)).await;

        let config = WatcherConfig {
            recent_window_secs: 0,
            ..Default::default()
        };
        let pass = service.watch_once(&config).await.unwrap();
        assert_eq!(pass, WatchPass::default());
    }

    #[tokio::test]
    async fn spawned_watcher_runs_and_stops() {
        let service = Arc::new(test_service().await);
        service.upload_document(upload("c1", "a.txt")).await.unwrap();

        let mut handle = spawn_watcher(service.clone(), WatcherConfig::default());
        assert!(handle.changed().await);
        let status = handle.status();
        assert!(status.running);
        assert_eq!(status.passes, 1);
        assert_eq!(status.processed, 1);

        handle.stop().await;
        assert_eq!(
            service.analytics().await.unwrap().processing_stats["completed"],
            1
        );
    }

    #[tokio::test]
    async fn out_of_range_window_is_a_config_error() {
        let service = test_service().await;
        for secs in [u64::MAX, i64::MAX as u64] {
            let config = WatcherConfig {
                recent_window_secs: secs,
                ..Default::default()
            };
            let err = service.watch_once(&config).await.unwrap_err();
            assert!(matches!(err, IntakeError::Config { .. }));
        }

        let wide = WatcherConfig {
            recent_window_secs: 100 * 365 * 24 * 60 * 60,
            ..Default::default()
        };
        assert_eq!(service.watch_once(&wide).await.unwrap(), WatchPass::default());
    }

    #[tokio::test]
    async fn zero_interval_still_pauses_between_passes() {
        let service = Arc::new(test_service().await);
        let config = WatcherConfig {
            interval_secs: 0,
            ..Default::default()
        };
        let mut handle = spawn_watcher(service, config);
        assert!(handle.changed().await);
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(handle.status().passes, 1);
        handle.stop().await;
    }
}
