//! Device-local queue for credentials that failed to reach the server.
//!
//! Lives on the device, not in the shared store. State access goes through an
//! injected `DeviceStateStore` so the queue can run and be tested without a
//! real browser storage area. Draining makes exactly one submission attempt
//! per entry per invocation; retries happen only by invoking `drain` again.
//! Concurrent drains on the same device are the caller's job to prevent.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::error::AppError;
use crate::models::sync::IncomingCredential;
use crate::util::now_millis;

/// A credential snapshot waiting for connectivity.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfflineQueueEntry {
    pub credential: QueuedCredential,
    pub saved_at: i64,
    pub pending_sync: bool,
}

/// The fields a device captures when saving offline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueuedCredential {
    pub website: String,
    #[serde(default)]
    pub url: Option<String>,
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub notes: Option<String>,
}

impl QueuedCredential {
    /// Shape the snapshot the way the sync endpoint expects it.
    pub fn to_incoming(&self) -> IncomingCredential {
        IncomingCredential {
            id: None,
            version: None,
            website: Some(self.website.clone()),
            url: self.url.clone(),
            username: Some(self.username.clone()),
            username_type: None,
            password: Some(self.password.clone()),
            notes: self.notes.clone(),
            category: None,
            updated_at: None,
        }
    }
}

/// Device-local persistence for the queue.
#[async_trait]
pub trait DeviceStateStore: Send + Sync {
    async fn load_queue(&self) -> Result<Vec<OfflineQueueEntry>, AppError>;
    async fn save_queue(&self, entries: &[OfflineQueueEntry]) -> Result<(), AppError>;
}

/// One submission attempt toward the server. A `Transient` error keeps the
/// entry queued; anything else is treated the same way and retried on the
/// next drain.
#[async_trait]
pub trait CredentialSubmitter: Send + Sync {
    async fn submit(&self, credential: &IncomingCredential) -> Result<(), AppError>;
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct DrainReport {
    pub synced: usize,
    pub failed: usize,
    pub remaining: usize,
}

pub struct OfflineQueue<S> {
    state: S,
}

impl<S: DeviceStateStore> OfflineQueue<S> {
    pub fn new(state: S) -> Self {
        Self { state }
    }

    /// Append a snapshot for later submission.
    pub async fn enqueue(&self, credential: QueuedCredential) -> Result<(), AppError> {
        let mut entries = self.state.load_queue().await?;
        entries.push(OfflineQueueEntry {
            credential,
            saved_at: now_millis(),
            pending_sync: true,
        });
        let queued = entries.len();
        self.state.save_queue(&entries).await?;
        tracing::debug!(queued, "offline queue: snapshot enqueued");
        Ok(())
    }

    pub async fn len(&self) -> Result<usize, AppError> {
        Ok(self.state.load_queue().await?.len())
    }

    pub async fn is_empty(&self) -> Result<bool, AppError> {
        Ok(self.state.load_queue().await?.is_empty())
    }

    /// Submit every queued entry once. Successes leave the queue; failures
    /// stay for the next drain. Not atomic across entries.
    pub async fn drain(&self, submitter: &dyn CredentialSubmitter) -> Result<DrainReport, AppError> {
        let entries = self.state.load_queue().await?;
        if entries.is_empty() {
            return Ok(DrainReport::default());
        }

        tracing::info!(queued = entries.len(), "offline queue: draining");

        let mut report = DrainReport::default();
        let mut remaining = Vec::new();

        for entry in entries {
            match submitter.submit(&entry.credential.to_incoming()).await {
                Ok(()) => report.synced += 1,
                Err(e) => {
                    tracing::warn!(
                        website = %entry.credential.website,
                        error = %e,
                        "offline queue: submission failed, retaining entry"
                    );
                    report.failed += 1;
                    remaining.push(entry);
                }
            }
        }

        report.remaining = remaining.len();
        self.state.save_queue(&remaining).await?;

        tracing::info!(
            synced = report.synced,
            failed = report.failed,
            remaining = report.remaining,
            "offline queue: drain finished"
        );
        Ok(report)
    }
}

/// In-memory device state, for tests and embedded use.
#[derive(Default)]
pub struct MemoryDeviceStore {
    queue: Mutex<Vec<OfflineQueueEntry>>,
}

#[async_trait]
impl DeviceStateStore for MemoryDeviceStore {
    async fn load_queue(&self) -> Result<Vec<OfflineQueueEntry>, AppError> {
        Ok(self.queue.lock().await.clone())
    }

    async fn save_queue(&self, entries: &[OfflineQueueEntry]) -> Result<(), AppError> {
        *self.queue.lock().await = entries.to_vec();
        Ok(())
    }
}
