//! Remote document store.
//!
//! The store has no timeouts of its own; every call made by the synchronizer
//! goes through [`bounded`].

mod sqlite;

pub use sqlite::*;

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::broadcast;

use crate::errors::SyncError;

/// Path of the single website content document.
pub const CONTENT_DOCUMENT_PATH: &str = "website/content";

/// A read of one document. `revision` is 0 when the document does not exist.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentSnapshot {
    pub exists: bool,
    pub data: Map<String, Value>,
    pub revision: i64,
}

impl DocumentSnapshot {
    pub fn missing() -> Self {
        Self {
            exists: false,
            data: Map::new(),
            revision: 0,
        }
    }
}

/// Change notification fanned out to every subscriber.
#[derive(Debug, Clone)]
pub struct DocumentChange {
    pub path: String,
    pub snapshot: DocumentSnapshot,
}

/// Remote NoSQL-style document API.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    async fn get_document(&self, path: &str) -> Result<DocumentSnapshot, SyncError>;

    /// Write `data` to `path`. With `merge` the top-level keys are combined
    /// into the stored document, otherwise the document is replaced.
    /// Returns the new revision.
    async fn set_document(
        &self,
        path: &str,
        data: Map<String, Value>,
        merge: bool,
    ) -> Result<i64, SyncError>;

    fn subscribe(&self, path: &str) -> Result<DocumentWatch, SyncError>;
}

/// Receiving half of a document subscription. Dropping it unsubscribes.
pub struct DocumentWatch {
    path: String,
    receiver: broadcast::Receiver<DocumentChange>,
}

impl DocumentWatch {
    pub fn new(path: &str, receiver: broadcast::Receiver<DocumentChange>) -> Self {
        Self {
            path: path.to_string(),
            receiver,
        }
    }

    /// Wait for the next change to the watched document.
    pub async fn next(&mut self) -> Result<DocumentSnapshot, SyncError> {
        loop {
            match self.receiver.recv().await {
                Ok(change) if change.path == self.path => return Ok(change.snapshot),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!("Subscription to {} lagged by {} changes", self.path, n);
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => {
                    return Err(SyncError::Remote(format!(
                        "subscription to {} closed",
                        self.path
                    )));
                }
            }
        }
    }
}

/// Run a remote operation with a deadline. Expiry yields `SyncError::Timeout`.
pub async fn bounded<T, F>(
    operation: &'static str,
    after: Duration,
    future: F,
) -> Result<T, SyncError>
where
    F: Future<Output = Result<T, SyncError>>,
{
    match tokio::time::timeout(after, future).await {
        Ok(result) => result,
        Err(_) => Err(SyncError::Timeout { operation, after }),
    }
}
