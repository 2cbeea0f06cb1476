//! Real-time listener on the remote content document.
//!
//! One listener per synchronizer, shared by every guard. The listener
//! attaches after a short delay and stops when the last guard is dropped.

use std::sync::{Arc, PoisonError, Weak};

use tokio::task::JoinHandle;

use super::{Access, ContentSync, REALTIME_UNAVAILABLE};
use crate::remote::CONTENT_DOCUMENT_PATH;

pub(super) struct RealtimeTask {
    handle: JoinHandle<()>,
}

impl Drop for RealtimeTask {
    fn drop(&mut self) {
        self.handle.abort();
        tracing::debug!("Real-time listener stopped");
    }
}

/// Keeps the real-time listener alive while held.
#[derive(Clone)]
pub struct RealtimeGuard {
    _task: Arc<RealtimeTask>,
}

impl ContentSync {
    /// Start (or join) the real-time listener. Returns `None` when remote
    /// access is not enabled for this caller.
    pub fn acquire_realtime(self: &Arc<Self>, access: &Access) -> Option<RealtimeGuard> {
        if !self.remote_enabled(access) {
            return None;
        }

        let mut slot = self.realtime.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(task) = slot.upgrade() {
            return Some(RealtimeGuard { _task: task });
        }

        let sync = Arc::downgrade(self);
        let defer = self.options.realtime_defer;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(defer).await;
            listen(sync).await;
        });

        let task = Arc::new(RealtimeTask { handle });
        *slot = Arc::downgrade(&task);
        tracing::debug!("Real-time listener scheduled");
        Some(RealtimeGuard { _task: task })
    }

    /// Whether a listener is currently held by at least one guard.
    pub fn realtime_active(&self) -> bool {
        self.realtime
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .strong_count()
            > 0
    }
}

async fn listen(sync: Weak<ContentSync>) {
    let subscribed = match sync.upgrade() {
        Some(sync) => sync.remote.subscribe(CONTENT_DOCUMENT_PATH),
        None => return,
    };

    let mut watch = match subscribed {
        Ok(watch) => watch,
        Err(e) => {
            tracing::warn!("Real-time subscription failed: {}", e);
            if let Some(sync) = sync.upgrade() {
                sync.set_load_error(REALTIME_UNAVAILABLE);
            }
            return;
        }
    };
    tracing::info!("Real-time listener attached to {}", CONTENT_DOCUMENT_PATH);

    loop {
        let next = watch.next().await;
        let Some(sync) = sync.upgrade() else {
            return;
        };
        match next {
            Ok(snapshot) => {
                if sync.apply_notification(snapshot) {
                    tracing::debug!("Applied remote change at revision {}", sync.last_revision());
                }
            }
            Err(e) => {
                tracing::warn!("Real-time updates stopped: {}", e);
                sync.set_load_error(REALTIME_UNAVAILABLE);
                return;
            }
        }
    }
}
