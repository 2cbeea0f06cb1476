//! Network status monitor.
//!
//! Observes reachability of the remote document store and grades the link
//! by latency. Publishes `NetworkStatus` on a watch channel; mutates nothing else.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::errors::SyncError;
use crate::models::{ConnectionQuality, NetworkStatus};
use crate::remote::{bounded, RemoteStore, CONTENT_DOCUMENT_PATH};

/// Latency at or above which the connection counts as poor.
pub const POOR_LATENCY: Duration = Duration::from_millis(500);

/// Grade a successful round trip.
pub fn classify(latency: Duration) -> ConnectionQuality {
    if latency >= POOR_LATENCY {
        ConnectionQuality::Poor
    } else {
        ConnectionQuality::Good
    }
}

#[derive(Clone)]
pub struct NetworkMonitor {
    status: Arc<watch::Sender<NetworkStatus>>,
}

impl NetworkMonitor {
    pub fn new() -> Self {
        let (status, _) = watch::channel(NetworkStatus::default());
        Self {
            status: Arc::new(status),
        }
    }

    pub fn status(&self) -> NetworkStatus {
        *self.status.borrow()
    }

    pub fn watch(&self) -> watch::Receiver<NetworkStatus> {
        self.status.subscribe()
    }

    pub fn record_success(&self, latency: Duration) {
        self.publish(NetworkStatus {
            is_online: true,
            connection_quality: classify(latency),
        });
    }

    /// Only transport failures (timeouts and remote errors) mark the link offline.
    pub fn record_failure(&self, err: &SyncError) {
        if err.is_timeout() || matches!(err, SyncError::Remote(_)) {
            self.publish(NetworkStatus {
                is_online: false,
                connection_quality: ConnectionQuality::Offline,
            });
        }
    }

    fn publish(&self, next: NetworkStatus) {
        let changed = self.status.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
        if changed {
            tracing::info!(
                "Network status: online={} quality={:?}",
                next.is_online,
                next.connection_quality
            );
        }
    }

    /// Periodically read the content document to keep the status fresh.
    pub fn spawn_probe(
        &self,
        remote: Arc<dyn RemoteStore>,
        every: Duration,
        timeout: Duration,
    ) -> JoinHandle<()> {
        let monitor = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let started = Instant::now();
                match bounded("probe", timeout, remote.get_document(CONTENT_DOCUMENT_PATH)).await {
                    Ok(_) => monitor.record_success(started.elapsed()),
                    Err(e) => {
                        tracing::debug!("Connectivity probe failed: {}", e);
                        monitor.record_failure(&e);
                    }
                }
            }
        })
    }
}

impl Default for NetworkMonitor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_latency() {
        assert_eq!(classify(Duration::from_millis(40)), ConnectionQuality::Good);
        assert_eq!(classify(Duration::from_millis(500)), ConnectionQuality::Poor);
    }

    #[test]
    fn test_failure_kinds() {
        let monitor = NetworkMonitor::new();
        monitor.record_failure(&SyncError::Serialization("bad".to_string()));
        assert!(monitor.status().is_online);

        monitor.record_failure(&SyncError::Timeout {
            operation: "getDocument",
            after: Duration::from_secs(5),
        });
        assert_eq!(
            monitor.status(),
            NetworkStatus {
                is_online: false,
                connection_quality: ConnectionQuality::Offline,
            }
        );
    }

    #[tokio::test]
    async fn test_watchers_see_reconnect() {
        let monitor = NetworkMonitor::new();
        let mut rx = monitor.watch();

        monitor.record_failure(&SyncError::Remote("down".to_string()));
        rx.changed().await.unwrap();
        assert!(!rx.borrow_and_update().is_online);

        monitor.record_success(Duration::from_millis(10));
        rx.changed().await.unwrap();
        assert!(rx.borrow_and_update().is_online);
    }
}
