//! Derived status values surfaced to the UI as badges.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Synchronization state of the content document. Never gates correctness.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum SyncStatus {
    Idle,
    Saving,
    Saved { at: DateTime<Utc> },
    Degraded { reason: String },
}

/// Coarse bandwidth class of the link to the remote store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConnectionQuality {
    Unknown,
    Good,
    Poor,
    Offline,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkStatus {
    pub is_online: bool,
    pub connection_quality: ConnectionQuality,
}

impl Default for NetworkStatus {
    fn default() -> Self {
        Self {
            is_online: true,
            connection_quality: ConnectionQuality::Unknown,
        }
    }
}
