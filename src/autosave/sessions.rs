//! Open editor sessions, one auto-save controller each.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;
use uuid::Uuid;

use super::{AutoSave, CollectionService};
use crate::db::RecordRepository;
use crate::models::Entry;

pub type EntryEditor = AutoSave<Entry, CollectionService>;

/// An editor opened on one record of a collection.
pub struct EditorSession {
    pub collection: String,
    pub editor: Arc<EntryEditor>,
    last_used: Mutex<Instant>,
}

impl EditorSession {
    fn touch(&self) {
        *self.last_used.lock().unwrap_or_else(PoisonError::into_inner) = Instant::now();
    }

    fn idle_since(&self) -> Instant {
        *self.last_used.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Registry of open editors keyed by session id.
///
/// Closing a session drops its controller, which cancels any pending
/// auto-save timer. Sessions nobody has looked up for `idle_timeout` are
/// evicted on the next `open` or sweep; unsaved edits are flushed first.
#[derive(Clone)]
pub struct EditorSessions {
    repo: RecordRepository,
    delay: Duration,
    idle_timeout: Duration,
    open: Arc<Mutex<HashMap<Uuid, Arc<EditorSession>>>>,
}

impl EditorSessions {
    pub fn new(repo: RecordRepository, delay: Duration, idle_timeout: Duration) -> Self {
        Self {
            repo,
            delay,
            idle_timeout,
            open: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Open an editor hydrated with `initial`.
    pub fn open(&self, collection: &str, initial: Entry, editor_name: &str) -> Uuid {
        self.evict_idle();

        let service = CollectionService::new(self.repo.clone(), collection);
        let editor = AutoSave::new(Entry::default(), service, editor_name, self.delay);
        editor.update_data(|entry| *entry = initial);

        let id = Uuid::new_v4();
        let session = EditorSession {
            collection: collection.to_string(),
            editor: Arc::new(editor),
            last_used: Mutex::new(Instant::now()),
        };
        self.sessions().insert(id, Arc::new(session));
        tracing::debug!(session = %id, collection = %collection, "Editor opened");
        id
    }

    /// Look up an open editor and mark it as in use.
    pub fn get(&self, id: &Uuid) -> Option<Arc<EditorSession>> {
        let session = self.sessions().get(id).cloned()?;
        session.touch();
        Some(session)
    }

    /// Close an editor. Returns false when no such session is open.
    pub fn close(&self, id: &Uuid) -> bool {
        let removed = self.sessions().remove(id);
        if removed.is_some() {
            tracing::debug!(session = %id, "Editor closed");
        }
        removed.is_some()
    }

    /// Drop every session idle for longer than the timeout. Returns how many
    /// were evicted.
    pub fn evict_idle(&self) -> usize {
        let now = Instant::now();
        let evicted: Vec<(Uuid, Arc<EditorSession>)> = {
            let mut sessions = self.sessions();
            let idle: Vec<Uuid> = sessions
                .iter()
                .filter(|(_, session)| {
                    now.saturating_duration_since(session.idle_since()) > self.idle_timeout
                })
                .map(|(id, _)| *id)
                .collect();
            idle.into_iter()
                .filter_map(|id| sessions.remove(&id).map(|session| (id, session)))
                .collect()
        };

        for (id, session) in &evicted {
            if session.editor.should_confirm_leave() {
                tracing::info!(session = %id, "Saving idle editor before eviction");
                let editor = Arc::clone(&session.editor);
                let id = *id;
                tokio::spawn(async move {
                    if let Err(e) = editor.save().await {
                        tracing::warn!(
                            session = %id,
                            error = %e,
                            "Final save of idle editor failed"
                        );
                    }
                });
            } else {
                tracing::debug!(session = %id, "Idle editor evicted");
            }
        }
        evicted.len()
    }

    /// Sweep idle sessions periodically, in case nobody opens a new one.
    pub fn spawn_sweeper(&self) -> JoinHandle<()> {
        let sessions = self.clone();
        let period = (self.idle_timeout / 2).max(Duration::from_secs(1));
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                sessions.evict_idle();
            }
        })
    }

    fn sessions(&self) -> std::sync::MutexGuard<'_, HashMap<Uuid, Arc<EditorSession>>> {
        self.open.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
