//! Debounced auto-save for per-entity editors.
//!
//! Each editor owns an [`AutoSave`] controller. Updates apply to the working
//! copy immediately and restart a single timer; when the timer fires the
//! current data is created (first save) or updated (afterwards) through a
//! [`RecordService`]. Aborting the timer never cancels a save that already
//! started.

mod service;
mod sessions;

pub use service::*;
pub use sessions::*;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::task::JoinHandle;

use crate::errors::AppError;
use crate::models::EditableRecord;

/// Quiet period before an auto-save fires.
pub const DEFAULT_AUTOSAVE_DELAY: Duration = Duration::from_millis(2000);

/// Observable controller state.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoSaveState<T> {
    pub data: T,
    pub is_saving: bool,
    pub last_saved: Option<DateTime<Utc>>,
    pub has_unsaved_changes: bool,
    pub error: Option<String>,
}

struct Working<T> {
    data: T,
    hydrated: bool,
    edits: u64,
    is_saving: bool,
    last_saved: Option<DateTime<Utc>>,
    has_unsaved_changes: bool,
    error: Option<String>,
    timer: Option<JoinHandle<()>>,
}

struct Shared<T, S> {
    working: Mutex<Working<T>>,
    service: S,
    editor: String,
    delay: Duration,
    // Serializes saves so a manual save racing the timer cannot create twice.
    save_lock: tokio::sync::Mutex<()>,
}

impl<T: EditableRecord, S: RecordService<T>> Shared<T, S> {
    fn working(&self) -> MutexGuard<'_, Working<T>> {
        self.working.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn save(&self) -> Result<(), AppError> {
        let _serial = self.save_lock.lock().await;

        let (data, edits) = {
            let mut working = self.working();
            working.is_saving = true;
            (working.data.clone(), working.edits)
        };

        let result = match data.id() {
            Some(id) => self
                .service
                .update(id, &data, &self.editor)
                .await
                .map(|()| None),
            None => self.service.create(&data, &self.editor).await.map(Some),
        };

        let mut working = self.working();
        working.is_saving = false;
        match result {
            Ok(created) => {
                if let Some(id) = created {
                    tracing::debug!(id = %id, "Record created by auto-save");
                    working.data.set_id(id);
                }
                working.last_saved = Some(Utc::now());
                working.error = None;
                // Edits made while the write was in flight stay unsaved.
                if working.edits == edits {
                    working.has_unsaved_changes = false;
                }
                Ok(())
            }
            Err(e) => {
                tracing::warn!(error = %e, "Auto-save failed");
                working.error = Some(e.to_string());
                Err(e)
            }
        }
    }
}

/// Debounced save controller for one editable record.
pub struct AutoSave<T: EditableRecord, S: RecordService<T>> {
    shared: Arc<Shared<T, S>>,
}

impl<T: EditableRecord, S: RecordService<T>> AutoSave<T, S> {
    pub fn new(initial: T, service: S, editor: &str, delay: Duration) -> Self {
        Self {
            shared: Arc::new(Shared {
                working: Mutex::new(Working {
                    data: initial,
                    hydrated: false,
                    edits: 0,
                    is_saving: false,
                    last_saved: None,
                    has_unsaved_changes: false,
                    error: None,
                    timer: None,
                }),
                service,
                editor: editor.to_string(),
                delay,
                save_lock: tokio::sync::Mutex::new(()),
            }),
        }
    }

    /// Apply `updater` to the working copy and restart the save timer.
    ///
    /// The first call only hydrates the editor with loaded data and does not
    /// mark it dirty or schedule a save.
    pub fn update_data(&self, updater: impl FnOnce(&mut T)) {
        let mut working = self.shared.working();
        updater(&mut working.data);

        if !working.hydrated {
            working.hydrated = true;
            return;
        }

        working.edits += 1;
        working.has_unsaved_changes = true;

        if let Some(timer) = working.timer.take() {
            timer.abort();
        }

        let shared = Arc::downgrade(&self.shared);
        let delay = self.shared.delay;
        working.timer = Some(tokio::spawn(fire_after(shared, delay)));
    }

    /// Save now, bypassing the timer.
    pub async fn save(&self) -> Result<(), AppError> {
        self.shared.save().await
    }

    /// Whether leaving the editor would lose edits.
    pub fn should_confirm_leave(&self) -> bool {
        self.shared.working().has_unsaved_changes
    }

    pub fn state(&self) -> AutoSaveState<T> {
        let working = self.shared.working();
        AutoSaveState {
            data: working.data.clone(),
            is_saving: working.is_saving,
            last_saved: working.last_saved,
            has_unsaved_changes: working.has_unsaved_changes,
            error: working.error.clone(),
        }
    }
}

impl<T: EditableRecord, S: RecordService<T>> Drop for AutoSave<T, S> {
    fn drop(&mut self) {
        if let Some(timer) = self.shared.working().timer.take() {
            timer.abort();
        }
    }
}

/// Timer body. The save runs on its own task so a later abort of this timer
/// leaves it running.
async fn fire_after<T: EditableRecord, S: RecordService<T>>(
    shared: Weak<Shared<T, S>>,
    delay: Duration,
) {
    tokio::time::sleep(delay).await;
    let Some(shared) = shared.upgrade() else {
        return;
    };
    tokio::spawn(async move {
        let _ = shared.save().await;
    });
}
