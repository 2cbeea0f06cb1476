//! Content synchronizer.
//!
//! Owns the in-memory website content and reconciles it with the local cache
//! and the remote document store. Every mutation is applied in memory before
//! any I/O starts; remote calls are bounded and fall back to the cache.

mod merge;
mod realtime;

pub use merge::*;
pub use realtime::RealtimeGuard;

use std::future::Future;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::auth::Session;
use crate::cache::{CacheStore, CONTENT_CACHE_KEY, PENDING_CHANGES_KEY};
use crate::config::{Config, RemoteGating};
use crate::errors::SyncError;
use crate::models::{ContentPath, SectionKey, SyncStatus, WebsiteContent};
use crate::network::NetworkMonitor;
use crate::remote::{bounded, DocumentSnapshot, RemoteStore, CONTENT_DOCUMENT_PATH};

pub const USING_CACHED_CONTENT: &str = "using cached content";
pub const USING_DEFAULT_CONTENT: &str = "using default content";
pub const SAVED_LOCALLY: &str = "changes saved locally, will sync when online";
pub const REALTIME_UNAVAILABLE: &str = "real-time updates unavailable";

/// Timing and gating knobs for the synchronizer.
#[derive(Debug, Clone)]
pub struct SyncOptions {
    pub gating: RemoteGating,
    pub load_timeout: Duration,
    pub save_timeout: Duration,
    pub realtime_defer: Duration,
}

impl SyncOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            gating: config.gating,
            load_timeout: config.load_timeout,
            save_timeout: config.save_timeout,
            realtime_defer: config.realtime_defer,
        }
    }
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            gating: RemoteGating::StrictAdmin,
            load_timeout: Duration::from_secs(5),
            save_timeout: Duration::from_secs(10),
            realtime_defer: Duration::from_secs(1),
        }
    }
}

/// Who is calling, and from where.
#[derive(Debug, Clone, Default)]
pub struct Access {
    pub session: Session,
    /// The call comes from the admin route scope
    pub admin_route: bool,
}

impl Access {
    pub fn public(session: Session) -> Self {
        Self {
            session,
            admin_route: false,
        }
    }

    pub fn admin(session: Session) -> Self {
        Self {
            session,
            admin_route: true,
        }
    }
}

/// Observable synchronizer state.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentState {
    pub content: WebsiteContent,
    pub is_loading: bool,
    pub load_error: Option<String>,
}

/// How far a mutation got.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum WriteOutcome {
    /// Written to the remote store
    Persisted { revision: i64 },
    /// Remote access is not enabled for this caller; cached only
    LocalOnly,
    /// Remote write failed; kept in the pending slot
    Pending,
    /// No authenticated session; nothing happened
    Skipped,
}

/// What a remote write carries, which decides how it settles the pending slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriteScope {
    /// One section, merged
    Section,
    /// The whole document, merged
    Document,
    /// The whole document, replacing what is stored
    Replace,
}

/// Decrements the in-flight write counter even if the write future is dropped.
struct InFlight<'a>(&'a AtomicUsize);

impl<'a> InFlight<'a> {
    fn start(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

pub struct ContentSync {
    state: watch::Sender<ContentState>,
    cache: Arc<dyn CacheStore>,
    remote: Arc<dyn RemoteStore>,
    network: NetworkMonitor,
    options: SyncOptions,
    /// Highest remote revision acknowledged or applied
    last_revision: Arc<AtomicI64>,
    saving: AtomicUsize,
    /// Serializes remote content writes, replays included
    write_lock: tokio::sync::Mutex<()>,
    /// Bumped on every content cache write; a background mirror only lands
    /// if nothing newer was written after it was scheduled
    cache_epoch: Arc<Mutex<u64>>,
    last_saved: Mutex<Option<DateTime<Utc>>>,
    realtime: Mutex<Weak<realtime::RealtimeTask>>,
}

impl ContentSync {
    /// Build the synchronizer, painting from the cached snapshot if one exists.
    pub fn new(
        cache: Arc<dyn CacheStore>,
        remote: Arc<dyn RemoteStore>,
        network: NetworkMonitor,
        options: SyncOptions,
    ) -> Self {
        let content = match read_slot(cache.as_ref(), CONTENT_CACHE_KEY) {
            Some(cached) => merge_sections(&WebsiteContent::defaults(), &cached),
            None => WebsiteContent::defaults(),
        };

        let (state, _) = watch::channel(ContentState {
            content,
            is_loading: false,
            load_error: None,
        });

        Self {
            state,
            cache,
            remote,
            network,
            options,
            last_revision: Arc::new(AtomicI64::new(0)),
            saving: AtomicUsize::new(0),
            write_lock: tokio::sync::Mutex::new(()),
            cache_epoch: Arc::new(Mutex::new(0)),
            last_saved: Mutex::new(None),
            realtime: Mutex::new(Weak::new()),
        }
    }

    pub fn content(&self) -> WebsiteContent {
        self.state.borrow().content.clone()
    }

    pub fn snapshot(&self) -> ContentState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ContentState> {
        self.state.subscribe()
    }

    pub fn last_revision(&self) -> i64 {
        self.last_revision.load(Ordering::SeqCst)
    }

    pub fn network(&self) -> &NetworkMonitor {
        &self.network
    }

    pub fn status(&self) -> SyncStatus {
        if self.saving.load(Ordering::SeqCst) > 0 {
            return SyncStatus::Saving;
        }
        if let Some(reason) = self.state.borrow().load_error.clone() {
            return SyncStatus::Degraded { reason };
        }
        match *self.last_saved.lock().unwrap_or_else(PoisonError::into_inner) {
            Some(at) => SyncStatus::Saved { at },
            None => SyncStatus::Idle,
        }
    }

    /// Whether this caller may reach the remote document store.
    pub fn remote_enabled(&self, access: &Access) -> bool {
        match self.options.gating {
            RemoteGating::AlwaysOn => true,
            RemoteGating::StrictAdmin => access.admin_route && access.session.is_authenticated(),
        }
    }

    /// Load content. Never fails: degraded outcomes are reported via `load_error`.
    pub async fn load(&self, access: &Access) {
        self.state.send_modify(|s| s.is_loading = true);

        if !self.remote_enabled(access) {
            let content = self.cached_or_defaults();
            self.state.send_modify(|s| {
                s.content = content;
                s.is_loading = false;
                s.load_error = None;
            });
            return;
        }

        let started = Instant::now();
        let fetched = bounded(
            "getDocument",
            self.options.load_timeout,
            self.remote.get_document(CONTENT_DOCUMENT_PATH),
        )
        .await;

        match fetched {
            Ok(snapshot) if snapshot.exists => {
                self.network.record_success(started.elapsed());
                self.note_revision(snapshot.revision);
                let content = merge_sections(&WebsiteContent::defaults(), &snapshot.data);
                self.mirror_to_cache(&content);
                self.state.send_modify(|s| {
                    s.content = content;
                    s.is_loading = false;
                    s.load_error = None;
                });
                tracing::debug!("Loaded content at revision {}", snapshot.revision);
            }
            Ok(_) => {
                self.network.record_success(started.elapsed());
                let defaults = WebsiteContent::defaults();
                if access.session.is_authenticated() {
                    self.spawn_create_document(&defaults);
                }
                self.state.send_modify(|s| {
                    s.content = defaults;
                    s.is_loading = false;
                    s.load_error = None;
                });
            }
            Err(e) => {
                tracing::warn!("Remote load failed: {}", e);
                self.network.record_failure(&e);
                let (content, reason) = match read_slot(self.cache.as_ref(), CONTENT_CACHE_KEY) {
                    Some(cached) => (
                        merge_sections(&WebsiteContent::defaults(), &cached),
                        USING_CACHED_CONTENT,
                    ),
                    None => (WebsiteContent::defaults(), USING_DEFAULT_CONTENT),
                };
                self.state.send_modify(|s| {
                    s.content = content;
                    s.is_loading = false;
                    s.load_error = Some(reason.to_string());
                });
            }
        }
    }

    /// Persist the current content.
    pub async fn save(&self, access: &Access) -> Result<WriteOutcome, SyncError> {
        if !access.session.is_authenticated() {
            tracing::warn!("saveContent skipped: no authenticated session");
            return Ok(WriteOutcome::Skipped);
        }
        let content = self.content();
        let payload = content.to_map()?;
        self.persist(access, &content, payload, WriteScope::Document)
            .await
    }

    /// Shallow-merge `patch` over the content, then persist the result.
    ///
    /// The in-memory update happens before this returns; the returned future
    /// only performs I/O.
    pub fn update_content<'a>(
        &'a self,
        access: &'a Access,
        patch: Map<String, Value>,
    ) -> impl Future<Output = Result<WriteOutcome, SyncError>> + Send + 'a {
        let applied = self.apply_optimistic("updateContent", access, |content| {
            apply_patch(content, patch)
        });
        async move {
            let Some(content) = applied? else {
                return Ok(WriteOutcome::Skipped);
            };
            let payload = content.to_map()?;
            self.persist(access, &content, payload, WriteScope::Document)
                .await
        }
    }

    /// Replace one section wholesale. Only that section is sent remotely.
    pub fn update_section<'a>(
        &'a self,
        access: &'a Access,
        section: SectionKey,
        data: Value,
    ) -> impl Future<Output = Result<WriteOutcome, SyncError>> + Send + 'a {
        let applied = self.apply_optimistic("updateSection", access, |content| {
            content.set_section(section, data)
        });
        async move {
            let Some(content) = applied? else {
                return Ok(WriteOutcome::Skipped);
            };
            let mut payload = Map::new();
            payload.insert(section.as_str().to_string(), content.section_value(section)?);
            self.persist(access, &content, payload, WriteScope::Section)
                .await
        }
    }

    /// Set the value at `path`, creating missing intermediate objects, then
    /// persist the whole document.
    pub fn update_nested_content<'a>(
        &'a self,
        access: &'a Access,
        path: ContentPath,
        data: Value,
    ) -> impl Future<Output = Result<WriteOutcome, SyncError>> + Send + 'a {
        let applied = self.apply_optimistic("updateNestedContent", access, |content| {
            let root = path.root().key().to_string();
            let current = content.key_value(&root)?.unwrap_or(Value::Null);
            let updated = path.set_within(current, data)?;
            content.set_key(&root, updated)
        });
        async move {
            let Some(content) = applied? else {
                return Ok(WriteOutcome::Skipped);
            };
            let payload = content.to_map()?;
            self.persist(access, &content, payload, WriteScope::Document)
                .await
        }
    }

    /// Replace the content with defaults and overwrite the remote document.
    pub fn reset_content<'a>(
        &'a self,
        access: &'a Access,
    ) -> impl Future<Output = Result<WriteOutcome, SyncError>> + Send + 'a {
        let applied = self.apply_optimistic("resetContent", access, |content| {
            *content = WebsiteContent::defaults();
            Ok(())
        });
        async move {
            let Some(content) = applied? else {
                return Ok(WriteOutcome::Skipped);
            };
            let payload = content.to_map()?;
            self.persist(access, &content, payload, WriteScope::Replace)
                .await
        }
    }

    /// Push the pending slot to the remote store. Returns whether anything was sent.
    pub async fn replay_pending(&self) -> Result<bool, SyncError> {
        let _serial = self.write_lock.lock().await;
        let raw = match self.cache.get(PENDING_CHANGES_KEY)? {
            Some(raw) => raw,
            None => return Ok(false),
        };

        let pending = match parse_map(&raw) {
            Ok(pending) => pending,
            Err(e) => {
                tracing::warn!("Discarding unreadable pending changes: {}", e);
                self.cache.remove(PENDING_CHANGES_KEY)?;
                return Ok(false);
            }
        };

        let started = Instant::now();
        let written = bounded(
            "setDocument",
            self.options.save_timeout,
            self.remote.set_document(CONTENT_DOCUMENT_PATH, pending, true),
        )
        .await;

        let revision = match written {
            Ok(revision) => revision,
            Err(e) => {
                self.network.record_failure(&e);
                return Err(e);
            }
        };

        self.network.record_success(started.elapsed());
        self.note_revision(revision);
        match serde_json::to_string(&self.content()) {
            Ok(encoded) => self.store_snapshot(&encoded),
            Err(e) => tracing::warn!("Failed to encode content after replay: {}", e),
        }
        // Only clear the slot if it still holds what was just sent.
        match self.cache.get(PENDING_CHANGES_KEY) {
            Ok(Some(current)) if current == raw => {
                if let Err(e) = self.cache.remove(PENDING_CHANGES_KEY) {
                    tracing::warn!("Failed to clear pending changes: {}", e);
                }
            }
            Ok(_) => tracing::debug!("Pending slot changed during replay, keeping it"),
            Err(e) => tracing::warn!("Failed to re-read pending changes: {}", e),
        }
        self.state.send_if_modified(|s| {
            if s.load_error.as_deref() == Some(SAVED_LOCALLY) {
                s.load_error = None;
                true
            } else {
                false
            }
        });
        tracing::info!("Replayed pending changes at revision {}", revision);
        Ok(true)
    }

    /// Replay pending changes whenever the network monitor comes back online.
    pub fn spawn_reconnect_replay(self: &Arc<Self>) -> JoinHandle<()> {
        let mut status = self.network.watch();
        let sync = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut was_online = status.borrow_and_update().is_online;
            while status.changed().await.is_ok() {
                let online = status.borrow_and_update().is_online;
                if online && !was_online {
                    let Some(sync) = sync.upgrade() else {
                        return;
                    };
                    if let Err(e) = sync.replay_pending().await {
                        tracing::warn!("Pending replay failed: {}", e);
                    }
                }
                was_online = online;
            }
        })
    }

    /// Apply a mutation to the in-memory content atomically. `None` means
    /// the caller is not authenticated and nothing changed.
    fn apply_optimistic<F>(
        &self,
        operation: &str,
        access: &Access,
        mutate: F,
    ) -> Result<Option<WebsiteContent>, SyncError>
    where
        F: FnOnce(&mut WebsiteContent) -> Result<(), SyncError>,
    {
        if !access.session.is_authenticated() {
            tracing::warn!("{} skipped: no authenticated session", operation);
            return Ok(None);
        }

        let mut result = Ok(None);
        self.state.send_if_modified(|s| {
            let mut next = s.content.clone();
            match mutate(&mut next) {
                Ok(()) => {
                    s.content = next.clone();
                    result = Ok(Some(next));
                    true
                }
                Err(e) => {
                    result = Err(e);
                    false
                }
            }
        });
        result
    }

    /// Cache, then write remotely with a deadline; on failure keep the
    /// content in the pending slot.
    async fn persist(
        &self,
        access: &Access,
        content: &WebsiteContent,
        payload: Map<String, Value>,
        scope: WriteScope,
    ) -> Result<WriteOutcome, SyncError> {
        let encoded = serde_json::to_string(content)?;
        self.store_snapshot(&encoded);

        if !self.remote_enabled(access) {
            return Ok(WriteOutcome::LocalOnly);
        }

        let _in_flight = InFlight::start(&self.saving);
        let _serial = self.write_lock.lock().await;
        let started = Instant::now();
        let written = bounded(
            "setDocument",
            self.options.save_timeout,
            self.remote
                .set_document(CONTENT_DOCUMENT_PATH, payload, scope != WriteScope::Replace),
        )
        .await;

        match written {
            Ok(revision) => {
                // Before reporting success: coming back online triggers a replay.
                self.settle_pending(scope, &encoded);
                self.network.record_success(started.elapsed());
                self.note_revision(revision);
                *self.last_saved.lock().unwrap_or_else(PoisonError::into_inner) = Some(Utc::now());
                self.state.send_if_modified(|s| {
                    let changed = s.load_error.is_some();
                    s.load_error = None;
                    changed
                });
                Ok(WriteOutcome::Persisted { revision })
            }
            Err(e) => {
                tracing::warn!("Remote write failed, keeping changes locally: {}", e);
                self.network.record_failure(&e);
                if let Err(cache_err) = self.cache.set(PENDING_CHANGES_KEY, &encoded) {
                    tracing::error!("Could not store pending changes: {}", cache_err);
                    return Err(e);
                }
                self.state.send_modify(|s| s.load_error = Some(SAVED_LOCALLY.to_string()));
                Ok(WriteOutcome::Pending)
            }
        }
    }

    /// A successful write supersedes an older pending document. If the write
    /// carried the whole current content the slot is redundant; otherwise it
    /// is refreshed from the current content so a replay cannot roll back
    /// what was just written.
    fn settle_pending(&self, scope: WriteScope, sent: &str) {
        let settled = match self.cache.get(PENDING_CHANGES_KEY) {
            Ok(None) => return,
            Ok(Some(_)) => match serde_json::to_string(&self.content()) {
                Ok(current) if scope != WriteScope::Section && current == sent => {
                    self.cache.remove(PENDING_CHANGES_KEY)
                }
                Ok(current) => self.cache.set(PENDING_CHANGES_KEY, &current),
                Err(e) => Err(e.into()),
            },
            Err(e) => Err(e),
        };
        if let Err(e) = settled {
            tracing::warn!("Failed to settle pending changes: {}", e);
        }
    }

    /// Write the content snapshot to the cache now.
    fn store_snapshot(&self, encoded: &str) {
        let mut epoch = self.cache_epoch.lock().unwrap_or_else(PoisonError::into_inner);
        *epoch += 1;
        if let Err(e) = self.cache.set(CONTENT_CACHE_KEY, encoded) {
            tracing::warn!("Failed to cache content: {}", e);
        }
    }

    fn note_revision(&self, revision: i64) {
        self.last_revision.fetch_max(revision, Ordering::SeqCst);
    }

    /// Apply a change notification unless it is older than what we have.
    /// Returns whether the content was replaced.
    fn apply_notification(&self, snapshot: DocumentSnapshot) -> bool {
        if !snapshot.exists {
            return false;
        }
        let previous = self.last_revision.fetch_max(snapshot.revision, Ordering::SeqCst);
        if snapshot.revision <= previous {
            tracing::debug!(
                "Dropping stale notification at revision {} (have {})",
                snapshot.revision,
                previous
            );
            return false;
        }

        let content = merge_sections(&WebsiteContent::defaults(), &snapshot.data);
        self.mirror_to_cache(&content);
        self.state.send_modify(|s| s.content = content);
        true
    }

    fn set_load_error(&self, reason: &str) {
        self.state.send_modify(|s| s.load_error = Some(reason.to_string()));
    }

    fn cached_or_defaults(&self) -> WebsiteContent {
        match read_slot(self.cache.as_ref(), CONTENT_CACHE_KEY) {
            Some(cached) => merge_sections(&WebsiteContent::defaults(), &cached),
            None => WebsiteContent::defaults(),
        }
    }

    /// Write the snapshot to the cache in the background and log the result.
    /// Skipped if a newer snapshot was cached in the meantime.
    fn mirror_to_cache(&self, content: &WebsiteContent) {
        let cache = Arc::clone(&self.cache);
        let epoch = Arc::clone(&self.cache_epoch);
        let ticket = {
            let mut current = epoch.lock().unwrap_or_else(PoisonError::into_inner);
            *current += 1;
            *current
        };
        let encoded = serde_json::to_string(content);
        tokio::spawn(async move {
            let encoded = match encoded {
                Ok(encoded) => encoded,
                Err(e) => {
                    tracing::warn!("Failed to encode content for cache: {}", e);
                    return;
                }
            };
            let written = tokio::task::spawn_blocking(move || {
                let current = epoch.lock().unwrap_or_else(PoisonError::into_inner);
                if *current != ticket {
                    return Ok(false);
                }
                cache.set(CONTENT_CACHE_KEY, &encoded).map(|()| true)
            })
            .await;
            match written {
                Ok(Ok(true)) => tracing::debug!("Mirrored content to cache"),
                Ok(Ok(false)) => tracing::debug!("Skipped stale cache mirror"),
                Ok(Err(e)) => tracing::warn!("Failed to mirror content to cache: {}", e),
                Err(e) => tracing::warn!("Cache mirror task failed: {}", e),
            }
        });
    }

    /// Best-effort creation of a missing remote document from defaults.
    fn spawn_create_document(&self, defaults: &WebsiteContent) {
        let remote = Arc::clone(&self.remote);
        let last_revision = Arc::clone(&self.last_revision);
        let timeout = self.options.save_timeout;
        let payload = defaults.to_map();
        tokio::spawn(async move {
            let payload = match payload {
                Ok(payload) => payload,
                Err(e) => {
                    tracing::warn!("Failed to encode default content: {}", e);
                    return;
                }
            };
            let created = bounded(
                "setDocument",
                timeout,
                remote.set_document(CONTENT_DOCUMENT_PATH, payload, false),
            )
            .await;
            match created {
                Ok(revision) => {
                    last_revision.fetch_max(revision, Ordering::SeqCst);
                    tracing::info!("Created content document from defaults");
                }
                Err(e) => tracing::debug!("Could not create content document: {}", e),
            }
        });
    }
}

/// Read a cache slot as a JSON object. Any failure reads as empty.
fn read_slot(cache: &dyn CacheStore, key: &str) -> Option<Map<String, Value>> {
    let raw = match cache.get(key) {
        Ok(Some(raw)) => raw,
        Ok(None) => return None,
        Err(e) => {
            tracing::warn!("Failed to read cache slot {}: {}", key, e);
            return None;
        }
    };
    match parse_map(&raw) {
        Ok(map) => Some(map),
        Err(e) => {
            tracing::warn!("Ignoring malformed cache slot {}: {}", key, e);
            None
        }
    }
}
