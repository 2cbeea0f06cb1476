//! Site CMS Backend
//!
//! Serves website content edited by an admin, kept in sync between an
//! in-memory copy, a local cache and a SQLite-backed document store.

mod api;
mod auth;
mod autosave;
mod cache;
mod config;
mod db;
mod errors;
mod models;
mod network;
mod remote;
mod sync;

use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, patch, post, put},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use auth::{AdminCredential, Session, User};
use autosave::EditorSessions;
use cache::{CacheStore, FileCache, MemoryCache};
use config::{Config, RemoteGating};
use db::RecordRepository;
use network::NetworkMonitor;
use remote::{RemoteStore, SqliteDocumentStore};
use sync::{Access, ContentSync, SyncOptions};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub sync: Arc<ContentSync>,
    pub records: RecordRepository,
    pub editors: EditorSessions,
    pub config: Arc<Config>,
}

impl AppState {
    /// Open storage and wire the synchronizer. Starts the connectivity probe,
    /// the reconnect replay task and the idle editor sweeper.
    pub async fn build(config: Arc<Config>) -> Result<Self, Box<dyn std::error::Error>> {
        let pool = db::init_database(&config.db_path).await?;

        let cache: Arc<dyn CacheStore> = match FileCache::open(&config.cache_dir) {
            Ok(cache) => Arc::new(cache),
            Err(e) => {
                tracing::warn!("Cache directory unusable ({}), caching in memory only", e);
                Arc::new(MemoryCache::new())
            }
        };
        let remote: Arc<dyn RemoteStore> = Arc::new(SqliteDocumentStore::new(pool.clone()));

        let network = NetworkMonitor::new();
        network.spawn_probe(remote.clone(), config.probe_interval, config.load_timeout);

        let sync = Arc::new(ContentSync::new(
            cache,
            remote,
            network,
            SyncOptions::from_config(&config),
        ));
        sync.spawn_reconnect_replay();

        let records = RecordRepository::new(pool);
        let editors = EditorSessions::new(
            records.clone(),
            config.autosave_delay,
            config.editor_idle_timeout,
        );
        editors.spawn_sweeper();

        Ok(Self {
            sync,
            records,
            editors,
            config,
        })
    }

    /// The admin credential accepted by the session layer, if configured.
    pub fn admin_credential(&self) -> Option<Arc<AdminCredential>> {
        let key = self.config.admin_key.clone()?;
        Some(Arc::new(AdminCredential {
            key,
            user: User {
                email: self.config.admin_email.clone(),
                display_name: self.config.admin_name.clone(),
            },
        }))
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::from_env();

    // Initialize logging
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Site CMS Backend");
    tracing::info!("Database path: {:?}", config.db_path);
    tracing::info!("Cache directory: {:?}", config.cache_dir);
    tracing::info!("Bind address: {}", config.bind_addr);
    tracing::info!("Remote gating: {:?}", config.gating);

    if config.admin_key.is_none() {
        tracing::warn!("No admin key configured (CMS_ADMIN_KEY). Content editing is disabled!");
    }

    let bind_addr = config.bind_addr;
    let state = AppState::build(Arc::new(config)).await?;

    // Warm the content with the service's own identity so the cache is fresh
    // before the first public read.
    let boot_session = match state.admin_credential() {
        Some(admin) => Session::authenticated(admin.user.clone()),
        None => Session::anonymous(),
    };
    state.sync.load(&Access::admin(boot_session)).await;

    // Under always-on gating the listener runs for the life of the process.
    let _realtime = match state.config.gating {
        RemoteGating::AlwaysOn => state
            .sync
            .acquire_realtime(&Access::public(Session::anonymous())),
        RemoteGating::StrictAdmin => None,
    };

    // Build router
    let app = create_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    tracing::info!("Server listening on {}", bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Create the application router with all routes.
pub fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let admin = state.admin_credential();

    let api_routes = Router::new()
        // Public content
        .route("/content", get(api::get_content))
        .route("/status", get(api::get_status))
        // Records
        .route("/records/{collection}", get(api::list_records))
        .route("/records/{collection}/{id}", get(api::get_record))
        // Admin content
        .route("/admin/content", patch(api::patch_content))
        .route("/admin/content/load", post(api::load_content))
        .route("/admin/content/save", post(api::save_content))
        .route("/admin/content/reset", post(api::reset_content))
        .route("/admin/content/replay", post(api::replay_pending))
        .route("/admin/content/stream", get(api::stream_content))
        .route("/admin/content/sections/{section}", put(api::put_section))
        .route("/admin/content/paths/{path}", put(api::put_path))
        // Editors
        .route("/admin/editors", post(api::open_editor))
        .route(
            "/admin/editors/{id}",
            get(api::get_editor)
                .patch(api::update_editor)
                .delete(api::close_editor),
        )
        .route("/admin/editors/{id}/save", post(api::save_editor))
        // Resolve the caller's session
        .layer(middleware::from_fn(move |req, next| {
            auth::session_layer(admin.clone(), req, next)
        }));

    // Health check (no auth required)
    let health_routes = Router::new().route("/health", get(health_check));

    Router::new()
        .nest("/api", api_routes)
        .merge(health_routes)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint.
async fn health_check() -> &'static str {
    "OK"
}

#[cfg(test)]
mod tests;
