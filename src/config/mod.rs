//! Configuration module for the content backend.
//!
//! All configuration is loaded from environment variables with sensible defaults.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// When the synchronizer is allowed to reach the remote document store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteGating {
    /// Remote access only on admin routes with an authenticated session
    StrictAdmin,
    /// Remote reads and the real-time listener run for every caller
    AlwaysOn,
}

impl FromStr for RemoteGating {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "strict" | "strict-admin" => Ok(RemoteGating::StrictAdmin),
            "always-on" | "always" => Ok(RemoteGating::AlwaysOn),
            other => Err(format!("unknown remote gating mode '{}'", other)),
        }
    }
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Admin credential accepted by the session layer
    pub admin_key: Option<String>,
    /// Email reported for the authenticated admin
    pub admin_email: String,
    /// Display name reported for the authenticated admin
    pub admin_name: String,
    /// Path to the SQLite database holding documents and records
    pub db_path: PathBuf,
    /// Directory for the local content cache
    pub cache_dir: PathBuf,
    /// Address to bind the server to
    pub bind_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    pub gating: RemoteGating,
    pub load_timeout: Duration,
    pub save_timeout: Duration,
    /// Debounce window for editor auto-save
    pub autosave_delay: Duration,
    /// Editor sessions untouched this long are evicted
    pub editor_idle_timeout: Duration,
    /// Delay before the real-time listener attaches
    pub realtime_defer: Duration,
    pub probe_interval: Duration,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let admin_key = env::var("CMS_ADMIN_KEY").ok().filter(|k| !k.is_empty());

        let admin_email =
            env::var("CMS_ADMIN_EMAIL").unwrap_or_else(|_| "admin@localhost".to_string());

        let admin_name = env::var("CMS_ADMIN_NAME").unwrap_or_else(|_| "Site Admin".to_string());

        let db_path = env::var("CMS_DB_PATH")
            .unwrap_or_else(|_| "./data/site.sqlite".to_string())
            .into();

        let cache_dir = env::var("CMS_CACHE_DIR")
            .unwrap_or_else(|_| "./data/cache".to_string())
            .into();

        let bind_addr = env::var("CMS_BIND_ADDR")
            .unwrap_or_else(|_| "127.0.0.1:8080".to_string())
            .parse()
            .expect("Invalid CMS_BIND_ADDR format");

        let log_level = env::var("CMS_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let gating = match env::var("CMS_REMOTE_GATING") {
            Ok(raw) => raw.parse().unwrap_or_else(|e| {
                tracing::warn!("{}, using strict", e);
                RemoteGating::StrictAdmin
            }),
            Err(_) => RemoteGating::StrictAdmin,
        };

        Self {
            admin_key,
            admin_email,
            admin_name,
            db_path,
            cache_dir,
            bind_addr,
            log_level,
            gating,
            load_timeout: millis_var("CMS_LOAD_TIMEOUT_MS", 5000),
            save_timeout: millis_var("CMS_SAVE_TIMEOUT_MS", 10_000),
            autosave_delay: millis_var("CMS_AUTOSAVE_DELAY_MS", 2000),
            editor_idle_timeout: millis_var("CMS_EDITOR_IDLE_MS", 30 * 60 * 1000),
            realtime_defer: millis_var("CMS_REALTIME_DEFER_MS", 1000),
            probe_interval: millis_var("CMS_PROBE_INTERVAL_MS", 15_000),
        }
    }
}

fn millis_var(name: &str, default: u64) -> Duration {
    let millis = match env::var(name) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!("Invalid {} value '{}', using {}", name, raw, default);
            default
        }),
        Err(_) => default,
    };
    Duration::from_millis(millis)
}
