//! Process configuration loaded from the environment.

use std::path::{Path, PathBuf};

use comment_source::Credential;
use serde::Deserialize;
use tracing::{info, warn};

use crate::{Error, Result};

pub const DEFAULT_DATABASE_URL: &str = "sqlite:comments.db?mode=rwc";
pub const DEFAULT_LOG_DIR: &str = "./logs";

/// Settings read at startup.
///
/// Supported env vars:
/// - `DATABASE_URL`
/// - `LOG_DIR`
/// - `STATIC_DIR`: front-end directory served at `/`
/// - `MONITOR_COOKIES_FILE`: JSON list of `{sessdata, buvid3?, bili_jct?}`
///
/// Bind address and port are read by
/// [`ApiServerConfig::from_env_or_default`](crate::api::ApiServerConfig::from_env_or_default).
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub log_dir: String,
    pub static_dir: Option<PathBuf>,
    pub cookies_file: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            log_dir: DEFAULT_LOG_DIR.to_string(),
            static_dir: None,
            cookies_file: None,
        }
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl AppConfig {
    /// Load from the process environment (after `.env`, if present).
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let defaults = Self::default();
        Self {
            database_url: non_empty_env("DATABASE_URL").unwrap_or(defaults.database_url),
            log_dir: non_empty_env("LOG_DIR").unwrap_or(defaults.log_dir),
            static_dir: non_empty_env("STATIC_DIR").map(PathBuf::from),
            cookies_file: non_empty_env("MONITOR_COOKIES_FILE").map(PathBuf::from),
        }
    }

    /// Credentials from the configured cookie file, or none.
    ///
    /// A configured but unreadable file is an error; unusable entries are dropped.
    pub fn default_credentials(&self) -> Result<Vec<Credential>> {
        match &self.cookies_file {
            Some(path) => load_cookies_file(path),
            None => Ok(Vec::new()),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CookiesFile {
    List(Vec<Credential>),
    Wrapped { cookies: Vec<Credential> },
}

/// Read a JSON cookie list (`[...]` or `{"cookies": [...]}`).
pub fn load_cookies_file(path: &Path) -> Result<Vec<Credential>> {
    let raw = std::fs::read_to_string(path).map_err(|e| {
        Error::config(format!("Cannot read cookies file {}: {}", path.display(), e))
    })?;
    let parsed: CookiesFile = serde_json::from_str(&raw).map_err(|e| {
        Error::config(format!("Invalid cookies file {}: {}", path.display(), e))
    })?;

    let entries = match parsed {
        CookiesFile::List(list) => list,
        CookiesFile::Wrapped { cookies } => cookies,
    };
    let total = entries.len();
    let usable: Vec<Credential> = entries.into_iter().filter(Credential::is_usable).collect();
    if usable.len() < total {
        warn!(
            path = %path.display(),
            skipped = total - usable.len(),
            "cookie entries without SESSDATA ignored"
        );
    }
    info!(path = %path.display(), accounts = usable.len(), "loaded default cookies");
    Ok(usable)
}
