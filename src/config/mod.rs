//! Configuration module for the draft service.
//!
//! All configuration is loaded from environment variables with sensible defaults.

use std::env;
use std::net::{AddrParseError, SocketAddr};
use std::path::PathBuf;

const MEMORY_DB_PATH: &str = ":memory:";

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Pre-shared key guarding the local API (optional)
    pub api_psk: Option<String>,
    /// Path to the SQLite file holding persisted drafts (`:memory:` keeps drafts in memory only)
    pub db_path: PathBuf,
    /// Name of the single storage entry the draft map is written under
    pub storage_name: String,
    /// Address to bind the server to
    pub bind_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, AddrParseError> {
        dotenvy::dotenv().ok();

        let api_psk = env::var("DRAFTS_API_PSK")
            .ok()
            .filter(|psk| !psk.trim().is_empty());

        let db_path = env::var("DRAFTS_DB_PATH")
            .unwrap_or_else(|_| "./data/drafts.sqlite".to_string())
            .into();

        let storage_name =
            env::var("DRAFTS_STORAGE_NAME").unwrap_or_else(|_| "formdrafts".to_string());

        let bind_addr = env::var("DRAFTS_BIND_ADDR")
            .unwrap_or_else(|_| "127.0.0.1:8787".to_string())
            .parse()?;

        let log_level = env::var("DRAFTS_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            api_psk,
            db_path,
            storage_name,
            bind_addr,
            log_level,
        })
    }

    /// Whether drafts are kept in memory only.
    pub fn in_memory(&self) -> bool {
        self.db_path.as_os_str() == MEMORY_DB_PATH
    }
}
