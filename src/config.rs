use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

use crate::session::HeartbeatConfig;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct NotesConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub transport: TransportConfig,
    pub limits: LimitsConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub max_body_bytes: usize,
    /// Lifetime of the `user_id` cookie set on register and login.
    pub session_max_age_days: i64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    pub db_path: String,
    pub pool_size: usize,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct TransportConfig {
    pub heartbeat_interval_ms: u64,
    pub heartbeat_start_delay_ms: u64,
    /// Consecutive beats skipped on a full buffer before the peer counts as stalled.
    pub max_missed_heartbeats: u32,
    /// How long a response may wait for buffer space before the session is dropped.
    pub write_timeout_ms: u64,
    pub channel_capacity: usize,
    pub message_path: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LimitsConfig {
    pub notes_default_limit: usize,
    pub notes_max_limit: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 31111,
            log_level: "info".into(),
            max_body_bytes: 1024 * 1024,
            session_max_age_days: 30,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        let db_path = default_notes_dir()
            .join("notes.db")
            .to_string_lossy()
            .into_owned();
        Self {
            db_path,
            pool_size: 4,
        }
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval_ms: 15_000,
            heartbeat_start_delay_ms: 2_000,
            max_missed_heartbeats: 3,
            write_timeout_ms: 10_000,
            channel_capacity: 64,
            message_path: "/mcp/messages".into(),
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            notes_default_limit: 10,
            notes_max_limit: 100,
        }
    }
}

impl TransportConfig {
    pub fn heartbeat(&self) -> HeartbeatConfig {
        HeartbeatConfig {
            start_delay: Duration::from_millis(self.heartbeat_start_delay_ms),
            interval: Duration::from_millis(self.heartbeat_interval_ms.max(1)),
            max_missed: self.max_missed_heartbeats.max(1),
        }
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms.max(1))
    }
}

impl LimitsConfig {
    /// Clamp a requested page size into `1..=notes_max_limit`, defaulting when absent.
    pub fn clamp(&self, requested: Option<i64>) -> usize {
        let max = self.notes_max_limit.max(1);
        match requested {
            Some(n) => n.clamp(1, max as i64) as usize,
            None => self.notes_default_limit.clamp(1, max),
        }
    }
}

/// Returns `~/.local-notes/`, or `./.local-notes` when there is no home directory.
pub fn default_notes_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".local-notes")
}

/// Returns the default config file path: `~/.local-notes/config.toml`
pub fn default_config_path() -> PathBuf {
    default_notes_dir().join("config.toml")
}

impl NotesConfig {
    /// Load config from TOML file (if it exists) then apply env var overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(default_config_path())
    }

    /// Load from a specific path, then apply env var overrides.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let contents =
                std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str(&contents).context("failed to parse config TOML")?
        } else {
            info!("no config file at {}, using defaults", path.display());
            NotesConfig::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply `LOCAL_NOTES_*` environment overrides. Unparseable numbers are ignored.
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("LOCAL_NOTES_DB") {
            self.storage.db_path = val;
        }
        if let Ok(val) = std::env::var("LOCAL_NOTES_HOST") {
            self.server.host = val;
        }
        if let Ok(val) = std::env::var("LOCAL_NOTES_LOG_LEVEL") {
            self.server.log_level = val;
        }
        override_parsed("LOCAL_NOTES_PORT", &mut self.server.port);
        override_parsed(
            "LOCAL_NOTES_HEARTBEAT_INTERVAL_MS",
            &mut self.transport.heartbeat_interval_ms,
        );
        override_parsed(
            "LOCAL_NOTES_HEARTBEAT_START_DELAY_MS",
            &mut self.transport.heartbeat_start_delay_ms,
        );
        override_parsed(
            "LOCAL_NOTES_WRITE_TIMEOUT_MS",
            &mut self.transport.write_timeout_ms,
        );
    }

    /// Resolve the database path, expanding `~` if needed.
    pub fn resolved_db_path(&self) -> PathBuf {
        expand_tilde(&self.storage.db_path)
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

fn override_parsed<T: FromStr>(var: &str, target: &mut T) {
    if let Ok(raw) = std::env::var(var) {
        match raw.trim().parse() {
            Ok(value) => *target = value,
            Err(_) => tracing::warn!(var, value = %raw, "ignoring unparseable override"),
        }
    }
}

pub fn expand_tilde(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}
