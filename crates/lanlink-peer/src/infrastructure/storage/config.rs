//! TOML-based configuration for the peer application.
//!
//! Reads and writes `AppConfig` at the platform-appropriate config file:
//! - Windows:  `%APPDATA%\LanLink\config.toml`
//! - Linux:    `~/.config/lanlink/config.toml`
//! - macOS:    `~/Library/Application Support/LanLink/config.toml`
//!
//! Example:
//!
//! ```toml
//! [peer]
//! log_level = "debug"
//! on_session_closed = "resume_search"
//!
//! [network]
//! discovery_port = 41234
//! broadcast_address = "192.168.1.255"
//!
//! [timing]
//! search_timeout_ms = 20000
//! ```
//!
//! Every field has a serde default, so an empty file (or no file at all)
//! yields the protocol's fixed ports and timings.  Both peers of a pair must
//! agree on `discovery_port`; the other values are local.

use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::time::Duration;

use lanlink_core::protocol::{
    BROADCAST_INTERVAL, COUNTDOWN_START_SECS, COUNTDOWN_TICK, DISCOVERY_PORT, SEARCH_TIMEOUT,
    SESSION_PORT_RANGE,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The platform config directory could not be determined.
    #[error("could not determine platform config directory")]
    NoPlatformConfigDir,

    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// The config could not be serialized to TOML.
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// The values parsed but cannot be used together.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level application configuration stored on disk.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    #[serde(default)]
    pub peer: PeerConfig,
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub timing: TimingConfig,
}

/// What to do when the last session of a connected round closes.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionClosedPolicy {
    /// Go back to `Idle` and wait for the user.
    #[default]
    StayIdle,
    /// Start a new discovery round right away.
    ResumeSearch,
}

/// General peer behaviour settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PeerConfig {
    /// `tracing` log level: `"error"`, `"warn"`, `"info"`, `"debug"`, `"trace"`.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub on_session_closed: SessionClosedPolicy,
}

/// Ports and addresses.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NetworkConfig {
    /// UDP port for discovery broadcasts.
    #[serde(default = "default_discovery_port")]
    pub discovery_port: u16,
    /// Lowest TCP session port to pick from.
    #[serde(default = "default_session_port_min")]
    pub session_port_min: u16,
    /// Upper bound (exclusive) of the session port range.
    #[serde(default = "default_session_port_max")]
    pub session_port_max: u16,
    /// Fixed session port; when absent a random one is drawn from the range.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_port: Option<u16>,
    /// Destination of `HELLO` announcements.
    #[serde(default = "default_broadcast_address")]
    pub broadcast_address: Ipv4Addr,
}

/// Timer settings, in milliseconds unless noted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TimingConfig {
    #[serde(default = "default_broadcast_interval_ms")]
    pub broadcast_interval_ms: u64,
    #[serde(default = "default_countdown_tick_ms")]
    pub countdown_tick_ms: u64,
    #[serde(default = "default_search_timeout_ms")]
    pub search_timeout_ms: u64,
    /// Starting value of the displayed countdown, in seconds.
    #[serde(default = "default_countdown_start_secs")]
    pub countdown_start_secs: u32,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_log_level() -> String {
    "info".to_string()
}
fn default_discovery_port() -> u16 {
    DISCOVERY_PORT
}
fn default_session_port_min() -> u16 {
    SESSION_PORT_RANGE.start
}
fn default_session_port_max() -> u16 {
    SESSION_PORT_RANGE.end
}
fn default_broadcast_address() -> Ipv4Addr {
    Ipv4Addr::BROADCAST
}
fn default_broadcast_interval_ms() -> u64 {
    BROADCAST_INTERVAL.as_millis() as u64
}
fn default_countdown_tick_ms() -> u64 {
    COUNTDOWN_TICK.as_millis() as u64
}
fn default_search_timeout_ms() -> u64 {
    SEARCH_TIMEOUT.as_millis() as u64
}
fn default_countdown_start_secs() -> u32 {
    COUNTDOWN_START_SECS
}
fn default_connect_timeout_ms() -> u64 {
    5000
}

impl Default for PeerConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            on_session_closed: SessionClosedPolicy::default(),
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            discovery_port: default_discovery_port(),
            session_port_min: default_session_port_min(),
            session_port_max: default_session_port_max(),
            session_port: None,
            broadcast_address: default_broadcast_address(),
        }
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            broadcast_interval_ms: default_broadcast_interval_ms(),
            countdown_tick_ms: default_countdown_tick_ms(),
            search_timeout_ms: default_search_timeout_ms(),
            countdown_start_secs: default_countdown_start_secs(),
            connect_timeout_ms: default_connect_timeout_ms(),
        }
    }
}

impl TimingConfig {
    pub fn broadcast_interval(&self) -> Duration {
        Duration::from_millis(self.broadcast_interval_ms)
    }

    pub fn countdown_tick(&self) -> Duration {
        Duration::from_millis(self.countdown_tick_ms)
    }

    pub fn search_timeout(&self) -> Duration {
        Duration::from_millis(self.search_timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

impl AppConfig {
    /// Checks the values that serde cannot.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for an empty session port range or a
    /// zero interval (which would make `tokio::time::interval` panic).
    pub fn validate(&self) -> Result<(), ConfigError> {
        let net = &self.network;
        if net.session_port.is_none() && net.session_port_min >= net.session_port_max {
            return Err(ConfigError::Invalid(format!(
                "session port range {}..{} is empty",
                net.session_port_min, net.session_port_max
            )));
        }
        let t = &self.timing;
        if t.broadcast_interval_ms == 0 || t.countdown_tick_ms == 0 {
            return Err(ConfigError::Invalid(
                "broadcast_interval_ms and countdown_tick_ms must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

// ── Config repository ─────────────────────────────────────────────────────────

/// Resolves the full path to the config file.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] if the base directory cannot be
/// determined.
pub fn config_file_path() -> Result<PathBuf, ConfigError> {
    let dir = platform_config_dir().ok_or(ConfigError::NoPlatformConfigDir)?;
    Ok(dir.join("config.toml"))
}

/// Loads `AppConfig` from disk, returning `AppConfig::default()` if the file
/// does not yet exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// [`ConfigError::Parse`] if the TOML is malformed, and
/// [`ConfigError::Invalid`] if the values fail [`AppConfig::validate`].
pub fn load_config() -> Result<AppConfig, ConfigError> {
    let path = config_file_path()?;
    let cfg = match std::fs::read_to_string(&path) {
        Ok(content) => toml::from_str::<AppConfig>(&content)?,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => AppConfig::default(),
        Err(e) => return Err(ConfigError::Io { path, source: e }),
    };
    cfg.validate()?;
    Ok(cfg)
}

/// Persists `config` to disk, creating the directory if needed.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system failures or
/// [`ConfigError::Serialize`] if serialization fails.
pub fn save_config(config: &AppConfig) -> Result<PathBuf, ConfigError> {
    let path = config_file_path()?;

    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|source| ConfigError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
    }

    let content = toml::to_string_pretty(config)?;
    std::fs::write(&path, content).map_err(|source| ConfigError::Io {
        path: path.clone(),
        source,
    })?;
    Ok(path)
}

fn platform_config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA").map(|p| PathBuf::from(p).join("LanLink"))
    }

    #[cfg(target_os = "linux")]
    {
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
        Some(base.join("lanlink"))
    }

    #[cfg(target_os = "macos")]
    {
        std::env::var_os("HOME").map(|h| {
            PathBuf::from(h)
                .join("Library")
                .join("Application Support")
                .join("LanLink")
        })
    }

    #[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
    {
        None
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
