//! TOML-based configuration for the node binary.
//!
//! Reads `AppConfig` from the platform-appropriate config file:
//! - Windows:  `%APPDATA%\ArtNetNode\config.toml`
//! - Linux:    `~/.config/artnet-node/config.toml`
//! - macOS:    `~/Library/Application Support/ArtNetNode/config.toml`
//!
//! # Serde default values
//!
//! Fields annotated with `#[serde(default = "some_fn")]` use the return value
//! of `some_fn()` when the field is absent from the TOML file, so the binary
//! works on first run (before a config file exists) and keeps working when a
//! config from an older version is missing newer fields.
//!
//! Example:
//!
//! ```toml
//! [node]
//! short_name = "stage left"
//! port = 6454
//!
//! [retry]
//! max_attempts = 5
//!
//! [[senders]]
//! universe = 0
//! destination = "192.168.1.255"
//! refresh_ms = 1000
//! ```

use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::net::retry::RetryPolicy;
use crate::node::NodeConfig;
use crate::sender::SenderOptions;
use artnet_core::ARTNET_PORT;

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
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level application configuration stored on disk.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    pub node: NodeSection,
    #[serde(default)]
    pub retry: RetrySection,
    /// Universes brought up at startup.
    #[serde(default)]
    pub senders: Vec<SenderEntry>,
}

/// Node identity and listening settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NodeSection {
    /// OEM code reported in poll replies.
    #[serde(default = "default_oem")]
    pub oem: u16,
    /// ESTA manufacturer code.
    #[serde(default)]
    pub esta: u16,
    /// UDP port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Short node name, truncated to 16 bytes on the wire.
    #[serde(default = "default_short_name")]
    pub short_name: String,
    /// Long node name, truncated to 63 bytes on the wire.
    #[serde(default = "default_long_name")]
    pub long_name: String,
    /// Source-address allow-list; empty allows any source.
    #[serde(default)]
    pub hosts: Vec<IpAddr>,
    /// `tracing` log level: `"error"`, `"warn"`, `"info"`, `"debug"`, `"trace"`.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Socket-open retry settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RetrySection {
    /// Total bind attempts before the sender goes inert.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Delay after the first failed attempt, in milliseconds.
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    /// Upper bound on the doubling delay, in milliseconds.
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

/// One configured outbound universe.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SenderEntry {
    #[serde(default)]
    pub net: u8,
    #[serde(default)]
    pub subnet: u8,
    #[serde(default)]
    pub universe: u8,
    /// Explicit sub-universe byte; derived from subnet/universe when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub_universe: Option<u8>,
    /// Destination for DMX frames.
    #[serde(default = "default_destination")]
    pub destination: IpAddr,
    /// Destination UDP port.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Heartbeat retransmit period in milliseconds.
    #[serde(default = "default_refresh_ms")]
    pub refresh_ms: u64,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_oem() -> u16 {
    0x2908
}
fn default_port() -> u16 {
    ARTNET_PORT
}
fn default_short_name() -> String {
    "AD ArtNet".to_string()
}
fn default_long_name() -> String {
    "Audience Display Artnet Node".to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_max_attempts() -> u32 {
    5
}
fn default_initial_backoff_ms() -> u64 {
    250
}
fn default_max_backoff_ms() -> u64 {
    5000
}
fn default_destination() -> IpAddr {
    IpAddr::V4(Ipv4Addr::BROADCAST)
}
fn default_refresh_ms() -> u64 {
    1000
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            node: NodeSection::default(),
            retry: RetrySection::default(),
            senders: Vec::new(),
        }
    }
}

impl Default for NodeSection {
    fn default() -> Self {
        Self {
            oem: default_oem(),
            esta: 0,
            port: default_port(),
            short_name: default_short_name(),
            long_name: default_long_name(),
            hosts: Vec::new(),
            log_level: default_log_level(),
        }
    }
}

impl Default for RetrySection {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

// ── Section → runtime-type conversions ────────────────────────────────────────

impl NodeSection {
    pub fn to_node_config(&self) -> NodeConfig {
        NodeConfig {
            oem: self.oem,
            esta: self.esta,
            port: self.port,
            short_name: self.short_name.clone(),
            long_name: self.long_name.clone(),
            hosts: self.hosts.clone(),
        }
    }
}

impl RetrySection {
    pub fn to_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            initial_backoff: Duration::from_millis(self.initial_backoff_ms),
            max_backoff: Duration::from_millis(self.max_backoff_ms),
        }
    }
}

impl SenderEntry {
    pub fn to_options(&self) -> SenderOptions {
        SenderOptions {
            net: self.net,
            subnet: self.subnet,
            universe: self.universe,
            sub_universe: self.sub_universe,
            destination: self.destination,
            port: self.port,
            refresh_interval: Duration::from_millis(self.refresh_ms),
        }
    }
}

// ── Config repository ─────────────────────────────────────────────────────────

/// Determines the platform-appropriate directory for the config file.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] when the platform config base
/// directory cannot be determined from the environment.
pub fn config_dir() -> Result<PathBuf, ConfigError> {
    platform_config_dir().ok_or(ConfigError::NoPlatformConfigDir)
}

/// Resolves the full path to the config file.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] if the base directory cannot
/// be determined.
pub fn config_file_path() -> Result<PathBuf, ConfigError> {
    Ok(config_dir()?.join("config.toml"))
}

/// Loads `AppConfig` from disk, returning `AppConfig::default()` if the file
/// does not yet exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// and [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config() -> Result<AppConfig, ConfigError> {
    let path = config_file_path()?;

    match std::fs::read_to_string(&path) {
        Ok(content) => {
            let cfg: AppConfig = toml::from_str(&content)?;
            Ok(cfg)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(AppConfig::default()),
        Err(e) => Err(ConfigError::Io { path, source: e }),
    }
}

/// Persists `config` to disk, creating the config directory if needed.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system failures or
/// [`ConfigError::Serialize`] if serialization fails.
pub fn save_config(config: &AppConfig) -> Result<(), ConfigError> {
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
    Ok(())
}

/// Resolves the platform config base directory.
fn platform_config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA").map(|p| PathBuf::from(p).join("ArtNetNode"))
    }

    #[cfg(target_os = "linux")]
    {
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
        Some(base.join("artnet-node"))
    }

    #[cfg(target_os = "macos")]
    {
        std::env::var_os("HOME").map(|h| {
            PathBuf::from(h)
                .join("Library")
                .join("Application Support")
                .join("ArtNetNode")
        })
    }

    #[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
    {
        None
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
