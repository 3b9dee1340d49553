//! Configuration for a mesh routing node.
//!
//! Resolution order: environment variables → config file → defaults.
//!
//! Config file location:
//!   1. $MESH_CONFIG (explicit override)
//!   2. $XDG_CONFIG_HOME/mesh/config.toml
//!   3. ~/.config/mesh/config.toml

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MeshConfig {
    pub identity: IdentityConfig,
    pub router: RouterConfig,
    pub topology: TopologyConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    /// Either a literal peer name (`aa:bb:cc:dd:ee:ff`) or any string,
    /// which is hashed into one.
    pub peer_name: String,
    /// Human-readable label. Empty = use peer_name.
    pub nickname: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    /// Pending broadcast lazy-fill requests the route serializer will buffer
    /// before callers wait for room.
    pub action_queue_depth: usize,
    /// Pending `ensure_recalculated` barriers buffered the same way.
    pub barrier_queue_depth: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TopologyConfig {
    /// JSON topology snapshot used to seed the peer table. None = start empty.
    pub snapshot_path: Option<PathBuf>,
}

// ── Defaults ──────────────────────────────────────────────────────────────────

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            peer_name: hostname(),
            nickname: String::new(),
        }
    }
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            action_queue_depth: 64,
            barrier_queue_depth: 16,
        }
    }
}

// ── Path helpers ──────────────────────────────────────────────────────────────

fn config_dir() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| dirs_or_home().join(".config"))
        .join("mesh")
}

fn dirs_or_home() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
}

fn hostname() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "localhost".to_string())
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {0}: {1}")]
    ReadFailed(PathBuf, std::io::Error),
    #[error("failed to parse {0}: {1}")]
    ParseFailed(PathBuf, toml::de::Error),
    #[error("failed to write {0}: {1}")]
    WriteFailed(PathBuf, std::io::Error),
    #[error("failed to serialize: {0}")]
    SerializeFailed(toml::ser::Error),
}

// ── Loading ───────────────────────────────────────────────────────────────────

impl MeshConfig {
    /// Load config: env vars → file → defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::load_from(&Self::file_path())?;
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Load from a specific file, without env overrides. A missing file
    /// yields the defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(MeshConfig::default());
        }
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadFailed(path.to_path_buf(), e))?;
        toml::from_str(&text).map_err(|e| ConfigError::ParseFailed(path.to_path_buf(), e))
    }

    /// Config file path.
    pub fn file_path() -> PathBuf {
        std::env::var("MESH_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| config_dir().join("config.toml"))
    }

    /// Write default config if none exists. Returns the path.
    pub fn write_default_if_missing() -> Result<PathBuf, ConfigError> {
        let path = Self::file_path();
        Self::write_default_to(&path)?;
        Ok(path)
    }

    pub fn write_default_to(path: &Path) -> Result<(), ConfigError> {
        if path.exists() {
            return Ok(());
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| ConfigError::WriteFailed(path.to_path_buf(), e))?;
        }
        let text =
            toml::to_string_pretty(&MeshConfig::default()).map_err(ConfigError::SerializeFailed)?;
        std::fs::write(path, text).map_err(|e| ConfigError::WriteFailed(path.to_path_buf(), e))
    }

    /// Apply MESH_* overrides. `lookup` is `std::env::var` in production.
    /// Unparseable numeric values are ignored.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("MESH_IDENTITY__PEER_NAME") {
            self.identity.peer_name = v;
        }
        if let Some(v) = lookup("MESH_IDENTITY__NICKNAME") {
            self.identity.nickname = v;
        }
        if let Some(v) = lookup("MESH_ROUTER__ACTION_QUEUE_DEPTH") {
            if let Ok(n) = v.parse() {
                self.router.action_queue_depth = n;
            }
        }
        if let Some(v) = lookup("MESH_ROUTER__BARRIER_QUEUE_DEPTH") {
            if let Ok(n) = v.parse() {
                self.router.barrier_queue_depth = n;
            }
        }
        if let Some(v) = lookup("MESH_TOPOLOGY__SNAPSHOT_PATH") {
            self.topology.snapshot_path = if v.is_empty() {
                None
            } else {
                Some(PathBuf::from(v))
            };
        }
    }

    /// Nickname to report for the local peer.
    pub fn nickname(&self) -> &str {
        if self.identity.nickname.is_empty() {
            &self.identity.peer_name
        } else {
            &self.identity.nickname
        }
    }
}
