//! Configuration Management
//!
//! Handles persistent configuration storage for keptn-utils. Settings live in
//! the keptn directory (`~/.keptn/config.json`).

use crate::events::receiver::{DEFAULT_PATH, DEFAULT_PORT};
use crate::events::ReceiverConfig;
use crate::store::Scheme;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Name of the keptn directory inside the home directory
const KEPTN_FOLDER_NAME: &str = ".keptn";

/// Default header carrying the API token
pub const DEFAULT_AUTH_HEADER: &str = "x-token";

/// Default configuration service endpoint
pub const DEFAULT_ENDPOINT: &str = "localhost:8080";

/// User configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct Config {
    /// Configuration service endpoint (host[:port])
    #[serde(default)]
    pub endpoint: Option<String>,
    /// "http" or "https"
    #[serde(default)]
    pub scheme: Option<String>,
    /// API token
    #[serde(default)]
    pub auth_token: Option<String>,
    /// Header the token is sent in
    #[serde(default)]
    pub auth_header: Option<String>,
    /// Skip TLS certificate verification
    #[serde(default)]
    pub insecure_skip_verify: Option<bool>,
    /// Port of the event receiver
    #[serde(default)]
    pub receiver_port: Option<u16>,
    /// Path of the event receiver
    #[serde(default)]
    pub receiver_path: Option<String>,
}

/// Directory used to store config and logs, `~/.keptn`
pub fn keptn_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(KEPTN_FOLDER_NAME))
}

/// The keptn directory, created if it does not exist yet
pub fn ensure_keptn_dir() -> Result<PathBuf> {
    let dir = keptn_dir().context("Could not determine home directory")?;
    if !dir.exists() {
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
        tracing::info!("created {} to store config and logs", dir.display());
    }
    Ok(dir)
}

impl Config {
    /// Get the config file path
    fn config_path() -> Option<PathBuf> {
        keptn_dir().map(|p| p.join("config.json"))
    }

    /// Load configuration from disk
    pub fn load() -> Self {
        match Self::config_path() {
            Some(path) => Self::load_from(&path),
            None => Self::default(),
        }
    }

    /// Load configuration from a specific file, falling back to defaults
    pub fn load_from(path: &std::path::Path) -> Self {
        if !path.exists() {
            return Self::default();
        }

        match std::fs::read_to_string(path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                tracing::warn!("ignoring unreadable config {}: {}", path.display(), e);
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    /// Save configuration to disk
    pub fn save(&self) -> Result<PathBuf> {
        let dir = ensure_keptn_dir()?;
        let path = dir.join("config.json");
        self.save_to(&path)?;
        Ok(path)
    }

    /// Save configuration to a specific file
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        Ok(())
    }

    /// Get effective endpoint (CLI > config > default)
    pub fn effective_endpoint(&self) -> String {
        self.endpoint
            .clone()
            .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string())
    }

    /// Get effective scheme, defaulting to http
    pub fn effective_scheme(&self) -> Result<Scheme> {
        match self.scheme.as_deref() {
            Some(s) => s.parse::<Scheme>().map_err(|e| anyhow::anyhow!(e)),
            None => Ok(Scheme::Http),
        }
    }

    /// Get effective auth header
    pub fn effective_auth_header(&self) -> String {
        self.auth_header
            .clone()
            .unwrap_or_else(|| DEFAULT_AUTH_HEADER.to_string())
    }

    /// Whether TLS verification is skipped, off unless asked for
    pub fn effective_insecure_skip_verify(&self) -> bool {
        self.insecure_skip_verify.unwrap_or(false)
    }

    /// Get effective receiver settings
    pub fn effective_receiver(&self) -> ReceiverConfig {
        ReceiverConfig {
            port: self.receiver_port.unwrap_or(DEFAULT_PORT),
            path: self
                .receiver_path
                .clone()
                .unwrap_or_else(|| DEFAULT_PATH.to_string()),
        }
    }

    /// Overlay values set in `other` on top of this config
    pub fn merge(&mut self, other: Config) {
        if other.endpoint.is_some() {
            self.endpoint = other.endpoint;
        }
        if other.scheme.is_some() {
            self.scheme = other.scheme;
        }
        if other.auth_token.is_some() {
            self.auth_token = other.auth_token;
        }
        if other.auth_header.is_some() {
            self.auth_header = other.auth_header;
        }
        if other.receiver_port.is_some() {
            self.receiver_port = other.receiver_port;
        }
        if other.receiver_path.is_some() {
            self.receiver_path = other.receiver_path;
        }
        if other.insecure_skip_verify.is_some() {
            self.insecure_skip_verify = other.insecure_skip_verify;
        }
    }
}

/// Expand a leading `~` to the home directory
pub fn expand_tilde(path: &str) -> PathBuf {
    match (path, dirs::home_dir()) {
        ("~", Some(home)) => home,
        (p, Some(home)) if p.starts_with("~/") => home.join(&p[2..]),
        (p, _) => PathBuf::from(p),
    }
}
