//! Configuration management.
//!
//! Layered resolution:
//! - TOML config file (`--config`)
//! - Environment variables (`SQLSHIELD_*`)
//! - CLI arguments
//!
//! Later layers win. A malformed value in any layer is a [`ShieldError::Config`].

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{Result, ShieldError};
use crate::model::{FallbackPolicy, DEFAULT_ARTIFACTS_DIR};

/// Main configuration struct
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Detection pipeline configuration
    #[serde(default)]
    pub detection: DetectionConfig,

    /// Model artifact configuration
    #[serde(default)]
    pub model: ModelConfig,

    /// Decision log configuration
    #[serde(default)]
    pub storage: StorageConfig,

    /// HTTP server configuration
    #[serde(default)]
    pub server: HttpConfig,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let content = std::fs::read_to_string(&path).map_err(|e| {
            ShieldError::Config(format!("failed to read {}: {e}", path.display()))
        })?;

        toml::from_str(&content)
            .map_err(|e| ShieldError::Config(format!("failed to parse {}: {e}", path.display())))
    }

    /// Apply `SQLSHIELD_*` environment overrides on top of this config.
    pub fn apply_env(&mut self) -> Result<()> {
        if let Ok(val) = std::env::var("SQLSHIELD_FALLBACK") {
            self.detection.fallback = val.parse()?;
        }
        if let Ok(val) = std::env::var("SQLSHIELD_RULES_FILE") {
            self.detection.rules_file = Some(PathBuf::from(val));
        }
        if let Ok(val) = std::env::var("SQLSHIELD_ARTIFACTS_DIR") {
            self.model.artifacts_dir = PathBuf::from(val);
        }
        if let Ok(val) = std::env::var("SQLSHIELD_DB_PATH") {
            self.storage.db_path = PathBuf::from(val);
        }
        if let Ok(val) = std::env::var("SQLSHIELD_HOST") {
            self.server.host = val;
        }
        if let Ok(val) = std::env::var("SQLSHIELD_PORT") {
            self.server.port = val
                .parse()
                .map_err(|_| ShieldError::Config(format!("invalid SQLSHIELD_PORT: {val}")))?;
        }
        if let Ok(val) = std::env::var("SQLSHIELD_CORS") {
            self.server.cors = parse_bool(&val)
                .ok_or_else(|| ShieldError::Config(format!("invalid SQLSHIELD_CORS: {val}")))?;
        }
        Ok(())
    }
}

/// Detection pipeline configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DetectionConfig {
    /// Label applied when the model stage fails
    #[serde(default)]
    pub fallback: FallbackPolicy,

    /// Optional rules file; replaces the built-in rule set when present
    #[serde(default)]
    pub rules_file: Option<PathBuf>,
}

/// Model artifact configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Directory holding `vectorizer.json` and `classifier.safetensors`
    pub artifacts_dir: PathBuf,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            artifacts_dir: PathBuf::from(DEFAULT_ARTIFACTS_DIR),
        }
    }
}

/// Decision log configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// SQLite database path
    pub db_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("sqlshield.db"),
        }
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Enable permissive CORS (for browser clients on other origins)
    pub cors: bool,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8100,
            cors: true,
        }
    }
}

impl HttpConfig {
    /// Get the full listen address
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_bool(val: &str) -> Option<bool> {
    match val.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
