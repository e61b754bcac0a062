//! Configuration management for the token tools
//!
//! Supports loading configuration from:
//! - Default values
//! - Config file (tokens.toml)
//! - Environment variables (TOKENS__*)
//!
//! ## Example config file (tokens.toml):
//! ```toml
//! [store]
//! path = "tokens/tokens.json"
//! backup_dir = "tokens/.backups"
//!
//! [sync]
//! modes = "meta"
//! map = "figma/FIGMA_STYLE_MAP.json"
//! protected_fields = ["owner", "ownership"]
//! mode_names = ["light", "dark"]
//! provenance_limit = 4096
//!
//! [lint]
//! mode = "deep"
//! ```

use config_crate::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::lint::RunMode;
use crate::value::ModeStrategy;

/// Main configuration for the token tools
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenConfig {
    /// Persisted store settings
    #[serde(default)]
    pub store: StoreConfig,

    /// Extraction and reconciliation settings
    #[serde(default)]
    pub sync: SyncConfig,

    /// Semantic validator settings
    #[serde(default)]
    pub lint: LintConfig,
}

/// Persisted store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Path to the canonical token store
    #[serde(default = "default_store_path")]
    pub path: PathBuf,

    /// Where timestamped backups go (defaults to the store's directory)
    #[serde(default)]
    pub backup_dir: Option<PathBuf>,
}

/// Sync configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// How multi-mode values are stored
    #[serde(default)]
    pub modes: ModeStrategy,

    /// Style map translating raw export names to dot paths
    #[serde(default = "default_map_path")]
    pub map: PathBuf,

    /// Meta fields carried forward from the stored record on update
    #[serde(default = "default_protected_fields")]
    pub protected_fields: Vec<String>,

    /// Keys recognised as mode names inside a value object
    #[serde(default = "default_mode_names")]
    pub mode_names: Vec<String>,

    /// Largest raw entry (serialized bytes) kept verbatim under meta.raw
    #[serde(default = "default_provenance_limit")]
    pub provenance_limit: usize,
}

/// Lint configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LintConfig {
    /// fast (local) or deep (CI)
    #[serde(default)]
    pub mode: RunMode,
}

// Default value functions
fn default_store_path() -> PathBuf {
    PathBuf::from("tokens").join("tokens.json")
}

fn default_map_path() -> PathBuf {
    PathBuf::from("figma").join("FIGMA_STYLE_MAP.json")
}

fn default_protected_fields() -> Vec<String> {
    vec!["owner".to_string(), "ownership".to_string()]
}

fn default_mode_names() -> Vec<String> {
    vec!["light".to_string(), "dark".to_string()]
}

fn default_provenance_limit() -> usize {
    4096
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
            backup_dir: None,
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            modes: ModeStrategy::default(),
            map: default_map_path(),
            protected_fields: default_protected_fields(),
            mode_names: default_mode_names(),
            provenance_limit: default_provenance_limit(),
        }
    }
}

impl TokenConfig {
    /// Load configuration, layering an explicit file over the default locations
    pub fn load_from(config_path: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        let config_locations = ["tokens.toml", ".tokens.toml", "config/tokens.toml"];

        for location in config_locations {
            builder = builder.add_source(File::with_name(location).required(false));
        }

        // XDG config directory
        if let Some(config_dir) = directories::ProjectDirs::from("dev", "familiar", "design-tokens") {
            let xdg_config = config_dir.config_dir().join("tokens.toml");
            if xdg_config.exists() {
                builder = builder.add_source(File::from(xdg_config).required(false));
            }
        }

        if let Some(path) = config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // TOKENS__SYNC__MODES=expand
        builder = builder.add_source(
            Environment::with_prefix("TOKENS")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Resolve the store path (relative paths are taken from the working directory)
    pub fn store_path(&self) -> PathBuf {
        if self.store.path.is_absolute() {
            self.store.path.clone()
        } else {
            std::env::current_dir()
                .unwrap_or_default()
                .join(&self.store.path)
        }
    }
}
