//! core::config
//!
//! Configuration schema and loading.
//!
//! # Overview
//!
//! The builder has two configuration scopes:
//! - **User**: settings shared by every project
//! - **Project**: overrides stored next to the lattice files
//!
//! # Precedence
//!
//! Configuration values are resolved in this order (later overrides earlier):
//! 1. Default values
//! 2. User config file
//! 3. Project config file
//!
//! # User Config Locations
//!
//! Searched in order:
//! 1. `$LATTICECONSTRUCTOR_CONFIG` if set
//! 2. `$XDG_CONFIG_HOME/latticeconstructor/config.toml`
//! 3. `~/.latticeconstructor/config.toml`
//!
//! # Project Config Location
//!
//! `<project>/latticeconstructor.toml`
//!
//! # Example
//!
//! ```no_run
//! use latticeconstructor::core::config::Config;
//! use std::path::Path;
//!
//! let config = Config::load(Some(Path::new("/path/to/project"))).unwrap();
//! println!("Default dialect: {}", config.default_dialect());
//! println!("Rebuild on load: {}", config.rebuild_on_load());
//! ```

pub mod schema;

pub use schema::BuilderConfig;

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::core::families::FamilyTable;
use crate::core::types::Dialect;

/// Environment variable naming an explicit user config file.
pub const CONFIG_ENV: &str = "LATTICECONSTRUCTOR_CONFIG";

/// File name of the project config.
pub const PROJECT_FILE: &str = "latticeconstructor.toml";

/// Errors from configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file '{path}': {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("invalid config value: {0}")]
    InvalidValue(String),
}

/// Resolved configuration.
///
/// Accessor methods apply defaults for unset values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Config {
    /// The merged settings
    pub settings: BuilderConfig,
    /// Files that contributed, in load order
    loaded_from: Vec<PathBuf>,
}

impl Config {
    /// Load configuration from the default locations.
    ///
    /// If `project_dir` is provided, also loads its project file.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file exists but cannot be read, parsed or
    /// validated. Missing files are not an error (defaults are used).
    pub fn load(project_dir: Option<&Path>) -> Result<Config, ConfigError> {
        let mut config = Config::default();

        if let Some(path) = Self::user_config_path() {
            config = config.with_file(&path)?;
        }

        if let Some(dir) = project_dir {
            let path = dir.join(PROJECT_FILE);
            if path.exists() {
                config = config.with_file(&path)?;
            }
        }

        Ok(config)
    }

    /// Build a configuration from already-parsed settings.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if validation fails.
    pub fn from_settings(settings: BuilderConfig) -> Result<Config, ConfigError> {
        settings.validate()?;
        Ok(Config {
            settings,
            loaded_from: Vec::new(),
        })
    }

    /// Layer one more file on top of this configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn with_file(self, path: &Path) -> Result<Config, ConfigError> {
        let file = Self::read_config(path)?;
        file.validate()?;
        tracing::debug!(path = %path.display(), "loaded config file");

        let mut loaded_from = self.loaded_from;
        loaded_from.push(path.to_path_buf());
        Ok(Config {
            settings: self.settings.overlay(file),
            loaded_from,
        })
    }

    /// The first existing user config file, if any.
    fn user_config_path() -> Option<PathBuf> {
        // 1. $LATTICECONSTRUCTOR_CONFIG
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        // 2. $XDG_CONFIG_HOME/latticeconstructor/config.toml
        if let Ok(xdg_home) = std::env::var("XDG_CONFIG_HOME") {
            let path = PathBuf::from(xdg_home).join("latticeconstructor/config.toml");
            if path.exists() {
                return Some(path);
            }
        }

        // 3. ~/.latticeconstructor/config.toml
        dirs::home_dir()
            .map(|home| home.join(".latticeconstructor/config.toml"))
            .filter(|path| path.exists())
    }

    /// Read and parse a config file.
    fn read_config(path: &Path) -> Result<BuilderConfig, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&contents).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    // =========================================================================
    // Accessor methods with defaults
    // =========================================================================

    /// Dialect used when a load call does not name one.
    ///
    /// Defaults to `lte`.
    pub fn default_dialect(&self) -> Dialect {
        self.settings
            .default_dialect
            .as_deref()
            .and_then(|d| d.parse().ok())
            .unwrap_or_default()
    }

    /// Whether loading a file rebuilds the table immediately.
    ///
    /// Defaults to `false`.
    pub fn rebuild_on_load(&self) -> bool {
        self.settings.rebuild_on_load.unwrap_or(false)
    }

    /// The standard family table extended with the configured aliases.
    pub fn family_table(&self) -> FamilyTable {
        let standard = FamilyTable::standard();
        match &self.settings.families {
            Some(aliases) => standard.with_aliases(aliases),
            None => standard,
        }
    }

    /// Files that contributed to this configuration, in load order.
    pub fn loaded_from(&self) -> &[PathBuf] {
        &self.loaded_from
    }
}
