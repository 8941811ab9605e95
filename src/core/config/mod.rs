//! core::config
//!
//! Configuration schema and loading.
//!
//! # Locations
//!
//! The first existing file wins:
//! 1. `--config <path>` (must exist)
//! 2. `$METATX_CONFIG`
//! 3. `$XDG_CONFIG_HOME/metatx/config.toml`
//! 4. `~/.metatx/config.toml` (canonical write location)
//!
//! With no file, defaults are used: a single unreplicated node named
//! `local` serving no volumes.
//!
//! # Example
//!
//! ```no_run
//! use metatx::core::config::Config;
//!
//! let result = Config::load(None).unwrap();
//! println!("node: {}", result.config.service.node_id().unwrap());
//! ```

pub mod schema;

pub use schema::{ServiceConfig, VolumeSection};

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Environment variable naming a config file.
pub const CONFIG_ENV: &str = "METATX_CONFIG";

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

    #[error("failed to write config file '{path}': {source}")]
    WriteError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config value: {0}")]
    InvalidValue(String),

    #[error("config file '{0}' already exists")]
    AlreadyExists(PathBuf),

    #[error("home directory not found")]
    NoHomeDir,
}

/// Warnings generated during config loading.
#[derive(Debug, Clone)]
pub struct ConfigWarning {
    pub message: String,
    pub path: PathBuf,
}

/// Result of loading configuration.
#[derive(Debug)]
pub struct ConfigLoadResult {
    pub config: Config,
    pub warnings: Vec<ConfigWarning>,
}

/// Loaded configuration and where it came from.
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub service: ServiceConfig,
    loaded_from: Option<PathBuf>,
}

/// Inputs to config file discovery, captured from the environment.
#[derive(Debug, Clone, Default)]
pub struct SearchPaths {
    pub explicit: Option<PathBuf>,
    pub env: Option<PathBuf>,
    pub xdg_config_home: Option<PathBuf>,
    pub home: Option<PathBuf>,
}

impl SearchPaths {
    /// Capture the process environment.
    pub fn from_env(explicit: Option<&Path>) -> Self {
        Self {
            explicit: explicit.map(Path::to_path_buf),
            env: std::env::var_os(CONFIG_ENV).map(PathBuf::from),
            xdg_config_home: std::env::var_os("XDG_CONFIG_HOME").map(PathBuf::from),
            home: dirs::home_dir(),
        }
    }

    /// Pick the config file to read, if any.
    ///
    /// # Errors
    ///
    /// An explicit path that does not exist is an error; the other
    /// locations are skipped when missing.
    pub fn locate(&self, warnings: &mut Vec<ConfigWarning>) -> Result<Option<PathBuf>, ConfigError> {
        if let Some(path) = &self.explicit {
            if !path.exists() {
                return Err(ConfigError::ReadError {
                    path: path.clone(),
                    source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
                });
            }
            return Ok(Some(path.clone()));
        }

        if let Some(path) = &self.env {
            if path.exists() {
                return Ok(Some(path.clone()));
            }
            warnings.push(ConfigWarning {
                message: format!("${} points to a missing file; ignoring it", CONFIG_ENV),
                path: path.clone(),
            });
        }

        if let Some(xdg) = &self.xdg_config_home {
            let path = xdg.join("metatx/config.toml");
            if path.exists() {
                return Ok(Some(path));
            }
        }

        if let Some(home) = &self.home {
            let path = home.join(".metatx/config.toml");
            if path.exists() {
                return Ok(Some(path));
            }
        }

        Ok(None)
    }
}

impl Config {
    /// Load configuration from the standard locations.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file exists but cannot be read,
    /// parsed, or validated. A missing file is not an error.
    pub fn load(explicit: Option<&Path>) -> Result<ConfigLoadResult, ConfigError> {
        Self::load_from(&SearchPaths::from_env(explicit))
    }

    /// Load configuration using explicit search inputs.
    pub fn load_from(search: &SearchPaths) -> Result<ConfigLoadResult, ConfigError> {
        let mut warnings = Vec::new();
        let loaded_from = search.locate(&mut warnings)?;

        let service = match &loaded_from {
            Some(path) => Self::read_config(path)?,
            None => ServiceConfig::default(),
        };
        service.validate()?;

        Ok(ConfigLoadResult {
            config: Config {
                service,
                loaded_from,
            },
            warnings,
        })
    }

    /// Read and parse a config file.
    fn read_config(path: &Path) -> Result<ServiceConfig, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&contents).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// The canonical write location, `~/.metatx/config.toml`.
    pub fn default_config_path() -> Result<PathBuf, ConfigError> {
        let home = dirs::home_dir().ok_or(ConfigError::NoHomeDir)?;
        Ok(home.join(".metatx/config.toml"))
    }

    /// Write a config file atomically, refusing to overwrite unless `force`.
    pub fn write(path: &Path, config: &ServiceConfig, force: bool) -> Result<(), ConfigError> {
        if path.exists() && !force {
            return Err(ConfigError::AlreadyExists(path.to_path_buf()));
        }
        config.validate()?;
        Self::write_config_atomic(path, config)
    }

    /// Write to a temp file in the same directory, fsync, then rename.
    fn write_config_atomic<T: serde::Serialize>(
        path: &Path,
        config: &T,
    ) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| ConfigError::WriteError {
                path: path.to_path_buf(),
                source: e,
            })?;
        }

        let contents =
            toml::to_string_pretty(config).map_err(|e| ConfigError::InvalidValue(e.to_string()))?;

        let temp_path = path.with_extension("toml.tmp");
        let mut file = fs::File::create(&temp_path).map_err(|e| ConfigError::WriteError {
            path: temp_path.clone(),
            source: e,
        })?;

        file.write_all(contents.as_bytes())
            .map_err(|e| ConfigError::WriteError {
                path: temp_path.clone(),
                source: e,
            })?;

        file.sync_all().map_err(|e| ConfigError::WriteError {
            path: temp_path.clone(),
            source: e,
        })?;

        fs::rename(&temp_path, path).map_err(|e| ConfigError::WriteError {
            path: path.to_path_buf(),
            source: e,
        })?;

        Ok(())
    }

    /// The file the configuration was read from, if any.
    pub fn loaded_from(&self) -> Option<&Path> {
        self.loaded_from.as_deref()
    }
}
