//! Configuration file resolution and loading
//!
//! Config file lookup follows a fixed priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. Platform config directory (`<config_dir>/hrmix/config.toml`)
//! 4. Built-in defaults (no file)
//!
//! A missing file at step 3 is normal and falls through to defaults. A file
//! named explicitly by step 1 or 2 must exist.

use crate::{Error, Result};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Environment variable naming the config file
pub const CONFIG_ENV_VAR: &str = "HRMIX_CONFIG";

/// Where a resolved configuration came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    CommandLine(PathBuf),
    Environment(PathBuf),
    PlatformDefault(PathBuf),
    BuiltIn,
}

impl ConfigSource {
    pub fn path(&self) -> Option<&Path> {
        match self {
            ConfigSource::CommandLine(p)
            | ConfigSource::Environment(p)
            | ConfigSource::PlatformDefault(p) => Some(p),
            ConfigSource::BuiltIn => None,
        }
    }
}

/// Resolve which config file to use
pub fn resolve_config_file(cli_arg: Option<&Path>, env_var_name: &str) -> Result<ConfigSource> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return require_exists(path).map(ConfigSource::CommandLine);
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(env_var_name) {
        if !path.trim().is_empty() {
            return require_exists(Path::new(&path)).map(ConfigSource::Environment);
        }
    }

    // Priority 3: Platform config directory
    if let Some(path) = default_config_path() {
        if path.exists() {
            return Ok(ConfigSource::PlatformDefault(path));
        }
        debug!("No config file at {}", path.display());
    }

    // Priority 4: Built-in defaults
    Ok(ConfigSource::BuiltIn)
}

/// Get default configuration file path for the platform
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("hrmix").join("config.toml"))
}

/// Parse a TOML document into `T`
pub fn parse_toml<T: DeserializeOwned>(content: &str) -> Result<T> {
    Ok(toml::from_str(content)?)
}

/// Load `T` from the resolved source, or `T::default()` for built-in defaults
pub fn load_config<T: DeserializeOwned + Default>(source: &ConfigSource) -> Result<T> {
    match source.path() {
        Some(path) => {
            info!("Loading configuration from {}", path.display());
            let content = std::fs::read_to_string(path)?;
            parse_toml(&content)
        }
        None => {
            info!("No configuration file found, using built-in defaults");
            Ok(T::default())
        }
    }
}

fn require_exists(path: &Path) -> Result<PathBuf> {
    if path.exists() {
        Ok(path.to_path_buf())
    } else {
        Err(Error::Config(format!("Config file not found: {:?}", path)))
    }
}
