//! Platform paths for the config file and the local cache directory.

use std::path::{Path, PathBuf};

use encore_common::ConfigError;
use tracing::info;

use super::template::default_config_toml;
use crate::schema::EncoreConfig;

const APP_DIR: &str = "encore";

/// `<config dir>/encore/config.toml`.
pub fn default_config_path() -> Result<PathBuf, ConfigError> {
    dirs::config_dir()
        .map(|dir| dir.join(APP_DIR).join("config.toml"))
        .ok_or_else(|| ConfigError::ParseError("could not determine config directory".into()))
}

/// Directory for the local cache store: `cache.directory` when set,
/// otherwise `<data dir>/encore/cache`.
pub fn cache_dir(config: &EncoreConfig) -> Result<PathBuf, ConfigError> {
    if !config.cache.directory.is_empty() {
        return Ok(PathBuf::from(&config.cache.directory));
    }
    dirs::data_dir()
        .map(|dir| dir.join(APP_DIR).join("cache"))
        .ok_or_else(|| ConfigError::ParseError("could not determine data directory".into()))
}

/// Write the commented default config to `path`, creating parent directories.
pub fn create_default_config(path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            ConfigError::ParseError(format!("cannot create {}: {e}", parent.display()))
        })?;
    }

    std::fs::write(path, default_config_toml()).map_err(|e| {
        ConfigError::ParseError(format!("cannot write {}: {e}", path.display()))
    })?;

    info!(path = %path.display(), "created default config");
    Ok(())
}
