//! Server settings, read from an optional JSON file.

use std::path::{Path, PathBuf};

use serde::Deserialize;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", .path.display())]
    Read { path: PathBuf, source: std::io::Error },
    #[error("failed to parse config {}: {source}", .path.display())]
    Parse { path: PathBuf, source: serde_json::Error },
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub async_workers: PoolConfig,
    /// Directory holding the bundled data files. Defaults to the copy shipped with the crate.
    pub resource_path: Option<PathBuf>,
    pub tick_millis: u64,
}
impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            async_workers: PoolConfig::default(),
            resource_path: None,
            tick_millis: 50,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    pub size: usize,
    /// Seconds a worker may sit with no work before it is stopped.
    pub idle_timeout_secs: u64,
}
impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            size: num_cpus::get().max(1),
            idle_timeout_secs: 300,
        }
    }
}

impl ServerConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read { path: path.to_owned(), source })?;
        let config: Self =
            serde_json::from_str(&text).map_err(|source| ConfigError::Parse { path: path.to_owned(), source })?;
        log::debug!("loaded config from {}: {config:?}", path.display());
        Ok(config)
    }

    /// The config at `path`, or the defaults when no path is given.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        path.map_or_else(|| Ok(Self::default()), Self::load)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ServerConfig::default();
        assert!(config.async_workers.size >= 1);
        assert_eq!(config.async_workers.idle_timeout_secs, 300);
        assert_eq!(config.tick_millis, 50);
        assert_eq!(config.resource_path, None);
        assert_eq!(ServerConfig::load_or_default(None).unwrap(), config);
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("server.json");
        std::fs::write(&path, r#"{ "async_workers": { "size": 3 }, "resource_path": "data" }"#).unwrap();
        let config = ServerConfig::load(&path).unwrap();
        assert_eq!(config.async_workers.size, 3);
        assert_eq!(config.async_workers.idle_timeout_secs, 300);
        assert_eq!(config.resource_path.as_deref(), Some(Path::new("data")));
        assert_eq!(config.tick_millis, 50);
    }

    #[test]
    fn bad_files_are_errors() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(ServerConfig::load(&dir.path().join("missing.json")), Err(ConfigError::Read { .. })));
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{ \"tick_millis\": \"soon\" }").unwrap();
        assert!(matches!(ServerConfig::load(&path), Err(ConfigError::Parse { .. })));
    }
}
