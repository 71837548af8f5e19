//! Layered TOML configuration: engine limits and the file-watcher settings.
//!
//! The watcher section is plain data consumed by an external file-watching
//! tool; nothing in this crate watches files.

use cofacade_engine::TokioEngine;
use serde::Deserialize;
use serde::Serialize;
use std::path::Path;
use std::path::PathBuf;
use thiserror::Error;
use tokio::runtime::Handle;

/// Default polling interval for scan-based watcher drivers.
pub const DEFAULT_SCAN_INTERVAL_MS: u64 = 2000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse {origin}: {source}")]
    Parse {
        origin: String,
        source: toml::de::Error,
    },
    #[error("invalid watcher config: {0}")]
    InvalidWatcher(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub engine: EngineConfig,
    pub watcher: WatcherConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Upper bound on live coroutines. `None` means unlimited.
    pub max_coroutines: Option<usize>,
}

impl EngineConfig {
    pub fn build(&self, handle: Handle) -> TokioEngine {
        TokioEngine::with_limit(handle, self.max_coroutines)
    }
}

/// Settings handed to the external file watcher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WatcherConfig {
    /// Change-detection backend, e.g. `fswatch`, `find` or `scan`.
    pub driver: String,
    /// Command used to restart the watched program. Also read from `command`.
    #[serde(alias = "command")]
    pub bin: Option<String>,
    pub scan_interval_ms: u64,
    pub watch: WatchPaths,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WatchPaths {
    pub dir: Vec<String>,
    pub files: Vec<String>,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            driver: "fswatch".to_string(),
            bin: None,
            scan_interval_ms: DEFAULT_SCAN_INTERVAL_MS,
            watch: WatchPaths::default(),
        }
    }
}

impl Default for WatchPaths {
    fn default() -> Self {
        Self {
            dir: vec!["app".to_string(), "config".to_string()],
            files: vec![".env".to_string()],
        }
    }
}

impl WatcherConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.driver.trim().is_empty() {
            return Err(ConfigError::InvalidWatcher(
                "driver must not be empty".to_string(),
            ));
        }
        if self.watch.dir.iter().any(|d| d.trim().is_empty()) {
            return Err(ConfigError::InvalidWatcher(
                "watch.dir contains an empty entry".to_string(),
            ));
        }
        if self.watch.files.iter().any(|f| f.trim().is_empty()) {
            return Err(ConfigError::InvalidWatcher(
                "watch.files contains an empty entry".to_string(),
            ));
        }
        Ok(())
    }

    /// Watched directories followed by watched files, resolved against `root`.
    pub fn watched_paths(&self, root: &Path) -> Vec<PathBuf> {
        self.watch
            .dir
            .iter()
            .chain(&self.watch.files)
            .map(|entry| root.join(entry))
            .collect()
    }
}

impl Config {
    /// Loads `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "config file not found, using defaults");
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        Self::parse(&contents, path.display().to_string())
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        Self::parse(contents, "<inline>".to_string())
    }

    fn parse(contents: &str, origin: String) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(contents).map_err(|source| ConfigError::Parse { origin, source })?;
        config.watcher.validate()?;
        Ok(config)
    }
}
