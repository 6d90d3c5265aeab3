use crate::error::OrbitError;
use serde::{Deserialize, Serialize};
use std::{
    fs::{read_to_string, write},
    path::{Path, PathBuf},
    time::Duration,
};

pub const DEFAULT_DEBOUNCE_MS: u64 = 3000;
pub const DEFAULT_SNAPSHOT_PATH: &str = "orbit-graph.json";
pub const DEFAULT_STARTER_LABEL: &str = "Root";
pub const DEFAULT_STARTER_NOTE: &str = "Start building your knowledge graph from here!";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrbitConfig {
    /// Reconciliation is skipped while a local collapse/expand is younger than this.
    pub debounce_ms: u64,
    /// Local JSON snapshot used by anonymous sessions.
    pub snapshot_path: PathBuf,
    /// SQLite file for authenticated sessions (requires the `service` feature).
    pub database_path: Option<PathBuf>,
    pub starter_label: String,
    pub starter_note: String,
}

impl Default for OrbitConfig {
    fn default() -> Self {
        OrbitConfig {
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            snapshot_path: PathBuf::from(DEFAULT_SNAPSHOT_PATH),
            database_path: None,
            starter_label: DEFAULT_STARTER_LABEL.to_string(),
            starter_note: DEFAULT_STARTER_NOTE.to_string(),
        }
    }
}

impl OrbitConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

pub trait ConfigProvider: Send + Sync {
    fn get_config(&self) -> Result<OrbitConfig, OrbitError>;
    fn set_config(&self, config: &OrbitConfig) -> Result<(), OrbitError>;
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TomlConfigProvider {
    path: PathBuf,
}

impl TomlConfigProvider {
    pub fn new(path: PathBuf) -> Self {
        TomlConfigProvider { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ConfigProvider for TomlConfigProvider {
    fn get_config(&self) -> Result<OrbitConfig, OrbitError> {
        tracing::debug!("Attempting to read config from: {:?}", &self.path);
        if !self.path.exists() {
            tracing::debug!("Config file not found, using defaults.");
            return Ok(OrbitConfig::default());
        }
        let content = read_to_string(&self.path)?;
        toml::from_str(&content)
            .map_err(|e| OrbitError::Config(format!("{}: {e}", self.path.display())))
    }

    fn set_config(&self, config: &OrbitConfig) -> Result<(), OrbitError> {
        tracing::debug!("Attempting to write config to: {:?}", &self.path);
        let toml_string = toml::to_string(config)?;
        write(&self.path, toml_string)?;
        Ok(())
    }
}
