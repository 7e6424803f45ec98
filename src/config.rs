use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::logging::LoggingSettings;

/// Environment variable naming an explicit configuration file
pub const CONFIG_ENV_VAR: &str = "REPLAYCAST_CONFIG";

/// Delivery policy of a single publisher
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PublisherConfig {
    /// Identifier used in log lines; a random UUID when unset
    pub publisher_id: Option<String>,

    /// Remove a subscriber from the registry after its `on_next` fails
    pub unsubscribe_on_error: bool,

    /// Replay the history log to subscribers that join late
    pub replay_on_subscribe: bool,

    /// Treat a panicking callback as a delivery failure instead of unwinding
    pub catch_panics: bool,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            publisher_id: None,
            unsubscribe_on_error: true,
            replay_on_subscribe: true,
            catch_panics: true,
        }
    }
}

impl PublisherConfig {
    pub fn with_publisher_id(mut self, id: impl Into<String>) -> Self {
        self.publisher_id = Some(id.into());
        self
    }

    pub fn with_unsubscribe_on_error(mut self, enabled: bool) -> Self {
        self.unsubscribe_on_error = enabled;
        self
    }

    pub fn with_replay_on_subscribe(mut self, enabled: bool) -> Self {
        self.replay_on_subscribe = enabled;
        self
    }

    pub fn with_catch_panics(mut self, enabled: bool) -> Self {
        self.catch_panics = enabled;
        self
    }
}

/// Complete configuration file: `[publisher]` and `[logging]` sections
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifyConfig {
    pub publisher: PublisherConfig,
    pub logging: LoggingSettings,
}

impl NotifyConfig {
    /// Load configuration using the discovery hierarchy
    pub fn load() -> Result<Self> {
        debug!("Starting configuration discovery");

        for path in discover_config_files() {
            debug!("Attempting to load config from: {}", path.display());
            if path.exists() {
                info!("Loading configuration from: {}", path.display());
                return Self::load_from_file(&path);
            }
        }

        info!("No configuration file found, using defaults");
        Ok(Self::default())
    }

    /// Load configuration from an explicit file path
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::from_toml_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).context("Failed to parse TOML content")?;
        debug!("Parsed configuration: {:?}", config);
        Ok(config)
    }
}

/// Candidate configuration files, highest priority first
fn discover_config_files() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    // 1. Environment variable
    if let Ok(env_path) = env::var(CONFIG_ENV_VAR) {
        paths.push(PathBuf::from(env_path));
    }

    // 2. XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
        paths.push(config_dir.join("replaycast").join("config.toml"));
    }

    // 3. Home directory
    if let Some(home_dir) = dirs::home_dir() {
        paths.push(home_dir.join(".replaycast.toml"));
    }

    // 4. Project local
    paths.push(PathBuf::from("./.replaycast.toml"));

    debug!("Config discovery paths: {:?}", paths);
    paths
}
