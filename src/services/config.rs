use crate::error::ConfigError;
use crate::models::config::DetectorConfig;
use std::fs;
use std::path::{Path, PathBuf};

/// Loads and saves the detector configuration file
pub struct ConfigManager {
    config_dir: PathBuf,
    config_path: PathBuf,
}

impl ConfigManager {
    /// Manager for `config.json` in the platform config directory.
    ///
    /// The directory is created on first save, not here.
    pub fn new() -> Result<Self, ConfigError> {
        let config_dir = dirs::config_dir()
            .ok_or(ConfigError::NoPlatformDir("config"))?
            .join("combat-scan");
        let config_path = config_dir.join("config.json");

        Ok(Self {
            config_dir,
            config_path,
        })
    }

    /// Manager for an explicit config file path
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        let config_path = path.into();
        let config_dir = config_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();

        Self {
            config_dir,
            config_path,
        }
    }

    /// Save configuration to disk (pretty JSON)
    pub fn save(&self, config: &DetectorConfig) -> Result<(), ConfigError> {
        let save_failed = |source: Box<dyn std::error::Error + Send + Sync>| ConfigError::SaveFailed {
            path: self.config_path.clone(),
            source,
        };

        if !self.config_dir.as_os_str().is_empty() {
            fs::create_dir_all(&self.config_dir).map_err(|e| save_failed(e.into()))?;
        }

        let json = serde_json::to_string_pretty(config).map_err(|e| save_failed(e.into()))?;
        fs::write(&self.config_path, json).map_err(|e| save_failed(e.into()))?;

        tracing::debug!(path = %self.config_path.display(), "configuration saved");
        Ok(())
    }

    /// Load and validate configuration; defaults when the file is missing
    pub fn load(&self) -> Result<DetectorConfig, ConfigError> {
        if !self.config_exists() {
            tracing::debug!(path = %self.config_path.display(), "no config file, using defaults");
            return Ok(DetectorConfig::default());
        }

        let load_failed = |source: Box<dyn std::error::Error + Send + Sync>| ConfigError::LoadFailed {
            path: self.config_path.clone(),
            source,
        };

        let content = fs::read_to_string(&self.config_path).map_err(|e| load_failed(e.into()))?;
        let config: DetectorConfig = serde_json::from_str(&content).map_err(|e| load_failed(e.into()))?;
        config.validate()?;

        Ok(config)
    }

    pub fn config_file_path(&self) -> &Path {
        &self.config_path
    }

    pub fn config_exists(&self) -> bool {
        self.config_path.exists()
    }
}
