//! Engine configuration.
//!
//! ## Learning: Serde for Serialization
//!
//! `#[derive(Serialize, Deserialize)]` generates the TOML conversion, and
//! `#[serde(default)]` fills in missing fields from `Default`, so an empty
//! or partial config file is always valid.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main engine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Buffer list behaviour
    pub buffers: BufferConfig,

    /// Key input and remapping
    pub input: InputConfig,

    /// Message log
    pub messages: MessageConfig,
}

impl Config {
    /// Loads config from the default location, falling back to defaults.
    pub fn load() -> Self {
        match Self::load_from_default_path() {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("Using default config: {}", e);
                Self::default()
            }
        }
    }

    /// Loads config from a file.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    fn load_from_default_path() -> Result<Self, ConfigError> {
        let path = Self::default_path()?;
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Returns the default config file path.
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        let config_dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        Ok(config_dir.join("vicore").join("config.toml"))
    }

    /// Saves the config to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(Self::default_path()?)
    }

    /// Saves the config to a file, creating parent directories.
    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }
}

/// Buffer list configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BufferConfig {
    /// Keep abandoned buffers loaded instead of unloading them
    pub hidden: bool,

    /// Reuse the empty unnamed current buffer when editing a file
    pub reuse_empty: bool,

    /// Line the cursor starts on when a buffer has no remembered position
    pub start_line: usize,

    /// Undo blocks kept per buffer
    pub undo_levels: usize,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            hidden: false,
            reuse_empty: true,
            start_line: 1,
            undo_levels: vicore_buffer::DEFAULT_UNDO_LEVELS,
        }
    }
}

/// Input configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    /// Apply key mappings
    pub remap: bool,

    /// User key mappings
    pub mappings: Vec<MappingConfig>,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            remap: true,
            mappings: Vec::new(),
        }
    }
}

/// One key mapping, written in key notation (`<Esc>`, `<CR>`, `<C-v>`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MappingConfig {
    /// `normal`, `insert` or `cmdline`
    pub mode: String,
    pub lhs: String,
    pub rhs: String,
}

/// Message log configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MessageConfig {
    /// How many messages the log keeps
    pub history: usize,
}

impl Default for MessageConfig {
    fn default() -> Self {
        Self { history: 200 }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Config directory not found")]
    NoConfigDir,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(!config.buffers.hidden);
        assert!(config.buffers.reuse_empty);
        assert!(config.input.remap);
        assert_eq!(config.messages.history, 200);
    }

    #[test]
    fn test_partial_toml() {
        let config: Config = toml::from_str(
            r#"
            [buffers]
            hidden = true

            [[input.mappings]]
            mode = "insert"
            lhs = "jk"
            rhs = "<Esc>"
            "#,
        )
        .unwrap();
        assert!(config.buffers.hidden);
        assert_eq!(config.buffers.start_line, 1);
        assert_eq!(config.input.mappings.len(), 1);
        assert_eq!(config.input.mappings[0].rhs, "<Esc>");
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let mut config = Config::default();
        config.buffers.hidden = true;

        config.save_to(&path).unwrap();
        let loaded = Config::load_from(&path).unwrap();
        assert!(loaded.buffers.hidden);
    }
}
