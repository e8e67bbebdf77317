//! Configuration for the adaptive trainer.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use srs_engine::{EngineResult, Settings};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub scheduling: Settings,
    #[serde(default)]
    pub display: DisplayConfig,
}

impl Config {
    /// Load from the default path. A missing file yields the defaults.
    pub fn load() -> anyhow::Result<Self> {
        match Self::config_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }

    /// Load from a specific file. A missing file yields the defaults.
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("parsing {}", path.display()))
    }

    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "adaptive-trainer")
            .map(|d| d.config_dir().join("config.toml"))
    }

    pub fn db_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "adaptive-trainer")
            .map(|d| d.data_dir().join("items.db"))
    }

    /// Validated scheduling settings.
    pub fn settings(&self) -> EngineResult<Settings> {
        self.scheduling.validate()?;
        Ok(self.scheduling.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplayConfig {
    #[serde(default = "default_true")]
    pub show_thinking_time: bool,
    #[serde(default = "default_true")]
    pub show_next_review: bool,
}

fn default_true() -> bool { true }

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            show_thinking_time: true,
            show_next_review: true,
        }
    }
}
