use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{LensError, Result};
use crate::prefetch::{DEFAULT_BATCH_CAP, DEFAULT_OVERSCAN};

pub const DEFAULT_PORT: u16 = 7878;

/// Tunables for the viewer. Every field may be omitted from the TOML file.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ViewerConfig {
    /// Lines fetched above and below the visible range.
    pub overscan: u64,
    /// Maximum lines in a single fetch.
    pub batch_cap: u64,
    /// Estimated height of one line, in rows.
    pub line_height: u32,
    /// Height of the viewport, in rows.
    pub viewport_height: u32,
    pub search_max_results: usize,
    pub port: u16,
    pub log_level: String,
    pub recent_files_path: Option<PathBuf>,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            overscan: DEFAULT_OVERSCAN,
            batch_cap: DEFAULT_BATCH_CAP,
            line_height: 1,
            viewport_height: 40,
            search_max_results: 1000,
            port: DEFAULT_PORT,
            log_level: "info".to_string(),
            recent_files_path: None,
        }
    }
}

impl ViewerConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text).map_err(|e| LensError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .map_err(|e| LensError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<()> {
        if self.batch_cap == 0 {
            return Err(LensError::Config("batch_cap must be at least 1".to_string()));
        }
        if self.line_height == 0 {
            return Err(LensError::Config("line_height must be at least 1".to_string()));
        }
        if self.search_max_results == 0 {
            return Err(LensError::Config(
                "search_max_results must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Where the recent-files list lives unless configured otherwise.
    pub fn recent_files_store(&self) -> Option<PathBuf> {
        self.recent_files_path
            .clone()
            .or_else(|| dirs::config_dir().map(|dir| dir.join("loglens").join("recent.json")))
    }
}
