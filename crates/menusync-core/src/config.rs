//! Application configuration management.
//!
//! This module handles loading and saving the application configuration:
//! API base URL, selected outlet, language, and how long synced data stays
//! fresh.
//!
//! Configuration is stored at `~/.config/menusync/config.json`. Environment
//! variables `MENUSYNC_API_URL`, `MENUSYNC_OUTLET` and `MENUSYNC_LANG` override
//! the stored values.

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::models::{InfoParams, Language, MenuParams};
use crate::store::{MaxAge, DEFAULT_STALE_MINUTES};

/// Application name used for config/cache directory paths
const APP_NAME: &str = "menusync";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// API used when nothing else is configured
pub const DEFAULT_API_URL: &str = "https://menu.example.org/api";

/// Outlet shown when none has been selected yet
const DEFAULT_OUTLET_ID: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_base_url: String,
    pub outlet_id: u32,
    pub language: Language,
    pub stale_minutes: i64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_URL.to_string(),
            outlet_id: DEFAULT_OUTLET_ID,
            language: Language::default(),
            stale_minutes: DEFAULT_STALE_MINUTES,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse config file {}", path.display()))
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Apply `MENUSYNC_*` environment overrides.
    pub fn with_env_overrides(self) -> Result<Self> {
        self.with_overrides(|name| std::env::var(name).ok())
    }

    fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(url) = lookup("MENUSYNC_API_URL") {
            self.api_base_url = url;
        }
        if let Some(outlet) = lookup("MENUSYNC_OUTLET") {
            self.outlet_id = outlet
                .trim()
                .parse()
                .with_context(|| format!("Invalid MENUSYNC_OUTLET: {}", outlet))?;
        }
        if let Some(lang) = lookup("MENUSYNC_LANG") {
            self.language = lang.parse()?;
        }
        Ok(self)
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn cache_dir(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }

    pub fn freshness(&self) -> MaxAge {
        MaxAge::minutes(self.stale_minutes)
    }

    pub fn menu_params(&self) -> MenuParams {
        MenuParams::new(self.outlet_id, self.language)
    }

    pub fn info_params(&self) -> InfoParams {
        InfoParams {
            language: self.language,
        }
    }
}
