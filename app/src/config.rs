//! Per-user settings, stored as TOML in the platform configuration directory.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context as _;
use directories::ProjectDirs;
use log::{error, info, warn};
use plugflow::{Context, ContextValue, EngineConfig};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Default, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub engine: EngineConfig,
    /// Context variables every request starts from. Command line values
    /// override these.
    pub context: BTreeMap<String, ContextValue>,
}

impl AppConfig {
    /// The configured context with `overrides` (`key=value` strings) applied.
    pub fn context(&self, overrides: &[String]) -> anyhow::Result<Context> {
        let mut context = Context::from_entries(self.context.clone());
        for entry in overrides {
            let (key, value) = entry
                .split_once('=')
                .with_context(|| format!("context variable `{}` is not KEY=VALUE", entry))?;
            context = context.set(key.trim(), ContextValue::parse(value.trim()));
        }
        Ok(context)
    }
}

pub fn get_config_path() -> Option<PathBuf> {
    let proj_dirs = ProjectDirs::from("org", "plugflow", "plugflow")?;
    let config_dir = proj_dirs.config_dir();
    if !config_dir.exists() {
        if let Err(e) = fs::create_dir_all(config_dir) {
            error!("Failed to create config directory: {}", e);
            return None;
        }
    }
    Some(config_dir.join("config.toml"))
}

pub fn save_config(config: &AppConfig, path: &Path) -> anyhow::Result<()> {
    let toml_str = toml::to_string_pretty(config).context("Failed to serialize config")?;
    fs::write(path, toml_str).with_context(|| format!("Failed to write {}", path.display()))?;
    info!("Config saved to {}", path.display());
    Ok(())
}

/// Read the config at `path`. Missing or unreadable files give the defaults.
pub fn load_config(path: Option<&Path>) -> AppConfig {
    let Some(path) = path else {
        return AppConfig::default();
    };
    if !path.exists() {
        return AppConfig::default();
    }
    match fs::read_to_string(path) {
        Ok(toml_str) => match toml::from_str(&toml_str) {
            Ok(config) => config,
            Err(e) => {
                warn!("Failed to parse config file, using defaults: {}", e);
                AppConfig::default()
            }
        },
        Err(e) => {
            warn!("Failed to read config file, using defaults: {}", e);
            AppConfig::default()
        }
    }
}
