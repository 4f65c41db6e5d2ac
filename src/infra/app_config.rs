use crate::domain::{ConfigError, DiffViewOptions};
use crate::infra::diff::normalize::NormalizeOptions;
use crate::infra::diff::queue::QueueConfig;
use crate::infra::diff::tokens::EditMarkMode;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub diff: DiffConfig,
    pub stream: StreamConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DiffConfig {
    pub compact: bool,
    pub inline: bool,
    pub context_lines: usize,
    pub time_slice_ms: u64,
    pub edit_mark_mode: EditMarkMode,
    pub hide_managed_fields: bool,
    pub strip_server_fields: bool,
    /// Hide resources whose live and target manifests are identical.
    pub changed_only: bool,
}

impl Default for DiffConfig {
    fn default() -> Self {
        Self {
            compact: true,
            inline: true,
            context_lines: 2,
            time_slice_ms: 100,
            edit_mark_mode: EditMarkMode::default(),
            hide_managed_fields: true,
            strip_server_fields: false,
            changed_only: false,
        }
    }
}

impl DiffConfig {
    pub fn queue_config(&self) -> QueueConfig {
        QueueConfig {
            time_slice: Duration::from_millis(self.time_slice_ms),
            context_lines: self.context_lines,
        }
    }

    pub fn normalize_options(&self) -> NormalizeOptions {
        NormalizeOptions {
            hide_managed_fields: self.hide_managed_fields,
            strip_server_fields: self.strip_server_fields,
        }
    }

    pub fn view_options(&self) -> DiffViewOptions {
        DiffViewOptions {
            compact_diff: self.compact,
            inline_diff: self.inline,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StreamConfig {
    pub retry_delay_ms: u64,
    pub zombie_threshold_secs: u64,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            retry_delay_ms: 500,
            zombie_threshold_secs: 120,
        }
    }
}

impl StreamConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn zombie_threshold(&self) -> Duration {
        Duration::from_secs(self.zombie_threshold_secs)
    }
}

/// Loads the user config, falling back to defaults when it is missing or
/// unreadable.
pub fn load_config() -> AppConfig {
    let path = config_path();
    match load_config_from(&path) {
        Ok(config) => config,
        Err(err) => {
            log::warn!("ignoring config at {}: {err}", path.display());
            AppConfig::default()
        }
    }
}

/// A missing file yields the defaults; an invalid one is an error.
pub fn load_config_from(path: &Path) -> Result<AppConfig, ConfigError> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(AppConfig::default()),
        Err(err) => return Err(err.into()),
    };
    Ok(toml::from_str(&contents)?)
}

pub fn save_config_to(path: &Path, config: &AppConfig) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let contents = toml::to_string_pretty(config)?;
    std::fs::write(path, contents)?;
    Ok(())
}

pub fn save_config(config: &AppConfig) -> anyhow::Result<()> {
    let path = config_path();
    save_config_to(&path, config).with_context(|| format!("save config to {}", path.display()))
}

pub fn config_path() -> PathBuf {
    if let Ok(path) = std::env::var("SYNCVIEW_CONFIG_PATH") {
        return PathBuf::from(path);
    }

    app_data_dir().join("config.toml")
}

fn app_data_dir() -> PathBuf {
    if let Ok(path) = std::env::var("SYNCVIEW_DATA_HOME") {
        return PathBuf::from(path);
    }

    #[cfg(target_os = "macos")]
    {
        if let Some(home) = home::home_dir() {
            return home
                .join("Library")
                .join("Application Support")
                .join("SyncView");
        }
    }

    #[cfg(target_os = "windows")]
    {
        if let Some(appdata) = std::env::var_os("APPDATA") {
            return PathBuf::from(appdata).join("SyncView");
        }
    }

    #[cfg(target_os = "linux")]
    {
        if let Some(xdg) = std::env::var_os("XDG_DATA_HOME") {
            return PathBuf::from(xdg).join("syncview");
        }
        if let Some(home) = home::home_dir() {
            return home.join(".local").join("share").join("syncview");
        }
    }

    std::env::current_dir()
        .unwrap_or_else(|_| PathBuf::from("."))
        .join(".syncview")
}
