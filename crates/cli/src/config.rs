//! Application configuration file
//!
//! Stored as TOML at `<config_dir>/labwatch/config.toml`, or wherever
//! `LABWATCH_CONFIG` points. A missing file means defaults.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;
use watcher::{LabPathSource, WatcherConfig};

/// Environment variable overriding the config file location
pub const CONFIG_ENV: &str = "LABWATCH_CONFIG";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Lab directory; unset until the user picks one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labpath: Option<PathBuf>,

    #[serde(default)]
    pub watcher: WatcherConfig,
}

impl AppConfig {
    pub fn validate(&self) -> Result<()> {
        self.watcher.validate().context("Invalid [watcher] section")?;

        if let Some(lab) = &self.labpath {
            if lab.as_os_str().is_empty() {
                bail!("labpath must not be empty (remove the key to leave it unset)");
            }
            if !lab.is_absolute() {
                bail!("labpath must be an absolute path (got {})", lab.display());
            }
        }
        Ok(())
    }
}

/// Location of the config file
pub fn config_file_path() -> Result<PathBuf> {
    if let Some(path) = std::env::var_os(CONFIG_ENV).filter(|p| !p.is_empty()) {
        return Ok(PathBuf::from(path));
    }

    let config_dir = dirs::config_dir().context("Could not determine the user config directory")?;
    Ok(config_dir.join("labwatch").join("config.toml"))
}

pub fn load() -> Result<AppConfig> {
    load_from(&config_file_path()?)
}

/// Read and validate a config file; defaults when it does not exist
pub fn load_from(path: &Path) -> Result<AppConfig> {
    if !path.exists() {
        debug!("No config file at {}, using defaults", path.display());
        return Ok(AppConfig::default());
    }

    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    let config: AppConfig = toml::from_str(&contents)
        .with_context(|| format!("Failed to parse config file {}", path.display()))?;
    config
        .validate()
        .with_context(|| format!("Invalid config file {}", path.display()))?;

    Ok(config)
}

pub fn save(config: &AppConfig) -> Result<()> {
    save_to(&config_file_path()?, config)
}

/// Validate and write `config`, replacing the file atomically
pub fn save_to(path: &Path, config: &AppConfig) -> Result<()> {
    config.validate()?;

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create config directory {}", parent.display()))?;
    }

    let contents = toml::to_string_pretty(config).context("Failed to serialize config")?;
    let tmp = path.with_extension("toml.tmp");
    fs::write(&tmp, contents).with_context(|| format!("Failed to write {}", tmp.display()))?;
    fs::rename(&tmp, path).with_context(|| format!("Failed to replace {}", path.display()))?;

    Ok(())
}

/// Write the default config if no file exists yet; returns whether it did
pub fn init_if_missing() -> Result<bool> {
    let path = config_file_path()?;
    if path.exists() {
        return Ok(false);
    }
    save_to(&path, &AppConfig::default())?;
    Ok(true)
}

pub fn example_config() -> &'static str {
    r#"# Labwatch configuration

# Directory to watch. Leave unset to have `labwatch watch` wait until it is set
# (e.g. with `labwatch config set-lab <path>`).
labpath = "/home/user/Lab"

[watcher]
# Delay between two polls, in milliseconds (1-3600000)
poll_interval_ms = 500

[watcher.ignore]
# Skip dot-files and dot-directories
ignore_hidden = true
# Absolute paths excluded along with their subtrees
ignored_paths = ["/home/user/Lab/.labmonster"]
# Gitignore-style patterns, relative to the lab
patterns = ["*.tmp", "exports/"]
# Also read patterns from <lab>/.labignore
use_labignore = true
"#
}

/// Lab path read from the config file on every call
///
/// Lets a running `labwatch watch` pick up `labwatch config set-lab` from
/// another terminal.
#[derive(Debug, Clone)]
pub struct ConfigFileSource {
    path: PathBuf,
}

impl ConfigFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl LabPathSource for ConfigFileSource {
    fn lab_path(&self) -> Option<PathBuf> {
        match load_from(&self.path) {
            Ok(config) => config.labpath,
            Err(err) => {
                debug!("Ignoring unreadable config: {:#}", err);
                None
            }
        }
    }
}
