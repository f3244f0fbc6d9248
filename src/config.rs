//! Runtime settings: where Samba, the shares index and the store live.
//!
//! Each field is taken from its environment variable, then the TOML config
//! file, then the built-in default.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::paths;

pub const DEFAULT_SMB_CONF: &str = "/etc/samba/smb.conf";
pub const DEFAULT_SHARES_DIR: &str = "/etc/samba/shares.d/ui";
pub const DEFAULT_SHARES_INDEX: &str = "/etc/samba/shares.d/ui/shares.conf";
pub const DEFAULT_DATABASE: &str = "/data/app.db";
pub const DEFAULT_SHARE_ROOT: &str = "/shares";

/// Contents of `config.toml`. Every key is optional.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileSettings {
    pub smb_conf: Option<String>,
    pub shares_dir: Option<String>,
    pub shares_index: Option<String>,
    pub database: Option<String>,
    pub share_root: Option<String>,
}

impl FileSettings {
    /// Read a config file; a missing file yields empty settings.
    pub fn read(path: &Path) -> Result<Self> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                log::debug!("No config file at {}", path.display());
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(e).with_context(|| format!("Could not read {}", path.display()));
            }
        };
        toml::from_str(&content).with_context(|| format!("Invalid config in {}", path.display()))
    }
}

/// Resolved paths used by every command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Settings {
    /// Main Samba configuration, treated as read-only
    pub smb_conf: PathBuf,
    /// Directory holding one snippet per managed share
    pub shares_dir: PathBuf,
    /// Managed shares index included from smb.conf
    pub shares_index: PathBuf,
    /// SQLite desired-state store
    pub database: PathBuf,
    /// Parent directory of share paths
    pub share_root: PathBuf,
}

impl Settings {
    /// Load settings from the process environment and config file.
    ///
    /// An explicit `config` path must exist; the default location may not.
    pub fn load(config: Option<&Path>) -> Result<Self> {
        let file = match config {
            Some(path) => {
                if !path.exists() {
                    anyhow::bail!("Config file not found: {}", path.display());
                }
                FileSettings::read(path)?
            }
            None => FileSettings::read(&paths::config_file()?)?,
        };
        Ok(Self::resolve(&file, paths::process_env))
    }

    /// Combine environment, file and defaults.
    pub fn resolve<F>(file: &FileSettings, env: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let pick = |var: &str, from_file: &Option<String>, default: &str| {
            let raw = env(var)
                .or_else(|| from_file.clone())
                .unwrap_or_else(|| default.to_string());
            paths::expand(&raw)
        };

        Self {
            smb_conf: pick("SMB_CONF", &file.smb_conf, DEFAULT_SMB_CONF),
            shares_dir: pick("UI_SHARES_DIR", &file.shares_dir, DEFAULT_SHARES_DIR),
            shares_index: pick("UI_SHARES_INDEX", &file.shares_index, DEFAULT_SHARES_INDEX),
            database: pick("APP_DB", &file.database, DEFAULT_DATABASE),
            share_root: pick("SHARE_ROOT", &file.share_root, DEFAULT_SHARE_ROOT),
        }
    }

    /// Snippet file for a managed share.
    pub fn share_file(&self, name: &str) -> PathBuf {
        sambakit::snippet::share_file_path(&self.shares_dir, name)
    }
}
