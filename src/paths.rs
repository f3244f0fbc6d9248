//! Config file location for samba-admin
//!
//! # Path Resolution Priority
//!
//! 1. `SAMBA_ADMIN_CONFIG` environment variable
//! 2. `XDG_CONFIG_HOME/samba-admin/config.toml` (if set)
//! 3. `~/.config/samba-admin/config.toml`
//!
//! Lookups go through an environment accessor so resolution can be tested
//! without mutating the process environment.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Environment variable naming the config file
pub const ENV_CONFIG: &str = "SAMBA_ADMIN_CONFIG";

const APP_DIR: &str = "samba-admin";
const CONFIG_FILE: &str = "config.toml";

/// Read a variable from the process environment, treating empty as unset.
pub fn process_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.is_empty())
}

/// Get the config file path from the process environment
pub fn config_file() -> Result<PathBuf> {
    config_file_with(process_env, dirs::home_dir().as_deref())
}

/// Resolve the config file path from an environment accessor and home dir.
pub fn config_file_with<F>(env: F, home: Option<&Path>) -> Result<PathBuf>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(file) = env(ENV_CONFIG) {
        let path = expand(&file);
        log::debug!("Using config file from {}: {}", ENV_CONFIG, path.display());
        return Ok(path);
    }

    if let Some(xdg_config) = env("XDG_CONFIG_HOME") {
        let path = PathBuf::from(xdg_config).join(APP_DIR).join(CONFIG_FILE);
        log::debug!("Using XDG_CONFIG_HOME: {}", path.display());
        return Ok(path);
    }

    let home = home.context("Could not determine home directory")?;
    let path = home.join(".config").join(APP_DIR).join(CONFIG_FILE);
    log::debug!("Using default config file: {}", path.display());
    Ok(path)
}

/// Expand `~` and environment variables in a path string.
///
/// Unknown variables leave the string as it was.
pub fn expand(path: &str) -> PathBuf {
    let expanded = shellexpand::full(path).unwrap_or(std::borrow::Cow::Borrowed(path));
    PathBuf::from(expanded.as_ref())
}

// ============================================================================
// Tests
// ============================================================================
