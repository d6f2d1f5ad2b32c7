use std::path::PathBuf;

use anyhow::{anyhow, Result};

const SETTINGS_FILE: &str = "config.toml";

/// The managed tool's own configuration directory.
pub fn tool_config_dir() -> Result<PathBuf> {
    tool_config_dir_from(|key| std::env::var(key).ok())
}

pub fn tool_config_dir_from(env: impl Fn(&str) -> Option<String>) -> Result<PathBuf> {
    if let Some(dir) = non_empty(env("GH_CONFIG_DIR")) {
        return Ok(PathBuf::from(dir));
    }
    user_config_root(&env).map(|root| root.join("gh"))
}

/// Where ghup looks for its own settings file.
pub fn settings_path() -> Result<PathBuf> {
    settings_path_from(|key| std::env::var(key).ok())
}

pub fn settings_path_from(env: impl Fn(&str) -> Option<String>) -> Result<PathBuf> {
    if let Some(path) = non_empty(env("GHUP_CONFIG")) {
        return Ok(PathBuf::from(path));
    }
    user_config_root(&env).map(|root| root.join("ghup").join(SETTINGS_FILE))
}

pub fn workspace_parent() -> PathBuf {
    std::env::temp_dir()
}

fn user_config_root(env: &impl Fn(&str) -> Option<String>) -> Result<PathBuf> {
    if let Some(xdg) = non_empty(env("XDG_CONFIG_HOME")) {
        return Ok(PathBuf::from(xdg));
    }
    let home = non_empty(env("HOME"))
        .ok_or_else(|| anyhow!("HOME is not set; cannot resolve user configuration directory"))?;
    Ok(PathBuf::from(home).join(".config"))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}
