//! Path resolution for tscloud
//!
//! # Environment Variables
//!
//! - `TSCLOUD_CONFIG_DIR` - Override config directory
//! - `TSCLOUD_STATE_DIR` - Override state directory
//!
//! # Path Resolution Priority
//!
//! For config_dir():
//! 1. `TSCLOUD_CONFIG_DIR` environment variable
//! 2. `XDG_CONFIG_HOME/tscloud` (if set)
//! 3. `~/.config/tscloud`
//!
//! For state_dir():
//! 1. `TSCLOUD_STATE_DIR` environment variable
//! 2. `XDG_STATE_HOME/tscloud` (if set)
//! 3. `~/.local/state/tscloud`

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Environment variable for config directory override
pub const ENV_CONFIG_DIR: &str = "TSCLOUD_CONFIG_DIR";

/// Environment variable for state directory override
pub const ENV_STATE_DIR: &str = "TSCLOUD_STATE_DIR";

const APP_DIR: &str = "tscloud";
const CONFIG_FILE: &str = "config.toml";
const STATE_FILE: &str = "state.toml";

/// Get the tscloud config directory path
pub fn config_dir() -> Result<PathBuf> {
    config_dir_from(|key| std::env::var(key).ok(), dirs::home_dir())
}

/// Get the tscloud state directory path
pub fn state_dir() -> Result<PathBuf> {
    state_dir_from(|key| std::env::var(key).ok(), dirs::home_dir())
}

/// Path of `config.toml`
pub fn config_file() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE))
}

/// Path of `state.toml`
pub fn state_file() -> Result<PathBuf> {
    Ok(state_dir()?.join(STATE_FILE))
}

fn config_dir_from(env: impl Fn(&str) -> Option<String>, home: Option<PathBuf>) -> Result<PathBuf> {
    resolve(
        &env,
        ENV_CONFIG_DIR,
        "XDG_CONFIG_HOME",
        home,
        Path::new(".config"),
    )
}

fn state_dir_from(env: impl Fn(&str) -> Option<String>, home: Option<PathBuf>) -> Result<PathBuf> {
    resolve(
        &env,
        ENV_STATE_DIR,
        "XDG_STATE_HOME",
        home,
        &Path::new(".local").join("state"),
    )
}

fn resolve(
    env: &impl Fn(&str) -> Option<String>,
    override_var: &str,
    xdg_var: &str,
    home: Option<PathBuf>,
    home_relative: &Path,
) -> Result<PathBuf> {
    if let Some(dir) = env(override_var).filter(|d| !d.is_empty()) {
        let path = expand(&dir);
        log::debug!("Using dir from {}: {}", override_var, path.display());
        return Ok(path);
    }

    if let Some(xdg) = env(xdg_var).filter(|d| !d.is_empty()) {
        let path = PathBuf::from(xdg).join(APP_DIR);
        log::debug!("Using {}: {}", xdg_var, path.display());
        return Ok(path);
    }

    let home = home.context("Could not determine home directory")?;
    let path = home.join(home_relative).join(APP_DIR);
    log::debug!("Using default dir: {}", path.display());
    Ok(path)
}

/// Expand `~` and environment variables in a path
///
/// Unknown variables are left as written.
pub fn expand(path: &str) -> PathBuf {
    let expanded = shellexpand::full(path).unwrap_or(std::borrow::Cow::Borrowed(path));
    PathBuf::from(expanded.as_ref())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    fn home() -> Option<PathBuf> {
        Some(PathBuf::from("/home/dev"))
    }

    #[test]
    fn test_config_dir_env_override() {
        let env = env_of(&[
            (ENV_CONFIG_DIR, "/custom/config"),
            ("XDG_CONFIG_HOME", "/xdg"),
        ]);
        assert_eq!(
            config_dir_from(env, home()).unwrap(),
            PathBuf::from("/custom/config")
        );
    }

    #[test]
    fn test_config_dir_xdg() {
        let env = env_of(&[("XDG_CONFIG_HOME", "/xdg")]);
        assert_eq!(
            config_dir_from(env, home()).unwrap(),
            PathBuf::from("/xdg/tscloud")
        );
    }

    #[test]
    fn test_config_dir_default() {
        assert_eq!(
            config_dir_from(env_of(&[]), home()).unwrap(),
            PathBuf::from("/home/dev/.config/tscloud")
        );
    }

    #[test]
    fn test_empty_override_is_ignored() {
        let env = env_of(&[(ENV_STATE_DIR, "")]);
        assert_eq!(
            state_dir_from(env, home()).unwrap(),
            PathBuf::from("/home/dev/.local/state/tscloud")
        );
    }

    #[test]
    fn test_state_dir_xdg() {
        let env = env_of(&[("XDG_STATE_HOME", "/var/xdg")]);
        assert_eq!(
            state_dir_from(env, home()).unwrap(),
            PathBuf::from("/var/xdg/tscloud")
        );
    }

    #[test]
    fn test_no_home_is_an_error() {
        assert!(state_dir_from(env_of(&[]), None).is_err());
    }

    #[test]
    fn test_expand_absolute() {
        assert_eq!(expand("/abs/path"), PathBuf::from("/abs/path"));
    }

    #[test]
    fn test_expand_unknown_env_var_unchanged() {
        let result = expand("$TSCLOUD_SURELY_UNSET_VAR/x");
        assert_eq!(result, PathBuf::from("$TSCLOUD_SURELY_UNSET_VAR/x"));
    }
}
