//! XDG Base Directory paths for kibitz.
//!
//! CLI tools should use XDG paths for cross-platform consistency,
//! not platform-native paths. This matches tools like gh, docker, kubectl.

use std::path::{Path, PathBuf};

const APP: &str = "kibitz";

/// Name of the config file in every config directory
pub const CONFIG_FILE: &str = "config.toml";

/// Overrides the per-project config directory name
pub const PROJECT_DIR_ENV: &str = "KIBITZ_PROJECT_CONFIG_DIR";

/// Get the kibitz config directory.
///
/// Returns `$XDG_CONFIG_HOME/kibitz` if set, otherwise `~/.config/kibitz`.
///
/// # Examples
///
/// ```
/// use kibitz_paths::config_dir;
///
/// let config = config_dir();
/// assert!(config.ends_with("kibitz"));
/// ```
pub fn config_dir() -> PathBuf {
    match std::env::var_os("XDG_CONFIG_HOME").filter(|v| !v.is_empty()) {
        Some(xdg_config) => PathBuf::from(xdg_config).join(APP),
        None => dirs::home_dir()
            .unwrap_or_default()
            .join(".config")
            .join(APP),
    }
}

/// User-level config file, `<config_dir>/config.toml`
pub fn user_config_file() -> PathBuf {
    config_dir().join(CONFIG_FILE)
}

/// Project-level config file under `root`
///
/// Defaults to `<root>/.kibitz/config.toml`; the directory can be renamed
/// with `KIBITZ_PROJECT_CONFIG_DIR`.
pub fn project_config_file(root: &Path) -> PathBuf {
    let dir = std::env::var(PROJECT_DIR_ENV)
        .ok()
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| format!(".{}", APP));
    root.join(dir).join(CONFIG_FILE)
}
