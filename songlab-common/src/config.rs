//! Configuration loading and root folder resolution

use crate::{Error, Result};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};

/// Environment variable naming the root folder
pub const ROOT_FOLDER_ENV: &str = "SONGLAB_ROOT_FOLDER";

/// Name of the per-root configuration file
pub const CONFIG_FILE_NAME: &str = "songlab.toml";

/// Root folder resolution following priority order:
/// 1. Command-line argument (highest priority)
/// 2. Environment variable
/// 3. TOML config file (`root_folder` key)
/// 4. OS-dependent compiled default (fallback)
pub fn resolve_root_folder(cli_arg: Option<&Path>, env_var_name: &str) -> PathBuf {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(env_var_name) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    // Priority 3: TOML config file
    if let Ok(config_path) = user_config_file() {
        if let Ok(toml_content) = std::fs::read_to_string(&config_path) {
            if let Ok(config) = toml::from_str::<toml::Value>(&toml_content) {
                if let Some(root_folder) = config.get("root_folder").and_then(|v| v.as_str()) {
                    return PathBuf::from(root_folder);
                }
            }
        }
    }

    // Priority 4: OS-dependent compiled default
    default_root_folder()
}

/// Create the root folder (and parents) if missing
pub fn ensure_directory_exists(path: &Path) -> Result<()> {
    if !path.exists() {
        std::fs::create_dir_all(path)?;
        tracing::info!(path = %path.display(), "Created root folder");
    } else if !path.is_dir() {
        return Err(Error::Config(format!(
            "Root folder path exists but is not a directory: {}",
            path.display()
        )));
    }
    Ok(())
}

/// Load a TOML file into `T`
///
/// Returns `Ok(None)` when the file does not exist so callers can fall back
/// to defaults; a file that exists but does not parse is a config error.
pub fn load_toml<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(path)?;
    let value = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
    Ok(Some(value))
}

/// Get the user configuration file path for the platform
fn user_config_file() -> Result<PathBuf> {
    let path = if cfg!(target_os = "linux") {
        // Try ~/.config/songlab/songlab.toml first, then /etc/songlab/songlab.toml
        let user_config = dirs::config_dir().map(|d| d.join("songlab").join(CONFIG_FILE_NAME));
        if let Some(path) = user_config {
            if path.exists() {
                return Ok(path);
            }
        }
        PathBuf::from("/etc/songlab").join(CONFIG_FILE_NAME)
    } else {
        dirs::config_dir()
            .map(|d| d.join("songlab").join(CONFIG_FILE_NAME))
            .ok_or_else(|| Error::Config("Could not determine config directory".to_string()))?
    };

    if path.exists() {
        Ok(path)
    } else {
        Err(Error::Config(format!("Config file not found: {:?}", path)))
    }
}

/// Get OS-dependent default root folder path
fn default_root_folder() -> PathBuf {
    if cfg!(target_os = "linux") {
        // ~/.local/share/songlab (or /var/lib/songlab for system-wide)
        dirs::data_local_dir()
            .map(|d| d.join("songlab"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/songlab"))
    } else if cfg!(target_os = "macos") {
        dirs::data_dir()
            .map(|d| d.join("songlab"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/songlab"))
    } else if cfg!(target_os = "windows") {
        dirs::data_local_dir()
            .map(|d| d.join("songlab"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\songlab"))
    } else {
        PathBuf::from("./songlab_data")
    }
}
