//! Cross-platform path utilities for dashlink.
//!
//! Single source of truth for where the daemon looks for its configuration.
//!
//! # Platform Behavior
//!
//! | Platform | Config Directory |
//! |----------|------------------|
//! | Linux    | `~/.config/dashlink` |
//! | macOS    | `~/Library/Application Support/dashlink` |
//! | Windows  | `%APPDATA%/dashlink` |

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use thiserror::Error;

/// Errors specific to path operations.
#[derive(Error, Debug)]
pub enum PathError {
    #[error("Could not determine configuration directory")]
    NoConfigDirectory,

    #[error("Config path has no parent directory: {0}")]
    NoParent(PathBuf),
}

/// Application identifier used in path construction.
const APP_NAME: &str = "dashlink";

/// Configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Get the configuration directory without touching the filesystem.
pub fn config_dir_location() -> Result<PathBuf> {
    let base = dirs::config_dir().ok_or(PathError::NoConfigDirectory)?;
    Ok(base.join(APP_NAME))
}

/// Get the path of the default configuration file.
///
/// The file itself is not created here.
pub fn get_config_file() -> Result<PathBuf> {
    Ok(config_dir_location()?.join(CONFIG_FILE_NAME))
}

/// Make sure the parent directory of `path` exists.
pub fn ensure_parent_dir(path: &Path) -> Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| PathError::NoParent(path.to_path_buf()))?;

    if parent.as_os_str().is_empty() {
        // Relative file name in the working directory
        return Ok(());
    }

    ensure_dir(parent)
}

fn ensure_dir(dir: &Path) -> Result<()> {
    if dir.exists() {
        return Ok(());
    }

    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create directory: {}", dir.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = fs::Permissions::from_mode(0o700);
        fs::set_permissions(dir, perms)
            .with_context(|| format!("Failed to set permissions on {}", dir.display()))?;
    }

    Ok(())
}
