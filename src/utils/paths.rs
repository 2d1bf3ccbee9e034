//! Cross-Platform Path Utilities
//!
//! Functions for resolving the application directory (~/.mailpilot/).

use std::path::{Path, PathBuf};

use crate::utils::error::{AppError, AppResult};

/// Get the user's home directory
pub fn home_dir() -> AppResult<PathBuf> {
    dirs::home_dir().ok_or_else(|| AppError::config("Could not determine home directory"))
}

/// Get the mailpilot directory (~/.mailpilot/)
pub fn mailpilot_dir() -> AppResult<PathBuf> {
    Ok(home_dir()?.join(".mailpilot"))
}

/// Get the config file path (~/.mailpilot/config.json)
pub fn config_path() -> AppResult<PathBuf> {
    Ok(mailpilot_dir()?.join("config.json"))
}

/// Get the database file path (~/.mailpilot/data.db)
pub fn database_path() -> AppResult<PathBuf> {
    Ok(mailpilot_dir()?.join("data.db"))
}

/// Ensure a directory exists, creating it if necessary
pub fn ensure_dir(path: &Path) -> AppResult<()> {
    if !path.exists() {
        std::fs::create_dir_all(path)?;
    }
    Ok(())
}

/// Get the mailpilot directory, creating if it doesn't exist
pub fn ensure_mailpilot_dir() -> AppResult<PathBuf> {
    let path = mailpilot_dir()?;
    ensure_dir(&path)?;
    Ok(path)
}
