//! Configuration loading for rolecall.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::store::UserId;

/// Get the rolecall home directory (~/.rolecall).
pub fn get_home_dir() -> Result<PathBuf> {
    let home = directories::UserDirs::new()
        .ok_or_else(|| Error::Config("Could not determine home directory".to_string()))?;

    Ok(home.home_dir().join(".rolecall"))
}

/// Get the default settings file path.
pub fn get_settings_path() -> Result<PathBuf> {
    Ok(get_home_dir()?.join("settings.json"))
}

fn default_prefix() -> String {
    "!!".to_string()
}

/// rolecall settings.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Settings {
    /// Leading text that marks a message as a command.
    #[serde(default = "default_prefix")]
    pub prefix: String,

    /// SQLite database file; defaults to ~/.rolecall/commands.db.
    #[serde(default)]
    pub database: Option<PathBuf>,

    /// Admin seeded into an empty store; the only one who can remove other admins.
    pub bootstrap_admin: UserId,
}

impl Settings {
    pub fn new(bootstrap_admin: UserId) -> Self {
        Self {
            prefix: default_prefix(),
            database: None,
            bootstrap_admin,
        }
    }

    /// Resolved database path.
    pub fn database_path(&self) -> Result<PathBuf> {
        match &self.database {
            Some(path) => Ok(path.clone()),
            None => Ok(get_home_dir()?.join("commands.db")),
        }
    }
}

/// Resolve an explicit settings path or fall back to the default location.
pub fn resolve_settings_path(path: Option<&Path>) -> Result<PathBuf> {
    match path {
        Some(path) => Ok(path.to_path_buf()),
        None => get_settings_path(),
    }
}

/// Load settings from `path`.
pub fn load_settings(path: &Path) -> Result<Settings> {
    if !path.exists() {
        return Err(Error::Config(format!(
            "Settings file not found at {}. Run 'rolecall init' first.",
            path.display()
        )));
    }

    let content = std::fs::read_to_string(path)?;
    let settings: Settings = serde_json::from_str(&content)?;
    validate_settings(&settings)?;

    tracing::debug!("Loaded settings from {}", path.display());
    Ok(settings)
}

/// Write settings to `path`, refusing to replace an existing file.
pub fn save_new_settings(path: &Path, settings: &Settings) -> Result<()> {
    validate_settings(settings)?;
    if path.exists() {
        return Err(Error::Config(format!(
            "Settings file already exists at {}",
            path.display()
        )));
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, serde_json::to_string_pretty(settings)?)?;
    tracing::info!("Wrote settings to {}", path.display());
    Ok(())
}

fn validate_settings(settings: &Settings) -> Result<()> {
    if settings.prefix.trim().is_empty() {
        return Err(Error::Config("prefix must not be empty".to_string()));
    }
    if settings.bootstrap_admin.0 <= 0 {
        return Err(Error::Config(format!(
            "bootstrap_admin must be a positive user id, got {}",
            settings.bootstrap_admin
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_applied() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{ "bootstrap_admin": 170045009318510593 }"#).unwrap();

        let settings = load_settings(&path).unwrap();
        assert_eq!(settings.prefix, "!!");
        assert_eq!(settings.database, None);
        assert_eq!(settings.bootstrap_admin, UserId(170045009318510593));
    }

    #[test]
    fn test_missing_file_and_bad_values() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.json");
        assert!(matches!(load_settings(&path), Err(Error::Config(_))));

        std::fs::write(&path, r#"{ "prefix": " ", "bootstrap_admin": 1 }"#).unwrap();
        assert!(matches!(load_settings(&path), Err(Error::Config(_))));

        std::fs::write(&path, r#"{ "bootstrap_admin": 0 }"#).unwrap();
        assert!(matches!(load_settings(&path), Err(Error::Config(_))));

        std::fs::write(&path, r#"{ "prefix": "!" }"#).unwrap();
        assert!(matches!(load_settings(&path), Err(Error::Json(_))));
    }

    #[test]
    fn test_save_new_settings_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("settings.json");
        let mut settings = Settings::new(UserId(7));
        settings.database = Some(dir.path().join("bot.db"));

        save_new_settings(&path, &settings).unwrap();
        assert_eq!(load_settings(&path).unwrap(), settings);
        assert_eq!(settings.database_path().unwrap(), dir.path().join("bot.db"));

        assert!(matches!(save_new_settings(&path, &settings), Err(Error::Config(_))));
    }
}
