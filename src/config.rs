use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{AppError, Result};

const APP_DIR: &str = "recipe-shelf";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_db_path")]
    pub db_path: String,

    #[serde(default = "default_catalogue_dir")]
    pub catalogue_dir: PathBuf,

    #[serde(default = "default_random_count")]
    pub random_count: usize,

    #[serde(default = "default_list_count")]
    pub top_rated_count: usize,

    #[serde(default = "default_list_count")]
    pub recent_count: usize,
}

fn default_db_path() -> String {
    let data_dir = dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR);
    std::fs::create_dir_all(&data_dir).ok();
    data_dir.join("recipes.db").to_string_lossy().to_string()
}

fn default_catalogue_dir() -> PathBuf {
    PathBuf::from("assets")
}

fn default_random_count() -> usize {
    6
}

fn default_list_count() -> usize {
    10
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            catalogue_dir: default_catalogue_dir(),
            random_count: default_random_count(),
            top_rated_count: default_list_count(),
            recent_count: default_list_count(),
        }
    }
}

impl Config {
    /// Loads the user config, writing the defaults on first run.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Config = toml::from_str(&content)?;
            Ok(config)
        } else {
            let config = Config::default();
            config.save_to(path)?;
            Ok(config)
        }
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self).map_err(|e| AppError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR)
            .join("config.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn first_load_writes_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let config = Config::load_from(&path).unwrap();
        assert!(path.exists());
        assert_eq!(config.random_count, 6);
        assert_eq!(config.catalogue_dir, PathBuf::from("assets"));

        let reloaded = Config::load_from(&path).unwrap();
        assert_eq!(reloaded, config);
    }

    #[test]
    fn partial_file_keeps_defaults_for_missing_keys() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "db_path = \"/tmp/r.db\"\nrecent_count = 3\n").unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.db_path, "/tmp/r.db");
        assert_eq!(config.recent_count, 3);
        assert_eq!(config.top_rated_count, 10);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "random_count = \"many\"").unwrap();

        assert!(matches!(
            Config::load_from(&path),
            Err(AppError::ConfigParse(_))
        ));
    }
}
