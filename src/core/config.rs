//! Configuration management with layered hierarchy

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

use crate::core::cache::CACHE_FILE;
use crate::core::record::Location;

/// Errors that can occur while loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yml::Error,
    },

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] serde_yml::Error),
}

/// Game manager configuration with layered hierarchy
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Folders scanned recursively for games on the PC
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub pc_folders: Vec<PathBuf>,

    /// Root of the SD card, scanned without recursion
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sd_root: Option<PathBuf>,

    /// Location list mirrored to the view
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_view: Option<Location>,

    /// Where the metadata cache is stored
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_file: Option<PathBuf>,
}

impl Config {
    /// Load configuration from all sources, merging in priority order
    ///
    /// An explicit file replaces the global config and must be readable.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = Config::default();

        // 1. Built-in defaults (already in Default impl)

        // 2. Explicit config file, or the global user config
        match explicit {
            Some(path) => config.merge(Self::load_from(path)?),
            None => {
                if let Some(global_path) = Self::global_config_path() {
                    if global_path.exists() {
                        match Self::load_from(&global_path) {
                            Ok(global) => config.merge(global),
                            Err(e) => warn!(error = %e, "ignoring global config"),
                        }
                    }
                }
            }
        }

        // 3. Environment variables
        config.apply_env(|key| std::env::var_os(key).map(|v| v.to_string_lossy().into_owned()));

        Ok(config)
    }

    /// Read and parse a single YAML config file
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = serde_yml::from_str::<Config>(&contents).map_err(|source| {
            ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            }
        })?;
        debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    /// Get the path to the global config file
    pub fn global_config_path() -> Option<PathBuf> {
        project_dirs().map(|dirs| dirs.config_dir().join("config.yaml"))
    }

    /// Merge another config into this one (other takes precedence)
    pub fn merge(&mut self, other: Config) {
        if !other.pc_folders.is_empty() {
            self.pc_folders = other.pc_folders;
        }
        if other.sd_root.is_some() {
            self.sd_root = other.sd_root;
        }
        if other.default_view.is_some() {
            self.default_view = other.default_view;
        }
        if other.cache_file.is_some() {
            self.cache_file = other.cache_file;
        }
    }

    /// Apply `SGM_*` overrides read through `lookup`
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(folders) = lookup("SGM_PC_FOLDERS") {
            let folders: Vec<PathBuf> = std::env::split_paths(&folders)
                .filter(|p| !p.as_os_str().is_empty())
                .collect();
            if !folders.is_empty() {
                self.pc_folders = folders;
            }
        }
        if let Some(root) = lookup("SGM_SD_ROOT") {
            if !root.is_empty() {
                self.sd_root = Some(PathBuf::from(root));
            }
        }
        if let Some(file) = lookup("SGM_CACHE_FILE") {
            if !file.is_empty() {
                self.cache_file = Some(PathBuf::from(file));
            }
        }
        if let Some(view) = lookup("SGM_DEFAULT_VIEW") {
            match view.parse::<Location>() {
                Ok(location) => self.default_view = Some(location),
                Err(e) => warn!(value = %view, error = %e, "ignoring SGM_DEFAULT_VIEW"),
            }
        }
    }

    /// The location shown by default
    pub fn default_view(&self) -> Location {
        self.default_view.unwrap_or_default()
    }

    /// The cache file, falling back to the user cache directory
    pub fn cache_file(&self) -> PathBuf {
        if let Some(ref file) = self.cache_file {
            return file.clone();
        }
        project_dirs()
            .map(|dirs| dirs.cache_dir().join(CACHE_FILE))
            .unwrap_or_else(|| PathBuf::from(CACHE_FILE))
    }

    /// Render as YAML
    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        Ok(serde_yml::to_string(self)?)
    }
}

fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("", "", "sgm")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_load_from_yaml() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(
            &path,
            "pc_folders:\n  - /games\n  - /more\nsd_root: /media/sd\ndefault_view: sd\n",
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(
            config.pc_folders,
            vec![PathBuf::from("/games"), PathBuf::from("/more")]
        );
        assert_eq!(config.sd_root, Some(PathBuf::from("/media/sd")));
        assert_eq!(config.default_view(), Location::Sd);
        assert!(config.cache_file.is_none());
    }

    #[test]
    fn test_load_explicit_missing_is_error() {
        let dir = tempdir().unwrap();
        let err = Config::load(Some(&dir.path().join("nope.yaml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_load_from_malformed_is_parse_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "pc_folders: [unclosed\n").unwrap();

        let err = Config::load_from(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_merge_prefers_other() {
        let mut base = Config {
            pc_folders: vec![PathBuf::from("/a")],
            sd_root: Some(PathBuf::from("/sd")),
            default_view: None,
            cache_file: None,
        };
        base.merge(Config {
            pc_folders: Vec::new(),
            sd_root: Some(PathBuf::from("/other")),
            default_view: Some(Location::Sd),
            cache_file: None,
        });

        assert_eq!(base.pc_folders, vec![PathBuf::from("/a")]);
        assert_eq!(base.sd_root, Some(PathBuf::from("/other")));
        assert_eq!(base.default_view(), Location::Sd);
    }

    #[test]
    fn test_env_overrides() {
        let folders = std::env::join_paths(["/x", "/y"]).unwrap();
        let folders = folders.to_string_lossy().into_owned();
        let mut config = Config::default();
        config.apply_env(env(&[
            ("SGM_PC_FOLDERS", &folders),
            ("SGM_SD_ROOT", "/sd"),
            ("SGM_CACHE_FILE", "/tmp/c.json"),
            ("SGM_DEFAULT_VIEW", "sd"),
        ]));

        assert_eq!(config.pc_folders, vec![PathBuf::from("/x"), PathBuf::from("/y")]);
        assert_eq!(config.sd_root, Some(PathBuf::from("/sd")));
        assert_eq!(config.cache_file(), PathBuf::from("/tmp/c.json"));
        assert_eq!(config.default_view(), Location::Sd);
    }

    #[test]
    fn test_invalid_env_view_is_ignored() {
        let mut config = Config {
            default_view: Some(Location::Pc),
            ..Config::default()
        };
        config.apply_env(env(&[("SGM_DEFAULT_VIEW", "tape")]));
        assert_eq!(config.default_view(), Location::Pc);
    }

    #[test]
    fn test_default_cache_file_name() {
        let config = Config::default();
        assert!(config.cache_file().ends_with(CACHE_FILE));
    }

    #[test]
    fn test_to_yaml_skips_unset() {
        let config = Config {
            sd_root: Some(PathBuf::from("/sd")),
            ..Config::default()
        };
        let yaml = config.to_yaml().unwrap();
        assert!(yaml.contains("sd_root: /sd"));
        assert!(!yaml.contains("cache_file"));
    }
}
