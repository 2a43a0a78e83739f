//! Planner configuration loaded from a JSON file.

use crate::planner::DEFAULT_AUTOSAVE_INTERVAL_SECS;
use crate::room::Room;
use crate::storage::{FileStore, StorageResult};
use crate::validate::OverlapReporting;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {message}")]
    Read { path: PathBuf, message: String },
    #[error("Failed to parse config {path}: {message}")]
    Parse { path: PathBuf, message: String },
}

/// Settings shared by all planner sessions.
///
/// Every field has a default, so a partial file (or none at all) is valid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    /// Where room files live. Defaults to the platform data directory.
    pub data_dir: Option<PathBuf>,
    /// Template for newly created rooms.
    pub default_room: Room,
    pub overlap_reporting: OverlapReporting,
    /// Seconds between auto-saves; 0 disables auto-save.
    pub autosave_interval_secs: u64,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            default_room: Room::default(),
            overlap_reporting: OverlapReporting::default(),
            autosave_interval_secs: DEFAULT_AUTOSAVE_INTERVAL_SECS,
        }
    }
}

impl PlannerConfig {
    /// Load a config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        serde_json::from_str(&json).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Load a config file if it exists, otherwise use the defaults.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::load(path)
        } else {
            log::debug!("No config at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// The configured data directory, or the platform default.
    pub fn resolved_data_dir(&self) -> StorageResult<PathBuf> {
        match &self.data_dir {
            Some(dir) => Ok(dir.clone()),
            None => FileStore::default_path(),
        }
    }

    pub fn autosave_interval(&self) -> Option<Duration> {
        (self.autosave_interval_secs > 0).then(|| Duration::from_secs(self.autosave_interval_secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("roomplan.json");
        std::fs::write(
            &path,
            r#"{ "overlap_reporting": "all_conflicts", "default_room": { "id": 0, "name": "Studio", "width": 300, "height": 250 } }"#,
        )
        .unwrap();

        let config = PlannerConfig::load(&path).unwrap();
        assert_eq!(config.overlap_reporting, OverlapReporting::AllConflicts);
        assert_eq!(config.default_room.name, "Studio");
        assert_eq!(config.default_room.grid_size, 10);
        assert!(config.default_room.prevent_overlap);
        assert_eq!(config.autosave_interval(), Some(Duration::from_secs(30)));
        assert!(config.data_dir.is_none());
    }

    #[test]
    fn test_missing_file_falls_back() {
        let dir = tempdir().unwrap();
        let config = PlannerConfig::load_or_default(&dir.path().join("absent.json")).unwrap();
        assert_eq!(config, PlannerConfig::default());
        assert!(matches!(
            PlannerConfig::load(&dir.path().join("absent.json")),
            Err(ConfigError::Read { .. })
        ));
    }

    #[test]
    fn test_bad_json_is_reported() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(PlannerConfig::load(&path), Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_data_dir_and_autosave_overrides() {
        let config = PlannerConfig {
            data_dir: Some(PathBuf::from("/tmp/plans")),
            autosave_interval_secs: 0,
            ..PlannerConfig::default()
        };
        assert_eq!(config.resolved_data_dir().unwrap(), PathBuf::from("/tmp/plans"));
        assert_eq!(config.autosave_interval(), None);
    }
}
