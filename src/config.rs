use std::path::{Path, PathBuf};

use log::warn;
use serde::{Deserialize, Serialize};

use crate::DeltaSyncError;
use crate::laps::FileBasedLapStore;

const CONFIG_FILE_NAME: &str = "config.json";
pub const MAX_DISPLAY_ROWS: usize = 100;
pub const RECENT_LAPS: usize = 5;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    /// Where the lap store lives, defaults to the user data directory
    pub data_dir: Option<PathBuf>,
    /// Maximum number of telemetry rows printed for a lap
    pub max_display_rows: usize,
    /// Number of laps listed as recent on the dashboard
    pub recent_laps: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            max_display_rows: MAX_DISPLAY_ROWS,
            recent_laps: RECENT_LAPS,
        }
    }
}

impl AppConfig {
    pub fn config_path() -> Result<PathBuf, DeltaSyncError> {
        Ok(dirs::config_dir()
            .ok_or(DeltaSyncError::NoConfigDir)?
            .join("deltasync")
            .join(CONFIG_FILE_NAME))
    }

    pub fn from_local_file() -> Result<Option<Self>, DeltaSyncError> {
        Self::from_path(&Self::config_path()?)
    }

    pub fn from_path(config_path: &Path) -> Result<Option<Self>, DeltaSyncError> {
        if !config_path.exists() {
            return Ok(None);
        }
        let file = std::fs::File::open(config_path)
            .map_err(|e| DeltaSyncError::ConfigIOError { source: e })?;
        serde_json::from_reader(file)
            .map(Some)
            .map_err(|e| DeltaSyncError::ConfigSerializeError { source: e })
    }

    /// Local config if there is a readable one, defaults otherwise
    pub fn load_or_default() -> Self {
        match Self::from_local_file() {
            Ok(Some(config)) => config,
            Ok(None) => Self::default(),
            Err(e) => {
                warn!("Ignoring unreadable config file: {}", e);
                Self::default()
            }
        }
    }

    pub fn save(&self) -> Result<(), DeltaSyncError> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, config_path: &Path) -> Result<(), DeltaSyncError> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| DeltaSyncError::ConfigIOError { source: e })?;
        }

        let file = std::fs::File::create(config_path)
            .map_err(|e| DeltaSyncError::ConfigIOError { source: e })?;
        serde_json::to_writer_pretty(file, self)
            .map_err(|e| DeltaSyncError::ConfigSerializeError { source: e })
    }

    pub fn open_lap_store(&self) -> Result<FileBasedLapStore, DeltaSyncError> {
        match &self.data_dir {
            Some(data_dir) => FileBasedLapStore::new(data_dir.clone()),
            None => FileBasedLapStore::new_default(),
        }
    }
}
