// Storage implementation for the lap log and per-lap telemetry

use crate::errors::DeltaSyncError;
use crate::ingest::IngestedLap;
use crate::summary::{LapId, LapSummary};
use crate::telemetry::TelemetrySample;
use log::{debug, error, info, warn};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

const LAP_LOG_FILE_NAME: &str = "laps.jsonl";
const TELEMETRY_DIR_NAME: &str = "telemetry";

/// Trait defining the interface for lap persistence
pub trait LapStore {
    /// Store a freshly ingested lap. Laps are immutable, an id can only be saved once.
    fn save_lap(&mut self, lap: &IngestedLap) -> Result<(), DeltaSyncError>;

    /// All stored lap summaries in insertion order
    fn list_laps(&self) -> Result<Vec<LapSummary>, DeltaSyncError>;

    /// Load the normalized samples of a stored lap
    fn load_telemetry(&self, id: LapId) -> Result<Option<Vec<TelemetrySample>>, DeltaSyncError>;

    /// Remove a lap and its telemetry
    fn delete_lap(&mut self, id: LapId) -> Result<(), DeltaSyncError>;

    /// Check if a lap with the given id is stored
    fn lap_exists(&self, id: LapId) -> Result<bool, DeltaSyncError>;
}

/// File-based implementation of the lap store.
///
/// The lap log is a JSON lines file with one summary per line, appended as laps arrive.
/// Telemetry for each lap lives in its own JSON array file, which keeps it loadable as a
/// legacy-format upload.
pub struct FileBasedLapStore {
    storage_path: PathBuf,
    /// In-memory copy of the lap log
    laps: Vec<LapSummary>,
}

#[derive(Default)]
struct LapLog {
    laps: Vec<LapSummary>,
    /// Set when the file has unreadable lines or lacks a final newline
    needs_repair: bool,
}

impl FileBasedLapStore {
    /// Open (or create) a store rooted at `storage_path`
    pub fn new(storage_path: PathBuf) -> Result<Self, DeltaSyncError> {
        let telemetry_path = storage_path.join(TELEMETRY_DIR_NAME);
        if !telemetry_path.exists() {
            fs::create_dir_all(&telemetry_path).map_err(|e| {
                DeltaSyncError::FileOperationError {
                    operation: "create_telemetry_dir".to_string(),
                    reason: format!("Failed to create {:?}: {}", telemetry_path, e),
                }
            })?;
        }

        let mut store = Self {
            storage_path,
            laps: Vec::new(),
        };
        let lap_log = store.read_lap_log()?;
        store.laps = lap_log.laps;
        if lap_log.needs_repair {
            store.repair_lap_log()?;
        }
        debug!(
            "Opened lap store at {:?} with {} laps",
            store.storage_path,
            store.laps.len()
        );
        Ok(store)
    }

    /// Create storage in the default application data directory
    pub fn new_default() -> Result<Self, DeltaSyncError> {
        Self::new(Self::default_storage_path()?)
    }

    pub fn default_storage_path() -> Result<PathBuf, DeltaSyncError> {
        let app_data_dir = dirs::data_dir().ok_or(DeltaSyncError::NoConfigDir)?;
        Ok(app_data_dir.join("deltasync"))
    }

    pub fn storage_path(&self) -> &Path {
        &self.storage_path
    }

    /// Summary of a stored lap
    pub fn get_lap(&self, id: LapId) -> Option<&LapSummary> {
        self.laps.iter().find(|lap| lap.id == id)
    }

    /// Telemetry of a lap in the log. Unlike `load_telemetry`, a logged lap whose telemetry
    /// file is gone is an error.
    pub fn stored_telemetry(&self, id: LapId) -> Result<Vec<TelemetrySample>, DeltaSyncError> {
        if self.get_lap(id).is_none() {
            return Err(DeltaSyncError::LapNotFound { id: id.to_string() });
        }
        self.load_telemetry(id)?
            .ok_or_else(|| DeltaSyncError::MissingTelemetry { id: id.to_string() })
    }

    /// Highest id in the store, used to keep new ids from colliding with stored ones
    pub fn last_id(&self) -> Option<LapId> {
        self.laps.iter().map(|lap| lap.id).max()
    }

    fn lap_log_path(&self) -> PathBuf {
        self.storage_path.join(LAP_LOG_FILE_NAME)
    }

    fn telemetry_path(&self, id: LapId) -> PathBuf {
        self.storage_path
            .join(TELEMETRY_DIR_NAME)
            .join(format!("{}.json", id))
    }

    /// Read the lap log, skipping lines that do not parse
    fn read_lap_log(&self) -> Result<LapLog, DeltaSyncError> {
        let log_path = self.lap_log_path();
        if !log_path.exists() {
            return Ok(LapLog::default());
        }

        let content =
            fs::read_to_string(&log_path).map_err(|e| DeltaSyncError::FileOperationError {
                operation: "read_lap_log".to_string(),
                reason: format!("Failed to read {:?}: {}", log_path, e),
            })?;

        // an unterminated last line would swallow the next appended lap
        let mut lap_log = LapLog {
            needs_repair: !content.is_empty() && !content.ends_with('\n'),
            ..LapLog::default()
        };
        for (line_no, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<LapSummary>(line) {
                Ok(lap) => lap_log.laps.push(lap),
                Err(e) => {
                    warn!("Skipping unreadable lap log line {}: {}", line_no + 1, e);
                    lap_log.needs_repair = true;
                }
            }
        }
        Ok(lap_log)
    }

    /// Keep the damaged log as a backup and rewrite it from the readable laps
    fn repair_lap_log(&self) -> Result<(), DeltaSyncError> {
        let log_path = self.lap_log_path();
        let backup_path = log_path.with_extension("jsonl.bak");
        warn!(
            "Lap log {:?} is damaged, rewriting it with {} readable laps (original kept as {:?})",
            log_path,
            self.laps.len(),
            backup_path
        );
        fs::copy(&log_path, &backup_path).map_err(|e| DeltaSyncError::FileOperationError {
            operation: "backup_lap_log".to_string(),
            reason: format!("Failed to back up lap log: {}", e),
        })?;
        self.rewrite_lap_log(&self.laps)
    }

    /// Write telemetry to a temporary file and move it in place
    fn write_telemetry(
        &self,
        id: LapId,
        telemetry: &[TelemetrySample],
    ) -> Result<(), DeltaSyncError> {
        let file_path = self.telemetry_path(id);
        let temp_path = file_path.with_extension("json.tmp");

        let content = serde_json::to_string(telemetry).map_err(|e| {
            DeltaSyncError::LapStoreError {
                reason: format!("Failed to serialize telemetry: {}", e),
            }
        })?;

        {
            let mut temp_file =
                fs::File::create(&temp_path).map_err(|e| DeltaSyncError::FileOperationError {
                    operation: "create_temp_file".to_string(),
                    reason: format!("Failed to create temporary file: {}", e),
                })?;

            temp_file.write_all(content.as_bytes()).map_err(|e| {
                DeltaSyncError::FileOperationError {
                    operation: "write_temp_file".to_string(),
                    reason: format!("Failed to write to temporary file: {}", e),
                }
            })?;

            temp_file
                .sync_all()
                .map_err(|e| DeltaSyncError::FileOperationError {
                    operation: "sync_temp_file".to_string(),
                    reason: format!("Failed to sync temporary file: {}", e),
                })?;
        }

        fs::rename(&temp_path, &file_path).map_err(|e| {
            let _ = fs::remove_file(&temp_path);
            DeltaSyncError::FileOperationError {
                operation: "atomic_move".to_string(),
                reason: format!("Failed to move temporary file to final location: {}", e),
            }
        })
    }

    /// Rewrite the whole lap log from the in-memory copy
    fn rewrite_lap_log(&self, laps: &[LapSummary]) -> Result<(), DeltaSyncError> {
        let log_path = self.lap_log_path();
        let temp_path = log_path.with_extension("jsonl.tmp");

        serde_jsonlines::write_json_lines(&temp_path, laps).map_err(|e| {
            DeltaSyncError::FileOperationError {
                operation: "rewrite_lap_log".to_string(),
                reason: format!("Failed to write lap log: {}", e),
            }
        })?;
        fs::rename(&temp_path, &log_path).map_err(|e| {
            let _ = fs::remove_file(&temp_path);
            DeltaSyncError::FileOperationError {
                operation: "atomic_move".to_string(),
                reason: format!("Failed to replace lap log: {}", e),
            }
        })
    }
}

impl LapStore for FileBasedLapStore {
    fn save_lap(&mut self, lap: &IngestedLap) -> Result<(), DeltaSyncError> {
        let id = lap.summary.id;
        info!(
            "Saving lap {} ({} / {})",
            id, lap.summary.track_name, lap.summary.car_model
        );

        if self.get_lap(id).is_some() {
            return Err(DeltaSyncError::LapStoreError {
                reason: format!("A lap with id {} is already stored", id),
            });
        }

        // telemetry first, the log must never reference a missing file
        self.write_telemetry(id, &lap.telemetry)?;

        if let Err(e) = serde_jsonlines::append_json_lines(self.lap_log_path(), [&lap.summary]) {
            error!("Failed to append lap {} to the lap log: {}", id, e);
            if let Err(cleanup_error) = fs::remove_file(self.telemetry_path(id)) {
                warn!("Failed to remove orphaned telemetry: {}", cleanup_error);
            }
            return Err(DeltaSyncError::FileOperationError {
                operation: "append_lap_log".to_string(),
                reason: format!("Failed to append to lap log: {}", e),
            });
        }

        self.laps.push(lap.summary.clone());
        Ok(())
    }

    fn list_laps(&self) -> Result<Vec<LapSummary>, DeltaSyncError> {
        Ok(self.laps.clone())
    }

    fn load_telemetry(&self, id: LapId) -> Result<Option<Vec<TelemetrySample>>, DeltaSyncError> {
        let file_path = self.telemetry_path(id);
        if !file_path.exists() {
            debug!("No telemetry stored for lap {}", id);
            return Ok(None);
        }

        let content =
            fs::read_to_string(&file_path).map_err(|e| DeltaSyncError::FileOperationError {
                operation: "read_telemetry".to_string(),
                reason: format!("Failed to read telemetry for lap {}: {}", id, e),
            })?;
        let telemetry = serde_json::from_str(&content).map_err(|e| {
            DeltaSyncError::LapStoreError {
                reason: format!("Failed to parse telemetry for lap {}: {}", id, e),
            }
        })?;
        Ok(Some(telemetry))
    }

    fn delete_lap(&mut self, id: LapId) -> Result<(), DeltaSyncError> {
        if self.get_lap(id).is_none() {
            return Err(DeltaSyncError::LapNotFound { id: id.to_string() });
        }

        let remaining: Vec<LapSummary> = self
            .laps
            .iter()
            .filter(|lap| lap.id != id)
            .cloned()
            .collect();
        self.rewrite_lap_log(&remaining)?;
        self.laps = remaining;

        // the lap is deleted once the log is rewritten
        let file_path = self.telemetry_path(id);
        if file_path.exists() {
            if let Err(e) = fs::remove_file(&file_path) {
                warn!("Failed to remove telemetry file {:?}: {}", file_path, e);
            }
        }
        info!("Deleted lap {}", id);
        Ok(())
    }

    fn lap_exists(&self, id: LapId) -> Result<bool, DeltaSyncError> {
        Ok(self.get_lap(id).is_some())
    }
}
