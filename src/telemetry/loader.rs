use std::path::Path;

use crate::DeltaSyncError;

pub fn read_telemetry_file(source_file: &Path) -> Result<String, DeltaSyncError> {
    if !source_file.is_file() {
        return Err(DeltaSyncError::InvalidTelemetryFile {
            path: format!("{:?}", source_file),
        });
    }
    std::fs::read_to_string(source_file)
        .map_err(|e| DeltaSyncError::TelemetryLoaderError { source: e })
}

/// Reads the whole file without blocking the calling task. Parsing still happens on the
/// caller once the content is loaded.
pub async fn read_telemetry_file_async(source_file: &Path) -> Result<String, DeltaSyncError> {
    let is_file = tokio::fs::metadata(source_file)
        .await
        .map(|m| m.is_file())
        .unwrap_or(false);
    if !is_file {
        return Err(DeltaSyncError::InvalidTelemetryFile {
            path: format!("{:?}", source_file),
        });
    }
    tokio::fs::read_to_string(source_file)
        .await
        .map_err(|e| DeltaSyncError::TelemetryLoaderError { source: e })
}
