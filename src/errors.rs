// Error types for deltasync

use snafu::Snafu;
use std::io;

#[derive(Debug, Snafu)]
pub enum DeltaSyncError {
    // Errors while parsing an uploaded telemetry file
    #[snafu(display("Telemetry file is not valid JSON: {source}"))]
    MalformedJson { source: serde_json::Error },
    #[snafu(display(
        "Unrecognized telemetry schema: expected an array of samples or an object with a telemetry array, found {found}"
    ))]
    UnrecognizedSchema { found: String },
    #[snafu(display("None of the {samples} telemetry samples carries a numeric speed"))]
    NoSpeedData { samples: usize },

    // Errors while reading telemetry files from disk
    #[snafu(display("Invalid telemetry file: {path}"))]
    InvalidTelemetryFile { path: String },
    #[snafu(display("Error loading telemetry file"))]
    TelemetryLoaderError { source: io::Error },

    // Lap store errors
    #[snafu(display("Lap store error: {reason}"))]
    LapStoreError { reason: String },
    #[snafu(display("No lap stored with id {id}"))]
    LapNotFound { id: String },
    #[snafu(display("Telemetry for lap {id} is missing from the lap store"))]
    MissingTelemetry { id: String },
    #[snafu(display("No lap ids left after {last_issued}"))]
    LapIdsExhausted { last_issued: u64 },
    #[snafu(display("File operation failed: {operation} - {reason}"))]
    FileOperationError { operation: String, reason: String },

    // Config management errors
    #[snafu(display("Could not find application directory for deltasync files"))]
    NoConfigDir,
    #[snafu(display("Error reading or writing config file"))]
    ConfigIOError { source: io::Error },
    #[snafu(display("Error serializing config file"))]
    ConfigSerializeError { source: serde_json::Error },
}

impl DeltaSyncError {
    /// Whether the error comes from the contents of an uploaded file, as opposed to the
    /// environment (disk, config). Upload errors need a corrected file from the user.
    pub fn is_upload_error(&self) -> bool {
        matches!(
            self,
            Self::MalformedJson { .. } | Self::UnrecognizedSchema { .. } | Self::NoSpeedData { .. }
        )
    }
}
