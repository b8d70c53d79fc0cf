// Library interface for deltasync
// This allows integration tests and benchmarks to access internal modules

pub mod config;
pub mod errors;
pub mod ingest;
pub mod laps;
pub mod summary;
pub mod telemetry;

// Re-export commonly used types
pub use config::AppConfig;
pub use errors::DeltaSyncError;
pub use ingest::{IngestedLap, Ingestor, LapIdGenerator};
pub use laps::{DashboardStats, FileBasedLapStore, LapStore, format_lap_time};
pub use summary::{LapId, LapMetadata, LapSummary, compute_summary};
pub use telemetry::{Gear, ParsedTelemetry, TelemetryMetadata, TelemetrySample, parse_telemetry};
