// Lap log management
// Persists ingested laps and computes the aggregates shown on the dashboard

pub mod dashboard;
pub mod storage;

// Re-export commonly used types
pub use dashboard::{DashboardStats, format_lap_time};
pub use storage::{FileBasedLapStore, LapStore};
