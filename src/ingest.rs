// Upload ingestion: parse, summarize and stamp a telemetry file

use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use log::{info, warn};

use crate::DeltaSyncError;
use crate::summary::{LapId, LapSummary, compute_summary};
use crate::telemetry::{
    TelemetrySample, parse_telemetry, read_telemetry_file, read_telemetry_file_async,
};

/// Issues lap ids from the wall clock in microseconds. Ids are strictly increasing, so two
/// uploads in the same microsecond, or a clock stepping backwards, never collide.
#[derive(Debug, Default)]
pub struct LapIdGenerator {
    last_issued: u64,
}

impl LapIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Continue after ids issued by an earlier session, e.g. the newest stored lap.
    pub fn starting_after(last_issued: LapId) -> Self {
        Self {
            last_issued: last_issued.0,
        }
    }

    pub fn next_id(&mut self) -> Result<LapId, DeltaSyncError> {
        self.next_id_at(SystemTime::now())
    }

    fn next_id_at(&mut self, now: SystemTime) -> Result<LapId, DeltaSyncError> {
        let micros = now
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_micros() as u64)
            .unwrap_or(0);
        let following = self
            .last_issued
            .checked_add(1)
            .ok_or(DeltaSyncError::LapIdsExhausted {
                last_issued: self.last_issued,
            })?;
        let id = micros.max(following);
        self.last_issued = id;
        Ok(LapId(id))
    }
}

/// A lap summary together with the normalized samples it was derived from. Both are
/// created together and never modified afterwards.
#[derive(Clone, Debug, PartialEq)]
pub struct IngestedLap {
    pub summary: LapSummary,
    pub telemetry: Vec<TelemetrySample>,
}

#[derive(Debug, Default)]
pub struct Ingestor {
    ids: LapIdGenerator,
}

impl Ingestor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ids(ids: LapIdGenerator) -> Self {
        Self { ids }
    }

    /// Ingests the raw content of one uploaded file. A failed upload produces no partial
    /// summary.
    pub fn ingest(&mut self, content: &str) -> Result<IngestedLap, DeltaSyncError> {
        let parsed = parse_telemetry(content).inspect_err(|e| warn!("Rejected upload: {}", e))?;
        let date_recorded = SystemTime::now();
        let id = self.ids.next_id_at(date_recorded)?;
        let summary = compute_summary(&parsed, id, date_recorded)
            .inspect_err(|e| warn!("Rejected upload: {}", e))?;

        info!(
            "Ingested lap {} ({} / {}): {} format, {} samples, top speed {:.1} km/h",
            summary.id,
            summary.track_name,
            summary.car_model,
            parsed.shape_name(),
            parsed.samples().len(),
            summary.top_speed
        );
        Ok(IngestedLap {
            summary,
            telemetry: parsed.into_samples(),
        })
    }

    pub fn ingest_file(&mut self, source_file: &Path) -> Result<IngestedLap, DeltaSyncError> {
        let content = read_telemetry_file(source_file)?;
        self.ingest(&content)
    }

    pub async fn ingest_file_async(
        &mut self,
        source_file: &Path,
    ) -> Result<IngestedLap, DeltaSyncError> {
        let content = read_telemetry_file_async(source_file).await?;
        self.ingest(&content)
    }
}
