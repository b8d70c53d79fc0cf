// Lap summaries derived from parsed telemetry

use std::fmt;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::DeltaSyncError;
use crate::telemetry::{ParsedTelemetry, TelemetryMetadata, TelemetrySample};

pub const UNKNOWN_TRACK: &str = "Unknown Track";
pub const UNKNOWN_CAR: &str = "Unknown Car";

/// Identifier of an ingested lap, unique within a running session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LapId(pub u64);

impl fmt::Display for LapId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Metadata with every default applied, so nothing downstream needs fallbacks.
#[derive(Clone, Debug, PartialEq)]
pub struct LapMetadata {
    pub track_name: String,
    pub car_model: String,
    /// Best lap time in milliseconds, 0 when unknown
    pub lap_time_ms: u64,
    pub samples_logged: Option<u64>,
    pub last_save_timestamp: Option<String>,
}

impl Default for LapMetadata {
    fn default() -> Self {
        Self {
            track_name: UNKNOWN_TRACK.to_string(),
            car_model: UNKNOWN_CAR.to_string(),
            lap_time_ms: 0,
            samples_logged: None,
            last_save_timestamp: None,
        }
    }
}

impl LapMetadata {
    pub fn resolve(raw: Option<&TelemetryMetadata>) -> Self {
        let Some(raw) = raw else {
            return Self::default();
        };
        let non_empty = |value: &Option<String>, default: &str| {
            value
                .as_deref()
                .filter(|v| !v.trim().is_empty())
                .unwrap_or(default)
                .to_string()
        };
        Self {
            track_name: non_empty(&raw.track_name, UNKNOWN_TRACK),
            car_model: non_empty(&raw.car_name, UNKNOWN_CAR),
            lap_time_ms: raw
                .best_lap_time_ms
                .filter(|ms| ms.is_finite() && *ms > 0.)
                .map(|ms| ms.round() as u64)
                .unwrap_or(0),
            samples_logged: raw.samples_logged,
            last_save_timestamp: raw
                .last_save_timestamp
                .clone()
                .filter(|ts| !ts.trim().is_empty()),
        }
    }
}

/// Aggregates over the samples carrying a numeric speed.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SpeedStats {
    /// km/h
    pub top_speed: f64,
    /// km/h
    pub average_speed: f64,
    pub samples_with_speed: usize,
}

impl SpeedStats {
    /// An empty sequence yields zeroes. A non-empty sequence where no sample has a speed
    /// has no meaningful top speed and fails with `NoSpeedData`.
    pub fn from_samples(samples: &[TelemetrySample]) -> Result<Self, DeltaSyncError> {
        let (top_speed, total, count) = samples.iter().filter_map(|s| s.speed).fold(
            (f64::NEG_INFINITY, 0., 0usize),
            |(top, total, count), speed| (top.max(speed), total + speed, count + 1),
        );

        if count == 0 {
            if samples.is_empty() {
                return Ok(Self {
                    top_speed: 0.,
                    average_speed: 0.,
                    samples_with_speed: 0,
                });
            }
            return Err(DeltaSyncError::NoSpeedData {
                samples: samples.len(),
            });
        }

        Ok(Self {
            top_speed,
            average_speed: total / count as f64,
            samples_with_speed: count,
        })
    }
}

/// Average pedal use over the samples carrying each value, 0 when none do.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PedalStats {
    pub average_throttle: f64,
    pub average_brake: f64,
}

impl PedalStats {
    pub fn from_samples(samples: &[TelemetrySample]) -> Self {
        let mean = |values: Vec<f64>| {
            if values.is_empty() {
                0.
            } else {
                values.iter().sum::<f64>() / values.len() as f64
            }
        };
        Self {
            average_throttle: mean(samples.iter().filter_map(|s| s.throttle).collect()),
            average_brake: mean(samples.iter().filter_map(|s| s.brake).collect()),
        }
    }
}

/// Summary of an uploaded lap, in the shape the dashboard reads.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LapSummary {
    pub id: LapId,
    pub track_name: String,
    pub car_model: String,
    /// Milliseconds, 0 when the file did not report a best lap
    pub lap_time: u64,
    pub date_recorded: SystemTime,
    /// Milliseconds per sector. Always empty for file uploads, sectors are not detected.
    pub sector_times: Vec<u64>,
    /// km/h
    pub top_speed: f64,
    /// km/h
    pub average_speed: f64,
    #[serde(default)]
    pub average_throttle: f64,
    #[serde(default)]
    pub average_brake: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub samples_logged: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_save_timestamp: Option<String>,
}

pub fn compute_summary(
    parsed: &ParsedTelemetry,
    id: LapId,
    date_recorded: SystemTime,
) -> Result<LapSummary, DeltaSyncError> {
    let speed = SpeedStats::from_samples(parsed.samples())?;
    let pedals = PedalStats::from_samples(parsed.samples());
    let metadata = LapMetadata::resolve(parsed.metadata());

    Ok(LapSummary {
        id,
        track_name: metadata.track_name,
        car_model: metadata.car_model,
        lap_time: metadata.lap_time_ms,
        date_recorded,
        sector_times: Vec::new(),
        top_speed: speed.top_speed,
        average_speed: speed.average_speed,
        average_throttle: pedals.average_throttle,
        average_brake: pedals.average_brake,
        samples_logged: metadata.samples_logged,
        last_save_timestamp: metadata.last_save_timestamp,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::parse_telemetry;
    use proptest::prelude::*;

    fn summarize(content: &str) -> Result<LapSummary, DeltaSyncError> {
        let parsed = parse_telemetry(content)?;
        compute_summary(&parsed, LapId(1), SystemTime::UNIX_EPOCH)
    }

    fn speed(speed: f64) -> TelemetrySample {
        TelemetrySample {
            speed: Some(speed),
            ..TelemetrySample::default()
        }
    }

    #[test]
    fn test_legacy_speed_stats() {
        let summary = summarize(r#"[{"speed":100},{"speed":150},{"speed":120}]"#).unwrap();
        assert_eq!(summary.top_speed, 150.);
        assert!((summary.average_speed - 123.333_333).abs() < 1e-5);
        assert_eq!(summary.track_name, UNKNOWN_TRACK);
        assert_eq!(summary.car_model, UNKNOWN_CAR);
        assert_eq!(summary.lap_time, 0);
        assert!(summary.sector_times.is_empty());
    }

    #[test]
    fn test_metadata_propagates() {
        let summary = summarize(
            r#"{"metadata":{"track_name":"Monza","best_lap_time_ms":98750},"telemetry":[{"speed":200}]}"#,
        )
        .unwrap();
        assert_eq!(summary.track_name, "Monza");
        assert_eq!(summary.car_model, UNKNOWN_CAR);
        assert_eq!(summary.lap_time, 98750);
        assert_eq!(summary.top_speed, 200.);
        assert_eq!(summary.average_speed, 200.);
    }

    #[test]
    fn test_empty_sequence_yields_zeroes() {
        for content in ["[]", r#"{"metadata":{},"telemetry":[]}"#] {
            let summary = summarize(content).unwrap();
            assert_eq!(summary.top_speed, 0.);
            assert_eq!(summary.average_speed, 0.);
            assert!(!summary.average_speed.is_nan());
        }
    }

    #[test]
    fn test_no_speed_data() {
        match summarize(r#"[{"throttle":0.5},{"gear":"N"}]"#) {
            Err(DeltaSyncError::NoSpeedData { samples }) => assert_eq!(samples, 2),
            other => panic!("Expected NoSpeedData, got {:?}", other),
        }
    }

    #[test]
    fn test_samples_missing_speed_are_skipped() {
        let summary = summarize(r#"[{"speed":80},{"throttle":1.0},{"speed":"n/a"},{"speed":120}]"#)
            .unwrap();
        assert_eq!(summary.top_speed, 120.);
        assert_eq!(summary.average_speed, 100.);
    }

    #[test]
    fn test_metadata_defaults_per_field() {
        let raw = TelemetryMetadata {
            track_name: Some("  ".to_string()),
            car_name: Some("Porsche 911 GT3 R".to_string()),
            best_lap_time_ms: Some(-1.),
            samples_logged: Some(12),
            last_save_timestamp: Some(String::new()),
        };
        let metadata = LapMetadata::resolve(Some(&raw));
        assert_eq!(metadata.track_name, UNKNOWN_TRACK);
        assert_eq!(metadata.car_model, "Porsche 911 GT3 R");
        assert_eq!(metadata.lap_time_ms, 0);
        assert_eq!(metadata.samples_logged, Some(12));
        assert_eq!(metadata.last_save_timestamp, None);

        assert_eq!(LapMetadata::resolve(None), LapMetadata::default());
    }

    #[test]
    fn test_null_best_lap_is_zero() {
        let summary = summarize(
            r#"{"metadata":{"car_name":"ks_mazda_mx5_cup","best_lap_time_ms":null},"telemetry":[{"speed":90}]}"#,
        )
        .unwrap();
        assert_eq!(summary.lap_time, 0);
        assert_eq!(summary.car_model, "ks_mazda_mx5_cup");
    }

    #[test]
    fn test_pedal_averages() {
        let summary = summarize(
            r#"[{"speed":100,"throttle":1.0,"brake":0.0},{"speed":60,"throttle":0.0,"brake":0.5},{"speed":80}]"#,
        )
        .unwrap();
        assert_eq!(summary.average_throttle, 0.5);
        assert_eq!(summary.average_brake, 0.25);

        assert_eq!(PedalStats::from_samples(&[]), PedalStats::default());
    }

    #[test]
    fn test_summary_serializes_camel_case() {
        let summary = summarize(r#"{"metadata":{"track_name":"Spa"},"telemetry":[{"speed":10}]}"#)
            .unwrap();
        let value = serde_json::to_value(&summary).unwrap();
        assert_eq!(value["id"], 1);
        assert_eq!(value["trackName"], "Spa");
        assert_eq!(value["carModel"], UNKNOWN_CAR);
        assert_eq!(value["lapTime"], 0);
        assert_eq!(value["topSpeed"], 10.);
        assert!(value["sectorTimes"].as_array().unwrap().is_empty());
        assert!(value.get("samplesLogged").is_none());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn prop_top_speed_ignores_samples_without_speed(
            speeds in prop::collection::vec(prop::option::of(0.0f64..400.0), 1..100),
        ) {
            let samples: Vec<TelemetrySample> = speeds
                .iter()
                .map(|s| TelemetrySample { speed: *s, ..TelemetrySample::default() })
                .collect();
            let present: Vec<f64> = speeds.iter().flatten().copied().collect();

            let result = SpeedStats::from_samples(&samples);

            // Property: the top speed is the max over samples that carry a speed, and the
            // average is bounded by it; without any speed the computation fails
            if present.is_empty() {
                let is_no_speed = matches!(result, Err(DeltaSyncError::NoSpeedData { .. }));
                prop_assert!(is_no_speed);
            } else {
                let stats = result.unwrap();
                let expected_top = present.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                prop_assert_eq!(stats.top_speed, expected_top);
                prop_assert_eq!(stats.samples_with_speed, present.len());
                prop_assert!(stats.average_speed <= stats.top_speed + 1e-9);
                prop_assert!(stats.average_speed.is_finite());
            }
        }

        #[test]
        fn prop_names_propagate_verbatim(
            track in "[A-Za-z][A-Za-z0-9 -]{0,30}",
            car in "[A-Za-z][A-Za-z0-9 _]{0,30}",
        ) {
            let raw = TelemetryMetadata {
                track_name: Some(track.clone()),
                car_name: Some(car.clone()),
                ..TelemetryMetadata::default()
            };
            let parsed = ParsedTelemetry::MetadataWrapped {
                metadata: raw,
                samples: vec![speed(100.)],
            };

            let summary = compute_summary(&parsed, LapId(7), SystemTime::UNIX_EPOCH).unwrap();

            prop_assert_eq!(summary.track_name, track);
            prop_assert_eq!(summary.car_model, car);
        }
    }
}
