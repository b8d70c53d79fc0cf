use log::debug;
use serde_json::Value;

use super::{ParsedTelemetry, TelemetryMetadata, TelemetrySample, pedals::normalize_pedals};
use crate::DeltaSyncError;

/// Parses the raw content of an uploaded telemetry file.
///
/// Shapes are checked in a fixed order: an object carrying a `telemetry` array is the
/// metadata envelope, a bare array is the legacy format, anything else is rejected. Every
/// array element becomes a sample, in file order, even when it has no usable speed.
/// Numbers beyond the `f64` range cannot be represented and fail as malformed JSON.
pub fn parse_telemetry(content: &str) -> Result<ParsedTelemetry, DeltaSyncError> {
    let value: Value =
        serde_json::from_str(content).map_err(|e| DeltaSyncError::MalformedJson { source: e })?;

    let parsed = match value {
        Value::Object(mut root) => {
            let Some(Value::Array(items)) = root.remove("telemetry") else {
                return Err(DeltaSyncError::UnrecognizedSchema {
                    found: "an object without a telemetry array".to_string(),
                });
            };
            let metadata = root
                .get("metadata")
                .map(TelemetryMetadata::from_value)
                .unwrap_or_default();
            ParsedTelemetry::MetadataWrapped {
                metadata,
                samples: to_samples(&items),
            }
        }
        Value::Array(items) => ParsedTelemetry::Legacy {
            samples: to_samples(&items),
        },
        other => {
            return Err(DeltaSyncError::UnrecognizedSchema {
                found: json_type_name(&other).to_string(),
            });
        }
    };

    debug!(
        "Parsed {} telemetry file with {} samples",
        parsed.shape_name(),
        parsed.samples().len()
    );
    Ok(parsed)
}

fn to_samples(items: &[Value]) -> Vec<TelemetrySample> {
    let mut samples: Vec<TelemetrySample> = items.iter().map(TelemetrySample::from_value).collect();
    normalize_pedals(&mut samples);
    samples
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::Gear;
    use proptest::prelude::*;

    #[test]
    fn test_legacy_array() {
        let parsed = parse_telemetry(
            r#"[{"speed":120.4,"throttle":0.8,"brake":0.0,"gear":3},{"speed":98.1,"throttle":0.0,"brake":0.6,"gear":2}]"#,
        )
        .unwrap();
        assert_eq!(parsed.shape_name(), "legacy");
        assert!(parsed.metadata().is_none());
        let samples = parsed.samples();
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0].speed, Some(120.4));
        assert_eq!(samples[0].gear, Some(Gear::Forward(3)));
        assert_eq!(samples[1].brake, Some(0.6));
    }

    #[test]
    fn test_metadata_envelope() {
        let parsed = parse_telemetry(
            r#"{
                "metadata": {
                    "track_name": "Spa-Francorchamps",
                    "car_name": "Ferrari 488 GT3",
                    "best_lap_time_ms": 125456,
                    "samples_logged": 2,
                    "last_save_timestamp": "2024-01-01T12:00:00Z"
                },
                "telemetry": [
                    {"speed": 120.4, "gear": "3", "throttle": 0.8, "brake": 0.0},
                    {"speed": 12.0, "gear": "R", "throttle": 0.1, "brake": 0.0}
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(parsed.shape_name(), "metadata");
        let metadata = parsed.metadata().unwrap();
        assert_eq!(metadata.track_name.as_deref(), Some("Spa-Francorchamps"));
        assert_eq!(metadata.car_name.as_deref(), Some("Ferrari 488 GT3"));
        assert_eq!(metadata.best_lap_time_ms, Some(125456.));
        assert_eq!(metadata.samples_logged, Some(2));
        assert_eq!(parsed.samples()[1].gear, Some(Gear::Reverse));
    }

    #[test]
    fn test_metadata_envelope_without_metadata() {
        let parsed = parse_telemetry(r#"{"telemetry":[{"speed":50}]}"#).unwrap();
        assert_eq!(parsed.metadata(), Some(&TelemetryMetadata::default()));
        assert_eq!(parsed.samples().len(), 1);
    }

    #[test]
    fn test_non_object_metadata_treated_as_empty() {
        let parsed = parse_telemetry(r#"{"metadata":"oops","telemetry":[]}"#).unwrap();
        assert_eq!(parsed.metadata(), Some(&TelemetryMetadata::default()));
        assert!(parsed.samples().is_empty());
    }

    #[test]
    fn test_telemetry_field_wins_over_array_check() {
        // logger files initialize as {"metadata": {}, "telemetry": []}
        let parsed = parse_telemetry(r#"{"metadata":{},"telemetry":[]}"#).unwrap();
        assert_eq!(parsed.shape_name(), "metadata");
    }

    #[test]
    fn test_object_without_telemetry_rejected() {
        match parse_telemetry(r#"{"foo":"bar"}"#) {
            Err(DeltaSyncError::UnrecognizedSchema { found }) => {
                assert!(found.contains("without a telemetry array"));
            }
            other => panic!("Expected UnrecognizedSchema, got {:?}", other),
        }
    }

    #[test]
    fn test_telemetry_not_an_array_rejected() {
        let result = parse_telemetry(r#"{"telemetry":{"speed":100}}"#);
        assert!(matches!(
            result,
            Err(DeltaSyncError::UnrecognizedSchema { .. })
        ));
    }

    #[test]
    fn test_scalar_rejected() {
        match parse_telemetry(r#""just a string""#) {
            Err(DeltaSyncError::UnrecognizedSchema { found }) => assert_eq!(found, "a string"),
            other => panic!("Expected UnrecognizedSchema, got {:?}", other),
        }
    }

    #[test]
    fn test_malformed_json_rejected() {
        assert!(matches!(
            parse_telemetry("not json{"),
            Err(DeltaSyncError::MalformedJson { .. })
        ));
        assert!(matches!(
            parse_telemetry(""),
            Err(DeltaSyncError::MalformedJson { .. })
        ));
    }

    #[test]
    fn test_out_of_range_number_rejected() {
        let err = parse_telemetry(r#"[{"speed":1e400}]"#).unwrap_err();
        assert!(matches!(err, DeltaSyncError::MalformedJson { .. }));
        assert!(err.to_string().contains("number out of range"));
    }

    #[test]
    fn test_samples_without_speed_are_kept() {
        let parsed = parse_telemetry(r#"[{"speed":100},{"throttle":0.3},{},7]"#).unwrap();
        let samples = parsed.samples();
        assert_eq!(samples.len(), 4);
        assert_eq!(samples[0].speed, Some(100.));
        assert_eq!(samples[1].speed, None);
        assert_eq!(samples[3], TelemetrySample::default());
    }

    #[test]
    fn test_percent_pedals_normalized() {
        let parsed = parse_telemetry(r#"[{"speed":100,"throttle":80,"brake":0},{"speed":90,"throttle":0,"brake":50}]"#)
            .unwrap();
        assert_eq!(parsed.samples()[0].throttle, Some(0.8));
        assert_eq!(parsed.samples()[1].brake, Some(0.5));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn prop_legacy_preserves_count_and_order(
            whole_speeds in prop::collection::vec(0u32..400, 0..200),
        ) {
            let speeds: Vec<f64> = whole_speeds.into_iter().map(f64::from).collect();
            let content = serde_json::to_string(
                &speeds.iter().map(|s| serde_json::json!({ "speed": s })).collect::<Vec<_>>(),
            ).unwrap();

            let parsed = parse_telemetry(&content).unwrap();

            // Property: same number of samples, same order, speeds unchanged
            let parsed_speeds: Vec<f64> = parsed.samples().iter().filter_map(|s| s.speed).collect();
            prop_assert_eq!(parsed.samples().len(), speeds.len());
            prop_assert_eq!(parsed_speeds, speeds);
        }

        #[test]
        fn prop_wrapped_preserves_count(
            whole_speeds in prop::collection::vec(prop::option::of(0u32..400), 0..100),
        ) {
            let speeds: Vec<Option<f64>> =
                whole_speeds.into_iter().map(|s| s.map(f64::from)).collect();
            let telemetry: Vec<serde_json::Value> = speeds
                .iter()
                .map(|s| match s {
                    Some(speed) => serde_json::json!({ "speed": speed }),
                    None => serde_json::json!({ "gear": "N" }),
                })
                .collect();
            let content = serde_json::json!({ "telemetry": telemetry }).to_string();

            let parsed = parse_telemetry(&content).unwrap();

            let parsed_speeds: Vec<Option<f64>> = parsed.samples().iter().map(|s| s.speed).collect();
            prop_assert_eq!(parsed_speeds, speeds);
        }
    }
}
