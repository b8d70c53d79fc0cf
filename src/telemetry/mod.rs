pub mod loader;
pub mod parser;
pub(crate) mod pedals;

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use loader::{read_telemetry_file, read_telemetry_file_async};
pub use parser::parse_telemetry;
pub use pedals::PedalScale;

/// Gear as reported by the in-game logger. The logger writes "R", "N" or the gear number
/// as text, older files carry a plain integer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Value", into = "String")]
pub enum Gear {
    Reverse,
    Neutral,
    Forward(u8),
}

impl Gear {
    /// 0 is neutral, negative numbers are reverse.
    pub fn from_number(number: i64) -> Option<Self> {
        match number {
            0 => Some(Self::Neutral),
            n if n < 0 => Some(Self::Reverse),
            n => u8::try_from(n).ok().map(Self::Forward),
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim() {
            "R" | "r" => Some(Self::Reverse),
            "N" | "n" => Some(Self::Neutral),
            other => other.parse::<i64>().ok().and_then(Self::from_number),
        }
    }

    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(label) => Self::from_label(label),
            Value::Number(number) => number
                .as_i64()
                .or_else(|| number.as_f64().filter(|n| n.fract() == 0.).map(|n| n as i64))
                .and_then(Self::from_number),
            _ => None,
        }
    }
}

impl fmt::Display for Gear {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reverse => write!(f, "R"),
            Self::Neutral => write!(f, "N"),
            Self::Forward(gear) => write!(f, "{gear}"),
        }
    }
}

impl From<Gear> for String {
    fn from(gear: Gear) -> Self {
        gear.to_string()
    }
}

impl TryFrom<Value> for Gear {
    type Error = String;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Self::from_value(&value).ok_or_else(|| format!("invalid gear value: {value}"))
    }
}

/// One instant of recorded driving data.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySample {
    /// Speed in km/h
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed: Option<f64>,
    /// Throttle use. 0=off throttle to 1=full throttle
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub throttle: Option<f64>,
    /// Brake use. 0=brake released to 1=max pedal force
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brake: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gear: Option<Gear>,
}

impl TelemetrySample {
    /// Builds a sample from an arbitrary JSON element. Fields that are missing or carry the
    /// wrong type are left empty, the element itself is never rejected.
    pub fn from_value(value: &Value) -> Self {
        Self {
            speed: value.get("speed").and_then(Value::as_f64),
            throttle: value.get("throttle").and_then(Value::as_f64),
            brake: value.get("brake").and_then(Value::as_f64),
            gear: value.get("gear").and_then(Gear::from_value),
        }
    }
}

/// Session metadata block written by the logger, exactly as found in the file.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TelemetryMetadata {
    pub track_name: Option<String>,
    pub car_name: Option<String>,
    /// Null when the game did not report a best lap
    pub best_lap_time_ms: Option<f64>,
    pub samples_logged: Option<u64>,
    pub last_save_timestamp: Option<String>,
}

impl TelemetryMetadata {
    /// Anything that is not an object yields empty metadata, fields of the wrong type are
    /// treated as absent.
    pub fn from_value(value: &Value) -> Self {
        let text = |key: &str| value.get(key).and_then(Value::as_str).map(str::to_string);
        Self {
            track_name: text("track_name"),
            car_name: text("car_name"),
            best_lap_time_ms: value.get("best_lap_time_ms").and_then(Value::as_f64),
            samples_logged: value.get("samples_logged").and_then(Value::as_u64),
            last_save_timestamp: text("last_save_timestamp"),
        }
    }
}

/// Result of parsing an uploaded telemetry file, resolved once into one of the two
/// recognized envelopes.
#[derive(Clone, Debug, PartialEq)]
pub enum ParsedTelemetry {
    /// A bare array of samples
    Legacy { samples: Vec<TelemetrySample> },
    /// `{"metadata": {...}, "telemetry": [...]}` as written by the logger
    MetadataWrapped {
        metadata: TelemetryMetadata,
        samples: Vec<TelemetrySample>,
    },
}

impl ParsedTelemetry {
    pub fn samples(&self) -> &[TelemetrySample] {
        match self {
            Self::Legacy { samples } | Self::MetadataWrapped { samples, .. } => samples,
        }
    }

    pub fn metadata(&self) -> Option<&TelemetryMetadata> {
        match self {
            Self::Legacy { .. } => None,
            Self::MetadataWrapped { metadata, .. } => Some(metadata),
        }
    }

    pub fn into_samples(self) -> Vec<TelemetrySample> {
        match self {
            Self::Legacy { samples } | Self::MetadataWrapped { samples, .. } => samples,
        }
    }

    pub fn shape_name(&self) -> &'static str {
        match self {
            Self::Legacy { .. } => "legacy",
            Self::MetadataWrapped { .. } => "metadata",
        }
    }
}
