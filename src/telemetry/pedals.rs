use log::debug;

use super::TelemetrySample;

/// Convention used by a file for throttle and brake values. Samples leave the parser in
/// the `Ratio` convention.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PedalScale {
    /// 0.0 to 1.0
    Ratio,
    /// 0 to 100
    Percent,
}

impl PedalScale {
    /// A single pedal value above 1 means the whole file is percentage based.
    pub fn detect(samples: &[TelemetrySample]) -> Self {
        let is_percent = samples
            .iter()
            .flat_map(|s| [s.throttle, s.brake])
            .flatten()
            .any(|v| v > 1.);
        if is_percent { Self::Percent } else { Self::Ratio }
    }

    fn to_ratio(self, value: f64) -> f64 {
        let ratio = match self {
            Self::Ratio => value,
            Self::Percent => value / 100.,
        };
        ratio.clamp(0., 1.)
    }
}

pub(crate) fn normalize_pedals(samples: &mut [TelemetrySample]) -> PedalScale {
    let scale = PedalScale::detect(samples);
    debug!("Pedal inputs detected as {:?}", scale);
    for sample in samples.iter_mut() {
        sample.throttle = sample.throttle.map(|v| scale.to_ratio(v));
        sample.brake = sample.brake.map(|v| scale.to_ratio(v));
    }
    scale
}
