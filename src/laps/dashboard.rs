use itertools::Itertools;

use crate::summary::LapSummary;

/// Format a lap time as `m:ss.mmm`. Unknown (zero) lap times show as "N/A".
pub fn format_lap_time(lap_time_ms: u64) -> String {
    if lap_time_ms == 0 {
        return "N/A".to_string();
    }
    let minutes = lap_time_ms / 60_000;
    let seconds = (lap_time_ms % 60_000) / 1000;
    let millis = lap_time_ms % 1000;
    format!("{}:{:02}.{:03}", minutes, seconds, millis)
}

/// Aggregates shown on the dashboard over the stored laps. Laps without a known lap time
/// count towards the totals but never towards best or average lap time.
#[derive(Clone, Debug, PartialEq)]
pub struct DashboardStats<'a> {
    pub total_laps: usize,
    pub best_lap: Option<&'a LapSummary>,
    /// Milliseconds, 0 when no lap has a known time
    pub average_lap_time_ms: f64,
    pub unique_tracks: usize,
    /// Newest first
    pub recent_laps: Vec<&'a LapSummary>,
}

impl<'a> DashboardStats<'a> {
    pub fn from_laps(laps: &'a [LapSummary], recent_count: usize) -> Self {
        let timed_laps = laps.iter().filter(|lap| lap.lap_time > 0).collect_vec();
        let average_lap_time_ms = if timed_laps.is_empty() {
            0.
        } else {
            let total: f64 = timed_laps.iter().map(|lap| lap.lap_time as f64).sum();
            total / timed_laps.len() as f64
        };

        Self {
            total_laps: laps.len(),
            best_lap: timed_laps.iter().copied().min_by_key(|lap| lap.lap_time),
            average_lap_time_ms,
            unique_tracks: laps.iter().map(|lap| lap.track_name.as_str()).unique().count(),
            recent_laps: laps.iter().rev().take(recent_count).collect(),
        }
    }

    /// Best lap per track, fastest first. Equal times are ordered by track name.
    pub fn best_laps_by_track(laps: &'a [LapSummary]) -> Vec<&'a LapSummary> {
        laps.iter()
            .filter(|lap| lap.lap_time > 0)
            .map(|lap| (lap.track_name.as_str(), lap))
            .into_group_map()
            .into_values()
            .filter_map(|track_laps| track_laps.into_iter().min_by_key(|lap| lap.lap_time))
            .sorted_by(|a, b| {
                a.lap_time
                    .cmp(&b.lap_time)
                    .then_with(|| a.track_name.cmp(&b.track_name))
            })
            .collect()
    }
}
