//! Whole-session report.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};

use crate::ski_data::SkiData;
use crate::Mode;

/// Headline figures of a sealed session.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SessionSummary {
    /// Number of elements after interpolation
    pub records: usize,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    /// Kilometers
    pub distance_km: f64,
    /// Meters
    pub altitude_low: i32,
    /// Meters
    pub altitude_high: i32,
    /// km/h
    pub average_speed: f64,
    /// km/h
    pub max_speed: f64,
    /// Elements per mode, modes with no elements omitted
    pub mode_counts: BTreeMap<Mode, usize>,
    pub runs: usize,
    pub blocks: usize,
}

impl SessionSummary {
    pub fn from_data(data: &SkiData) -> Self {
        let all = data.all_elements();
        let (start, end) = if all.is_empty() {
            (None, None)
        } else {
            (
                DateTime::from_timestamp(all.start_time(), 0),
                DateTime::from_timestamp(all.end_time(), 0),
            )
        };
        let mode_counts = Mode::ALL
            .iter()
            .filter_map(|&mode| data.elements_in(mode).map(|t| (mode, t.len())))
            .collect();

        Self {
            records: all.len(),
            start,
            end,
            distance_km: all.distance() / 1000.0,
            altitude_low: all.low_altitude(),
            altitude_high: all.high_altitude(),
            average_speed: all.average_speed(),
            max_speed: all.max_speed(),
            mode_counts,
            runs: data.track_count(),
            blocks: data.block_count(),
        }
    }

    /// Elements classified as `mode`.
    pub fn count(&self, mode: Mode) -> usize {
        self.mode_counts.get(&mode).copied().unwrap_or(0)
    }

    /// Seconds between the first and last element.
    pub fn duration(&self) -> Option<i64> {
        Some((self.end? - self.start?).num_seconds())
    }
}

impl fmt::Display for SessionSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const RULE: &str = "------------------";
        writeln!(f, "==== Ski Data ====")?;
        writeln!(f, "Total records: {}", self.records)?;
        if let (Some(start), Some(end)) = (self.start, self.end) {
            writeln!(
                f,
                "Time: {} - {}",
                start.format("%F %T"),
                end.format("%F %T")
            )?;
        }
        writeln!(f, "{}", RULE)?;
        writeln!(f, "Total distance: {:.2}km", self.distance_km)?;
        writeln!(f, "Altitude: {}m-{}m", self.altitude_low, self.altitude_high)?;
        writeln!(f, "Average speed: {:.2}kph", self.average_speed)?;
        writeln!(f, "Maximum speed: {:.2}kph", self.max_speed)?;
        writeln!(f, "{}", RULE)?;
        for mode in Mode::ALL {
            writeln!(f, "{}: {}", mode, self.count(mode))?;
        }
        write!(f, "Runs: {}, blocks: {}", self.runs, self.blocks)
    }
}
