//! Track elements and tracks.
//!
//! A [`MeasuredElement`] pairs a sample with the step to its successor. Once
//! the classifier has assigned a [`Mode`] it becomes a [`TrackElement`], and
//! elements are collected into [`Track`]s.
//!
//! Track aggregates are computed in one pass when the track is closed. Until
//! then every aggregate accessor reports its default.

use std::cmp::Ordering;
use std::hash::{Hash, Hasher};

use crate::geo_utils::projected_distance;
use crate::{Datum, Mode};

// ============================================================================
// Elements
// ============================================================================

/// A sample with the altitude change and planar distance to the next sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeasuredElement {
    datum: Datum,
    altitude_change: i32,
    distance: f64,
}

impl MeasuredElement {
    /// Measure `datum` against its successor. The last sample of a sequence
    /// has no successor and gets zero deltas.
    pub fn new(datum: Datum, next: Option<&Datum>) -> Self {
        let (altitude_change, distance) = match next {
            Some(next) => (
                next.altitude - datum.altitude,
                projected_distance(datum.x, datum.y, next.x, next.y),
            ),
            None => (0, 0.0),
        };
        Self { datum, altitude_change, distance }
    }

    pub fn datum(&self) -> &Datum {
        &self.datum
    }

    pub fn time(&self) -> i64 {
        self.datum.time
    }

    pub fn altitude_change(&self) -> i32 {
        self.altitude_change
    }

    /// Planar distance to the next sample, in meters.
    pub fn distance(&self) -> f64 {
        self.distance
    }

    /// Attach a classification result.
    pub fn classify(self, mode: Mode) -> TrackElement {
        TrackElement { measured: self, mode }
    }
}

/// A measured, classified sample.
///
/// Equality, ordering and hashing use the sample time only.
#[derive(Debug, Clone, Copy)]
pub struct TrackElement {
    measured: MeasuredElement,
    mode: Mode,
}

impl TrackElement {
    pub fn time(&self) -> i64 {
        self.measured.datum.time
    }

    pub fn latitude(&self) -> f64 {
        self.measured.datum.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.measured.datum.longitude
    }

    pub fn x(&self) -> i32 {
        self.measured.datum.x
    }

    pub fn y(&self) -> i32 {
        self.measured.datum.y
    }

    pub fn altitude(&self) -> i32 {
        self.measured.datum.altitude
    }

    pub fn altitude_change(&self) -> i32 {
        self.measured.altitude_change
    }

    pub fn distance(&self) -> f64 {
        self.measured.distance
    }

    pub fn speed(&self) -> f64 {
        self.measured.datum.speed
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn datum(&self) -> &Datum {
        &self.measured.datum
    }

    pub fn measured(&self) -> &MeasuredElement {
        &self.measured
    }
}

impl PartialEq for TrackElement {
    fn eq(&self, other: &Self) -> bool {
        self.time() == other.time()
    }
}

impl Eq for TrackElement {}

impl Hash for TrackElement {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.time().hash(state);
    }
}

impl PartialOrd for TrackElement {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TrackElement {
    fn cmp(&self, other: &Self) -> Ordering {
        self.time().cmp(&other.time())
    }
}

// ============================================================================
// Tracks
// ============================================================================

/// Aggregates of a closed track.
#[derive(Debug, Clone, Copy, Default)]
pub struct TrackStats {
    /// Mean of element speeds, km/h
    pub average_speed: f64,
    /// Sum of element distances, meters
    pub distance: f64,
    /// Sum of element altitude changes, meters
    pub altitude_delta: i64,
    /// Earliest element time
    pub start_time: i64,
    /// Latest element time
    pub end_time: i64,
    /// First element at the highest altitude
    pub high: Option<TrackElement>,
    /// First element at the lowest altitude
    pub low: Option<TrackElement>,
    /// First element at the highest speed
    pub fastest: Option<TrackElement>,
}

impl TrackStats {
    fn compute(elements: &[TrackElement]) -> Self {
        let mut stats = TrackStats::default();
        let Some(first) = elements.first() else {
            return stats;
        };
        stats.start_time = first.time();
        stats.end_time = first.time();

        for (i, e) in elements.iter().enumerate() {
            let count = (i + 1) as f64;
            stats.average_speed = (stats.average_speed * (count - 1.0) + e.speed()) / count;
            stats.distance += e.distance();
            stats.altitude_delta += e.altitude_change() as i64;
            stats.start_time = stats.start_time.min(e.time());
            stats.end_time = stats.end_time.max(e.time());

            if stats.high.map_or(true, |h| e.altitude() > h.altitude()) {
                stats.high = Some(*e);
            }
            if stats.low.map_or(true, |l| e.altitude() < l.altitude()) {
                stats.low = Some(*e);
            }
            if stats.fastest.map_or(true, |f| e.speed() > f.speed()) {
                stats.fastest = Some(*e);
            }
        }
        stats
    }
}

/// An ordered run of track elements.
#[derive(Debug, Clone, Default)]
pub struct Track {
    elements: Vec<TrackElement>,
    stats: TrackStats,
    closed: bool,
}

impl Track {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, element: TrackElement) {
        self.elements.push(element);
    }

    /// Compute aggregates over the current elements.
    pub fn close(&mut self) {
        self.stats = TrackStats::compute(&self.elements);
        self.closed = true;
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn first(&self) -> Option<&TrackElement> {
        self.elements.first()
    }

    pub fn last(&self) -> Option<&TrackElement> {
        self.elements.last()
    }

    pub fn elements(&self) -> &[TrackElement] {
        &self.elements
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TrackElement> {
        self.elements.iter()
    }

    /// Mode of the first element.
    pub fn mode(&self) -> Option<Mode> {
        self.first().map(TrackElement::mode)
    }

    pub fn stats(&self) -> &TrackStats {
        &self.stats
    }

    pub fn average_speed(&self) -> f64 {
        self.stats.average_speed
    }

    pub fn distance(&self) -> f64 {
        self.stats.distance
    }

    pub fn altitude_delta(&self) -> i64 {
        self.stats.altitude_delta
    }

    pub fn start_time(&self) -> i64 {
        self.stats.start_time
    }

    pub fn end_time(&self) -> i64 {
        self.stats.end_time
    }

    /// Seconds between the first and last element.
    pub fn duration(&self) -> i64 {
        self.stats.end_time - self.stats.start_time
    }

    pub fn high_altitude_element(&self) -> Option<&TrackElement> {
        self.stats.high.as_ref()
    }

    pub fn low_altitude_element(&self) -> Option<&TrackElement> {
        self.stats.low.as_ref()
    }

    pub fn max_speed_element(&self) -> Option<&TrackElement> {
        self.stats.fastest.as_ref()
    }

    pub fn high_altitude(&self) -> i32 {
        self.stats.high.map_or(0, |e| e.altitude())
    }

    pub fn low_altitude(&self) -> i32 {
        self.stats.low.map_or(0, |e| e.altitude())
    }

    pub fn max_speed(&self) -> f64 {
        self.stats.fastest.map_or(0.0, |e| e.speed())
    }
}

impl Extend<TrackElement> for Track {
    fn extend<I: IntoIterator<Item = TrackElement>>(&mut self, iter: I) {
        self.elements.extend(iter);
    }
}

impl FromIterator<TrackElement> for Track {
    fn from_iter<I: IntoIterator<Item = TrackElement>>(iter: I) -> Self {
        Self { elements: iter.into_iter().collect(), ..Self::default() }
    }
}

impl<'a> IntoIterator for &'a Track {
    type Item = &'a TrackElement;
    type IntoIter = std::slice::Iter<'a, TrackElement>;

    fn into_iter(self) -> Self::IntoIter {
        self.elements.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: f64, b: f64, epsilon: f64) -> bool {
        (a - b).abs() < epsilon
    }

    /// Build classified elements from (time, x, altitude, speed) samples.
    fn elements(samples: &[(i64, i32, i32, f64)], mode: Mode) -> Vec<TrackElement> {
        let data: Vec<Datum> = samples
            .iter()
            .map(|&(t, x, a, s)| Datum::new(t, 45.0, 6.0, x, 1000, a, s))
            .collect();
        (0..data.len())
            .map(|i| MeasuredElement::new(data[i], data.get(i + 1)).classify(mode))
            .collect()
    }

    #[test]
    fn test_measured_element_deltas() {
        let a = Datum::new(0, 45.0, 6.0, 0, 0, 100, 0.0);
        let b = Datum::new(1, 45.0, 6.0, 3, 4, 97, 0.0);

        let first = MeasuredElement::new(a, Some(&b));
        assert_eq!(first.altitude_change(), -3);
        assert!(approx_eq(first.distance(), 5.0, 1e-12));
        assert_eq!(first.datum(), &a);

        let last = MeasuredElement::new(b, None);
        assert_eq!(last.altitude_change(), 0);
        assert_eq!(last.distance(), 0.0);
    }

    #[test]
    fn test_element_equality_by_time() {
        let a = MeasuredElement::new(Datum::new(5, 45.0, 6.0, 0, 0, 100, 0.0), None);
        let b = MeasuredElement::new(Datum::new(5, 46.0, 7.0, 9, 9, 900, 9.0), None);
        assert_eq!(a.classify(Mode::Ski), b.classify(Mode::Lift));
        assert!(a.classify(Mode::Ski) < MeasuredElement::new(Datum::new(6, 0.0, 0.0, 0, 0, 0, 0.0), None).classify(Mode::Ski));
    }

    #[test]
    fn test_aggregates_default_before_close() {
        let track: Track = elements(&[(0, 0, 100, 5.0), (1, 10, 110, 7.0)], Mode::Lift)
            .into_iter()
            .collect();
        assert!(!track.is_closed());
        assert_eq!(track.len(), 2);
        assert_eq!(track.distance(), 0.0);
        assert_eq!(track.average_speed(), 0.0);
        assert_eq!(track.altitude_delta(), 0);
        assert!(track.max_speed_element().is_none());
        assert_eq!(track.start_time(), 0);
        assert_eq!(track.end_time(), 0);
    }

    #[test]
    fn test_aggregates_single_pass() {
        let samples = [
            (100, 0, 2000, 10.0),
            (101, 6, 1990, 30.0),
            (102, 14, 1995, 20.0),
            (103, 14, 1980, 30.0),
        ];
        let els = elements(&samples, Mode::Ski);
        let mut track: Track = els.iter().copied().collect();
        track.close();

        assert!(track.is_closed());
        assert!(approx_eq(track.average_speed(), 22.5, 1e-12));
        assert!(approx_eq(track.distance(), 14.0, 1e-12));
        assert_eq!(track.altitude_delta(), -20);
        assert_eq!(track.start_time(), 100);
        assert_eq!(track.end_time(), 103);
        assert_eq!(track.duration(), 3);
        assert_eq!(track.high_altitude(), 2000);
        assert_eq!(track.low_altitude(), 1980);
        assert_eq!(track.low_altitude_element().unwrap().time(), 103);
        // Ties keep the first element
        assert_eq!(track.max_speed_element().unwrap().time(), 101);
        assert_eq!(track.max_speed(), 30.0);
        assert_eq!(track.mode(), Some(Mode::Ski));

        let summed: f64 = els.iter().map(|e| e.distance()).sum();
        assert!(approx_eq(track.distance(), summed, 1e-12));
    }

    #[test]
    fn test_negative_altitudes_tracked() {
        let mut track: Track = elements(&[(0, 0, -5, 0.0), (1, 0, -12, 0.0)], Mode::Stop)
            .into_iter()
            .collect();
        track.close();
        assert_eq!(track.high_altitude(), -5);
        assert_eq!(track.low_altitude(), -12);
    }

    #[test]
    fn test_empty_track_close() {
        let mut track = Track::new();
        track.close();
        assert!(track.is_empty());
        assert_eq!(track.mode(), None);
        assert_eq!(track.distance(), 0.0);
        assert!(track.high_altitude_element().is_none());
    }
}
