//! # Gap Interpolation
//!
//! Brings a raw sample sequence to a one-second cadence.
//!
//! Adjacent samples more than one second apart get a synthesized midpoint,
//! and the gap on each side of it is split again until every step is at most
//! one second. Each field is halved independently, integer fields with
//! truncation, so a large gap fills with points that bunch toward the
//! later sample rather than spreading evenly:
//!
//! ```text
//! t:    0 ---------------------- 5      altitude 0 -> 100
//! fill: 0   1    2    3    4     5
//! alt:  0   25   50   75   87    100
//! ```
//!
//! With duplicate removal enabled, a sample that does not move time forward
//! is dropped. Otherwise a backwards step is logged and left in place.

use log::{info, warn};

use crate::Datum;

/// Gaps longer than this are reported when filled.
const LONG_GAP_SECONDS: i64 = 300;

/// Fill time gaps in `data` in place and return the new length.
///
/// # Arguments
///
/// * `data` - Samples in recording order
/// * `remove_duplicates` - Drop samples whose time does not advance
///
/// # Example
///
/// ```
/// use skidata::{interpolate, Datum};
///
/// let mut data = vec![
///     Datum::new(0, 45.0, 6.0, 1000, 2000, 1500, 10.0),
///     Datum::new(4, 45.0, 6.0, 1040, 2000, 1500, 10.0),
/// ];
/// assert_eq!(interpolate(&mut data, false), 5);
/// assert_eq!(data.iter().map(|d| d.time).collect::<Vec<_>>(), vec![0, 1, 2, 3, 4]);
/// ```
pub fn interpolate(data: &mut Vec<Datum>, remove_duplicates: bool) -> usize {
    let mut input = std::mem::take(data).into_iter();
    let Some(first) = input.next() else {
        return 0;
    };

    let mut output = Vec::with_capacity(input.len() + 1);
    let mut previous = first;
    output.push(first);

    for (position, datum) in input.enumerate() {
        let delta = datum.time - previous.time;
        if delta <= 0 {
            if remove_duplicates {
                continue;
            }
            if delta < 0 {
                warn!(
                    "[Interpolate] Negative time delta ({}s) at position {}",
                    delta,
                    position + 1
                );
            }
        }
        if delta > LONG_GAP_SECONDS {
            info!(
                "[Interpolate] Filling {} missing points at position {}",
                delta - 1,
                output.len()
            );
        }

        fill_gap(&previous, &datum, &mut output);
        output.push(datum);
        previous = datum;
    }

    *data = output;
    data.len()
}

/// Push the midpoints between `from` and `to` in time order.
fn fill_gap(from: &Datum, to: &Datum, output: &mut Vec<Datum>) {
    if to.time - from.time <= 1 {
        return;
    }
    let middle = midpoint(from, to);
    fill_gap(from, &middle, output);
    output.push(middle);
    fill_gap(&middle, to, output);
}

/// Field-wise midpoint of two samples. Speed is zeroed when the two samples
/// share the same projected position.
pub fn midpoint(p1: &Datum, p2: &Datum) -> Datum {
    let stationary = p1.x == p2.x && p1.y == p2.y;
    Datum {
        time: p1.time + (p2.time - p1.time) / 2,
        latitude: p1.latitude + (p2.latitude - p1.latitude) / 2.0,
        longitude: p1.longitude + (p2.longitude - p1.longitude) / 2.0,
        x: p1.x + (p2.x - p1.x) / 2,
        y: p1.y + (p2.y - p1.y) / 2,
        altitude: p1.altitude + (p2.altitude - p1.altitude) / 2,
        speed: if stationary {
            0.0
        } else {
            p1.speed + (p2.speed - p1.speed) / 2.0
        },
    }
}
