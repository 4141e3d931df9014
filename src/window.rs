//! # Lookahead Window
//!
//! A bounded buffer of upcoming [`MeasuredElement`]s.
//!
//! The window is filled with the first `capacity` elements of the sequence.
//! Each call to [`ElemWindow::next`] appends one more element from the source
//! (while any remain) and then hands back the oldest one, so the buffer stays
//! at `capacity` until the source runs dry and then drains.
//!
//! Trend statistics are computed over everything currently buffered, which
//! means they describe the element at the front and the ones that follow it.
//!
//! | Statistic | Definition |
//! |-----------|------------|
//! | `ascent` | Sum of altitude changes |
//! | `ascending` / `descending` / `flat` | Share with positive / negative / zero altitude change |
//! | `moving` | Share with positive distance |
//! | `stopped` | Share with zero distance and zero altitude change |

use std::collections::VecDeque;
use std::iter::Peekable;
use std::vec;

use crate::track::MeasuredElement;
use crate::Datum;

/// Default number of buffered elements.
pub const DEFAULT_WINDOW_CAPACITY: usize = 20;

/// Snapshot of the window's trend statistics.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct WindowStats {
    pub ascent: i64,
    pub ascending: f64,
    pub descending: f64,
    pub flat: f64,
    pub moving: f64,
    pub stopped: f64,
}

/// Forward-looking buffer over a sample sequence.
pub struct ElemWindow {
    buffer: VecDeque<MeasuredElement>,
    source: Peekable<vec::IntoIter<Datum>>,
    capacity: usize,
}

impl ElemWindow {
    /// Wrap `data` and pre-fill up to `capacity` elements.
    pub fn new(data: Vec<Datum>, capacity: usize) -> Self {
        let mut window = Self {
            buffer: VecDeque::with_capacity(capacity + 1),
            source: data.into_iter().peekable(),
            capacity,
        };
        while window.buffer.len() < capacity {
            match window.pull() {
                Some(element) => window.buffer.push_back(element),
                None => break,
            }
        }
        window
    }

    fn pull(&mut self) -> Option<MeasuredElement> {
        let datum = self.source.next()?;
        Some(MeasuredElement::new(datum, self.source.peek()))
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of buffered elements.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// The element the next call to `next` will return.
    pub fn front(&self) -> Option<&MeasuredElement> {
        self.buffer.front()
    }

    pub fn iter(&self) -> impl Iterator<Item = &MeasuredElement> {
        self.buffer.iter()
    }

    fn ratio(&self, predicate: impl Fn(&MeasuredElement) -> bool) -> f64 {
        debug_assert!(!self.buffer.is_empty(), "window statistics on an empty buffer");
        let matching = self.buffer.iter().filter(|e| predicate(e)).count();
        matching as f64 / self.buffer.len() as f64
    }

    /// Sum of altitude changes over the buffer.
    pub fn ascent(&self) -> i64 {
        self.buffer.iter().map(|e| e.altitude_change() as i64).sum()
    }

    pub fn ascending(&self) -> f64 {
        self.ratio(|e| e.altitude_change() > 0)
    }

    pub fn descending(&self) -> f64 {
        self.ratio(|e| e.altitude_change() < 0)
    }

    pub fn flat(&self) -> f64 {
        self.ratio(|e| e.altitude_change() == 0)
    }

    pub fn moving(&self) -> f64 {
        self.ratio(|e| e.distance() > 0.0)
    }

    pub fn stopped(&self) -> f64 {
        self.ratio(|e| e.distance() == 0.0 && e.altitude_change() == 0)
    }

    /// All statistics at once. `None` when the buffer is empty.
    pub fn stats(&self) -> Option<WindowStats> {
        if self.buffer.is_empty() {
            return None;
        }
        Some(WindowStats {
            ascent: self.ascent(),
            ascending: self.ascending(),
            descending: self.descending(),
            flat: self.flat(),
            moving: self.moving(),
            stopped: self.stopped(),
        })
    }
}

impl Iterator for ElemWindow {
    type Item = MeasuredElement;

    fn next(&mut self) -> Option<MeasuredElement> {
        if self.buffer.is_empty() {
            return None;
        }
        if let Some(element) = self.pull() {
            self.buffer.push_back(element);
        }
        self.buffer.pop_front()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.buffer.len() + self.source.len();
        (remaining, Some(remaining))
    }
}
