//! # Mode Classifier
//!
//! Finite-state machine assigning a [`Mode`] to every element.
//!
//! The machine starts in [`Mode::Stop`] and is evaluated once per element
//! against the lookahead window positioned on that element:
//!
//! | From | Condition | To |
//! |------|-----------|----|
//! | STOP | distance > 0, moving >= 0.5, climb > 0, ascent > 0, ascending > 0.3 | LIFT |
//! | STOP | distance > 0, moving >= 0.5, climb < 0, ascent < 0, descending > 0.3 | SKI |
//! | SKI | distance == 0, stopped > 0.8 | STOP |
//! | SKI | climb > 5, ascent > 0, ascending > 0.9 | LIFT |
//! | LIFT | distance == 0, stopped > 0.8 | STOP |
//! | LIFT | climb < 0, ascent < 0, descending > 0.9 | SKI |
//!
//! where *climb* is the element's own altitude change. Anything else keeps
//! the current mode.

use crate::track::MeasuredElement;
use crate::window::{ElemWindow, WindowStats};
use crate::Mode;

/// Share of moving elements needed to leave STOP.
const START_MOVING: f64 = 0.5;
/// Share of climbing/descending elements needed to leave STOP.
const START_TREND: f64 = 0.3;
/// Share of stopped elements needed to enter STOP.
const STOPPED: f64 = 0.8;
/// Share of climbing/descending elements needed to switch SKI <-> LIFT.
const SWITCH_TREND: f64 = 0.9;
/// Minimum per-element climb, in meters, to switch from SKI to LIFT.
const SKI_TO_LIFT_CLIMB: i32 = 5;

/// Decides the mode of each element as the loader walks the window.
pub trait Processor {
    /// Mode for `element`, given the previous element's mode and the window
    /// positioned on `element`.
    fn process_element(&self, current: Mode, element: &MeasuredElement, window: &ElemWindow) -> Mode;
}

/// The stop / ski / lift state machine.
#[derive(Debug, Clone, Copy, Default)]
pub struct SkiModeClassifier;

impl Processor for SkiModeClassifier {
    fn process_element(&self, current: Mode, element: &MeasuredElement, window: &ElemWindow) -> Mode {
        match window.stats() {
            Some(stats) => next_mode(current, element, &stats),
            None => current,
        }
    }
}

/// Transition function of the state machine.
pub fn next_mode(current: Mode, element: &MeasuredElement, stats: &WindowStats) -> Mode {
    let distance = element.distance();
    let climb = element.altitude_change();

    match current {
        Mode::Stop => {
            if distance > 0.0 && stats.moving >= START_MOVING {
                if climb > 0 && stats.ascent > 0 && stats.ascending > START_TREND {
                    return Mode::Lift;
                }
                if climb < 0 && stats.ascent < 0 && stats.descending > START_TREND {
                    return Mode::Ski;
                }
            }
        }
        Mode::Ski => {
            if distance == 0.0 && stats.stopped > STOPPED {
                return Mode::Stop;
            }
            if climb > SKI_TO_LIFT_CLIMB && stats.ascent > 0 && stats.ascending > SWITCH_TREND {
                return Mode::Lift;
            }
        }
        Mode::Lift => {
            if distance == 0.0 && stats.stopped > STOPPED {
                return Mode::Stop;
            }
            if climb < 0 && stats.ascent < 0 && stats.descending > SWITCH_TREND {
                return Mode::Ski;
            }
        }
    }
    current
}
