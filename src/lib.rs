//! # SkiData
//!
//! GPS track processing for ski-tracking device logs.
//!
//! This library provides:
//! - Decoders for the device's CSV and GSD track-point formats
//! - DMS / WGS84 / UTM coordinate conversion
//! - Gap repair to a one-second cadence
//! - Movement classification (stopped, skiing, riding a lift) from a lookahead window
//! - Aggregation into runs, rides and whole-session statistics
//! - A background loader with progress callbacks and cancellation
//!
//! ## Features
//!
//! - **`parallel`** - Load several session files at once with rayon
//! - **`serde`** - Serialize configuration and summaries
//! - **`full`** - Enable all features
//!
//! ## Quick Start
//!
//! ```rust
//! use std::io::Cursor;
//! use skidata::{CsvParser, DataLoader, LoaderState, Mode, SkiModeClassifier};
//!
//! let log = "\
//! # id,date,time,-,-,-,lat,long,alt,speed,x,y
//! 1,15-01-2024,09:30:00,,,,45.9,6.8,2100,0.0,340000,5084000
//! 2,15-01-2024,09:30:01,,,,45.9,6.8,2100,0.0,340000,5084000
//! ";
//!
//! let mut loader = DataLoader::builder()
//!     .parser(CsvParser::new(Cursor::new(log)))
//!     .processor(SkiModeClassifier)
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(loader.run().unwrap(), LoaderState::Complete);
//! let data = loader.get_data().unwrap();
//! assert_eq!(data.len(), 2);
//! assert_eq!(data.all_elements().first().unwrap().mode(), Mode::Stop);
//! ```

use std::fmt;

use chrono::{DateTime, Utc};

pub mod error;
pub use error::{ConfigError, FormatError, GeoError, LoadError};

pub mod geo_utils;

pub mod parser;
pub use parser::{open_parser, CsvConfig, CsvField, CsvParser, DataParser, GsdParser, InputFormat};

pub mod interpolate;
pub use interpolate::interpolate;

pub mod window;
pub use window::{ElemWindow, WindowStats};

pub mod classifier;
pub use classifier::{next_mode, Processor, SkiModeClassifier};

pub mod track;
pub use track::{MeasuredElement, Track, TrackElement, TrackStats};

pub mod ski_data;
pub use ski_data::{SkiData, TrackBlock};

pub mod loader;
pub use loader::{
    DataLoader, DataLoaderBuilder, DataLoaderListener, LoadHandle, LoaderConfig, LoaderControl,
    LoaderState, LoggingListener,
};

pub mod summary;
pub use summary::SessionSummary;

pub mod batch;
pub use batch::{load_file, load_sessions, SessionResult};

#[cfg(feature = "parallel")]
pub use batch::load_sessions_parallel;

// ============================================================================
// Core Types
// ============================================================================

/// One raw GPS sample as decoded from a track log.
///
/// # Example
/// ```
/// use skidata::Datum;
/// let datum = Datum::new(1_705_311_000, 45.9237, 6.8694, 340_011, 5_087_784, 2_120, 12.5);
/// assert_eq!(datum.altitude, 2_120);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Datum {
    /// Seconds since the Unix epoch (UTC)
    pub time: i64,
    /// Decimal degrees
    pub latitude: f64,
    /// Decimal degrees
    pub longitude: f64,
    /// UTM easting in meters
    pub x: i32,
    /// UTM northing in meters
    pub y: i32,
    /// Meters above sea level
    pub altitude: i32,
    /// Ground speed in km/h
    pub speed: f64,
}

impl Datum {
    /// Create a new sample.
    pub fn new(
        time: i64,
        latitude: f64,
        longitude: f64,
        x: i32,
        y: i32,
        altitude: i32,
        speed: f64,
    ) -> Self {
        Self { time, latitude, longitude, x, y, altitude, speed }
    }

    /// Sample time as a UTC timestamp, `None` if out of chrono's range.
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.time, 0)
    }
}

/// Movement state of a track element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Mode {
    /// Not moving
    #[default]
    Stop,
    /// Descending
    Ski,
    /// Riding uphill
    Lift,
}

impl Mode {
    /// All modes, in declaration order.
    pub const ALL: [Mode; 3] = [Mode::Stop, Mode::Ski, Mode::Lift];
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Mode::Stop => "STOP",
            Mode::Ski => "SKI",
            Mode::Lift => "LIFT",
        };
        f.write_str(name)
    }
}
