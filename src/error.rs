//! Error types for the track pipeline

use thiserror::Error;

use crate::parser::csv::CsvField;

/// Errors raised by coordinate construction and conversion.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GeoError {
    #[error("Latitude out of range: {0}")]
    LatitudeOutOfRange(f64),

    #[error("Longitude out of range: {0}")]
    LongitudeOutOfRange(f64),

    #[error("Invalid UTM zone: {0}")]
    InvalidZone(i32),

    #[error("Invalid UTM band '{0}', expected 'N' or 'S'")]
    InvalidBand(char),

    #[error("Invalid UTM easting/northing ({x}, {y})")]
    NegativeProjection { x: f64, y: f64 },
}

/// A single malformed input record. Always recoverable: the parser logs
/// the record and moves on to the next one.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FormatError {
    #[error("Invalid field index for {field}: record has {available} fields")]
    InvalidFieldIndex { field: CsvField, available: usize },

    #[error("Invalid field value for {field}: '{value}'")]
    InvalidFieldValue { field: CsvField, value: String },

    #[error("Record is not valid UTF-8")]
    InvalidEncoding,

    #[error("Missing timestamp fields")]
    MissingTimestamp,

    #[error("Invalid timestamp '{0}'")]
    InvalidTimestamp(String),

    #[error("Record is not of the form key=value")]
    MissingAssignment,

    #[error("Expected 6 values, found {0}")]
    WrongValueCount(usize),

    #[error("Invalid number '{0}'")]
    InvalidNumber(String),

    #[error("Coordinate error: {0}")]
    Coordinate(#[from] GeoError),
}

/// Invalid loader construction. Raised by the builder, never by the worker.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("No data parser supplied")]
    MissingParser,

    #[error("No element processor supplied")]
    MissingProcessor,

    #[error("Window capacity must be at least 1")]
    InvalidWindowCapacity,

    #[error("Record limit must be at least 1 when set")]
    InvalidLimit,
}

/// Fatal failure of a load run.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Processing fault: {0}")]
    Fault(String),

    #[error("Unsupported input format: {0}")]
    UnsupportedFormat(String),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}
