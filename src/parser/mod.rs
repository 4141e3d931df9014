//! Track log decoders
//!
//! Two line-oriented formats are supported:
//!
//! | Format | Extension | Decoder |
//! |--------|-----------|---------|
//! | Comma-separated export | `.csv` | [`CsvParser`] |
//! | Device section dump | `.gsd` | [`GsdParser`] |
//!
//! Both implement [`DataParser`]. A malformed record is logged and skipped
//! inside the decoder; only I/O failures reach the caller.

use std::fs::File;
use std::io::{self, BufReader};
use std::path::Path;

use crate::error::LoadError;
use crate::Datum;

pub mod csv;
pub mod gsd;

pub use self::csv::{CsvConfig, CsvField, CsvParser};
pub use self::gsd::GsdParser;

/// Source of raw samples for the loader.
pub trait DataParser {
    /// Decode the next valid record, skipping malformed ones.
    ///
    /// Returns `Ok(None)` once the input is exhausted.
    fn read_next(&mut self) -> io::Result<Option<Datum>>;

    /// Discard one record without decoding it.
    ///
    /// Returns `Ok(false)` if the input was already exhausted.
    fn skip(&mut self) -> io::Result<bool>;
}

impl<P: DataParser + ?Sized> DataParser for Box<P> {
    fn read_next(&mut self) -> io::Result<Option<Datum>> {
        (**self).read_next()
    }

    fn skip(&mut self) -> io::Result<bool> {
        (**self).skip()
    }
}

/// Supported input formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    Csv,
    Gsd,
}

impl InputFormat {
    /// Detect format from file extension
    pub fn from_extension(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()?.to_lowercase().as_str() {
            "csv" => Some(InputFormat::Csv),
            "gsd" => Some(InputFormat::Gsd),
            _ => None,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            InputFormat::Csv => "csv",
            InputFormat::Gsd => "gsd",
        }
    }
}

/// Open a track log, choosing the decoder from the file extension.
///
/// CSV files use the default column map; GSD files skip forward to the first
/// track-point block.
pub fn open_parser(path: &Path) -> Result<Box<dyn DataParser + Send>, LoadError> {
    let format = InputFormat::from_extension(path)
        .ok_or_else(|| LoadError::UnsupportedFormat(path.display().to_string()))?;
    let file = File::open(path)?;

    let parser: Box<dyn DataParser + Send> = match format {
        InputFormat::Csv => Box::new(CsvParser::new(file)),
        InputFormat::Gsd => Box::new(GsdParser::new(BufReader::new(file), true)?),
    };
    Ok(parser)
}
