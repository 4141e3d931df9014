//! Comma-separated track log decoder
//!
//! Each non-comment line holds one sample. Fields are located through a
//! configurable column map; unmapped numeric fields read as zero. When either
//! projected column is unmapped, easting/northing are derived from the
//! latitude/longitude through a UTM projection.
//!
//! Lines that fail to decode are appended to a side file as
//! `<lineNumber>:<rawLine>#<errorMessage>` and decoding continues.

use std::collections::HashMap;
use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use csv::{ByteRecord, ReaderBuilder};
use log::{debug, warn};

use super::DataParser;
use crate::error::FormatError;
use crate::geo_utils::WgsCoordinate;
use crate::Datum;

/// Named columns of a CSV track log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CsvField {
    Lat,
    Long,
    X,
    Y,
    Alt,
    Speed,
    Date,
    Time,
}

impl fmt::Display for CsvField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CsvField::Lat => "lat",
            CsvField::Long => "long",
            CsvField::X => "x",
            CsvField::Y => "y",
            CsvField::Alt => "alt",
            CsvField::Speed => "speed",
            CsvField::Date => "date",
            CsvField::Time => "time",
        };
        f.write_str(name)
    }
}

/// Configuration for the CSV decoder.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CsvConfig {
    /// Zero-based column index per field.
    /// Default: date 1, time 2, lat 6, long 7, alt 8, speed 9, x 10, y 11
    pub columns: HashMap<CsvField, usize>,

    /// chrono pattern applied to `"<date> <time>"`, read as UTC.
    /// Default: `%d-%m-%Y %H:%M:%S`
    pub timestamp_format: String,

    /// Side file receiving rejected lines, `None` to only log them.
    /// Default: `import.bad`
    pub bad_file: Option<PathBuf>,
}

impl Default for CsvConfig {
    fn default() -> Self {
        let columns = HashMap::from([
            (CsvField::Lat, 6),
            (CsvField::Long, 7),
            (CsvField::X, 10),
            (CsvField::Y, 11),
            (CsvField::Alt, 8),
            (CsvField::Speed, 9),
            (CsvField::Date, 1),
            (CsvField::Time, 2),
        ]);
        Self {
            columns,
            timestamp_format: "%d-%m-%Y %H:%M:%S".to_string(),
            bad_file: Some(PathBuf::from("import.bad")),
        }
    }
}

impl CsvConfig {
    /// Map `field` to column `index`.
    pub fn with_column(mut self, field: CsvField, index: usize) -> Self {
        self.columns.insert(field, index);
        self
    }

    /// Remove `field` from the column map.
    pub fn without_column(mut self, field: CsvField) -> Self {
        self.columns.remove(&field);
        self
    }

    pub fn with_bad_file(mut self, bad_file: Option<PathBuf>) -> Self {
        self.bad_file = bad_file;
        self
    }

    fn has_projection(&self) -> bool {
        self.columns.contains_key(&CsvField::X) && self.columns.contains_key(&CsvField::Y)
    }
}

/// CSV decoder over any byte stream.
///
/// Fields are split on commas with no quoting, lines starting with `#` are
/// comments and blank lines are skipped.
pub struct CsvParser<R> {
    reader: csv::Reader<R>,
    record: ByteRecord,
    config: CsvConfig,
    line_number: u64,
    rejected: usize,
}

impl CsvParser<File> {
    /// Open a CSV track log on disk.
    pub fn open<P: AsRef<Path>>(path: P, config: CsvConfig) -> io::Result<Self> {
        let file = File::open(path)?;
        Ok(Self::with_config(file, config))
    }
}

impl<R: io::Read> CsvParser<R> {
    /// Create a decoder with the default column map.
    pub fn new(reader: R) -> Self {
        Self::with_config(reader, CsvConfig::default())
    }

    pub fn with_config(reader: R, config: CsvConfig) -> Self {
        let reader = ReaderBuilder::new()
            .has_headers(false)
            .comment(Some(b'#'))
            .quoting(false)
            .flexible(true)
            .from_reader(reader);
        Self { reader, record: ByteRecord::new(), config, line_number: 0, rejected: 0 }
    }

    pub fn config(&self) -> &CsvConfig {
        &self.config
    }

    /// Number of lines rejected so far.
    pub fn rejected(&self) -> usize {
        self.rejected
    }

    /// Load the next non-blank record into `self.record`.
    fn next_record(&mut self) -> io::Result<bool> {
        loop {
            if !self.reader.read_byte_record(&mut self.record).map_err(into_io)? {
                return Ok(false);
            }
            self.line_number = self.record.position().map_or(self.line_number + 1, |p| p.line());

            let blank = self.record.len() == 1
                && self.record[0].iter().all(u8::is_ascii_whitespace);
            if !blank {
                return Ok(true);
            }
        }
    }

    /// Decode one line into a sample.
    pub fn parse_line(&self, line: &str) -> Result<Datum, FormatError> {
        let parts: Vec<&str> = line.split(',').map(str::trim).collect();
        self.parse_fields(&parts)
    }

    fn parse_record(&self) -> Result<Datum, FormatError> {
        let parts = self
            .record
            .iter()
            .map(|field| std::str::from_utf8(field).map(str::trim))
            .collect::<Result<Vec<&str>, _>>()
            .map_err(|_| FormatError::InvalidEncoding)?;
        self.parse_fields(&parts)
    }

    fn parse_fields(&self, parts: &[&str]) -> Result<Datum, FormatError> {
        let latitude = self.float_field(CsvField::Lat, parts)?;
        let longitude = self.float_field(CsvField::Long, parts)?;

        let (x, y) = if self.config.has_projection() {
            (self.int_field(CsvField::X, parts)?, self.int_field(CsvField::Y, parts)?)
        } else {
            let utm = WgsCoordinate::new(latitude, longitude)?.to_utm()?;
            (utm.easting.round() as i32, utm.northing.round() as i32)
        };

        let altitude = self.int_field(CsvField::Alt, parts)?;
        let speed = self.float_field(CsvField::Speed, parts)?;

        let date = self.text_field(CsvField::Date, parts)?;
        let time = self.text_field(CsvField::Time, parts)?;
        let (date, time) = match (date, time) {
            (Some(date), Some(time)) => (date, time),
            _ => return Err(FormatError::MissingTimestamp),
        };
        let stamp = format!("{} {}", date, time);
        let parsed = NaiveDateTime::parse_from_str(&stamp, &self.config.timestamp_format)
            .map_err(|_| FormatError::InvalidTimestamp(stamp.clone()))?;

        Ok(Datum::new(
            parsed.and_utc().timestamp(),
            latitude,
            longitude,
            x,
            y,
            altitude,
            speed,
        ))
    }

    fn text_field<'a>(&self, field: CsvField, parts: &[&'a str]) -> Result<Option<&'a str>, FormatError> {
        match self.config.columns.get(&field) {
            None => Ok(None),
            Some(&index) => parts
                .get(index)
                .copied()
                .map(Some)
                .ok_or(FormatError::InvalidFieldIndex { field, available: parts.len() }),
        }
    }

    fn float_field(&self, field: CsvField, parts: &[&str]) -> Result<f64, FormatError> {
        match self.text_field(field, parts)? {
            None => Ok(0.0),
            Some(value) => value.parse().map_err(|_| FormatError::InvalidFieldValue {
                field,
                value: value.to_string(),
            }),
        }
    }

    fn int_field(&self, field: CsvField, parts: &[&str]) -> Result<i32, FormatError> {
        match self.text_field(field, parts)? {
            None => Ok(0),
            Some(value) => value.parse().map_err(|_| FormatError::InvalidFieldValue {
                field,
                value: value.to_string(),
            }),
        }
    }

    /// The current record as it appeared in the input.
    fn raw_line(&self) -> String {
        let fields: Vec<_> = self.record.iter().map(String::from_utf8_lossy).collect();
        fields.join(",")
    }

    fn reject(&mut self, error: &FormatError) {
        self.rejected += 1;
        warn!("[CsvParser] Skipping line {}: {}", self.line_number, error);

        let Some(path) = &self.config.bad_file else {
            return;
        };
        let line = self.raw_line();
        let written = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .and_then(|mut file| writeln!(file, "{}:{}#{}", self.line_number, line, error));
        if let Err(e) = written {
            warn!("[CsvParser] Unable to record bad line in {}: {}", path.display(), e);
        }
    }
}

fn into_io(err: csv::Error) -> io::Error {
    match err.into_kind() {
        csv::ErrorKind::Io(e) => e,
        kind => io::Error::new(io::ErrorKind::InvalidData, format!("{:?}", kind)),
    }
}

impl<R: io::Read> DataParser for CsvParser<R> {
    fn read_next(&mut self) -> io::Result<Option<Datum>> {
        while self.next_record()? {
            match self.parse_record() {
                Ok(datum) => return Ok(Some(datum)),
                Err(e) => self.reject(&e),
            }
        }
        debug!("[CsvParser] End of input after {} lines ({} rejected)", self.line_number, self.rejected);
        Ok(None)
    }

    fn skip(&mut self) -> io::Result<bool> {
        self.next_record()
    }
}
