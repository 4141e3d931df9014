//! GSD track log decoder
//!
//! A GSD dump is a sequence of `[NAME]` sections. The `[TP]` section lists
//! the track-point blocks, and each block holds records of the form
//!
//! ```text
//! key=lat,long,time,date,speed,alt
//! ```
//!
//! | Value | Packing | Example |
//! |-------|---------|---------|
//! | lat / long | `DDMMmmmm`, degrees then minutes x 10000 | `45524966` = 45°52.4966' |
//! | time | `HHMMSS` | `93015` = 09:30:15 |
//! | date | `DDMMYY` | `150124` = 15 Jan 2024 |
//! | speed | km/h x 100 | `3550` = 35.5 km/h |
//! | alt | meters x 10000 | `21500000` = 2150 m |
//!
//! Coordinates go DMS -> WGS84 -> UTM. Timestamps are read as UTC.

use std::io::{self, BufRead};

use chrono::NaiveDateTime;
use log::{debug, warn};

use super::DataParser;
use crate::error::FormatError;
use crate::geo_utils::DmsCoordinate;
use crate::Datum;

const TRACK_POINT_HEADER: &str = "[TP]";

/// Line-oriented GSD decoder.
pub struct GsdParser<R> {
    reader: R,
    line_number: usize,
    rejected: usize,
}

impl<R: BufRead> GsdParser<R> {
    /// Create a decoder. With `bypass_headers`, the reader is advanced to the
    /// first track-point block named in the `[TP]` section.
    pub fn new(reader: R, bypass_headers: bool) -> io::Result<Self> {
        let mut parser = Self { reader, line_number: 0, rejected: 0 };
        if bypass_headers {
            parser.bypass_headers()?;
        }
        Ok(parser)
    }

    /// Number of records rejected so far.
    pub fn rejected(&self) -> usize {
        self.rejected
    }

    fn bypass_headers(&mut self) -> io::Result<()> {
        if !self.seek_header(TRACK_POINT_HEADER)? {
            warn!("[GsdParser] No {} section found", TRACK_POINT_HEADER);
            return Ok(());
        }

        let Some(entry) = self.next_data_line()? else {
            warn!("[GsdParser] {} section is empty", TRACK_POINT_HEADER);
            return Ok(());
        };
        let entry = String::from_utf8_lossy(&entry);
        let block = entry.split_once('=').map_or(&*entry, |(_, name)| name);
        let header = format!("[{}]", block.trim());

        if self.seek_header(&header)? {
            debug!("[GsdParser] Positioned at block {} (line {})", header, self.line_number);
        } else {
            warn!("[GsdParser] Track-point block {} not found", header);
        }
        Ok(())
    }

    /// Next raw line without its terminator.
    fn read_line(&mut self) -> io::Result<Option<Vec<u8>>> {
        let mut line = Vec::new();
        if self.reader.read_until(b'\n', &mut line)? == 0 {
            return Ok(None);
        }
        self.line_number += 1;
        while matches!(line.last(), Some(b'\n' | b'\r')) {
            line.pop();
        }
        Ok(Some(line))
    }

    /// Advance past the header line matching `header`, ignoring case.
    /// Returns `false` at end of input.
    fn seek_header(&mut self, header: &str) -> io::Result<bool> {
        while let Some(line) = self.read_line()? {
            if line.first() == Some(&b'[')
                && String::from_utf8_lossy(&line).trim().eq_ignore_ascii_case(header)
            {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Next line that is neither blank nor a section header.
    fn next_data_line(&mut self) -> io::Result<Option<Vec<u8>>> {
        while let Some(line) = self.read_line()? {
            if line.iter().all(u8::is_ascii_whitespace) || line.first() == Some(&b'[') {
                continue;
            }
            return Ok(Some(line));
        }
        Ok(None)
    }
}

/// Decode one `key=value` record.
pub fn parse_record(line: &str) -> Result<Datum, FormatError> {
    let (_, value) = line.split_once('=').ok_or(FormatError::MissingAssignment)?;
    let parts: Vec<&str> = value.split(',').map(str::trim).collect();
    if parts.len() < 6 {
        return Err(FormatError::WrongValueCount(parts.len()));
    }

    let (lat_degrees, lat_minutes) = unpack_degrees(parse_int(parts[0])?)?;
    let (lon_degrees, lon_minutes) = unpack_degrees(parse_int(parts[1])?)?;
    let wgs = DmsCoordinate::from_decimal_minutes(lat_degrees, lat_minutes, lon_degrees, lon_minutes)?
        .to_wgs()?;
    let utm = wgs.to_utm()?;

    let time = parse_int(parts[2])?;
    let date = parse_int(parts[3])?;
    let stamp = format!("{:06} {:06}", date, time);
    let parsed = NaiveDateTime::parse_from_str(&stamp, "%d%m%y %H%M%S")
        .map_err(|_| FormatError::InvalidTimestamp(stamp.clone()))?;

    let speed = parse_int(parts[4])? as f64 / 100.0;
    let altitude = (parse_int(parts[5])? / 10_000) as i32;

    Ok(Datum::new(
        parsed.and_utc().timestamp(),
        wgs.latitude,
        wgs.longitude,
        utm.easting.round() as i32,
        utm.northing.round() as i32,
        altitude,
        speed,
    ))
}

fn parse_int(value: &str) -> Result<i64, FormatError> {
    value
        .parse()
        .map_err(|_| FormatError::InvalidNumber(value.to_string()))
}

/// Split a packed `DDMMmmmm` value into whole degrees and decimal minutes.
fn unpack_degrees(packed: i64) -> Result<(i32, f64), FormatError> {
    let magnitude = packed.unsigned_abs();
    let degrees = i32::try_from(magnitude / 1_000_000)
        .map_err(|_| FormatError::InvalidNumber(packed.to_string()))?;
    let minutes = (magnitude % 1_000_000) as f64 / 10_000.0;
    Ok((if packed < 0 { -degrees } else { degrees }, minutes))
}

impl<R: BufRead> DataParser for GsdParser<R> {
    fn read_next(&mut self) -> io::Result<Option<Datum>> {
        while let Some(line) = self.next_data_line()? {
            let decoded = std::str::from_utf8(&line)
                .map_err(|_| FormatError::InvalidEncoding)
                .and_then(parse_record);
            match decoded {
                Ok(datum) => return Ok(Some(datum)),
                Err(e) => {
                    self.rejected += 1;
                    warn!("[GsdParser] Skipping line {}: {}", self.line_number, e);
                }
            }
        }
        Ok(None)
    }

    fn skip(&mut self) -> io::Result<bool> {
        Ok(self.next_data_line()?.is_some())
    }
}
