//! # Geographic Utilities
//!
//! Coordinate conversions between the three representations used by ski
//! track logs.
//!
//! ## Overview
//!
//! | Type / Function | Description |
//! |-----------------|-------------|
//! | [`DmsCoordinate`] | Degrees, minutes, seconds and hemisphere letters |
//! | [`WgsCoordinate`] | Signed decimal degrees on the WGS84 datum |
//! | [`UtmCoordinate`] | Projected easting/northing in meters, plus zone and band |
//! | [`wgs_to_utm`] | Transverse Mercator forward projection |
//! | [`utm_to_wgs`] | Transverse Mercator inverse projection |
//! | [`projected_distance`] | Planar distance between two projected positions |
//!
//! ## Example
//!
//! ```rust
//! use skidata::geo_utils::{WgsCoordinate, DmsCoordinate};
//!
//! // Aiguille du Midi top station
//! let wgs = WgsCoordinate::new(45.8786, 6.8874).unwrap();
//! let utm = wgs.to_utm().unwrap();
//! assert_eq!(utm.zone, 32);
//!
//! let back = utm.to_wgs().unwrap();
//! assert!((back.latitude - wgs.latitude).abs() < 1e-6);
//!
//! let dms = DmsCoordinate::from_decimal_minutes(45, 52.716, 6, 53.244).unwrap();
//! let wgs = dms.to_wgs().unwrap();
//! assert!((wgs.longitude - 6.8874).abs() < 1e-6);
//! ```
//!
//! ## Algorithm Notes
//!
//! ### Transverse Mercator
//!
//! The projection uses the closed-form series from Hoffmann-Wellenhof, Lichtenegger
//! and Collins, carried to 8th-order terms in the longitude offset. Within a zone the
//! forward/inverse pair round-trips to well under a centimeter.
//!
//! ### Hemisphere band
//!
//! The band letter is `'S'` when the *longitude* is negative and `'N'` otherwise,
//! and the inverse projection removes the 10,000 km false northing whenever the
//! band is `'S'`. Track logs produced by the device all come from the same band,
//! so the pair is self-consistent for eastern longitudes only. Western-hemisphere
//! coordinates do not survive a round trip. This is kept as-is because stored
//! projected tracks depend on it.

use std::fmt;

use geo::{Distance, Euclidean, Point};

use crate::error::GeoError;

/// Ellipsoid semi-major axis in meters.
pub const SEMI_MAJOR_AXIS: f64 = 6_378_137.0;

/// Ellipsoid semi-minor axis in meters.
pub const SEMI_MINOR_AXIS: f64 = 6_356_752.314;

/// UTM central meridian scale factor.
pub const UTM_SCALE_FACTOR: f64 = 0.9996;

const FALSE_EASTING: f64 = 500_000.0;
const FALSE_NORTHING: f64 = 10_000_000.0;

// =============================================================================
// Coordinate Types
// =============================================================================

/// Compass letter attached to a DMS angle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Hemisphere {
    North,
    South,
    East,
    West,
}

impl Hemisphere {
    /// Single-letter form (`N`, `S`, `E`, `W`).
    pub fn letter(self) -> char {
        match self {
            Hemisphere::North => 'N',
            Hemisphere::South => 'S',
            Hemisphere::East => 'E',
            Hemisphere::West => 'W',
        }
    }

    fn sign(self) -> f64 {
        match self {
            Hemisphere::South | Hemisphere::West => -1.0,
            Hemisphere::North | Hemisphere::East => 1.0,
        }
    }
}

/// One axis of a DMS coordinate. Degrees are unsigned; the sign lives in
/// the hemisphere.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DmsAngle {
    pub degrees: u32,
    pub minutes: u32,
    pub seconds: f64,
    pub hemisphere: Hemisphere,
}

impl DmsAngle {
    /// Build an angle from signed degrees, rolling seconds >= 60 into minutes
    /// and minutes >= 60 into degrees.
    fn normalized(degrees: i32, minutes: u32, seconds: f64, positive: Hemisphere, negative: Hemisphere) -> Self {
        let hemisphere = if degrees < 0 { negative } else { positive };
        let mut degrees = degrees.unsigned_abs();
        let mut minutes = minutes;
        let mut seconds = seconds.abs();

        if seconds >= 60.0 {
            minutes += (seconds / 60.0).floor() as u32;
            seconds %= 60.0;
        }
        if minutes >= 60 {
            degrees += minutes / 60;
            minutes %= 60;
        }

        Self { degrees, minutes, seconds, hemisphere }
    }

    /// Signed decimal degrees.
    pub fn to_decimal(&self) -> f64 {
        let magnitude = self.degrees as f64 + self.minutes as f64 / 60.0 + self.seconds / 3600.0;
        magnitude * self.hemisphere.sign()
    }

    fn from_decimal(value: f64, positive: Hemisphere, negative: Hemisphere) -> Self {
        let hemisphere = if value < 0.0 { negative } else { positive };
        let magnitude = value.abs();
        let degrees = magnitude.trunc();
        let total_seconds = (magnitude - degrees) * 3600.0;
        let minutes = (total_seconds / 60.0).trunc();

        Self {
            degrees: degrees as u32,
            minutes: minutes as u32,
            seconds: total_seconds % 60.0,
            hemisphere,
        }
    }
}

impl fmt::Display for DmsAngle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}'{:.2}\"{}",
            self.degrees,
            self.minutes,
            self.seconds,
            self.hemisphere.letter()
        )
    }
}

/// Degree/minute/second coordinate.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DmsCoordinate {
    pub latitude: DmsAngle,
    pub longitude: DmsAngle,
}

impl DmsCoordinate {
    /// Create a DMS coordinate. Negative degrees select the southern/western
    /// hemisphere. Overflowing seconds and minutes are carried upward.
    ///
    /// # Errors
    ///
    /// Returns [`GeoError::LatitudeOutOfRange`] or [`GeoError::LongitudeOutOfRange`]
    /// when the normalized degree magnitude exceeds 90 or 180.
    pub fn new(
        lat_degrees: i32,
        lat_minutes: u32,
        lat_seconds: f64,
        lon_degrees: i32,
        lon_minutes: u32,
        lon_seconds: f64,
    ) -> Result<Self, GeoError> {
        let latitude = DmsAngle::normalized(
            lat_degrees,
            lat_minutes,
            lat_seconds,
            Hemisphere::North,
            Hemisphere::South,
        );
        if latitude.degrees > 90 {
            return Err(GeoError::LatitudeOutOfRange(latitude.to_decimal()));
        }

        let longitude = DmsAngle::normalized(
            lon_degrees,
            lon_minutes,
            lon_seconds,
            Hemisphere::East,
            Hemisphere::West,
        );
        if longitude.degrees > 180 {
            return Err(GeoError::LongitudeOutOfRange(longitude.to_decimal()));
        }

        Ok(Self { latitude, longitude })
    }

    /// Create a DMS coordinate from whole degrees and decimal minutes, the
    /// layout used by GPS receivers (`DDMM.mmmm`).
    pub fn from_decimal_minutes(
        lat_degrees: i32,
        lat_minutes: f64,
        lon_degrees: i32,
        lon_minutes: f64,
    ) -> Result<Self, GeoError> {
        let (lat_m, lat_s) = split_minutes(lat_minutes);
        let (lon_m, lon_s) = split_minutes(lon_minutes);
        Self::new(lat_degrees, lat_m, lat_s, lon_degrees, lon_m, lon_s)
    }

    /// Convert to signed decimal degrees.
    pub fn to_wgs(&self) -> Result<WgsCoordinate, GeoError> {
        WgsCoordinate::new(self.latitude.to_decimal(), self.longitude.to_decimal())
    }
}

impl fmt::Display for DmsCoordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.latitude, self.longitude)
    }
}

fn split_minutes(decimal_minutes: f64) -> (u32, f64) {
    let magnitude = decimal_minutes.abs();
    let minutes = magnitude.floor();
    (minutes as u32, (magnitude - minutes) * 60.0)
}

/// WGS84 coordinate in signed decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WgsCoordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl WgsCoordinate {
    /// Create a coordinate from decimal degrees.
    ///
    /// # Errors
    ///
    /// Rejects latitudes outside [-90, 90] and longitudes outside [-180, 180],
    /// including NaN.
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, GeoError> {
        if !(-90.0..=90.0).contains(&latitude) {
            return Err(GeoError::LatitudeOutOfRange(latitude));
        }
        if !(-180.0..=180.0).contains(&longitude) {
            return Err(GeoError::LongitudeOutOfRange(longitude));
        }
        Ok(Self { latitude, longitude })
    }

    /// Create a coordinate from radians.
    pub fn from_radians(latitude: f64, longitude: f64) -> Result<Self, GeoError> {
        Self::new(latitude.to_degrees(), longitude.to_degrees())
    }

    pub fn latitude_radians(&self) -> f64 {
        self.latitude.to_radians()
    }

    pub fn longitude_radians(&self) -> f64 {
        self.longitude.to_radians()
    }

    /// Project onto UTM. See [`wgs_to_utm`].
    pub fn to_utm(&self) -> Result<UtmCoordinate, GeoError> {
        wgs_to_utm(self)
    }

    /// Break into degrees, minutes and seconds.
    pub fn to_dms(&self) -> DmsCoordinate {
        DmsCoordinate {
            latitude: DmsAngle::from_decimal(self.latitude, Hemisphere::North, Hemisphere::South),
            longitude: DmsAngle::from_decimal(self.longitude, Hemisphere::East, Hemisphere::West),
        }
    }
}

impl fmt::Display for WgsCoordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.5}, {:.5}", self.latitude, self.longitude)
    }
}

/// Projected UTM coordinate.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct UtmCoordinate {
    /// Easting in meters, including the 500 km false easting
    pub easting: f64,
    /// Northing in meters, including the false northing for band `'S'`
    pub northing: f64,
    /// Zone number, 1 to 60
    pub zone: u8,
    /// `'N'` or `'S'`
    pub band: char,
}

impl UtmCoordinate {
    /// Create a validated UTM coordinate.
    pub fn new(easting: f64, northing: f64, zone: i32, band: char) -> Result<Self, GeoError> {
        if !(easting >= 0.0 && northing >= 0.0) {
            return Err(GeoError::NegativeProjection { x: easting, y: northing });
        }
        if !(1..=60).contains(&zone) {
            return Err(GeoError::InvalidZone(zone));
        }
        if band != 'N' && band != 'S' {
            return Err(GeoError::InvalidBand(band));
        }
        Ok(Self { easting, northing, zone: zone as u8, band })
    }

    /// Central meridian of this coordinate's zone, in radians.
    pub fn central_meridian(&self) -> f64 {
        central_meridian(self.zone as i32)
    }

    /// Inverse projection. See [`utm_to_wgs`].
    pub fn to_wgs(&self) -> Result<WgsCoordinate, GeoError> {
        utm_to_wgs(self)
    }
}

impl fmt::Display for UtmCoordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{} {:.0} {:.0}",
            self.zone, self.band, self.easting, self.northing
        )
    }
}

// =============================================================================
// Transverse Mercator
// =============================================================================

fn third_flattening() -> f64 {
    (SEMI_MAJOR_AXIS - SEMI_MINOR_AXIS) / (SEMI_MAJOR_AXIS + SEMI_MINOR_AXIS)
}

fn second_eccentricity_squared() -> f64 {
    (SEMI_MAJOR_AXIS.powi(2) - SEMI_MINOR_AXIS.powi(2)) / SEMI_MINOR_AXIS.powi(2)
}

fn central_meridian(zone: i32) -> f64 {
    ((-183 + zone * 6) as f64).to_radians()
}

/// Ellipsoidal distance from the equator to latitude `phi` (radians) along
/// the meridian, in meters.
fn arc_length_of_meridian(phi: f64) -> f64 {
    let n = third_flattening();

    let alpha = ((SEMI_MAJOR_AXIS + SEMI_MINOR_AXIS) / 2.0) * (1.0 + n.powi(2) / 4.0 + n.powi(4) / 64.0);
    let beta = -3.0 * n / 2.0 + 9.0 * n.powi(3) / 16.0 - 3.0 * n.powi(5) / 32.0;
    let gamma = 15.0 * n.powi(2) / 16.0 - 15.0 * n.powi(4) / 32.0;
    let delta = -35.0 * n.powi(3) / 48.0 + 105.0 * n.powi(5) / 256.0;
    let epsilon = 315.0 * n.powi(4) / 512.0;

    alpha
        * (phi
            + beta * (2.0 * phi).sin()
            + gamma * (4.0 * phi).sin()
            + delta * (6.0 * phi).sin()
            + epsilon * (8.0 * phi).sin())
}

/// Latitude (radians) whose meridian arc length equals `y` meters.
fn footpoint_latitude(y: f64) -> f64 {
    let n = third_flattening();

    let alpha = ((SEMI_MAJOR_AXIS + SEMI_MINOR_AXIS) / 2.0) * (1.0 + n.powi(2) / 4.0 + n.powi(4) / 64.0);
    let y_ = y / alpha;
    let beta = 3.0 * n / 2.0 - 27.0 * n.powi(3) / 32.0 + 269.0 * n.powi(5) / 512.0;
    let gamma = 21.0 * n.powi(2) / 16.0 - 55.0 * n.powi(4) / 32.0;
    let delta = 151.0 * n.powi(3) / 96.0 - 417.0 * n.powi(5) / 128.0;
    let epsilon = 1097.0 * n.powi(4) / 512.0;

    y_ + beta * (2.0 * y_).sin()
        + gamma * (4.0 * y_).sin()
        + delta * (6.0 * y_).sin()
        + epsilon * (8.0 * y_).sin()
}

/// Project a WGS84 coordinate onto UTM.
///
/// The zone is `floor((lon + 180) / 6) + 1`. Negative northings get the
/// 10,000 km false northing added; the band letter follows the longitude sign
/// (see the module notes).
///
/// # Errors
///
/// Longitude exactly 180° maps to zone 61 and is rejected as
/// [`GeoError::InvalidZone`].
pub fn wgs_to_utm(wgs: &WgsCoordinate) -> Result<UtmCoordinate, GeoError> {
    let phi = wgs.latitude_radians();
    let lambda = wgs.longitude_radians();
    let zone = ((wgs.longitude + 180.0) / 6.0).floor() as i32 + 1;

    let nu2 = second_eccentricity_squared() * phi.cos().powi(2);
    let n = SEMI_MAJOR_AXIS.powi(2) / (SEMI_MINOR_AXIS * (1.0 + nu2).sqrt());
    let t = phi.tan();
    let t2 = t * t;
    let l = lambda - central_meridian(zone);
    let cos = phi.cos();

    // Coefficients for l^n; l^1 and l^2 have none
    let l3coef = 1.0 - t2 + nu2;
    let l4coef = 5.0 - t2 + 9.0 * nu2 + 4.0 * (nu2 * nu2);
    let l5coef = 5.0 - 18.0 * t2 + (t2 * t2) + 14.0 * nu2 - 58.0 * t2 * nu2;
    let l6coef = 61.0 - 58.0 * t2 + (t2 * t2) + 270.0 * nu2 - 330.0 * t2 * nu2;
    let l7coef = 61.0 - 479.0 * t2 + 179.0 * (t2 * t2) - (t2 * t2 * t2);
    let l8coef = 1385.0 - 3111.0 * t2 + 543.0 * (t2 * t2) - (t2 * t2 * t2);

    let x = n * cos * l
        + n / 6.0 * cos.powi(3) * l3coef * l.powi(3)
        + n / 120.0 * cos.powi(5) * l5coef * l.powi(5)
        + n / 5040.0 * cos.powi(7) * l7coef * l.powi(7);

    let y = arc_length_of_meridian(phi)
        + t / 2.0 * n * cos.powi(2) * l.powi(2)
        + t / 24.0 * n * cos.powi(4) * l4coef * l.powi(4)
        + t / 720.0 * n * cos.powi(6) * l6coef * l.powi(6)
        + t / 40320.0 * n * cos.powi(8) * l8coef * l.powi(8);

    let easting = x * UTM_SCALE_FACTOR + FALSE_EASTING;
    let mut northing = y * UTM_SCALE_FACTOR;
    if northing < 0.0 {
        northing += FALSE_NORTHING;
    }
    let band = if wgs.longitude < 0.0 { 'S' } else { 'N' };

    UtmCoordinate::new(easting, northing, zone, band)
}

/// Inverse projection from UTM back to WGS84.
pub fn utm_to_wgs(utm: &UtmCoordinate) -> Result<WgsCoordinate, GeoError> {
    let x = (utm.easting - FALSE_EASTING) / UTM_SCALE_FACTOR;
    let mut y = utm.northing;
    if utm.band == 'S' {
        y -= FALSE_NORTHING;
    }
    let y = y / UTM_SCALE_FACTOR;

    let phif = footpoint_latitude(y);
    let cf = phif.cos();
    let nuf2 = second_eccentricity_squared() * cf.powi(2);
    let nf = SEMI_MAJOR_AXIS.powi(2) / (SEMI_MINOR_AXIS * (1.0 + nuf2).sqrt());
    let tf = phif.tan();
    let tf2 = tf * tf;
    let tf4 = tf2 * tf2;

    // Fractional coefficients for x^n, built from successive powers of nf
    let mut nfpow = nf;
    let x1frac = 1.0 / (nfpow * cf);
    nfpow *= nf;
    let x2frac = tf / (2.0 * nfpow);
    nfpow *= nf;
    let x3frac = 1.0 / (6.0 * nfpow * cf);
    nfpow *= nf;
    let x4frac = tf / (24.0 * nfpow);
    nfpow *= nf;
    let x5frac = 1.0 / (120.0 * nfpow * cf);
    nfpow *= nf;
    let x6frac = tf / (720.0 * nfpow);
    nfpow *= nf;
    let x7frac = 1.0 / (5040.0 * nfpow * cf);
    nfpow *= nf;
    let x8frac = tf / (40320.0 * nfpow);

    let x2poly = -1.0 - nuf2;
    let x3poly = -1.0 - 2.0 * tf2 - nuf2;
    let x4poly = 5.0 + 3.0 * tf2 + 6.0 * nuf2 - 6.0 * tf2 * nuf2 - 3.0 * (nuf2 * nuf2) - 9.0 * tf2 * (nuf2 * nuf2);
    let x5poly = 5.0 + 28.0 * tf2 + 24.0 * tf4 + 6.0 * nuf2 + 8.0 * tf2 * nuf2;
    let x6poly = -61.0 - 90.0 * tf2 - 45.0 * tf4 - 107.0 * nuf2 + 162.0 * tf2 * nuf2;
    let x7poly = -61.0 - 662.0 * tf2 - 1320.0 * tf4 - 720.0 * (tf4 * tf2);
    let x8poly = 1385.0 + 3633.0 * tf2 + 4095.0 * tf4 + 1575.0 * (tf4 * tf2);

    let lat = phif
        + x2frac * x2poly * x.powi(2)
        + x4frac * x4poly * x.powi(4)
        + x6frac * x6poly * x.powi(6)
        + x8frac * x8poly * x.powi(8);

    let lon = utm.central_meridian()
        + x1frac * x
        + x3frac * x3poly * x.powi(3)
        + x5frac * x5poly * x.powi(5)
        + x7frac * x7poly * x.powi(7);

    WgsCoordinate::from_radians(lat, lon)
}

// =============================================================================
// Distance Functions
// =============================================================================

/// Planar distance in meters between two projected positions.
///
/// Track elements always sit in the same UTM zone, so a straight Euclidean
/// distance on easting/northing is what the aggregates use.
pub fn projected_distance(x1: i32, y1: i32, x2: i32, y2: i32) -> f64 {
    let p1 = Point::new(x1 as f64, y1 as f64);
    let p2 = Point::new(x2 as f64, y2 as f64);
    Euclidean::distance(p1, p2)
}
