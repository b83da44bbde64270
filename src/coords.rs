//! Coordinate normalization into location buckets.
//!
//! Coordinates are snapped to a fixed grid of 10^-8 degrees and then rounded one
//! decimal digit at a time, half away from zero, down to the requested precision.
//! Rounding digit by digit keeps the buckets nested: two coordinates sharing a
//! bucket at precision `p` share it at every precision below `p` too.

use crate::error::{StreamError, StreamResult};
use geo::{Distance, Haversine, Point};
use serde::Serialize;
use std::ops::RangeInclusive;

pub const MAX_PRECISION: u8 = 8;

/// Grid units per degree.
pub const GRID_SCALE: i64 = 100_000_000;

const METERS_PER_DEGREE: f64 = 111_320.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Bucket {
    pub precision: u8,
    /// Latitude in units of 10^-precision degrees.
    pub lat_key: i64,
    /// Longitude in units of 10^-precision degrees.
    pub lon_key: i64,
}

impl Bucket {
    /// Bucket center expressed in grid units, which is how locations are stored.
    pub fn grid_units(&self) -> (i64, i64) {
        let scale = pow10(MAX_PRECISION - self.precision);
        (self.lat_key * scale, self.lon_key * scale)
    }

    pub fn latitude(&self) -> f64 {
        self.lat_key as f64 / pow10(self.precision) as f64
    }

    pub fn longitude(&self) -> f64 {
        self.lon_key as f64 / pow10(self.precision) as f64
    }

    /// Inclusive ranges of grid units whose normalization at this bucket's
    /// precision lands in this bucket.
    pub fn grid_span(&self) -> (RangeInclusive<i64>, RangeInclusive<i64>) {
        (
            key_span(self.lat_key, self.precision),
            key_span(self.lon_key, self.precision),
        )
    }

    /// Re-rounds this bucket to a coarser precision.
    pub fn coarsen(&self, precision: u8) -> StreamResult<Bucket> {
        if precision > self.precision {
            return Err(StreamError::InvalidPrecision(precision));
        }
        Ok(Bucket {
            precision,
            lat_key: round_digits(self.lat_key, self.precision - precision),
            lon_key: round_digits(self.lon_key, self.precision - precision),
        })
    }
}

pub fn validate_coordinate(latitude: f64, longitude: f64) -> StreamResult<()> {
    let reason = if !latitude.is_finite() || !longitude.is_finite() {
        Some("coordinates must be finite")
    } else if !(-90.0..=90.0).contains(&latitude) {
        Some("latitude out of range")
    } else if !(-180.0..=180.0).contains(&longitude) {
        Some("longitude out of range")
    } else {
        None
    };
    match reason {
        Some(reason) => Err(StreamError::InvalidCoordinate {
            latitude,
            longitude,
            reason,
        }),
        None => Ok(()),
    }
}

pub fn validate_precision(precision: u8) -> StreamResult<()> {
    if precision > MAX_PRECISION {
        return Err(StreamError::InvalidPrecision(precision));
    }
    Ok(())
}

pub fn normalize(latitude: f64, longitude: f64, precision: u8) -> StreamResult<Bucket> {
    validate_coordinate(latitude, longitude)?;
    validate_precision(precision)?;
    Ok(Bucket {
        precision,
        lat_key: round_digits(to_grid_units(latitude), MAX_PRECISION - precision),
        lon_key: round_digits(to_grid_units(longitude), MAX_PRECISION - precision),
    })
}

/// Converts degrees to grid units through the shortest decimal representation of
/// the value, so that `14.5918` is treated as exactly `14.5918`.
fn to_grid_units(degrees: f64) -> i64 {
    // f64 Display never uses exponent notation
    let text = format!("{}", degrees.abs());
    let (int_part, frac_part) = text.split_once('.').unwrap_or((text.as_str(), ""));
    let int_value: i64 = int_part.parse().unwrap_or(0);

    let mut units = int_value * GRID_SCALE;
    let mut frac_digits = frac_part.bytes().map(|b| (b - b'0') as i64);
    let mut scale = GRID_SCALE / 10;
    for _ in 0..MAX_PRECISION {
        units += frac_digits.next().unwrap_or(0) * scale;
        scale /= 10;
    }
    if frac_digits.next().unwrap_or(0) >= 5 {
        units += 1;
    }

    if degrees.is_sign_negative() {
        -units
    } else {
        units
    }
}

fn round_half_away(value: i64) -> i64 {
    let (quotient, remainder) = (value / 10, value % 10);
    if remainder >= 5 {
        quotient + 1
    } else if remainder <= -5 {
        quotient - 1
    } else {
        quotient
    }
}

fn round_digits(mut value: i64, digits: u8) -> i64 {
    for _ in 0..digits {
        value = round_half_away(value);
    }
    value
}

fn key_span(key: i64, precision: u8) -> RangeInclusive<i64> {
    let (mut lo, mut hi) = (key, key);
    for _ in precision..MAX_PRECISION {
        lo = if lo > 0 { lo * 10 - 5 } else { lo * 10 - 4 };
        hi = if hi < 0 { hi * 10 + 5 } else { hi * 10 + 4 };
    }
    lo..=hi
}

fn pow10(exp: u8) -> i64 {
    10_i64.pow(exp as u32)
}

/// Closed latitude/longitude box, in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

impl BoundingBox {
    /// Boxes covering ±`radius_m` around a point. Latitude is clamped at the
    /// poles; a box crossing the antimeridian is split in two.
    pub fn around(latitude: f64, longitude: f64, radius_m: f64) -> StreamResult<Vec<BoundingBox>> {
        validate_coordinate(latitude, longitude)?;
        let lat_delta = radius_m / METERS_PER_DEGREE;
        let min_lat = (latitude - lat_delta).max(-90.0);
        let max_lat = (latitude + lat_delta).min(90.0);

        let cos_lat = latitude.to_radians().cos();
        let lon_delta = if cos_lat <= f64::EPSILON {
            f64::INFINITY
        } else {
            radius_m / (METERS_PER_DEGREE * cos_lat)
        };

        if lon_delta >= 180.0 {
            return Ok(vec![BoundingBox {
                min_lat,
                max_lat,
                min_lon: -180.0,
                max_lon: 180.0,
            }]);
        }

        let min_lon = longitude - lon_delta;
        let max_lon = longitude + lon_delta;
        let boxes = if min_lon < -180.0 {
            vec![
                BoundingBox { min_lat, max_lat, min_lon: -180.0, max_lon },
                BoundingBox { min_lat, max_lat, min_lon: min_lon + 360.0, max_lon: 180.0 },
            ]
        } else if max_lon > 180.0 {
            vec![
                BoundingBox { min_lat, max_lat, min_lon, max_lon: 180.0 },
                BoundingBox { min_lat, max_lat, min_lon: -180.0, max_lon: max_lon - 360.0 },
            ]
        } else {
            vec![BoundingBox { min_lat, max_lat, min_lon, max_lon }]
        };
        Ok(boxes)
    }

    /// The box expressed as inclusive grid unit ranges.
    pub fn grid_ranges(&self) -> (RangeInclusive<i64>, RangeInclusive<i64>) {
        let scale = GRID_SCALE as f64;
        (
            (self.min_lat * scale).ceil() as i64..=(self.max_lat * scale).floor() as i64,
            (self.min_lon * scale).ceil() as i64..=(self.max_lon * scale).floor() as i64,
        )
    }
}

/// Great-circle distance in meters.
pub fn haversine_m(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    Haversine::distance(Point::new(lon1, lat1), Point::new(lon2, lat2))
}
