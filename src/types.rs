//! Geographic position types and unit conversions shared by both codecs.

use std::fmt;

use crate::error::NmeaError;

// ── Hemispheres ───────────────────────────────────────────────────────────────

/// One compass hemisphere letter as used on the NMEA wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    North,
    South,
    East,
    West,
}

impl Orientation {
    pub fn letter(self) -> char {
        match self {
            Orientation::North => 'N',
            Orientation::South => 'S',
            Orientation::East => 'E',
            Orientation::West => 'W',
        }
    }

    pub fn from_letter(s: &str) -> Result<Self, NmeaError> {
        match s {
            "N" => Ok(Orientation::North),
            "S" => Ok(Orientation::South),
            "E" => Ok(Orientation::East),
            "W" => Ok(Orientation::West),
            other => Err(NmeaError::FieldParse(format!("bad hemisphere {other:?}"))),
        }
    }
}

impl fmt::Display for Orientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.letter())
    }
}

// ── Positions ─────────────────────────────────────────────────────────────────

/// One axis of a geographic position: whole degrees plus decimal minutes and
/// the hemisphere.  Minutes stay in [0, 60).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PartPosition {
    pub degrees:   u16,
    pub minutes:   f64,
    pub direction: Orientation,
}

impl PartPosition {
    pub fn new(degrees: u16, minutes: f64, direction: Orientation) -> Self {
        Self { degrees, minutes, direction }
    }

    /// Signed decimal degrees (south / west negative).
    pub fn to_degrees(&self) -> f64 {
        let unsigned = f64::from(self.degrees) + self.minutes / 60.0;
        match self.direction {
            Orientation::South | Orientation::West => -unsigned,
            _ => unsigned,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position {
    pub latitude:  PartPosition,
    pub longitude: PartPosition,
}

impl Position {
    pub fn new(latitude: PartPosition, longitude: PartPosition) -> Self {
        Self { latitude, longitude }
    }

    /// Great-circle distance between two positions in kilometers (haversine).
    #[allow(dead_code)]
    pub fn distance_km(&self, other: &Position) -> f64 {
        let p = std::f64::consts::PI / 180.0;
        let lat1 = self.latitude.to_degrees();
        let lat2 = other.latitude.to_degrees();
        let lon1 = self.longitude.to_degrees();
        let lon2 = other.longitude.to_degrees();

        let a = 0.5 - ((lat2 - lat1) * p).cos() / 2.0
            + (lat1 * p).cos() * (lat2 * p).cos() * (1.0 - ((lon2 - lon1) * p).cos()) / 2.0;
        12742.0 * a.sqrt().asin()
    }
}

// ── Unit conversions ──────────────────────────────────────────────────────────

pub mod units {
    pub const FEET_PER_METER: f64 = 3.28084;
    pub const FATHOMS_PER_METER: f64 = 0.54680665;
    pub const METERS_PER_NM: f64 = 1852.0;

    pub fn meter_to_feet(m: f64) -> f64 {
        m * FEET_PER_METER
    }

    pub fn feet_to_meter(ft: f64) -> f64 {
        ft / FEET_PER_METER
    }

    pub fn meter_to_fathom(m: f64) -> f64 {
        m * FATHOMS_PER_METER
    }

    pub fn fathom_to_meter(fa: f64) -> f64 {
        fa / FATHOMS_PER_METER
    }

    pub fn meter_to_nm(m: f64) -> f64 {
        m / METERS_PER_NM
    }

    pub fn nm_to_meter(nm: f64) -> f64 {
        nm * METERS_PER_NM
    }

    /// Meters per second to knots.
    pub fn mps_to_knots(mps: f64) -> f64 {
        meter_to_nm(mps * 3600.0)
    }

    /// Kilometers per hour to knots.
    pub fn kmh_to_knots(kmh: f64) -> f64 {
        meter_to_nm(kmh * 1000.0)
    }

    pub fn celsius_to_fahrenheit(c: f64) -> f64 {
        c * 1.8 + 32.0
    }
}
