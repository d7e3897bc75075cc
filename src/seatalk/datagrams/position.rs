//! Filtered per-axis positions (0x50, 0x51), the raw combined position
//! (0x58) and the target waypoint name (0x82).

use super::{u16_le, u16_le_bytes};
use crate::error::SeatalkError;
use crate::types::{Orientation, PartPosition, Position};

/// Waypoint name that Raymarine gear sends ahead of a man-overboard event.
const MOB_WAYPOINT_NAME: &str = "0999";

fn parse_axis(data: &[u8], set: Orientation, cleared: Orientation) -> PartPosition {
    let degrees = u16::from(data[0]);
    let raw = u16_le(&data[1..]);
    let minutes = f64::from(raw & 0x7FFF) / 100.0;
    let direction = if raw & 0x8000 != 0 { set } else { cleared };
    PartPosition::new(degrees, minutes, direction)
}

fn emit_axis(position: &PartPosition, set: Orientation) -> Vec<u8> {
    let mut raw = (position.minutes * 100.0).round() as u16;
    if position.direction == set {
        raw |= 0x8000;
    }
    let mut payload = vec![position.degrees as u8];
    payload.extend_from_slice(&u16_le_bytes(raw));
    payload
}

/// `50 Z2 XX YY YY` — latitude: `XX` degrees, `(YYYY & 0x7FFF)/100` minutes,
/// bit 0x8000 set for South.  Stable filtered value; raw data is on 0x58.
#[derive(Debug, Clone, PartialEq)]
pub struct LatitudePosition {
    pub position: PartPosition,
}

impl LatitudePosition {
    pub(super) fn parse(data: &[u8]) -> Self {
        Self { position: parse_axis(data, Orientation::South, Orientation::North) }
    }

    pub(super) fn emit(&self) -> Vec<u8> {
        emit_axis(&self.position, Orientation::South)
    }
}

/// `51 Z2 XX YY YY` — longitude, bit 0x8000 set for East.
#[derive(Debug, Clone, PartialEq)]
pub struct LongitudePosition {
    pub position: PartPosition,
}

impl LongitudePosition {
    pub(super) fn parse(data: &[u8]) -> Self {
        Self { position: parse_axis(data, Orientation::East, Orientation::West) }
    }

    pub(super) fn emit(&self) -> Vec<u8> {
        emit_axis(&self.position, Orientation::East)
    }
}

/// `58 Z5 LA XX YY LO QQ RR` — raw unfiltered position.  Minutes are
/// big-endian thousandths; hemisphere flags live in the first-half byte
/// (bit 0 South, bit 1 East).
#[derive(Debug, Clone, PartialEq)]
pub struct RawPosition {
    pub position: Position,
}

impl RawPosition {
    pub(super) fn parse(first_half: u8, data: &[u8]) -> Self {
        let latitude = PartPosition::new(
            u16::from(data[0]),
            f64::from(u16::from(data[1]) << 8 | u16::from(data[2])) / 1000.0,
            if first_half & 0x1 != 0 { Orientation::South } else { Orientation::North },
        );
        let longitude = PartPosition::new(
            u16::from(data[3]),
            f64::from(u16::from(data[4]) << 8 | u16::from(data[5])) / 1000.0,
            if first_half & 0x2 != 0 { Orientation::East } else { Orientation::West },
        );
        Self { position: Position::new(latitude, longitude) }
    }

    pub(super) fn emit(&self) -> (u8, Vec<u8>) {
        let mut first_half = 0u8;
        if self.position.latitude.direction == Orientation::South {
            first_half |= 0x1;
        }
        if self.position.longitude.direction == Orientation::East {
            first_half |= 0x2;
        }
        let lat_raw = (self.position.latitude.minutes * 1000.0).round() as u16;
        let lon_raw = (self.position.longitude.minutes * 1000.0).round() as u16;
        let payload = vec![
            self.position.latitude.degrees as u8,
            (lat_raw >> 8) as u8,
            (lat_raw & 0xFF) as u8,
            self.position.longitude.degrees as u8,
            (lon_raw >> 8) as u8,
            (lon_raw & 0xFF) as u8,
        ];
        (first_half, payload)
    }
}

/// `82 05 XX xx YY yy ZZ zz` — last four characters of the target waypoint
/// name, packed six bits per character with an offset of 0x30.  Each byte
/// pair must sum to 0xFF, which is all the error detection this datagram has.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetWaypoint {
    pub name: String,
}

impl TargetWaypoint {
    pub fn new(name: &str) -> Result<Self, SeatalkError> {
        if name.len() != 4 || !name.bytes().all(|b| (0x30..0x70).contains(&b)) {
            return Err(SeatalkError::validation(
                0x82,
                format!("waypoint name {name:?} not encodable"),
            ));
        }
        Ok(Self { name: name.to_string() })
    }

    /// The special name announcing a man-overboard waypoint.  Exposed as a
    /// flag only; no behavior is attached.
    #[allow(dead_code)]
    pub fn is_mob(&self) -> bool {
        self.name == MOB_WAYPOINT_NAME
    }

    pub(super) fn parse(data: &[u8]) -> Result<Self, SeatalkError> {
        for pair in data.chunks_exact(2) {
            if u16::from(pair[0]) + u16::from(pair[1]) != 0xFF {
                return Err(SeatalkError::validation(
                    0x82,
                    format!("redundancy check failed on pair {pair:02X?}"),
                ));
            }
        }
        let chars = [
            0x30 + (data[0] & 0x3F),
            0x30 + ((data[2] & 0x0F) << 2 | (data[0] & 0xC0) >> 6),
            0x30 + ((data[4] & 0x03) << 4 | (data[2] & 0xF0) >> 4),
            0x30 + ((data[4] & 0xFC) >> 2),
        ];
        Ok(Self { name: chars.iter().map(|&c| char::from(c)).collect() })
    }

    pub(super) fn emit(&self) -> Vec<u8> {
        let c: Vec<u8> = self.name.bytes().map(|b| b - 0x30).collect();
        let x = (c[0] & 0x3F) | (c[1] & 0x03) << 6;
        let y = c[1] >> 2 | (c[2] & 0x0F) << 4;
        let z = (c[2] & 0x3C) >> 4 | c[3] << 2;
        vec![x, 0xFF - x, y, 0xFF - y, z, 0xFF - z]
    }
}
