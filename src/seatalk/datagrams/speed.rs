//! Speed through water (0x20, 0x26), speed over ground (0x52) and the
//! mileage/speed display unit selector (0x24).

use super::{u16_le, u16_le_bytes};
use crate::error::SeatalkError;

/// `20 01 XX XX` — speed through water, `XXXX/10` knots.
#[derive(Debug, Clone, PartialEq)]
pub struct Speed1 {
    pub stw_knots: f64,
}

impl Speed1 {
    pub(super) fn parse(data: &[u8]) -> Self {
        Self { stw_knots: f64::from(u16_le(data)) / 10.0 }
    }

    pub(super) fn emit(&self) -> Vec<u8> {
        u16_le_bytes((self.stw_knots * 10.0).round() as u16).to_vec()
    }
}

/// `26 04 XX XX YY YY DE` — speed through water from the newer log sensors,
/// `XXXX/100` knots.  The average-speed pair and the D/E flags are not
/// interpreted and emit as zero.
#[derive(Debug, Clone, PartialEq)]
pub struct Speed2 {
    pub stw_knots: f64,
}

impl Speed2 {
    pub(super) fn parse(data: &[u8]) -> Self {
        Self { stw_knots: f64::from(u16_le(data)) / 100.0 }
    }

    pub(super) fn emit(&self) -> Vec<u8> {
        let mut payload = u16_le_bytes((self.stw_knots * 100.0).round() as u16).to_vec();
        payload.extend_from_slice(&[0x00, 0x00, 0x00]);
        payload
    }
}

/// `52 01 XX XX` — speed over ground, `XXXX/10` knots.
#[derive(Debug, Clone, PartialEq)]
pub struct SpeedOverGround {
    pub sog_knots: f64,
}

impl SpeedOverGround {
    pub(super) fn parse(data: &[u8]) -> Self {
        Self { sog_knots: f64::from(u16_le(data)) / 10.0 }
    }

    pub(super) fn emit(&self) -> Vec<u8> {
        u16_le_bytes((self.sog_knots * 10.0).round() as u16).to_vec()
    }
}

/// `24 02 00 00 XX` — display units for mileage and speed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayUnit {
    Knots,
    Mph,
    Kmh,
}

impl DisplayUnit {
    pub(super) fn parse(data: &[u8]) -> Result<Self, SeatalkError> {
        match data {
            [0x00, 0x00, 0x00] => Ok(DisplayUnit::Knots),
            [0x00, 0x00, 0x06] => Ok(DisplayUnit::Mph),
            [0x00, 0x00, 0x86] => Ok(DisplayUnit::Kmh),
            other => Err(SeatalkError::validation(
                0x24,
                format!("unknown display unit bytes {other:02X?}"),
            )),
        }
    }

    pub(super) fn emit(&self) -> Vec<u8> {
        let last = match self {
            DisplayUnit::Knots => 0x00,
            DisplayUnit::Mph => 0x06,
            DisplayUnit::Kmh => 0x86,
        };
        vec![0x00, 0x00, last]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn speed1_tenth_knot_resolution() {
        let s = Speed1::parse(&[0x3F, 0x00]);
        assert!((s.stw_knots - 6.3).abs() < 1e-9);
        assert_eq!(s.emit(), vec![0x3F, 0x00]);
    }

    #[test]
    fn speed2_hundredth_knot_resolution() {
        let s = Speed2::parse(&[0x7A, 0x02, 0x00, 0x00, 0x00]);
        assert!((s.stw_knots - 6.34).abs() < 1e-9);
        assert_eq!(s.emit(), vec![0x7A, 0x02, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn display_unit_rejects_garbage() {
        assert!(DisplayUnit::parse(&[0x00, 0x00, 0x07]).is_err());
        assert_eq!(DisplayUnit::parse(&[0x00, 0x00, 0x86]).unwrap(), DisplayUnit::Kmh);
    }
}
