//! Depth below transducer (0x00) and the fathom display-unit switch (0x65).

use super::{u16_le, u16_le_bytes};
use crate::error::SeatalkError;

/// `00 02 YZ XX XX` — depth below transducer `XXXX/10` feet.
///
/// `Y` flags: 0x8 anchor alarm, 0x4 metric display (fathoms when followed by
/// command 0x65), 0x2 used with unknown meaning.  `Z` flags: 0x4 transducer
/// defective, 0x2 deep alarm, 0x1 shallow alarm.
#[derive(Debug, Clone, PartialEq)]
pub struct Depth {
    pub depth_feet:           f64,
    pub anchor_alarm_active:  bool,
    pub metric_display_units: bool,
    /// Bit 0x20 of the flag byte; meaning undocumented, preserved verbatim.
    pub unknown_flag:          bool,
    pub transducer_defective:  bool,
    pub depth_alarm_active:    bool,
    pub shallow_alarm_active:  bool,
}

impl Depth {
    pub fn from_meters(depth_m: f64) -> Self {
        Self {
            depth_feet: crate::types::units::meter_to_feet(depth_m),
            anchor_alarm_active: false,
            metric_display_units: false,
            unknown_flag: false,
            transducer_defective: false,
            depth_alarm_active: false,
            shallow_alarm_active: false,
        }
    }

    pub fn depth_m(&self) -> f64 {
        crate::types::units::feet_to_meter(self.depth_feet)
    }

    pub(super) fn parse(data: &[u8]) -> Self {
        let flags = data[0];
        Self {
            depth_feet: f64::from(u16_le(&data[1..])) / 10.0,
            anchor_alarm_active: flags & 0x80 != 0,
            metric_display_units: flags & 0x40 != 0,
            unknown_flag: flags & 0x20 != 0,
            transducer_defective: flags & 0x04 != 0,
            depth_alarm_active: flags & 0x02 != 0,
            shallow_alarm_active: flags & 0x01 != 0,
        }
    }

    pub(super) fn emit(&self) -> (u8, Vec<u8>) {
        let mut flags = 0u8;
        if self.anchor_alarm_active {
            flags |= 0x80;
        }
        if self.metric_display_units {
            flags |= 0x40;
        }
        if self.unknown_flag {
            flags |= 0x20;
        }
        if self.transducer_defective {
            flags |= 0x04;
        }
        if self.depth_alarm_active {
            flags |= 0x02;
        }
        if self.shallow_alarm_active {
            flags |= 0x01;
        }
        let raw = (self.depth_feet * 10.0).round() as u16;
        let mut payload = vec![flags];
        payload.extend_from_slice(&u16_le_bytes(raw));
        (0, payload)
    }
}

/// `65 00 02` — select fathom display units for command 0x00.
pub(super) fn parse_select_fathom(data: &[u8]) -> Result<(), SeatalkError> {
    if data[0] != 0x02 {
        return Err(SeatalkError::validation(
            0x65,
            format!("expected byte 02, got {:02X}", data[0]),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_depth_wire_example() {
        // 00 02 00 DB 02 -> 0x02DB = 731 -> 73.1 ft -> 22.28 m
        let depth = Depth::parse(&[0x00, 0xDB, 0x02]);
        assert!((depth.depth_feet - 73.1).abs() < 1e-9);
        assert!((depth.depth_m() - 22.28).abs() < 0.01);
        assert!(!depth.anchor_alarm_active);
    }

    #[test]
    fn flag_bits_round_trip() {
        let depth = Depth {
            depth_feet: 12.0,
            anchor_alarm_active: true,
            metric_display_units: false,
            unknown_flag: true,
            transducer_defective: false,
            depth_alarm_active: true,
            shallow_alarm_active: false,
        };
        let (fh, payload) = depth.emit();
        assert_eq!(fh, 0);
        assert_eq!(payload[0], 0x80 | 0x20 | 0x02);
        assert_eq!(Depth::parse(&payload), depth);
    }

    #[test]
    fn select_fathom_validates_payload() {
        assert!(parse_select_fathom(&[0x02]).is_ok());
        assert!(parse_select_fathom(&[0x03]).is_err());
    }
}
