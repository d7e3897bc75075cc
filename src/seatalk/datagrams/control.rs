//! Display and autopilot control datagrams: lamp intensity (0x30/0x80),
//! keystrokes (0x55/0x86), response level (0x87), rudder gain (0x91),
//! AP setup (0x93) and the course computer setup markers (0x81).

use crate::error::SeatalkError;

// ── Lamp intensity ────────────────────────────────────────────────────────────

/// `30 00 0X` / `80 00 0X` — lamp intensity 0..3 mapped onto {0, 4, 8, 12}.
pub(super) fn parse_lamp_intensity(cmd: u8, data: &[u8]) -> Result<u8, SeatalkError> {
    match data[0] {
        0x00 => Ok(0),
        0x04 => Ok(1),
        0x08 => Ok(2),
        0x0C => Ok(3),
        other => Err(SeatalkError::validation(cmd, format!("unexpected intensity {other:02X}"))),
    }
}

pub(super) fn emit_lamp_intensity(level: u8) -> Vec<u8> {
    vec![match level {
        0 => 0x00,
        1 => 0x04,
        2 => 0x08,
        _ => 0x0C,
    }]
}

// ── Keystrokes ────────────────────────────────────────────────────────────────

/// Key codes shared by the 0x55 and 0x86 keystroke datagrams.  Each key is a
/// two-byte code where the second byte is normally the ones-complement of the
/// first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Auto,
    Standby,
    Track,
    Display,
    Minus1,
    Minus10,
    Plus1,
    Plus10,
    Minus1Resp,
    Plus1Resp,
    Plus1Minus1,
    Minus1Minus10,
    Plus1Plus10,
    StandbyAuto,
    Plus10Minus10,
    Plus1Minus1Resp,
    AutoHeld,
    StandbyHeld,
    TrackHeld,
    DisplayHeld,
    Minus1Held,
    Minus10Held,
    Plus1Held,
    Plus10Held,
    Plus1Minus1Held,
    Minus1Minus10Held,
    Plus1Plus10Held,
    Plus10Minus10Held,
    StandbyAutoHeld,
    Plus1Minus1RudderGain,
    Minus1Repeat,
    Plus1Repeat,
    Minus10Repeat,
    Plus10Repeat,
    Released,
}

/// (first byte, second byte, key) — second bytes follow the bus reference,
/// complement or not.
const KEY_TABLE: &[(u8, u8, Key)] = &[
    (0x01, 0xFE, Key::Auto),
    (0x02, 0xFD, Key::Standby),
    (0x03, 0xFC, Key::Track),
    (0x04, 0xFB, Key::Display),
    (0x05, 0xFA, Key::Minus1),
    (0x06, 0xF9, Key::Minus10),
    (0x07, 0xF8, Key::Plus1),
    (0x08, 0xF7, Key::Plus10),
    (0x09, 0xF6, Key::Minus1Resp),
    (0x0A, 0xF5, Key::Plus1Resp),
    (0x20, 0xDF, Key::Plus1Minus1),
    (0x21, 0xDE, Key::Minus1Minus10),
    (0x22, 0xDD, Key::Plus1Plus10),
    (0x23, 0xDC, Key::StandbyAuto),
    (0x28, 0xD7, Key::Plus10Minus10),
    (0x2E, 0xD1, Key::Plus1Minus1Resp),
    (0x41, 0xBE, Key::AutoHeld),
    (0x42, 0xBD, Key::StandbyHeld),
    (0x43, 0xBC, Key::TrackHeld),
    (0x44, 0xBB, Key::DisplayHeld),
    (0x45, 0xBA, Key::Minus1Held),
    (0x46, 0xB9, Key::Minus10Held),
    (0x47, 0xB8, Key::Plus1Held),
    (0x48, 0xB7, Key::Plus10Held),
    (0x60, 0xDF, Key::Plus1Minus1Held),
    (0x61, 0x9E, Key::Minus1Minus10Held),
    (0x62, 0x9D, Key::Plus1Plus10Held),
    (0x63, 0x9C, Key::StandbyAutoHeld),
    (0x68, 0x97, Key::Plus10Minus10Held),
    (0x6E, 0x91, Key::Plus1Minus1RudderGain),
    (0x80, 0x7F, Key::Minus1Repeat),
    (0x81, 0x7E, Key::Plus1Repeat),
    (0x82, 0x7D, Key::Minus10Repeat),
    (0x83, 0x7C, Key::Plus10Repeat),
    (0x84, 0x7B, Key::Released),
];

/// `55 X1 YY yy` / `86 X1 YY yy` — keystroke.  `X` identifies the sender
/// (1 = Z101 remote, 0 = ST1000+, 2 = ST4000+/ST600R).
#[derive(Debug, Clone, PartialEq)]
pub struct Keystroke {
    pub key: Key,
    pub increment_decrement: u8,
}

impl Keystroke {
    pub(super) fn parse(cmd: u8, first_half: u8, data: &[u8]) -> Result<Self, SeatalkError> {
        let key = KEY_TABLE
            .iter()
            .find(|(a, b, _)| *a == data[0] && *b == data[1])
            .map(|(_, _, key)| *key)
            .ok_or_else(|| {
                SeatalkError::validation(cmd, format!("unknown key code {:02X?}", &data[..2]))
            })?;
        Ok(Self { key, increment_decrement: first_half })
    }

    pub(super) fn emit(&self) -> (u8, Vec<u8>) {
        let (a, b, _) = KEY_TABLE.iter().find(|(_, _, key)| *key == self.key).unwrap();
        (self.increment_decrement, vec![*a, *b])
    }
}

// ── Autopilot configuration ───────────────────────────────────────────────────

/// `87 00 0X` — set response level: 1 automatic deadband, 2 minimum deadband.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseLevel {
    Automatic,
    Minimum,
}

impl ResponseLevel {
    pub(super) fn parse(data: &[u8]) -> Result<Self, SeatalkError> {
        match data[0] {
            0x1 => Ok(ResponseLevel::Automatic),
            0x2 => Ok(ResponseLevel::Minimum),
            other => {
                Err(SeatalkError::validation(0x87, format!("unknown response level {other:X}")))
            }
        }
    }

    pub(super) fn emit(&self) -> Vec<u8> {
        vec![match self {
            ResponseLevel::Automatic => 0x1,
            ResponseLevel::Minimum => 0x2,
        }]
    }
}

/// `81 01 00 00` during setup, `81 00 00` immediately after: the length
/// nibble is the only payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CourseComputerSetup {
    SetupFinished,
    Setup,
}

impl CourseComputerSetup {
    pub(super) fn parse(first_half: u8, data: &[u8]) -> Result<Self, SeatalkError> {
        super::expect_zero(0x81, first_half, data)?;
        match data.len() {
            1 => Ok(CourseComputerSetup::SetupFinished),
            _ => Ok(CourseComputerSetup::Setup),
        }
    }

    pub(super) fn emit(&self) -> Vec<u8> {
        match self {
            CourseComputerSetup::SetupFinished => vec![0x00],
            CourseComputerSetup::Setup => vec![0x00, 0x00],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lamp_intensity_map() {
        assert_eq!(parse_lamp_intensity(0x30, &[0x0C]).unwrap(), 3);
        assert_eq!(emit_lamp_intensity(3), vec![0x0C]);
        assert!(parse_lamp_intensity(0x30, &[0x05]).is_err());
    }

    #[test]
    fn keystroke_lookup_both_directions() {
        let stroke = Keystroke::parse(0x55, 0x1, &[0x05, 0xFA]).unwrap();
        assert_eq!(stroke.key, Key::Minus1);
        assert_eq!(stroke.increment_decrement, 0x1);
        assert_eq!(stroke.emit(), (0x1, vec![0x05, 0xFA]));
    }

    #[test]
    fn keystroke_rejects_unknown_code() {
        assert!(Keystroke::parse(0x55, 0x1, &[0x99, 0x66]).is_err());
    }

    #[test]
    fn course_computer_setup_by_length() {
        assert_eq!(
            CourseComputerSetup::parse(0, &[0x00, 0x00]).unwrap(),
            CourseComputerSetup::Setup
        );
        assert_eq!(
            CourseComputerSetup::parse(0, &[0x00]).unwrap(),
            CourseComputerSetup::SetupFinished
        );
        assert!(CourseComputerSetup::parse(0, &[0x01]).is_err());
    }
}
