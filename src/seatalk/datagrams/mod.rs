//! Seatalk datagram catalogue.
//!
//! Each bus message is `<cmd> <attr> <data…>` where the low nibble of `attr`
//! is the payload length minus one and the high nibble (the "first half
//! byte") carries command-specific bits.  There is no checksum; length and
//! value validation is the only corruption detection.
//!
//! The catalogue is a static table from command byte to declared length and
//! parser, and one sum type over every supported record.

mod alarm;
mod control;
mod course;
mod depth;
mod equipment;
mod mileage;
mod misc;
mod position;
mod speed;
mod temperature;
mod time;
mod wind;

pub use alarm::{AcknowledgedAlarm, AlarmAck};
pub use control::{CourseComputerSetup, Key, Keystroke, ResponseLevel};
pub use course::{CompassVariation, CourseOverGround};
pub use depth::Depth;
pub use equipment::{DeviceId1, DeviceId2, DeviceUnit, Equipment1, Equipment2};
pub use misc::{CodeLock, SatInfo};
pub use mileage::{TotalMileage, TotalTripLog, TripMileage};
pub use position::{LatitudePosition, LongitudePosition, RawPosition, TargetWaypoint};
pub use speed::{DisplayUnit, Speed1, Speed2, SpeedOverGround};
pub use temperature::{WaterTemperature1, WaterTemperature2};
pub use time::{CountdownTimer, CounterMode, Date, GmtTime};
pub use wind::{AlarmFlags, ApparentWindAngle, ApparentWindSpeed, WindAlarm};

use crate::error::SeatalkError;

// ── Byte helpers ──────────────────────────────────────────────────────────────

/// Two payload bytes as a little-endian value.
pub(crate) fn u16_le(data: &[u8]) -> u16 {
    u16::from(data[1]) << 8 | u16::from(data[0])
}

pub(crate) fn u16_le_bytes(value: u16) -> [u8; 2] {
    [(value & 0xFF) as u8, (value >> 8) as u8]
}

/// Validation for commands whose first-half byte and payload must be zero.
fn expect_zero(cmd: u8, first_half: u8, data: &[u8]) -> Result<(), SeatalkError> {
    if first_half != 0 || data.iter().any(|&b| b != 0) {
        return Err(SeatalkError::validation(
            cmd,
            format!("not all bytes are zero: fh={first_half:X} data={data:02X?}"),
        ));
    }
    Ok(())
}

// ── Declared lengths ──────────────────────────────────────────────────────────

/// Declared value(s) of the length nibble for one command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LengthSpec {
    Fixed(u8),
    /// Commands that legitimately appear with more than one length nibble.
    AnyOf(&'static [u8]),
}

impl LengthSpec {
    pub fn verify(&self, cmd: u8, actual: u8) -> Result<(), SeatalkError> {
        match self {
            LengthSpec::Fixed(expected) => {
                if actual < *expected {
                    Err(SeatalkError::NotEnoughData {
                        cmd,
                        expected: usize::from(*expected),
                        actual:   usize::from(actual),
                    })
                } else if actual > *expected {
                    Err(SeatalkError::TooMuchData {
                        cmd,
                        expected: usize::from(*expected),
                        actual:   usize::from(actual),
                    })
                } else {
                    Ok(())
                }
            }
            LengthSpec::AnyOf(valid) => {
                if valid.contains(&actual) {
                    Ok(())
                } else if actual < *valid.iter().min().unwrap() {
                    Err(SeatalkError::NotEnoughData {
                        cmd,
                        expected: usize::from(*valid.iter().min().unwrap()),
                        actual:   usize::from(actual),
                    })
                } else {
                    Err(SeatalkError::TooMuchData {
                        cmd,
                        expected: usize::from(*valid.iter().max().unwrap()),
                        actual:   usize::from(actual),
                    })
                }
            }
        }
    }
}

/// Declared length nibble for a known command byte.
pub fn declared_length(cmd: u8) -> Option<LengthSpec> {
    use LengthSpec::*;
    Some(match cmd {
        0x00 => Fixed(2),
        0x01 => Fixed(5),
        0x10 => Fixed(1),
        0x11 => Fixed(1),
        0x20 => Fixed(1),
        0x21 => Fixed(2),
        0x22 => Fixed(2),
        0x23 => Fixed(1),
        0x24 => Fixed(2),
        0x25 => Fixed(4),
        0x26 => Fixed(4),
        0x27 => Fixed(1),
        0x30 => Fixed(0),
        0x36 => Fixed(0),
        0x38 => Fixed(1),
        0x50 => Fixed(2),
        0x51 => Fixed(2),
        0x52 => Fixed(1),
        0x53 => Fixed(0),
        0x54 => Fixed(1),
        0x55 => Fixed(1),
        0x56 => Fixed(1),
        0x57 => Fixed(0),
        0x58 => Fixed(5),
        0x59 => Fixed(2),
        0x61 => Fixed(3),
        0x65 => Fixed(0),
        0x66 => Fixed(0),
        0x68 => Fixed(1),
        0x6C => Fixed(5),
        0x6E => Fixed(7),
        0x80 => Fixed(0),
        0x81 => AnyOf(&[1, 0]),
        0x82 => Fixed(5),
        0x86 => Fixed(1),
        0x87 => Fixed(0),
        0x90 => Fixed(0),
        0x91 => Fixed(0),
        0x93 => Fixed(0),
        0x99 => Fixed(0),
        // Broadcast/Answer use 2; Termination declares 6 but 4 is seen on
        // real buses and accepted.
        0xA4 => AnyOf(&[2, 4, 6]),
        _ => return None,
    })
}

// ── The sum type ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum Datagram {
    Depth(Depth),
    EquipmentId1(Equipment1),
    ApparentWindAngle(ApparentWindAngle),
    ApparentWindSpeed(ApparentWindSpeed),
    Speed1(Speed1),
    TripMileage(TripMileage),
    TotalMileage(TotalMileage),
    WaterTemperature1(WaterTemperature1),
    DisplayUnits(DisplayUnit),
    TotalTripLog(TotalTripLog),
    Speed2(Speed2),
    WaterTemperature2(WaterTemperature2),
    LampIntensity1(u8),
    CancelMob,
    CodeLock(CodeLock),
    LatitudePosition(LatitudePosition),
    LongitudePosition(LongitudePosition),
    SpeedOverGround(SpeedOverGround),
    CourseOverGround(CourseOverGround),
    GmtTime(GmtTime),
    Keystroke1(Keystroke),
    Date(Date),
    SatInfo(SatInfo),
    RawPosition(RawPosition),
    CountdownTimer(CountdownTimer),
    E80Init,
    SelectFathom,
    WindAlarm(WindAlarm),
    AlarmAck(AlarmAck),
    EquipmentId2(Equipment2),
    ManOverBoard,
    LampIntensity2(u8),
    CourseComputerSetup(CourseComputerSetup),
    TargetWaypoint(TargetWaypoint),
    Keystroke2(Keystroke),
    SetResponseLevel(ResponseLevel),
    DeviceId1(DeviceId1),
    SetRudderGain(u8),
    EnterApSetup,
    CompassVariation(CompassVariation),
    DeviceId2(DeviceId2),
}

impl Datagram {
    /// The command byte, used for dispatch and the own-echo set.
    pub fn command(&self) -> u8 {
        match self {
            Datagram::Depth(_) => 0x00,
            Datagram::EquipmentId1(_) => 0x01,
            Datagram::ApparentWindAngle(_) => 0x10,
            Datagram::ApparentWindSpeed(_) => 0x11,
            Datagram::Speed1(_) => 0x20,
            Datagram::TripMileage(_) => 0x21,
            Datagram::TotalMileage(_) => 0x22,
            Datagram::WaterTemperature1(_) => 0x23,
            Datagram::DisplayUnits(_) => 0x24,
            Datagram::TotalTripLog(_) => 0x25,
            Datagram::Speed2(_) => 0x26,
            Datagram::WaterTemperature2(_) => 0x27,
            Datagram::LampIntensity1(_) => 0x30,
            Datagram::CancelMob => 0x36,
            Datagram::CodeLock(_) => 0x38,
            Datagram::LatitudePosition(_) => 0x50,
            Datagram::LongitudePosition(_) => 0x51,
            Datagram::SpeedOverGround(_) => 0x52,
            Datagram::CourseOverGround(_) => 0x53,
            Datagram::GmtTime(_) => 0x54,
            Datagram::Keystroke1(_) => 0x55,
            Datagram::Date(_) => 0x56,
            Datagram::SatInfo(_) => 0x57,
            Datagram::RawPosition(_) => 0x58,
            Datagram::CountdownTimer(_) => 0x59,
            Datagram::E80Init => 0x61,
            Datagram::SelectFathom => 0x65,
            Datagram::WindAlarm(_) => 0x66,
            Datagram::AlarmAck(_) => 0x68,
            Datagram::EquipmentId2(_) => 0x6C,
            Datagram::ManOverBoard => 0x6E,
            Datagram::LampIntensity2(_) => 0x80,
            Datagram::CourseComputerSetup(_) => 0x81,
            Datagram::TargetWaypoint(_) => 0x82,
            Datagram::Keystroke2(_) => 0x86,
            Datagram::SetResponseLevel(_) => 0x87,
            Datagram::DeviceId1(_) => 0x90,
            Datagram::SetRudderGain(_) => 0x91,
            Datagram::EnterApSetup => 0x93,
            Datagram::CompassVariation(_) => 0x99,
            Datagram::DeviceId2(_) => 0xA4,
        }
    }

    /// Parse a framed datagram.  `data` holds `length + 1` payload bytes,
    /// with `length` already verified against [`declared_length`].
    pub fn parse(cmd: u8, first_half: u8, data: &[u8]) -> Result<Datagram, SeatalkError> {
        Ok(match cmd {
            0x00 => Datagram::Depth(Depth::parse(data)),
            0x01 => Datagram::EquipmentId1(Equipment1::parse(data)?),
            0x10 => Datagram::ApparentWindAngle(ApparentWindAngle::parse(data)),
            0x11 => Datagram::ApparentWindSpeed(ApparentWindSpeed::parse(data)?),
            0x20 => Datagram::Speed1(Speed1::parse(data)),
            0x21 => Datagram::TripMileage(TripMileage::parse(data)),
            0x22 => Datagram::TotalMileage(TotalMileage::parse(data)),
            0x23 => Datagram::WaterTemperature1(WaterTemperature1::parse(first_half, data)),
            0x24 => Datagram::DisplayUnits(DisplayUnit::parse(data)?),
            0x25 => Datagram::TotalTripLog(TotalTripLog::parse(first_half, data)),
            0x26 => Datagram::Speed2(Speed2::parse(data)),
            0x27 => Datagram::WaterTemperature2(WaterTemperature2::parse(data)),
            0x30 => Datagram::LampIntensity1(control::parse_lamp_intensity(0x30, data)?),
            0x36 => {
                alarm::parse_cancel_mob(data)?;
                Datagram::CancelMob
            }
            0x38 => Datagram::CodeLock(CodeLock::parse(first_half, data)),
            0x50 => Datagram::LatitudePosition(LatitudePosition::parse(data)),
            0x51 => Datagram::LongitudePosition(LongitudePosition::parse(data)),
            0x52 => Datagram::SpeedOverGround(SpeedOverGround::parse(data)),
            0x53 => Datagram::CourseOverGround(CourseOverGround::parse(first_half, data)),
            0x54 => Datagram::GmtTime(GmtTime::parse(first_half, data)?),
            0x55 => Datagram::Keystroke1(Keystroke::parse(0x55, first_half, data)?),
            0x56 => Datagram::Date(Date::parse(first_half, data)?),
            0x57 => Datagram::SatInfo(SatInfo::parse(first_half, data)),
            0x58 => Datagram::RawPosition(RawPosition::parse(first_half, data)),
            0x59 => Datagram::CountdownTimer(CountdownTimer::parse(first_half, data)?),
            0x61 => {
                equipment::parse_e80_init(first_half, data)?;
                Datagram::E80Init
            }
            0x65 => {
                depth::parse_select_fathom(data)?;
                Datagram::SelectFathom
            }
            0x66 => Datagram::WindAlarm(WindAlarm::parse(data)),
            0x68 => Datagram::AlarmAck(AlarmAck::parse(first_half)?),
            0x6C => Datagram::EquipmentId2(Equipment2::parse(data)?),
            0x6E => {
                // Raymarine units put junk in the payload; framing is enough.
                Datagram::ManOverBoard
            }
            0x80 => Datagram::LampIntensity2(control::parse_lamp_intensity(0x80, data)?),
            0x81 => Datagram::CourseComputerSetup(CourseComputerSetup::parse(first_half, data)?),
            0x82 => Datagram::TargetWaypoint(TargetWaypoint::parse(data)?),
            0x86 => Datagram::Keystroke2(Keystroke::parse(0x86, first_half, data)?),
            0x87 => Datagram::SetResponseLevel(ResponseLevel::parse(data)?),
            0x90 => Datagram::DeviceId1(DeviceId1::parse(data)?),
            0x91 => Datagram::SetRudderGain(data[0]),
            0x93 => {
                expect_zero(0x93, first_half, data)?;
                Datagram::EnterApSetup
            }
            0x99 => Datagram::CompassVariation(CompassVariation::parse(data)),
            0xA4 => Datagram::DeviceId2(DeviceId2::parse(first_half, data)?),
            other => return Err(SeatalkError::UnknownCommand(other)),
        })
    }

    /// Serialize to the wire: `[cmd, (first_half << 4) | length, payload…]`.
    pub fn to_wire(&self) -> Vec<u8> {
        let (first_half, payload) = match self {
            Datagram::Depth(d) => d.emit(),
            Datagram::EquipmentId1(e) => (0, e.emit()),
            Datagram::ApparentWindAngle(w) => (0, w.emit()),
            Datagram::ApparentWindSpeed(w) => (0, w.emit()),
            Datagram::Speed1(s) => (0, s.emit()),
            Datagram::TripMileage(m) => (0, m.emit()),
            Datagram::TotalMileage(m) => (0, m.emit()),
            Datagram::WaterTemperature1(t) => t.emit(),
            Datagram::DisplayUnits(u) => (0, u.emit()),
            Datagram::TotalTripLog(l) => l.emit(),
            Datagram::Speed2(s) => (0, s.emit()),
            Datagram::WaterTemperature2(t) => (0, t.emit()),
            Datagram::LampIntensity1(level) => (0, control::emit_lamp_intensity(*level)),
            Datagram::CancelMob => (0, vec![0x01]),
            Datagram::CodeLock(c) => c.emit(),
            Datagram::LatitudePosition(p) => (0, p.emit()),
            Datagram::LongitudePosition(p) => (0, p.emit()),
            Datagram::SpeedOverGround(s) => (0, s.emit()),
            Datagram::CourseOverGround(c) => c.emit(),
            Datagram::GmtTime(t) => t.emit(),
            Datagram::Keystroke1(k) => k.emit(),
            Datagram::Date(d) => d.emit(),
            Datagram::SatInfo(s) => s.emit(),
            Datagram::RawPosition(p) => p.emit(),
            Datagram::CountdownTimer(c) => c.emit(),
            Datagram::E80Init => (0, vec![0x03, 0x00, 0x00, 0x00]),
            Datagram::SelectFathom => (0, vec![0x02]),
            Datagram::WindAlarm(w) => (0, w.emit()),
            Datagram::AlarmAck(a) => a.emit(),
            Datagram::EquipmentId2(e) => (0, e.emit()),
            Datagram::ManOverBoard => (0, vec![0u8; 8]),
            Datagram::LampIntensity2(level) => (0, control::emit_lamp_intensity(*level)),
            Datagram::CourseComputerSetup(c) => (0, c.emit()),
            Datagram::TargetWaypoint(w) => (0, w.emit()),
            Datagram::Keystroke2(k) => k.emit(),
            Datagram::SetResponseLevel(r) => (0, r.emit()),
            Datagram::DeviceId1(d) => (0, d.emit()),
            Datagram::SetRudderGain(gain) => (0, vec![*gain]),
            Datagram::EnterApSetup => (0, vec![0x00]),
            Datagram::CompassVariation(v) => (0, v.emit()),
            Datagram::DeviceId2(d) => d.emit(),
        };
        debug_assert!(!payload.is_empty());
        let length = (payload.len() - 1) as u8;
        let mut wire = Vec::with_capacity(payload.len() + 2);
        wire.push(self.command());
        wire.push(first_half << 4 | length);
        wire.extend_from_slice(&payload);
        wire
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Orientation, PartPosition, Position};
    use chrono::{NaiveDate, NaiveTime};

    /// Frame `wire` the way the bus reader does and parse it back.
    fn reparse(wire: &[u8]) -> Datagram {
        let cmd = wire[0];
        let attr = wire[1];
        let length = attr & 0x0F;
        declared_length(cmd).unwrap().verify(cmd, length).unwrap();
        let data = &wire[2..];
        assert_eq!(data.len(), usize::from(length) + 1, "cmd {cmd:02X} length nibble");
        Datagram::parse(cmd, attr >> 4, data).unwrap()
    }

    fn fully_populated_catalogue() -> Vec<Datagram> {
        vec![
            Datagram::Depth(Depth {
                depth_feet: 73.1,
                anchor_alarm_active: false,
                metric_display_units: true,
                unknown_flag: true,
                transducer_defective: false,
                depth_alarm_active: false,
                shallow_alarm_active: true,
            }),
            Datagram::EquipmentId1(Equipment1::St60Tridata),
            Datagram::ApparentWindAngle(ApparentWindAngle { angle_degrees: 256.5 }),
            Datagram::ApparentWindSpeed(ApparentWindSpeed { speed_knots: 11.3 }),
            Datagram::Speed1(Speed1 { stw_knots: 6.3 }),
            Datagram::TripMileage(TripMileage { mileage_nm: 213.45 }),
            Datagram::TotalMileage(TotalMileage { mileage_nm: 1243.9 }),
            Datagram::WaterTemperature1(WaterTemperature1 {
                temperature_c: 17.0,
                sensor_defective: false,
            }),
            Datagram::DisplayUnits(DisplayUnit::Knots),
            Datagram::TotalTripLog(TotalTripLog { total_nm: 71234.5, trip_nm: 913.57 }),
            Datagram::Speed2(Speed2 { stw_knots: 6.34 }),
            Datagram::WaterTemperature2(WaterTemperature2 { temperature_c: 17.9 }),
            Datagram::LampIntensity1(2),
            Datagram::CancelMob,
            Datagram::CodeLock(CodeLock { x: 0x3, y: 0xAB, z: 0xCD }),
            Datagram::LatitudePosition(LatitudePosition {
                position: PartPosition::new(52, 35.31, Orientation::North),
            }),
            Datagram::LongitudePosition(LongitudePosition {
                position: PartPosition::new(2, 7.65, Orientation::West),
            }),
            Datagram::SpeedOverGround(SpeedOverGround { sog_knots: 5.2 }),
            Datagram::CourseOverGround(CourseOverGround { course_degrees: 271.5 }),
            Datagram::GmtTime(GmtTime {
                time: NaiveTime::from_hms_opt(14, 48, 58).unwrap(),
            }),
            Datagram::Keystroke1(Keystroke { key: Key::Auto, increment_decrement: 1 }),
            Datagram::Date(Date { date: NaiveDate::from_ymd_opt(2010, 6, 16).unwrap() }),
            Datagram::SatInfo(SatInfo { satellites: 7, hdop: 0x12 }),
            Datagram::RawPosition(RawPosition {
                position: Position::new(
                    PartPosition::new(52, 35.315, Orientation::North),
                    PartPosition::new(2, 7.657, Orientation::West),
                ),
            }),
            Datagram::CountdownTimer(CountdownTimer {
                hours: 9,
                minutes: 59,
                seconds: 59,
                mode: CounterMode::CountDownStart,
            }),
            Datagram::E80Init,
            Datagram::SelectFathom,
            Datagram::WindAlarm(WindAlarm {
                apparent: AlarmFlags {
                    angle_low:  true,
                    angle_high: false,
                    speed_low:  false,
                    speed_high: true,
                },
                true_wind: AlarmFlags::default(),
            }),
            Datagram::AlarmAck(AlarmAck { alarm: AcknowledgedAlarm::AnchorAlarm }),
            Datagram::EquipmentId2(Equipment2::St80Masterview),
            Datagram::ManOverBoard,
            Datagram::LampIntensity2(3),
            Datagram::CourseComputerSetup(CourseComputerSetup::Setup),
            Datagram::TargetWaypoint(TargetWaypoint::new("WP47").unwrap()),
            Datagram::Keystroke2(Keystroke { key: Key::Standby, increment_decrement: 2 }),
            Datagram::SetResponseLevel(ResponseLevel::Minimum),
            Datagram::DeviceId1(DeviceId1::NmeaSeatalkBridge),
            Datagram::SetRudderGain(0x05),
            Datagram::EnterApSetup,
            Datagram::CompassVariation(CompassVariation { variation: -3 }),
            Datagram::DeviceId2(DeviceId2::Answer {
                unit:     DeviceUnit::Tridata,
                sw_major: 2,
                sw_minor: 1,
            }),
        ]
    }

    #[test]
    fn catalogue_round_trips() {
        for record in fully_populated_catalogue() {
            let wire = record.to_wire();
            let back = reparse(&wire);
            assert_eq!(record, back, "wire {wire:02X?}");
        }
    }

    #[test]
    fn length_nibble_matches_payload() {
        for record in fully_populated_catalogue() {
            let wire = record.to_wire();
            let length = usize::from(wire[1] & 0x0F);
            assert_eq!(wire.len(), length + 3, "cmd {:02X}", wire[0]);
        }
    }

    #[test]
    fn water_temperature2_exact_wire() {
        // 17.9 degC -> (17.9 * 10 + 100) = 279 = 0x117, little endian
        let wire = Datagram::WaterTemperature2(WaterTemperature2 { temperature_c: 17.9 }).to_wire();
        assert_eq!(wire, vec![0x27, 0x01, 0x17, 0x01]);
    }

    #[test]
    fn unknown_command_rejected() {
        assert!(declared_length(0xF5).is_none());
        assert!(matches!(
            Datagram::parse(0xF5, 0, &[0x00]),
            Err(SeatalkError::UnknownCommand(0xF5))
        ));
    }

    #[test]
    fn fixed_length_mismatch_detected() {
        let spec = declared_length(0x00).unwrap();
        assert!(matches!(spec.verify(0x00, 1), Err(SeatalkError::NotEnoughData { .. })));
        assert!(matches!(spec.verify(0x00, 3), Err(SeatalkError::TooMuchData { .. })));
    }

    #[test]
    fn device_id2_termination_accepts_short_form_emits_long() {
        let spec = declared_length(0xA4).unwrap();
        spec.verify(0xA4, 4).unwrap();
        spec.verify(0xA4, 6).unwrap();
        let short = Datagram::parse(0xA4, 0, &[0u8; 5]).unwrap();
        assert_eq!(short, Datagram::DeviceId2(DeviceId2::Termination));
        let wire = Datagram::DeviceId2(DeviceId2::Termination).to_wire();
        assert_eq!(wire[1] & 0x0F, 6);
    }
}
