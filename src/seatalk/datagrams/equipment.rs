//! Equipment identification datagrams (0x01, 0x6C, 0x90, 0xA4) and the E-80
//! initialization marker (0x61).

use crate::error::SeatalkError;

/// `01 05 XX XX XX XX XX XX` — equipment ID sent at power on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Equipment1 {
    CourseComputer400G,
    St60Tridata,
    St60TridataPlus,
    St60Log,
    St80Masterview,
    St80MaxiDisplay,
    SmartControllerRemote,
}

const EQUIPMENT1_TABLE: &[(Equipment1, [u8; 6])] = &[
    (Equipment1::CourseComputer400G, [0x00, 0x00, 0x00, 0x60, 0x01, 0x00]),
    (Equipment1::St60Tridata, [0x04, 0xBA, 0x20, 0x28, 0x01, 0x00]),
    (Equipment1::St60TridataPlus, [0x87, 0x72, 0x25, 0x28, 0x01, 0x00]),
    (Equipment1::St60Log, [0x70, 0x99, 0x10, 0x28, 0x01, 0x00]),
    (Equipment1::St80Masterview, [0xF3, 0x18, 0x00, 0x26, 0x0F, 0x06]),
    (Equipment1::St80MaxiDisplay, [0xFA, 0x03, 0x00, 0x30, 0x07, 0x03]),
    (Equipment1::SmartControllerRemote, [0xFF, 0xFF, 0xFF, 0xD0, 0x00, 0x00]),
];

impl Equipment1 {
    pub(super) fn parse(data: &[u8]) -> Result<Self, SeatalkError> {
        EQUIPMENT1_TABLE
            .iter()
            .find(|(_, bytes)| bytes == data)
            .map(|(id, _)| *id)
            .ok_or_else(|| {
                SeatalkError::validation(0x01, format!("unknown equipment bytes {data:02X?}"))
            })
    }

    pub(super) fn emit(&self) -> Vec<u8> {
        EQUIPMENT1_TABLE.iter().find(|(id, _)| id == self).unwrap().1.to_vec()
    }
}

/// `6C 05 XX XX XX XX XX XX` — second equipment ID, follows 0x01.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Equipment2 {
    St60Tridata,
    St60TridataPlus,
    St60Log,
    St80Masterview,
}

const EQUIPMENT2_TABLE: &[(Equipment2, [u8; 6])] = &[
    (Equipment2::St60Tridata, [0x04, 0xBA, 0x20, 0x28, 0x2D, 0x2D]),
    (Equipment2::St60TridataPlus, [0x87, 0x72, 0x25, 0x28, 0x2D, 0x2D]),
    (Equipment2::St60Log, [0x05, 0x70, 0x99, 0x10, 0x28, 0x2D]),
    (Equipment2::St80Masterview, [0xF3, 0x18, 0x00, 0x26, 0x2D, 0x2D]),
];

impl Equipment2 {
    pub(super) fn parse(data: &[u8]) -> Result<Self, SeatalkError> {
        EQUIPMENT2_TABLE
            .iter()
            .find(|(_, bytes)| bytes == data)
            .map(|(id, _)| *id)
            .ok_or_else(|| {
                SeatalkError::validation(0x6C, format!("unknown equipment bytes {data:02X?}"))
            })
    }

    pub(super) fn emit(&self) -> Vec<u8> {
        EQUIPMENT2_TABLE.iter().find(|(id, _)| id == self).unwrap().1.to_vec()
    }
}

/// `90 00 XX` — periodic device identification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceId1 {
    St600R,
    CourseComputer,
    NmeaSeatalkBridge,
}

impl DeviceId1 {
    pub(super) fn parse(data: &[u8]) -> Result<Self, SeatalkError> {
        match data[0] {
            0x02 => Ok(DeviceId1::St600R),
            0x05 => Ok(DeviceId1::CourseComputer),
            0xA3 => Ok(DeviceId1::NmeaSeatalkBridge),
            other => {
                Err(SeatalkError::validation(0x90, format!("unexpected device id {other:02X}")))
            }
        }
    }

    pub(super) fn emit(&self) -> Vec<u8> {
        vec![match self {
            DeviceId1::St600R => 0x02,
            DeviceId1::CourseComputer => 0x05,
            DeviceId1::NmeaSeatalkBridge => 0xA3,
        }]
    }
}

/// Unit codes of the 0xA4 identification answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceUnit {
    Depth,
    Speed,
    Multi,
    Tridata,
    TridataRepeater,
    Wind,
    Wmg,
    NavdataGps,
    Maxview,
    SteeringCompass,
    WindTrim,
    SpeedTrim,
    SeatalkGps,
    SeatalkRadarSt50,
    RudderAngleIndicator,
    St30Wind,
    St30Bidata,
    St30Speed,
    St30Depth,
    LcdNavCenter,
    ApelcoLcdChartplotter,
    AnalogSpeedTrim,
    AnalogDepth,
    St30Compass,
    St50NmeaBridge,
    St80Masterview,
}

impl DeviceUnit {
    fn from_byte(byte: u8) -> Result<Self, SeatalkError> {
        Ok(match byte {
            0x01 => DeviceUnit::Depth,
            0x02 => DeviceUnit::Speed,
            0x03 => DeviceUnit::Multi,
            0x04 => DeviceUnit::Tridata,
            0x05 => DeviceUnit::TridataRepeater,
            0x06 => DeviceUnit::Wind,
            0x07 => DeviceUnit::Wmg,
            0x08 => DeviceUnit::NavdataGps,
            0x09 => DeviceUnit::Maxview,
            0x0A => DeviceUnit::SteeringCompass,
            0x0B => DeviceUnit::WindTrim,
            0x0C => DeviceUnit::SpeedTrim,
            0x0D => DeviceUnit::SeatalkGps,
            0x0E => DeviceUnit::SeatalkRadarSt50,
            0x0F => DeviceUnit::RudderAngleIndicator,
            0x10 => DeviceUnit::St30Wind,
            0x11 => DeviceUnit::St30Bidata,
            0x12 => DeviceUnit::St30Speed,
            0x13 => DeviceUnit::St30Depth,
            0x14 => DeviceUnit::LcdNavCenter,
            0x15 => DeviceUnit::ApelcoLcdChartplotter,
            0x16 => DeviceUnit::AnalogSpeedTrim,
            0x17 => DeviceUnit::AnalogDepth,
            0x18 => DeviceUnit::St30Compass,
            0x19 => DeviceUnit::St50NmeaBridge,
            0xA8 => DeviceUnit::St80Masterview,
            other => {
                return Err(SeatalkError::validation(
                    0xA4,
                    format!("unknown unit id {other:02X}"),
                ))
            }
        })
    }

    fn to_byte(self) -> u8 {
        match self {
            DeviceUnit::Depth => 0x01,
            DeviceUnit::Speed => 0x02,
            DeviceUnit::Multi => 0x03,
            DeviceUnit::Tridata => 0x04,
            DeviceUnit::TridataRepeater => 0x05,
            DeviceUnit::Wind => 0x06,
            DeviceUnit::Wmg => 0x07,
            DeviceUnit::NavdataGps => 0x08,
            DeviceUnit::Maxview => 0x09,
            DeviceUnit::SteeringCompass => 0x0A,
            DeviceUnit::WindTrim => 0x0B,
            DeviceUnit::SpeedTrim => 0x0C,
            DeviceUnit::SeatalkGps => 0x0D,
            DeviceUnit::SeatalkRadarSt50 => 0x0E,
            DeviceUnit::RudderAngleIndicator => 0x0F,
            DeviceUnit::St30Wind => 0x10,
            DeviceUnit::St30Bidata => 0x11,
            DeviceUnit::St30Speed => 0x12,
            DeviceUnit::St30Depth => 0x13,
            DeviceUnit::LcdNavCenter => 0x14,
            DeviceUnit::ApelcoLcdChartplotter => 0x15,
            DeviceUnit::AnalogSpeedTrim => 0x16,
            DeviceUnit::AnalogDepth => 0x17,
            DeviceUnit::St30Compass => 0x18,
            DeviceUnit::St50NmeaBridge => 0x19,
            DeviceUnit::St80Masterview => 0xA8,
        }
    }
}

/// `A4` — device identification, three shapes sharing one command byte:
/// a broadcast query (length 2, zeros), the answer (length 2, first-half 1)
/// and the termination marker (declared length 6; 4 is seen on real buses
/// and accepted on ingest).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceId2 {
    Broadcast,
    Answer { unit: DeviceUnit, sw_major: u8, sw_minor: u8 },
    Termination,
}

impl DeviceId2 {
    pub(super) fn parse(first_half: u8, data: &[u8]) -> Result<Self, SeatalkError> {
        if data.len() == 3 {
            if first_half == 0x1 {
                return Ok(DeviceId2::Answer {
                    unit:     DeviceUnit::from_byte(data[0])?,
                    sw_major: data[1],
                    sw_minor: data[2],
                });
            }
            super::expect_zero(0xA4, first_half, data)?;
            return Ok(DeviceId2::Broadcast);
        }
        super::expect_zero(0xA4, first_half, data)?;
        Ok(DeviceId2::Termination)
    }

    pub(super) fn emit(&self) -> (u8, Vec<u8>) {
        match self {
            DeviceId2::Broadcast => (0x0, vec![0u8; 3]),
            DeviceId2::Answer { unit, sw_major, sw_minor } => {
                (0x1, vec![unit.to_byte(), *sw_major, *sw_minor])
            }
            DeviceId2::Termination => (0x0, vec![0u8; 7]),
        }
    }
}

/// `61 03 03 00 00 00` — issued by the E-80 display at initialization.
pub(super) fn parse_e80_init(first_half: u8, data: &[u8]) -> Result<(), SeatalkError> {
    if first_half != 0 || data != [0x03, 0x00, 0x00, 0x00] {
        return Err(SeatalkError::validation(
            0x61,
            format!("unrecognized payload fh={first_half:X} data={data:02X?}"),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equipment1_fingerprint_lookup() {
        let id = Equipment1::parse(&[0x04, 0xBA, 0x20, 0x28, 0x01, 0x00]).unwrap();
        assert_eq!(id, Equipment1::St60Tridata);
        assert_eq!(id.emit(), vec![0x04, 0xBA, 0x20, 0x28, 0x01, 0x00]);
        assert!(Equipment1::parse(&[0u8; 6]).is_err());
    }

    #[test]
    fn device_id2_answer_requires_first_half_one() {
        let answer = DeviceId2::parse(0x1, &[0x04, 0x02, 0x01]).unwrap();
        assert_eq!(
            answer,
            DeviceId2::Answer { unit: DeviceUnit::Tridata, sw_major: 2, sw_minor: 1 }
        );
        // first-half 0 with zero payload is the broadcast query
        assert_eq!(DeviceId2::parse(0x0, &[0, 0, 0]).unwrap(), DeviceId2::Broadcast);
        // first-half 0 with junk is invalid
        assert!(DeviceId2::parse(0x0, &[1, 2, 3]).is_err());
    }

    #[test]
    fn device_id2_answer_unknown_unit() {
        assert!(DeviceId2::parse(0x1, &[0x42, 0, 0]).is_err());
    }

    #[test]
    fn e80_init_payload_check() {
        assert!(parse_e80_init(0, &[0x03, 0, 0, 0]).is_ok());
        assert!(parse_e80_init(0, &[0x04, 0, 0, 0]).is_err());
        assert!(parse_e80_init(1, &[0x03, 0, 0, 0]).is_err());
    }
}
