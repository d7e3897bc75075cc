//! Alarm acknowledgement (0x68) and the man-overboard pair (0x36, 0x6E).

use crate::error::SeatalkError;

/// Alarm codes carried in the first-half byte of 0x68.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcknowledgedAlarm {
    ShallowWaterAlarm,
    DeepWaterAlarm,
    AnchorAlarm,
    TrueWindHighAlarm,
    TrueWindLowAlarm,
    TrueWindAngleHigh,
    TrueWindAngleLow,
    ApparentWindHighAlarm,
    ApparentWindLowAlarm,
    ApparentWindAngleHigh,
    ApparentWindAngleLow,
}

impl AcknowledgedAlarm {
    fn from_nibble(nibble: u8) -> Result<Self, SeatalkError> {
        Ok(match nibble {
            0x1 => AcknowledgedAlarm::ShallowWaterAlarm,
            0x2 => AcknowledgedAlarm::DeepWaterAlarm,
            0x3 => AcknowledgedAlarm::AnchorAlarm,
            0x4 => AcknowledgedAlarm::TrueWindHighAlarm,
            0x5 => AcknowledgedAlarm::TrueWindLowAlarm,
            0x6 => AcknowledgedAlarm::TrueWindAngleHigh,
            0x7 => AcknowledgedAlarm::TrueWindAngleLow,
            0x8 => AcknowledgedAlarm::ApparentWindHighAlarm,
            0x9 => AcknowledgedAlarm::ApparentWindLowAlarm,
            0xA => AcknowledgedAlarm::ApparentWindAngleHigh,
            0xB => AcknowledgedAlarm::ApparentWindAngleLow,
            other => {
                return Err(SeatalkError::validation(
                    0x68,
                    format!("unknown alarm code {other:X}"),
                ))
            }
        })
    }

    fn to_nibble(self) -> u8 {
        match self {
            AcknowledgedAlarm::ShallowWaterAlarm => 0x1,
            AcknowledgedAlarm::DeepWaterAlarm => 0x2,
            AcknowledgedAlarm::AnchorAlarm => 0x3,
            AcknowledgedAlarm::TrueWindHighAlarm => 0x4,
            AcknowledgedAlarm::TrueWindLowAlarm => 0x5,
            AcknowledgedAlarm::TrueWindAngleHigh => 0x6,
            AcknowledgedAlarm::TrueWindAngleLow => 0x7,
            AcknowledgedAlarm::ApparentWindHighAlarm => 0x8,
            AcknowledgedAlarm::ApparentWindLowAlarm => 0x9,
            AcknowledgedAlarm::ApparentWindAngleHigh => 0xA,
            AcknowledgedAlarm::ApparentWindAngleLow => 0xB,
        }
    }
}

/// `68 X1 01 00` — alarm acknowledgement keystroke; `X` names the alarm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlarmAck {
    pub alarm: AcknowledgedAlarm,
}

impl AlarmAck {
    pub(super) fn parse(first_half: u8) -> Result<Self, SeatalkError> {
        Ok(Self { alarm: AcknowledgedAlarm::from_nibble(first_half)? })
    }

    pub(super) fn emit(&self) -> (u8, Vec<u8>) {
        (self.alarm.to_nibble(), vec![0x01, 0x00])
    }
}

/// `36 00 01` — cancel the man-overboard condition.
pub(super) fn parse_cancel_mob(data: &[u8]) -> Result<(), SeatalkError> {
    if data != [0x01] {
        return Err(SeatalkError::validation(0x36, format!("expected 01, got {data:02X?}")));
    }
    Ok(())
}
