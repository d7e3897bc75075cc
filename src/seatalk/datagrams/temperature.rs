//! Water temperature from the ST50 (0x23) and the higher-resolution form (0x27).

use super::{u16_le, u16_le_bytes};
use crate::types::units;

/// `23 Z1 XX YY` — water temperature, `XX` °C and `YY` °F in parallel.
/// First-half bit 0x4 flags a defective or disconnected sensor.
#[derive(Debug, Clone, PartialEq)]
pub struct WaterTemperature1 {
    pub temperature_c:    f64,
    pub sensor_defective: bool,
}

impl WaterTemperature1 {
    pub(super) fn parse(first_half: u8, data: &[u8]) -> Self {
        Self {
            temperature_c:    f64::from(data[0]),
            sensor_defective: first_half & 0x4 != 0,
        }
    }

    pub(super) fn emit(&self) -> (u8, Vec<u8>) {
        let celsius = self.temperature_c.round();
        let fahrenheit = units::celsius_to_fahrenheit(self.temperature_c).round();
        let first_half = if self.sensor_defective { 0x4 } else { 0x0 };
        (first_half, vec![celsius as u8, fahrenheit as u8])
    }
}

/// `27 01 XX XX` — water temperature, `(XXXX - 100) / 10` °C.
#[derive(Debug, Clone, PartialEq)]
pub struct WaterTemperature2 {
    pub temperature_c: f64,
}

impl WaterTemperature2 {
    pub(super) fn parse(data: &[u8]) -> Self {
        Self { temperature_c: (f64::from(u16_le(data)) - 100.0) / 10.0 }
    }

    pub(super) fn emit(&self) -> Vec<u8> {
        u16_le_bytes((self.temperature_c * 10.0 + 100.0).round() as u16).to_vec()
    }
}
