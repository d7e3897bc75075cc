//! Configuration file parser.
//!
//! One nested JSON document describes the watchdog and every bridged device.
//! Keys are PascalCase:
//!
//! ```json
//! {
//!     "Watchdog": { "Enable": true, "Timeout": 120, "MaxResets": 3, "PreviousResets": 0 },
//!     "LogDir": "./logs",
//!     "Devices": [
//!         { "Name": "GPS", "Kind": "NMEA", "AutoFlush": 10,
//!           "Io": { "Type": "Serial", "Port": "/dev/ttyUSB0", "Baud": 4800, "Encoding": "ascii" } },
//!         { "Name": "Instruments", "Kind": "Seatalk",
//!           "Io": { "Type": "Serial", "Port": "/dev/ttyAMA0", "Baud": 4800, "Parity": "Space" } },
//!         { "Name": "Plotter", "Kind": "NMEA",
//!           "Io": { "Type": "TCPServer", "Port": 9900, "Encoding": "ascii" } }
//!     ]
//! }
//! ```

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{MuxError, Result};

fn default_log_dir() -> PathBuf {
    PathBuf::from("./logs")
}

fn default_reset_counter_file() -> PathBuf {
    PathBuf::from("./watchdog_resets")
}

fn default_max_data_age() -> u64 {
    60
}

/// Full multiplexer configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
pub struct MuxConfig {
    #[serde(default)]
    pub watchdog: WatchdogConfig,

    /// Directory for the per-device raw I/O logs.
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,

    /// Path of the persisted watchdog reset counter.
    #[serde(default = "default_reset_counter_file")]
    pub reset_counter_file: PathBuf,

    /// Maximum age of a ship-state entry in seconds.
    #[serde(default = "default_max_data_age")]
    pub max_data_age: u64,

    /// Log to syslog instead of stderr.
    #[serde(default)]
    pub log_syslog: bool,

    pub devices: Vec<DeviceConfig>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
pub struct WatchdogConfig {
    #[serde(default)]
    pub enable: bool,
    /// Hardware timeout in seconds.
    #[serde(default)]
    pub timeout: Option<u64>,
    #[serde(default)]
    pub max_resets: u32,
    /// Reboot count accumulated across watchdog resets; the persisted counter
    /// file takes precedence over this value when present.
    #[serde(default)]
    pub previous_resets: u32,
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self { enable: false, timeout: None, max_resets: 0, previous_resets: 0 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
pub struct DeviceConfig {
    pub name: String,
    pub kind: DeviceKind,
    #[serde(alias = "IO")]
    pub io:   IoConfig,

    /// Flush the transport after every N framed messages.
    #[serde(default)]
    pub auto_flush: Option<u32>,

    /// Maximum age of a queued message in seconds (default 30).
    #[serde(default)]
    pub max_item_age: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum DeviceKind {
    #[serde(rename = "NMEA", alias = "Nmea")]
    Nmea,
    Seatalk,
    SetTime,
}

/// Transport selection, tagged by `Type`.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "Type", rename_all = "PascalCase", rename_all_fields = "PascalCase")]
pub enum IoConfig {
    Serial {
        port: String,
        #[serde(default = "default_baud")]
        baud: u32,
        #[serde(default = "default_data_bits")]
        data_bits: u8,
        #[serde(default = "default_stop_bits")]
        stop_bits: u8,
        #[serde(default)]
        parity: Parity,
        #[serde(default)]
        encoding: Option<String>,
    },
    #[serde(rename = "TCPServer")]
    TcpServer {
        port: u16,
        #[serde(default)]
        encoding: Option<String>,
    },
    #[serde(rename = "TCPClient")]
    TcpClient {
        address: String,
        port:    u16,
        #[serde(default)]
        encoding: Option<String>,
    },
    File {
        path: PathBuf,
        #[serde(default)]
        encoding: Option<String>,
    },
    StdOut {
        #[serde(default)]
        encoding: Option<String>,
    },
}

fn default_baud() -> u32 {
    4800
}

fn default_data_bits() -> u8 {
    8
}

fn default_stop_bits() -> u8 {
    1
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
pub enum Parity {
    #[default]
    None,
    Even,
    Odd,
    /// 9th bit set on every byte.
    Mark,
    /// 9th bit cleared; parity errors mark Seatalk command bytes.
    Space,
}

/// Parse `path` as a JSON configuration document.
pub fn load_config(path: &Path) -> Result<MuxConfig> {
    let content = fs::read_to_string(path)
        .map_err(|e| MuxError::Config(format!("cannot read {}: {e}", path.display())))?;
    let cfg: MuxConfig = serde_json::from_str(&content)?;
    Ok(cfg)
}

/// Validate cross-field constraints that serde cannot express.
pub fn validate_config(cfg: &MuxConfig) -> Result<()> {
    if cfg.devices.is_empty() {
        return Err(MuxError::Config("no devices configured".into()));
    }

    let mut names = HashSet::new();
    for dev in &cfg.devices {
        if dev.name.is_empty() {
            return Err(MuxError::Config("device with empty Name".into()));
        }
        if !names.insert(dev.name.as_str()) {
            return Err(MuxError::Config(format!("duplicate device name {:?}", dev.name)));
        }
        if let IoConfig::Serial { data_bits, stop_bits, .. } = &dev.io {
            if !(5..=8).contains(data_bits) {
                return Err(MuxError::Config(format!(
                    "{}: unsupported data bits {data_bits}",
                    dev.name
                )));
            }
            if !(1..=2).contains(stop_bits) {
                return Err(MuxError::Config(format!(
                    "{}: unsupported stop bits {stop_bits}",
                    dev.name
                )));
            }
        }
    }

    if cfg.watchdog.enable && cfg.watchdog.timeout == Some(0) {
        return Err(MuxError::Config("Watchdog.Timeout must be non-zero".into()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "Watchdog": { "Enable": true, "Timeout": 120, "MaxResets": 3, "PreviousResets": 1 },
        "Devices": [
            { "Name": "GPS", "Kind": "NMEA", "AutoFlush": 10,
              "Io": { "Type": "Serial", "Port": "/dev/ttyUSB0", "Baud": 4800, "Encoding": "ascii" } },
            { "Name": "Instruments", "Kind": "Seatalk", "MaxItemAge": 10,
              "Io": { "Type": "Serial", "Port": "/dev/ttyAMA0", "Parity": "Space" } },
            { "Name": "Plotter", "Kind": "NMEA",
              "Io": { "Type": "TCPServer", "Port": 9900 } },
            { "Name": "Clock", "Kind": "SetTime",
              "Io": { "Type": "StdOut" } }
        ]
    }"#;

    #[test]
    fn parses_sample_document() {
        let cfg: MuxConfig = serde_json::from_str(SAMPLE).unwrap();
        assert!(cfg.watchdog.enable);
        assert_eq!(cfg.watchdog.timeout, Some(120));
        assert_eq!(cfg.devices.len(), 4);
        assert_eq!(cfg.devices[0].kind, DeviceKind::Nmea);
        assert_eq!(cfg.devices[0].auto_flush, Some(10));
        match &cfg.devices[1].io {
            IoConfig::Serial { baud, parity, .. } => {
                assert_eq!(*baud, 4800);
                assert_eq!(*parity, Parity::Space);
            }
            other => panic!("wrong io: {other:?}"),
        }
        assert_eq!(cfg.devices[1].max_item_age, Some(10));
        assert_eq!(cfg.devices[3].kind, DeviceKind::SetTime);
        validate_config(&cfg).unwrap();
    }

    #[test]
    fn duplicate_names_rejected() {
        let cfg: MuxConfig = serde_json::from_str(
            r#"{ "Devices": [
                { "Name": "A", "Kind": "NMEA", "Io": { "Type": "StdOut" } },
                { "Name": "A", "Kind": "Seatalk", "Io": { "Type": "StdOut" } }
            ]}"#,
        )
        .unwrap();
        assert!(validate_config(&cfg).is_err());
    }

    #[test]
    fn empty_device_list_rejected() {
        let cfg: MuxConfig = serde_json::from_str(r#"{ "Devices": [] }"#).unwrap();
        assert!(validate_config(&cfg).is_err());
    }
}
