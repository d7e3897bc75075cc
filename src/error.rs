//! Error types for the multiplexer.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MuxError {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config: {0}")]
    Config(String),

    #[error("Config parse: {0}")]
    ConfigParse(#[from] serde_json::Error),

    #[error("NMEA: {0}")]
    Nmea(#[from] NmeaError),

    #[error("Seatalk: {0}")]
    Seatalk(#[from] SeatalkError),

    #[error("Transport closed")]
    TransportClosed,

    #[error("Watchdog: {0}")]
    Watchdog(String),

    #[error("System call: {0}")]
    Sys(#[from] nix::Error),

    #[error("Task join: {0}")]
    Join(#[from] tokio::task::JoinError),
}

pub type Result<T> = std::result::Result<T, MuxError>;

/// Failures of the NMEA sentence layer.  A bad checksum is terminal for the
/// line; most other parse failures degrade to a pass-through sentence.
#[derive(Debug, Error, PartialEq)]
pub enum NmeaError {
    #[error("malformed framing: {0:?}")]
    MalformedFraming(String),

    #[error("checksum mismatch: expected {expected:02X}, actual {actual:02X}")]
    ChecksumMismatch { expected: u8, actual: u8 },

    #[error("unknown tag: {0}")]
    UnknownTag(String),

    #[error("field parse: {0}")]
    FieldParse(String),
}

/// Failures of the Seatalk datagram layer.  There is no checksum on the bus;
/// length and value validation is all the corruption detection there is.
#[derive(Debug, Error, PartialEq)]
pub enum SeatalkError {
    #[error("cmd {cmd:02X}: not enough data, expected {expected}, actual {actual}")]
    NotEnoughData { cmd: u8, expected: usize, actual: usize },

    #[error("cmd {cmd:02X}: too much data, expected {expected}, actual {actual}")]
    TooMuchData { cmd: u8, expected: usize, actual: usize },

    #[error("cmd {cmd:02X}: {reason}")]
    DataValidation { cmd: u8, reason: String },

    #[error("unknown command byte {0:02X}")]
    UnknownCommand(u8),
}

impl SeatalkError {
    pub fn validation(cmd: u8, reason: impl Into<String>) -> Self {
        SeatalkError::DataValidation { cmd, reason: reason.into() }
    }
}
