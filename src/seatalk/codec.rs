//! Seatalk stream framing.
//!
//! The bus has no frame delimiter.  Framing works by reading one command
//! byte, looking up its declared length, reading the attribute byte and the
//! payload, and validating as it goes.  On a validation failure the attempted
//! payload has already been consumed, so the reader naturally resyncs at the
//! next command byte; unknown command bytes are skipped one at a time.

use super::datagrams::{declared_length, Datagram};
use crate::error::{Result, SeatalkError};
use crate::transport::Io;

/// One framed datagram with the raw bytes it arrived as.
#[derive(Debug)]
pub struct Framed {
    pub datagram: Datagram,
    pub raw:      Vec<u8>,
}

/// Outcome of one framing attempt that consumed bus bytes.
#[derive(Debug)]
pub enum ReadOutcome {
    Datagram(Framed),
    /// Protocol-level failure; `raw` holds every byte that was consumed.
    Protocol { error: SeatalkError, raw: Vec<u8> },
}

/// Read one datagram from the transport.  Transport failures surface as
/// `Err`; protocol failures are data, not errors, so the caller can log them
/// and keep the loop alive.
pub async fn receive_datagram(io: &Io) -> Result<ReadOutcome> {
    let cmd = io.read_byte().await?;

    let Some(spec) = declared_length(cmd) else {
        return Ok(ReadOutcome::Protocol {
            error: SeatalkError::UnknownCommand(cmd),
            raw:   vec![cmd],
        });
    };

    let attr = io.read_byte().await?;
    let length = attr & 0x0F;
    let first_half = attr >> 4;

    if let Err(error) = spec.verify(cmd, length) {
        // Consume the attempted payload so the stream resyncs at the next
        // command byte.
        let skipped = io.read(usize::from(length) + 1).await?;
        let mut raw = vec![cmd, attr];
        raw.extend_from_slice(&skipped);
        return Ok(ReadOutcome::Protocol { error, raw });
    }

    let data = io.read(usize::from(length) + 1).await?;
    let mut raw = vec![cmd, attr];
    raw.extend_from_slice(&data);

    match Datagram::parse(cmd, first_half, &data) {
        Ok(datagram) => Ok(ReadOutcome::Datagram(Framed { datagram, raw })),
        Err(error) => Ok(ReadOutcome::Protocol { error, raw }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::seatalk::datagrams::WaterTemperature2;
    use crate::transport::{FileIo, Transport};

    fn io_with(bytes: &[u8]) -> Io {
        Io::new(Transport::File(FileIo::new_with_contents(bytes)), None)
    }

    #[tokio::test]
    async fn frames_a_known_datagram() {
        let io = io_with(&[0x27, 0x01, 0x17, 0x01]);
        match receive_datagram(&io).await.unwrap() {
            ReadOutcome::Datagram(framed) => {
                assert_eq!(framed.raw, vec![0x27, 0x01, 0x17, 0x01]);
                assert_eq!(
                    framed.datagram,
                    Datagram::WaterTemperature2(WaterTemperature2 { temperature_c: 17.9 })
                );
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn unknown_command_skips_one_byte() {
        // 0xF5 is not a command; the next byte starts a valid depth datagram.
        let io = io_with(&[0xF5, 0x00, 0x02, 0x00, 0xDB, 0x02]);
        match receive_datagram(&io).await.unwrap() {
            ReadOutcome::Protocol { error, raw } => {
                assert_eq!(error, SeatalkError::UnknownCommand(0xF5));
                assert_eq!(raw, vec![0xF5]);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        match receive_datagram(&io).await.unwrap() {
            ReadOutcome::Datagram(framed) => {
                assert_eq!(framed.raw, vec![0x00, 0x02, 0x00, 0xDB, 0x02]);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn length_mismatch_consumes_payload_and_resyncs() {
        // Depth datagram with a wrong length nibble (3 instead of 2),
        // followed by a valid speed datagram.
        let io = io_with(&[0x00, 0x03, 0xAA, 0xBB, 0xCC, 0xDD, 0x20, 0x01, 0x3F, 0x00]);
        match receive_datagram(&io).await.unwrap() {
            ReadOutcome::Protocol { error, raw } => {
                assert!(matches!(error, SeatalkError::TooMuchData { cmd: 0x00, .. }));
                assert_eq!(raw.len(), 6);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        match receive_datagram(&io).await.unwrap() {
            ReadOutcome::Datagram(framed) => {
                assert_eq!(framed.raw, vec![0x20, 0x01, 0x3F, 0x00]);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn validation_failure_is_protocol_outcome() {
        // Wind speed with a non-zero high nibble in the second data byte.
        let io = io_with(&[0x11, 0x01, 0x0B, 0x13]);
        match receive_datagram(&io).await.unwrap() {
            ReadOutcome::Protocol { error, .. } => {
                assert!(matches!(error, SeatalkError::DataValidation { cmd: 0x11, .. }));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }
}
