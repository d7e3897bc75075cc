//! Serial port transport.
//!
//! The port is configured through termios into raw mode.  Seatalk buses use
//! 8 data bits plus a parity bit as a 9th "command bit": the first byte of a
//! datagram is sent with mark parity, the rest with space parity.  A port
//! opened with space parity therefore enables `INPCK|PARMRK`, and the kernel
//! reports each parity-flagged byte as the sequence `FF 00 <byte>` (a literal
//! `0xFF` data byte arrives as `FF FF`).  The read path unstuffs both forms.
//!
//! Blocking termios syscalls run on `spawn_blocking` threads; reads poll with
//! VMIN=0/VTIME=1 so cancellation is observed within ~100 ms.

use std::collections::VecDeque;
use std::fs;
use std::io::{Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use log::warn;
use nix::sys::termios::{
    self, BaudRate, ControlFlags, InputFlags, LocalFlags, OutputFlags, SetArg,
    SpecialCharacterIndices,
};

use crate::config::Parity;
use crate::error::{MuxError, Result};

pub struct SerialPort {
    file:      Arc<fs::File>,
    /// Space-parity mode: kernel parity marking is active and must be
    /// unstuffed from the inbound stream.
    unstuff:   bool,
    decoder:   Mutex<ParityDecoder>,
    cancelled: Arc<AtomicBool>,
}

impl SerialPort {
    pub fn open(port: &str, baud: u32, data_bits: u8, stop_bits: u8, parity: Parity) -> Result<Self> {
        let file = fs::OpenOptions::new().read(true).write(true).open(port)?;
        configure(&file, baud, data_bits, stop_bits, parity)?;
        Ok(Self {
            file: Arc::new(file),
            unstuff: parity == Parity::Space,
            decoder: Mutex::new(ParityDecoder::default()),
            cancelled: Arc::new(AtomicBool::new(false)),
        })
    }

    pub async fn initialize(&self) -> Result<()> {
        Ok(())
    }

    pub async fn read(&self, length: usize) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(length);
        while out.len() < length {
            if let Some(b) = self.decoder.lock().unwrap().pop() {
                out.push(b);
                continue;
            }
            let chunk = self.read_chunk().await?;
            let mut decoder = self.decoder.lock().unwrap();
            if self.unstuff {
                decoder.feed(&chunk);
            } else {
                decoder.feed_raw(&chunk);
            }
        }
        Ok(out)
    }

    /// One blocking read of whatever is available (at least one byte).
    async fn read_chunk(&self) -> Result<Vec<u8>> {
        let file = Arc::clone(&self.file);
        let cancelled = Arc::clone(&self.cancelled);
        tokio::task::spawn_blocking(move || {
            let mut buf = [0u8; 64];
            loop {
                if cancelled.load(Ordering::Relaxed) {
                    return Err(MuxError::TransportClosed);
                }
                // VMIN=0/VTIME=1: returns 0 after 100 ms of silence.
                let n = (&*file).read(&mut buf)?;
                if n > 0 {
                    return Ok(buf[..n].to_vec());
                }
            }
        })
        .await?
    }

    pub async fn write(&self, data: &[u8]) -> Result<usize> {
        if self.cancelled.load(Ordering::Relaxed) {
            return Err(MuxError::TransportClosed);
        }
        let file = Arc::clone(&self.file);
        let data = data.to_vec();
        tokio::task::spawn_blocking(move || {
            (&*file).write_all(&data)?;
            Ok(data.len())
        })
        .await?
    }

    pub async fn flush(&self) -> Result<()> {
        let file = Arc::clone(&self.file);
        tokio::task::spawn_blocking(move || {
            if let Err(e) = termios::tcflush(&*file, termios::FlushArg::TCIOFLUSH) {
                warn!("serial: tcflush failed: {e}");
            }
            Ok(())
        })
        .await?
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }
}

// ── PARMRK unstuffing ─────────────────────────────────────────────────────────

/// Streaming decoder for kernel parity marking.  `FF 00 X` collapses to `X`,
/// `FF FF` to a literal `FF`; a trailing partial escape is held back until
/// the next chunk arrives.
#[derive(Default)]
struct ParityDecoder {
    decoded: VecDeque<u8>,
    escape:  EscapeState,
}

#[derive(Default, PartialEq)]
enum EscapeState {
    #[default]
    Idle,
    /// Seen `FF`.
    Mark,
    /// Seen `FF 00`.
    MarkZero,
}

impl ParityDecoder {
    fn pop(&mut self) -> Option<u8> {
        self.decoded.pop_front()
    }

    fn feed_raw(&mut self, chunk: &[u8]) {
        self.decoded.extend(chunk);
    }

    fn feed(&mut self, chunk: &[u8]) {
        for &b in chunk {
            match self.escape {
                EscapeState::Idle => {
                    if b == 0xFF {
                        self.escape = EscapeState::Mark;
                    } else {
                        self.decoded.push_back(b);
                    }
                }
                EscapeState::Mark => match b {
                    0x00 => self.escape = EscapeState::MarkZero,
                    0xFF => {
                        self.decoded.push_back(0xFF);
                        self.escape = EscapeState::Idle;
                    }
                    other => {
                        // Not a marking sequence after all; keep both bytes.
                        self.decoded.push_back(0xFF);
                        self.decoded.push_back(other);
                        self.escape = EscapeState::Idle;
                    }
                },
                EscapeState::MarkZero => {
                    self.decoded.push_back(b);
                    self.escape = EscapeState::Idle;
                }
            }
        }
    }
}

// ── termios setup ─────────────────────────────────────────────────────────────

fn configure(file: &fs::File, baud: u32, data_bits: u8, stop_bits: u8, parity: Parity) -> Result<()> {
    let mut t = termios::tcgetattr(file)?;

    // Raw input: no canonical mode, no echo, no signals
    t.local_flags &= !(LocalFlags::ICANON
        | LocalFlags::ECHO
        | LocalFlags::ECHOE
        | LocalFlags::ECHOK
        | LocalFlags::ECHONL
        | LocalFlags::ISIG
        | LocalFlags::IEXTEN);
    // No output processing
    t.output_flags &= !(OutputFlags::OPOST | OutputFlags::ONLCR | OutputFlags::OCRNL);
    // No software flow control, no CR/LF mangling, no bit stripping
    t.input_flags &= !(InputFlags::IXON
        | InputFlags::IXOFF
        | InputFlags::IXANY
        | InputFlags::ISTRIP
        | InputFlags::INLCR
        | InputFlags::IGNCR
        | InputFlags::ICRNL
        | InputFlags::IGNBRK
        | InputFlags::INPCK
        | InputFlags::PARMRK);

    t.control_flags |= ControlFlags::CREAD | ControlFlags::CLOCAL;

    t.control_flags &= !ControlFlags::CSIZE;
    t.control_flags |= match data_bits {
        5 => ControlFlags::CS5,
        6 => ControlFlags::CS6,
        7 => ControlFlags::CS7,
        _ => ControlFlags::CS8,
    };

    if stop_bits == 2 {
        t.control_flags |= ControlFlags::CSTOPB;
    } else {
        t.control_flags &= !ControlFlags::CSTOPB;
    }

    match parity {
        Parity::None => {
            t.control_flags &= !(ControlFlags::PARENB | ControlFlags::PARODD | ControlFlags::CMSPAR);
        }
        Parity::Even => {
            t.control_flags &= !(ControlFlags::PARODD | ControlFlags::CMSPAR);
            t.control_flags |= ControlFlags::PARENB;
        }
        Parity::Odd => {
            t.control_flags &= !ControlFlags::CMSPAR;
            t.control_flags |= ControlFlags::PARENB | ControlFlags::PARODD;
        }
        Parity::Mark => {
            t.control_flags |= ControlFlags::PARENB | ControlFlags::CMSPAR | ControlFlags::PARODD;
        }
        Parity::Space => {
            t.control_flags |= ControlFlags::PARENB | ControlFlags::CMSPAR;
            t.control_flags &= !ControlFlags::PARODD;
            // Report parity-flagged bytes inline as FF 00 <byte>.
            t.input_flags |= InputFlags::INPCK | InputFlags::PARMRK;
        }
    }

    // VMIN=0/VTIME=1: reads return after 100 ms of silence
    t.control_chars[SpecialCharacterIndices::VMIN as usize] = 0;
    t.control_chars[SpecialCharacterIndices::VTIME as usize] = 1;

    let rate = match baud {
        1200 => BaudRate::B1200,
        2400 => BaudRate::B2400,
        4800 => BaudRate::B4800,
        9600 => BaudRate::B9600,
        19200 => BaudRate::B19200,
        38400 => BaudRate::B38400,
        57600 => BaudRate::B57600,
        115200 => BaudRate::B115200,
        _ => BaudRate::B4800,
    };
    termios::cfsetospeed(&mut t, rate)?;
    termios::cfsetispeed(&mut t, rate)?;
    termios::tcsetattr(file, SetArg::TCSANOW, &t)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unstuffs_parity_marked_command_byte() {
        let mut d = ParityDecoder::default();
        d.feed(&[0xFF, 0x00, 0x20, 0x01, 0x9A, 0x02]);
        let out: Vec<u8> = std::iter::from_fn(|| d.pop()).collect();
        assert_eq!(out, vec![0x20, 0x01, 0x9A, 0x02]);
    }

    #[test]
    fn unstuffs_literal_ff() {
        let mut d = ParityDecoder::default();
        d.feed(&[0x01, 0xFF, 0xFF, 0x02]);
        let out: Vec<u8> = std::iter::from_fn(|| d.pop()).collect();
        assert_eq!(out, vec![0x01, 0xFF, 0x02]);
    }

    #[test]
    fn escape_split_across_chunks() {
        let mut d = ParityDecoder::default();
        d.feed(&[0x10, 0xFF]);
        assert_eq!(d.pop(), Some(0x10));
        assert_eq!(d.pop(), None);
        d.feed(&[0x00]);
        assert_eq!(d.pop(), None);
        d.feed(&[0x54]);
        assert_eq!(d.pop(), Some(0x54));
    }

    #[test]
    fn non_escape_ff_passthrough() {
        let mut d = ParityDecoder::default();
        d.feed(&[0xFF, 0x33]);
        let out: Vec<u8> = std::iter::from_fn(|| d.pop()).collect();
        assert_eq!(out, vec![0xFF, 0x33]);
    }
}
