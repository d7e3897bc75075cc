//! Byte-level transports.
//!
//! Every device owns exactly one [`Io`], which wraps one [`Transport`]
//! variant with an optional text encoding and the read/write gate that keeps
//! codec reads from interleaving with writer bursts on the same descriptor.

mod file;
mod serial;
mod tcp;

pub use file::{FileIo, StdOut};
pub use serial::SerialPort;
pub use tcp::{TcpClient, TcpServer};

use log::error;

use crate::config::IoConfig;
use crate::error::{MuxError, Result};

/// How long a TCP client waits before another connection attempt.
pub const RECONNECT_DELAY: std::time::Duration = std::time::Duration::from_secs(5);

// ── Transport dispatch ────────────────────────────────────────────────────────

pub enum Transport {
    Serial(SerialPort),
    TcpServer(TcpServer),
    TcpClient(TcpClient),
    File(FileIo),
    StdOut(StdOut),
}

impl Transport {
    async fn initialize(&self) -> Result<()> {
        match self {
            Transport::Serial(t) => t.initialize().await,
            Transport::TcpServer(t) => t.initialize().await,
            Transport::TcpClient(t) => t.initialize().await,
            Transport::File(t) => t.initialize().await,
            Transport::StdOut(t) => t.initialize().await,
        }
    }

    async fn read(&self, length: usize) -> Result<Vec<u8>> {
        match self {
            Transport::Serial(t) => t.read(length).await,
            Transport::TcpServer(t) => t.read(length).await,
            Transport::TcpClient(t) => t.read(length).await,
            Transport::File(t) => t.read(length).await,
            Transport::StdOut(t) => t.read(length).await,
        }
    }

    async fn write(&self, data: &[u8]) -> Result<usize> {
        match self {
            Transport::Serial(t) => t.write(data).await,
            Transport::TcpServer(t) => t.write(data).await,
            Transport::TcpClient(t) => t.write(data).await,
            Transport::File(t) => t.write(data).await,
            Transport::StdOut(t) => t.write(data).await,
        }
    }

    async fn flush(&self) -> Result<()> {
        match self {
            Transport::Serial(t) => t.flush().await,
            Transport::TcpServer(t) => t.flush().await,
            Transport::TcpClient(t) => t.flush().await,
            Transport::File(_) | Transport::StdOut(_) => Ok(()),
        }
    }

    async fn cancel(&self) {
        match self {
            Transport::Serial(t) => t.cancel(),
            Transport::TcpServer(t) => t.cancel().await,
            Transport::TcpClient(t) => t.cancel().await,
            Transport::File(t) => t.cancel(),
            Transport::StdOut(t) => t.cancel(),
        }
    }
}

// ── Text encoding ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Ascii,
    Utf8,
}

impl Encoding {
    pub fn from_name(name: &str) -> Result<Self> {
        match name.to_ascii_lowercase().as_str() {
            "ascii" | "us-ascii" => Ok(Encoding::Ascii),
            "utf-8" | "utf8" => Ok(Encoding::Utf8),
            other => Err(MuxError::Config(format!("unknown encoding {other:?}"))),
        }
    }

    fn check(&self, data: &[u8]) -> bool {
        match self {
            Encoding::Ascii => data.iter().all(|b| b.is_ascii()),
            Encoding::Utf8 => std::str::from_utf8(data).is_ok(),
        }
    }
}

// ── Io wrapper ────────────────────────────────────────────────────────────────

/// One device's transport handle.
pub struct Io {
    transport: Transport,
    encoding:  Option<Encoding>,
    gate:      tokio::sync::Mutex<()>,
}

impl Io {
    pub fn new(transport: Transport, encoding: Option<Encoding>) -> Self {
        Self { transport, encoding, gate: tokio::sync::Mutex::new(()) }
    }

    /// Build the transport described by a device's `Io` config section.
    pub fn from_config(cfg: &IoConfig) -> Result<Self> {
        let encoding = match cfg {
            IoConfig::Serial { encoding, .. }
            | IoConfig::TcpServer { encoding, .. }
            | IoConfig::TcpClient { encoding, .. }
            | IoConfig::File { encoding, .. }
            | IoConfig::StdOut { encoding } => {
                encoding.as_deref().map(Encoding::from_name).transpose()?
            }
        };

        let transport = match cfg {
            IoConfig::Serial { port, baud, data_bits, stop_bits, parity, .. } => {
                Transport::Serial(SerialPort::open(port, *baud, *data_bits, *stop_bits, *parity)?)
            }
            IoConfig::TcpServer { port, .. } => Transport::TcpServer(TcpServer::new(*port)),
            IoConfig::TcpClient { address, port, .. } => {
                Transport::TcpClient(TcpClient::new(address.clone(), *port))
            }
            IoConfig::File { path, .. } => Transport::File(FileIo::new(path.clone())),
            IoConfig::StdOut { .. } => Transport::StdOut(StdOut::new()),
        };
        Ok(Self::new(transport, encoding))
    }

    pub async fn initialize(&self) -> Result<()> {
        self.transport.initialize().await
    }

    /// Read exactly `length` bytes.  With an encoding configured, a chunk
    /// that fails to decode is reported as empty and logged (non-fatal).
    pub async fn read(&self, length: usize) -> Result<Vec<u8>> {
        let data = {
            let _gate = self.gate.lock().await;
            self.transport.read(length).await?
        };
        if let Some(enc) = self.encoding {
            if !enc.check(&data) {
                error!("transport: could not decode {data:02X?} as {enc:?}");
                return Ok(Vec::new());
            }
        }
        Ok(data)
    }

    pub async fn read_byte(&self) -> Result<u8> {
        loop {
            let data = self.read(1).await?;
            if let Some(&b) = data.first() {
                return Ok(b);
            }
        }
    }

    pub async fn write(&self, data: &[u8]) -> Result<usize> {
        if let Some(enc) = self.encoding {
            if !enc.check(data) {
                error!("transport: could not encode {data:02X?} as {enc:?}");
                return Ok(0);
            }
        }
        let _gate = self.gate.lock().await;
        self.transport.write(data).await
    }

    pub async fn flush(&self) -> Result<()> {
        let _gate = self.gate.lock().await;
        self.transport.flush().await
    }

    /// Idempotent; wakes any blocked reader.
    pub async fn cancel(&self) {
        self.transport.cancel().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encoding_names() {
        assert_eq!(Encoding::from_name("ascii").unwrap(), Encoding::Ascii);
        assert_eq!(Encoding::from_name("UTF-8").unwrap(), Encoding::Utf8);
        assert!(Encoding::from_name("latin-1").is_err());
    }

    #[test]
    fn ascii_check_rejects_high_bytes() {
        assert!(Encoding::Ascii.check(b"$INMTW,17.9,C*1B\r\n"));
        assert!(!Encoding::Ascii.check(&[0x24, 0xFF]));
    }

    #[tokio::test]
    async fn decode_failure_yields_empty_read() {
        let io = Io::new(Transport::File(FileIo::new_with_contents(&[0xFF, 0xFE])), Some(Encoding::Ascii));
        io.initialize().await.unwrap();
        let data = io.read(2).await.unwrap();
        assert!(data.is_empty());
    }
}
