//! File and stdout transports, mainly for replaying recorded bus traffic and
//! for dumping bridged output during bring-up.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use log::info;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tokio::sync::Notify;

use crate::error::{MuxError, Result};

/// Poll interval once the read cursor has caught up with the file end.
const TAIL_POLL: std::time::Duration = std::time::Duration::from_millis(100);

/// Reads proceed from a positional cursor; writes append.
pub struct FileIo {
    path:      PathBuf,
    cursor:    AtomicU64,
    cancelled: Arc<AtomicBool>,
}

impl FileIo {
    pub fn new(path: PathBuf) -> Self {
        Self { path, cursor: AtomicU64::new(0), cancelled: Arc::new(AtomicBool::new(false)) }
    }

    #[cfg(test)]
    pub fn new_with_contents(data: &[u8]) -> Self {
        use std::io::Write;
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(data).unwrap();
        let (_, path) = tmp.keep().unwrap();
        Self::new(path)
    }

    pub async fn initialize(&self) -> Result<()> {
        if !self.path.exists() {
            return Err(MuxError::Config(format!(
                "file transport: {} does not exist",
                self.path.display()
            )));
        }
        Ok(())
    }

    pub async fn read(&self, length: usize) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(length);
        while out.len() < length {
            if self.cancelled.load(Ordering::Relaxed) {
                return Err(MuxError::TransportClosed);
            }
            let mut file = tokio::fs::File::open(&self.path).await?;
            file.seek(std::io::SeekFrom::Start(self.cursor.load(Ordering::Relaxed))).await?;
            let mut buf = vec![0u8; length - out.len()];
            let n = file.read(&mut buf).await?;
            if n == 0 {
                tokio::time::sleep(TAIL_POLL).await;
                continue;
            }
            self.cursor.fetch_add(n as u64, Ordering::Relaxed);
            out.extend_from_slice(&buf[..n]);
        }
        Ok(out)
    }

    pub async fn write(&self, data: &[u8]) -> Result<usize> {
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(data).await?;
        Ok(data.len())
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }
}

/// Write-only sink that logs every payload; reads pend until cancelled.
pub struct StdOut {
    cancelled: Arc<AtomicBool>,
    wakeup:    Arc<Notify>,
}

impl StdOut {
    pub fn new() -> Self {
        Self { cancelled: Arc::new(AtomicBool::new(false)), wakeup: Arc::new(Notify::new()) }
    }

    pub async fn initialize(&self) -> Result<()> {
        Ok(())
    }

    pub async fn read(&self, _length: usize) -> Result<Vec<u8>> {
        loop {
            let wakeup = self.wakeup.notified();
            if self.cancelled.load(Ordering::Relaxed) {
                return Err(MuxError::TransportClosed);
            }
            wakeup.await;
        }
    }

    pub async fn write(&self, data: &[u8]) -> Result<usize> {
        info!("stdout: {}", String::from_utf8_lossy(data).trim_end());
        Ok(data.len())
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
        self.wakeup.notify_waiters();
    }
}

impl Default for StdOut {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn positional_read_and_append_write() {
        let io = FileIo::new_with_contents(b"abcdef");
        io.initialize().await.unwrap();
        assert_eq!(io.read(3).await.unwrap(), b"abc");
        assert_eq!(io.read(3).await.unwrap(), b"def");
        io.write(b"gh").await.unwrap();
        assert_eq!(io.read(2).await.unwrap(), b"gh");
    }

    #[tokio::test]
    async fn missing_file_fails_initialize() {
        let io = FileIo::new(PathBuf::from("/nonexistent/replay.bin"));
        assert!(io.initialize().await.is_err());
    }

    #[tokio::test]
    async fn stdout_read_unblocks_on_cancel() {
        let out = Arc::new(StdOut::new());
        let reader = {
            let out = Arc::clone(&out);
            tokio::spawn(async move { out.read(1).await })
        };
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        out.cancel();
        assert!(matches!(reader.await.unwrap(), Err(MuxError::TransportClosed)));
    }
}
