//! Shared device plumbing.
//!
//! Every bridged device runs the same four-task shape: a frame task feeding a
//! read queue, an ingest task mapping messages onto the ship state, an emit
//! task assembling outbound messages from the state, and a write task
//! draining the write queue into the transport.  This module holds the parts
//! common to all protocols: queues, the own-echo set, the raw I/O log and
//! the auto-flush counter.

use std::collections::HashSet;
use std::fs;
use std::hash::Hash;
use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use log::warn;

use crate::error::Result;
use crate::queue::TimedQueue;
use crate::state::ShipState;
use crate::transport::Io;

/// Period of every device's emit task.
pub const EMIT_INTERVAL: Duration = Duration::from_millis(500);

/// Capacity of the per-device read and write queues.
pub const QUEUE_CAPACITY: usize = 30;

/// Default maximum age of a queued message.
pub const DEFAULT_MAX_ITEM_AGE: Duration = Duration::from_secs(30);

/// How many foreign pass-through datagrams one emit cycle forwards at most.
pub const FORWARD_BATCH: usize = 10;

// ── Raw I/O log ───────────────────────────────────────────────────────────────

/// Append-only per-device log of every frame that crossed the transport,
/// `<-` for ingoing and `->` for outgoing.
pub struct RawLogger {
    file: Mutex<fs::File>,
}

impl RawLogger {
    pub fn open(log_dir: &Path, device_name: &str) -> Result<Self> {
        fs::create_dir_all(log_dir)?;
        let path = log_dir.join(format!("{device_name}_raw.log"));
        let file = fs::OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self { file: Mutex::new(file) })
    }

    fn write(&self, level: &str, sign: &str, text: &str) {
        let stamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
        let mut file = self.file.lock().unwrap();
        let _ = writeln!(file, "{stamp} {level} {sign} {text}");
    }

    pub fn info_in(&self, text: &str) {
        self.write("INFO", "<-", text);
    }

    pub fn info_out(&self, text: &str) {
        self.write("INFO", "->", text);
    }

    pub fn warn_in(&self, text: &str) {
        self.write("WARN", "<-", text);
    }

    pub fn error_in(&self, text: &str) {
        self.write("ERROR", "<-", text);
    }
}

/// Render bytes for the raw log: `0x27 0x01 0x17 0x01`.
pub fn bytes_to_str(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("0x{b:02X}")).collect::<Vec<_>>().join(" ")
}

// ── Common device core ────────────────────────────────────────────────────────

/// Protocol-independent device core.  `K` is the message-kind key of the
/// own-echo set: the three-letter tag for NMEA, the command byte for Seatalk.
pub struct DeviceCommon<K> {
    name:        String,
    pub io:      Arc<Io>,
    pub state:   ShipState,
    pub raw_log: RawLogger,
    write_queue: TimedQueue<Vec<u8>>,
    own_echo:    Mutex<HashSet<K>>,
    auto_flush:  Option<u32>,
    flush_count: AtomicU32,
}

impl<K: Eq + Hash + Clone> DeviceCommon<K> {
    pub fn new(
        name: String,
        io: Io,
        state: ShipState,
        log_dir: &Path,
        auto_flush: Option<u32>,
        max_item_age: Option<Duration>,
    ) -> Result<Self> {
        let raw_log = RawLogger::open(log_dir, &name)?;
        let max_age = max_item_age.unwrap_or(DEFAULT_MAX_ITEM_AGE);
        Ok(Self {
            name,
            io: Arc::new(io),
            state,
            raw_log,
            write_queue: TimedQueue::new(QUEUE_CAPACITY, max_age),
            own_echo: Mutex::new(HashSet::new()),
            auto_flush,
            flush_count: AtomicU32::new(0),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Note a message kind as having been received from this device; it will
    /// never be emitted back to it.
    pub fn note_own(&self, key: K) {
        self.own_echo.lock().unwrap().insert(key);
    }

    pub fn is_own(&self, key: &K) -> bool {
        self.own_echo.lock().unwrap().contains(key)
    }

    /// Count one framed message toward the auto-flush threshold.
    pub async fn check_flush(&self) {
        let Some(threshold) = self.auto_flush else {
            return;
        };
        let seen = self.flush_count.fetch_add(1, Ordering::Relaxed) + 1;
        if seen >= threshold {
            self.flush_count.store(0, Ordering::Relaxed);
            if let Err(e) = self.io.flush().await {
                warn!("{}: auto-flush failed: {e}", self.name);
            }
        }
    }

    /// Number of serialized messages waiting for the write task.
    pub fn pending_writes(&self) -> usize {
        self.write_queue.len()
    }

    /// Enqueue serialized bytes for the write task.  A full queue drops the
    /// message: instruments want the freshest reading, never a delayed one.
    pub fn enqueue_write(&self, bytes: Vec<u8>) {
        if self.write_queue.is_full() {
            warn!("{}: write queue is full, not writing", self.name);
            return;
        }
        self.write_queue.push(bytes);
    }

    /// Drain the write queue into the transport, raw-logging each frame.
    /// `render` turns the payload into its raw-log representation.
    pub async fn write_task(&self, render: fn(&[u8]) -> String) {
        loop {
            let bytes = self.write_queue.pop().await;
            match self.io.write(&bytes).await {
                Ok(_) => self.raw_log.info_out(&render(&bytes)),
                Err(e) => {
                    warn!("{}: write failed: {e}", self.name);
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{FileIo, Transport};

    fn test_common(auto_flush: Option<u32>) -> DeviceCommon<String> {
        let dir = tempfile::tempdir().unwrap();
        let io = Io::new(Transport::File(FileIo::new_with_contents(b"")), None);
        DeviceCommon::new(
            "test".into(),
            io,
            ShipState::new(Duration::from_secs(60)),
            dir.path(),
            auto_flush,
            None,
        )
        .unwrap()
    }

    #[test]
    fn own_echo_set_membership() {
        let common = test_common(None);
        assert!(!common.is_own(&"RMC".to_string()));
        common.note_own("RMC".to_string());
        assert!(common.is_own(&"RMC".to_string()));
        assert!(!common.is_own(&"DBT".to_string()));
    }

    #[test]
    fn bytes_render_as_hex() {
        assert_eq!(bytes_to_str(&[0x27, 0x01, 0x17, 0x01]), "0x27 0x01 0x17 0x01");
    }

    #[tokio::test]
    async fn full_write_queue_drops_message() {
        let common = test_common(None);
        for i in 0..QUEUE_CAPACITY {
            common.enqueue_write(vec![i as u8]);
        }
        common.enqueue_write(vec![0xFF]);
        assert_eq!(common.write_queue.len(), QUEUE_CAPACITY);
        // The overflowing message was dropped, the first is still there.
        assert_eq!(common.write_queue.try_pop(), Some(vec![0u8]));
    }

    #[test]
    fn raw_logger_writes_direction_signs() {
        let dir = tempfile::tempdir().unwrap();
        let logger = RawLogger::open(dir.path(), "probe").unwrap();
        logger.info_in("$INMTW,17.9,C*1B");
        logger.info_out("$--DBT,,f,22.28,M,,F*23");
        let content = fs::read_to_string(dir.path().join("probe_raw.log")).unwrap();
        assert!(content.contains("<- $INMTW"));
        assert!(content.contains("-> $--DBT"));
    }
}
