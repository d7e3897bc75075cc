//! Linux hardware watchdog.
//!
//! The character device at `/dev/watchdog` reboots the system unless it is
//! fed in time.  Feeding is any write that is not the letter `V`; writing
//! `V` immediately before closing disarms it ("magic close").  Timeout
//! pacing goes through the `'W'` ioctl family.
//!
//! A small counter file records how many watchdog resets the system has been
//! through, so a crash loop can be broken by refusing to arm after a ceiling.

use std::fs;
use std::io::Write;
use std::os::fd::AsRawFd;
use std::path::{Path, PathBuf};

use log::{error, info};

use crate::error::{MuxError, Result};

const WATCHDOG_DEVICE: &str = "/dev/watchdog";

/// `struct watchdog_info` from the kernel's watchdog.h.
#[repr(C)]
#[derive(Debug)]
pub struct WatchdogInfo {
    options:          u32,
    firmware_version: u32,
    identity:         [u8; 32],
}

nix::ioctl_read!(wdioc_getsupport, b'W', 0, WatchdogInfo);
nix::ioctl_readwrite!(wdioc_settimeout, b'W', 6, libc::c_int);
nix::ioctl_read!(wdioc_gettimeout, b'W', 7, libc::c_int);

pub struct Watchdog {
    file:    fs::File,
    timeout: u64,
}

impl Watchdog {
    /// Open and arm the hardware watchdog.  With `timeout` given the driver
    /// is reprogrammed and the result verified; otherwise the driver default
    /// is adopted.
    pub fn arm(timeout: Option<u64>) -> Result<Self> {
        let file = fs::OpenOptions::new()
            .write(true)
            .open(WATCHDOG_DEVICE)
            .map_err(|e| MuxError::Watchdog(format!("cannot open {WATCHDOG_DEVICE}: {e}")))?;
        let fd = file.as_raw_fd();

        let mut info = WatchdogInfo { options: 0, firmware_version: 0, identity: [0; 32] };
        if unsafe { wdioc_getsupport(fd, &mut info) }.is_ok() {
            let identity =
                String::from_utf8_lossy(&info.identity).trim_end_matches('\0').to_string();
            info!(
                "watchdog: identity {identity:?}, options {:#X}, firmware {}",
                info.options, info.firmware_version
            );
        }

        let timeout = match timeout {
            Some(wanted) => {
                let mut value = wanted as libc::c_int;
                unsafe { wdioc_settimeout(fd, &mut value) }
                    .map_err(|e| MuxError::Watchdog(format!("cannot set timeout {wanted}: {e}")))?;
                let actual = read_timeout(fd)?;
                if actual != wanted {
                    return Err(MuxError::Watchdog(format!(
                        "driver kept timeout {actual} instead of {wanted}"
                    )));
                }
                actual
            }
            None => read_timeout(fd)?,
        };
        info!("watchdog: armed with a {timeout} s timeout");
        Ok(Self { file, timeout })
    }

    pub fn timeout(&self) -> u64 {
        self.timeout
    }

    /// Push the reboot deadline out by one timeout period.
    pub fn feed(&mut self) {
        if let Err(e) = self.file.write_all(b"\0") {
            error!("watchdog: feeding failed: {e}");
        }
    }

    /// Magic close: disarm instead of triggering a reboot on drop.
    pub fn disarm(mut self) {
        info!("watchdog: disarming");
        if let Err(e) = self.file.write_all(b"V") {
            error!("watchdog: magic close failed: {e}");
        }
    }
}

fn read_timeout(fd: libc::c_int) -> Result<u64> {
    let mut value: libc::c_int = 0;
    unsafe { wdioc_gettimeout(fd, &mut value) }
        .map_err(|e| MuxError::Watchdog(format!("cannot read timeout: {e}")))?;
    Ok(value as u64)
}

// ── Reset counter ─────────────────────────────────────────────────────────────

/// Persisted count of watchdog-induced reboots.
pub struct ResetCounter {
    path: PathBuf,
}

impl ResetCounter {
    pub fn new(path: &Path) -> Self {
        Self { path: path.to_path_buf() }
    }

    /// Current count; a missing or unreadable file counts as `fallback`
    /// (the value from the configuration document).
    pub fn load(&self, fallback: u32) -> u32 {
        match fs::read_to_string(&self.path) {
            Ok(content) => content.trim().parse().unwrap_or(fallback),
            Err(_) => fallback,
        }
    }

    pub fn store(&self, value: u32) {
        if let Err(e) = fs::write(&self.path, format!("{value}\n")) {
            error!("reset counter: cannot write {}: {e}", self.path.display());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counter_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let counter = ResetCounter::new(&dir.path().join("resets"));
        assert_eq!(counter.load(2), 2);
        counter.store(3);
        assert_eq!(counter.load(0), 3);
        counter.store(0);
        assert_eq!(counter.load(7), 0);
    }

    #[test]
    fn corrupt_counter_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("resets");
        fs::write(&path, "not-a-number").unwrap();
        assert_eq!(ResetCounter::new(&path).load(1), 1);
    }
}
