//! Device task supervision and watchdog feeding.
//!
//! All device tasks are spawned as daemons and inspected periodically.  While
//! every task is alive the hardware watchdog (if armed) is fed each cycle;
//! the moment any task ends, feeding stops, the persisted reset counter is
//! bumped, and the watchdog is left to expire and reboot the system.

use std::time::Duration;

use log::{error, info, warn};
use tokio::task::JoinHandle;

use crate::config::WatchdogConfig;
use crate::watchdog::{ResetCounter, Watchdog};

/// Lower bound on the inspection interval.
const MIN_WATCH_INTERVAL: Duration = Duration::from_secs(30);

struct WatchedTask {
    device: String,
    handle: JoinHandle<()>,
    logged: bool,
}

pub struct Supervisor {
    tasks:    Vec<WatchedTask>,
    watchdog: Option<Watchdog>,
    counter:  ResetCounter,
    resets:   u32,
}

impl Supervisor {
    pub fn new(counter: ResetCounter, resets: u32) -> Self {
        Self { tasks: Vec::new(), watchdog: None, counter, resets }
    }

    /// Arm the hardware watchdog per configuration.  Arming failures are not
    /// fatal for the system: it keeps multiplexing without a watchdog.
    pub fn arm_watchdog(&mut self, cfg: &WatchdogConfig) {
        if !cfg.enable {
            return;
        }
        if self.resets >= cfg.max_resets {
            error!(
                "watchdog: not arming, device was already reset {} times (ceiling {})",
                self.resets, cfg.max_resets
            );
            return;
        }
        match Watchdog::arm(cfg.timeout) {
            Ok(wd) => self.watchdog = Some(wd),
            Err(e) => error!("watchdog: arming failed, continuing without: {e}"),
        }
    }

    pub fn add_tasks(&mut self, device: &str, handles: Vec<JoinHandle<()>>) {
        for handle in handles {
            self.tasks.push(WatchedTask { device: device.to_string(), handle, logged: false });
        }
    }

    fn watch_interval(&self) -> Duration {
        match &self.watchdog {
            Some(wd) => MIN_WATCH_INTERVAL.max(Duration::from_secs(wd.timeout() / 4)),
            None => MIN_WATCH_INTERVAL,
        }
    }

    /// Inspect tasks forever.  Returns only indirectly: on clean shutdown the
    /// caller drops the future and calls [`Supervisor::shutdown`].
    pub async fn run(&mut self) {
        let interval = self.watch_interval();
        info!("supervisor: watching {} tasks every {interval:?}", self.tasks.len());
        let mut feeding = self.watchdog.is_some();
        loop {
            tokio::time::sleep(interval).await;

            let mut any_ended = false;
            for task in &mut self.tasks {
                if task.handle.is_finished() {
                    any_ended = true;
                    if !task.logged {
                        task.logged = true;
                        warn!("supervisor: a task of device {} has terminated", task.device);
                    }
                }
            }

            if any_ended {
                if feeding {
                    feeding = false;
                    self.resets += 1;
                    self.counter.store(self.resets);
                    error!(
                        "supervisor: device task ended, watchdog feeding stopped; \
                         system will reset (count {})",
                        self.resets
                    );
                }
            } else if feeding {
                if let Some(wd) = self.watchdog.as_mut() {
                    wd.feed();
                }
            }
        }
    }

    /// Clean shutdown: abort every task, reset the persisted counter and
    /// magic-close the watchdog so it does not fire.
    pub fn shutdown(self) {
        info!("supervisor: shutting down");
        for task in &self.tasks {
            task.handle.abort();
        }
        self.counter.store(0);
        if let Some(wd) = self.watchdog {
            wd.disarm();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn interval_floor_without_watchdog() {
        let dir = tempfile::tempdir().unwrap();
        let counter = ResetCounter::new(&dir.path().join("resets"));
        let supervisor = Supervisor::new(counter, 0);
        assert_eq!(supervisor.watch_interval(), Duration::from_secs(30));
    }

    #[tokio::test]
    async fn shutdown_aborts_tasks_and_resets_counter() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("resets");
        let counter = ResetCounter::new(&path);
        counter.store(2);

        let mut supervisor = Supervisor::new(ResetCounter::new(&path), 2);
        let handle = tokio::spawn(async {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        });
        supervisor.add_tasks("probe", vec![handle]);
        supervisor.shutdown();

        assert_eq!(ResetCounter::new(&path).load(9), 0);
    }
}
