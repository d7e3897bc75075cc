//! System-clock sink device.
//!
//! Watches the ship state for a bridged UTC date and time of day (populated
//! by valid RMC traffic) and sets the OS clock from the first complete pair,
//! then stops.  Useful on boat computers without an RTC battery.

use std::io;

use chrono::NaiveDateTime;
use log::{error, info};
use tokio::task::JoinHandle;

use crate::device::EMIT_INTERVAL;
use crate::error::Result;
use crate::state::ShipState;

pub struct SetTimeDevice {
    name:  String,
    state: ShipState,
}

impl SetTimeDevice {
    pub fn new(name: String, state: ShipState) -> Self {
        Self { name, state }
    }

    /// Spawn the polling task; it ends itself once the clock has been set.
    pub fn start(&self) -> Vec<JoinHandle<()>> {
        let name = self.name.clone();
        let state = self.state.clone();
        info!("{name}: set-time device initialized");
        vec![tokio::spawn(async move {
            loop {
                tokio::time::sleep(EMIT_INTERVAL).await;
                let pair = state.read(|s| (s.utc_date.get(), s.utc_time.get()));
                if let (Some(date), Some(time)) = pair {
                    let datetime = NaiveDateTime::new(date, time);
                    match set_system_time(&datetime) {
                        Ok(()) => info!("{name}: system clock set to {datetime} UTC"),
                        Err(e) => error!("{name}: setting system clock failed: {e}"),
                    }
                    return;
                }
            }
        })]
    }
}

/// Set the OS clock to `datetime`, interpreted as UTC.
fn set_system_time(datetime: &NaiveDateTime) -> Result<()> {
    let utc = datetime.and_utc();
    let tv = libc::timeval {
        tv_sec:  utc.timestamp() as libc::time_t,
        tv_usec: libc::suseconds_t::from(utc.timestamp_subsec_micros()),
    };
    let rc = unsafe { libc::settimeofday(&tv, std::ptr::null()) };
    if rc != 0 {
        return Err(io::Error::last_os_error().into());
    }
    Ok(())
}
