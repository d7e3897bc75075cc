//! Shared ship state.
//!
//! One store per process, written by every device's ingest task and read by
//! every emit task.  Each quantity is stamped on write and reads come back
//! empty once the entry is older than the configured maximum age, so a dead
//! instrument stops being bridged instead of freezing its last value onto
//! every other bus.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use chrono::{NaiveDate, NaiveTime};

use crate::queue::TimedQueue;
use crate::types::{PartPosition, Position};

pub const DEFAULT_MAX_AGE: Duration = Duration::from_secs(60);
const UNKNOWN_QUEUE_CAPACITY: usize = 100;

// ── Aged slot ─────────────────────────────────────────────────────────────────

/// A value plus its insertion stamp.  `get` applies the age policy.
#[derive(Debug)]
pub struct Aged<T> {
    slot:    Option<(T, Instant)>,
    max_age: Duration,
}

impl<T: Clone> Aged<T> {
    fn new(max_age: Duration) -> Self {
        Self { slot: None, max_age }
    }

    pub fn set(&mut self, value: T) {
        self.slot = Some((value, Instant::now()));
    }

    pub fn get(&self) -> Option<T> {
        match &self.slot {
            Some((value, stamp)) if stamp.elapsed() <= self.max_age => Some(value.clone()),
            _ => None,
        }
    }
}

// ── Store ─────────────────────────────────────────────────────────────────────

/// All bridged physical quantities.  Every field is optional and decays
/// independently.
#[derive(Debug)]
pub struct ShipData {
    // Time
    pub utc_date: Aged<NaiveDate>,
    pub utc_time: Aged<NaiveTime>,
    // Position
    pub latitude:         Aged<PartPosition>,
    pub longitude:        Aged<PartPosition>,
    pub target_waypoints: Aged<Vec<(String, Option<Position>)>>,
    // Heading and course (degrees)
    pub cog_true:         Aged<f64>,
    pub cog_magnetic:     Aged<f64>,
    pub heading_true:     Aged<f64>,
    pub heading_magnetic: Aged<f64>,
    // Speed (knots)
    pub sog_knots: Aged<f64>,
    pub stw_knots: Aged<f64>,
    // Wind
    pub true_wind_speed_knots:     Aged<f64>,
    pub true_wind_angle:           Aged<f64>,
    pub apparent_wind_speed_knots: Aged<f64>,
    pub apparent_wind_angle:       Aged<f64>,
    // Mileage (nautical miles)
    pub trip_mileage_nm:  Aged<f64>,
    pub total_mileage_nm: Aged<f64>,
    // Water
    pub depth_m:             Aged<f64>,
    pub water_temperature_c: Aged<f64>,
    // UI
    pub lamp_intensity: Aged<u8>,
}

impl ShipData {
    fn new(max_age: Duration) -> Self {
        Self {
            utc_date: Aged::new(max_age),
            utc_time: Aged::new(max_age),
            latitude: Aged::new(max_age),
            longitude: Aged::new(max_age),
            target_waypoints: Aged::new(max_age),
            cog_true: Aged::new(max_age),
            cog_magnetic: Aged::new(max_age),
            heading_true: Aged::new(max_age),
            heading_magnetic: Aged::new(max_age),
            sog_knots: Aged::new(max_age),
            stw_knots: Aged::new(max_age),
            true_wind_speed_knots: Aged::new(max_age),
            true_wind_angle: Aged::new(max_age),
            apparent_wind_speed_knots: Aged::new(max_age),
            apparent_wind_angle: Aged::new(max_age),
            trip_mileage_nm: Aged::new(max_age),
            total_mileage_nm: Aged::new(max_age),
            depth_m: Aged::new(max_age),
            water_temperature_c: Aged::new(max_age),
            lamp_intensity: Aged::new(max_age),
        }
    }

    /// Append a waypoint if no entry with the same name exists yet.
    pub fn add_target_waypoint(&mut self, name: String, position: Option<Position>) {
        let mut list = self.target_waypoints.get().unwrap_or_default();
        if !list.iter().any(|(n, _)| *n == name) {
            list.push((name, position));
        }
        self.target_waypoints.set(list);
    }
}

/// Datagram that parsed (or at least framed) but has no ship-state mapping.
/// Retained for opportunistic forwarding onto same-protocol buses.
#[derive(Debug, Clone)]
pub struct UnknownEntry<P> {
    /// Name of the device the entry arrived on (never forwarded back to it).
    pub origin:  String,
    pub payload: P,
}

/// Cloneable handle to the process-wide store.
#[derive(Clone)]
pub struct ShipState {
    data: Arc<Mutex<ShipData>>,
    /// Recognized-tag NMEA lines without a mapping, raw.
    pub unknown_nmea: Arc<TimedQueue<UnknownEntry<String>>>,
    /// Framed Seatalk datagrams without a mapping, raw bytes.
    pub unknown_seatalk: Arc<TimedQueue<UnknownEntry<Vec<u8>>>>,
}

impl ShipState {
    pub fn new(max_age: Duration) -> Self {
        Self {
            data: Arc::new(Mutex::new(ShipData::new(max_age))),
            unknown_nmea: Arc::new(TimedQueue::new(UNKNOWN_QUEUE_CAPACITY, max_age)),
            unknown_seatalk: Arc::new(TimedQueue::new(UNKNOWN_QUEUE_CAPACITY, max_age)),
        }
    }

    pub fn read<R>(&self, f: impl FnOnce(&ShipData) -> R) -> R {
        f(&self.data.lock().unwrap())
    }

    pub fn update<R>(&self, f: impl FnOnce(&mut ShipData) -> R) -> R {
        f(&mut self.data.lock().unwrap())
    }
}
