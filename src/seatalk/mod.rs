//! Seatalk bus device: framing loop, ship-state mapping and emission.

pub mod codec;
pub mod datagrams;

use std::sync::Arc;

use chrono::Timelike;
use log::{debug, error, info, warn};
use tokio::task::JoinHandle;

use crate::device::{bytes_to_str, DeviceCommon, EMIT_INTERVAL, FORWARD_BATCH, QUEUE_CAPACITY};
use crate::error::Result;
use crate::queue::TimedQueue;
use crate::state::{ShipData, UnknownEntry};
use crate::types::Position;
use codec::ReadOutcome;
use datagrams::{
    ApparentWindAngle, ApparentWindSpeed, CourseOverGround, Datagram, Date, Depth, GmtTime,
    LatitudePosition, LongitudePosition, RawPosition, Speed1, Speed2, SpeedOverGround,
    TargetWaypoint, TotalMileage, TripMileage, WaterTemperature1, WaterTemperature2,
};

pub struct SeatalkDevice {
    common:     Arc<DeviceCommon<u8>>,
    read_queue: Arc<TimedQueue<Datagram>>,
}

impl SeatalkDevice {
    pub fn new(common: DeviceCommon<u8>, max_item_age: std::time::Duration) -> Self {
        Self {
            common:     Arc::new(common),
            read_queue: Arc::new(TimedQueue::new(QUEUE_CAPACITY, max_item_age)),
        }
    }

    /// Spawn the device's frame, ingest, emit and write tasks.
    pub async fn start(&self) -> Result<Vec<JoinHandle<()>>> {
        self.common.io.initialize().await?;
        info!("{}: Seatalk device initialized", self.common.name());

        let mut tasks = Vec::new();

        let common = Arc::clone(&self.common);
        let read_queue = Arc::clone(&self.read_queue);
        tasks.push(tokio::spawn(async move {
            frame_task(&common, &read_queue).await;
        }));

        let common = Arc::clone(&self.common);
        let read_queue = Arc::clone(&self.read_queue);
        tasks.push(tokio::spawn(async move {
            loop {
                let datagram = read_queue.pop().await;
                ingest(&common, datagram);
            }
        }));

        let common = Arc::clone(&self.common);
        tasks.push(tokio::spawn(async move {
            loop {
                tokio::time::sleep(EMIT_INTERVAL).await;
                emit_cycle(&common);
            }
        }));

        let common = Arc::clone(&self.common);
        tasks.push(tokio::spawn(async move {
            common.write_task(bytes_to_str).await;
        }));

        Ok(tasks)
    }

    pub async fn shutdown(&self) {
        self.common.io.cancel().await;
    }
}

async fn frame_task(common: &DeviceCommon<u8>, read_queue: &TimedQueue<Datagram>) {
    loop {
        match codec::receive_datagram(&common.io).await {
            Ok(ReadOutcome::Datagram(framed)) => {
                common.note_own(framed.datagram.command());
                common.raw_log.info_in(&bytes_to_str(&framed.raw));
                debug!("{}: received {:02X}", common.name(), framed.datagram.command());
                read_queue.push(framed.datagram);
            }
            Ok(ReadOutcome::Protocol { error, raw }) => {
                if raw.len() == 1 {
                    // A lone unknown command byte; resync one byte at a time.
                    common.note_own(raw[0]);
                    warn!("{}: {error}", common.name());
                    common.raw_log.warn_in(&bytes_to_str(&raw));
                } else {
                    common.note_own(raw[0]);
                    error!("{}: {error}", common.name());
                    common.raw_log.error_in(&bytes_to_str(&raw));
                }
            }
            Err(e) => {
                error!("{}: read failed: {e}", common.name());
                return;
            }
        }
        common.check_flush().await;
    }
}

/// Map one datagram onto the ship state; datagrams without a mapping go to
/// the pass-through queue.
pub(crate) fn ingest(common: &DeviceCommon<u8>, datagram: Datagram) {
    let state = &common.state;
    match datagram {
        Datagram::Depth(d) => state.update(|s| s.depth_m.set(d.depth_m())),
        Datagram::ApparentWindAngle(w) => {
            state.update(|s| s.apparent_wind_angle.set(w.angle_degrees))
        }
        Datagram::ApparentWindSpeed(w) => {
            state.update(|s| s.apparent_wind_speed_knots.set(w.speed_knots))
        }
        Datagram::Speed1(s1) => state.update(|s| s.stw_knots.set(s1.stw_knots)),
        Datagram::Speed2(s2) => state.update(|s| s.stw_knots.set(s2.stw_knots)),
        Datagram::TripMileage(m) => state.update(|s| s.trip_mileage_nm.set(m.mileage_nm)),
        Datagram::TotalMileage(m) => state.update(|s| s.total_mileage_nm.set(m.mileage_nm)),
        Datagram::TotalTripLog(log) => state.update(|s| {
            s.trip_mileage_nm.set(log.trip_nm);
            s.total_mileage_nm.set(log.total_nm);
        }),
        Datagram::WaterTemperature1(t) => {
            if !t.sensor_defective {
                state.update(|s| s.water_temperature_c.set(t.temperature_c));
            }
        }
        Datagram::WaterTemperature2(t) => {
            state.update(|s| s.water_temperature_c.set(t.temperature_c))
        }
        Datagram::LampIntensity1(level) | Datagram::LampIntensity2(level) => {
            state.update(|s| s.lamp_intensity.set(level))
        }
        Datagram::LatitudePosition(p) => state.update(|s| s.latitude.set(p.position)),
        Datagram::LongitudePosition(p) => state.update(|s| s.longitude.set(p.position)),
        Datagram::RawPosition(p) => state.update(|s| {
            s.latitude.set(p.position.latitude);
            s.longitude.set(p.position.longitude);
        }),
        Datagram::SpeedOverGround(s1) => state.update(|s| s.sog_knots.set(s1.sog_knots)),
        Datagram::CourseOverGround(c) => {
            state.update(|s| s.cog_magnetic.set(c.course_degrees))
        }
        Datagram::GmtTime(t) => state.update(|s| s.utc_time.set(t.time)),
        Datagram::Date(d) => state.update(|s| s.utc_date.set(d.date)),
        Datagram::TargetWaypoint(w) => {
            state.update(|s| s.add_target_waypoint(w.name.clone(), None))
        }
        // No ship-state mapping; retain the raw bytes for opportunistic
        // forwarding onto other Seatalk buses.
        other => {
            state.unknown_seatalk.push(UnknownEntry {
                origin:  common.name().to_string(),
                payload: other.to_wire(),
            });
        }
    }
}

/// Assemble every datagram the current ship state supports.
pub(crate) fn build_candidates(state: &ShipData) -> Vec<Datagram> {
    let mut out = Vec::new();

    if let Some(depth_m) = state.depth_m.get() {
        out.push(Datagram::Depth(Depth::from_meters(depth_m)));
    }
    if let Some(angle) = state.apparent_wind_angle.get() {
        out.push(Datagram::ApparentWindAngle(ApparentWindAngle { angle_degrees: angle }));
    }
    if let Some(speed) = state.apparent_wind_speed_knots.get() {
        out.push(Datagram::ApparentWindSpeed(ApparentWindSpeed { speed_knots: speed }));
    }
    if let Some(stw) = state.stw_knots.get() {
        out.push(Datagram::Speed1(Speed1 { stw_knots: stw }));
        out.push(Datagram::Speed2(Speed2 { stw_knots: stw }));
    }
    if let Some(trip) = state.trip_mileage_nm.get() {
        out.push(Datagram::TripMileage(TripMileage { mileage_nm: trip }));
    }
    if let Some(total) = state.total_mileage_nm.get() {
        out.push(Datagram::TotalMileage(TotalMileage { mileage_nm: total }));
    }
    if let Some(temp) = state.water_temperature_c.get() {
        out.push(Datagram::WaterTemperature1(WaterTemperature1 {
            temperature_c:    temp,
            sensor_defective: false,
        }));
        out.push(Datagram::WaterTemperature2(WaterTemperature2 { temperature_c: temp }));
    }
    if let Some(level) = state.lamp_intensity.get() {
        out.push(Datagram::LampIntensity1(level));
        out.push(Datagram::LampIntensity2(level));
    }
    if let Some(latitude) = state.latitude.get() {
        out.push(Datagram::LatitudePosition(LatitudePosition { position: latitude }));
    }
    if let Some(longitude) = state.longitude.get() {
        out.push(Datagram::LongitudePosition(LongitudePosition { position: longitude }));
    }
    if let (Some(latitude), Some(longitude)) = (state.latitude.get(), state.longitude.get()) {
        out.push(Datagram::RawPosition(RawPosition {
            position: Position::new(latitude, longitude),
        }));
    }
    if let Some(sog) = state.sog_knots.get() {
        out.push(Datagram::SpeedOverGround(SpeedOverGround { sog_knots: sog }));
    }
    if let Some(cog) = state.cog_magnetic.get() {
        out.push(Datagram::CourseOverGround(CourseOverGround { course_degrees: cog }));
    }
    if let Some(time) = state.utc_time.get() {
        // The bus carries whole seconds only.
        let time = time.with_nanosecond(0).unwrap_or(time);
        out.push(Datagram::GmtTime(GmtTime { time }));
    }
    if let Some(date) = state.utc_date.get() {
        out.push(Datagram::Date(Date { date }));
    }
    if let Some(waypoints) = state.target_waypoints.get() {
        for (name, _) in &waypoints {
            match TargetWaypoint::new(name) {
                Ok(wp) => out.push(Datagram::TargetWaypoint(wp)),
                Err(e) => debug!("waypoint {name:?} not encodable: {e}"),
            }
        }
    }
    out
}

pub(crate) fn emit_cycle(common: &DeviceCommon<u8>) {
    for datagram in common.state.read(build_candidates) {
        if common.is_own(&datagram.command()) {
            continue;
        }
        common.enqueue_write(datagram.to_wire());
    }
    // Opportunistic forwarding of datagrams nobody could map.
    for entry in common.state.unknown_seatalk.drain(FORWARD_BATCH) {
        if entry.origin == common.name() {
            continue;
        }
        if let Some(&cmd) = entry.payload.first() {
            if common.is_own(&cmd) {
                continue;
            }
        }
        common.enqueue_write(entry.payload);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::ShipState;
    use crate::transport::{FileIo, Io, Transport};
    use std::time::Duration;

    fn test_common(name: &str) -> DeviceCommon<u8> {
        let dir = tempfile::tempdir().unwrap();
        let io = Io::new(Transport::File(FileIo::new_with_contents(b"")), None);
        DeviceCommon::new(
            name.into(),
            io,
            ShipState::new(Duration::from_secs(60)),
            dir.path(),
            None,
            None,
        )
        .unwrap()
    }

    #[test]
    fn depth_ingest_converts_to_meters() {
        let common = test_common("st");
        let mut depth = Depth::from_meters(0.0);
        depth.depth_feet = 73.1;
        ingest(&common, Datagram::Depth(depth));
        let depth_m = common.state.read(|s| s.depth_m.get()).unwrap();
        assert!((depth_m - 22.28).abs() < 0.01, "depth={depth_m}");
    }

    #[test]
    fn unmapped_datagram_lands_in_passthrough_queue() {
        let common = test_common("st");
        ingest(&common, Datagram::SetRudderGain(5));
        let entry = common.state.unknown_seatalk.try_pop().unwrap();
        assert_eq!(entry.origin, "st");
        assert_eq!(entry.payload, vec![0x91, 0x00, 0x05]);
    }

    #[test]
    fn candidates_cover_populated_state() {
        let common = test_common("st");
        common.state.update(|s| {
            s.stw_knots.set(6.3);
            s.water_temperature_c.set(17.0);
            s.lamp_intensity.set(2);
        });
        let candidates = common.state.read(build_candidates);
        let commands: Vec<u8> = candidates.iter().map(|d| d.command()).collect();
        // Both variants of each doubled quantity.
        assert!(commands.contains(&0x20) && commands.contains(&0x26));
        assert!(commands.contains(&0x23) && commands.contains(&0x27));
        assert!(commands.contains(&0x30) && commands.contains(&0x80));
        assert_eq!(commands.len(), 6);
    }

    #[test]
    fn own_echo_suppression_in_emit_cycle() {
        let common = test_common("st");
        common.state.update(|s| s.water_temperature_c.set(17.9));
        // The device itself sent water temperature datagrams before.
        common.note_own(0x23);
        common.note_own(0x27);
        emit_cycle(&common);
        assert_eq!(common.pending_writes(), 0);

        // A quantity the device never sent does go out.
        common.state.update(|s| s.depth_m.set(7.3));
        emit_cycle(&common);
        assert_eq!(common.pending_writes(), 1);
    }
}
