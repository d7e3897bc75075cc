//! NMEA bus device: line framing, ship-state mapping and emission.

pub mod sentence;

use std::sync::Arc;

use chrono::NaiveDateTime;
use log::{error, info, warn};
use tokio::task::JoinHandle;

use crate::device::{DeviceCommon, EMIT_INTERVAL, FORWARD_BATCH, QUEUE_CAPACITY};
use crate::error::Result;
use crate::queue::TimedQueue;
use crate::state::{ShipData, UnknownEntry};
use crate::transport::Io;
use crate::types::Position;
use sentence::{Dbt, Mtw, Mwv, NmeaDatagram, NmeaSentence, Rmc, Validity, Vhw, Vtg};

/// Guard against a stream that never terminates a line.
const MAX_LINE_LENGTH: usize = 256;

pub struct NmeaDevice {
    common:     Arc<DeviceCommon<String>>,
    read_queue: Arc<TimedQueue<NmeaSentence>>,
}

impl NmeaDevice {
    pub fn new(common: DeviceCommon<String>, max_item_age: std::time::Duration) -> Self {
        Self {
            common:     Arc::new(common),
            read_queue: Arc::new(TimedQueue::new(QUEUE_CAPACITY, max_item_age)),
        }
    }

    /// Spawn the device's frame, ingest, emit and write tasks.
    pub async fn start(&self) -> Result<Vec<JoinHandle<()>>> {
        self.common.io.initialize().await?;
        info!("{}: NMEA device initialized", self.common.name());

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
                let sentence = read_queue.pop().await;
                ingest(&common, sentence);
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
            common
                .write_task(|bytes| String::from_utf8_lossy(bytes).trim_end().to_string())
                .await;
        }));

        Ok(tasks)
    }

    pub async fn shutdown(&self) {
        self.common.io.cancel().await;
    }
}

/// Read one framed sentence: scan for `$`/`!`, then collect through `\n`.
async fn receive_line(io: &Io) -> Result<String> {
    let mut line = Vec::with_capacity(82);
    loop {
        let byte = io.read_byte().await?;
        if line.is_empty() {
            if byte == b'$' || byte == b'!' {
                line.push(byte);
            }
            continue;
        }
        line.push(byte);
        if byte == b'\n' {
            return Ok(String::from_utf8_lossy(&line).into_owned());
        }
        if line.len() > MAX_LINE_LENGTH {
            // Give up on this frame and hunt for the next start byte.
            line.clear();
        }
    }
}

async fn frame_task(common: &DeviceCommon<String>, read_queue: &TimedQueue<NmeaSentence>) {
    loop {
        let line = match receive_line(&common.io).await {
            Ok(line) => line,
            Err(e) => {
                error!("{}: read failed: {e}", common.name());
                return;
            }
        };
        match sentence::parse_lenient(&line) {
            Ok(parsed) => {
                if matches!(parsed.datagram, NmeaDatagram::Unknown(_)) {
                    warn!("{}: could not promote sentence: {}", common.name(), line.trim_end());
                    common.raw_log.warn_in(line.trim_end());
                } else {
                    common.raw_log.info_in(line.trim_end());
                }
                common.note_own(parsed.tag().to_string());
                read_queue.push(parsed);
            }
            // Framing and checksum failures are terminal for the line.
            Err(e) => {
                error!("{}: {e}", common.name());
                common.raw_log.error_in(line.trim_end());
                if let Err(e) = common.io.flush().await {
                    warn!("{}: flush after bad line failed: {e}", common.name());
                }
            }
        }
        common.check_flush().await;
    }
}

/// Map one sentence onto the ship state; pass-through sentences go to the
/// unknown-NMEA queue.
pub(crate) fn ingest(common: &DeviceCommon<String>, sentence: NmeaSentence) {
    let state = &common.state;
    match sentence.datagram {
        NmeaDatagram::Rmc(rmc) => state.update(|s| {
            s.utc_date.set(rmc.datetime.date());
            s.utc_time.set(rmc.datetime.time());
            s.latitude.set(rmc.position.latitude);
            s.longitude.set(rmc.position.longitude);
            if let Some(sog) = rmc.sog_knots {
                s.sog_knots.set(sog);
            }
        }),
        NmeaDatagram::Vtg(vtg) => state.update(|s| {
            if let Some(sog) = vtg.sog_knots {
                s.sog_knots.set(sog);
            }
            if let Some(cog) = vtg.cog_true {
                s.cog_true.set(cog);
            }
            if let Some(cog) = vtg.cog_magnetic {
                s.cog_magnetic.set(cog);
            }
        }),
        // Parsed for validation but carries nothing the ship state tracks.
        NmeaDatagram::Gsa(_) => {}
        NmeaDatagram::Dbt(dbt) => {
            if let Some(depth) = dbt.depth_m {
                state.update(|s| s.depth_m.set(depth));
            }
        }
        NmeaDatagram::Vhw(vhw) => state.update(|s| {
            if let Some(stw) = vhw.stw_knots {
                s.stw_knots.set(stw);
            }
            if let Some(heading) = vhw.heading_true {
                s.heading_true.set(heading);
            }
            if let Some(heading) = vhw.heading_magnetic {
                s.heading_magnetic.set(heading);
            }
        }),
        NmeaDatagram::Mtw(mtw) => state.update(|s| s.water_temperature_c.set(mtw.temperature_c)),
        NmeaDatagram::Mwv(mwv) => state.update(|s| {
            if mwv.reference_true {
                s.true_wind_speed_knots.set(mwv.speed_knots);
                s.true_wind_angle.set(mwv.angle_degrees);
            } else {
                s.apparent_wind_speed_knots.set(mwv.speed_knots);
                s.apparent_wind_angle.set(mwv.angle_degrees);
            }
        }),
        NmeaDatagram::Unknown(raw) => {
            state.unknown_nmea.push(UnknownEntry {
                origin:  common.name().to_string(),
                payload: raw,
            });
        }
    }
}

/// Assemble every sentence the current ship state supports.
pub(crate) fn build_candidates(state: &ShipData) -> Vec<NmeaSentence> {
    let mut out = Vec::new();

    if let (Some(date), Some(latitude), Some(longitude), Some(sog)) = (
        state.utc_date.get(),
        state.latitude.get(),
        state.longitude.get(),
        state.sog_knots.get(),
    ) {
        let time = state.utc_time.get().unwrap_or(chrono::NaiveTime::MIN);
        out.push(NmeaSentence::own(NmeaDatagram::Rmc(Rmc {
            datetime: NaiveDateTime::new(date, time),
            validity: Validity::Valid,
            position: Position::new(latitude, longitude),
            sog_knots: Some(sog),
            track_made_good: None,
            magnetic_variation: None,
            variation_sense: None,
            mode: None,
        })));
    }
    if let (Some(cog_true), Some(cog_magnetic), Some(sog)) =
        (state.cog_true.get(), state.cog_magnetic.get(), state.sog_knots.get())
    {
        out.push(NmeaSentence::own(NmeaDatagram::Vtg(Vtg {
            cog_true:     Some(cog_true),
            cog_magnetic: Some(cog_magnetic),
            sog_knots:    Some(sog),
            mode:         None,
        })));
    }
    if let Some(depth) = state.depth_m.get() {
        out.push(NmeaSentence::own(NmeaDatagram::Dbt(Dbt { depth_m: Some(depth) })));
    }
    if let (Some(stw), Some(heading_true), Some(heading_magnetic)) =
        (state.stw_knots.get(), state.heading_true.get(), state.heading_magnetic.get())
    {
        out.push(NmeaSentence::own(NmeaDatagram::Vhw(Vhw {
            heading_true:     Some(heading_true),
            heading_magnetic: Some(heading_magnetic),
            stw_knots:        Some(stw),
        })));
    }
    if let Some(temp) = state.water_temperature_c.get() {
        out.push(NmeaSentence::own(NmeaDatagram::Mtw(Mtw { temperature_c: temp })));
    }
    if let (Some(speed), Some(angle)) =
        (state.true_wind_speed_knots.get(), state.true_wind_angle.get())
    {
        out.push(NmeaSentence::own(NmeaDatagram::Mwv(Mwv {
            angle_degrees:  angle,
            reference_true: true,
            speed_knots:    speed,
            validity:       Validity::Valid,
        })));
    }
    if let (Some(speed), Some(angle)) =
        (state.apparent_wind_speed_knots.get(), state.apparent_wind_angle.get())
    {
        out.push(NmeaSentence::own(NmeaDatagram::Mwv(Mwv {
            angle_degrees:  angle,
            reference_true: false,
            speed_knots:    speed,
            validity:       Validity::Valid,
        })));
    }
    out
}

pub(crate) fn emit_cycle(common: &DeviceCommon<String>) {
    for sentence in common.state.read(build_candidates) {
        if common.is_own(&sentence.tag().to_string()) {
            continue;
        }
        common.enqueue_write(sentence.to_wire().into_bytes());
    }
    // Opportunistic forwarding of sentences nobody could promote.
    for entry in common.state.unknown_nmea.drain(FORWARD_BATCH) {
        if entry.origin == common.name() {
            continue;
        }
        let tag = entry.payload.get(3..6).unwrap_or("").to_string();
        if common.is_own(&tag) {
            continue;
        }
        common.enqueue_write(entry.payload.into_bytes());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::ShipState;
    use crate::transport::{FileIo, Transport};
    use std::time::Duration;

    fn test_common(name: &str) -> DeviceCommon<String> {
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

    #[tokio::test]
    async fn receive_line_scans_to_start_byte() {
        let io = Io::new(
            Transport::File(FileIo::new_with_contents(b"garbage$INMTW,17.9,C*1B\r\n")),
            None,
        );
        let line = receive_line(&io).await.unwrap();
        assert_eq!(line, "$INMTW,17.9,C*1B\r\n");
    }

    #[test]
    fn mtw_ingest_updates_water_temperature() {
        let common = test_common("gps");
        let sentence = sentence::parse("$INMTW,17.9,C*1B\r\n").unwrap();
        ingest(&common, sentence);
        assert_eq!(common.state.read(|s| s.water_temperature_c.get()), Some(17.9));
    }

    #[test]
    fn rmc_ingest_populates_position_and_time() {
        let common = test_common("gps");
        let line =
            "$GPRMC,144858.193500,A,5235.3151,N,00207.6577,W,0.0,144.8,160610,3.6,W,A*32\r\n";
        ingest(&common, sentence::parse(line).unwrap());
        let (lat, lon, sog) = common.state.read(|s| {
            (s.latitude.get(), s.longitude.get(), s.sog_knots.get())
        });
        let lat = lat.unwrap();
        let lon = lon.unwrap();
        assert_eq!(lat.degrees, 52);
        assert!((lat.minutes - 35.3151).abs() < 1e-9);
        assert_eq!(lon.degrees, 2);
        assert!((lon.minutes - 7.6577).abs() < 1e-9);
        assert_eq!(sog, Some(0.0));
    }

    #[test]
    fn unknown_sentence_queued_for_forwarding() {
        let common = test_common("gps");
        let body = "GPGLL,4916.45,N,12311.12,W,225444,A";
        let line = format!("${body}*{:02X}\r\n", sentence::checksum(body));
        ingest(&common, sentence::parse_lenient(&line).unwrap());
        let entry = common.state.unknown_nmea.try_pop().unwrap();
        assert_eq!(entry.origin, "gps");
        assert_eq!(entry.payload, line);
    }

    #[test]
    fn emit_suppresses_own_tags() {
        let common = test_common("gps");
        common.state.update(|s| s.water_temperature_c.set(17.9));
        common.note_own("MTW".to_string());
        emit_cycle(&common);
        assert_eq!(common.pending_writes(), 0);

        common.state.update(|s| s.depth_m.set(22.28));
        emit_cycle(&common);
        assert_eq!(common.pending_writes(), 1);
    }

    #[test]
    fn mwv_pair_emitted_when_both_winds_known() {
        let common = test_common("gps");
        common.state.update(|s| {
            s.true_wind_speed_knots.set(12.0);
            s.true_wind_angle.set(30.0);
            s.apparent_wind_speed_knots.set(14.0);
            s.apparent_wind_angle.set(25.0);
        });
        let candidates = common.state.read(build_candidates);
        let mwv: Vec<_> = candidates
            .iter()
            .filter_map(|s| match &s.datagram {
                NmeaDatagram::Mwv(m) => Some(m.reference_true),
                _ => None,
            })
            .collect();
        assert_eq!(mwv, vec![true, false]);
    }

    #[test]
    fn forwarding_skips_origin_device() {
        let common = test_common("gps");
        common.state.unknown_nmea.push(UnknownEntry {
            origin:  "gps".to_string(),
            payload: "$GPGLL,...*00\r\n".to_string(),
        });
        emit_cycle(&common);
        assert_eq!(common.pending_writes(), 0);

        common.state.unknown_nmea.push(UnknownEntry {
            origin:  "other".to_string(),
            payload: "$GPGLL,...*00\r\n".to_string(),
        });
        emit_cycle(&common);
        assert_eq!(common.pending_writes(), 1);
    }
}
