//! NMEA 0183 sentence codec.
//!
//! Wire format: `$<talker:2><tag:3>,<f1>,<f2>,…*<checksum:2>\r\n`, where the
//! checksum is the XOR of every byte strictly between `$` and `*`, printed as
//! two uppercase hex digits.  `!` is accepted as an alternative start byte.
//!
//! Parsing is strict about framing and checksum; an unrecognized tag or a
//! field that fails to parse degrades the line to [`NmeaDatagram::Unknown`]
//! so the raw bytes can still be forwarded.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Timelike};

use crate::error::NmeaError;
use crate::types::{units, Orientation, PartPosition, Position};

/// Locally generated sentences carry the placeholder talker id.
pub const OWN_TALKER_ID: &str = "--";

// ── Field enums ───────────────────────────────────────────────────────────────

/// `A` = valid, `V` = invalid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Validity {
    Valid,
    Invalid,
}

impl Validity {
    fn letter(self) -> char {
        match self {
            Validity::Valid => 'A',
            Validity::Invalid => 'V',
        }
    }

    fn from_field(s: &str) -> Result<Self, NmeaError> {
        match s {
            "A" => Ok(Validity::Valid),
            "V" => Ok(Validity::Invalid),
            other => Err(NmeaError::FieldParse(format!("bad validity {other:?}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GpsMode {
    Automatic,
    Manual,
}

impl GpsMode {
    fn letter(self) -> char {
        match self {
            GpsMode::Automatic => 'A',
            GpsMode::Manual => 'M',
        }
    }

    fn from_field(s: &str) -> Result<Self, NmeaError> {
        match s {
            "A" => Ok(GpsMode::Automatic),
            "M" => Ok(GpsMode::Manual),
            other => Err(NmeaError::FieldParse(format!("bad GPS mode {other:?}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixType {
    NotAvailable = 1,
    TwoD = 2,
    ThreeD = 3,
}

impl FixType {
    fn from_field(s: &str) -> Result<Self, NmeaError> {
        match s {
            "1" => Ok(FixType::NotAvailable),
            "2" => Ok(FixType::TwoD),
            "3" => Ok(FixType::ThreeD),
            other => Err(NmeaError::FieldParse(format!("bad fix type {other:?}"))),
        }
    }
}

/// FAA mode indicator appended by newer receivers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaaMode {
    Autonomous,
    Differential,
    Estimated,
    Simulator,
    NotValid,
}

impl FaaMode {
    fn letter(self) -> char {
        match self {
            FaaMode::Autonomous => 'A',
            FaaMode::Differential => 'D',
            FaaMode::Estimated => 'E',
            FaaMode::Simulator => 'S',
            FaaMode::NotValid => 'N',
        }
    }

    fn from_field(s: &str) -> Result<Self, NmeaError> {
        match s {
            "A" => Ok(FaaMode::Autonomous),
            "D" => Ok(FaaMode::Differential),
            "E" => Ok(FaaMode::Estimated),
            "S" => Ok(FaaMode::Simulator),
            "N" => Ok(FaaMode::NotValid),
            other => Err(NmeaError::FieldParse(format!("bad FAA mode {other:?}"))),
        }
    }
}

// ── Sentence records ──────────────────────────────────────────────────────────

/// Recommended minimum navigation data.
#[derive(Debug, Clone, PartialEq)]
pub struct Rmc {
    pub datetime:           NaiveDateTime,
    pub validity:           Validity,
    pub position:           Position,
    pub sog_knots:          Option<f64>,
    pub track_made_good:    Option<f64>,
    pub magnetic_variation: Option<f64>,
    pub variation_sense:    Option<Orientation>,
    pub mode:               Option<FaaMode>,
}

/// Track made good and ground speed.
#[derive(Debug, Clone, PartialEq)]
pub struct Vtg {
    pub cog_true:     Option<f64>,
    pub cog_magnetic: Option<f64>,
    pub sog_knots:    Option<f64>,
    pub mode:         Option<GpsMode>,
}

/// DOP and active satellites.
#[derive(Debug, Clone, PartialEq)]
pub struct Gsa {
    pub mode1:         GpsMode,
    pub mode2:         FixType,
    pub satellite_ids: Vec<Option<u16>>,
    pub pdop:          f64,
    pub hdop:          f64,
    pub vdop:          f64,
}

/// Depth below transducer, normalized to meters.
#[derive(Debug, Clone, PartialEq)]
pub struct Dbt {
    pub depth_m: Option<f64>,
}

/// Water speed and heading.
#[derive(Debug, Clone, PartialEq)]
pub struct Vhw {
    pub heading_true:     Option<f64>,
    pub heading_magnetic: Option<f64>,
    pub stw_knots:        Option<f64>,
}

/// Water temperature in degrees Celsius.
#[derive(Debug, Clone, PartialEq)]
pub struct Mtw {
    pub temperature_c: f64,
}

/// Wind speed and angle, speed normalized to knots.
#[derive(Debug, Clone, PartialEq)]
pub struct Mwv {
    pub angle_degrees:  f64,
    /// `T` reference when true wind, `R` when apparent.
    pub reference_true: bool,
    pub speed_knots:    f64,
    pub validity:       Validity,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NmeaDatagram {
    Rmc(Rmc),
    Vtg(Vtg),
    Gsa(Gsa),
    Dbt(Dbt),
    Vhw(Vhw),
    Mtw(Mtw),
    Mwv(Mwv),
    /// Pass-through of a line we could not promote, original bytes intact.
    Unknown(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct NmeaSentence {
    pub talker_id: String,
    pub datagram:  NmeaDatagram,
}

impl NmeaSentence {
    pub fn own(datagram: NmeaDatagram) -> Self {
        Self { talker_id: OWN_TALKER_ID.to_string(), datagram }
    }

    /// Three-letter tag of the sentence, used for the own-echo set.
    pub fn tag(&self) -> &str {
        match &self.datagram {
            NmeaDatagram::Rmc(_) => "RMC",
            NmeaDatagram::Vtg(_) => "VTG",
            NmeaDatagram::Gsa(_) => "GSA",
            NmeaDatagram::Dbt(_) => "DBT",
            NmeaDatagram::Vhw(_) => "VHW",
            NmeaDatagram::Mtw(_) => "MTW",
            NmeaDatagram::Mwv(_) => "MWV",
            NmeaDatagram::Unknown(raw) => raw.get(3..6).unwrap_or(""),
        }
    }
}

// ── Checksum ──────────────────────────────────────────────────────────────────

/// XOR over the sentence body (between `$` and `*`).
pub fn checksum(body: &str) -> u8 {
    body.bytes().fold(0u8, |acc, b| acc ^ b)
}

/// Verify the declared checksum of a framed line.
pub fn verify_checksum(line: &str) -> Result<(), NmeaError> {
    if !line.is_ascii()
        || line.len() < 9
        || !(line.starts_with('$') || line.starts_with('!'))
        || !line.ends_with("\r\n")
    {
        return Err(NmeaError::MalformedFraming(line.to_string()));
    }
    let declared = u8::from_str_radix(&line[line.len() - 4..line.len() - 2], 16)
        .map_err(|_| NmeaError::MalformedFraming(line.to_string()))?;
    let computed = checksum(&line[1..line.len() - 5]);
    if computed != declared {
        return Err(NmeaError::ChecksumMismatch { expected: declared, actual: computed });
    }
    Ok(())
}

// ── Parser ────────────────────────────────────────────────────────────────────

/// Strict parse of one framed line.  Fails on framing, checksum, unknown tag
/// and unparsable fields.
pub fn parse(line: &str) -> Result<NmeaSentence, NmeaError> {
    verify_checksum(line)?;
    if line.len() < 12 {
        return Err(NmeaError::MalformedFraming(line.to_string()));
    }
    if line.as_bytes()[6] != b',' {
        // Proprietary sentences have longer tags; keep them as pass-through.
        return Err(NmeaError::UnknownTag(line[3..line.len() - 5].to_string()));
    }

    let talker_id = line[1..3].to_string();
    let tag = &line[3..6];
    let fields: Vec<&str> = line[7..line.len() - 5].split(',').collect();

    let datagram = match tag {
        "RMC" => NmeaDatagram::Rmc(parse_rmc(&fields)?),
        "VTG" => NmeaDatagram::Vtg(parse_vtg(&fields)?),
        "GSA" => NmeaDatagram::Gsa(parse_gsa(&fields)?),
        "DBT" => NmeaDatagram::Dbt(parse_dbt(&fields)?),
        "VHW" => NmeaDatagram::Vhw(parse_vhw(&fields)?),
        "MTW" => NmeaDatagram::Mtw(parse_mtw(&fields)?),
        "MWV" => NmeaDatagram::Mwv(parse_mwv(&fields)?),
        other => return Err(NmeaError::UnknownTag(other.to_string())),
    };
    Ok(NmeaSentence { talker_id, datagram })
}

/// Parse one framed line, degrading unknown tags and field failures to a
/// pass-through [`NmeaDatagram::Unknown`].  Framing and checksum errors stay
/// hard errors.
pub fn parse_lenient(line: &str) -> Result<NmeaSentence, NmeaError> {
    match parse(line) {
        Ok(sentence) => Ok(sentence),
        Err(e @ (NmeaError::MalformedFraming(_) | NmeaError::ChecksumMismatch { .. })) => Err(e),
        Err(_) => Ok(NmeaSentence {
            talker_id: line.get(1..3).unwrap_or("").to_string(),
            datagram:  NmeaDatagram::Unknown(line.to_string()),
        }),
    }
}

fn field<'a>(fields: &[&'a str], index: usize) -> Result<&'a str, NmeaError> {
    fields
        .get(index)
        .copied()
        .ok_or_else(|| NmeaError::FieldParse(format!("missing field {index}")))
}

fn opt_f64(fields: &[&str], index: usize) -> Result<Option<f64>, NmeaError> {
    match fields.get(index) {
        None => Ok(None),
        Some(&"") => Ok(None),
        Some(s) => s
            .parse::<f64>()
            .map(Some)
            .map_err(|_| NmeaError::FieldParse(format!("bad float {s:?} at {index}"))),
    }
}

fn req_f64(fields: &[&str], index: usize) -> Result<f64, NmeaError> {
    opt_f64(fields, index)?
        .ok_or_else(|| NmeaError::FieldParse(format!("missing float at {index}")))
}

/// `hhmmss` with an optional fractional part.
fn parse_time(s: &str) -> Result<NaiveTime, NmeaError> {
    let bad = || NmeaError::FieldParse(format!("bad time {s:?}"));
    let (whole, frac) = match s.split_once('.') {
        Some((w, f)) => (w, f),
        None => (s, ""),
    };
    if whole.len() != 6 {
        return Err(bad());
    }
    let hour: u32 = whole[0..2].parse().map_err(|_| bad())?;
    let minute: u32 = whole[2..4].parse().map_err(|_| bad())?;
    let second: u32 = whole[4..6].parse().map_err(|_| bad())?;
    let micros = if frac.is_empty() {
        0
    } else {
        let padded = format!("{frac:0<6}");
        padded[..6].parse::<u32>().map_err(|_| bad())?
    };
    NaiveTime::from_hms_micro_opt(hour, minute, second, micros).ok_or_else(bad)
}

/// `ddmm.mmmm` (2 or 3 degree digits) plus hemisphere letter.
fn parse_part_position(
    coord: &str,
    hemi: &str,
    degree_digits: usize,
    max_degrees: u16,
) -> Result<PartPosition, NmeaError> {
    let bad = || NmeaError::FieldParse(format!("bad coordinate {coord:?}"));
    if coord.len() < degree_digits + 2 {
        return Err(bad());
    }
    let degrees: u16 = coord[..degree_digits].parse().map_err(|_| bad())?;
    let minutes: f64 = coord[degree_digits..].parse().map_err(|_| bad())?;
    if degrees > max_degrees || !(0.0..60.0).contains(&minutes) {
        return Err(bad());
    }
    Ok(PartPosition::new(degrees, minutes, Orientation::from_letter(hemi)?))
}

fn parse_rmc(fields: &[&str]) -> Result<Rmc, NmeaError> {
    let time = parse_time(field(fields, 0)?)?;
    let validity = Validity::from_field(field(fields, 1)?)?;
    let latitude = parse_part_position(field(fields, 2)?, field(fields, 3)?, 2, 90)?;
    let longitude = parse_part_position(field(fields, 4)?, field(fields, 5)?, 3, 180)?;
    let date = NaiveDate::parse_from_str(field(fields, 8)?, "%d%m%y")
        .map_err(|e| NmeaError::FieldParse(format!("bad date: {e}")))?;

    let variation_sense = match fields.get(10) {
        None | Some(&"") => None,
        Some(s) => Some(Orientation::from_letter(s)?),
    };
    let mode = match fields.get(11) {
        None | Some(&"") => None,
        Some(s) => Some(FaaMode::from_field(s)?),
    };

    Ok(Rmc {
        datetime: NaiveDateTime::new(date, time),
        validity,
        position: Position::new(latitude, longitude),
        sog_knots: opt_f64(fields, 6)?,
        track_made_good: opt_f64(fields, 7)?,
        magnetic_variation: opt_f64(fields, 9)?,
        variation_sense,
        mode,
    })
}

fn parse_vtg(fields: &[&str]) -> Result<Vtg, NmeaError> {
    let sog_knots = match opt_f64(fields, 4)? {
        Some(kn) => Some(kn),
        // Some talkers only fill the km/h pair.
        None => opt_f64(fields, 6)?.map(units::kmh_to_knots),
    };
    let mode = match fields.get(8) {
        None | Some(&"") => None,
        Some(s) => Some(GpsMode::from_field(s)?),
    };
    Ok(Vtg {
        cog_true: opt_f64(fields, 0)?,
        cog_magnetic: opt_f64(fields, 2)?,
        sog_knots,
        mode,
    })
}

fn parse_gsa(fields: &[&str]) -> Result<Gsa, NmeaError> {
    if fields.len() < 5 {
        return Err(NmeaError::FieldParse("GSA too short".into()));
    }
    let mode1 = GpsMode::from_field(field(fields, 0)?)?;
    let mode2 = FixType::from_field(field(fields, 1)?)?;
    let mut satellite_ids = Vec::new();
    for s in &fields[2..fields.len() - 3] {
        if s.is_empty() {
            satellite_ids.push(None);
        } else {
            satellite_ids.push(Some(s.parse::<u16>().map_err(|_| {
                NmeaError::FieldParse(format!("bad satellite id {s:?}"))
            })?));
        }
    }
    let dops = fields.len() - 3;
    Ok(Gsa {
        mode1,
        mode2,
        satellite_ids,
        pdop: req_f64(fields, dops)?,
        hdop: req_f64(fields, dops + 1)?,
        vdop: req_f64(fields, dops + 2)?,
    })
}

fn parse_dbt(fields: &[&str]) -> Result<Dbt, NmeaError> {
    let depth_m = if let Some(m) = opt_f64(fields, 2)? {
        Some(m)
    } else if let Some(ft) = opt_f64(fields, 0)? {
        Some(units::feet_to_meter(ft))
    } else {
        opt_f64(fields, 4)?.map(units::fathom_to_meter)
    };
    Ok(Dbt { depth_m })
}

fn parse_vhw(fields: &[&str]) -> Result<Vhw, NmeaError> {
    let stw_knots = match opt_f64(fields, 4)? {
        Some(kn) => Some(kn),
        None => opt_f64(fields, 6)?.map(units::kmh_to_knots),
    };
    Ok(Vhw {
        heading_true: opt_f64(fields, 0)?,
        heading_magnetic: opt_f64(fields, 2)?,
        stw_knots,
    })
}

fn parse_mtw(fields: &[&str]) -> Result<Mtw, NmeaError> {
    Ok(Mtw { temperature_c: req_f64(fields, 0)? })
}

fn parse_mwv(fields: &[&str]) -> Result<Mwv, NmeaError> {
    let angle_degrees = req_f64(fields, 0)?;
    if !(0.0..=360.0).contains(&angle_degrees) {
        return Err(NmeaError::FieldParse(format!("wind angle {angle_degrees} out of range")));
    }
    let reference_true = match field(fields, 1)? {
        "T" => true,
        "R" => false,
        other => return Err(NmeaError::FieldParse(format!("bad wind reference {other:?}"))),
    };
    let value = req_f64(fields, 2)?;
    let speed_knots = match field(fields, 3)? {
        "N" => value,
        "K" => units::kmh_to_knots(value),
        "M" => units::mps_to_knots(value),
        other => return Err(NmeaError::FieldParse(format!("unknown wind speed unit {other:?}"))),
    };
    Ok(Mwv {
        angle_degrees,
        reference_true,
        speed_knots,
        validity: Validity::from_field(field(fields, 4)?)?,
    })
}

// ── Serializer ────────────────────────────────────────────────────────────────

fn fmt_opt(value: Option<f64>) -> String {
    value.map(|v| format!("{v:.2}")).unwrap_or_default()
}

fn fmt_letter<T: Copy>(value: Option<T>, letter: fn(T) -> char) -> String {
    value.map(|v| letter(v).to_string()).unwrap_or_default()
}

impl NmeaSentence {
    /// Serialize to the wire representation including terminator.  Unknown
    /// sentences are replayed byte for byte.
    pub fn to_wire(&self) -> String {
        let fields = match &self.datagram {
            NmeaDatagram::Unknown(raw) => return raw.clone(),
            NmeaDatagram::Rmc(r) => emit_rmc(r),
            NmeaDatagram::Vtg(v) => emit_vtg(v),
            NmeaDatagram::Gsa(g) => emit_gsa(g),
            NmeaDatagram::Dbt(d) => emit_dbt(d),
            NmeaDatagram::Vhw(v) => emit_vhw(v),
            NmeaDatagram::Mtw(m) => vec![format!("{:.2}", m.temperature_c), "C".into()],
            NmeaDatagram::Mwv(m) => emit_mwv(m),
        };
        let body = format!("{}{},{}", self.talker_id, self.tag(), fields.join(","));
        format!("${body}*{:02X}\r\n", checksum(&body))
    }
}

fn emit_rmc(r: &Rmc) -> Vec<String> {
    let time = r.datetime.time();
    vec![
        format!(
            "{:02}{:02}{:02}.{:06}",
            time.hour(),
            time.minute(),
            time.second(),
            time.nanosecond() / 1000
        ),
        r.validity.letter().to_string(),
        format!("{:02}{:07.4}", r.position.latitude.degrees, r.position.latitude.minutes),
        r.position.latitude.direction.to_string(),
        format!("{:03}{:07.4}", r.position.longitude.degrees, r.position.longitude.minutes),
        r.position.longitude.direction.to_string(),
        fmt_opt(r.sog_knots),
        fmt_opt(r.track_made_good),
        r.datetime.format("%d%m%y").to_string(),
        fmt_opt(r.magnetic_variation),
        r.variation_sense.map(|o| o.to_string()).unwrap_or_default(),
        fmt_letter(r.mode, FaaMode::letter),
    ]
}

fn emit_vtg(v: &Vtg) -> Vec<String> {
    vec![
        fmt_opt(v.cog_true),
        "T".into(),
        fmt_opt(v.cog_magnetic),
        "M".into(),
        fmt_opt(v.sog_knots),
        "N".into(),
        fmt_opt(v.sog_knots.map(|kn| units::nm_to_meter(kn) / 1000.0)),
        "K".into(),
        fmt_letter(v.mode, GpsMode::letter),
    ]
}

fn emit_gsa(g: &Gsa) -> Vec<String> {
    let mut fields = vec![g.mode1.letter().to_string(), (g.mode2 as u8).to_string()];
    for id in &g.satellite_ids {
        fields.push(id.map(|v| v.to_string()).unwrap_or_default());
    }
    fields.push(format!("{:.2}", g.pdop));
    fields.push(format!("{:.2}", g.hdop));
    fields.push(format!("{:.2}", g.vdop));
    fields
}

fn emit_dbt(d: &Dbt) -> Vec<String> {
    vec![
        fmt_opt(d.depth_m.map(units::meter_to_feet)),
        "f".into(),
        fmt_opt(d.depth_m),
        "M".into(),
        fmt_opt(d.depth_m.map(units::meter_to_fathom)),
        "F".into(),
    ]
}

fn emit_vhw(v: &Vhw) -> Vec<String> {
    vec![
        fmt_opt(v.heading_true),
        "T".into(),
        fmt_opt(v.heading_magnetic),
        "M".into(),
        fmt_opt(v.stw_knots),
        "N".into(),
        fmt_opt(v.stw_knots.map(|kn| units::nm_to_meter(kn) / 1000.0)),
        "K".into(),
    ]
}

fn emit_mwv(m: &Mwv) -> Vec<String> {
    vec![
        format!("{:.2}", m.angle_degrees),
        if m.reference_true { "T" } else { "R" }.into(),
        format!("{:.2}", m.speed_knots),
        "N".into(),
        m.validity.letter().to_string(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checksum_example() {
        assert_eq!(checksum("INMTW,17.9,C"), 0x1B);
    }

    #[test]
    fn verify_checksum_accepts_valid_line() {
        verify_checksum("$INMTW,17.9,C*1B\r\n").unwrap();
    }

    #[test]
    fn verify_checksum_rejects_corruption() {
        let err = verify_checksum("$INMTW,17.9,C*00\r\n").unwrap_err();
        assert!(matches!(err, NmeaError::ChecksumMismatch { expected: 0x00, actual: 0x1B }));
    }

    #[test]
    fn missing_terminator_is_malformed() {
        assert!(matches!(
            verify_checksum("$INMTW,17.9,C*1B"),
            Err(NmeaError::MalformedFraming(_))
        ));
    }

    #[test]
    fn parses_rmc_sentence() {
        let line =
            "$GPRMC,144858.193500,A,5235.3151,N,00207.6577,W,0.0,144.8,160610,3.6,W,A*32\r\n";
        let sentence = parse(line).unwrap();
        assert_eq!(sentence.talker_id, "GP");
        let rmc = match sentence.datagram {
            NmeaDatagram::Rmc(r) => r,
            other => panic!("wrong datagram: {other:?}"),
        };
        assert_eq!(rmc.validity, Validity::Valid);
        assert_eq!(rmc.position.latitude.degrees, 52);
        assert!((rmc.position.latitude.minutes - 35.3151).abs() < 1e-9);
        assert_eq!(rmc.position.latitude.direction, Orientation::North);
        assert_eq!(rmc.position.longitude.degrees, 2);
        assert!((rmc.position.longitude.minutes - 7.6577).abs() < 1e-9);
        assert_eq!(rmc.position.longitude.direction, Orientation::West);
        assert_eq!(rmc.sog_knots, Some(0.0));
        assert_eq!(rmc.track_made_good, Some(144.8));
        assert_eq!(rmc.datetime.format("%d%m%y").to_string(), "160610");
        assert_eq!(rmc.magnetic_variation, Some(3.6));
        assert_eq!(rmc.variation_sense, Some(Orientation::West));
        assert_eq!(rmc.mode, Some(FaaMode::Autonomous));
    }

    #[test]
    fn rmc_time_without_fraction_parses_identically() {
        let t1 = parse_time("144858").unwrap();
        let t2 = parse_time("144858.0").unwrap();
        assert_eq!(t1, t2);
    }

    #[test]
    fn rmc_round_trip_preserves_fields() {
        let line =
            "$GPRMC,144858.193500,A,5235.3151,N,00207.6577,W,0.00,144.80,160610,3.60,W,A*02\r\n";
        let sentence = parse(line).unwrap();
        let wire = sentence.to_wire();
        let again = parse(&wire).unwrap();
        assert_eq!(sentence, again);
    }

    #[test]
    fn parses_mtw() {
        let sentence = parse("$INMTW,17.9,C*1B\r\n").unwrap();
        match sentence.datagram {
            NmeaDatagram::Mtw(m) => assert!((m.temperature_c - 17.9).abs() < 1e-9),
            other => panic!("wrong datagram: {other:?}"),
        }
    }

    #[test]
    fn dbt_feet_only_matches_meters_only() {
        // 24.0 ft == 7.3152 m
        let from_feet = parse_dbt(&["24.0", "f", "", "M", "", "F"]).unwrap();
        let from_meters = parse_dbt(&["", "f", "7.3152", "M", "", "F"]).unwrap();
        let d1 = from_feet.depth_m.unwrap();
        let d2 = from_meters.depth_m.unwrap();
        assert!((d1 - d2).abs() < 0.01, "{d1} vs {d2}");
    }

    #[test]
    fn dbt_fathoms_fallback() {
        let d = parse_dbt(&["", "f", "", "M", "4.0", "F"]).unwrap();
        assert!((d.depth_m.unwrap() - 7.3152).abs() < 0.01);
    }

    #[test]
    fn mwv_unit_normalization() {
        let kn = parse_mwv(&["214.8", "R", "10.0", "N", "A"]).unwrap();
        let kmh = parse_mwv(&["214.8", "R", "18.52", "K", "A"]).unwrap();
        let mps = parse_mwv(&["214.8", "R", "5.144", "M", "A"]).unwrap();
        assert!((kn.speed_knots - 10.0).abs() < 1e-9);
        assert!((kmh.speed_knots - 10.0).abs() < 1e-3);
        assert!((mps.speed_knots - 10.0).abs() < 1e-2);
    }

    #[test]
    fn mwv_bad_unit_is_field_error() {
        assert!(matches!(
            parse_mwv(&["214.8", "R", "10.0", "X", "A"]),
            Err(NmeaError::FieldParse(_))
        ));
    }

    #[test]
    fn unknown_tag_degrades_to_passthrough() {
        // $GPGLL,... with a correct checksum
        let body = "GPGLL,4916.45,N,12311.12,W,225444,A";
        let line = format!("${body}*{:02X}\r\n", checksum(body));
        let sentence = parse_lenient(&line).unwrap();
        assert_eq!(sentence.tag(), "GLL");
        match &sentence.datagram {
            NmeaDatagram::Unknown(raw) => assert_eq!(*raw, line),
            other => panic!("wrong datagram: {other:?}"),
        }
        // And it replays byte for byte.
        assert_eq!(sentence.to_wire(), line);
    }

    #[test]
    fn field_parse_failure_degrades_to_passthrough() {
        let body = "IIMTW,abc,C";
        let line = format!("${body}*{:02X}\r\n", checksum(body));
        let sentence = parse_lenient(&line).unwrap();
        assert!(matches!(sentence.datagram, NmeaDatagram::Unknown(_)));
    }

    #[test]
    fn checksum_failure_stays_hard_in_lenient_mode() {
        assert!(parse_lenient("$IIVHW,245.1,T,245.1,M,000.01,N,000.01,K*00\r\n").is_err());
    }

    #[test]
    fn emits_dbt_for_depth() {
        let sentence = NmeaSentence::own(NmeaDatagram::Dbt(Dbt { depth_m: Some(22.28) }));
        let wire = sentence.to_wire();
        assert!(wire.starts_with("$--DBT,"), "{wire}");
        assert!(wire.contains(",22.28,M,"), "{wire}");
        parse(&wire).unwrap();
    }

    #[test]
    fn emits_mwv_with_two_decimals() {
        let sentence = NmeaSentence::own(NmeaDatagram::Mwv(Mwv {
            angle_degrees:  256.5,
            reference_true: false,
            speed_knots:    11.2,
            validity:       Validity::Valid,
        }));
        let wire = sentence.to_wire();
        assert!(wire.contains("256.50,R,11.20,N,A"), "{wire}");
    }

    #[test]
    fn vtg_round_trip() {
        let sentence = NmeaSentence::own(NmeaDatagram::Vtg(Vtg {
            cog_true:     Some(144.8),
            cog_magnetic: Some(148.4),
            sog_knots:    Some(5.2),
            mode:         Some(GpsMode::Automatic),
        }));
        let wire = sentence.to_wire();
        let parsed = parse(&wire).unwrap();
        match parsed.datagram {
            NmeaDatagram::Vtg(v) => {
                assert_eq!(v.cog_true, Some(144.8));
                assert_eq!(v.cog_magnetic, Some(148.4));
                assert_eq!(v.sog_knots, Some(5.2));
                assert_eq!(v.mode, Some(GpsMode::Automatic));
            }
            other => panic!("wrong datagram: {other:?}"),
        }
    }

    #[test]
    fn vtg_kmh_fallback() {
        let v = parse_vtg(&["144.80", "T", "", "M", "", "N", "9.63", "K"]).unwrap();
        assert!((v.sog_knots.unwrap() - 5.2).abs() < 0.01);
    }

    #[test]
    fn gsa_round_trip() {
        let sentence = NmeaSentence::own(NmeaDatagram::Gsa(Gsa {
            mode1:         GpsMode::Automatic,
            mode2:         FixType::ThreeD,
            satellite_ids: vec![Some(4), Some(5), None, Some(9), None, None, None, None, None, None, None, None],
            pdop:          2.5,
            hdop:          1.3,
            vdop:          2.1,
        }));
        let wire = sentence.to_wire();
        let parsed = parse(&wire).unwrap();
        assert_eq!(sentence.datagram, parsed.datagram);
    }

    #[test]
    fn part_position_bounds_enforced() {
        assert!(parse_part_position("9135.0000", "N", 2, 90).is_err());
        assert!(parse_part_position("5261.0000", "N", 2, 90).is_err());
    }
}
