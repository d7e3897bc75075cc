//! GMT time (0x54), date (0x56) and the countdown timer (0x59).

use chrono::{Datelike, NaiveDate, NaiveTime, Timelike};

use crate::error::SeatalkError;

/// `54 T1 RS HH` — GMT time of day: `HH` hours,
/// minutes = `(RS & 0xFC) / 4`, seconds = `ST & 0x3F` with
/// `ST = (RS & 0x0F) << 4 | T`.
#[derive(Debug, Clone, PartialEq)]
pub struct GmtTime {
    pub time: NaiveTime,
}

impl GmtTime {
    pub(super) fn parse(first_half: u8, data: &[u8]) -> Result<Self, SeatalkError> {
        let hours = u32::from(data[1]);
        let minutes = u32::from(data[0] & 0xFC) / 4;
        let st = (data[0] & 0x0F) << 4 | first_half;
        let seconds = u32::from(st & 0x3F);
        let time = NaiveTime::from_hms_opt(hours, minutes, seconds).ok_or_else(|| {
            SeatalkError::validation(0x54, format!("invalid time {hours}:{minutes}:{seconds}"))
        })?;
        Ok(Self { time })
    }

    pub(super) fn emit(&self) -> (u8, Vec<u8>) {
        let seconds = self.time.second() as u8;
        let t_nibble = seconds & 0x0F;
        let rs = ((self.time.minute() as u8) << 2 & 0xFC) | (seconds >> 4 & 0x03);
        (t_nibble, vec![rs, self.time.hour() as u8])
    }
}

/// `56 M1 DD YY` — date: month in the first-half byte, day, year − 2000.
#[derive(Debug, Clone, PartialEq)]
pub struct Date {
    pub date: NaiveDate,
}

const YEAR_OFFSET: i32 = 2000;

impl Date {
    pub(super) fn parse(first_half: u8, data: &[u8]) -> Result<Self, SeatalkError> {
        let year = YEAR_OFFSET + i32::from(data[1]);
        let month = u32::from(first_half);
        let day = u32::from(data[0]);
        let date = NaiveDate::from_ymd_opt(year, month, day).ok_or_else(|| {
            SeatalkError::validation(0x56, format!("invalid date {year}-{month}-{day}"))
        })?;
        Ok(Self { date })
    }

    pub(super) fn emit(&self) -> (u8, Vec<u8>) {
        (
            self.date.month() as u8,
            vec![self.date.day() as u8, (self.date.year() - YEAR_OFFSET) as u8],
        )
    }
}

/// `59 22 SS MM XH` — countdown timer.  The first-half byte is always 2;
/// `X` is the counter mode nibble, `H` the hours.
#[derive(Debug, Clone, PartialEq)]
pub struct CountdownTimer {
    pub hours:   u8,
    pub minutes: u8,
    pub seconds: u8,
    pub mode:    CounterMode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterMode {
    CountUpStart,
    CountDown,
    CountDownStart,
}

impl CounterMode {
    fn from_nibble(nibble: u8) -> Result<Self, SeatalkError> {
        match nibble {
            0x0 => Ok(CounterMode::CountUpStart),
            0x4 => Ok(CounterMode::CountDown),
            0x8 => Ok(CounterMode::CountDownStart),
            other => Err(SeatalkError::validation(0x59, format!("invalid counter mode {other:X}"))),
        }
    }

    fn to_nibble(self) -> u8 {
        match self {
            CounterMode::CountUpStart => 0x0,
            CounterMode::CountDown => 0x4,
            CounterMode::CountDownStart => 0x8,
        }
    }
}

impl CountdownTimer {
    pub(super) fn parse(first_half: u8, data: &[u8]) -> Result<Self, SeatalkError> {
        if first_half != 0x2 {
            return Err(SeatalkError::validation(
                0x59,
                format!("first half byte is {first_half:X}, not 2"),
            ));
        }
        Ok(Self {
            seconds: data[0],
            minutes: data[1],
            hours:   data[2] & 0x0F,
            mode:    CounterMode::from_nibble(data[2] >> 4)?,
        })
    }

    pub(super) fn emit(&self) -> (u8, Vec<u8>) {
        (0x2, vec![self.seconds, self.minutes, self.mode.to_nibble() << 4 | (self.hours & 0x0F)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gmt_time_round_trips_every_second_of_an_hour() {
        for minute in 0..60 {
            for second in 0..60 {
                let record =
                    GmtTime { time: NaiveTime::from_hms_opt(14, minute, second).unwrap() };
                let (fh, payload) = record.emit();
                assert_eq!(GmtTime::parse(fh, &payload).unwrap(), record);
            }
        }
    }

    #[test]
    fn gmt_time_rejects_invalid() {
        // 25 hours
        assert!(GmtTime::parse(0, &[0x00, 25]).is_err());
    }

    #[test]
    fn date_round_trip() {
        let record = Date { date: NaiveDate::from_ymd_opt(2010, 6, 16).unwrap() };
        let (fh, payload) = record.emit();
        assert_eq!(fh, 6);
        assert_eq!(payload, vec![16, 10]);
        assert_eq!(Date::parse(fh, &payload).unwrap(), record);
    }

    #[test]
    fn date_rejects_bad_day() {
        assert!(Date::parse(2, &[30, 21]).is_err());
    }

    #[test]
    fn countdown_example_9_59_59() {
        // 59 22 3B 3B 89 -> 9:59:59 counting down
        let timer = CountdownTimer::parse(0x2, &[0x3B, 0x3B, 0x89]).unwrap();
        assert_eq!(
            timer,
            CountdownTimer {
                hours:   9,
                minutes: 59,
                seconds: 59,
                mode:    CounterMode::CountDownStart,
            }
        );
        let (fh, payload) = timer.emit();
        assert_eq!((fh, payload), (0x2, vec![0x3B, 0x3B, 0x89]));
    }

    #[test]
    fn countdown_requires_first_half_two() {
        assert!(CountdownTimer::parse(0x0, &[0, 0, 0]).is_err());
    }
}
