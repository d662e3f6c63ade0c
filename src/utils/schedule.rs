use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Offset, Utc};
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// 24-hour `H:MM` or `HH:MM`.
    pub static ref TIME_REGEX: Regex = Regex::new(r"^([0-1]?[0-9]|2[0-3]):[0-5][0-9]$").unwrap();
}

/// Accepts `YYYY-MM-DD` or an ISO-8601 date-time and keeps the calendar date.
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();

    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return Some(date);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.date_naive());
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M"))
        .map(|dt| dt.date())
        .ok()
}

/// Normalizes a time-of-day to zero-padded `HH:MM`.
pub fn normalize_time(value: &str) -> Option<String> {
    let value = value.trim();
    if !TIME_REGEX.is_match(value) {
        return None;
    }
    NaiveTime::parse_from_str(value, "%H:%M")
        .ok()
        .map(|t| t.format("%H:%M").to_string())
}

/// Wall clock of the timezone appointments are booked in.
#[derive(Debug, Clone, Copy)]
pub struct SchedulingClock {
    offset: FixedOffset,
}

impl SchedulingClock {
    pub fn new(utc_offset_minutes: i32) -> Self {
        let offset = FixedOffset::east_opt(utc_offset_minutes * 60).unwrap_or_else(|| Utc.fix());
        SchedulingClock { offset }
    }

    pub fn local(&self, instant: DateTime<Utc>) -> NaiveDateTime {
        instant.with_timezone(&self.offset).naive_local()
    }

    pub fn now(&self) -> NaiveDateTime {
        self.local(Utc::now())
    }

    pub fn today(&self) -> NaiveDate {
        self.now().date()
    }

    /// `time` must already be normalized.
    pub fn is_strictly_future(&self, date: NaiveDate, time: &str, now: NaiveDateTime) -> bool {
        match NaiveTime::parse_from_str(time, "%H:%M") {
            Ok(t) => date.and_time(t) > now,
            Err(_) => false,
        }
    }
}
