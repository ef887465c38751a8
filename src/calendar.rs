//! Weekly opening patterns and local wall-time resolution.
//!
//! Business hours and staff working hours are immutable values expressed in
//! location-local time. They are turned into UTC [`Span`]s here and nowhere
//! else, so the ledger only ever compares UTC instants.

use chrono::{Datelike, Duration, NaiveDate, NaiveTime, TimeZone, Utc, Weekday};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::limits::MAX_TIMEZONE_LEN;
use crate::model::{Ms, Span};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CalendarError {
    #[error("unknown timezone: {0}")]
    UnknownTimezone(String),
    #[error("bad weekly hours: {0}")]
    BadHours(String),
    #[error("bad time of day: {0}")]
    BadTime(String),
}

/// Opening window for a single weekday. `open < close`; overnight windows are not modelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayHours {
    pub open: NaiveTime,
    pub close: NaiveTime,
}

impl DayHours {
    pub fn new(open: NaiveTime, close: NaiveTime) -> Result<Self, CalendarError> {
        if open >= close {
            return Err(CalendarError::BadHours(format!(
                "open {open} must be before close {close}"
            )));
        }
        Ok(Self { open, close })
    }

    /// Convenience for whole hours, e.g. `DayHours::hours(9, 18)`.
    pub fn hours(open: u32, close: u32) -> Result<Self, CalendarError> {
        let t = |h: u32| {
            NaiveTime::from_hms_opt(h, 0, 0)
                .ok_or_else(|| CalendarError::BadTime(format!("{h}:00")))
        };
        Self::new(t(open)?, t(close)?)
    }
}

/// Per-weekday opening pattern, indexed Monday-first. `None` means closed.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WeeklyHours {
    days: [Option<DayHours>; 7],
}

impl WeeklyHours {
    pub fn closed() -> Self {
        Self::default()
    }

    pub fn every_day(hours: DayHours) -> Self {
        Self {
            days: [Some(hours); 7],
        }
    }

    pub fn with(mut self, day: Weekday, hours: Option<DayHours>) -> Self {
        self.set(day, hours);
        self
    }

    pub fn set(&mut self, day: Weekday, hours: Option<DayHours>) {
        self.days[day.num_days_from_monday() as usize] = hours;
    }

    pub fn on(&self, day: Weekday) -> Option<DayHours> {
        self.days[day.num_days_from_monday() as usize]
    }

    /// Parse the textual form `"mon-fri 09:00-18:00; sat 10:00-16:00; sun closed"`.
    ///
    /// Later entries override earlier ones; days never mentioned are closed.
    pub fn parse(s: &str) -> Result<Self, CalendarError> {
        let mut hours = Self::closed();
        for entry in s.split(';').map(str::trim).filter(|e| !e.is_empty()) {
            let mut parts = entry.split_whitespace();
            let (Some(days), Some(window), None) = (parts.next(), parts.next(), parts.next())
            else {
                return Err(CalendarError::BadHours(format!(
                    "expected '<days> <open>-<close>', got '{entry}'"
                )));
            };
            let window = if window.eq_ignore_ascii_case("closed") {
                None
            } else {
                let (open, close) = window.split_once('-').ok_or_else(|| {
                    CalendarError::BadHours(format!("expected <open>-<close>, got '{window}'"))
                })?;
                Some(DayHours::new(parse_time(open)?, parse_time(close)?)?)
            };
            for day in parse_days(days)? {
                hours.set(day, window);
            }
        }
        Ok(hours)
    }

    /// The UTC window this pattern opens on `date`, if any.
    pub fn window_on(&self, tz: Tz, date: NaiveDate) -> Option<Span> {
        let hours = self.on(date.weekday())?;
        let start = local_to_utc(tz, date, hours.open);
        let end = local_to_utc(tz, date, hours.close);
        (start < end).then(|| Span::new(start, end))
    }

    /// All opening windows on the local dates `span` touches, ascending.
    pub fn windows_covering(&self, tz: Tz, span: &Span) -> Vec<Span> {
        let first = local_date(tz, span.start);
        let last = local_date(tz, span.end - 1);
        first
            .iter_days()
            .take_while(|d| *d <= last)
            .take(400)
            .filter_map(|d| self.window_on(tz, d))
            .collect()
    }
}

fn parse_days(s: &str) -> Result<Vec<Weekday>, CalendarError> {
    let mut days = Vec::new();
    for part in s.split(',').filter(|p| !p.is_empty()) {
        if part.eq_ignore_ascii_case("daily") {
            days.extend(
                [
                    Weekday::Mon,
                    Weekday::Tue,
                    Weekday::Wed,
                    Weekday::Thu,
                    Weekday::Fri,
                    Weekday::Sat,
                    Weekday::Sun,
                ]
                .iter(),
            );
            continue;
        }
        match part.split_once('-') {
            Some((from, to)) => {
                let from = parse_weekday(from)?;
                let to = parse_weekday(to)?;
                let mut day = from;
                days.push(day);
                while day != to {
                    day = day.succ();
                    days.push(day);
                }
            }
            None => days.push(parse_weekday(part)?),
        }
    }
    Ok(days)
}

fn parse_weekday(s: &str) -> Result<Weekday, CalendarError> {
    s.parse::<Weekday>()
        .map_err(|_| CalendarError::BadHours(format!("unknown weekday '{s}'")))
}

/// Accepts `HH:MM` or `HH:MM:SS`.
pub fn parse_time(s: &str) -> Result<NaiveTime, CalendarError> {
    let s = s.trim();
    NaiveTime::parse_from_str(s, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M:%S"))
        .map_err(|_| CalendarError::BadTime(s.to_string()))
}

pub fn parse_timezone(name: &str) -> Result<Tz, CalendarError> {
    if name.len() > MAX_TIMEZONE_LEN {
        return Err(CalendarError::UnknownTimezone(name.to_string()));
    }
    name.parse::<Tz>()
        .map_err(|_| CalendarError::UnknownTimezone(name.to_string()))
}

/// Resolve a local wall time to UTC milliseconds.
///
/// Ambiguous times (DST fall-back) take the earlier instant; nonexistent times
/// (DST spring-forward gap) are pushed forward by one hour.
pub fn local_to_utc(tz: Tz, date: NaiveDate, time: NaiveTime) -> Ms {
    let naive = date.and_time(time);
    if let Some(dt) = tz.from_local_datetime(&naive).earliest() {
        return dt.timestamp_millis();
    }
    let shifted = naive + Duration::hours(1);
    match tz.from_local_datetime(&shifted).earliest() {
        Some(dt) => dt.timestamp_millis(),
        None => Utc.from_utc_datetime(&naive).timestamp_millis(),
    }
}

/// The local calendar date an instant falls on.
pub fn local_date(tz: Tz, ms: Ms) -> NaiveDate {
    Utc.timestamp_millis_opt(ms)
        .single()
        .unwrap_or_default()
        .with_timezone(&tz)
        .date_naive()
}

/// `[local midnight, next local midnight)` in UTC.
pub fn local_day_span(tz: Tz, date: NaiveDate) -> Span {
    let start = local_to_utc(tz, date, NaiveTime::MIN);
    let end = match date.succ_opt() {
        Some(next) => local_to_utc(tz, next, NaiveTime::MIN),
        None => start + 24 * 3_600_000,
    };
    Span::new(start, end)
}
