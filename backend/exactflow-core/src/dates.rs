// src/dates.rs

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, TimeZone, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::error::DateError;

const CANONICAL_FORMAT: &str = "%Y-%m-%d";

static CANONICAL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{4})-(\d{2})-(\d{2})$").expect("canonical date regex"));

// "Wed, Aug/06/2025"
static WEEKDAY_SLASH_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z]{3},\s*([A-Za-z]{3})/(\d{1,2})/(\d{4})$").expect("weekday slash regex")
});

// "Aug 07, 2025" / "August 7, 2025"
static MONTH_NAME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([A-Za-z]+)\s+(\d{1,2}),\s*(\d{4})$").expect("month name regex")
});

const MONTHS: [(&str, &str); 12] = [
    ("Jan", "January"),
    ("Feb", "February"),
    ("Mar", "March"),
    ("Apr", "April"),
    ("May", "May"),
    ("Jun", "June"),
    ("Jul", "July"),
    ("Aug", "August"),
    ("Sep", "September"),
    ("Oct", "October"),
    ("Nov", "November"),
    ("Dec", "December"),
];

/// One civil date with no time-of-day or zone, written as `YYYY-MM-DD`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CalendarDay(NaiveDate);

impl CalendarDay {
    pub fn from_ymd(year: i32, month: u32, day: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, day).map(CalendarDay)
    }

    pub fn date(&self) -> NaiveDate {
        self.0
    }

    /// Weekday ordinal with Sunday = 0 .. Saturday = 6.
    pub fn weekday_ordinal(&self) -> u8 {
        self.0.weekday().num_days_from_sunday() as u8
    }

    pub fn format(&self) -> String {
        self.0.format(CANONICAL_FORMAT).to_string()
    }
}

impl From<NaiveDate> for CalendarDay {
    fn from(date: NaiveDate) -> Self {
        CalendarDay(date)
    }
}

impl fmt::Display for CalendarDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(CANONICAL_FORMAT))
    }
}

impl FromStr for CalendarDay {
    type Err = DateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        normalize(s)
    }
}

impl Serialize for CalendarDay {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for CalendarDay {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        normalize(raw.as_str()).map_err(serde::de::Error::custom)
    }
}

/// Anything `normalize` accepts.
#[derive(Debug, Clone)]
pub enum DateInput<'a> {
    Text(&'a str),
    Date(NaiveDate),
    Instant(DateTime<Utc>),
}

impl<'a> From<&'a str> for DateInput<'a> {
    fn from(s: &'a str) -> Self {
        DateInput::Text(s)
    }
}

impl<'a> From<&'a String> for DateInput<'a> {
    fn from(s: &'a String) -> Self {
        DateInput::Text(s.as_str())
    }
}

impl From<NaiveDate> for DateInput<'_> {
    fn from(d: NaiveDate) -> Self {
        DateInput::Date(d)
    }
}

impl From<CalendarDay> for DateInput<'_> {
    fn from(d: CalendarDay) -> Self {
        DateInput::Date(d.date())
    }
}

impl<Tz: TimeZone> From<DateTime<Tz>> for DateInput<'_> {
    fn from(dt: DateTime<Tz>) -> Self {
        DateInput::Instant(dt.with_timezone(&Utc))
    }
}

/// Converts a date-ish value into a `CalendarDay`.
///
/// Text is matched against these shapes in order, first match wins:
/// 1. `YYYY-MM-DD`
/// 2. `<Wkd>, <Mon>/<DD>/<YYYY>` (weekday token is not checked)
/// 3. `<Month> <D>, <YYYY>` with an abbreviated or full English month name
/// 4. generic parsing; instants carrying a zone are truncated to their UTC date
///
/// Month names are case-sensitive (`Aug`, `August`).
pub fn normalize<'a, I: Into<DateInput<'a>>>(input: I) -> Result<CalendarDay, DateError> {
    match input.into() {
        DateInput::Date(d) => Ok(CalendarDay(d)),
        DateInput::Instant(dt) => Ok(CalendarDay(dt.date_naive())),
        DateInput::Text(raw) => normalize_text(raw),
    }
}

fn normalize_text(raw: &str) -> Result<CalendarDay, DateError> {
    let text = raw.trim();
    let unparseable = || DateError::UnparseableDate {
        input: raw.to_string(),
    };

    if let Some(caps) = CANONICAL_RE.captures(text) {
        // Canonical shape but not a real date (e.g. 2025-02-30) is not retried
        // against the looser shapes.
        return ymd(&caps[1], &caps[2], &caps[3]).ok_or_else(unparseable);
    }

    if let Some(caps) = WEEKDAY_SLASH_RE.captures(text) {
        let month = month_number(&caps[1]).ok_or_else(unparseable)?;
        return ymd(&caps[3], &month.to_string(), &caps[2]).ok_or_else(unparseable);
    }

    if let Some(caps) = MONTH_NAME_RE.captures(text) {
        let month = month_number(&caps[1]).ok_or_else(unparseable)?;
        return ymd(&caps[3], &month.to_string(), &caps[2]).ok_or_else(unparseable);
    }

    generic_parse(text).ok_or_else(unparseable)
}

fn ymd(year: &str, month: &str, day: &str) -> Option<CalendarDay> {
    let year: i32 = year.parse().ok()?;
    let month: u32 = month.parse().ok()?;
    let day: u32 = day.parse().ok()?;
    CalendarDay::from_ymd(year, month, day)
}

fn month_number(token: &str) -> Option<u32> {
    MONTHS
        .iter()
        .position(|(abbrev, full)| *abbrev == token || *full == token)
        .map(|idx| idx as u32 + 1)
}

// Zoned instants are reduced to their UTC calendar date, so an input such as
// "2025-08-07T00:30:00+02:00" yields 2025-08-06.
fn generic_parse(text: &str) -> Option<CalendarDay> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(CalendarDay(dt.with_timezone(&Utc).date_naive()));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(text) {
        return Some(CalendarDay(dt.with_timezone(&Utc).date_naive()));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(ndt) = NaiveDateTime::parse_from_str(text, fmt) {
            return Some(CalendarDay(ndt.date()));
        }
    }
    for fmt in ["%Y/%m/%d", "%m/%d/%Y", "%d %B %Y", "%d %b %Y"] {
        if let Ok(d) = NaiveDate::parse_from_str(text, fmt) {
            return Some(CalendarDay(d));
        }
    }
    None
}
