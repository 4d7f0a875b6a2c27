//! Fixed text profile for dates, times, durations and identifiers.
//!
//! | Type | Text |
//! |------|------|
//! | `DateTime<Utc>` / `DateTime<FixedOffset>` | RFC 3339, `Z` for UTC, fraction only when non-zero |
//! | `NaiveDate` | `2024-02-29` |
//! | `NaiveDateTime` | `2024-02-29T13:45:00.25` |
//! | `NaiveTime` | `13:45:00.25` |
//! | `TimeDelta` / `Duration` | `[-][d.]hh:mm:ss[.fffffffff]` |
//! | `Uuid` | hyphenated lowercase |

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, SecondsFormat, TimeDelta, Utc};
use uuid::Uuid;

use crate::error::{MapperError, MapperResult};

const NAIVE_DATE: &str = "%Y-%m-%d";
const NAIVE_DATE_TIME: &str = "%Y-%m-%dT%H:%M:%S%.f";
const NAIVE_TIME: &str = "%H:%M:%S%.f";
const SECONDS_PER_DAY: u64 = 86_400;

/// A scalar stored as text.
pub trait TextScalar: Sized {
    /// Parses the stored text.
    fn parse_text(text: &str) -> MapperResult<Self>;

    /// Formats for storage.
    fn format_text(&self) -> String;
}

fn invalid<T>(text: &str) -> MapperError {
    MapperError::TypeMismatch {
        expected: std::any::type_name::<T>().to_owned(),
        actual: format!("S '{text}'"),
    }
}

impl TextScalar for DateTime<Utc> {
    fn parse_text(text: &str) -> MapperResult<Self> {
        DateTime::parse_from_rfc3339(text)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|_| invalid::<Self>(text))
    }

    fn format_text(&self) -> String {
        self.to_rfc3339_opts(SecondsFormat::AutoSi, true)
    }
}

impl TextScalar for DateTime<FixedOffset> {
    fn parse_text(text: &str) -> MapperResult<Self> {
        DateTime::parse_from_rfc3339(text).map_err(|_| invalid::<Self>(text))
    }

    fn format_text(&self) -> String {
        self.to_rfc3339_opts(SecondsFormat::AutoSi, true)
    }
}

impl TextScalar for NaiveDate {
    fn parse_text(text: &str) -> MapperResult<Self> {
        NaiveDate::parse_from_str(text, NAIVE_DATE).map_err(|_| invalid::<Self>(text))
    }

    fn format_text(&self) -> String {
        self.format(NAIVE_DATE).to_string()
    }
}

impl TextScalar for NaiveDateTime {
    fn parse_text(text: &str) -> MapperResult<Self> {
        NaiveDateTime::parse_from_str(text, NAIVE_DATE_TIME).map_err(|_| invalid::<Self>(text))
    }

    fn format_text(&self) -> String {
        self.format(NAIVE_DATE_TIME).to_string()
    }
}

impl TextScalar for NaiveTime {
    fn parse_text(text: &str) -> MapperResult<Self> {
        NaiveTime::parse_from_str(text, NAIVE_TIME).map_err(|_| invalid::<Self>(text))
    }

    fn format_text(&self) -> String {
        self.format(NAIVE_TIME).to_string()
    }
}

impl TextScalar for TimeDelta {
    fn parse_text(text: &str) -> MapperResult<Self> {
        let (negative, secs, nanos) = parse_duration(text).ok_or_else(|| invalid::<Self>(text))?;
        let secs = i64::try_from(secs).map_err(|_| invalid::<Self>(text))?;
        let delta = TimeDelta::new(secs, nanos).ok_or_else(|| invalid::<Self>(text))?;
        Ok(if negative { -delta } else { delta })
    }

    fn format_text(&self) -> String {
        let negative = *self < TimeDelta::zero();
        let abs = self.abs();
        let secs = abs.num_seconds().unsigned_abs();
        let nanos = abs.subsec_nanos().unsigned_abs();
        format_duration(negative, secs, nanos)
    }
}

impl TextScalar for std::time::Duration {
    fn parse_text(text: &str) -> MapperResult<Self> {
        match parse_duration(text) {
            Some((false, secs, nanos)) => Ok(Self::new(secs, nanos)),
            _ => Err(invalid::<Self>(text)),
        }
    }

    fn format_text(&self) -> String {
        format_duration(false, self.as_secs(), self.subsec_nanos())
    }
}

impl TextScalar for Uuid {
    fn parse_text(text: &str) -> MapperResult<Self> {
        Uuid::parse_str(text).map_err(|_| invalid::<Self>(text))
    }

    fn format_text(&self) -> String {
        self.hyphenated().to_string()
    }
}

fn format_duration(negative: bool, secs: u64, nanos: u32) -> String {
    let days = secs / SECONDS_PER_DAY;
    let rem = secs % SECONDS_PER_DAY;
    let mut out = String::new();
    if negative {
        out.push('-');
    }
    if days > 0 {
        out.push_str(&format!("{days}."));
    }
    out.push_str(&format!("{:02}:{:02}:{:02}", rem / 3600, rem % 3600 / 60, rem % 60));
    if nanos > 0 {
        out.push_str(&format!(".{nanos:09}"));
    }
    out
}

/// Returns `(negative, whole seconds, nanoseconds)`.
fn parse_duration(text: &str) -> Option<(bool, u64, u32)> {
    let (negative, body) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text),
    };
    let first_colon = body.find(':')?;
    let (days, clock) = match body[..first_colon].find('.') {
        Some(dot) => (body[..dot].parse::<u64>().ok()?, &body[dot + 1..]),
        None => (0, body),
    };
    let mut parts = clock.splitn(3, ':');
    let hours: u64 = parts.next()?.parse().ok()?;
    let minutes: u64 = parts.next()?.parse().ok()?;
    let seconds_part = parts.next()?;
    let (seconds, fraction) = match seconds_part.split_once('.') {
        Some((s, f)) => (s, Some(f)),
        None => (seconds_part, None),
    };
    let seconds: u64 = seconds.parse().ok()?;
    if hours >= 24 || minutes >= 60 || seconds >= 60 {
        return None;
    }
    let nanos = match fraction {
        None => 0,
        Some(f) if !f.is_empty() && f.len() <= 9 && f.bytes().all(|b| b.is_ascii_digit()) => {
            format!("{f:0<9}").parse::<u32>().ok()?
        }
        Some(_) => return None,
    };
    let secs = days
        .checked_mul(SECONDS_PER_DAY)?
        .checked_add(hours * 3600 + minutes * 60 + seconds)?;
    Some((negative, secs, nanos))
}
