//! Clock helpers: `HH:MM` parsing, IANA timezones and local dates.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use chrono_tz::Tz;

use crate::{AppError, AppResult};

/// Parse a strict 24-hour `HH:MM` string.
pub fn parse_hhmm(value: &str) -> AppResult<NaiveTime> {
    let bytes = value.as_bytes();
    if bytes.len() != 5 || bytes[2] != b':' {
        return Err(AppError::Validation(format!(
            "expected HH:MM, got {value:?}"
        )));
    }
    NaiveTime::parse_from_str(value, "%H:%M")
        .map_err(|_| AppError::Validation(format!("expected HH:MM, got {value:?}")))
}

/// Resolve an IANA timezone name such as `Europe/Berlin`.
pub fn parse_timezone(name: &str) -> AppResult<Tz> {
    name.parse::<Tz>()
        .map_err(|_| AppError::Validation(format!("unknown timezone {name:?}")))
}

/// Calendar date of `now` as seen in `tz`.
#[must_use]
pub fn local_date(tz: Tz, now: DateTime<Utc>) -> NaiveDate {
    now.with_timezone(&tz).date_naive()
}

/// Wall-clock time of `now` as seen in `tz`.
#[must_use]
pub fn local_time(tz: Tz, now: DateTime<Utc>) -> NaiveTime {
    now.with_timezone(&tz).time()
}
