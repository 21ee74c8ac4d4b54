//! Deterministic date and time helpers shared by the generator and formatter.
//!
//! All functions take explicit inputs (no system clock access), keeping the
//! engine testable with fixed windows.
//!
//! # Conventions
//!
//! - Instants are `DateTime<Utc>`; storage holds UTC regardless of all-day.
//! - All-day values are `NaiveDate`s. They are "floating": a date means the same
//!   calendar day in every timezone and is never shifted when formatted.
//! - Month arithmetic clamps to the last valid day of the target month
//!   (Jan 31 + 1 month = Feb 28/29). Overflow never rolls into the next month.
//! - A local wall-clock time that does not exist (spring-forward gap) moves
//!   forward by the length of the gap. An ambiguous one (fall-back overlap)
//!   resolves to the earlier instant.

use chrono::{
    DateTime, Datelike, Duration, LocalResult, Months, NaiveDate, NaiveDateTime, Offset,
    TimeZone, Utc,
};
use chrono_tz::Tz;

use crate::error::EngineError;

/// Wire format for all-day values.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Wire format for timed values, rendered in the viewer's timezone.
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M";

// ── Parsing ─────────────────────────────────────────────────────────────────

/// Parse an RFC 3339 window bound into `DateTime<Utc>`.
///
/// # Errors
///
/// Returns [`EngineError::InvalidRange`]: an unparseable bound makes the whole
/// window invalid.
pub fn parse_rfc3339(s: &str) -> Result<DateTime<Utc>, EngineError> {
    DateTime::parse_from_rfc3339(s.trim())
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| EngineError::InvalidRange(format!("'{}': {}", s, e)))
}

/// Parse an IANA timezone string into `Tz`.
pub fn parse_timezone(s: &str) -> Result<Tz, EngineError> {
    s.trim()
        .parse::<Tz>()
        .map_err(|_| EngineError::InvalidTimezone(format!("'{}'", s)))
}

// ── Wall-clock resolution ───────────────────────────────────────────────────

/// Resolve a local wall-clock time in `tz` to an instant.
///
/// Returns `None` only if the arithmetic leaves chrono's supported range.
pub fn resolve_local(tz: &Tz, naive: NaiveDateTime) -> Option<DateTime<Utc>> {
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) => Some(dt.with_timezone(&Utc)),
        LocalResult::Ambiguous(earliest, _) => Some(earliest.with_timezone(&Utc)),
        LocalResult::None => {
            // Spring-forward gap: read the wall time with the offset in force
            // before the transition, which lands past the gap by its length.
            let before = naive.checked_sub_signed(Duration::hours(24))?;
            let offset = tz
                .offset_from_local_datetime(&before)
                .earliest()?
                .fix()
                .local_minus_utc();
            let utc = naive.checked_sub_signed(Duration::seconds(i64::from(offset)))?;
            Some(Utc.from_utc_datetime(&utc))
        }
    }
}

/// The instant at which an all-day date starts in `tz`.
pub fn floating_midnight(date: NaiveDate, tz: &Tz) -> Option<DateTime<Utc>> {
    resolve_local(tz, date.and_hms_opt(0, 0, 0)?)
}

// ── Calendar arithmetic ─────────────────────────────────────────────────────

/// Add whole calendar months, clamping to the last valid day of the result.
pub fn add_months(date: NaiveDate, months: u32) -> Option<NaiveDate> {
    date.checked_add_months(Months::new(months))
}

/// Add whole days.
pub fn add_days(date: NaiveDate, days: i64) -> Option<NaiveDate> {
    date.checked_add_signed(Duration::try_days(days)?)
}

/// Number of month boundaries between two dates, ignoring the day of month.
///
/// Negative when `to` is in an earlier month than `from`.
pub fn months_between(from: NaiveDate, to: NaiveDate) -> i64 {
    let years = i64::from(to.year()) - i64::from(from.year());
    years * 12 + i64::from(to.month()) - i64::from(from.month())
}

// ── Formatting ──────────────────────────────────────────────────────────────

/// Format an all-day value: `YYYY-MM-DD`.
pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// Format an instant as `YYYY-MM-DD HH:mm` in the viewer's timezone.
pub fn format_local_minute(dt: DateTime<Utc>, tz: &Tz) -> String {
    dt.with_timezone(tz).format(DATETIME_FORMAT).to_string()
}

/// Compact date stamp used in occurrence ids (`YYYYMMDD`).
pub fn date_stamp(date: NaiveDate) -> String {
    date.format("%Y%m%d").to_string()
}

/// Compact UTC stamp used in occurrence ids (`YYYYMMDDTHHMMSSZ`).
pub fn instant_stamp(dt: DateTime<Utc>) -> String {
    dt.format("%Y%m%dT%H%M%SZ").to_string()
}
