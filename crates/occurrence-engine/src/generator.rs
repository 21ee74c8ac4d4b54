//! Occurrence generation for a single anchor.
//!
//! Given one [`BaseRecurringEntity`] and a half-open [`Window`], produce the
//! ordered [`Span`]s that fall inside the window. Recurring entities are
//! expanded step by step from the anchor, but the first step index is computed
//! in closed form, so an unbounded rule queried decades after it started costs
//! the same as one queried in its first week.
//!
//! # Overlap
//!
//! - Timed: `start < window.end && end >= window.start` (`end` is `start` for
//!   zero-length entries such as task deadlines).
//! - All-day: the span covers whole local days, from midnight of the first
//!   date to midnight after the last date in the viewer's timezone, and
//!   overlaps when that range intersects the window.
//!
//! # Stepping
//!
//! Candidate `n` is always `anchor + n × period`, never the previous candidate
//! plus one period, so month clamping does not drift (Jan 31 → Feb 29 →
//! Mar 31, not Mar 29). Timed anchors step on the local wall clock of
//! [`GenerateOptions::timezone`]; all-day anchors step on dates only.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};
use chrono_tz::Tz;

use crate::error::{EngineError, Result};
use crate::rule::{Frequency, Rule};
use crate::temporal;

/// Upper bound on spans emitted for one anchor in one call.
///
/// Reaching it truncates the expansion; it is not an error.
pub const MAX_OCCURRENCES_PER_ANCHOR: usize = 1000;

// ── Window ──────────────────────────────────────────────────────────────────

/// A half-open query range `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl Window {
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidRange`] unless `start < end`.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self> {
        if start >= end {
            return Err(EngineError::InvalidRange(format!(
                "start {} must be before end {}",
                start.to_rfc3339(),
                end.to_rfc3339()
            )));
        }
        Ok(Self { start, end })
    }

    /// Build a window from two RFC 3339 strings.
    pub fn parse(start: &str, end: &str) -> Result<Self> {
        Self::new(temporal::parse_rfc3339(start)?, temporal::parse_rfc3339(end)?)
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }
}

// ── Entity and output shapes ────────────────────────────────────────────────

/// The only input shape the generator understands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseRecurringEntity {
    pub start_at: DateTime<Utc>,
    pub end_at: Option<DateTime<Utc>>,
    /// Read `start_at`/`end_at` as their UTC calendar dates.
    ///
    /// Stores must write all-day rows at UTC midnight of the intended date
    /// (any time on that UTC date works). A row written at the creator's local
    /// midnight east of UTC, such as `2024-06-14T15:00Z` for June 15 in Tokyo,
    /// reads as the previous day.
    pub is_all_day: bool,
    pub recurrence_rule: Option<Rule>,
    /// Inclusive bound on candidate starts.
    pub recurrence_end_date: Option<DateTime<Utc>>,
}

impl BaseRecurringEntity {
    /// A timed entry that happens once.
    pub fn timed(start_at: DateTime<Utc>, end_at: Option<DateTime<Utc>>) -> Self {
        Self {
            start_at,
            end_at,
            is_all_day: false,
            recurrence_rule: None,
            recurrence_end_date: None,
        }
    }

    /// An all-day entry that happens once.
    pub fn all_day(start_at: DateTime<Utc>, end_at: Option<DateTime<Utc>>) -> Self {
        Self {
            is_all_day: true,
            ..Self::timed(start_at, end_at)
        }
    }

    pub fn with_rule(mut self, rule: Option<Rule>) -> Self {
        self.recurrence_rule = rule;
        self
    }

    pub fn until(mut self, recurrence_end_date: Option<DateTime<Utc>>) -> Self {
        self.recurrence_end_date = recurrence_end_date;
        self
    }

    pub fn is_recurring(&self) -> bool {
        self.recurrence_rule.is_some()
    }

    /// Length reused by every occurrence. A missing or inverted end is zero.
    fn duration(&self) -> Duration {
        match self.end_at {
            Some(end) if end > self.start_at => end - self.start_at,
            _ => Duration::zero(),
        }
    }

    /// Extra whole days an all-day occurrence spans after its first date.
    fn extra_days(&self) -> i64 {
        match self.end_at {
            Some(end) => (end.date_naive() - self.start_at.date_naive())
                .num_days()
                .max(0),
            None => 0,
        }
    }
}

/// When an occurrence starts or ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OccurrenceTime {
    /// A floating calendar date (all-day).
    Date(NaiveDate),
    /// An absolute instant (timed).
    Instant(DateTime<Utc>),
}

impl OccurrenceTime {
    /// Wire representation: `YYYY-MM-DD` or `YYYY-MM-DD HH:mm` in `tz`.
    pub fn format(&self, tz: &Tz) -> String {
        match self {
            OccurrenceTime::Date(date) => temporal::format_date(*date),
            OccurrenceTime::Instant(dt) => temporal::format_local_minute(*dt, tz),
        }
    }

    /// Canonical compact form used to derive occurrence ids.
    pub fn stamp(&self) -> String {
        match self {
            OccurrenceTime::Date(date) => temporal::date_stamp(*date),
            OccurrenceTime::Instant(dt) => temporal::instant_stamp(*dt),
        }
    }
}

/// One generated `(start, end)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: OccurrenceTime,
    pub end: OccurrenceTime,
    /// Where `start` sits on the timeline; local midnight for all-day dates.
    pub starts_at: DateTime<Utc>,
}

/// Options for [`generate_with_options`].
#[derive(Debug, Clone)]
pub struct GenerateOptions {
    /// Wall clock used for stepping timed entries and placing all-day dates.
    pub timezone: Tz,
    /// Safety cap on emitted spans per entity.
    pub max_occurrences: usize,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            timezone: Tz::UTC,
            max_occurrences: MAX_OCCURRENCES_PER_ANCHOR,
        }
    }
}

// ── generate ────────────────────────────────────────────────────────────────

/// Expand `entity` against `window` in UTC with the default safety cap.
///
/// # Examples
///
/// ```
/// use chrono::{TimeZone, Utc};
/// use occurrence_engine::generator::{generate, BaseRecurringEntity, Window};
/// use occurrence_engine::rule::parse_rule;
///
/// let start = Utc.with_ymd_and_hms(2024, 6, 3, 9, 0, 0).unwrap();
/// let entity = BaseRecurringEntity::timed(start, None).with_rule(parse_rule(Some("FREQ=WEEKLY")));
/// let window = Window::new(
///     Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap(),
///     Utc.with_ymd_and_hms(2024, 6, 30, 0, 0, 0).unwrap(),
/// )
/// .unwrap();
///
/// assert_eq!(generate(&entity, &window).len(), 4);
/// ```
pub fn generate(entity: &BaseRecurringEntity, window: &Window) -> Vec<Span> {
    generate_with_options(entity, window, &GenerateOptions::default())
}

/// Expand `entity` against `window`.
///
/// The result is ordered by start and identical across repeated calls with
/// the same arguments.
pub fn generate_with_options(
    entity: &BaseRecurringEntity,
    window: &Window,
    options: &GenerateOptions,
) -> Vec<Span> {
    let expansion = Expansion::new(entity, window, &options.timezone);

    let Some(rule) = entity.recurrence_rule else {
        return expansion
            .span_at(0)
            .filter(|span| expansion.overlaps(span))
            .into_iter()
            .collect();
    };

    let mut spans = Vec::new();
    let mut n = expansion.first_index(rule.frequency);
    loop {
        let Some(span) = expansion
            .candidate(rule.frequency, n)
            .and_then(|local| expansion.span_for(n, local))
        else {
            break;
        };
        if expansion.past_recurrence_end(&span) || span.starts_at >= window.end {
            break;
        }
        if expansion.overlaps(&span) {
            if spans.len() >= options.max_occurrences {
                tracing::warn!(
                    cap = options.max_occurrences,
                    start_at = %entity.start_at,
                    frequency = rule.frequency.as_str(),
                    "occurrence cap reached, truncating expansion"
                );
                break;
            }
            spans.push(span);
        }
        n += 1;
    }
    spans
}

/// Per-call expansion state: the anchor on the local wall clock plus the
/// window it is being expanded against.
struct Expansion<'a> {
    entity: &'a BaseRecurringEntity,
    window: &'a Window,
    tz: &'a Tz,
    /// Anchor start as local wall-clock time (midnight for all-day).
    base: NaiveDateTime,
    duration: Duration,
    extra_days: i64,
}

impl<'a> Expansion<'a> {
    fn new(entity: &'a BaseRecurringEntity, window: &'a Window, tz: &'a Tz) -> Self {
        let base = if entity.is_all_day {
            entity
                .start_at
                .date_naive()
                .and_hms_opt(0, 0, 0)
                .unwrap_or_else(|| entity.start_at.naive_utc())
        } else {
            entity.start_at.with_timezone(tz).naive_local()
        };
        Self {
            entity,
            window,
            tz,
            base,
            duration: entity.duration(),
            extra_days: entity.extra_days(),
        }
    }

    /// Smallest step index that could still overlap the window, minus one
    /// step of slack for DST and time-of-day effects.
    fn first_index(&self, frequency: Frequency) -> u64 {
        // Candidates starting before `target` end before the window opens.
        let target = if self.entity.is_all_day {
            Duration::try_days(self.extra_days + 1).and_then(|span| {
                self.window
                    .start
                    .with_timezone(self.tz)
                    .naive_local()
                    .checked_sub_signed(span)
            })
        } else {
            self.window
                .start
                .checked_sub_signed(self.duration)
                .map(|dt| dt.with_timezone(self.tz).naive_local())
        };
        let Some(target) = target.filter(|target| *target > self.base) else {
            return 0;
        };

        let days = (target.date() - self.base.date()).num_days();
        let months = temporal::months_between(self.base.date(), target.date());
        let steps = match frequency {
            Frequency::Daily => days,
            Frequency::Weekly => days.div_euclid(7),
            Frequency::Monthly => months,
            Frequency::Yearly => months.div_euclid(12),
        };
        u64::try_from(steps - 1).unwrap_or(0)
    }

    /// Local wall-clock start of candidate `n`, or `None` on overflow.
    fn candidate(&self, frequency: Frequency, n: u64) -> Option<NaiveDateTime> {
        let n_days = |per: i64| i64::try_from(n).ok()?.checked_mul(per);
        let n_months = |per: u32| u32::try_from(n).ok()?.checked_mul(per);
        let date = self.base.date();
        let stepped = match frequency {
            Frequency::Daily => temporal::add_days(date, n_days(1)?)?,
            Frequency::Weekly => temporal::add_days(date, n_days(7)?)?,
            Frequency::Monthly => temporal::add_months(date, n_months(1)?)?,
            Frequency::Yearly => temporal::add_months(date, n_months(12)?)?,
        };
        Some(stepped.and_time(self.base.time()))
    }

    fn past_recurrence_end(&self, span: &Span) -> bool {
        let Some(until) = self.entity.recurrence_end_date else {
            return false;
        };
        match span.start {
            OccurrenceTime::Date(date) => date > until.date_naive(),
            OccurrenceTime::Instant(start) => start > until,
        }
    }

    fn span_at(&self, n: u64) -> Option<Span> {
        self.span_for(n, self.base)
    }

    fn span_for(&self, n: u64, local: NaiveDateTime) -> Option<Span> {
        if self.entity.is_all_day {
            let first = local.date();
            let last = temporal::add_days(first, self.extra_days)?;
            Some(Span {
                start: OccurrenceTime::Date(first),
                end: OccurrenceTime::Date(last),
                starts_at: temporal::floating_midnight(first, self.tz)?,
            })
        } else {
            // Step zero is the stored instant itself, even when its wall time
            // is ambiguous in the viewer's timezone.
            let start = if n == 0 {
                self.entity.start_at
            } else {
                temporal::resolve_local(self.tz, local)?
            };
            let end = start.checked_add_signed(self.duration)?;
            Some(Span {
                start: OccurrenceTime::Instant(start),
                end: OccurrenceTime::Instant(end),
                starts_at: start,
            })
        }
    }

    fn overlaps(&self, span: &Span) -> bool {
        if span.starts_at >= self.window.end {
            return false;
        }
        match span.end {
            OccurrenceTime::Instant(end) => end >= self.window.start,
            OccurrenceTime::Date(last) => temporal::add_days(last, 1)
                .and_then(|after| temporal::floating_midnight(after, self.tz))
                .is_some_and(|end_exclusive| end_exclusive > self.window.start),
        }
    }
}
