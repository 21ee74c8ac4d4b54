//! Range query façade used by the calendar read endpoint.
//!
//! [`OccurrenceService`] validates the caller's window, asks an
//! [`AnchorStore`] for the owner's candidate rows, and hands them to
//! [`build_occurrences`]. The engine itself never performs I/O; the store is
//! the caller's collaborator.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::ResolvedConfig;
use crate::error::Result;
use crate::generator::Window;
use crate::merge::{build_occurrences, FormattedOccurrence};
use crate::rule::parse_rule;
use crate::source::{AnchorRows, ReminderRow, StandaloneEventRow, TaskRow};
use crate::temporal;

// ── Storage filter ──────────────────────────────────────────────────────────

/// Storage-level predicate for rows that may produce an occurrence in a window.
///
/// It is deliberately wider than the generator's overlap test: any row it
/// drops must be unable to produce an occurrence, but rows it admits may
/// still produce none.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchFilter {
    pub window: Window,
}

impl FetchFilter {
    pub fn new(window: Window) -> Self {
        Self { window }
    }

    pub fn admits_event(&self, row: &StandaloneEventRow) -> bool {
        let Some((start, end)) = Self::event_bounds(row) else {
            return true;
        };
        if start >= self.window.end() {
            return false;
        }
        if parse_rule(row.recurrence_rule.as_deref()).is_none() {
            return end >= self.window.start();
        }
        match row.recurrence_end_date {
            // Open-ended rules may still be producing occurrences today.
            None => true,
            Some(until) => until
                .checked_add_signed(end - start)
                .is_none_or(|last_end| last_end >= self.window.start()),
        }
    }

    pub fn admits_task(&self, row: &TaskRow) -> bool {
        row.deadline.is_some_and(|deadline| self.contains(deadline))
    }

    pub fn admits_reminder(&self, row: &ReminderRow) -> bool {
        row.remind_at.is_some_and(|remind_at| self.contains(remind_at))
    }

    /// Keep only the rows this filter admits.
    pub fn apply(&self, rows: &AnchorRows) -> AnchorRows {
        AnchorRows {
            events: rows
                .events
                .iter()
                .filter(|row| self.admits_event(row))
                .cloned()
                .collect(),
            tasks: rows
                .tasks
                .iter()
                .filter(|row| self.admits_task(row))
                .cloned()
                .collect(),
            reminders: rows
                .reminders
                .iter()
                .filter(|row| self.admits_reminder(row))
                .cloned()
                .collect(),
        }
    }

    /// Outer UTC bounds of the row's first occurrence.
    ///
    /// All-day dates float into the viewer's timezone, which can sit anywhere
    /// from UTC-12 to UTC+14, so they are padded by a whole day on the start
    /// side and by two days past the last date on the end side.
    fn event_bounds(row: &StandaloneEventRow) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        let end_at = row.end_at.unwrap_or(row.start_at).max(row.start_at);
        if !row.is_all_day {
            return Some((row.start_at, end_at));
        }
        let first = temporal::add_days(row.start_at.date_naive(), -1)?;
        let after_last = temporal::add_days(end_at.date_naive(), 2)?;
        Some((
            first.and_hms_opt(0, 0, 0)?.and_utc(),
            after_last.and_hms_opt(0, 0, 0)?.and_utc(),
        ))
    }

    fn contains(&self, instant: DateTime<Utc>) -> bool {
        instant >= self.window.start() && instant < self.window.end()
    }
}

// ── Storage ─────────────────────────────────────────────────────────────────

/// Read-only, owner-scoped access to stored anchors.
pub trait AnchorStore {
    /// Fetch the owner's rows that pass `filter`.
    ///
    /// # Errors
    ///
    /// Implementations report backend failures as
    /// [`EngineError::Storage`](crate::error::EngineError::Storage).
    fn fetch(&self, owner_id: &str, filter: &FetchFilter) -> Result<AnchorRows>;
}

impl<S: AnchorStore + ?Sized> AnchorStore for &S {
    fn fetch(&self, owner_id: &str, filter: &FetchFilter) -> Result<AnchorRows> {
        (**self).fetch(owner_id, filter)
    }
}

/// An [`AnchorStore`] over rows held in memory, keyed by owner id.
///
/// Deserializes from a JSON object of `{ "<ownerId>": { "events": [...],
/// "tasks": [...], "reminders": [...] } }`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InMemoryStore {
    owners: HashMap<String, AnchorRows>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, owner_id: impl Into<String>, rows: AnchorRows) {
        self.owners.insert(owner_id.into(), rows);
    }

    pub fn with_owner(mut self, owner_id: impl Into<String>, rows: AnchorRows) -> Self {
        self.insert(owner_id, rows);
        self
    }
}

impl AnchorStore for InMemoryStore {
    fn fetch(&self, owner_id: &str, filter: &FetchFilter) -> Result<AnchorRows> {
        Ok(self
            .owners
            .get(owner_id)
            .map(|rows| filter.apply(rows))
            .unwrap_or_default())
    }
}

// ── Façade ──────────────────────────────────────────────────────────────────

/// Lists an owner's occurrences for a window.
#[derive(Debug, Clone)]
pub struct OccurrenceService<S> {
    store: S,
    config: ResolvedConfig,
}

impl<S: AnchorStore> OccurrenceService<S> {
    pub fn new(store: S, config: ResolvedConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &ResolvedConfig {
        &self.config
    }

    /// List occurrences for `[start, end)` given as RFC 3339 strings.
    ///
    /// # Errors
    ///
    /// [`EngineError::InvalidRange`](crate::error::EngineError::InvalidRange)
    /// when either bound is unparseable or `start >= end`; nothing is fetched
    /// in that case. Store failures are passed through.
    pub fn list_occurrences(
        &self,
        owner_id: &str,
        start: &str,
        end: &str,
    ) -> Result<Vec<FormattedOccurrence>> {
        let window = Window::parse(start, end)?;
        self.list_occurrences_in(owner_id, &window)
    }

    /// List occurrences for an already validated window.
    pub fn list_occurrences_in(
        &self,
        owner_id: &str,
        window: &Window,
    ) -> Result<Vec<FormattedOccurrence>> {
        let filter = FetchFilter::new(*window);
        let rows = self.store.fetch(owner_id, &filter)?;
        tracing::debug!(
            owner_id,
            window_start = %window.start(),
            window_end = %window.end(),
            rows = rows.len(),
            "listing occurrences"
        );
        Ok(build_occurrences(&rows, window, &self.config))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::error::EngineError;
    use crate::source::TaskStatus;
    use crate::temporal::parse_rfc3339;
    use std::cell::Cell;

    fn utc(s: &str) -> DateTime<Utc> {
        parse_rfc3339(s).unwrap()
    }

    fn june_filter() -> FetchFilter {
        FetchFilter::new(Window::parse("2024-06-01T00:00:00Z", "2024-06-30T00:00:00Z").unwrap())
    }

    fn event(start: &str, end: Option<&str>, rule: Option<&str>) -> StandaloneEventRow {
        StandaloneEventRow {
            id: "e-1".to_string(),
            title: "Event".to_string(),
            description: None,
            start_at: utc(start),
            end_at: end.map(utc),
            is_all_day: false,
            color: None,
            recurrence_rule: rule.map(str::to_string),
            recurrence_end_date: None,
        }
    }

    fn rows() -> AnchorRows {
        AnchorRows {
            events: vec![event("2024-06-10T10:00:00Z", Some("2024-06-10T11:00:00Z"), None)],
            tasks: vec![TaskRow {
                id: "t-1".to_string(),
                title: "Task".to_string(),
                description: None,
                deadline: Some(utc("2024-06-20T17:00:00Z")),
                status: TaskStatus::Todo,
            }],
            reminders: vec![],
        }
    }

    /// Counts fetches so tests can assert no I/O happened.
    struct CountingStore {
        inner: InMemoryStore,
        calls: Cell<usize>,
    }

    impl AnchorStore for CountingStore {
        fn fetch(&self, owner_id: &str, filter: &FetchFilter) -> Result<AnchorRows> {
            self.calls.set(self.calls.get() + 1);
            self.inner.fetch(owner_id, filter)
        }
    }

    struct FailingStore;

    impl AnchorStore for FailingStore {
        fn fetch(&self, _owner_id: &str, _filter: &FetchFilter) -> Result<AnchorRows> {
            Err(EngineError::Storage("connection reset".to_string()))
        }
    }

    // ── FetchFilter ─────────────────────────────────────────────────────

    #[test]
    fn test_filter_non_recurring_events() {
        let f = june_filter();
        assert!(f.admits_event(&event("2024-06-10T10:00:00Z", None, None)));
        assert!(!f.admits_event(&event("2024-05-10T10:00:00Z", None, None)));
        assert!(!f.admits_event(&event("2024-06-30T00:00:00Z", None, None)));
        assert!(f.admits_event(&event(
            "2024-05-31T20:00:00Z",
            Some("2024-06-01T01:00:00Z"),
            None
        )));
    }

    #[test]
    fn test_filter_recurring_events() {
        let f = june_filter();
        let ancient = event("1999-01-01T09:00:00Z", None, Some("FREQ=DAILY"));
        assert!(f.admits_event(&ancient));

        let ended = StandaloneEventRow {
            recurrence_end_date: Some(utc("2024-05-01T00:00:00Z")),
            ..ancient.clone()
        };
        assert!(!f.admits_event(&ended));

        let ends_inside = StandaloneEventRow {
            recurrence_end_date: Some(utc("2024-06-05T00:00:00Z")),
            ..ancient.clone()
        };
        assert!(f.admits_event(&ends_inside));

        let future = event("2024-07-01T09:00:00Z", None, Some("FREQ=DAILY"));
        assert!(!f.admits_event(&future));

        // A malformed rule is treated as a single event.
        let malformed = event("1999-01-01T09:00:00Z", None, Some("FREQ=SOMETIMES"));
        assert!(!f.admits_event(&malformed));
    }

    #[test]
    fn test_filter_widens_all_day_rows() {
        let mut row = event("2024-06-30T00:00:00Z", None, None);
        row.is_all_day = true;
        // Placed at 2024-06-29T15:00Z for a Tokyo viewer, so it must be fetched.
        assert!(june_filter().admits_event(&row));
    }

    fn all_day_service(
        timezone: &str,
        start_at: &str,
    ) -> (OccurrenceService<InMemoryStore>, AnchorRows) {
        let mut row = event(start_at, None, None);
        row.is_all_day = true;
        let rows = AnchorRows {
            events: vec![row],
            ..Default::default()
        };
        let config = EngineConfig {
            timezone: Some(timezone.to_string()),
            ..Default::default()
        }
        .resolve()
        .unwrap();
        let store = InMemoryStore::new().with_owner("alice", rows.clone());
        (OccurrenceService::new(store, config), rows)
    }

    #[test]
    fn test_service_keeps_all_day_rows_west_of_utc() {
        // June 15 in Honolulu runs until 2024-06-16T10:00Z.
        let (service, rows) = all_day_service("Pacific/Honolulu", "2024-06-15T00:00:00Z");
        let window = Window::parse("2024-06-16T03:00:00Z", "2024-06-17T03:00:00Z").unwrap();
        let direct = build_occurrences(&rows, &window, service.config());
        assert_eq!(direct.len(), 1);
        assert_eq!(service.list_occurrences_in("alice", &window).unwrap(), direct);
    }

    #[test]
    fn test_service_keeps_all_day_rows_far_east_of_utc() {
        // June 15 in Kiritimati starts at 2024-06-14T10:00Z, 37 hours before the stored instant.
        let (service, rows) = all_day_service("Pacific/Kiritimati", "2024-06-15T23:00:00Z");
        let window = Window::parse("2024-06-14T09:00:00Z", "2024-06-14T12:00:00Z").unwrap();
        let direct = build_occurrences(&rows, &window, service.config());
        assert_eq!(direct.len(), 1);
        assert_eq!(direct[0].start, "2024-06-15");
        assert_eq!(service.list_occurrences_in("alice", &window).unwrap(), direct);
    }

    #[test]
    fn test_filter_all_day_recurrence_end_is_padded() {
        let mut row = event("2024-05-01T00:00:00Z", None, Some("FREQ=DAILY"));
        row.is_all_day = true;
        row.recurrence_end_date = Some(utc("2024-05-31T00:00:00Z"));
        // The May 31 date reaches 2024-06-01T12:00Z for a UTC-12 viewer.
        assert!(june_filter().admits_event(&row));
        row.recurrence_end_date = Some(utc("2024-05-28T00:00:00Z"));
        assert!(!june_filter().admits_event(&row));
    }

    #[test]
    fn test_filter_tasks_and_reminders() {
        let f = june_filter();
        let mut task = rows().tasks.remove(0);
        assert!(f.admits_task(&task));
        task.deadline = None;
        assert!(!f.admits_task(&task));
        task.deadline = Some(utc("2024-06-30T00:00:00Z"));
        assert!(!f.admits_task(&task));

        let reminder = ReminderRow {
            id: "r-1".to_string(),
            title: "Ping".to_string(),
            remind_at: Some(utc("2024-06-01T00:00:00Z")),
        };
        assert!(f.admits_reminder(&reminder));
    }

    // ── Service ─────────────────────────────────────────────────────────

    #[test]
    fn test_service_lists_owner_rows_only() {
        let store = InMemoryStore::new()
            .with_owner("alice", rows())
            .with_owner("bob", AnchorRows::default());
        let service = OccurrenceService::new(store, ResolvedConfig::default());

        let alice = service
            .list_occurrences("alice", "2024-06-01T00:00:00Z", "2024-06-30T00:00:00Z")
            .unwrap();
        assert_eq!(alice.len(), 2);
        assert_eq!(alice[0].start, "2024-06-10 10:00");

        let bob = service
            .list_occurrences("bob", "2024-06-01T00:00:00Z", "2024-06-30T00:00:00Z")
            .unwrap();
        assert!(bob.is_empty());

        let nobody = service
            .list_occurrences("carol", "2024-06-01T00:00:00Z", "2024-06-30T00:00:00Z")
            .unwrap();
        assert!(nobody.is_empty());
    }

    #[test]
    fn test_invalid_range_fetches_nothing() {
        let store = CountingStore {
            inner: InMemoryStore::new().with_owner("alice", rows()),
            calls: Cell::new(0),
        };
        let service = OccurrenceService::new(&store, ResolvedConfig::default());

        let inverted =
            service.list_occurrences("alice", "2024-06-30T00:00:00Z", "2024-06-01T00:00:00Z");
        assert!(matches!(inverted, Err(EngineError::InvalidRange(_))));

        let empty =
            service.list_occurrences("alice", "2024-06-01T00:00:00Z", "2024-06-01T00:00:00Z");
        assert!(matches!(empty, Err(EngineError::InvalidRange(_))));

        let garbage = service.list_occurrences("alice", "june", "2024-06-30T00:00:00Z");
        assert!(matches!(garbage, Err(EngineError::InvalidRange(_))));

        assert_eq!(store.calls.get(), 0);
    }

    #[test]
    fn test_storage_errors_propagate() {
        let service = OccurrenceService::new(FailingStore, ResolvedConfig::default());
        let err = service
            .list_occurrences("alice", "2024-06-01T00:00:00Z", "2024-06-30T00:00:00Z")
            .unwrap_err();
        assert_eq!(err, EngineError::Storage("connection reset".to_string()));
    }

    #[test]
    fn test_in_memory_store_from_json() {
        let store: InMemoryStore = serde_json::from_str(
            r#"{"alice": {"reminders": [{"id": "r-1", "title": "Ping", "remindAt": "2024-06-02T08:00:00Z"}]}}"#,
        )
        .unwrap();
        let service = OccurrenceService::new(store, ResolvedConfig::default());
        let out = service
            .list_occurrences("alice", "2024-06-01T00:00:00Z", "2024-06-30T00:00:00Z")
            .unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].calendar_id, "reminder");
    }
}
