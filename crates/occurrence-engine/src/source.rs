//! Source adapters: stored rows in, unified occurrences out.
//!
//! Three stored shapes feed the calendar. Each implements [`CalendarSource`],
//! which maps the row to the generator's [`BaseRecurringEntity`] and maps each
//! generated [`Span`] back into an [`Occurrence`]. The generator and the merge
//! layer only ever see those two shapes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::generator::{BaseRecurringEntity, Span};
use crate::rule::parse_rule;

/// Display bucket for standalone events without a color token.
pub const STANDALONE_CALENDAR_ID: &str = "standalone";
/// Display bucket for task deadlines.
pub const TASK_CALENDAR_ID: &str = "task";
/// Display bucket for reminders.
pub const REMINDER_CALENDAR_ID: &str = "reminder";

// ── Stored rows ─────────────────────────────────────────────────────────────

/// A calendar event created directly by the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StandaloneEventRow {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub start_at: DateTime<Utc>,
    #[serde(default)]
    pub end_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_all_day: bool,
    /// User-chosen color token, used as the calendar id when set.
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub recurrence_rule: Option<String>,
    #[serde(default)]
    pub recurrence_end_date: Option<DateTime<Utc>>,
}

/// Task lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    #[default]
    Todo,
    InProgress,
    Completed,
    Archived,
    /// Any status this engine does not know about; treated like an open task.
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskRow {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub deadline: Option<DateTime<Utc>>,
    #[serde(default)]
    pub status: TaskStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReminderRow {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub remind_at: Option<DateTime<Utc>>,
}

/// Every anchor fetched for one owner.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnchorRows {
    pub events: Vec<StandaloneEventRow>,
    pub tasks: Vec<TaskRow>,
    pub reminders: Vec<ReminderRow>,
}

impl AnchorRows {
    /// All rows as tagged sources: events, then tasks, then reminders.
    pub fn sources(&self) -> impl Iterator<Item = SourceRow<'_>> {
        self.events
            .iter()
            .map(SourceRow::Standalone)
            .chain(self.tasks.iter().map(SourceRow::Task))
            .chain(self.reminders.iter().map(SourceRow::Reminder))
    }

    pub fn len(&self) -> usize {
        self.events.len() + self.tasks.len() + self.reminders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ── Output ──────────────────────────────────────────────────────────────────

/// Which kind of row an occurrence came from.
///
/// Variant order is the tie-break order when two occurrences share a start
/// and an anchor id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SourceType {
    Standalone,
    Task,
    Reminder,
}

/// One concrete, dated instance of an anchor, before wire formatting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Occurrence {
    pub anchor_id: String,
    pub occurrence_id: String,
    pub span: Span,
    pub title: String,
    pub description: Option<String>,
    pub source_type: SourceType,
    pub calendar_id: String,
    pub source_task_id: Option<String>,
}

impl Occurrence {
    /// The anchor's id, for clients that edit or delete the stored row.
    pub fn original_event_id(&self) -> &str {
        &self.anchor_id
    }
}

/// Id of one generated instance.
///
/// A single occurrence reuses the anchor id. A recurring instance appends its
/// canonical start, so the same instance gets the same id on every query.
pub fn occurrence_id(anchor_id: &str, entity: &BaseRecurringEntity, span: &Span) -> String {
    if entity.is_recurring() {
        format!("{}@{}", anchor_id, span.start.stamp())
    } else {
        anchor_id.to_string()
    }
}

// ── Adapter contract ────────────────────────────────────────────────────────

/// Which rows are allowed onto the calendar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SourcePolicy {
    pub include_completed_tasks: bool,
    pub include_archived_tasks: bool,
}

impl Default for SourcePolicy {
    fn default() -> Self {
        Self {
            include_completed_tasks: true,
            include_archived_tasks: false,
        }
    }
}

impl SourcePolicy {
    pub fn admits_status(&self, status: TaskStatus) -> bool {
        match status {
            TaskStatus::Completed => self.include_completed_tasks,
            TaskStatus::Archived => self.include_archived_tasks,
            TaskStatus::Todo | TaskStatus::InProgress | TaskStatus::Other => true,
        }
    }
}

/// The two-way mapping every stored row kind provides.
pub trait CalendarSource {
    fn anchor_id(&self) -> &str;

    fn source_type(&self) -> SourceType;

    /// The generator input for this row, or `None` when the row has nothing
    /// schedulable or the policy keeps it off the calendar.
    fn to_entity(&self, policy: &SourcePolicy) -> Option<BaseRecurringEntity>;

    /// Build the occurrence for one generated span of this row.
    fn to_occurrence(&self, entity: &BaseRecurringEntity, span: Span) -> Occurrence;
}

impl CalendarSource for StandaloneEventRow {
    fn anchor_id(&self) -> &str {
        &self.id
    }

    fn source_type(&self) -> SourceType {
        SourceType::Standalone
    }

    fn to_entity(&self, _policy: &SourcePolicy) -> Option<BaseRecurringEntity> {
        Some(BaseRecurringEntity {
            start_at: self.start_at,
            end_at: self.end_at,
            is_all_day: self.is_all_day,
            recurrence_rule: parse_rule(self.recurrence_rule.as_deref()),
            recurrence_end_date: self.recurrence_end_date,
        })
    }

    fn to_occurrence(&self, entity: &BaseRecurringEntity, span: Span) -> Occurrence {
        let calendar_id = self
            .color
            .as_deref()
            .map(str::trim)
            .filter(|color| !color.is_empty())
            .unwrap_or(STANDALONE_CALENDAR_ID)
            .to_string();
        Occurrence {
            anchor_id: self.id.clone(),
            occurrence_id: occurrence_id(&self.id, entity, &span),
            span,
            title: self.title.clone(),
            description: self.description.clone(),
            source_type: SourceType::Standalone,
            calendar_id,
            source_task_id: None,
        }
    }
}

impl CalendarSource for TaskRow {
    fn anchor_id(&self) -> &str {
        &self.id
    }

    fn source_type(&self) -> SourceType {
        SourceType::Task
    }

    fn to_entity(&self, policy: &SourcePolicy) -> Option<BaseRecurringEntity> {
        if !policy.admits_status(self.status) {
            return None;
        }
        let deadline = self.deadline?;
        Some(BaseRecurringEntity::timed(deadline, Some(deadline)))
    }

    fn to_occurrence(&self, entity: &BaseRecurringEntity, span: Span) -> Occurrence {
        Occurrence {
            anchor_id: self.id.clone(),
            occurrence_id: occurrence_id(&self.id, entity, &span),
            span,
            title: self.title.clone(),
            description: self.description.clone(),
            source_type: SourceType::Task,
            calendar_id: TASK_CALENDAR_ID.to_string(),
            source_task_id: Some(self.id.clone()),
        }
    }
}

impl CalendarSource for ReminderRow {
    fn anchor_id(&self) -> &str {
        &self.id
    }

    fn source_type(&self) -> SourceType {
        SourceType::Reminder
    }

    fn to_entity(&self, _policy: &SourcePolicy) -> Option<BaseRecurringEntity> {
        let remind_at = self.remind_at?;
        Some(BaseRecurringEntity::timed(remind_at, Some(remind_at)))
    }

    fn to_occurrence(&self, entity: &BaseRecurringEntity, span: Span) -> Occurrence {
        Occurrence {
            anchor_id: self.id.clone(),
            occurrence_id: occurrence_id(&self.id, entity, &span),
            span,
            title: self.title.clone(),
            description: None,
            source_type: SourceType::Reminder,
            calendar_id: REMINDER_CALENDAR_ID.to_string(),
            source_task_id: None,
        }
    }
}

/// A borrowed row of any kind.
#[derive(Debug, Clone, Copy)]
pub enum SourceRow<'a> {
    Standalone(&'a StandaloneEventRow),
    Task(&'a TaskRow),
    Reminder(&'a ReminderRow),
}

impl<'a> SourceRow<'a> {
    /// Id of the borrowed row, living as long as the row itself.
    pub fn anchor_id(&self) -> &'a str {
        match *self {
            SourceRow::Standalone(row) => &row.id,
            SourceRow::Task(row) => &row.id,
            SourceRow::Reminder(row) => &row.id,
        }
    }
}

impl CalendarSource for SourceRow<'_> {
    fn anchor_id(&self) -> &str {
        SourceRow::anchor_id(self)
    }

    fn source_type(&self) -> SourceType {
        match self {
            SourceRow::Standalone(row) => row.source_type(),
            SourceRow::Task(row) => row.source_type(),
            SourceRow::Reminder(row) => row.source_type(),
        }
    }

    fn to_entity(&self, policy: &SourcePolicy) -> Option<BaseRecurringEntity> {
        match self {
            SourceRow::Standalone(row) => row.to_entity(policy),
            SourceRow::Task(row) => row.to_entity(policy),
            SourceRow::Reminder(row) => row.to_entity(policy),
        }
    }

    fn to_occurrence(&self, entity: &BaseRecurringEntity, span: Span) -> Occurrence {
        match self {
            SourceRow::Standalone(row) => row.to_occurrence(entity, span),
            SourceRow::Task(row) => row.to_occurrence(entity, span),
            SourceRow::Reminder(row) => row.to_occurrence(entity, span),
        }
    }
}
