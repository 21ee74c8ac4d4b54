//! Merge and format: every row of every kind into one sorted wire list.

use serde::Serialize;

use crate::config::ResolvedConfig;
use crate::generator::{generate_with_options, OccurrenceTime, Window};
use crate::source::{AnchorRows, CalendarSource, Occurrence, SourceType};

/// An occurrence as sent to clients.
///
/// `start`/`end` are `YYYY-MM-DD` for all-day entries and `YYYY-MM-DD HH:mm`
/// in the viewer's timezone otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormattedOccurrence {
    pub anchor_id: String,
    pub occurrence_id: String,
    pub start: String,
    pub end: String,
    pub is_all_day: bool,
    pub title: String,
    pub description: Option<String>,
    pub source_type: SourceType,
    pub calendar_id: String,
    pub source_task_id: Option<String>,
    pub original_event_id: String,
}

impl FormattedOccurrence {
    pub fn from_occurrence(occurrence: Occurrence, config: &ResolvedConfig) -> Self {
        let tz = config.timezone();
        Self {
            start: occurrence.span.start.format(tz),
            end: occurrence.span.end.format(tz),
            is_all_day: matches!(occurrence.span.start, OccurrenceTime::Date(_)),
            original_event_id: occurrence.anchor_id.clone(),
            anchor_id: occurrence.anchor_id,
            occurrence_id: occurrence.occurrence_id,
            title: occurrence.title,
            description: occurrence.description,
            source_type: occurrence.source_type,
            calendar_id: occurrence.calendar_id,
            source_task_id: occurrence.source_task_id,
        }
    }
}

/// Expand every row against `window` and sort the result, without formatting.
///
/// Sorted ascending by start; ties by anchor id, then by source kind.
pub fn collect_occurrences(
    rows: &AnchorRows,
    window: &Window,
    config: &ResolvedConfig,
) -> Vec<Occurrence> {
    let mut occurrences = Vec::new();
    let mut skipped = 0usize;

    for source in rows.sources() {
        let Some(entity) = source.to_entity(&config.policy) else {
            skipped += 1;
            tracing::trace!(
                anchor_id = source.anchor_id(),
                source_type = ?source.source_type(),
                "row has no calendar entry"
            );
            continue;
        };
        occurrences.extend(
            generate_with_options(&entity, window, &config.generate)
                .into_iter()
                .map(|span| source.to_occurrence(&entity, span)),
        );
    }

    occurrences.sort_by(|a, b| {
        a.span
            .starts_at
            .cmp(&b.span.starts_at)
            .then_with(|| a.anchor_id.cmp(&b.anchor_id))
            .then_with(|| a.source_type.cmp(&b.source_type))
    });

    tracing::debug!(
        rows = rows.len(),
        skipped,
        occurrences = occurrences.len(),
        "expanded calendar rows"
    );
    occurrences
}

/// Expand, merge, sort and format every row against `window`.
///
/// A pure function of its arguments: identical inputs give identical output.
pub fn build_occurrences(
    rows: &AnchorRows,
    window: &Window,
    config: &ResolvedConfig,
) -> Vec<FormattedOccurrence> {
    collect_occurrences(rows, window, config)
        .into_iter()
        .map(|occurrence| FormattedOccurrence::from_occurrence(occurrence, config))
        .collect()
}
