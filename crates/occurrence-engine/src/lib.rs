//! # occurrence-engine
//!
//! Deterministic calendar occurrence expansion.
//!
//! Turns stored calendar anchors (one-off events, recurring events, task
//! deadlines and reminders) into one flat, time-bounded, sorted list of
//! concrete occurrences. The engine is synchronous, stateless and never reads
//! the system clock: every boundary is expressed through the caller's window.
//!
//! ## Modules
//!
//! - [`rule`]: `FREQ=...` string → [`Rule`]
//! - [`generator`]: one anchor + window → ordered `(start, end)` spans
//! - [`source`]: stored rows ↔ generator input and unified [`Occurrence`]s
//! - [`merge`]: expand every row, sort, format for the wire
//! - [`query`]: window validation and owner-scoped fetching
//! - [`config`]: viewer timezone, task visibility, safety cap
//! - [`temporal`]: timezone, calendar arithmetic and formatting helpers
//! - [`error`]: Error types

pub mod config;
pub mod error;
pub mod generator;
pub mod merge;
pub mod query;
pub mod rule;
pub mod source;
pub mod temporal;

pub use config::{EngineConfig, ResolvedConfig};
pub use error::{EngineError, RuleError};
pub use generator::{
    generate, generate_with_options, BaseRecurringEntity, GenerateOptions, OccurrenceTime, Span,
    Window, MAX_OCCURRENCES_PER_ANCHOR,
};
pub use merge::{build_occurrences, collect_occurrences, FormattedOccurrence};
pub use query::{AnchorStore, FetchFilter, InMemoryStore, OccurrenceService};
pub use rule::{parse_rule, Frequency, Rule};
pub use source::{
    AnchorRows, CalendarSource, Occurrence, ReminderRow, SourcePolicy, SourceRow, SourceType,
    StandaloneEventRow, TaskRow, TaskStatus,
};
