//! Recurrence rule parsing.
//!
//! Rules are the compact `FREQ=...` strings written by the event form. Only the
//! `FREQ` component is interpreted and only the four bare frequencies the form
//! offers are recognized. Everything else (other keys, `BYDAY`, `INTERVAL`) is
//! ignored.
//!
//! Two entry points:
//!
//! - [`parse_rule`]: lenient. Anything unrecognized means "does not repeat".
//!   This is what the calendar uses.
//! - [`Rule::from_str`](std::str::FromStr): strict, reports a [`RuleError`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::RuleError;

/// How often a recurring anchor repeats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl Frequency {
    /// The `FREQ` value as written in a rule string.
    pub fn as_str(self) -> &'static str {
        match self {
            Frequency::Daily => "DAILY",
            Frequency::Weekly => "WEEKLY",
            Frequency::Monthly => "MONTHLY",
            Frequency::Yearly => "YEARLY",
        }
    }

    fn from_value(value: &str) -> Option<Self> {
        match value {
            "DAILY" => Some(Frequency::Daily),
            "WEEKLY" => Some(Frequency::Weekly),
            "MONTHLY" => Some(Frequency::Monthly),
            "YEARLY" => Some(Frequency::Yearly),
            _ => None,
        }
    }
}

/// A parsed recurrence rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rule {
    pub frequency: Frequency,
}

impl Rule {
    pub fn new(frequency: Frequency) -> Self {
        Self { frequency }
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FREQ={}", self.frequency.as_str())
    }
}

impl FromStr for Rule {
    type Err = RuleError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        // First FREQ wins; later duplicates are ignored like any other key.
        let value = raw
            .split(';')
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(key, _)| key.trim() == "FREQ")
            .map(|(_, value)| value.trim())
            .ok_or_else(|| RuleError::MissingFrequency(raw.to_string()))?;

        Frequency::from_value(value)
            .map(Rule::new)
            .ok_or_else(|| RuleError::UnknownFrequency(value.to_string()))
    }
}

/// Parse a stored rule string, treating anything unusable as "no recurrence".
///
/// # Examples
///
/// ```
/// use occurrence_engine::rule::{parse_rule, Frequency};
///
/// let rule = parse_rule(Some("FREQ=WEEKLY;BYDAY=MO")).unwrap();
/// assert_eq!(rule.frequency, Frequency::Weekly);
/// assert!(parse_rule(Some("FOO=BAR")).is_none());
/// assert!(parse_rule(None).is_none());
/// ```
pub fn parse_rule(raw: Option<&str>) -> Option<Rule> {
    let raw = raw?.trim();
    if raw.is_empty() {
        return None;
    }
    match raw.parse::<Rule>() {
        Ok(rule) => Some(rule),
        Err(e) => {
            tracing::trace!(rule = raw, error = %e, "ignoring unusable recurrence rule");
            None
        }
    }
}
