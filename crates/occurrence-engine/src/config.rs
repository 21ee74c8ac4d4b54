//! Engine configuration.
//!
//! [`EngineConfig`] is the serializable form (camelCase JSON, every field
//! optional). [`EngineConfig::resolve`] validates it into [`ResolvedConfig`],
//! which is what the merge layer and the façade actually use.

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::generator::{GenerateOptions, MAX_OCCURRENCES_PER_ANCHOR};
use crate::source::SourcePolicy;
use crate::temporal::parse_timezone;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    /// The viewer's IANA timezone. `None` means UTC.
    pub timezone: Option<String>,
    pub include_completed_tasks: bool,
    pub include_archived_tasks: bool,
    pub max_occurrences_per_anchor: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let policy = SourcePolicy::default();
        Self {
            timezone: None,
            include_completed_tasks: policy.include_completed_tasks,
            include_archived_tasks: policy.include_archived_tasks,
            max_occurrences_per_anchor: MAX_OCCURRENCES_PER_ANCHOR,
        }
    }
}

impl EngineConfig {
    /// Parse a JSON configuration document.
    pub fn from_json_str(s: &str) -> Result<Self> {
        serde_json::from_str(s).map_err(|e| EngineError::InvalidConfig(e.to_string()))
    }

    /// Validate and resolve into the form the engine runs with.
    ///
    /// # Errors
    ///
    /// [`EngineError::InvalidTimezone`] for an unknown timezone name and
    /// [`EngineError::InvalidConfig`] for a zero occurrence cap.
    pub fn resolve(&self) -> Result<ResolvedConfig> {
        let timezone = match self.timezone.as_deref().map(str::trim) {
            None | Some("") => Tz::UTC,
            Some(name) => parse_timezone(name)?,
        };
        if self.max_occurrences_per_anchor == 0 {
            return Err(EngineError::InvalidConfig(
                "maxOccurrencesPerAnchor must be at least 1".to_string(),
            ));
        }
        Ok(ResolvedConfig {
            generate: GenerateOptions {
                timezone,
                max_occurrences: self.max_occurrences_per_anchor,
            },
            policy: SourcePolicy {
                include_completed_tasks: self.include_completed_tasks,
                include_archived_tasks: self.include_archived_tasks,
            },
        })
    }
}

/// A validated configuration.
#[derive(Debug, Clone, Default)]
pub struct ResolvedConfig {
    pub generate: GenerateOptions,
    pub policy: SourcePolicy,
}

impl ResolvedConfig {
    pub fn timezone(&self) -> &Tz {
        &self.generate.timezone
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let resolved = EngineConfig::default().resolve().unwrap();
        assert_eq!(*resolved.timezone(), Tz::UTC);
        assert_eq!(resolved.generate.max_occurrences, MAX_OCCURRENCES_PER_ANCHOR);
        assert_eq!(resolved.policy, SourcePolicy::default());
    }

    #[test]
    fn test_from_json_partial() {
        let raw = r#"{"timezone": "Europe/Berlin", "includeArchivedTasks": true}"#;
        let config = EngineConfig::from_json_str(raw).unwrap();
        assert_eq!(config.timezone.as_deref(), Some("Europe/Berlin"));
        assert!(config.include_archived_tasks);
        assert!(config.include_completed_tasks);

        let resolved = config.resolve().unwrap();
        assert_eq!(*resolved.timezone(), Tz::Europe__Berlin);
        assert!(resolved.policy.include_archived_tasks);
    }

    #[test]
    fn test_blank_timezone_is_utc() {
        let config = EngineConfig {
            timezone: Some("  ".to_string()),
            ..Default::default()
        };
        assert_eq!(*config.resolve().unwrap().timezone(), Tz::UTC);
    }

    #[test]
    fn test_invalid_values() {
        let bad_tz = EngineConfig {
            timezone: Some("Nowhere/Special".to_string()),
            ..Default::default()
        };
        assert!(matches!(bad_tz.resolve(), Err(EngineError::InvalidTimezone(_))));

        let zero_cap = EngineConfig {
            max_occurrences_per_anchor: 0,
            ..Default::default()
        };
        assert!(matches!(zero_cap.resolve(), Err(EngineError::InvalidConfig(_))));

        assert!(matches!(
            EngineConfig::from_json_str("{not json"),
            Err(EngineError::InvalidConfig(_))
        ));
    }
}
