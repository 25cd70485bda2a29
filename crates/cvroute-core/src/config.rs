//! Pipeline and export configuration.
//!
//! The pipeline variants (single sheet vs. per-label sheets, with or without
//! language reconciliation, with or without the race field) are one pipeline
//! selected by these settings.

use std::str::FromStr;

use tracing::warn;

use crate::defaults;
use crate::models::FieldSchema;
use crate::Error;

/// Which fields are extracted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FieldSet {
    #[default]
    Standard,
    WithRace,
}

impl FieldSet {
    pub fn schema(&self) -> FieldSchema {
        match self {
            FieldSet::Standard => FieldSchema::standard(),
            FieldSet::WithRace => FieldSchema::with_race(),
        }
    }
}

/// How records are routed to sheets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportStrategy {
    /// One sheet per routing label.
    #[default]
    PerLabel,
    /// Every record goes to one sheet.
    SingleSheet,
}

impl FromStr for ExportStrategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "per_label" => Ok(ExportStrategy::PerLabel),
            "single_sheet" | "single" => Ok(ExportStrategy::SingleSheet),
            other => Err(Error::Config(format!("Unknown export strategy: '{}'", other))),
        }
    }
}

/// What to do with an export entry whose label is not recognised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnknownLabelPolicy {
    /// Fail the whole request with a validation error.
    Reject,
    /// Route the entry to the fallback label.
    #[default]
    Fallback,
    /// Omit the entry.
    Drop,
}

impl FromStr for UnknownLabelPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "reject" => Ok(UnknownLabelPolicy::Reject),
            "fallback" => Ok(UnknownLabelPolicy::Fallback),
            "drop" => Ok(UnknownLabelPolicy::Drop),
            other => Err(Error::Config(format!(
                "Unknown label policy: '{}'",
                other
            ))),
        }
    }
}

/// Settings for the extraction/reconciliation pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    pub field_set: FieldSet,
    pub reconcile_language: bool,
    pub max_input_chars: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            field_set: FieldSet::Standard,
            reconcile_language: true,
            max_input_chars: defaults::MAX_INPUT_CHARS,
        }
    }
}

impl PipelineConfig {
    /// Read from `EXTRACT_RACE_FIELD`, `RECONCILE_LANGUAGE`, `MAX_INPUT_CHARS`.
    pub fn from_env() -> Self {
        let field_set = if env_flag("EXTRACT_RACE_FIELD", false) {
            FieldSet::WithRace
        } else {
            FieldSet::Standard
        };
        Self {
            field_set,
            reconcile_language: env_flag("RECONCILE_LANGUAGE", true),
            max_input_chars: std::env::var("MAX_INPUT_CHARS")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|v: &usize| *v > 0)
                .unwrap_or(defaults::MAX_INPUT_CHARS),
        }
    }

    pub fn schema(&self) -> FieldSchema {
        self.field_set.schema()
    }

    /// Header row of every emitted record.
    pub fn headers(&self) -> Vec<String> {
        let mut headers = self.schema().headers();
        if self.reconcile_language {
            headers.extend(crate::models::DERIVED_HEADERS.iter().map(|h| h.to_string()));
        }
        headers
    }
}

/// Settings for the export coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportConfig {
    pub strategy: ExportStrategy,
    pub unknown_label_policy: UnknownLabelPolicy,
    pub title_prefix: String,
    pub share_public: bool,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            strategy: ExportStrategy::PerLabel,
            unknown_label_policy: UnknownLabelPolicy::Fallback,
            title_prefix: defaults::SHEET_TITLE_PREFIX.to_string(),
            share_public: false,
        }
    }
}

impl ExportConfig {
    /// Read from `EXPORT_STRATEGY`, `UNKNOWN_LABEL_POLICY`, `SHEET_TITLE_PREFIX`,
    /// `SHEETS_SHARE_PUBLIC`. Invalid values fall back to defaults with a warning.
    pub fn from_env() -> Self {
        Self {
            strategy: env_parse("EXPORT_STRATEGY", ExportStrategy::default()),
            unknown_label_policy: env_parse("UNKNOWN_LABEL_POLICY", UnknownLabelPolicy::default()),
            title_prefix: std::env::var("SHEET_TITLE_PREFIX")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| defaults::SHEET_TITLE_PREFIX.to_string()),
            share_public: env_flag("SHEETS_SHARE_PUBLIC", false),
        }
    }
}

/// Parse a boolean environment flag ("1"/"true"/"yes"/"on").
pub fn env_flag(key: &str, default: bool) -> bool {
    match std::env::var(key) {
        Ok(val) => matches!(
            val.trim().to_ascii_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        ),
        Err(_) => default,
    }
}

fn env_parse<T>(key: &str, default: T) -> T
where
    T: FromStr<Err = Error> + std::fmt::Debug,
{
    match std::env::var(key) {
        Ok(val) => val.parse().unwrap_or_else(|e: Error| {
            warn!(key, error = %e, fallback = ?default, "Invalid configuration value, using default");
            default
        }),
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_export_strategy_parse() {
        assert_eq!(
            "per_label".parse::<ExportStrategy>().unwrap(),
            ExportStrategy::PerLabel
        );
        assert_eq!(
            "Single-Sheet".parse::<ExportStrategy>().unwrap(),
            ExportStrategy::SingleSheet
        );
        assert!("round_robin".parse::<ExportStrategy>().is_err());
    }

    #[test]
    fn test_unknown_label_policy_parse() {
        assert_eq!(
            "DROP".parse::<UnknownLabelPolicy>().unwrap(),
            UnknownLabelPolicy::Drop
        );
        assert!("ignore".parse::<UnknownLabelPolicy>().is_err());
    }

    #[test]
    fn test_headers_include_derived_columns() {
        let config = PipelineConfig::default();
        let headers = config.headers();
        assert_eq!(headers.len(), 15);
        assert_eq!(headers[0], "Name");
        assert_eq!(headers[14], "Language Assessment");
    }

    #[test]
    fn test_headers_without_reconciliation() {
        let config = PipelineConfig {
            reconcile_language: false,
            field_set: FieldSet::WithRace,
            ..Default::default()
        };
        let headers = config.headers();
        assert_eq!(headers.len(), 13);
        assert_eq!(headers.last().map(String::as_str), Some("Race"));
    }

    #[test]
    fn test_export_defaults() {
        let config = ExportConfig::default();
        assert_eq!(config.strategy, ExportStrategy::PerLabel);
        assert_eq!(config.unknown_label_policy, UnknownLabelPolicy::Fallback);
        assert!(!config.share_public);
    }
}
