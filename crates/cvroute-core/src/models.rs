//! Data model: field schema, candidate records, derived attributes and the
//! wire form exchanged by the `/extract` and `/export` endpoints.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value as JsonValue;

use crate::defaults::{FAILURE_SENTINEL, MULTI_VALUE_SEPARATOR};
use crate::language::{Language, LanguageSignal};
use crate::{Error, Result};

/// Field keys of the standard schema.
pub mod fields {
    pub const NAME: &str = "name";
    pub const CONTACT_NUMBER: &str = "contact_number";
    pub const EMAIL: &str = "email";
    pub const ADDRESS: &str = "address";
    pub const CITY: &str = "city";
    pub const PROVINCE: &str = "province";
    pub const QUALIFICATION: &str = "qualification";
    pub const INSTITUTION: &str = "institution";
    pub const GRADUATION_YEAR: &str = "graduation_year";
    pub const CURRENT_EMPLOYER: &str = "current_employer";
    pub const FIRST_LANGUAGE: &str = "first_language";
    pub const SECOND_LANGUAGE: &str = "second_language";
    pub const RACE: &str = "race";

    /// Location fields used to derive the province, narrowest first.
    pub const LOCALITY_PREFERENCE: [&str; 2] = [CITY, ADDRESS];
}

/// Headers of the columns appended when language reconciliation runs.
pub const DERIVED_HEADERS: [&str; 3] = [
    "Province Language",
    "Predicted Native Language",
    "Language Assessment",
];

// =============================================================================
// FIELD SCHEMA
// =============================================================================

/// One extractable field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    /// Machine key used in prompts and lookups.
    pub key: String,
    /// Column header written to sheets.
    pub header: String,
    /// Short description included in the extraction prompt.
    pub description: String,
    /// Whether the backend may return several values (flattened on ingest).
    pub multi_value: bool,
}

impl FieldSpec {
    pub fn new(key: &str, header: &str, description: &str) -> Self {
        Self {
            key: key.to_string(),
            header: header.to_string(),
            description: description.to_string(),
            multi_value: false,
        }
    }

    pub fn multi(mut self) -> Self {
        self.multi_value = true;
        self
    }
}

/// Ordered, fixed set of fields every record exposes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSchema {
    fields: Vec<FieldSpec>,
}

impl FieldSchema {
    pub fn new(fields: Vec<FieldSpec>) -> Self {
        Self { fields }
    }

    /// The standard résumé schema.
    pub fn standard() -> Self {
        use fields::*;
        Self::new(vec![
            FieldSpec::new(NAME, "Name", "full name of the candidate"),
            FieldSpec::new(CONTACT_NUMBER, "Contact Number", "primary phone number"),
            FieldSpec::new(EMAIL, "Email", "primary email address"),
            FieldSpec::new(ADDRESS, "Address", "residential or postal address"),
            FieldSpec::new(CITY, "City", "city or town of residence"),
            FieldSpec::new(PROVINCE, "Province", "province or region of residence"),
            FieldSpec::new(
                QUALIFICATION,
                "Qualification",
                "degrees, diplomas or certificates obtained or in progress",
            )
            .multi(),
            FieldSpec::new(INSTITUTION, "Institution", "institution of the highest qualification"),
            FieldSpec::new(
                GRADUATION_YEAR,
                "Graduation Year",
                "year the highest qualification was or will be completed",
            ),
            FieldSpec::new(CURRENT_EMPLOYER, "Current Employer", "current or most recent employer"),
            FieldSpec::new(FIRST_LANGUAGE, "First Language", "first language, if stated"),
            FieldSpec::new(SECOND_LANGUAGE, "Second Language", "second language, if stated"),
        ])
    }

    /// The standard schema followed by the race field.
    pub fn with_race() -> Self {
        let mut schema = Self::standard();
        schema.fields.push(FieldSpec::new(
            fields::RACE,
            "Race",
            "race or population group, only if explicitly stated",
        ));
        schema
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn keys(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.key.as_str()).collect()
    }

    pub fn headers(&self) -> Vec<String> {
        self.fields.iter().map(|f| f.header.clone()).collect()
    }

    /// Position of a field by exact key.
    pub fn position(&self, key: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.key == key)
    }

    /// Position of a field by key or header, ignoring case and separators.
    pub fn find(&self, name: &str) -> Option<usize> {
        let wanted = fold_name(name);
        self.fields
            .iter()
            .position(|f| fold_name(&f.key) == wanted || fold_name(&f.header) == wanted)
    }
}

fn fold_name(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(|c| c.to_lowercase())
        .collect()
}

// =============================================================================
// CANDIDATE RECORD
// =============================================================================

/// A schema-ordered record. Every schema field is present; missing data is `None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateRecord {
    schema: Arc<FieldSchema>,
    values: Vec<Option<String>>,
}

impl CandidateRecord {
    /// A record with every field null.
    pub fn empty(schema: Arc<FieldSchema>) -> Self {
        let values = vec![None; schema.len()];
        Self { schema, values }
    }

    /// Build from positional values; the count must match the schema.
    pub fn from_values(schema: Arc<FieldSchema>, values: Vec<Option<String>>) -> Result<Self> {
        if values.len() != schema.len() {
            return Err(Error::InvalidInput(format!(
                "expected {} values, got {}",
                schema.len(),
                values.len()
            )));
        }
        Ok(Self { schema, values })
    }

    pub fn schema(&self) -> &Arc<FieldSchema> {
        &self.schema
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.schema
            .position(key)
            .and_then(|i| self.values[i].as_deref())
    }

    /// Set a field, returning the updated record. Unknown keys are ignored.
    pub fn with(mut self, key: &str, value: Option<String>) -> Self {
        if let Some(i) = self.schema.position(key) {
            self.values[i] = value;
        }
        self
    }

    pub fn values(&self) -> &[Option<String>] {
        &self.values
    }

    pub fn into_values(self) -> Vec<Option<String>> {
        self.values
    }

    /// Iterate `(field, value)` pairs in schema order.
    pub fn iter(&self) -> impl Iterator<Item = (&FieldSpec, Option<&str>)> {
        self.schema
            .fields()
            .iter()
            .zip(self.values.iter().map(|v| v.as_deref()))
    }
}

/// Normalise one backend value into a cell.
///
/// Null, blank and placeholder strings become `None`; arrays are flattened
/// into a comma-joined string of their non-null elements.
pub fn cell_text(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::Null => None,
        JsonValue::String(s) => {
            let trimmed = s.trim();
            if is_placeholder(trimmed) {
                None
            } else {
                Some(trimmed.to_string())
            }
        }
        JsonValue::Number(n) => Some(n.to_string()),
        JsonValue::Bool(b) => Some(b.to_string()),
        JsonValue::Array(items) => {
            let parts: Vec<String> = items.iter().filter_map(cell_text).collect();
            if parts.is_empty() {
                None
            } else {
                Some(parts.join(MULTI_VALUE_SEPARATOR))
            }
        }
        JsonValue::Object(_) => Some(value.to_string()),
    }
}

/// Whether a string is an empty value in disguise.
pub fn is_placeholder(text: &str) -> bool {
    let t = text.trim();
    t.is_empty()
        || ["null", "none", "n/a", "na", "unknown", "not provided", "not specified"]
            .iter()
            .any(|p| t.eq_ignore_ascii_case(p))
}

// =============================================================================
// DERIVED ATTRIBUTES
// =============================================================================

/// How the final native-language value was reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Assessment {
    /// Both signals present and equal.
    Aligned(Language),
    /// Signals disagreed; a tie-break call produced `result`.
    Arbitrated {
        name: Language,
        province: Language,
        result: LanguageSignal,
    },
    /// Only the name signal was usable.
    NameOnly(Language),
    /// Only the province signal was usable.
    ProvinceOnly(Language),
    /// Neither signal was usable.
    Insufficient,
}

impl fmt::Display for Assessment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Assessment::Aligned(l) => {
                write!(f, "Aligned: name and province both indicate {}", l)
            }
            Assessment::Arbitrated {
                name,
                province,
                result,
            } => write!(
                f,
                "Discrepancy: name suggests {}, province suggests {}; arbitration chose {}",
                name,
                province,
                result
                    .present()
                    .map(|l| l.name())
                    .unwrap_or(FAILURE_SENTINEL)
            ),
            Assessment::NameOnly(l) => write!(f, "Name-based estimate only: {}", l),
            Assessment::ProvinceOnly(l) => write!(f, "Province-based estimate only: {}", l),
            Assessment::Insufficient => {
                write!(f, "Insufficient input: no usable name or province signal")
            }
        }
    }
}

/// Fields computed by the reconciler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivedAttributes {
    /// Province after derivation (may be the failure sentinel).
    pub province: Option<String>,
    /// Name-based estimate (reported through the assessment only).
    pub name_language: LanguageSignal,
    /// Dominant language of the province.
    pub province_language: LanguageSignal,
    /// Final predicted native language.
    pub native_language: LanguageSignal,
    pub assessment: Assessment,
}

impl DerivedAttributes {
    /// Cells for [`DERIVED_HEADERS`], in order.
    pub fn cells(&self) -> Vec<Option<String>> {
        vec![
            self.province_language.cell(),
            self.native_language.cell(),
            Some(self.assessment.to_string()),
        ]
    }
}

// =============================================================================
// ROUTING / EXPORT
// =============================================================================

/// One external sheet and the routing key it serves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SheetTarget {
    pub key: String,
    pub sheet_id: String,
}

/// Outcome of a registry get-or-create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetResolution {
    pub target: SheetTarget,
    /// True when the sheet was provisioned by this call.
    pub created: bool,
}

/// Wire form of one processed record (`/extract` output, `/export` input).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedEntry {
    #[serde(default)]
    pub headers: Vec<String>,
    #[serde(deserialize_with = "deserialize_cells")]
    pub row: Vec<Option<String>>,
    pub label: String,
}

/// Accept any JSON scalar per cell so hand-edited payloads still export.
fn deserialize_cells<'de, D>(deserializer: D) -> std::result::Result<Vec<Option<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Vec<JsonValue> = Vec::deserialize(deserializer)?;
    Ok(raw
        .iter()
        .map(|v| match v {
            JsonValue::Null => None,
            JsonValue::String(s) => Some(s.clone()),
            other => cell_text(other),
        })
        .collect())
}
