//! Lenient parsing of JSON produced by generation backends.
//!
//! Models wrap JSON in Markdown fences or put prose around it. These helpers
//! recover the JSON value; shaping it into a record is the caller's job.

use serde_json::Value as JsonValue;

use cvroute_core::{Error, Result};

/// Strip surrounding ```` ```json ```` / ```` ``` ```` fences.
pub fn strip_code_fences(raw: &str) -> &str {
    raw.trim()
        .trim_start_matches("```json")
        .trim_start_matches("```JSON")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim()
}

/// Parse a model response into a JSON value.
///
/// Tries the fenced-stripped text first, then the outermost `{...}` or
/// `[...]` span for answers with prose around the payload.
pub fn parse_json_value(raw: &str) -> Result<JsonValue> {
    let cleaned = strip_code_fences(raw);
    let direct_err = match serde_json::from_str::<JsonValue>(cleaned) {
        Ok(v) => return Ok(v),
        Err(e) => e,
    };
    for (open, close) in [('{', '}'), ('[', ']')] {
        if let (Some(start), Some(end)) = (cleaned.find(open), cleaned.rfind(close)) {
            if start < end {
                if let Ok(v) = serde_json::from_str::<JsonValue>(&cleaned[start..=end]) {
                    return Ok(v);
                }
            }
        }
    }
    Err(Error::Serialization(format!(
        "Model output is not valid JSON: {}",
        direct_err
    )))
}
