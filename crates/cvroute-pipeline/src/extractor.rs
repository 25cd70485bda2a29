//! Field extractor: one JSON-mode inference call per document.

use std::sync::Arc;
use std::time::Instant;

use serde_json::{Map, Value as JsonValue};
use tracing::{debug, instrument};

use cvroute_core::defaults::MAX_INPUT_CHARS;
use cvroute_core::{cell_text, CandidateRecord, Error, FieldSchema, GenerationBackend, Result};
use cvroute_inference::parse_json_value;

use crate::prompts;

/// Turns raw document text into a schema-ordered candidate record.
pub struct FieldExtractor {
    backend: Arc<dyn GenerationBackend>,
    schema: Arc<FieldSchema>,
    max_input_chars: usize,
}

impl FieldExtractor {
    pub fn new(backend: Arc<dyn GenerationBackend>, schema: Arc<FieldSchema>) -> Self {
        Self {
            backend,
            schema,
            max_input_chars: MAX_INPUT_CHARS,
        }
    }

    pub fn with_max_input_chars(mut self, max_input_chars: usize) -> Self {
        self.max_input_chars = max_input_chars.max(1);
        self
    }

    pub fn schema(&self) -> &Arc<FieldSchema> {
        &self.schema
    }

    /// Extract a record. Any backend or parse failure is an `Extraction` error.
    #[instrument(skip(self, text), fields(subsystem = "pipeline", component = "extractor", op = "extract", text_len = text.len()))]
    pub async fn extract(&self, text: &str) -> Result<CandidateRecord> {
        if text.trim().is_empty() {
            return Err(Error::Extraction("document text is empty".to_string()));
        }

        let start = Instant::now();
        let input = truncate_chars(text.trim(), self.max_input_chars);
        if input.len() < text.trim().len() {
            debug!(
                max_chars = self.max_input_chars,
                "Document text truncated before extraction"
            );
        }

        let prompt = prompts::extraction_prompt(&self.schema, input);
        let raw = self
            .backend
            .generate_json(prompts::EXTRACTION_SYSTEM, &prompt)
            .await
            .map_err(|e| Error::Extraction(format!("inference failed: {}", e)))?;

        let record = self.parse_record(&raw)?;
        debug!(
            response_len = raw.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            populated = record.values().iter().filter(|v| v.is_some()).count(),
            "Extraction complete"
        );
        Ok(record)
    }

    /// Parse a backend response into a record.
    ///
    /// Accepts an object keyed by field key or header, a positional array
    /// with exactly one value per field, or either of those wrapped under a
    /// single key.
    pub fn parse_record(&self, raw: &str) -> Result<CandidateRecord> {
        let value = parse_json_value(raw)
            .map_err(|e| Error::Extraction(format!("malformed model output: {}", e)))?;
        self.record_from_value(value, 0)
    }

    fn record_from_value(&self, value: JsonValue, depth: usize) -> Result<CandidateRecord> {
        match value {
            JsonValue::Array(items) if items.len() == self.schema.len() => {
                let values = items.iter().map(cell_text).collect();
                CandidateRecord::from_values(self.schema.clone(), values)
            }
            JsonValue::Array(mut items) if items.len() == 1 && depth == 0 => {
                self.record_from_value(items.remove(0), depth + 1)
            }
            JsonValue::Object(map) => {
                if let Some(record) = self.record_from_object(&map) {
                    return Ok(record);
                }
                if depth == 0 && map.len() == 1 {
                    if let Some(inner) = map.into_iter().next().map(|(_, v)| v) {
                        if inner.is_object() || inner.is_array() {
                            return self.record_from_value(inner, depth + 1);
                        }
                    }
                }
                Err(Error::Extraction(
                    "model output contains none of the expected fields".to_string(),
                ))
            }
            JsonValue::Array(items) => Err(Error::Extraction(format!(
                "model returned {} positional values, expected {}",
                items.len(),
                self.schema.len()
            ))),
            other => Err(Error::Extraction(format!(
                "model output is not an object: {}",
                other
            ))),
        }
    }

    /// `None` when no key names a schema field.
    fn record_from_object(&self, map: &Map<String, JsonValue>) -> Option<CandidateRecord> {
        let mut values: Vec<Option<String>> = vec![None; self.schema.len()];
        let mut matched = false;
        for (key, value) in map {
            if let Some(i) = self.schema.find(key) {
                matched = true;
                if values[i].is_none() {
                    values[i] = cell_text(value);
                }
            }
        }
        if !matched {
            return None;
        }
        CandidateRecord::from_values(self.schema.clone(), values).ok()
    }
}

/// Longest prefix of at most `max_chars` characters.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
