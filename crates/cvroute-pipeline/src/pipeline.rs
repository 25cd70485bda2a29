//! Batch orchestration: read → extract → reconcile → classify.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tracing::{info, instrument, warn};

use cvroute_core::fields;
use cvroute_core::{
    CandidateRecord, DerivedAttributes, DocumentKind, ExtractedEntry, GenerationBackend,
    PipelineConfig, Result, RoutingLabel,
};

use crate::classifier::classify;
use crate::extractor::FieldExtractor;
use crate::reader::DocumentReader;
use crate::reconciler::AttributeReconciler;

/// One uploaded document.
#[derive(Debug, Clone)]
pub struct Document {
    pub filename: String,
    pub content_type: Option<String>,
    pub data: Vec<u8>,
}

impl Document {
    pub fn new(filename: impl Into<String>, content_type: Option<String>, data: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            content_type,
            data,
        }
    }
}

/// A fully processed record ready for export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessedRecord {
    pub record: CandidateRecord,
    /// Present when language reconciliation ran.
    pub derived: Option<DerivedAttributes>,
    pub label: RoutingLabel,
}

impl ProcessedRecord {
    /// Cells in header order: schema fields, then derived columns.
    pub fn row(&self) -> Vec<Option<String>> {
        let mut row = self.record.values().to_vec();
        if let Some(derived) = &self.derived {
            row.extend(derived.cells());
        }
        row
    }

    pub fn into_entry(self, headers: Vec<String>) -> ExtractedEntry {
        ExtractedEntry {
            row: self.row(),
            headers,
            label: self.label.as_str().to_string(),
        }
    }
}

/// Readiness of the pipeline's external dependencies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PipelineHealth {
    pub model: String,
    pub backend: bool,
    pub sources: BTreeMap<DocumentKind, bool>,
}

impl PipelineHealth {
    /// The backend answers and at least one document kind can be read.
    pub fn is_ready(&self) -> bool {
        self.backend && self.sources.values().any(|ok| *ok)
    }
}

/// The configured extraction and reconciliation pipeline.
pub struct Pipeline {
    backend: Arc<dyn GenerationBackend>,
    reader: DocumentReader,
    extractor: FieldExtractor,
    reconciler: Option<AttributeReconciler>,
    headers: Vec<String>,
}

impl Pipeline {
    /// Build a pipeline over one generation backend.
    pub fn new(backend: Arc<dyn GenerationBackend>, config: &PipelineConfig) -> Self {
        let extractor = FieldExtractor::new(backend.clone(), Arc::new(config.schema()))
            .with_max_input_chars(config.max_input_chars);
        let reconciler = config
            .reconcile_language
            .then(|| AttributeReconciler::new(backend.clone()));
        Self {
            backend,
            reader: DocumentReader::with_defaults(),
            extractor,
            reconciler,
            headers: config.headers(),
        }
    }

    /// Header row shared by every emitted entry.
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// Check the generation backend and every registered text source.
    pub async fn health_check(&self) -> PipelineHealth {
        let backend = self.backend.health_check().await.unwrap_or_else(|e| {
            warn!(
                subsystem = "pipeline",
                model = self.backend.model_name(),
                error = %e,
                "Backend health check failed"
            );
            false
        });
        PipelineHealth {
            model: self.backend.model_name().to_string(),
            backend,
            sources: self.reader.health_check_all().await,
        }
    }

    /// Process already-extracted text.
    pub async fn process_text(&self, text: &str) -> Result<ProcessedRecord> {
        let record = self.extractor.extract(text).await?;
        let (record, derived) = match &self.reconciler {
            Some(reconciler) => {
                let reconciled = reconciler.reconcile(record).await;
                (reconciled.record, Some(reconciled.derived))
            }
            None => (record, None),
        };
        let label = classify(record.get(fields::QUALIFICATION));
        Ok(ProcessedRecord {
            record,
            derived,
            label,
        })
    }

    /// Read and process one uploaded document.
    #[instrument(skip(self, document), fields(subsystem = "pipeline", component = "pipeline", op = "process_document", document = %document.filename))]
    pub async fn process_document(&self, document: &Document) -> Result<ProcessedRecord> {
        let text = self
            .reader
            .read(
                &document.data,
                &document.filename,
                document.content_type.as_deref(),
            )
            .await?;
        self.process_text(&text).await
    }

    /// Process documents strictly one at a time, dropping failures.
    pub async fn process_batch(&self, documents: &[Document]) -> Vec<ExtractedEntry> {
        let start = Instant::now();
        let mut entries = Vec::with_capacity(documents.len());
        for document in documents {
            match self.process_document(document).await {
                Ok(processed) => entries.push(processed.into_entry(self.headers.clone())),
                Err(e) => {
                    warn!(document = %document.filename, error = %e, "Document skipped");
                }
            }
        }
        info!(
            subsystem = "pipeline",
            document_count = documents.len(),
            row_count = entries.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Batch processed"
        );
        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cvroute_core::{FieldSchema, FieldSet};
    use cvroute_inference::MockGenerationBackend;

    fn txt(name: &str, body: &str) -> Document {
        Document::new(name, Some("text/plain".to_string()), body.as_bytes().to_vec())
    }

    #[tokio::test]
    async fn test_rows_match_headers_with_reconciliation() {
        let mock = MockGenerationBackend::new()
            .with_response_containing("extract candidate details", r#"{"name": "Jane Smith"}"#)
            .with_response_containing("Full name:", "English");
        let pipeline = Pipeline::new(Arc::new(mock.clone()), &PipelineConfig::default());

        let entries = pipeline.process_batch(&[txt("jane.txt", "Jane Smith")]).await;

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].headers.len(), 15);
        assert_eq!(entries[0].row.len(), entries[0].headers.len());
        assert_eq!(entries[0].row[13].as_deref(), Some("English"));
        assert_eq!(entries[0].label, "general");
    }

    #[tokio::test]
    async fn test_reconciliation_disabled_skips_language_calls() {
        let mock = MockGenerationBackend::new().with_response_containing(
            "extract candidate details",
            r#"{"name": "Jane Smith", "race": "Not specified"}"#,
        );
        let config = PipelineConfig {
            field_set: FieldSet::WithRace,
            reconcile_language: false,
            ..Default::default()
        };
        let pipeline = Pipeline::new(Arc::new(mock.clone()), &config);

        let entries = pipeline.process_batch(&[txt("jane.txt", "Jane Smith")]).await;

        assert_eq!(entries[0].headers.len(), 13);
        assert_eq!(entries[0].row.len(), 13);
        assert_eq!(entries[0].row[12], None);
        assert_eq!(mock.call_count(), 1);
    }

    #[tokio::test]
    async fn test_failed_documents_are_dropped() {
        let mock = MockGenerationBackend::new()
            .with_failure_containing("BROKEN")
            .with_response_containing("extract candidate details", r#"{"name": "Ok Person"}"#)
            .with_fixed_response("Unknown");
        let pipeline = Pipeline::new(Arc::new(mock.clone()), &PipelineConfig::default());

        let documents = vec![
            txt("broken.txt", "BROKEN"),
            Document::new("cv.docx", None, b"PK\x03\x04".to_vec()),
            txt("empty.txt", ""),
            txt("ok.txt", "Ok Person"),
        ];
        let entries = pipeline.process_batch(&documents).await;

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].row[0].as_deref(), Some("Ok Person"));
    }

    #[tokio::test]
    async fn test_health_check_reports_backend_and_sources() {
        let backend = Arc::new(MockGenerationBackend::new());
        let pipeline = Pipeline::new(backend, &PipelineConfig::default());
        let health = pipeline.health_check().await;
        assert_eq!(health.model, "mock-model");
        assert!(health.backend);
        assert!(health.sources[&DocumentKind::PlainText]);
        assert!(health.sources.contains_key(&DocumentKind::Pdf));
        assert!(health.is_ready());
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_not_ready() {
        let mock = MockGenerationBackend::new().unhealthy();
        let pipeline = Pipeline::new(Arc::new(mock.clone()), &PipelineConfig::default());
        let health = pipeline.health_check().await;
        assert!(!health.backend);
        assert!(!health.is_ready());
        assert_eq!(mock.call_count(), 0);
    }

    #[test]
    fn test_processed_record_row_without_derived() {
        let schema = Arc::new(FieldSchema::standard());
        let processed = ProcessedRecord {
            record: CandidateRecord::empty(schema),
            derived: None,
            label: RoutingLabel::General,
        };
        let entry = processed.into_entry(vec!["Name".to_string()]);
        assert_eq!(entry.row.len(), 12);
        assert_eq!(entry.label, "general");
    }
}
