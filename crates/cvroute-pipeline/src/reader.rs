//! Document reader registry dispatching uploads to text sources.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use tracing::{debug, warn};

use cvroute_core::{DocumentKind, Error, Result, TextSource};

use crate::adapters::{PdfTextAdapter, TextNativeAdapter};

/// Registry mapping document kinds to their text sources.
pub struct DocumentReader {
    sources: HashMap<DocumentKind, Arc<dyn TextSource>>,
}

impl DocumentReader {
    /// Create an empty reader.
    pub fn new() -> Self {
        Self {
            sources: HashMap::new(),
        }
    }

    /// Reader with the plain-text and PDF sources registered.
    pub fn with_defaults() -> Self {
        let mut reader = Self::new();
        reader.register(Arc::new(TextNativeAdapter));
        reader.register(Arc::new(PdfTextAdapter));
        reader
    }

    /// Register a source. Replaces any existing source for the same kind.
    pub fn register(&mut self, source: Arc<dyn TextSource>) {
        self.sources.insert(source.kind(), source);
    }

    /// Determine the document kind from the MIME type, then the extension.
    pub fn detect_kind(filename: &str, mime_type: Option<&str>) -> Option<DocumentKind> {
        let mime = mime_type
            .map(|m| m.split(';').next().unwrap_or("").trim().to_lowercase())
            .unwrap_or_default();
        match mime.as_str() {
            "application/pdf" => return Some(DocumentKind::Pdf),
            "text/plain" | "text/markdown" => return Some(DocumentKind::PlainText),
            _ => {}
        }

        let ext = filename
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "pdf" => Some(DocumentKind::Pdf),
            "txt" | "text" | "md" => Some(DocumentKind::PlainText),
            _ => None,
        }
    }

    /// Turn an upload into non-blank plain text.
    pub async fn read(&self, data: &[u8], filename: &str, mime_type: Option<&str>) -> Result<String> {
        if data.is_empty() {
            return Err(Error::DocumentRead(format!("File '{}' is empty", filename)));
        }

        let kind = Self::detect_kind(filename, mime_type).ok_or_else(|| {
            Error::DocumentRead(format!(
                "Unsupported document type for '{}' ({})",
                filename,
                mime_type.unwrap_or("unknown MIME type")
            ))
        })?;

        let source = self.sources.get(&kind).ok_or_else(|| {
            Error::DocumentRead(format!("No text source registered for {:?}", kind))
        })?;

        debug!(filename, source = source.name(), "Reading document");
        let text = source.read_text(data, filename).await?;
        if text.trim().is_empty() {
            return Err(Error::DocumentRead(format!(
                "File '{}' has no extractable text",
                filename
            )));
        }
        Ok(text)
    }

    /// Run health checks on all registered sources.
    pub async fn health_check_all(&self) -> BTreeMap<DocumentKind, bool> {
        let mut results = BTreeMap::new();
        for (kind, source) in &self.sources {
            let healthy = source.health_check().await.unwrap_or_else(|e| {
                warn!(source = source.name(), error = %e, "Text source health check failed");
                false
            });
            results.insert(*kind, healthy);
        }
        results
    }
}

impl Default for DocumentReader {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_kind_prefers_mime() {
        assert_eq!(
            DocumentReader::detect_kind("cv.bin", Some("application/pdf")),
            Some(DocumentKind::Pdf)
        );
        assert_eq!(
            DocumentReader::detect_kind("cv", Some("text/plain; charset=utf-8")),
            Some(DocumentKind::PlainText)
        );
    }

    #[test]
    fn test_detect_kind_falls_back_to_extension() {
        assert_eq!(
            DocumentReader::detect_kind("CV.PDF", Some("application/octet-stream")),
            Some(DocumentKind::Pdf)
        );
        assert_eq!(
            DocumentReader::detect_kind("notes.md", None),
            Some(DocumentKind::PlainText)
        );
        assert_eq!(DocumentReader::detect_kind("cv.docx", None), None);
    }

    #[tokio::test]
    async fn test_health_covers_registered_sources() {
        assert!(DocumentReader::new().health_check_all().await.is_empty());
        let results = DocumentReader::with_defaults().health_check_all().await;
        assert_eq!(results.len(), 2);
        assert!(results[&DocumentKind::PlainText]);
    }

    #[tokio::test]
    async fn test_read_plain_text() {
        let reader = DocumentReader::with_defaults();
        let text = reader
            .read(b"Thabo Nkosi", "cv.txt", Some("text/plain"))
            .await
            .unwrap();
        assert_eq!(text, "Thabo Nkosi");
    }

    #[tokio::test]
    async fn test_read_rejects_empty_and_blank() {
        let reader = DocumentReader::with_defaults();
        let empty = reader.read(b"", "cv.txt", None).await.unwrap_err();
        assert!(matches!(empty, Error::DocumentRead(_)));

        let blank = reader.read(b"  \n\t", "cv.txt", None).await.unwrap_err();
        assert!(blank.to_string().contains("no extractable text"));
    }

    #[tokio::test]
    async fn test_read_rejects_unsupported_type() {
        let reader = DocumentReader::with_defaults();
        let err = reader
            .read(b"PK\x03\x04", "cv.docx", None)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Unsupported document type"));
    }

    #[tokio::test]
    async fn test_missing_source_is_document_error() {
        let reader = DocumentReader::new();
        let err = reader.read(b"hello", "cv.txt", None).await.unwrap_err();
        assert!(matches!(err, Error::DocumentRead(_)));
    }

    #[tokio::test]
    async fn test_health_check_all_reports_text_native() {
        let mut reader = DocumentReader::new();
        reader.register(Arc::new(TextNativeAdapter));
        let results = reader.health_check_all().await;
        assert!(results[&DocumentKind::PlainText]);
    }
}
