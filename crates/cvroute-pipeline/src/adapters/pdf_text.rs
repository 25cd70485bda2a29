//! PdfText adapter - extracts text from PDFs using `pdftotext` (poppler-utils).

use std::io::Write;

use async_trait::async_trait;
use tempfile::NamedTempFile;
use tokio::process::Command;
use tracing::debug;

use cvroute_core::defaults::EXTRACTION_CMD_TIMEOUT_SECS;
use cvroute_core::{DocumentKind, Error, Result, TextSource};

/// Adapter for extracting text from PDF files using `pdftotext`.
///
/// Each invocation is guarded by a per-command timeout. Scanned PDFs
/// without a text layer yield blank text, which the reader rejects.
pub struct PdfTextAdapter;

/// Run a command with a timeout, returning stdout as a string.
async fn run_cmd_with_timeout(cmd: &mut Command, timeout_secs: u64) -> Result<String> {
    let output = tokio::time::timeout(std::time::Duration::from_secs(timeout_secs), cmd.output())
        .await
        .map_err(|_| {
            Error::DocumentRead(format!(
                "External command timed out after {}s",
                timeout_secs
            ))
        })?
        .map_err(|e| Error::DocumentRead(format!("Failed to execute command: {}", e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(Error::DocumentRead(format!(
            "Command failed (exit {}): {}",
            output.status,
            stderr.trim()
        )));
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Whether the data starts with the `%PDF` magic bytes.
pub fn has_pdf_magic(data: &[u8]) -> bool {
    data.len() >= 4 && &data[0..4] == b"%PDF"
}

#[async_trait]
impl TextSource for PdfTextAdapter {
    fn kind(&self) -> DocumentKind {
        DocumentKind::Pdf
    }

    async fn read_text(&self, data: &[u8], filename: &str) -> Result<String> {
        if data.is_empty() {
            return Err(Error::DocumentRead(
                "Cannot extract text from empty PDF data".to_string(),
            ));
        }

        if !has_pdf_magic(data) {
            return Err(Error::DocumentRead(format!(
                "File '{}' is not a valid PDF (missing %PDF header)",
                filename
            )));
        }

        // pdftotext reads from a file path
        let mut tmpfile = NamedTempFile::new()
            .map_err(|e| Error::DocumentRead(format!("Failed to create temp file: {}", e)))?;
        tmpfile
            .write_all(data)
            .map_err(|e| Error::DocumentRead(format!("Failed to write temp file: {}", e)))?;
        let tmp_path = tmpfile.path().to_string_lossy().to_string();

        let text = run_cmd_with_timeout(
            Command::new("pdftotext")
                .arg("-enc")
                .arg("UTF-8")
                .arg(&tmp_path)
                .arg("-"),
            EXTRACTION_CMD_TIMEOUT_SECS,
        )
        .await?;

        debug!(
            filename,
            char_count = text.len(),
            line_count = text.lines().count(),
            "PDF text extracted"
        );
        Ok(text)
    }

    async fn health_check(&self) -> Result<bool> {
        match Command::new("pdftotext").arg("-v").output().await {
            // pdftotext -v exits with 0 or 99 depending on the version.
            Ok(output) => Ok(output.status.success() || output.status.code() == Some(99)),
            Err(_) => Ok(false),
        }
    }

    fn name(&self) -> &str {
        "pdf_text"
    }
}
