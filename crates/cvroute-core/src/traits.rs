//! Core traits for cvroute abstractions.
//!
//! These traits define the seams to external collaborators (inference
//! backend, document text extraction, spreadsheet storage) and the sheet
//! registry, allowing different implementations and in-process mocks.

use async_trait::async_trait;

use crate::defaults::SHEET_URL_PREFIX;
use crate::{Result, SheetResolution, SheetTarget};

// =============================================================================
// INFERENCE TRAITS
// =============================================================================

/// Backend for text generation (LLM).
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Generate text given a prompt.
    async fn generate(&self, prompt: &str) -> Result<String>;

    /// Generate text with system context.
    async fn generate_with_system(&self, system: &str, prompt: &str) -> Result<String>;

    /// Generate with JSON output enforcement where the backend supports it.
    async fn generate_json(&self, system: &str, prompt: &str) -> Result<String> {
        self.generate_with_system(system, prompt).await
    }

    /// Get the model name being used.
    fn model_name(&self) -> &str;

    /// Check if the backend is available and responding.
    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }
}

// =============================================================================
// DOCUMENT TEXT TRAITS
// =============================================================================

/// Kind of document a text source handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    PlainText,
    Pdf,
}

/// Turns uploaded bytes into plain text.
#[async_trait]
pub trait TextSource: Send + Sync {
    /// The document kind this source handles.
    fn kind(&self) -> DocumentKind;

    /// Extract plain text from raw file data.
    async fn read_text(&self, data: &[u8], filename: &str) -> Result<String>;

    /// Check if the source's external dependencies are available.
    async fn health_check(&self) -> Result<bool>;

    /// Human-readable name of this source.
    fn name(&self) -> &str;
}

// =============================================================================
// SHEET TRAITS
// =============================================================================

/// Remote tabular store.
#[async_trait]
pub trait SheetBackend: Send + Sync {
    /// Create a sheet whose first row is `header`; returns its identifier.
    async fn create_sheet(&self, title: &str, header: &[String]) -> Result<String>;

    /// Append rows in order as one batched write; returns rows written.
    async fn append_rows(&self, sheet_id: &str, rows: &[Vec<String>]) -> Result<usize>;

    /// Grant anyone-with-the-link read/write access.
    async fn share_publicly(&self, sheet_id: &str) -> Result<()>;

    /// Check that the store is reachable and accepts our credentials.
    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    /// Public URL for a sheet identifier.
    fn sheet_url(&self, sheet_id: &str) -> String {
        format!("{}{}", SHEET_URL_PREFIX, sheet_id)
    }
}

/// Creates the external sheet for a routing key on a registry miss.
#[async_trait]
pub trait SheetProvisioner: Send + Sync {
    async fn provision(&self, key: &str) -> Result<String>;
}

/// Persistent routing key → sheet identifier mapping.
#[async_trait]
pub trait SheetRegistry: Send + Sync {
    /// Look up a key without creating anything.
    async fn lookup(&self, key: &str) -> Result<Option<SheetTarget>>;

    /// Atomically resolve a key, provisioning and persisting on a miss.
    ///
    /// Concurrent callers for the same key observe a single provisioning.
    async fn get_or_create(
        &self,
        key: &str,
        provisioner: &dyn SheetProvisioner,
    ) -> Result<SheetResolution>;

    /// Insert a pre-provisioned mapping unless the key is already mapped.
    /// Returns true when inserted.
    async fn seed(&self, key: &str, sheet_id: &str) -> Result<bool>;

    /// All known mappings.
    async fn list(&self) -> Result<Vec<SheetTarget>>;
}
