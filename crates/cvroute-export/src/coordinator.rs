//! Export coordinator: validate, group by routing key, resolve sheets and
//! append one batch per key.
//!
//! Keys are written independently. A failure for one key is reported in
//! [`ExportReport::failures`] and never rolls back another key's rows.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{error, info, instrument, warn};

use cvroute_core::defaults::SINGLE_SHEET_KEY;
use cvroute_core::{
    Error, ExportConfig, ExportStrategy, ExtractedEntry, Result, RoutingLabel, SheetBackend,
    SheetProvisioner, SheetRegistry, UnknownLabelPolicy,
};

/// Outcome of one export request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExportReport {
    /// Routing key → sheet URL for every key written successfully.
    pub sheets: BTreeMap<String, String>,
    /// Routing key → error message for every key that failed.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub failures: BTreeMap<String, String>,
}

/// Creates the sheet for a key: title, header row and optional sharing.
struct SheetCreator<'a> {
    backend: &'a dyn SheetBackend,
    title_prefix: &'a str,
    header: &'a [String],
    share_public: bool,
}

#[async_trait]
impl SheetProvisioner for SheetCreator<'_> {
    async fn provision(&self, key: &str) -> Result<String> {
        let title = format!("{} - {}", self.title_prefix, key);
        let sheet_id = self.backend.create_sheet(&title, self.header).await?;
        if self.share_public {
            if let Err(e) = self.backend.share_publicly(&sheet_id).await {
                warn!(key, sheet_id = %sheet_id, error = %e, "Failed to share sheet publicly");
            }
        }
        Ok(sheet_id)
    }
}

pub struct ExportCoordinator {
    backend: Arc<dyn SheetBackend>,
    registry: Arc<dyn SheetRegistry>,
    config: ExportConfig,
    headers: Vec<String>,
}

impl ExportCoordinator {
    /// `headers` is the header row every exported row must match.
    pub fn new(
        backend: Arc<dyn SheetBackend>,
        registry: Arc<dyn SheetRegistry>,
        config: ExportConfig,
        headers: Vec<String>,
    ) -> Self {
        Self {
            backend,
            registry,
            config,
            headers,
        }
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn config(&self) -> &ExportConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<dyn SheetRegistry> {
        &self.registry
    }

    /// Whether the sheet backend currently accepts our credentials.
    pub async fn health_check(&self) -> bool {
        self.backend.health_check().await.unwrap_or_else(|e| {
            warn!(subsystem = "export", error = %e, "Sheet backend health check failed");
            false
        })
    }

    /// Export a batch. Validation errors are returned before any external
    /// call; an `Export` error is returned only when no key succeeded.
    #[instrument(skip(self, entries), fields(subsystem = "export", component = "coordinator", op = "export", entry_count = entries.len()))]
    pub async fn export(&self, entries: &[ExtractedEntry]) -> Result<ExportReport> {
        let groups = self.group(entries)?;

        let mut report = ExportReport::default();
        for (key, rows) in groups {
            match self.write_group(&key, &rows).await {
                Ok(url) => {
                    info!(key = %key, row_count = rows.len(), "Exported rows");
                    report.sheets.insert(key, url);
                }
                Err(e) => {
                    error!(key = %key, row_count = rows.len(), error = %e, "Export failed for key");
                    report.failures.insert(key, e.to_string());
                }
            }
        }

        if report.sheets.is_empty() {
            let detail = report
                .failures
                .iter()
                .map(|(k, v)| format!("{}: {}", k, v))
                .collect::<Vec<_>>()
                .join("; ");
            return Err(Error::Export(format!("Export process failed: {}", detail)));
        }
        Ok(report)
    }

    /// Validate entries and partition them into (key, rows) groups in order
    /// of first appearance.
    fn group(&self, entries: &[ExtractedEntry]) -> Result<Vec<(String, Vec<Vec<String>>)>> {
        if entries.is_empty() {
            return Err(Error::InvalidInput("Invalid or empty data.".to_string()));
        }

        let mut groups: Vec<(String, Vec<Vec<String>>)> = Vec::new();
        for (index, entry) in entries.iter().enumerate() {
            if !entry.headers.is_empty() && entry.headers != self.headers {
                return Err(Error::InvalidInput(format!(
                    "Entry {} has headers that do not match the configured header row",
                    index
                )));
            }
            if entry.row.len() != self.headers.len() {
                return Err(Error::InvalidInput(format!(
                    "Entry {} has {} cells, expected {}",
                    index,
                    entry.row.len(),
                    self.headers.len()
                )));
            }

            let label = match self.resolve_label(index, &entry.label)? {
                Some(label) => label,
                None => continue,
            };
            let key = match self.config.strategy {
                ExportStrategy::PerLabel => label.as_str().to_string(),
                ExportStrategy::SingleSheet => SINGLE_SHEET_KEY.to_string(),
            };

            let row: Vec<String> = entry
                .row
                .iter()
                .map(|c| c.clone().unwrap_or_default())
                .collect();
            match groups.iter_mut().find(|(k, _)| *k == key) {
                Some((_, rows)) => rows.push(row),
                None => groups.push((key, vec![row])),
            }
        }

        if groups.is_empty() {
            return Err(Error::InvalidInput(
                "No entries left to export after dropping unknown labels".to_string(),
            ));
        }
        Ok(groups)
    }

    /// Apply the unknown-label policy; `None` means drop the entry.
    fn resolve_label(&self, index: usize, raw: &str) -> Result<Option<RoutingLabel>> {
        match raw.parse::<RoutingLabel>() {
            Ok(label) => Ok(Some(label)),
            Err(e) => match self.config.unknown_label_policy {
                UnknownLabelPolicy::Reject => Err(Error::InvalidInput(format!(
                    "Entry {}: unknown routing label '{}'",
                    index, raw
                ))),
                UnknownLabelPolicy::Fallback => {
                    warn!(index, label = %raw, fallback = %RoutingLabel::FALLBACK, "Unknown label, using fallback");
                    Ok(Some(RoutingLabel::FALLBACK))
                }
                UnknownLabelPolicy::Drop => {
                    warn!(index, label = %raw, error = %e, "Unknown label, dropping entry");
                    Ok(None)
                }
            },
        }
    }

    async fn write_group(&self, key: &str, rows: &[Vec<String>]) -> Result<String> {
        let creator = SheetCreator {
            backend: self.backend.as_ref(),
            title_prefix: &self.config.title_prefix,
            header: &self.headers,
            share_public: self.config.share_public,
        };
        let resolution = self.registry.get_or_create(key, &creator).await?;
        if resolution.created {
            info!(key, sheet_id = %resolution.target.sheet_id, "Provisioned new sheet");
        }

        self.backend
            .append_rows(&resolution.target.sheet_id, rows)
            .await?;
        Ok(self.backend.sheet_url(&resolution.target.sheet_id))
    }
}
