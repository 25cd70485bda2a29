//! In-memory sheet backend for deterministic testing.
//!
//! Sheets live in a shared map keyed by generated identifiers. Failures are
//! injected by sheet-title substring so tests can fail one routing key.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use cvroute_core::{Error, Result, SheetBackend};

/// A sheet held by the mock.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MockSheet {
    pub title: String,
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
    pub shared: bool,
}

#[derive(Debug, Clone, Default)]
struct MockConfig {
    fail_create: Vec<String>,
    fail_append: Vec<String>,
    fail_share: bool,
    unhealthy: bool,
}

#[derive(Debug, Default)]
struct MockState {
    sheets: BTreeMap<String, MockSheet>,
    next_id: usize,
    creates: usize,
    appends: usize,
}

/// Mock sheet backend for testing.
#[derive(Clone, Default)]
pub struct MockSheetBackend {
    config: Arc<MockConfig>,
    state: Arc<Mutex<MockState>>,
}

impl MockSheetBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail `create_sheet` when the title contains `needle`.
    pub fn with_create_failure(mut self, needle: &str) -> Self {
        Arc::make_mut(&mut self.config)
            .fail_create
            .push(needle.to_string());
        self
    }

    /// Fail `append_rows` when the target sheet's title contains `needle`.
    pub fn with_append_failure(mut self, needle: &str) -> Self {
        Arc::make_mut(&mut self.config)
            .fail_append
            .push(needle.to_string());
        self
    }

    /// Fail every `share_publicly` call.
    pub fn with_share_failure(mut self) -> Self {
        Arc::make_mut(&mut self.config).fail_share = true;
        self
    }

    /// Report credentials as rejected from `health_check`.
    pub fn unhealthy(mut self) -> Self {
        Arc::make_mut(&mut self.config).unhealthy = true;
        self
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Register a sheet as if it had been provisioned out of band.
    /// Does not count as a create call.
    pub fn preexisting_sheet(&self, title: &str) -> String {
        let mut state = self.state();
        state.next_id += 1;
        let id = format!("mock-sheet-{}", state.next_id);
        state.sheets.insert(
            id.clone(),
            MockSheet {
                title: title.to_string(),
                ..Default::default()
            },
        );
        id
    }

    pub fn create_count(&self) -> usize {
        self.state().creates
    }

    pub fn append_count(&self) -> usize {
        self.state().appends
    }

    pub fn sheet(&self, sheet_id: &str) -> Option<MockSheet> {
        self.state().sheets.get(sheet_id).cloned()
    }

    pub fn sheet_titled(&self, title: &str) -> Option<MockSheet> {
        self.state()
            .sheets
            .values()
            .find(|s| s.title == title)
            .cloned()
    }

    /// Data rows (header excluded) of a sheet; empty when unknown.
    pub fn rows(&self, sheet_id: &str) -> Vec<Vec<String>> {
        self.sheet(sheet_id).map(|s| s.rows).unwrap_or_default()
    }

    pub fn sheets(&self) -> BTreeMap<String, MockSheet> {
        self.state().sheets.clone()
    }
}

#[async_trait]
impl SheetBackend for MockSheetBackend {
    async fn create_sheet(&self, title: &str, header: &[String]) -> Result<String> {
        if self.config.fail_create.iter().any(|n| title.contains(n)) {
            return Err(Error::Export(format!("mock create failure for '{}'", title)));
        }
        let mut state = self.state();
        state.creates += 1;
        state.next_id += 1;
        let id = format!("mock-sheet-{}", state.next_id);
        state.sheets.insert(
            id.clone(),
            MockSheet {
                title: title.to_string(),
                header: header.to_vec(),
                ..Default::default()
            },
        );
        Ok(id)
    }

    async fn append_rows(&self, sheet_id: &str, rows: &[Vec<String>]) -> Result<usize> {
        let mut state = self.state();
        let fail_append = &self.config.fail_append;
        let sheet = state
            .sheets
            .get_mut(sheet_id)
            .ok_or_else(|| Error::Export(format!("unknown sheet '{}'", sheet_id)))?;
        if fail_append.iter().any(|n| sheet.title.contains(n)) {
            return Err(Error::Export(format!(
                "mock append failure for '{}'",
                sheet.title
            )));
        }
        sheet.rows.extend(rows.iter().cloned());
        state.appends += 1;
        Ok(rows.len())
    }

    async fn share_publicly(&self, sheet_id: &str) -> Result<()> {
        if self.config.fail_share {
            return Err(Error::Export("mock share failure".to_string()));
        }
        let mut state = self.state();
        match state.sheets.get_mut(sheet_id) {
            Some(sheet) => {
                sheet.shared = true;
                Ok(())
            }
            None => Err(Error::Export(format!("unknown sheet '{}'", sheet_id))),
        }
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(!self.config.unhealthy)
    }
}
