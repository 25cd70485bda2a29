//! # cvroute-export
//!
//! Sheet export for cvroute: the routing key → sheet registry (in-memory and
//! SQLite), the Google Sheets client, and the coordinator that groups a
//! batch by routing key and appends one batch per sheet.

pub mod coordinator;
pub mod registry;
pub mod sheets;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use coordinator::{ExportCoordinator, ExportReport};
pub use registry::{
    preprovisioned_from_env, registry_from_env, seed_registry, InMemorySheetRegistry,
    SqliteSheetRegistry,
};
pub use sheets::{
    GoogleSheetsBackend, ServiceAccountTokens, SheetsConfig, SheetsCredentials, StaticToken,
    TokenSource,
};

#[cfg(any(test, feature = "mock"))]
pub use mock::{MockSheet, MockSheetBackend};
