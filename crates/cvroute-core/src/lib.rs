//! # cvroute-core
//!
//! Core types, traits, and abstractions for cvroute.
//!
//! This crate provides the data model (field schema, candidate records,
//! language signals, routing labels), the configuration that selects a
//! pipeline variant, and the traits other cvroute crates implement.

pub mod config;
pub mod defaults;
pub mod error;
pub mod language;
pub mod models;
pub mod routing;
pub mod traits;

// Re-export commonly used types at crate root
pub use config::{ExportConfig, ExportStrategy, FieldSet, PipelineConfig, UnknownLabelPolicy};
pub use error::{Error, Result};
pub use language::{canonical_province, is_usable_province, Language, LanguageSignal};
pub use models::*;
pub use routing::RoutingLabel;
pub use traits::*;
