//! # cvroute-pipeline
//!
//! Turns uploaded résumés into export-ready records.
//!
//! - [`DocumentReader`] dispatches uploads to text sources (plain text, PDF)
//! - [`FieldExtractor`] makes one JSON-mode inference call per document
//! - [`AttributeReconciler`] derives province and native-language attributes
//! - [`classify`] assigns the routing label from the qualification
//! - [`Pipeline`] runs the steps over a batch, one document at a time

pub mod adapters;
pub mod classifier;
pub mod extractor;
pub mod pipeline;
pub mod prompts;
pub mod reader;
pub mod reconciler;

pub use adapters::{PdfTextAdapter, TextNativeAdapter};
pub use classifier::classify;
pub use extractor::FieldExtractor;
pub use pipeline::{Document, Pipeline, PipelineHealth, ProcessedRecord};
pub use reader::DocumentReader;
pub use reconciler::{AttributeReconciler, ReconciledRecord};
