//! OpenAI-compatible inference backend.
//!
//! This module provides a generation backend that works with any
//! OpenAI-compatible chat-completions endpoint, including:
//!
//! - OpenAI cloud API
//! - Azure OpenAI
//! - Ollama (in OpenAI compatibility mode)
//! - vLLM
//! - LM Studio
//!
//! # Example
//!
//! ```rust,no_run
//! use cvroute_inference::openai::{OpenAIBackend, OpenAIConfig};
//! use cvroute_core::GenerationBackend;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = OpenAIConfig {
//!         base_url: "http://localhost:11434/v1".to_string(),
//!         api_key: None,
//!         gen_model: "llama3.1:8b".to_string(),
//!         ..Default::default()
//!     };
//!     let backend = OpenAIBackend::new(config).unwrap();
//!
//!     let json = backend
//!         .generate_json("Return JSON.", "{\"ok\": true}")
//!         .await
//!         .unwrap();
//! }
//! ```

mod backend;
mod error;
mod types;

pub use backend::{OpenAIBackend, OpenAIConfig, DEFAULT_GEN_MODEL, DEFAULT_OPENAI_URL};
pub use error::{to_cvroute_error, OpenAIErrorCode};
pub use types::*;
