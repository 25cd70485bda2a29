//! # cvroute-inference
//!
//! LLM inference backend abstraction for cvroute.
//!
//! This crate provides:
//! - OpenAI-compatible chat-completions backend (feature `openai`)
//! - Ollama `/api/chat` backend (feature `ollama`)
//! - Provider selection from environment variables
//! - Lenient parsing of model-produced JSON
//! - A scripted mock backend (feature `mock`)
//!
//! # Example
//!
//! ```rust,no_run
//! use cvroute_inference::backend_from_env;
//!
//! #[tokio::main]
//! async fn main() {
//!     let backend = backend_from_env().unwrap();
//!     let answer = backend.generate("Which province is Durban in?").await.unwrap();
//! }
//! ```

pub mod json;
pub mod provider;

#[cfg(feature = "ollama")]
pub mod ollama;

#[cfg(feature = "openai")]
pub mod openai;

// Mock inference backend for testing
#[cfg(any(test, feature = "mock"))]
pub mod mock;

// Re-export core types
pub use cvroute_core::{Error, GenerationBackend, Result};

pub use json::{parse_json_value, strip_code_fences};
pub use provider::{backend_from_env, InferenceProvider};

#[cfg(feature = "ollama")]
pub use ollama::{OllamaBackend, OllamaConfig};

#[cfg(feature = "openai")]
pub use openai::{OpenAIBackend, OpenAIConfig};

#[cfg(any(test, feature = "mock"))]
pub use mock::{MockCall, MockGenerationBackend};
