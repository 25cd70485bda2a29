//! Selection of the generation backend from configuration.

use std::str::FromStr;
use std::sync::Arc;

use tracing::info;

use cvroute_core::{Error, GenerationBackend, Result};

/// Supported generation providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InferenceProvider {
    /// Any OpenAI-compatible chat-completions endpoint.
    #[default]
    OpenAI,
    /// Native Ollama `/api/chat`.
    Ollama,
}

impl InferenceProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            InferenceProvider::OpenAI => "openai",
            InferenceProvider::Ollama => "ollama",
        }
    }
}

impl FromStr for InferenceProvider {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "openai" | "openai-compatible" => Ok(InferenceProvider::OpenAI),
            "ollama" => Ok(InferenceProvider::Ollama),
            other => Err(Error::Config(format!(
                "Unknown INFERENCE_PROVIDER '{}' (expected 'openai' or 'ollama')",
                other
            ))),
        }
    }
}

/// Build the configured generation backend from environment variables.
///
/// Returns a configuration error when the provider is unknown, not compiled
/// in, or missing credentials; callers turn that into an unavailable
/// capability instead of aborting startup.
pub fn backend_from_env() -> Result<Arc<dyn GenerationBackend>> {
    let provider = match std::env::var("INFERENCE_PROVIDER") {
        Ok(v) => v.parse::<InferenceProvider>()?,
        Err(_) => InferenceProvider::default(),
    };
    info!(provider = provider.as_str(), "Selecting inference provider");
    build_backend(provider)
}

fn build_backend(provider: InferenceProvider) -> Result<Arc<dyn GenerationBackend>> {
    match provider {
        #[cfg(feature = "openai")]
        InferenceProvider::OpenAI => Ok(Arc::new(crate::openai::OpenAIBackend::from_env()?)),
        #[cfg(feature = "ollama")]
        InferenceProvider::Ollama => Ok(Arc::new(crate::ollama::OllamaBackend::from_env()?)),
        #[allow(unreachable_patterns)]
        other => Err(Error::Config(format!(
            "Inference provider '{}' is not enabled in this build",
            other.as_str()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_provider() {
        assert_eq!(
            "OpenAI".parse::<InferenceProvider>().unwrap(),
            InferenceProvider::OpenAI
        );
        assert_eq!(
            " ollama ".parse::<InferenceProvider>().unwrap(),
            InferenceProvider::Ollama
        );
    }

    #[test]
    fn test_parse_unknown_provider_is_config_error() {
        let err = "bedrock".parse::<InferenceProvider>().unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(err.to_string().contains("bedrock"));
    }

    #[test]
    fn test_default_provider_is_openai() {
        assert_eq!(InferenceProvider::default(), InferenceProvider::OpenAI);
    }

    #[cfg(feature = "ollama")]
    #[test]
    fn test_build_ollama_backend() {
        let backend = build_backend(InferenceProvider::Ollama).unwrap();
        assert!(!backend.model_name().is_empty());
    }
}
