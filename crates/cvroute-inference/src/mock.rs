//! Mock generation backend for deterministic testing.
//!
//! Replies are scripted by substring: the first rule whose needle occurs in
//! the system prompt or the user prompt answers the call. Every call is
//! logged so tests can assert how many sub-calls a pipeline step made.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use cvroute_inference::mock::MockGenerationBackend;
//!
//! let backend = MockGenerationBackend::new()
//!     .with_response_containing("Thabo Nkosi", "isiZulu")
//!     .with_failure_containing("arbitrate");
//! ```

use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use cvroute_core::{Error, GenerationBackend, Result};

#[derive(Debug, Clone)]
enum MockReply {
    Text(String),
    Fail(String),
}

#[derive(Debug, Clone)]
struct MockRule {
    needle: String,
    reply: MockReply,
}

#[derive(Debug, Clone)]
struct MockConfig {
    model: String,
    rules: Vec<MockRule>,
    default_reply: MockReply,
    healthy: bool,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            model: "mock-model".to_string(),
            rules: Vec::new(),
            default_reply: MockReply::Text("Mock response".to_string()),
            healthy: true,
        }
    }
}

/// A logged generation call.
#[derive(Debug, Clone)]
pub struct MockCall {
    pub operation: String,
    pub system: String,
    pub prompt: String,
}

impl MockCall {
    /// Whether the needle occurs in the system or user prompt.
    pub fn mentions(&self, needle: &str) -> bool {
        self.system.contains(needle) || self.prompt.contains(needle)
    }
}

/// Mock generation backend for testing.
#[derive(Clone, Default)]
pub struct MockGenerationBackend {
    config: Arc<MockConfig>,
    call_log: Arc<Mutex<Vec<MockCall>>>,
}

impl MockGenerationBackend {
    /// Create a new mock backend with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the reply used when no rule matches.
    pub fn with_fixed_response(mut self, response: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.config).default_reply = MockReply::Text(response.into());
        self
    }

    /// Fail every call that no rule matches.
    pub fn failing_by_default(mut self) -> Self {
        Arc::make_mut(&mut self.config).default_reply =
            MockReply::Fail("simulated backend failure".to_string());
        self
    }

    /// Answer calls mentioning `needle` with `response`.
    pub fn with_response_containing(
        mut self,
        needle: impl Into<String>,
        response: impl Into<String>,
    ) -> Self {
        Arc::make_mut(&mut self.config).rules.push(MockRule {
            needle: needle.into(),
            reply: MockReply::Text(response.into()),
        });
        self
    }

    /// Fail calls mentioning `needle`.
    pub fn with_failure_containing(mut self, needle: impl Into<String>) -> Self {
        let needle = needle.into();
        Arc::make_mut(&mut self.config).rules.push(MockRule {
            reply: MockReply::Fail(format!("simulated failure for '{}'", needle)),
            needle,
        });
        self
    }

    /// Report the backend as unreachable from `health_check`.
    pub fn unhealthy(mut self) -> Self {
        Arc::make_mut(&mut self.config).healthy = false;
        self
    }

    fn log(&self) -> MutexGuard<'_, Vec<MockCall>> {
        self.call_log.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Get all logged calls for assertion.
    pub fn get_calls(&self) -> Vec<MockCall> {
        self.log().clone()
    }

    /// Clear the call log.
    pub fn clear_calls(&self) {
        self.log().clear()
    }

    /// Total number of generation calls.
    pub fn call_count(&self) -> usize {
        self.log().len()
    }

    /// Number of calls whose prompts mention `needle`.
    pub fn calls_mentioning(&self, needle: &str) -> usize {
        self.log()
            .iter()
            .filter(|c| c.mentions(needle))
            .count()
    }

    fn respond(&self, operation: &str, system: &str, prompt: &str) -> Result<String> {
        let call = MockCall {
            operation: operation.to_string(),
            system: system.to_string(),
            prompt: prompt.to_string(),
        };
        let reply = self
            .config
            .rules
            .iter()
            .find(|r| call.mentions(&r.needle))
            .map(|r| r.reply.clone())
            .unwrap_or_else(|| self.config.default_reply.clone());
        self.log().push(call);

        match reply {
            MockReply::Text(text) => Ok(text),
            MockReply::Fail(msg) => Err(Error::Inference(msg)),
        }
    }
}

#[async_trait]
impl GenerationBackend for MockGenerationBackend {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.respond("generate", "", prompt)
    }

    async fn generate_with_system(&self, system: &str, prompt: &str) -> Result<String> {
        self.respond("generate", system, prompt)
    }

    async fn generate_json(&self, system: &str, prompt: &str) -> Result<String> {
        self.respond("generate_json", system, prompt)
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(self.config.healthy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_default_response() {
        let backend = MockGenerationBackend::new().with_fixed_response("hello");
        assert_eq!(backend.generate("anything").await.unwrap(), "hello");
        assert_eq!(backend.call_count(), 1);
    }

    #[tokio::test]
    async fn test_first_matching_rule_wins() {
        let backend = MockGenerationBackend::new()
            .with_response_containing("Durban", "KwaZulu-Natal")
            .with_response_containing("city", "Gauteng");
        let answer = backend
            .generate_with_system("Name the province of this city.", "Durban")
            .await
            .unwrap();
        assert_eq!(answer, "KwaZulu-Natal");
    }

    #[tokio::test]
    async fn test_rule_matches_system_prompt() {
        let backend = MockGenerationBackend::new().with_response_containing("extract", "{}");
        let answer = backend
            .generate_json("You extract fields.", "text")
            .await
            .unwrap();
        assert_eq!(answer, "{}");
        assert_eq!(backend.get_calls()[0].operation, "generate_json");
    }

    #[tokio::test]
    async fn test_failure_injection() {
        let backend = MockGenerationBackend::new().with_failure_containing("boom");
        assert!(backend.generate("boom").await.is_err());
        assert!(backend.generate("fine").await.is_ok());
        assert_eq!(backend.calls_mentioning("boom"), 1);
    }

    #[tokio::test]
    async fn test_failing_by_default() {
        let backend = MockGenerationBackend::new()
            .failing_by_default()
            .with_response_containing("ok", "yes");
        assert!(backend.generate("nothing").await.is_err());
        assert_eq!(backend.generate("ok").await.unwrap(), "yes");
    }

    #[tokio::test]
    async fn test_clones_share_call_log() {
        let backend = MockGenerationBackend::new();
        let shared: Arc<dyn GenerationBackend> = Arc::new(backend.clone());
        shared.generate("one").await.unwrap();
        assert_eq!(backend.call_count(), 1);
        backend.clear_calls();
        assert_eq!(backend.call_count(), 0);
    }

    #[tokio::test]
    async fn test_health_toggle() {
        assert!(MockGenerationBackend::new().health_check().await.unwrap());
        assert!(!MockGenerationBackend::new().unhealthy().health_check().await.unwrap());
    }
}
