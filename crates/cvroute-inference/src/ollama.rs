//! Native Ollama backend over `/api/chat`.
//!
//! JSON calls send `format: "json"` with `think: false`, so reasoning models
//! answer with the bare object in `message.content`.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use cvroute_core::defaults;
use cvroute_core::{Error, GenerationBackend, Result};

/// Health probes use a short timeout independent of generation.
const HEALTH_TIMEOUT: Duration = Duration::from_secs(5);

/// Connection settings for an Ollama server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OllamaConfig {
    pub base_url: String,
    pub gen_model: String,
    pub timeout_seconds: u64,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::OLLAMA_URL.to_string(),
            gen_model: defaults::OLLAMA_GEN_MODEL.to_string(),
            timeout_seconds: defaults::GEN_TIMEOUT_SECS,
        }
    }
}

impl OllamaConfig {
    pub fn new(base_url: impl Into<String>, gen_model: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            gen_model: gen_model.into(),
            ..Default::default()
        }
    }

    pub fn with_timeout(mut self, seconds: u64) -> Self {
        self.timeout_seconds = seconds;
        self
    }

    /// Read `OLLAMA_BASE`, `OLLAMA_GEN_MODEL` and `CVROUTE_GEN_TIMEOUT_SECS`.
    pub fn from_env() -> Self {
        let fallback = Self::default();
        Self {
            base_url: std::env::var("OLLAMA_BASE").unwrap_or(fallback.base_url),
            gen_model: std::env::var("OLLAMA_GEN_MODEL").unwrap_or(fallback.gen_model),
            timeout_seconds: std::env::var("CVROUTE_GEN_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(fallback.timeout_seconds),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "lowercase")]
enum Role {
    System,
    User,
}

#[derive(Debug, Serialize)]
struct OutgoingMessage<'a> {
    role: Role,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatBody<'a> {
    model: &'a str,
    messages: Vec<OutgoingMessage<'a>>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    think: Option<bool>,
}

impl<'a> ChatBody<'a> {
    fn new(model: &'a str, system: &'a str, prompt: &'a str, json: bool) -> Self {
        let mut messages = Vec::with_capacity(2);
        if !system.is_empty() {
            messages.push(OutgoingMessage {
                role: Role::System,
                content: system,
            });
        }
        messages.push(OutgoingMessage {
            role: Role::User,
            content: prompt,
        });
        Self {
            model,
            messages,
            stream: false,
            format: json.then_some("json"),
            think: json.then_some(false),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    message: ReplyMessage,
}

#[derive(Debug, Deserialize)]
struct ReplyMessage {
    #[serde(default)]
    content: String,
}

/// Ollama generation backend.
pub struct OllamaBackend {
    client: Client,
    config: OllamaConfig,
}

impl OllamaBackend {
    pub fn new(mut config: OllamaConfig) -> Result<Self> {
        config.base_url = config.base_url.trim_end_matches('/').to_string();
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| Error::Inference(format!("Failed to create HTTP client: {}", e)))?;

        info!(
            subsystem = "inference",
            component = "ollama",
            url = %config.base_url,
            model = %config.gen_model,
            "Initializing Ollama backend"
        );
        Ok(Self { client, config })
    }

    pub fn from_env() -> Result<Self> {
        Self::new(OllamaConfig::from_env())
    }

    pub fn config(&self) -> &OllamaConfig {
        &self.config
    }

    async fn chat(&self, system: &str, prompt: &str, json: bool) -> Result<String> {
        let start = Instant::now();
        let body = ChatBody::new(&self.config.gen_model, system, prompt, json);

        let response = self
            .client
            .post(format!("{}/api/chat", self.config.base_url))
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Inference(format!("Ollama request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(Error::Inference(format!(
                "Ollama returned {}: {}",
                status,
                detail.trim()
            )));
        }

        let reply: ChatReply = response
            .json()
            .await
            .map_err(|e| Error::Inference(format!("Unreadable Ollama reply: {}", e)))?;

        let elapsed_ms = start.elapsed().as_millis() as u64;
        debug!(
            json,
            response_len = reply.message.content.len(),
            duration_ms = elapsed_ms,
            "Ollama chat complete"
        );
        if elapsed_ms > defaults::SLOW_GENERATION_MS {
            warn!(
                duration_ms = elapsed_ms,
                prompt_len = prompt.len(),
                slow = true,
                "Slow generation operation"
            );
        }
        Ok(reply.message.content)
    }
}

#[async_trait]
impl GenerationBackend for OllamaBackend {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.generate_with_system("", prompt).await
    }

    #[instrument(skip(self, system, prompt), fields(subsystem = "inference", component = "ollama", op = "generate", model = %self.config.gen_model, prompt_len = prompt.len()))]
    async fn generate_with_system(&self, system: &str, prompt: &str) -> Result<String> {
        self.chat(system, prompt, false).await
    }

    #[instrument(skip(self, system, prompt), fields(subsystem = "inference", component = "ollama", op = "generate_json", model = %self.config.gen_model, prompt_len = prompt.len()))]
    async fn generate_json(&self, system: &str, prompt: &str) -> Result<String> {
        self.chat(system, prompt, true).await
    }

    fn model_name(&self) -> &str {
        &self.config.gen_model
    }

    async fn health_check(&self) -> Result<bool> {
        let probe = self
            .client
            .get(format!("{}/api/tags", self.config.base_url))
            .timeout(HEALTH_TIMEOUT)
            .send()
            .await;

        let healthy = match probe {
            Ok(resp) if resp.status().is_success() => true,
            Ok(resp) => {
                warn!(status = %resp.status(), "Ollama health probe rejected");
                false
            }
            Err(e) => {
                warn!(error = %e, "Ollama unreachable");
                false
            }
        };
        Ok(healthy)
    }
}
