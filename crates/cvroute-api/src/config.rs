//! Service configuration read once at startup.

use axum::http::HeaderValue;
use tracing::warn;

use cvroute_core::defaults;
use cvroute_core::{ExportConfig, PipelineConfig};

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub host: String,
    pub port: u16,
    /// CORS origin whitelist.
    pub allowed_origins: Vec<String>,
    pub max_upload_bytes: usize,
    pub pipeline: PipelineConfig,
    pub export: ExportConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            host: defaults::SERVER_HOST.to_string(),
            port: defaults::SERVER_PORT,
            allowed_origins: split_origins(defaults::ALLOWED_ORIGINS),
            max_upload_bytes: defaults::MAX_UPLOAD_BYTES,
            pipeline: PipelineConfig::default(),
            export: ExportConfig::default(),
        }
    }
}

impl ServiceConfig {
    /// Read from `HOST`, `PORT`, `ALLOWED_ORIGINS`, `MAX_UPLOAD_BYTES` plus
    /// the pipeline and export settings.
    pub fn from_env() -> Self {
        let origins = std::env::var("ALLOWED_ORIGINS")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| defaults::ALLOWED_ORIGINS.to_string());

        Self {
            host: std::env::var("HOST").unwrap_or_else(|_| defaults::SERVER_HOST.to_string()),
            port: std::env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults::SERVER_PORT),
            allowed_origins: split_origins(&origins),
            max_upload_bytes: std::env::var("MAX_UPLOAD_BYTES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults::MAX_UPLOAD_BYTES),
            pipeline: PipelineConfig::from_env(),
            export: ExportConfig::from_env(),
        }
    }

    /// Origins as header values; invalid entries are skipped with a warning.
    pub fn origin_headers(&self) -> Vec<HeaderValue> {
        self.allowed_origins
            .iter()
            .filter_map(|origin| match origin.parse::<HeaderValue>() {
                Ok(v) => Some(v),
                Err(e) => {
                    warn!("Invalid CORS origin '{}': {}", origin, e);
                    None
                }
            })
            .collect()
    }
}

fn split_origins(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}
