//! Shared application state and startup wiring.

use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info};

use cvroute_core::Result;
use cvroute_export::{
    preprovisioned_from_env, registry_from_env, seed_registry, ExportCoordinator,
    GoogleSheetsBackend,
};
use cvroute_inference::backend_from_env;
use cvroute_pipeline::Pipeline;

use crate::config::ServiceConfig;
use crate::error::ApiError;

/// A backend-dependent capability that may be unavailable when its
/// configuration is missing.
#[derive(Clone)]
pub enum Capability<T> {
    Ready(T),
    /// Reason is logged at startup and never returned to clients.
    Unavailable(String),
}

impl<T> Capability<T> {
    /// Wrap a startup result, logging the failure.
    pub fn from_result(name: &str, result: Result<T>) -> Self {
        match result {
            Ok(value) => {
                info!(capability = name, "Capability ready");
                Capability::Ready(value)
            }
            Err(e) => {
                error!(capability = name, error = %e, "Capability unavailable, requests will fail");
                Capability::Unavailable(e.to_string())
            }
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, Capability::Ready(_))
    }

    pub fn status(&self) -> CapabilityStatus {
        if self.is_ready() {
            CapabilityStatus::Ready
        } else {
            CapabilityStatus::Unavailable
        }
    }

    /// The capability, or the stable misconfiguration error.
    pub fn get(&self) -> std::result::Result<&T, ApiError> {
        match self {
            Capability::Ready(value) => Ok(value),
            Capability::Unavailable(_) => Err(ApiError::Misconfigured),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CapabilityStatus {
    Ready,
    /// Configured, but its backend failed a health check.
    Unhealthy,
    /// Not configured.
    Unavailable,
}

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Capability<Arc<Pipeline>>,
    pub exporter: Capability<Arc<ExportCoordinator>>,
}

impl AppState {
    pub fn new(
        pipeline: Capability<Arc<Pipeline>>,
        exporter: Capability<Arc<ExportCoordinator>>,
    ) -> Self {
        Self { pipeline, exporter }
    }

    /// Build both capabilities from the environment. Missing credentials
    /// degrade the service instead of failing startup.
    pub async fn from_env(config: &ServiceConfig) -> Self {
        let pipeline = Capability::from_result(
            "extraction",
            backend_from_env().map(|backend| Arc::new(Pipeline::new(backend, &config.pipeline))),
        );
        let exporter = Capability::from_result("export", build_exporter(config).await);
        Self { pipeline, exporter }
    }

    pub fn is_configured(&self) -> bool {
        self.pipeline.is_ready() && self.exporter.is_ready()
    }
}

async fn build_exporter(config: &ServiceConfig) -> Result<Arc<ExportCoordinator>> {
    let backend = GoogleSheetsBackend::from_env()?;
    let registry = registry_from_env().await?;
    let seeded = seed_registry(registry.as_ref(), &preprovisioned_from_env()).await?;
    if seeded > 0 {
        info!(seeded, "Pre-provisioned sheets registered");
    }
    Ok(Arc::new(ExportCoordinator::new(
        Arc::new(backend),
        registry,
        config.export.clone(),
        config.pipeline.headers(),
    )))
}
