//! HTTP handlers.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Multipart, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;
use tracing::{info, warn};

use cvroute_core::ExtractedEntry;
use cvroute_export::ExportReport;
use cvroute_pipeline::{Document, PipelineHealth};

use crate::error::ApiError;
use crate::state::{AppState, Capability, CapabilityStatus};

const SERVICE_NAME: &str = "cvroute";

#[derive(Debug, Serialize)]
pub struct ServiceInfo {
    pub service: &'static str,
    pub version: &'static str,
    /// `ok` or `misconfigured`; `/health` may also report `degraded`.
    pub status: &'static str,
}

#[derive(Debug, Serialize)]
pub struct Capabilities {
    pub extraction: CapabilityStatus,
    pub export: CapabilityStatus,
    /// Health of the generation backend and text sources.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pipeline: Option<PipelineHealth>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    #[serde(flatten)]
    pub info: ServiceInfo,
    pub capabilities: Capabilities,
}

fn service_info(state: &AppState) -> ServiceInfo {
    ServiceInfo {
        service: SERVICE_NAME,
        version: env!("CARGO_PKG_VERSION"),
        status: if state.is_configured() {
            "ok"
        } else {
            "misconfigured"
        },
    }
}

pub async fn root(State(state): State<AppState>) -> impl IntoResponse {
    Json(service_info(&state))
}

/// `GET /health`: health-checks every configured backend.
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let (extraction, pipeline) = match &state.pipeline {
        Capability::Ready(pipeline) => {
            let checked = pipeline.health_check().await;
            let status = if checked.is_ready() {
                CapabilityStatus::Ready
            } else {
                CapabilityStatus::Unhealthy
            };
            (status, Some(checked))
        }
        unavailable => (unavailable.status(), None),
    };
    let export = match &state.exporter {
        Capability::Ready(exporter) => {
            if exporter.health_check().await {
                CapabilityStatus::Ready
            } else {
                CapabilityStatus::Unhealthy
            }
        }
        unavailable => unavailable.status(),
    };

    let mut info = service_info(&state);
    if state.is_configured()
        && (extraction != CapabilityStatus::Ready || export != CapabilityStatus::Ready)
    {
        info.status = "degraded";
        warn!(?extraction, ?export, "Health check found unhealthy backends");
    }

    Json(HealthResponse {
        info,
        capabilities: Capabilities {
            extraction,
            export,
            pipeline,
        },
    })
}

/// Read every file part of the upload, in order.
async fn read_documents(multipart: &mut Multipart) -> Result<Vec<Document>, ApiError> {
    let mut documents = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Failed to read upload: {}", e)))?
    {
        let Some(filename) = field.file_name().map(str::to_string) else {
            continue;
        };
        let content_type = field.content_type().map(str::to_string);
        let data = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(format!("Failed to read file data: {}", e)))?;
        documents.push(Document::new(filename, content_type, data.to_vec()));
    }
    Ok(documents)
}

/// `POST /extract`: one entry per successfully processed document.
pub async fn extract(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<Vec<ExtractedEntry>>, ApiError> {
    let pipeline = state.pipeline.get()?.clone();

    let documents = read_documents(&mut multipart).await?;
    if documents.is_empty() {
        return Err(ApiError::BadRequest("No files uploaded.".to_string()));
    }

    let entries = pipeline.process_batch(&documents).await;
    if entries.len() < documents.len() {
        warn!(
            document_count = documents.len(),
            row_count = entries.len(),
            "Some documents were skipped"
        );
    }
    Ok(Json(entries))
}

/// `POST /export`: `{sheets, failures?}`.
pub async fn export(
    State(state): State<AppState>,
    payload: Result<Json<Vec<ExtractedEntry>>, JsonRejection>,
) -> Result<Json<ExportReport>, ApiError> {
    let exporter = state.exporter.get()?.clone();
    let Json(entries) =
        payload.map_err(|e| ApiError::BadRequest(format!("Invalid or empty data. {}", e.body_text())))?;

    let report = exporter.export(&entries).await?;
    info!(
        sheet_count = report.sheets.len(),
        failure_count = report.failures.len(),
        "Export finished"
    );
    Ok(Json(report))
}
