//! HTTP tests against an in-process server with mock backends.

use std::sync::Arc;

use reqwest::multipart::{Form, Part};
use serde_json::{json, Value};

use cvroute_api::{app, AppState, Capability, ServiceConfig};
use cvroute_core::defaults::MISCONFIGURED_MESSAGE;
use cvroute_core::{ExportConfig, PipelineConfig};
use cvroute_export::{ExportCoordinator, InMemorySheetRegistry, MockSheetBackend};
use cvroute_inference::MockGenerationBackend;
use cvroute_pipeline::prompts::EXTRACTION_SYSTEM;
use cvroute_pipeline::Pipeline;

const THABO_CV: &str = "Thabo Nkosi\nDurban\n082 555 0101\nthabo@example.com\n\
Education: BSc Actuarial Science, University of KwaZulu-Natal (2019)";

fn thabo_backend() -> MockGenerationBackend {
    MockGenerationBackend::new()
        .with_response_containing(
            EXTRACTION_SYSTEM,
            r#"{"name": "Thabo Nkosi", "city": "Durban", "qualification": "BSc Actuarial Science"}"#,
        )
        .with_response_containing("Location: Durban", "KwaZulu-Natal")
        .with_response_containing("Full name: Thabo Nkosi", "isiZulu")
        .with_response_containing("Province: KwaZulu-Natal", "isiZulu")
}

struct TestServer {
    base: String,
    client: reqwest::Client,
}

async fn spawn(state: AppState) -> TestServer {
    let config = ServiceConfig::default();
    let router = app(state, &config);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    TestServer {
        base: format!("http://{}", addr),
        client: reqwest::Client::new(),
    }
}

fn configured_state(generation: &MockGenerationBackend, sheets: &MockSheetBackend) -> AppState {
    let pipeline_config = PipelineConfig::default();
    let pipeline = Pipeline::new(Arc::new(generation.clone()), &pipeline_config);
    let exporter = ExportCoordinator::new(
        Arc::new(sheets.clone()),
        Arc::new(InMemorySheetRegistry::new()),
        ExportConfig::default(),
        pipeline_config.headers(),
    );
    AppState::new(
        Capability::Ready(Arc::new(pipeline)),
        Capability::Ready(Arc::new(exporter)),
    )
}

fn misconfigured_state() -> AppState {
    AppState::new(
        Capability::Unavailable("OPENAI_API_KEY is required".to_string()),
        Capability::Unavailable("GOOGLE_APPLICATION_CREDENTIALS is not set".to_string()),
    )
}

#[tokio::test]
async fn test_root_reports_ok_and_request_id() {
    let server = spawn(configured_state(
        &MockGenerationBackend::new(),
        &MockSheetBackend::new(),
    ))
    .await;

    let response = server
        .client
        .get(format!("{}/", server.base))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    assert!(response.headers().contains_key("x-request-id"));

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["service"], "cvroute");
    assert_eq!(body["status"], "ok");
}

async fn get_health(server: &TestServer) -> Value {
    server
        .client
        .get(format!("{}/health", server.base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap()
}

#[tokio::test]
async fn test_health_checks_configured_backends() {
    let generation = MockGenerationBackend::new();
    let server = spawn(configured_state(&generation, &MockSheetBackend::new())).await;

    let health = get_health(&server).await;
    assert_eq!(health["status"], "ok");
    assert_eq!(health["capabilities"]["extraction"], "ready");
    assert_eq!(health["capabilities"]["export"], "ready");
    assert_eq!(health["capabilities"]["pipeline"]["model"], "mock-model");
    assert_eq!(health["capabilities"]["pipeline"]["backend"], true);
    assert_eq!(health["capabilities"]["pipeline"]["sources"]["plain_text"], true);
    assert_eq!(generation.call_count(), 0);
}

#[tokio::test]
async fn test_health_reports_rejected_sheet_credentials() {
    let server = spawn(configured_state(
        &MockGenerationBackend::new(),
        &MockSheetBackend::new().unhealthy(),
    ))
    .await;

    let health = get_health(&server).await;
    assert_eq!(health["status"], "degraded");
    assert_eq!(health["capabilities"]["extraction"], "ready");
    assert_eq!(health["capabilities"]["export"], "unhealthy");
}

#[tokio::test]
async fn test_health_reports_unreachable_model() {
    let server = spawn(configured_state(
        &MockGenerationBackend::new().unhealthy(),
        &MockSheetBackend::new(),
    ))
    .await;

    let health = get_health(&server).await;
    assert_eq!(health["status"], "degraded");
    assert_eq!(health["capabilities"]["extraction"], "unhealthy");
    assert_eq!(health["capabilities"]["pipeline"]["backend"], false);
}

#[tokio::test]
async fn test_misconfigured_service_answers_with_stable_message() {
    let server = spawn(misconfigured_state()).await;

    let health = get_health(&server).await;
    assert_eq!(health["status"], "misconfigured");
    assert!(health["capabilities"].get("pipeline").is_none());
    assert_eq!(health["capabilities"]["extraction"], "unavailable");

    let form = Form::new().part("files", Part::bytes(b"cv".to_vec()).file_name("cv.txt"));
    let extract = server
        .client
        .post(format!("{}/extract", server.base))
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(extract.status(), 500);
    let body: Value = extract.json().await.unwrap();
    assert_eq!(body["error"], MISCONFIGURED_MESSAGE);

    let export = server
        .client
        .post(format!("{}/export", server.base))
        .json(&json!([]))
        .send()
        .await
        .unwrap();
    assert_eq!(export.status(), 500);
    let body: Value = export.json().await.unwrap();
    assert_eq!(body["error"], MISCONFIGURED_MESSAGE);
}

#[tokio::test]
async fn test_extract_without_files_is_rejected_without_calls() {
    let generation = MockGenerationBackend::new();
    let server = spawn(configured_state(&generation, &MockSheetBackend::new())).await;

    let form = Form::new().text("note", "no files here");
    let response = server
        .client
        .post(format!("{}/extract", server.base))
        .multipart(form)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 400);
    assert_eq!(generation.call_count(), 0);
}

#[tokio::test]
async fn test_extract_then_export_routes_thabo_to_actuarial() {
    let generation = thabo_backend();
    let sheets = MockSheetBackend::new();
    let server = spawn(configured_state(&generation, &sheets)).await;

    let form = Form::new().part(
        "files",
        Part::bytes(THABO_CV.as_bytes().to_vec())
            .file_name("thabo.txt")
            .mime_str("text/plain")
            .unwrap(),
    );
    let entries: Value = server
        .client
        .post(format!("{}/extract", server.base))
        .multipart(form)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let entries = entries.as_array().unwrap().clone();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["label"], "actuarial");
    assert_eq!(entries[0]["row"][0], "Thabo Nkosi");

    let response = server
        .client
        .post(format!("{}/export", server.base))
        .json(&entries)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let body: Value = response.json().await.unwrap();
    let url = body["sheets"]["actuarial"].as_str().unwrap();
    assert!(url.starts_with("https://docs.google.com/spreadsheets/d/"));
    assert!(body.get("failures").is_none());

    let sheet = sheets.sheet_titled("Candidates - actuarial").unwrap();
    assert_eq!(sheet.header[0], "Name");
    assert_eq!(sheet.rows.len(), 1);
    assert_eq!(sheet.rows[0][0], "Thabo Nkosi");
}

#[tokio::test]
async fn test_export_validation_errors_are_400() {
    let sheets = MockSheetBackend::new();
    let server = spawn(configured_state(&MockGenerationBackend::new(), &sheets)).await;

    let empty = server
        .client
        .post(format!("{}/export", server.base))
        .json(&json!([]))
        .send()
        .await
        .unwrap();
    assert_eq!(empty.status(), 400);
    let body: Value = empty.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("empty"));

    let malformed = server
        .client
        .post(format!("{}/export", server.base))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(malformed.status(), 400);

    let short_row = server
        .client
        .post(format!("{}/export", server.base))
        .json(&json!([{"headers": [], "row": ["only one"], "label": "general"}]))
        .send()
        .await
        .unwrap();
    assert_eq!(short_row.status(), 400);
    assert_eq!(sheets.create_count(), 0);
}

#[tokio::test]
async fn test_export_total_failure_is_500() {
    let sheets = MockSheetBackend::new().with_create_failure("Candidates");
    let server = spawn(configured_state(&MockGenerationBackend::new(), &sheets)).await;

    let row: Vec<Value> = (0..PipelineConfig::default().headers().len())
        .map(|_| Value::Null)
        .collect();
    let response = server
        .client
        .post(format!("{}/export", server.base))
        .json(&json!([{"row": row, "label": "general"}]))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 500);
    let body: Value = response.json().await.unwrap();
    assert!(body["error"]
        .as_str()
        .unwrap()
        .starts_with("Export process failed"));
}
