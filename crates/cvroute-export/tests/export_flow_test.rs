//! Export flow against a wiremock Sheets API with a SQLite registry.

use std::sync::Arc;

use serde_json::json;
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

use cvroute_core::{ExportConfig, ExtractedEntry, SheetRegistry};
use cvroute_export::{
    seed_registry, ExportCoordinator, GoogleSheetsBackend, SheetsConfig, SqliteSheetRegistry,
};

fn headers() -> Vec<String> {
    vec!["Name".to_string(), "Qualification".to_string()]
}

fn entry(name: &str, qualification: &str, label: &str) -> ExtractedEntry {
    ExtractedEntry {
        headers: headers(),
        row: vec![Some(name.to_string()), Some(qualification.to_string())],
        label: label.to_string(),
    }
}

async fn coordinator(server: &MockServer, registry: Arc<SqliteSheetRegistry>) -> ExportCoordinator {
    let backend =
        GoogleSheetsBackend::new(SheetsConfig::new("t").with_base_url(&server.uri())).unwrap();
    ExportCoordinator::new(
        Arc::new(backend),
        registry,
        ExportConfig::default(),
        headers(),
    )
}

#[tokio::test]
async fn test_second_export_reuses_created_sheet() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/spreadsheets"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"spreadsheetId": "act-1"})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/spreadsheets/act-1/values/A1:append"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(2)
        .mount(&server)
        .await;

    let registry = Arc::new(SqliteSheetRegistry::connect("sqlite::memory:").await.unwrap());
    let coordinator = coordinator(&server, registry.clone()).await;

    let first = coordinator
        .export(&[entry("Thabo Nkosi", "BSc Actuarial Science", "actuarial")])
        .await
        .unwrap();
    let second = coordinator
        .export(&[entry("Lerato", "Actuary trainee", "actuarial")])
        .await
        .unwrap();

    assert_eq!(first, second);
    assert_eq!(
        first.sheets.get("actuarial").map(String::as_str),
        Some("https://docs.google.com/spreadsheets/d/act-1")
    );
    assert_eq!(
        registry.lookup("actuarial").await.unwrap().unwrap().sheet_id,
        "act-1"
    );
}

#[tokio::test]
async fn test_seeded_label_skips_creation() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/spreadsheets"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path_regex(r"^/spreadsheets/pre-gen/values/.*"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let registry = Arc::new(SqliteSheetRegistry::connect("sqlite::memory:").await.unwrap());
    seed_registry(
        registry.as_ref(),
        &[("general".to_string(), "pre-gen".to_string())],
    )
    .await
    .unwrap();
    let coordinator = coordinator(&server, registry).await;

    let report = coordinator
        .export(&[entry("Jane", "BCom", "general")])
        .await
        .unwrap();
    assert!(report.sheets["general"].ends_with("/pre-gen"));
}

#[tokio::test]
async fn test_append_failure_reports_label_and_keeps_mapping() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/spreadsheets"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"spreadsheetId": "s-1"})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/spreadsheets/s-1/values/A1:append"))
        .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
        .mount(&server)
        .await;

    let registry = Arc::new(SqliteSheetRegistry::connect("sqlite::memory:").await.unwrap());
    let coordinator = coordinator(&server, registry.clone()).await;

    let err = coordinator
        .export(&[entry("Jane", "BCom", "general")])
        .await
        .unwrap_err();
    assert!(err.to_string().contains("general"));
    assert!(err.to_string().contains("429"));
    // The sheet exists remotely, so the mapping stays.
    assert!(registry.lookup("general").await.unwrap().is_some());
}
