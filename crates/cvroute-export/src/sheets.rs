//! Google Sheets / Drive client implementing [`SheetBackend`].
//!
//! Requests carry an OAuth bearer token from a [`TokenSource`]. The usual
//! source is a service-account key file (`GOOGLE_APPLICATION_CREDENTIALS`),
//! whose tokens are minted and refreshed before they expire. A fixed
//! `SHEETS_ACCESS_TOKEN` overrides it for short-lived setups.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use gcp_auth::{CustomServiceAccount, TokenProvider};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use cvroute_core::defaults;
use cvroute_core::{Error, Result, SheetBackend};

/// OAuth scopes for creating, writing and sharing spreadsheets.
pub const SHEETS_SCOPES: &[&str] = &[
    "https://www.googleapis.com/auth/spreadsheets",
    "https://www.googleapis.com/auth/drive.file",
];

/// Where bearer tokens come from.
#[derive(Clone, PartialEq, Eq)]
pub enum SheetsCredentials {
    /// A pre-minted token used as-is; it is never refreshed.
    AccessToken(String),
    /// A service-account JSON key file.
    ServiceAccountKey(PathBuf),
}

impl SheetsCredentials {
    /// Pick credentials from an explicit token or a key file path, the token
    /// taking precedence. Blank values count as unset.
    pub fn resolve(access_token: Option<String>, key_file: Option<String>) -> Result<Self> {
        let non_blank = |v: Option<String>| {
            v.map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        match (non_blank(access_token), non_blank(key_file)) {
            (Some(token), _) => Ok(SheetsCredentials::AccessToken(token)),
            (None, Some(path)) => Ok(SheetsCredentials::ServiceAccountKey(PathBuf::from(path))),
            (None, None) => Err(Error::Config(
                "Neither GOOGLE_APPLICATION_CREDENTIALS nor SHEETS_ACCESS_TOKEN is set".to_string(),
            )),
        }
    }
}

impl fmt::Debug for SheetsCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SheetsCredentials::AccessToken(_) => f.write_str("AccessToken(<redacted>)"),
            SheetsCredentials::ServiceAccountKey(path) => {
                f.debug_tuple("ServiceAccountKey").field(path).finish()
            }
        }
    }
}

/// Configuration for the Sheets client.
#[derive(Debug, Clone)]
pub struct SheetsConfig {
    pub credentials: SheetsCredentials,
    pub sheets_api_base: String,
    pub drive_api_base: String,
    pub timeout_seconds: u64,
}

impl SheetsConfig {
    pub fn with_credentials(credentials: SheetsCredentials) -> Self {
        Self {
            credentials,
            sheets_api_base: defaults::SHEETS_API_BASE.to_string(),
            drive_api_base: defaults::DRIVE_API_BASE.to_string(),
            timeout_seconds: defaults::SHEETS_TIMEOUT_SECS,
        }
    }

    /// Config with a fixed bearer token.
    pub fn new(access_token: impl Into<String>) -> Self {
        Self::with_credentials(SheetsCredentials::AccessToken(access_token.into()))
    }

    /// Point both APIs at one base URL (used by tests against a mock server).
    pub fn with_base_url(mut self, base: &str) -> Self {
        let base = base.trim_end_matches('/');
        self.sheets_api_base = base.to_string();
        self.drive_api_base = base.to_string();
        self
    }

    /// Read from `SHEETS_ACCESS_TOKEN` / `GOOGLE_APPLICATION_CREDENTIALS`,
    /// `SHEETS_API_BASE`, `DRIVE_API_BASE`, `SHEETS_TIMEOUT_SECS`. Missing
    /// credentials are a configuration error.
    pub fn from_env() -> Result<Self> {
        let credentials = SheetsCredentials::resolve(
            std::env::var("SHEETS_ACCESS_TOKEN").ok(),
            std::env::var("GOOGLE_APPLICATION_CREDENTIALS").ok(),
        )?;

        Ok(Self {
            credentials,
            sheets_api_base: std::env::var("SHEETS_API_BASE")
                .unwrap_or_else(|_| defaults::SHEETS_API_BASE.to_string()),
            drive_api_base: std::env::var("DRIVE_API_BASE")
                .unwrap_or_else(|_| defaults::DRIVE_API_BASE.to_string()),
            timeout_seconds: std::env::var("SHEETS_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults::SHEETS_TIMEOUT_SECS),
        })
    }
}

// =============================================================================
// TOKENS
// =============================================================================

/// Supplies the bearer token for each request.
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn access_token(&self) -> Result<String>;
}

/// A fixed token.
pub struct StaticToken(String);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

#[async_trait]
impl TokenSource for StaticToken {
    async fn access_token(&self) -> Result<String> {
        Ok(self.0.clone())
    }
}

/// Tokens minted from a service-account key; cached until close to expiry.
pub struct ServiceAccountTokens {
    account: CustomServiceAccount,
}

impl ServiceAccountTokens {
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let account = CustomServiceAccount::from_file(path).map_err(|e| {
            Error::Config(format!(
                "Invalid service account key '{}': {}",
                path.display(),
                e
            ))
        })?;
        Ok(Self { account })
    }
}

#[async_trait]
impl TokenSource for ServiceAccountTokens {
    async fn access_token(&self) -> Result<String> {
        let token = self
            .account
            .token(SHEETS_SCOPES)
            .await
            .map_err(|e| Error::Export(format!("Service account token request failed: {}", e)))?;
        Ok(token.as_str().to_string())
    }
}

fn token_source(credentials: &SheetsCredentials) -> Result<Arc<dyn TokenSource>> {
    Ok(match credentials {
        SheetsCredentials::AccessToken(token) => Arc::new(StaticToken::new(token.clone())),
        SheetsCredentials::ServiceAccountKey(path) => {
            Arc::new(ServiceAccountTokens::from_file(path)?)
        }
    })
}

// =============================================================================
// WIRE TYPES
// =============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateSpreadsheetRequest {
    properties: SpreadsheetProperties,
    sheets: Vec<SheetSpec>,
}

#[derive(Debug, Serialize)]
struct SpreadsheetProperties {
    title: String,
}

#[derive(Debug, Serialize)]
struct SheetSpec {
    data: Vec<GridData>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GridData {
    start_row: u32,
    start_column: u32,
    row_data: Vec<RowData>,
}

#[derive(Debug, Serialize)]
struct RowData {
    values: Vec<CellData>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CellData {
    user_entered_value: ExtendedValue,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ExtendedValue {
    string_value: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateSpreadsheetResponse {
    spreadsheet_id: String,
}

#[derive(Debug, Serialize)]
struct AppendRequest<'a> {
    values: &'a [Vec<String>],
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AppendResponse {
    #[serde(default)]
    updates: Option<AppendUpdates>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AppendUpdates {
    #[serde(default)]
    updated_rows: Option<usize>,
}

#[derive(Debug, Serialize)]
struct PermissionRequest {
    role: &'static str,
    #[serde(rename = "type")]
    grantee: &'static str,
}

fn header_request(title: &str, header: &[String]) -> CreateSpreadsheetRequest {
    CreateSpreadsheetRequest {
        properties: SpreadsheetProperties {
            title: title.to_string(),
        },
        sheets: vec![SheetSpec {
            data: vec![GridData {
                start_row: 0,
                start_column: 0,
                row_data: vec![RowData {
                    values: header
                        .iter()
                        .map(|h| CellData {
                            user_entered_value: ExtendedValue {
                                string_value: h.clone(),
                            },
                        })
                        .collect(),
                }],
            }],
        }],
    }
}

// =============================================================================
// CLIENT
// =============================================================================

/// Spreadsheet backend over the Google Sheets v4 and Drive v3 REST APIs.
pub struct GoogleSheetsBackend {
    client: Client,
    config: SheetsConfig,
    tokens: Arc<dyn TokenSource>,
}

impl GoogleSheetsBackend {
    pub fn new(config: SheetsConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| Error::Export(format!("Failed to create HTTP client: {}", e)))?;
        let tokens = token_source(&config.credentials)?;

        info!(
            subsystem = "export",
            component = "sheets",
            url = %config.sheets_api_base,
            credentials = ?config.credentials,
            "Initializing Sheets backend"
        );

        Ok(Self {
            client,
            config,
            tokens,
        })
    }

    pub fn from_env() -> Result<Self> {
        Self::new(SheetsConfig::from_env()?)
    }

    /// Replace the configured token source.
    pub fn with_token_source(mut self, tokens: Arc<dyn TokenSource>) -> Self {
        self.tokens = tokens;
        self
    }

    pub fn config(&self) -> &SheetsConfig {
        &self.config
    }

    async fn post(&self, url: String) -> Result<reqwest::RequestBuilder> {
        let token = self.tokens.access_token().await?;
        Ok(self.client.post(url).bearer_auth(token))
    }

    /// Turn a non-success response into an error carrying status and body.
    async fn check(response: reqwest::Response, what: &str) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        let message = format!("{} returned {}: {}", what, status, body.trim());
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            warn!(subsystem = "export", component = "sheets", %status, "Sheets credentials rejected");
        }
        Err(Error::Export(message))
    }
}

#[async_trait]
impl SheetBackend for GoogleSheetsBackend {
    #[instrument(skip(self, header), fields(subsystem = "export", component = "sheets", op = "create", header_len = header.len()))]
    async fn create_sheet(&self, title: &str, header: &[String]) -> Result<String> {
        let start = Instant::now();
        let url = format!(
            "{}/spreadsheets",
            self.config.sheets_api_base.trim_end_matches('/')
        );

        let response = self
            .post(url)
            .await?
            .json(&header_request(title, header))
            .send()
            .await
            .map_err(|e| Error::Export(format!("Create request failed: {}", e)))?;
        let response = Self::check(response, "Sheets create").await?;

        let created: CreateSpreadsheetResponse = response
            .json()
            .await
            .map_err(|e| Error::Export(format!("Invalid create response: {}", e)))?;

        info!(
            sheet_id = %created.spreadsheet_id,
            duration_ms = start.elapsed().as_millis() as u64,
            "Created sheet"
        );
        Ok(created.spreadsheet_id)
    }

    #[instrument(skip(self, rows), fields(subsystem = "export", component = "sheets", op = "append", row_count = rows.len()))]
    async fn append_rows(&self, sheet_id: &str, rows: &[Vec<String>]) -> Result<usize> {
        if rows.is_empty() {
            return Ok(0);
        }
        let start = Instant::now();
        let url = format!(
            "{}/spreadsheets/{}/values/{}:append",
            self.config.sheets_api_base.trim_end_matches('/'),
            sheet_id,
            defaults::APPEND_RANGE
        );

        let response = self
            .post(url)
            .await?
            .query(&[("valueInputOption", "RAW"), ("insertDataOption", "INSERT_ROWS")])
            .json(&AppendRequest { values: rows })
            .send()
            .await
            .map_err(|e| Error::Export(format!("Append request failed: {}", e)))?;
        let response = Self::check(response, "Sheets append").await?;

        let body: AppendResponse = response.json().await.unwrap_or_default();
        let written = body
            .updates
            .and_then(|u| u.updated_rows)
            .unwrap_or(rows.len());

        debug!(
            written,
            duration_ms = start.elapsed().as_millis() as u64,
            "Appended rows"
        );
        Ok(written)
    }

    #[instrument(skip(self), fields(subsystem = "export", component = "sheets", op = "share"))]
    async fn share_publicly(&self, sheet_id: &str) -> Result<()> {
        let url = format!(
            "{}/files/{}/permissions",
            self.config.drive_api_base.trim_end_matches('/'),
            sheet_id
        );
        let response = self
            .post(url)
            .await?
            .json(&PermissionRequest {
                role: "writer",
                grantee: "anyone",
            })
            .send()
            .await
            .map_err(|e| Error::Export(format!("Permission request failed: {}", e)))?;
        Self::check(response, "Drive permissions").await?;
        Ok(())
    }

    /// Fetch a token and ask Drive who we are; a rejected token is unhealthy.
    #[instrument(skip(self), fields(subsystem = "export", component = "sheets", op = "health_check"))]
    async fn health_check(&self) -> Result<bool> {
        let token = match self.tokens.access_token().await {
            Ok(token) => token,
            Err(e) => {
                warn!(error = %e, "No Sheets access token");
                return Ok(false);
            }
        };
        let url = format!("{}/about", self.config.drive_api_base.trim_end_matches('/'));
        let response = self
            .client
            .get(url)
            .query(&[("fields", "user")])
            .bearer_auth(token)
            .timeout(Duration::from_secs(5))
            .send()
            .await;
        match response {
            Ok(r) if r.status().is_success() => Ok(true),
            Ok(r) => {
                warn!(status = %r.status(), "Sheets credentials rejected by health check");
                Ok(false)
            }
            Err(e) => {
                warn!(error = %e, "Drive unreachable");
                Ok(false)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_request_shape() {
        let body = serde_json::to_value(header_request(
            "Candidates - actuarial",
            &["Name".to_string(), "Email".to_string()],
        ))
        .unwrap();

        assert_eq!(body["properties"]["title"], "Candidates - actuarial");
        let cells = &body["sheets"][0]["data"][0]["rowData"][0]["values"];
        assert_eq!(cells[0]["userEnteredValue"]["stringValue"], "Name");
        assert_eq!(cells[1]["userEnteredValue"]["stringValue"], "Email");
        assert_eq!(body["sheets"][0]["data"][0]["startRow"], 0);
    }

    #[test]
    fn test_permission_body() {
        let body = serde_json::to_value(PermissionRequest {
            role: "writer",
            grantee: "anyone",
        })
        .unwrap();
        assert_eq!(body, serde_json::json!({"role": "writer", "type": "anyone"}));
    }

    #[test]
    fn test_explicit_token_overrides_key_file() {
        let creds = SheetsCredentials::resolve(
            Some(" ya29.token ".to_string()),
            Some("/etc/cvroute/key.json".to_string()),
        )
        .unwrap();
        assert_eq!(creds, SheetsCredentials::AccessToken("ya29.token".to_string()));
    }

    #[test]
    fn test_key_file_used_without_token() {
        let creds = SheetsCredentials::resolve(
            Some("  ".to_string()),
            Some("/etc/cvroute/key.json".to_string()),
        )
        .unwrap();
        assert_eq!(
            creds,
            SheetsCredentials::ServiceAccountKey(PathBuf::from("/etc/cvroute/key.json"))
        );
    }

    #[test]
    fn test_missing_credentials_is_config_error() {
        let err = SheetsCredentials::resolve(None, None).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_debug_redacts_token() {
        let config = SheetsConfig::new("secret-token");
        assert!(!format!("{:?}", config).contains("secret-token"));
    }

    #[test]
    fn test_unreadable_key_file_is_config_error() {
        let config = SheetsConfig::with_credentials(SheetsCredentials::ServiceAccountKey(
            PathBuf::from("/nonexistent/cvroute-key.json"),
        ));
        let err = GoogleSheetsBackend::new(config).err().unwrap();
        assert!(matches!(err, Error::Config(_)));
        assert!(err.to_string().contains("cvroute-key.json"));
    }

    #[test]
    fn test_with_base_url_trims_slash() {
        let config = SheetsConfig::new("token").with_base_url("http://localhost:9/");
        assert_eq!(config.sheets_api_base, "http://localhost:9");
        assert_eq!(config.drive_api_base, "http://localhost:9");
    }
}
