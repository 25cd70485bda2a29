//! Centralized default constants for cvroute.
//!
//! **This module is the single source of truth** for shared default values.
//! Crates reference these constants instead of defining their own magic
//! numbers. Organized by domain area.

// =============================================================================
// SERVER
// =============================================================================

/// Default HTTP server port.
pub const SERVER_PORT: u16 = 8080;

/// Default bind host.
pub const SERVER_HOST: &str = "0.0.0.0";

/// Default request body limit (50 MiB) for multipart uploads.
pub const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

/// Default CORS origin whitelist.
pub const ALLOWED_ORIGINS: &str = "http://localhost:3000";

/// Stable message returned for every call made while misconfigured.
pub const MISCONFIGURED_MESSAGE: &str = "Server configuration error. Check logs.";

// =============================================================================
// INFERENCE
// =============================================================================

/// Default Ollama endpoint.
pub const OLLAMA_URL: &str = "http://127.0.0.1:11434";

/// Default Ollama generation model.
pub const OLLAMA_GEN_MODEL: &str = "llama3.1:8b";

/// Default OpenAI-compatible endpoint.
pub const OPENAI_URL: &str = "https://api.openai.com/v1";

/// Default OpenAI-compatible generation model.
pub const OPENAI_GEN_MODEL: &str = "gpt-4o-mini";

/// Timeout for generation requests (seconds).
pub const GEN_TIMEOUT_SECS: u64 = 120;

/// Generation calls slower than this are logged as slow (milliseconds).
pub const SLOW_GENERATION_MS: u64 = 30_000;

// =============================================================================
// EXTRACTION
// =============================================================================

/// Maximum characters of document text sent to the field extractor.
pub const MAX_INPUT_CHARS: usize = 24_000;

/// Per-command timeout for external text extraction tools (seconds).
pub const EXTRACTION_CMD_TIMEOUT_SECS: u64 = 60;

/// Separator used when flattening multi-value fields.
pub const MULTI_VALUE_SEPARATOR: &str = ", ";

/// Cell value written for a derivation that failed (distinct from null).
pub const FAILURE_SENTINEL: &str = "error";

// =============================================================================
// EXPORT
// =============================================================================

/// Default Google Sheets API base URL.
pub const SHEETS_API_BASE: &str = "https://sheets.googleapis.com/v4";

/// Default Google Drive API base URL (permissions).
pub const DRIVE_API_BASE: &str = "https://www.googleapis.com/drive/v3";

/// Public URL prefix for a spreadsheet identifier.
pub const SHEET_URL_PREFIX: &str = "https://docs.google.com/spreadsheets/d/";

/// Timeout for sheets requests (seconds).
pub const SHEETS_TIMEOUT_SECS: u64 = 60;

/// Default title prefix for created sheets.
pub const SHEET_TITLE_PREFIX: &str = "Candidates";

/// Routing key used when every record goes to one sheet.
pub const SINGLE_SHEET_KEY: &str = "all_candidates";

/// Range that appends start from.
pub const APPEND_RANGE: &str = "A1";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sheet_url_prefix_is_https() {
        assert!(SHEET_URL_PREFIX.starts_with("https://"));
        assert!(SHEET_URL_PREFIX.ends_with('/'));
    }

    #[test]
    fn test_upload_limit_is_reasonable() {
        assert!(MAX_UPLOAD_BYTES >= 10 * 1024 * 1024);
    }

    #[test]
    fn test_failure_sentinel_not_empty() {
        assert!(!FAILURE_SENTINEL.is_empty());
    }
}
