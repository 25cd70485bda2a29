use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use tracing::error;

use cvroute_core::defaults::MISCONFIGURED_MESSAGE;

/// Errors returned to HTTP clients as `{"error": message}`.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    /// A required backend is not configured; the body is the stable message.
    Misconfigured,
    Internal(String),
}

impl From<cvroute_core::Error> for ApiError {
    fn from(err: cvroute_core::Error) -> Self {
        use cvroute_core::Error;
        match err {
            Error::InvalidInput(msg) | Error::DocumentRead(msg) => ApiError::BadRequest(msg),
            Error::Config(msg) => {
                error!(error = %msg, "Configuration error during request");
                ApiError::Misconfigured
            }
            Error::Export(msg) => ApiError::Internal(msg),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Misconfigured => (
                StatusCode::INTERNAL_SERVER_ERROR,
                MISCONFIGURED_MESSAGE.to_string(),
            ),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = Json(serde_json::json!({
            "error": message,
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cvroute_core::Error;

    #[test]
    fn test_core_error_mapping() {
        assert!(matches!(
            ApiError::from(Error::InvalidInput("x".into())),
            ApiError::BadRequest(m) if m == "x"
        ));
        assert!(matches!(
            ApiError::from(Error::Config("no key".into())),
            ApiError::Misconfigured
        ));
        assert!(matches!(
            ApiError::from(Error::Export("Export process failed: general: boom".into())),
            ApiError::Internal(m) if m.starts_with("Export process failed")
        ));
    }

    #[test]
    fn test_misconfigured_status() {
        let response = ApiError::Misconfigured.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
