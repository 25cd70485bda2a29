//! Mapping of OpenAI-compatible error replies onto cvroute errors.

use cvroute_core::Error;

/// Failure classes an OpenAI-compatible server reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenAIErrorCode {
    /// Key missing, invalid or lacking access.
    AuthenticationError,
    RateLimitExceeded,
    ModelNotFound,
    ContextLengthExceeded,
    ServerError,
    Unknown,
}

impl OpenAIErrorCode {
    /// Classify by status first, then by the `error.type` field.
    pub fn from_response(status: u16, error_type: &str) -> Self {
        match status {
            401 | 403 => Self::AuthenticationError,
            429 => Self::RateLimitExceeded,
            404 => Self::ModelNotFound,
            500..=599 => Self::ServerError,
            _ if error_type == "model_not_found" => Self::ModelNotFound,
            400 if error_type.contains("context_length") => Self::ContextLengthExceeded,
            _ => Self::Unknown,
        }
    }

    /// Credential and model problems cannot be fixed by retrying a request.
    fn is_configuration(&self) -> bool {
        matches!(self, Self::AuthenticationError | Self::ModelNotFound)
    }

    fn label(&self) -> &'static str {
        match self {
            Self::AuthenticationError => "Authentication failed",
            Self::RateLimitExceeded => "Rate limit exceeded",
            Self::ModelNotFound => "Model not found",
            Self::ContextLengthExceeded => "Context too long",
            Self::ServerError => "Server error",
            Self::Unknown => "Request rejected",
        }
    }
}

/// Build the cvroute error for a failed call; configuration problems become
/// `Error::Config` so the service reports them as misconfiguration.
pub fn to_cvroute_error(code: OpenAIErrorCode, message: &str) -> Error {
    let text = format!("{}: {}", code.label(), message);
    if code.is_configuration() {
        Error::Config(text)
    } else {
        Error::Inference(text)
    }
}
