//! NSX-T client error types

use thiserror::Error;

/// NSX-T API errors
#[derive(Error, Debug)]
pub enum NsxtError {
    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("API error (HTTP {status}, code {code:?}): {message}")]
    Api {
        status: u16,
        code: Option<i64>,
        message: String,
    },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl NsxtError {
    /// Whether the control plane reported that the addressed object does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, NsxtError::NotFound(_))
    }

    /// Whether the request may succeed when repeated unchanged.
    pub fn is_transient(&self) -> bool {
        match self {
            NsxtError::Api { status, .. } => matches!(status, 429 | 502 | 503 | 504),
            NsxtError::Http(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }

    /// Classify an error response body returned by either API generation.
    ///
    /// The manager API reports missing objects with error code 202, the policy
    /// API with 500012 or 600 on a 400/404 response.
    pub(crate) fn from_response(status: u16, body: &str, what: &str) -> Self {
        let parsed: Option<ApiErrorBody> = serde_json::from_str(body).ok();
        let code = parsed.as_ref().and_then(|b| b.error_code);
        let message = parsed
            .and_then(|b| b.error_message)
            .unwrap_or_else(|| body.trim().to_string());

        match (status, code) {
            (404, _) | (400, Some(202 | 600 | 500012)) => NsxtError::NotFound(what.to_string()),
            _ => NsxtError::Api {
                status,
                code,
                message,
            },
        }
    }
}

#[derive(Debug, serde::Deserialize)]
struct ApiErrorBody {
    error_code: Option<i64>,
    error_message: Option<String>,
}

pub type Result<T> = std::result::Result<T, NsxtError>;
