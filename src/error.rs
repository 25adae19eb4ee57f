/// Error types for the Papago client
use thiserror::Error;

use crate::endpoint::Method;

#[derive(Debug, Error)]
pub enum PapagoError {
    /// Missing or malformed configuration (credentials, retry bounds, ...)
    #[error("Configuration error: {0}")]
    Config(String),

    /// A language code outside the provider's known set
    #[error("Invalid language code: '{0}'")]
    InvalidLanguageCode(String),

    /// Neither a direct path nor an English pivot exists for the pair
    #[error("No translation path from {source_code} to {target_code}")]
    NoTranslationPath {
        source_code: String,
        target_code: String,
    },

    /// The web channel could not be initialised (provider version unavailable)
    #[error("Setup error: {0}")]
    Setup(String),

    /// Every channel and retry was used up. Usually means the IP is rate-limited or banned.
    #[error("{method} request exhausted all channels (status: {status:?}): {body}")]
    RequestExhausted {
        method: Method,
        status: Option<u16>,
        body: String,
    },

    /// The provider answered 200 with a body we could not interpret
    #[error("Unexpected {method} response: {detail}")]
    UnexpectedResponse { method: Method, detail: String },

    /// The OCR collaborator rejected or garbled a request
    #[error("OCR service error: {0}")]
    Ocr(String),

    /// Cancelled through the client's cancellation token
    #[error("Operation cancelled")]
    Cancelled,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for client operations
pub type PapagoResult<T> = Result<T, PapagoError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exhausted_message_carries_status_and_body() {
        let err = PapagoError::RequestExhausted {
            method: Method::TranslateNeural,
            status: Some(403),
            body: "{\"errorCode\":\"024\"}".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("n2mt"));
        assert!(msg.contains("403"));
        assert!(msg.contains("024"));
    }

    #[test]
    fn test_invalid_code_message() {
        let err = PapagoError::InvalidLanguageCode("xx".to_string());
        assert_eq!(err.to_string(), "Invalid language code: 'xx'");
    }
}
