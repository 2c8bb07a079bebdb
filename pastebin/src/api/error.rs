use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("API returned error (HTTP {status}): {message}")]
    HttpError { status: u16, message: String },

    #[error("Paste service error: {0}")]
    ServerError(String),

    #[error("Invalid paste URL: {0}")]
    InvalidUrl(String),

    #[error("Paste URL has no decryption key in its fragment")]
    MissingKey,

    #[error("Invalid header {name}: {reason}")]
    InvalidHeader { name: String, reason: String },

    #[error("Encryption error: {0}")]
    CryptoError(String),

    #[error("Compression error: {0}")]
    CompressionError(String),

    #[error("Failed to parse response: {0}")]
    ParseError(String),

    #[error("Paste is set to burn after reading; reading it requires confirmation")]
    BurnNotConfirmed,

    #[error("Request cancelled")]
    Cancelled,
}
