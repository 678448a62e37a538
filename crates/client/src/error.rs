//! Error types for the modelview client.

/// Errors from talking to the share service.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The base URL or a derived asset URL is malformed.
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    /// Network failure or non-success HTTP status.
    #[error("HTTP error: {0}")]
    Http(String),

    /// The service knows no model for the share token.
    #[error("model not found: {0}")]
    NotFound(String),

    /// A downloaded file exceeded the configured byte ceiling.
    #[error("download too large: {0}")]
    TooLarge(String),

    /// The service's response could not be decoded.
    #[error("decode error: {0}")]
    Decode(String),

    /// Writing the fetched bundle into the cache failed.
    #[error("cache error: {0}")]
    Cache(#[from] modelview_core::Error),
}
