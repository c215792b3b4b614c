use thiserror::Error;

/// Errors raised by the client's network sources.
///
/// None of these are fatal to the aggregator; they are recorded in its
/// status instead.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("historical fetch failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("historical fetch returned HTTP {0}")]
    Status(u16),

    #[error("invalid historical response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("live feed I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("live feed refused subscription: {0}")]
    Refused(String),

    #[error("live feed closed by server")]
    Closed,
}
