use thiserror::Error;

/// All errors produced by the analytics monitor.
#[derive(Error, Debug)]
pub enum MonitorError {
    /// A configuration value is missing or invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Service-account credential material is missing or malformed.
    #[error("Credential error: {0}")]
    Credentials(String),

    /// The HTTP request itself failed (connection, TLS, body decoding).
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// A remote endpoint answered with a non-success status.
    #[error("{endpoint} returned HTTP {status}: {body}")]
    Api {
        endpoint: String,
        status: u16,
        body: String,
    },

    /// The realtime report did not have the expected shape.
    #[error("Malformed report: {0}")]
    MalformedReport(String),

    /// A JSON document could not be parsed.
    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// Catch-all for errors from third-party crates via `anyhow`.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Convenience alias used throughout the monitor crates.
pub type Result<T> = std::result::Result<T, MonitorError>;
