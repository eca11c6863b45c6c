use std::time::Duration;

/// Errors surfaced by providers, the conversation engine and configuration.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A cloud provider was selected without a credential.
    #[error("missing credential: {0}")]
    AuthMissing(String),

    /// The endpoint could not be reached at all.
    #[error("connection failed: {0}")]
    ConnectivityFailed(String),

    /// The wall-clock budget for a request ran out.
    #[error("request timed out after {}s", .0.as_secs_f64())]
    Timeout(Duration),

    /// The backend answered with a non-2xx status.
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// The response body did not have the expected shape.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// The on-device model or summarizer is not present.
    #[error("capability unavailable: {0}")]
    CapabilityUnavailable(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("page context error: {0}")]
    PageContext(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// HTTP status carried by the error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout(_))
    }
}
