use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// A required credential or setting is missing. Fatal at startup.
    #[error("twitter configuration error: {message}")]
    Configuration { message: String },

    /// The Twitter API rejected a request (rate limit, duplicate status, ...).
    #[error("twitter api returned {status}: {body}")]
    Api { status: u16, body: String },

    /// A reply could not be posted because one of its inputs failed.
    #[error("twitter post failed: {context}: {source}")]
    PostFailed {
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The relay endpoint answered with a non-success status.
    #[error("relay endpoint rejected event with status {status}")]
    RelayRejected { status: u16 },

    /// The filtered stream broke or could not be decoded.
    #[error("twitter stream error: {message}")]
    Stream { message: String },

    #[error(transparent)]
    Reqwest(#[from] reqwest::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Channel(#[from] chirp_channels::Error),
}

impl Error {
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn stream(message: impl Into<String>) -> Self {
        Self::Stream {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn post_failed(
        context: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::PostFailed {
            context: context.into(),
            source: Box::new(source),
        }
    }

    /// HTTP status attached to this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } | Self::RelayRejected { status } => Some(*status),
            Self::Reqwest(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
