use std::error::Error as StdError;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by [`ChannelAdapter`](crate::ChannelAdapter) operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The outgoing activity cannot be mapped onto the transport.
    #[error("invalid activity: {message}")]
    InvalidInput { message: String },

    /// The transport has no primitive for this operation.
    #[error("operation not supported by channel: {operation}")]
    Unsupported { operation: &'static str },

    /// The transport failed while delivering an activity.
    #[error("{context}: {source}")]
    External {
        context: String,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },
}

impl Error {
    #[must_use]
    pub fn invalid_input(message: impl std::fmt::Display) -> Self {
        Self::InvalidInput {
            message: message.to_string(),
        }
    }

    #[must_use]
    pub fn unsupported(operation: &'static str) -> Self {
        Self::Unsupported { operation }
    }

    #[must_use]
    pub fn external(
        context: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self::External {
            context: context.into(),
            source: Box::new(source),
        }
    }

    pub fn is_unsupported(&self) -> bool {
        matches!(self, Self::Unsupported { .. })
    }
}
