//! HTTP relay between the stream-owning process and the pipeline-owning one.

use std::sync::Arc;

use {
    axum::{
        Router,
        body::Bytes,
        extract::State,
        http::StatusCode,
        response::{IntoResponse, Response},
        routing::post,
    },
    tracing::{debug, warn},
};

use crate::{
    bridge::TwitterBridge,
    error::{Error, Result},
    tweet::InboundEvent,
};

/// Forwards inbound events to a relay endpoint.
#[derive(Debug, Clone)]
pub struct RelayClient {
    http: reqwest::Client,
    url: String,
}

impl RelayClient {
    pub fn new(http: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            http,
            url: url.into(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// POST `event` as a JSON tweet. Any status outside 2xx/3xx is a failure.
    pub async fn forward(&self, event: &InboundEvent) -> Result<()> {
        let resp = self.http.post(&self.url).json(event).send().await?;
        let status = resp.status();
        if status.is_success() || status.is_redirection() {
            debug!(tweet_id = event.post_id, status = status.as_u16(), "relayed mention");
            return Ok(());
        }
        Err(Error::RelayRejected {
            status: status.as_u16(),
        })
    }
}

/// Result of handling one relayed payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayOutcome {
    /// A turn ran to completion.
    Processed,
    /// The bot authored the tweet; nothing to do.
    Skipped,
    /// Malformed payload or not addressed to the bot.
    Rejected(String),
    /// The turn pipeline failed.
    Failed(String),
}

impl RelayOutcome {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Processed | Self::Skipped => StatusCode::NO_CONTENT,
            Self::Rejected(_) => StatusCode::BAD_REQUEST,
            Self::Failed(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for RelayOutcome {
    fn into_response(self) -> Response {
        let status = self.status_code();
        match self {
            Self::Processed | Self::Skipped => status.into_response(),
            Self::Rejected(message) | Self::Failed(message) => (status, message).into_response(),
        }
    }
}

/// Relay endpoint serving `POST /` and `POST /api/messages`.
pub fn relay_router(bridge: Arc<TwitterBridge>) -> Router {
    Router::new()
        .route("/", post(relay_handler))
        .route("/api/messages", post(relay_handler))
        .with_state(bridge)
}

async fn relay_handler(State(bridge): State<Arc<TwitterBridge>>, body: Bytes) -> RelayOutcome {
    let outcome = bridge.process_relayed(&body).await;
    if let RelayOutcome::Failed(message) = &outcome {
        warn!(error = %message, "relayed turn failed");
    }
    outcome
}
