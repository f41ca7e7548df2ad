use {
    secrecy::{ExposeSecret, Secret},
    serde::{Deserialize, Serialize},
};

/// Channel tag stamped on every activity produced by this adapter.
pub const DEFAULT_CHANNEL_ID: &str = "twitter_conversation";

/// Service URL stamped on inbound activities (Direct Line conversation continuation).
pub const DEFAULT_SERVICE_URL: &str = "https://directline.botframework.com/";

/// Twitter application and user credentials.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TwitterCredentials {
    /// Application consumer key. Required.
    pub consumer_key: String,

    /// Application consumer secret. Required.
    #[serde(serialize_with = "serialize_secret")]
    pub consumer_secret: Secret<String>,

    /// Pre-issued app-only bearer token.
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_option_secret"
    )]
    pub bearer_token: Option<Secret<String>>,

    /// User access token. Together with `access_token_secret` selects
    /// user-context auth.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,

    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_option_secret"
    )]
    pub access_token_secret: Option<Secret<String>>,
}

impl TwitterCredentials {
    /// Both halves of the user access token are present and non-empty.
    pub fn has_user_token(&self) -> bool {
        self.access_token.as_deref().is_some_and(|t| !t.is_empty())
            && self
                .access_token_secret
                .as_ref()
                .is_some_and(|s| !s.expose_secret().is_empty())
    }
}

impl Default for TwitterCredentials {
    fn default() -> Self {
        Self {
            consumer_key: String::new(),
            consumer_secret: Secret::new(String::new()),
            bearer_token: None,
            access_token: None,
            access_token_secret: None,
        }
    }
}

impl std::fmt::Debug for TwitterCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TwitterCredentials")
            .field("consumer_key", &self.consumer_key)
            .field("consumer_secret", &"[REDACTED]")
            .field("bearer_token", &self.bearer_token.as_ref().map(|_| "[REDACTED]"))
            .field("access_token", &self.access_token)
            .field(
                "access_token_secret",
                &self.access_token_secret.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

/// Delay between stream reconnection attempts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RetryConfig {
    /// First delay after a failure. `0` retries immediately, forever.
    pub initial_delay_ms: u64,
    /// Upper bound for the doubling delay.
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: 1_000,
            max_delay_ms: 60_000,
        }
    }
}

/// Configuration for a single Twitter bot account.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TwitterAccountConfig {
    #[serde(flatten)]
    pub credentials: TwitterCredentials,

    /// When set, inbound mentions are POSTed here instead of being processed
    /// in this process.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relay_url: Option<String>,

    /// Channel tag for produced activities.
    pub channel_id: String,

    /// Service URL for produced activities.
    pub service_url: String,

    pub api_base_url: String,
    pub upload_base_url: String,
    pub stream_base_url: String,

    /// Stream reconnection policy.
    pub retry: RetryConfig,
}

impl std::fmt::Debug for TwitterAccountConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TwitterAccountConfig")
            .field("credentials", &self.credentials)
            .field("relay_url", &self.relay_url)
            .field("channel_id", &self.channel_id)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

impl Default for TwitterAccountConfig {
    fn default() -> Self {
        Self {
            credentials: TwitterCredentials::default(),
            relay_url: None,
            channel_id: DEFAULT_CHANNEL_ID.into(),
            service_url: DEFAULT_SERVICE_URL.into(),
            api_base_url: "https://api.twitter.com".into(),
            upload_base_url: "https://upload.twitter.com".into(),
            stream_base_url: "https://stream.twitter.com".into(),
            retry: RetryConfig::default(),
        }
    }
}

fn serialize_secret<S: serde::Serializer>(
    secret: &Secret<String>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(secret.expose_secret())
}

fn serialize_option_secret<S: serde::Serializer>(
    secret: &Option<Secret<String>>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match secret {
        Some(s) => serializer.serialize_some(s.expose_secret()),
        None => serializer.serialize_none(),
    }
}
