//! Wire types for tweets and the raw-event decoder.
//!
//! Field names follow the v1.1 tweet object, which is both what the filtered
//! stream emits and what the relay endpoint receives.

use {
    serde::{Deserialize, Serialize},
    tracing::debug,
};

use crate::error::{Error, Result};

/// A Twitter account as embedded in tweets.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TwitterUser {
    pub id: u64,
    #[serde(default)]
    pub screen_name: String,
}

/// The authenticated account the bot acts as.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BotIdentity {
    pub id: u64,
    pub screen_name: String,
}

impl BotIdentity {
    pub fn new(id: u64, screen_name: impl Into<String>) -> Self {
        Self {
            id,
            screen_name: screen_name.into(),
        }
    }

    /// The stream track keyword matching mentions of this account.
    pub fn mention_track(&self) -> String {
        format!("@{}", self.screen_name)
    }
}

impl From<TwitterUser> for BotIdentity {
    fn from(user: TwitterUser) -> Self {
        Self {
            id: user.id,
            screen_name: user.screen_name,
        }
    }
}

/// A mention delivered by the stream or the relay endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundEvent {
    /// Id of the mentioning tweet.
    #[serde(rename = "id")]
    pub post_id: u64,
    #[serde(default)]
    pub text: String,
    #[serde(rename = "user")]
    pub author: TwitterUser,
    #[serde(
        rename = "in_reply_to_status_id",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub reply_target_id: Option<u64>,
    #[serde(
        rename = "in_reply_to_user_id",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub reply_target_user_id: Option<u64>,
    #[serde(
        rename = "in_reply_to_screen_name",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub reply_target_screen_name: Option<String>,
}

/// The platform's handle for a created tweet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostedTweet {
    pub id: u64,
    #[serde(default)]
    pub text: String,
}

/// How a raw payload was delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadEncoding {
    /// One line of the filtered stream. May be a keep-alive or a control
    /// message (`delete`, `limit`, ...), which decode to `None`.
    Stream,
    /// A single tweet POSTed to the relay endpoint.
    Relay,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StreamMessage {
    Tweet(InboundEvent),
    Control(serde_json::Value),
}

/// Decode a raw payload into an [`InboundEvent`].
pub fn decode(encoding: PayloadEncoding, payload: &[u8]) -> Result<Option<InboundEvent>> {
    match encoding {
        PayloadEncoding::Stream => decode_stream_line(payload),
        PayloadEncoding::Relay => {
            let event: InboundEvent = serde_json::from_slice(payload)?;
            Ok(Some(event))
        },
    }
}

fn decode_stream_line(line: &[u8]) -> Result<Option<InboundEvent>> {
    if line.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }

    match serde_json::from_slice::<StreamMessage>(line)? {
        StreamMessage::Tweet(event) => Ok(Some(event)),
        StreamMessage::Control(value) => {
            let kind = value
                .as_object()
                .and_then(|o| o.keys().next().cloned())
                .ok_or_else(|| Error::stream("unexpected non-object stream message"))?;
            debug!(kind, "skipping stream control message");
            Ok(None)
        },
    }
}
