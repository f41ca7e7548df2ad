//! Channel-agnostic message model exchanged between adapters and the turn
//! pipeline.
//!
//! Field names follow the Bot Framework activity schema so activities can be
//! logged or relayed as JSON without a translation layer.

use serde::{Deserialize, Serialize};

/// Kind of an [`Activity`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ActivityType {
    #[default]
    Message,
    Typing,
    Event,
    EndOfConversation,
    /// Any type this crate does not model. Adapters filter these out.
    #[serde(other)]
    Unknown,
}

impl ActivityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Message => "message",
            Self::Typing => "typing",
            Self::Event => "event",
            Self::EndOfConversation => "endOfConversation",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for ActivityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A participant on a channel (user or bot).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelAccount {
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl ChannelAccount {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: Some(name.into()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.id.is_empty() && self.name.as_deref().is_none_or(str::is_empty)
    }
}

/// The conversation an activity belongs to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationAccount {
    #[serde(default)]
    pub id: String,
}

impl ConversationAccount {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

/// Media or file reference carried by an activity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub content_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
}

impl Attachment {
    pub fn from_url(content_url: impl Into<String>) -> Self {
        Self {
            content_url: content_url.into(),
            content_type: None,
        }
    }
}

/// One message (or other event) exchanged with a conversation surface.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    #[serde(rename = "type")]
    pub activity_type: ActivityType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub from: ChannelAccount,
    #[serde(default)]
    pub recipient: ChannelAccount,
    #[serde(default)]
    pub conversation: ConversationAccount,
    #[serde(default)]
    pub channel_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_url: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to_id: Option<String>,
}

impl Activity {
    /// A bare message activity. Routing fields are filled in when it is sent
    /// through a [`TurnContext`](crate::TurnContext).
    pub fn message(text: impl Into<String>) -> Self {
        Self {
            activity_type: ActivityType::Message,
            text: text.into(),
            ..Default::default()
        }
    }

    pub fn is_message(&self) -> bool {
        self.activity_type == ActivityType::Message
    }

    /// Build a reply addressed back to the sender of this activity.
    pub fn create_reply(&self, text: impl Into<String>) -> Self {
        Self {
            activity_type: ActivityType::Message,
            id: None,
            text: text.into(),
            from: self.recipient.clone(),
            recipient: self.from.clone(),
            conversation: self.conversation.clone(),
            channel_id: self.channel_id.clone(),
            service_url: self.service_url.clone(),
            attachments: Vec::new(),
            reply_to_id: self.id.clone().or_else(|| {
                Some(self.conversation.id.clone()).filter(|id| !id.is_empty())
            }),
        }
    }

    pub fn with_attachment(mut self, attachment: Attachment) -> Self {
        self.attachments.push(attachment);
        self
    }

    /// Routing information needed to address this conversation later.
    pub fn conversation_reference(&self) -> ConversationReference {
        ConversationReference {
            activity_id: self.id.clone(),
            user: self.from.clone(),
            bot: self.recipient.clone(),
            conversation: self.conversation.clone(),
            channel_id: self.channel_id.clone(),
            service_url: self.service_url.clone(),
        }
    }
}

/// Acknowledgment for a sent activity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceResponse {
    pub id: String,
}

impl ResourceResponse {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

/// Pointer to a specific conversation (and optionally an activity in it).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationReference {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activity_id: Option<String>,
    pub user: ChannelAccount,
    pub bot: ChannelAccount,
    pub conversation: ConversationAccount,
    pub channel_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_url: Option<String>,
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn inbound() -> Activity {
        Activity {
            activity_type: ActivityType::Message,
            id: Some("42".into()),
            text: "hello".into(),
            from: ChannelAccount::new("1", "alice"),
            recipient: ChannelAccount::new("2", "bot"),
            conversation: ConversationAccount::new("42"),
            channel_id: "twitter_conversation".into(),
            service_url: Some("https://example.invalid/".into()),
            ..Default::default()
        }
    }

    #[test]
    fn create_reply_swaps_participants() {
        let reply = inbound().create_reply("hi");
        assert_eq!(reply.text, "hi");
        assert_eq!(reply.from.name.as_deref(), Some("bot"));
        assert_eq!(reply.recipient.name.as_deref(), Some("alice"));
        assert_eq!(reply.conversation.id, "42");
        assert_eq!(reply.reply_to_id.as_deref(), Some("42"));
        assert!(reply.id.is_none());
    }

    #[test]
    fn serializes_with_bot_framework_names() {
        let json = serde_json::to_value(inbound()).unwrap();
        assert_eq!(json["type"], "message");
        assert_eq!(json["channelId"], "twitter_conversation");
        assert_eq!(json["serviceUrl"], "https://example.invalid/");
        assert_eq!(json["from"]["name"], "alice");
        assert!(json.get("attachments").is_none());
    }

    #[test]
    fn unknown_activity_type_deserializes() {
        let activity: Activity =
            serde_json::from_str(r#"{"type":"conversationUpdate","text":""}"#).unwrap();
        assert_eq!(activity.activity_type, ActivityType::Unknown);
        assert!(!activity.is_message());
    }

    #[test]
    fn empty_account_detection() {
        assert!(ChannelAccount::default().is_empty());
        assert!(
            ChannelAccount {
                id: String::new(),
                name: Some(String::new()),
            }
            .is_empty()
        );
        assert!(!ChannelAccount::new("1", "alice").is_empty());
    }
}
