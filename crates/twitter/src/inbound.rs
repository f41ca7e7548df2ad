//! Mention → activity normalization.

use {
    chirp_channels::{Activity, ActivityType, ChannelAccount, ConversationAccount},
    tracing::debug,
};

use crate::{
    config::TwitterAccountConfig,
    tweet::{BotIdentity, InboundEvent},
};

/// The bot wrote this tweet itself. Such events must never start a turn.
pub fn is_self_authored(event: &InboundEvent, identity: &BotIdentity) -> bool {
    event.author.id == identity.id
}

/// The tweet is a direct reply to one of the bot's tweets.
pub fn is_addressed_to_bot(event: &InboundEvent, identity: &BotIdentity) -> bool {
    event.reply_target_user_id == Some(identity.id)
}

/// Turns inbound mentions into channel-agnostic activities.
#[derive(Debug, Clone)]
pub struct MentionNormalizer {
    identity: BotIdentity,
    channel_id: String,
    service_url: String,
}

impl MentionNormalizer {
    pub fn new(
        identity: BotIdentity,
        channel_id: impl Into<String>,
        service_url: impl Into<String>,
    ) -> Self {
        Self {
            identity,
            channel_id: channel_id.into(),
            service_url: service_url.into(),
        }
    }

    pub fn from_config(identity: BotIdentity, config: &TwitterAccountConfig) -> Self {
        Self::new(identity, &config.channel_id, &config.service_url)
    }

    pub fn identity(&self) -> &BotIdentity {
        &self.identity
    }

    /// Build the activity for `event`, or `None` when the bot authored it.
    ///
    /// The conversation id is the mentioning tweet's id so that replies thread
    /// under it. The recipient is the account being replied to, which is empty
    /// for top-level mentions.
    pub fn normalize(&self, event: &InboundEvent) -> Option<Activity> {
        if is_self_authored(event, &self.identity) {
            debug!(tweet_id = event.post_id, "skip, tweet is created by bot");
            return None;
        }

        let post_id = event.post_id.to_string();
        let recipient = match event.reply_target_user_id {
            Some(id) => ChannelAccount {
                id: id.to_string(),
                name: event.reply_target_screen_name.clone(),
            },
            None => ChannelAccount::default(),
        };

        Some(Activity {
            activity_type: ActivityType::Message,
            id: Some(post_id.clone()),
            text: event.text.clone(),
            from: ChannelAccount::new(event.author.id.to_string(), &event.author.screen_name),
            recipient,
            conversation: ConversationAccount::new(post_id),
            channel_id: self.channel_id.clone(),
            service_url: Some(self.service_url.clone()),
            attachments: Vec::new(),
            reply_to_id: None,
        })
    }
}
