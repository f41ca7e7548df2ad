use {
    async_trait::async_trait,
    chirp_channels::{
        Activity, ChannelAdapter, ConversationReference, Error as ChannelError, ResourceResponse,
        Result as ChannelResult, TurnContext,
    },
    tracing::debug,
};

use crate::outbound::{OutboundReply, TwitterOutbound};

/// [`ChannelAdapter`] that publishes outgoing messages as threaded tweets.
///
/// Tweets cannot be edited and deleting is not exposed, so update and delete
/// report `Unsupported`.
#[derive(Clone)]
pub struct TwitterAdapter {
    outbound: TwitterOutbound,
}

impl TwitterAdapter {
    pub fn new(outbound: TwitterOutbound) -> Self {
        Self { outbound }
    }
}

#[async_trait]
impl ChannelAdapter for TwitterAdapter {
    async fn send_activities(
        &self,
        _ctx: &TurnContext,
        activities: &[Activity],
    ) -> ChannelResult<Vec<ResourceResponse>> {
        let mut responses = Vec::with_capacity(activities.len());
        for activity in activities {
            if activity.is_message() {
                let reply = OutboundReply::from_activity(activity)?;
                let posted = self
                    .outbound
                    .format_and_post(&reply)
                    .await
                    .map_err(|e| ChannelError::external("post twitter reply", e))?;
                debug!(tweet_id = posted.id, in_reply_to = reply.in_reply_to, "sent reply");
            } else {
                debug!(activity_type = %activity.activity_type, "not posting non-message activity");
            }
            responses.push(ResourceResponse::new(activity.id.clone().unwrap_or_default()));
        }
        Ok(responses)
    }

    async fn update_activity(
        &self,
        _ctx: &TurnContext,
        _activity: &Activity,
    ) -> ChannelResult<ResourceResponse> {
        Err(ChannelError::unsupported("update_activity"))
    }

    async fn delete_activity(
        &self,
        _ctx: &TurnContext,
        _reference: &ConversationReference,
    ) -> ChannelResult<()> {
        Err(ChannelError::unsupported("delete_activity"))
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use {
        super::*,
        crate::{
            outbound::tests::{EchoFetcher, RecordingApi},
            tweet::BotIdentity,
        },
        chirp_channels::{ActivityType, ChannelAccount, ConversationAccount},
    };

    fn adapter(api: Arc<RecordingApi>) -> Arc<TwitterAdapter> {
        Arc::new(TwitterAdapter::new(TwitterOutbound::new(
            api,
            Arc::new(EchoFetcher::default()),
            BotIdentity::new(99, "chirpbot"),
        )))
    }

    fn inbound() -> Activity {
        Activity {
            id: Some("1001".into()),
            text: "@chirpbot hello".into(),
            from: ChannelAccount::new("7", "alice"),
            recipient: ChannelAccount::new("99", "chirpbot"),
            conversation: ConversationAccount::new("1001"),
            channel_id: "twitter_conversation".into(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn posts_messages_and_acknowledges_everything() {
        let api = Arc::new(RecordingApi::default());
        let adapter = adapter(Arc::clone(&api));
        let ctx = TurnContext::new(adapter.clone(), inbound());

        let reply = Activity {
            id: Some("out-1".into()),
            recipient: ChannelAccount::new("7", "alice"),
            conversation: ConversationAccount::new("1001"),
            ..Activity::message("hi")
        };
        let typing = Activity {
            activity_type: ActivityType::Typing,
            id: Some("out-2".into()),
            ..Default::default()
        };

        let responses = adapter
            .send_activities(&ctx, &[reply, typing])
            .await
            .unwrap();

        assert_eq!(responses, vec![
            ResourceResponse::new("out-1"),
            ResourceResponse::new("out-2"),
        ]);
        let published = api.published.lock().unwrap();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].status, "@alice hi");
        assert_eq!(published[0].in_reply_to, 1001);
    }

    #[tokio::test]
    async fn unparsable_conversation_is_rejected_before_posting() {
        let api = Arc::new(RecordingApi::default());
        let adapter = adapter(Arc::clone(&api));
        let ctx = TurnContext::new(adapter.clone(), inbound());

        let err = adapter
            .send_activities(&ctx, &[Activity {
                conversation: ConversationAccount::new("not-a-tweet"),
                ..Activity::message("hi")
            }])
            .await
            .unwrap_err();

        assert!(matches!(err, ChannelError::InvalidInput { .. }));
        assert!(api.published.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn platform_failure_is_wrapped() {
        let api = Arc::new(RecordingApi {
            fail_with: Some(429),
            ..Default::default()
        });
        let adapter = adapter(api);
        let ctx = TurnContext::new(adapter.clone(), inbound());

        let err = adapter
            .send_activities(&ctx, &[inbound().create_reply("hi")])
            .await
            .unwrap_err();
        assert!(matches!(err, ChannelError::External { .. }));
    }

    #[tokio::test]
    async fn update_and_delete_are_unsupported() {
        let adapter = adapter(Arc::new(RecordingApi::default()));
        let ctx = TurnContext::new(adapter.clone(), inbound());

        assert!(ctx.update_activity(&inbound()).await.unwrap_err().is_unsupported());
        assert!(
            ctx.delete_activity(&inbound().conversation_reference())
                .await
                .unwrap_err()
                .is_unsupported()
        );
    }
}
