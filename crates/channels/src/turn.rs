use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    Result,
    activity::{Activity, ConversationReference, ResourceResponse},
};

/// Transport side of a channel: delivers activities produced during a turn.
#[async_trait]
pub trait ChannelAdapter: Send + Sync {
    /// Deliver `activities` and return one acknowledgment per input, in order.
    async fn send_activities(
        &self,
        ctx: &TurnContext,
        activities: &[Activity],
    ) -> Result<Vec<ResourceResponse>>;

    /// Replace a previously sent activity.
    async fn update_activity(
        &self,
        ctx: &TurnContext,
        activity: &Activity,
    ) -> Result<ResourceResponse>;

    /// Remove a previously sent activity.
    async fn delete_activity(
        &self,
        ctx: &TurnContext,
        reference: &ConversationReference,
    ) -> Result<()>;
}

/// Terminal handler of the turn pipeline (the bot itself).
#[async_trait]
pub trait TurnHandler: Send + Sync {
    async fn on_turn(&self, ctx: &mut TurnContext) -> anyhow::Result<()>;
}

/// State scoped to exactly one inbound activity.
///
/// Created by [`Pipeline::run_turn`](crate::Pipeline::run_turn) and dropped
/// when the turn finishes, whatever the outcome.
pub struct TurnContext {
    adapter: Arc<dyn ChannelAdapter>,
    activity: Activity,
    responded: bool,
}

impl TurnContext {
    pub fn new(adapter: Arc<dyn ChannelAdapter>, activity: Activity) -> Self {
        Self {
            adapter,
            activity,
            responded: false,
        }
    }

    /// The inbound activity that started this turn.
    pub fn activity(&self) -> &Activity {
        &self.activity
    }

    /// Whether at least one activity was sent during this turn.
    pub fn responded(&self) -> bool {
        self.responded
    }

    pub async fn send_activity(&mut self, activity: Activity) -> Result<ResourceResponse> {
        let mut responses = self.send_activities(vec![activity]).await?;
        Ok(responses.pop().unwrap_or_default())
    }

    pub async fn send_activities(
        &mut self,
        activities: Vec<Activity>,
    ) -> Result<Vec<ResourceResponse>> {
        if activities.is_empty() {
            return Ok(Vec::new());
        }
        let activities: Vec<Activity> = activities
            .into_iter()
            .map(|activity| self.apply_routing(activity))
            .collect();

        let adapter = Arc::clone(&self.adapter);
        let responses = adapter.send_activities(self, &activities).await?;
        self.responded = true;
        Ok(responses)
    }

    pub async fn update_activity(&self, activity: &Activity) -> Result<ResourceResponse> {
        self.adapter.update_activity(self, activity).await
    }

    pub async fn delete_activity(&self, reference: &ConversationReference) -> Result<()> {
        self.adapter.delete_activity(self, reference).await
    }

    /// Fill routing fields the handler left empty from the inbound activity.
    /// Addressing (`from`/`recipient`) is left to the handler.
    fn apply_routing(&self, mut activity: Activity) -> Activity {
        let inbound = &self.activity;
        if activity.conversation.id.is_empty() {
            activity.conversation = inbound.conversation.clone();
        }
        if activity.channel_id.is_empty() {
            activity.channel_id = inbound.channel_id.clone();
        }
        if activity.service_url.is_none() {
            activity.service_url = inbound.service_url.clone();
        }
        if activity.reply_to_id.is_none() {
            activity.reply_to_id = inbound.id.clone();
        }
        activity
    }
}

impl std::fmt::Debug for TurnContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TurnContext")
            .field("activity", &self.activity)
            .field("responded", &self.responded)
            .finish_non_exhaustive()
    }
}
