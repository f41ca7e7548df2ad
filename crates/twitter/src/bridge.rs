//! Wiring between the stream session, the turn pipeline and the adapter.

use std::sync::Arc;

use {
    chirp_channels::{ChannelAdapter, Pipeline, TurnHandler},
    tokio::task::JoinHandle,
    tracing::{debug, error, info, warn},
};

use crate::{
    adapter::TwitterAdapter,
    api::TwitterApi,
    config::TwitterAccountConfig,
    inbound::{MentionNormalizer, is_addressed_to_bot, is_self_authored},
    outbound::{HttpMediaFetcher, MediaFetcher, TwitterOutbound},
    relay::{RelayClient, RelayOutcome},
    session::{RetryPolicy, SessionStatus, StreamSession, StreamTransport, retry_policy_from_config},
    tweet::{self, BotIdentity, InboundEvent, PayloadEncoding},
};

/// One bot account bridged to a turn pipeline.
pub struct TwitterBridge {
    identity: BotIdentity,
    normalizer: MentionNormalizer,
    api: Arc<dyn TwitterApi>,
    transport: Arc<dyn StreamTransport>,
    adapter: Arc<TwitterAdapter>,
    pipeline: Pipeline,
    handler: Arc<dyn TurnHandler>,
    session: StreamSession,
    relay: Option<RelayClient>,
}

impl TwitterBridge {
    pub fn new(
        identity: BotIdentity,
        config: &TwitterAccountConfig,
        api: Arc<dyn TwitterApi>,
        transport: Arc<dyn StreamTransport>,
        handler: Arc<dyn TurnHandler>,
    ) -> Self {
        let media: Arc<dyn MediaFetcher> = Arc::new(HttpMediaFetcher::default());
        let adapter = Arc::new(TwitterAdapter::new(TwitterOutbound::new(
            Arc::clone(&api),
            media,
            identity.clone(),
        )));
        let session = StreamSession::new(
            identity.mention_track(),
            Arc::clone(&transport),
            retry_policy_from_config(&config.retry),
        );
        let relay = config
            .relay_url
            .as_deref()
            .filter(|url| !url.is_empty())
            .map(|url| RelayClient::new(reqwest::Client::new(), url));

        Self {
            normalizer: MentionNormalizer::from_config(identity.clone(), config),
            identity,
            api,
            transport,
            adapter,
            pipeline: Pipeline::new(),
            handler,
            session,
            relay,
        }
    }

    pub fn with_pipeline(mut self, pipeline: Pipeline) -> Self {
        self.pipeline = pipeline;
        self
    }

    pub fn with_media_fetcher(mut self, media: Arc<dyn MediaFetcher>) -> Self {
        self.adapter = Arc::new(TwitterAdapter::new(TwitterOutbound::new(
            Arc::clone(&self.api),
            media,
            self.identity.clone(),
        )));
        self
    }

    /// Replace the reconnection policy. Must be called before [`start`](Self::start).
    pub fn with_retry_policy(mut self, retry: Arc<dyn RetryPolicy>) -> Self {
        self.session = StreamSession::new(
            self.identity.mention_track(),
            Arc::clone(&self.transport),
            retry,
        );
        self
    }

    pub fn with_relay(mut self, relay: Option<RelayClient>) -> Self {
        self.relay = relay;
        self
    }

    pub fn identity(&self) -> &BotIdentity {
        &self.identity
    }

    pub fn status(&self) -> SessionStatus {
        self.session.status()
    }

    pub fn is_ready(&self) -> bool {
        self.session.is_ready()
    }

    /// Start streaming mentions and dispatching them. Returns `false` when the
    /// stream was already running.
    pub fn start(self: &Arc<Self>) -> bool {
        let Some(mut events) = self.session.start_stream() else {
            return false;
        };

        let bridge = Arc::downgrade(self);
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                let Some(bridge) = bridge.upgrade() else {
                    break;
                };
                bridge.on_mention(event);
            }
            debug!("twitter mention consumer exited");
        });

        info!(
            bot = %self.identity.screen_name,
            relay = ?self.relay.as_ref().map(RelayClient::url),
            "twitter bridge started"
        );
        true
    }

    pub fn stop(&self) {
        self.session.stop_stream();
    }

    /// Handle one inbound mention without blocking the caller.
    ///
    /// Self-authored tweets are dropped. Otherwise the event is forwarded to
    /// the relay when one is configured, or a turn is spawned locally. Errors
    /// are logged here and never reach the stream loop.
    pub fn on_mention(self: &Arc<Self>, event: InboundEvent) -> Option<JoinHandle<()>> {
        if is_self_authored(&event, &self.identity) {
            debug!(tweet_id = event.post_id, "skip, tweet is created by bot");
            return None;
        }

        if let Some(relay) = self.relay.clone() {
            return Some(tokio::spawn(async move {
                if let Err(e) = relay.forward(&event).await {
                    warn!(tweet_id = event.post_id, error = %e, "failed to relay twitter mention");
                }
            }));
        }

        let activity = self.normalizer.normalize(&event)?;
        let bridge = Arc::clone(self);
        Some(tokio::spawn(async move {
            if let Err(e) = bridge.run_turn(activity).await {
                error!(tweet_id = event.post_id, error = %e, "twitter turn failed");
            }
        }))
    }

    /// Run one turn through the pipeline with the Twitter adapter.
    pub async fn run_turn(&self, activity: chirp_channels::Activity) -> anyhow::Result<()> {
        let adapter: Arc<dyn ChannelAdapter> = self.adapter.clone();
        self.pipeline
            .run_turn(adapter, activity, self.handler.as_ref())
            .await
    }

    /// Handle a tweet POSTed to the relay endpoint and run its turn to
    /// completion.
    pub async fn process_relayed(&self, body: &[u8]) -> RelayOutcome {
        let event = match tweet::decode(PayloadEncoding::Relay, body) {
            Ok(Some(event)) => event,
            Ok(None) => return RelayOutcome::Rejected("empty payload".into()),
            Err(e) => return RelayOutcome::Rejected(format!("invalid tweet payload: {e}")),
        };

        if is_self_authored(&event, &self.identity) {
            debug!(tweet_id = event.post_id, "skip, tweet is created by bot");
            return RelayOutcome::Skipped;
        }
        if !is_addressed_to_bot(&event, &self.identity) {
            debug!(tweet_id = event.post_id, "relayed tweet is not addressed to bot");
            return RelayOutcome::Rejected("tweet is not addressed to this bot".into());
        }

        let Some(activity) = self.normalizer.normalize(&event) else {
            return RelayOutcome::Skipped;
        };
        match self.run_turn(activity).await {
            Ok(()) => RelayOutcome::Processed,
            Err(e) => RelayOutcome::Failed(e.to_string()),
        }
    }
}
