//! Ordered middleware chain ending in a terminal [`TurnHandler`].

use std::sync::Arc;

use {
    async_trait::async_trait,
    tracing::{Instrument, debug, info_span, warn},
};

use crate::{
    activity::Activity,
    turn::{ChannelAdapter, TurnContext, TurnHandler},
};

/// A turn-scoped step that runs before the terminal handler.
///
/// Call `next.run(ctx)` to continue the chain; returning without calling it
/// short-circuits the turn.
#[async_trait]
pub trait Middleware: Send + Sync {
    async fn on_turn(&self, ctx: &mut TurnContext, next: Next<'_>) -> anyhow::Result<()>;
}

/// Hook invoked when a turn fails, before the error reaches the caller.
#[async_trait]
pub trait TurnErrorHandler: Send + Sync {
    async fn on_turn_error(&self, ctx: &mut TurnContext, error: &anyhow::Error);
}

/// Remainder of the pipeline after the current middleware.
pub struct Next<'a> {
    middleware: &'a [Arc<dyn Middleware>],
    handler: &'a dyn TurnHandler,
}

impl Next<'_> {
    pub async fn run(self, ctx: &mut TurnContext) -> anyhow::Result<()> {
        match self.middleware.split_first() {
            Some((current, rest)) => {
                current
                    .on_turn(ctx, Next {
                        middleware: rest,
                        handler: self.handler,
                    })
                    .await
            },
            None => self.handler.on_turn(ctx).await,
        }
    }
}

/// Middleware set plus optional error hook. Holds no per-turn state, so one
/// pipeline can run any number of turns concurrently.
#[derive(Clone, Default)]
pub struct Pipeline {
    middleware: Vec<Arc<dyn Middleware>>,
    on_error: Option<Arc<dyn TurnErrorHandler>>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_middleware(mut self, middleware: Arc<dyn Middleware>) -> Self {
        self.middleware.push(middleware);
        self
    }

    pub fn with_error_handler(mut self, handler: Arc<dyn TurnErrorHandler>) -> Self {
        self.on_error = Some(handler);
        self
    }

    pub fn middleware_count(&self) -> usize {
        self.middleware.len()
    }

    /// Run one turn for `activity`.
    ///
    /// Errors raised anywhere in the chain are passed to the error hook and
    /// then returned; the caller decides whether to swallow them.
    pub async fn run_turn(
        &self,
        adapter: Arc<dyn ChannelAdapter>,
        activity: Activity,
        handler: &dyn TurnHandler,
    ) -> anyhow::Result<()> {
        let span = info_span!(
            "turn",
            channel_id = %activity.channel_id,
            conversation_id = %activity.conversation.id,
            activity_type = %activity.activity_type,
        );

        async move {
            let mut ctx = TurnContext::new(adapter, activity);
            let result = Next {
                middleware: &self.middleware,
                handler,
            }
            .run(&mut ctx)
            .await;

            match &result {
                Ok(()) => debug!(responded = ctx.responded(), "turn completed"),
                Err(error) => {
                    warn!(error = %error, "turn failed");
                    if let Some(hook) = &self.on_error {
                        hook.on_turn_error(&mut ctx, error).await;
                    }
                },
            }
            result
        }
        .instrument(span)
        .await
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use std::sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    };

    use {
        super::*,
        crate::{
            Error, Result,
            activity::{ChannelAccount, ConversationAccount, ConversationReference, ResourceResponse},
        },
    };

    #[derive(Default)]
    struct RecordingAdapter {
        sent: Mutex<Vec<Activity>>,
    }

    #[async_trait]
    impl ChannelAdapter for RecordingAdapter {
        async fn send_activities(
            &self,
            _ctx: &TurnContext,
            activities: &[Activity],
        ) -> Result<Vec<ResourceResponse>> {
            let mut sent = self.sent.lock().unwrap();
            sent.extend(activities.iter().cloned());
            Ok(activities
                .iter()
                .map(|a| ResourceResponse::new(a.id.clone().unwrap_or_default()))
                .collect())
        }

        async fn update_activity(
            &self,
            _ctx: &TurnContext,
            _activity: &Activity,
        ) -> Result<ResourceResponse> {
            Err(Error::unsupported("update_activity"))
        }

        async fn delete_activity(
            &self,
            _ctx: &TurnContext,
            _reference: &ConversationReference,
        ) -> Result<()> {
            Err(Error::unsupported("delete_activity"))
        }
    }

    struct Tag {
        name: &'static str,
        log: Arc<Mutex<Vec<&'static str>>>,
        call_next: bool,
    }

    #[async_trait]
    impl Middleware for Tag {
        async fn on_turn(&self, ctx: &mut TurnContext, next: Next<'_>) -> anyhow::Result<()> {
            self.log.lock().unwrap().push(self.name);
            if self.call_next {
                next.run(ctx).await?;
            }
            Ok(())
        }
    }

    struct Echo {
        log: Arc<Mutex<Vec<&'static str>>>,
    }

    #[async_trait]
    impl TurnHandler for Echo {
        async fn on_turn(&self, ctx: &mut TurnContext) -> anyhow::Result<()> {
            self.log.lock().unwrap().push("handler");
            let text = ctx.activity().text.clone();
            ctx.send_activity(Activity::message(text)).await?;
            Ok(())
        }
    }

    struct Failing;

    #[async_trait]
    impl TurnHandler for Failing {
        async fn on_turn(&self, _ctx: &mut TurnContext) -> anyhow::Result<()> {
            anyhow::bail!("boom")
        }
    }

    #[derive(Default)]
    struct CountingHook {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl TurnErrorHandler for CountingHook {
        async fn on_turn_error(&self, _ctx: &mut TurnContext, error: &anyhow::Error) {
            assert_eq!(error.to_string(), "boom");
            self.calls.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn inbound() -> Activity {
        Activity {
            id: Some("1001".into()),
            text: "hello".into(),
            from: ChannelAccount::new("7", "alice"),
            conversation: ConversationAccount::new("1001"),
            channel_id: "test".into(),
            ..Activity::message("")
        }
    }

    #[tokio::test]
    async fn middleware_runs_in_order_before_handler() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let pipeline = Pipeline::new()
            .with_middleware(Arc::new(Tag {
                name: "first",
                log: Arc::clone(&log),
                call_next: true,
            }))
            .with_middleware(Arc::new(Tag {
                name: "second",
                log: Arc::clone(&log),
                call_next: true,
            }));
        let adapter = Arc::new(RecordingAdapter::default());
        let handler = Echo {
            log: Arc::clone(&log),
        };

        pipeline
            .run_turn(adapter.clone(), inbound(), &handler)
            .await
            .unwrap();

        assert_eq!(*log.lock().unwrap(), vec!["first", "second", "handler"]);
        assert_eq!(adapter.sent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn middleware_can_short_circuit() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let pipeline = Pipeline::new().with_middleware(Arc::new(Tag {
            name: "gate",
            log: Arc::clone(&log),
            call_next: false,
        }));
        let adapter = Arc::new(RecordingAdapter::default());
        let handler = Echo {
            log: Arc::clone(&log),
        };

        pipeline
            .run_turn(adapter.clone(), inbound(), &handler)
            .await
            .unwrap();

        assert_eq!(*log.lock().unwrap(), vec!["gate"]);
        assert!(adapter.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn error_hook_runs_and_error_propagates() {
        let hook = Arc::new(CountingHook::default());
        let pipeline = Pipeline::new().with_error_handler(hook.clone());
        let adapter = Arc::new(RecordingAdapter::default());

        let err = pipeline
            .run_turn(adapter, inbound(), &Failing)
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "boom");
        assert_eq!(hook.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn sent_activities_inherit_routing_but_not_addressing() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let adapter = Arc::new(RecordingAdapter::default());

        Pipeline::new()
            .run_turn(adapter.clone(), inbound(), &Echo { log })
            .await
            .unwrap();

        let sent = adapter.sent.lock().unwrap();
        assert_eq!(sent[0].conversation.id, "1001");
        assert_eq!(sent[0].channel_id, "test");
        assert_eq!(sent[0].reply_to_id.as_deref(), Some("1001"));
        assert!(sent[0].recipient.is_empty());
    }

    #[tokio::test]
    async fn update_and_delete_surface_adapter_errors() {
        let adapter: Arc<dyn ChannelAdapter> = Arc::new(RecordingAdapter::default());
        let ctx = TurnContext::new(adapter, inbound());

        let update = ctx.update_activity(&Activity::message("x")).await;
        assert!(update.unwrap_err().is_unsupported());

        let reference = ctx.activity().conversation_reference();
        let delete = ctx.delete_activity(&reference).await;
        assert!(delete.unwrap_err().is_unsupported());
    }
}
