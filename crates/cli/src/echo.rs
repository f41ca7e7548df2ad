//! Built-in bot: echoes each mention back to its author.

use {
    async_trait::async_trait,
    chirp_channels::{Middleware, Next, TurnContext, TurnErrorHandler, TurnHandler},
    tracing::{info, warn},
};

/// Replies with the mention text, minus leading `@handles`.
pub struct EchoBot;

/// Strip the leading run of `@handle` words.
fn strip_mentions(text: &str) -> &str {
    let mut rest = text.trim_start();
    while rest.starts_with('@') {
        rest = rest
            .split_once(char::is_whitespace)
            .map_or("", |(_, tail)| tail)
            .trim_start();
    }
    rest.trim_end()
}

#[async_trait]
impl TurnHandler for EchoBot {
    async fn on_turn(&self, ctx: &mut TurnContext) -> anyhow::Result<()> {
        let activity = ctx.activity();
        if !activity.is_message() {
            return Ok(());
        }

        let said = strip_mentions(&activity.text);
        let text = if said.is_empty() {
            "You said nothing.".to_string()
        } else {
            format!("You said: {said}")
        };
        let reply = activity.create_reply(text);
        ctx.send_activity(reply).await?;
        Ok(())
    }
}

/// Logs every turn with its sender and outcome.
pub struct TurnLogger;

#[async_trait]
impl Middleware for TurnLogger {
    async fn on_turn(&self, ctx: &mut TurnContext, next: Next<'_>) -> anyhow::Result<()> {
        let from = ctx.activity().from.name.clone().unwrap_or_default();
        info!(from = %from, text = %ctx.activity().text, "mention received");
        next.run(ctx).await?;
        info!(from = %from, responded = ctx.responded(), "mention handled");
        Ok(())
    }
}

/// Logs failed turns.
pub struct LogTurnError;

#[async_trait]
impl TurnErrorHandler for LogTurnError {
    async fn on_turn_error(&self, ctx: &mut TurnContext, error: &anyhow::Error) {
        warn!(
            conversation_id = %ctx.activity().conversation.id,
            error = %error,
            "turn error"
        );
    }
}
