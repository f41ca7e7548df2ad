use std::sync::Arc;

use {chirp_channels::TurnHandler, tracing::info};

use crate::{
    api::{TwitterApi, TwitterClient},
    bridge::TwitterBridge,
    config::TwitterAccountConfig,
    error::Result,
};

/// Validate credentials, resolve the bot account and build its bridge.
///
/// Missing consumer credentials fail with [`Error::Configuration`](crate::Error::Configuration)
/// before any request is made. The stream is not started.
pub async fn connect(
    config: &TwitterAccountConfig,
    handler: Arc<dyn TurnHandler>,
) -> Result<TwitterBridge> {
    let client = Arc::new(TwitterClient::new(config)?);
    let identity = client.verify_credentials().await?;

    info!(
        bot_id = identity.id,
        screen_name = %identity.screen_name,
        relay = config.relay_url.is_some(),
        "twitter bot connected"
    );

    Ok(TwitterBridge::new(
        identity,
        config,
        client.clone(),
        client,
        handler,
    ))
}
