//! Twitter channel for chirp.
//!
//! Listens for `@mentions` on the filtered stream, turns them into
//! [`chirp_channels::Activity`] values, runs them through a turn pipeline, and
//! publishes replies as threaded tweets. Optionally relays mentions over HTTP
//! to a separate process that owns the pipeline.

pub mod adapter;
pub mod api;
pub mod auth;
pub mod bot;
pub mod bridge;
pub mod config;
pub mod error;
pub mod inbound;
pub mod outbound;
pub mod relay;
pub mod session;
pub mod tweet;

pub use {
    adapter::TwitterAdapter,
    api::{TwitterApi, TwitterClient},
    bot::connect,
    bridge::TwitterBridge,
    config::{RetryConfig, TwitterAccountConfig, TwitterCredentials},
    error::{Error, Result},
    relay::{RelayClient, RelayOutcome, relay_router},
    session::{SessionStatus, StreamSession},
    tweet::{BotIdentity, InboundEvent},
};
