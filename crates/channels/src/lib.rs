//! Channel-agnostic bot plumbing.
//!
//! Adapters for concrete platforms (Twitter, ...) normalize inbound events into
//! [`Activity`] values, run them through a [`Pipeline`] of middleware ending in
//! a [`TurnHandler`], and implement [`ChannelAdapter`] to deliver replies.

pub mod activity;
pub mod error;
pub mod pipeline;
pub mod turn;

pub use {
    activity::{
        Activity, ActivityType, Attachment, ChannelAccount, ConversationAccount,
        ConversationReference, ResourceResponse,
    },
    error::{Error, Result},
    pipeline::{Middleware, Next, Pipeline, TurnErrorHandler},
    turn::{ChannelAdapter, TurnContext, TurnHandler},
};
