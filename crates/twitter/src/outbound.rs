//! Reply formatting and publishing.
//!
//! A reply is `@handle ... text`, cut to [`MAX_TWEET_LEN`] characters, with
//! either a single video-like attachment or up to [`MAX_IMAGES`] images.

use std::sync::Arc;

use {
    async_trait::async_trait,
    bytes::Bytes,
    chirp_channels::Activity,
    tracing::{debug, warn},
};

use crate::{
    api::TwitterApi,
    error::{Error, Result},
    tweet::{BotIdentity, PostedTweet},
};

/// Classic tweet length limit, counted in characters.
pub const MAX_TWEET_LEN: usize = 140;

/// Most images a single tweet can carry.
pub const MAX_IMAGES: usize = 4;

const VIDEO_SUFFIXES: [&str; 4] = ["gif", "mp4", "mov", "avi"];

/// `@`-prefixed, space-separated handles to mention, in first-seen order.
/// Empty handles and the bot's own handle are dropped.
pub fn mention_prefix<S: AsRef<str>>(handles: &[S], self_handle: &str) -> String {
    let mut seen: Vec<&str> = Vec::new();
    for handle in handles {
        let handle = handle.as_ref().trim_start_matches('@');
        if handle.is_empty() || handle.eq_ignore_ascii_case(self_handle) || seen.contains(&handle)
        {
            continue;
        }
        seen.push(handle);
    }
    seen.iter()
        .map(|h| format!("@{h}"))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Up to `length` characters of `value` starting at character `start`.
/// Never fails: out-of-range bounds are clamped.
pub fn safe_substring(value: &str, start: usize, length: usize) -> String {
    value.chars().skip(start).take(length).collect()
}

/// Final status text: mention prefix, a space, then the reply text, cut to
/// [`MAX_TWEET_LEN`] characters.
pub fn compose_status<S: AsRef<str>>(handles: &[S], self_handle: &str, text: &str) -> String {
    let prefix = mention_prefix(handles, self_handle);
    let full = if prefix.is_empty() {
        text.to_string()
    } else {
        format!("{prefix} {text}")
    };
    safe_substring(&full, 0, MAX_TWEET_LEN)
}

/// The URL path ends with a video-like extension. Query and fragment are
/// ignored.
pub fn is_video_like(url: &str) -> bool {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let path = path.to_ascii_lowercase();
    VIDEO_SUFFIXES.iter().any(|suffix| path.ends_with(suffix))
}

/// Apply the media policy: when any URL is video-like only the first such
/// URL is kept, otherwise up to [`MAX_IMAGES`] URLs in input order.
pub fn select_media<S: AsRef<str>>(urls: &[S]) -> Vec<&str> {
    if let Some(video) = urls.iter().map(AsRef::as_ref).find(|url| is_video_like(url)) {
        return vec![video];
    }
    urls.iter().take(MAX_IMAGES).map(AsRef::as_ref).collect()
}

/// A reply extracted from an outgoing activity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutboundReply {
    pub text: String,
    pub media_urls: Vec<String>,
    /// Tweet to thread under.
    pub in_reply_to: u64,
    pub mention_handles: Vec<String>,
}

impl OutboundReply {
    /// The conversation id must be the numeric id of the tweet being replied
    /// to; the recipient's name is mentioned.
    pub fn from_activity(activity: &Activity) -> chirp_channels::Result<Self> {
        let in_reply_to = activity.conversation.id.parse::<u64>().map_err(|_| {
            chirp_channels::Error::invalid_input(format!(
                "conversation id is not a tweet id: {:?}",
                activity.conversation.id
            ))
        })?;

        Ok(Self {
            text: activity.text.clone(),
            media_urls: activity
                .attachments
                .iter()
                .map(|a| a.content_url.clone())
                .filter(|url| !url.is_empty())
                .collect(),
            in_reply_to,
            mention_handles: activity.recipient.name.iter().cloned().collect(),
        })
    }
}

/// Downloads attachment content.
#[async_trait]
pub trait MediaFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Bytes>;
}

/// [`MediaFetcher`] over plain HTTP GET.
#[derive(Debug, Clone, Default)]
pub struct HttpMediaFetcher {
    http: reqwest::Client,
}

impl HttpMediaFetcher {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }
}

#[async_trait]
impl MediaFetcher for HttpMediaFetcher {
    async fn fetch(&self, url: &str) -> Result<Bytes> {
        let resp = self.http.get(url).send().await?.error_for_status()?;
        Ok(resp.bytes().await?)
    }
}

/// Formats replies and publishes them through a [`TwitterApi`].
#[derive(Clone)]
pub struct TwitterOutbound {
    api: Arc<dyn TwitterApi>,
    media: Arc<dyn MediaFetcher>,
    identity: BotIdentity,
}

impl TwitterOutbound {
    pub fn new(
        api: Arc<dyn TwitterApi>,
        media: Arc<dyn MediaFetcher>,
        identity: BotIdentity,
    ) -> Self {
        Self {
            api,
            media,
            identity,
        }
    }

    /// Format `reply`, fetch its media and publish it.
    ///
    /// Any media fetch failure aborts the post; nothing partial is published.
    pub async fn format_and_post(&self, reply: &OutboundReply) -> Result<PostedTweet> {
        let status = compose_status(
            &reply.mention_handles,
            &self.identity.screen_name,
            &reply.text,
        );

        let urls = select_media(&reply.media_urls);
        if urls.len() < reply.media_urls.len() {
            debug!(
                kept = urls.len(),
                dropped = reply.media_urls.len() - urls.len(),
                "trimmed reply media"
            );
        }

        let mut media = Vec::with_capacity(urls.len());
        for url in urls {
            let data = self.media.fetch(url).await.map_err(|e| {
                warn!(url, error = %e, "failed to fetch reply media");
                Error::post_failed(format!("fetch media {url}"), e)
            })?;
            media.push(data);
        }

        self.api
            .publish_reply(&status, media, reply.in_reply_to)
            .await
    }
}
