//! Twitter REST and streaming client.

use std::{sync::Arc, time::Duration};

use {
    async_stream::try_stream,
    async_trait::async_trait,
    base64::Engine,
    bytes::Bytes,
    futures::{Stream, StreamExt},
    reqwest::{Method, RequestBuilder, Response, header::AUTHORIZATION},
    secrecy::ExposeSecret,
    serde::Deserialize,
    tracing::{debug, info, warn},
};

use crate::{
    auth::{AuthMode, BearerTokenCache, OAuth1Signer},
    config::{TwitterAccountConfig, TwitterCredentials},
    error::{Error, Result},
    session::{EventStream, StreamTransport},
    tweet::{self, BotIdentity, InboundEvent, PayloadEncoding, PostedTweet, TwitterUser},
};

/// Request timeout for REST calls (media uploads included).
const REST_TIMEOUT: Duration = Duration::from_secs(60);

/// The stream sends a keep-alive newline every 30s; silence longer than this
/// means the connection is dead.
const STREAM_STALL_TIMEOUT: Duration = Duration::from_secs(90);

/// Operations the bridge needs from the Twitter REST API.
#[async_trait]
pub trait TwitterApi: Send + Sync {
    /// Resolve the account the credentials act as.
    async fn verify_credentials(&self) -> Result<BotIdentity>;

    /// Upload `media` and publish `status` as a reply to `in_reply_to`.
    async fn publish_reply(
        &self,
        status: &str,
        media: Vec<Bytes>,
        in_reply_to: u64,
    ) -> Result<PostedTweet>;
}

enum Authorizer {
    OAuth1(OAuth1Signer),
    Bearer(BearerTokenCache),
}

struct ClientInner {
    http: reqwest::Client,
    stream_http: reqwest::Client,
    credentials: TwitterCredentials,
    authorizer: Authorizer,
    api_base_url: String,
    upload_base_url: String,
    stream_base_url: String,
}

#[derive(Debug, Deserialize)]
struct MediaUploadResponse {
    media_id_string: String,
}

/// reqwest-backed [`TwitterApi`] and [`StreamTransport`].
#[derive(Clone)]
pub struct TwitterClient {
    inner: Arc<ClientInner>,
}

impl TwitterClient {
    /// Validate credentials and select the auth mode. No network access.
    pub fn new(config: &TwitterAccountConfig) -> Result<Self> {
        let mode = AuthMode::select(&config.credentials)?;
        let authorizer = match mode {
            AuthMode::User => Authorizer::OAuth1(OAuth1Signer::from_credentials(&config.credentials)?),
            AuthMode::AppOnly { bearer_token } => {
                Authorizer::Bearer(BearerTokenCache::new(bearer_token))
            },
        };
        debug!(user_context = matches!(authorizer, Authorizer::OAuth1(_)), "twitter auth mode selected");

        let http = reqwest::Client::builder().timeout(REST_TIMEOUT).build()?;
        let stream_http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            inner: Arc::new(ClientInner {
                http,
                stream_http,
                credentials: config.credentials.clone(),
                authorizer,
                api_base_url: config.api_base_url.trim_end_matches('/').to_string(),
                upload_base_url: config.upload_base_url.trim_end_matches('/').to_string(),
                stream_base_url: config.stream_base_url.trim_end_matches('/').to_string(),
            }),
        })
    }

    /// Attach the `Authorization` header. `params` lists every query and form
    /// parameter so OAuth 1.0a can sign them.
    async fn authorize(
        &self,
        request: RequestBuilder,
        method: &Method,
        url: &str,
        params: &[(&str, &str)],
    ) -> Result<RequestBuilder> {
        match &self.inner.authorizer {
            Authorizer::OAuth1(signer) => {
                let header = signer.authorization_header(method.as_str(), url, params);
                Ok(request.header(AUTHORIZATION, header))
            },
            Authorizer::Bearer(cache) => {
                let token = cache
                    .get(&self.inner.http, &self.inner.api_base_url, &self.inner.credentials)
                    .await?;
                Ok(request.bearer_auth(token.expose_secret()))
            },
        }
    }

    async fn post_form(&self, url: String, form: &[(&str, &str)]) -> Result<Response> {
        let request = self.inner.http.post(&url).form(form);
        let request = self.authorize(request, &Method::POST, &url, form).await?;
        check_status(request.send().await?).await
    }

    async fn upload_media(&self, data: &Bytes) -> Result<String> {
        let url = format!("{}/1.1/media/upload.json", self.inner.upload_base_url);
        let encoded = base64::engine::general_purpose::STANDARD.encode(data);
        let resp = self.post_form(url, &[("media_data", encoded.as_str())]).await?;
        let body: MediaUploadResponse = resp.json().await?;
        debug!(media_id = %body.media_id_string, bytes = data.len(), "uploaded twitter media");
        Ok(body.media_id_string)
    }
}

#[async_trait]
impl TwitterApi for TwitterClient {
    async fn verify_credentials(&self) -> Result<BotIdentity> {
        let url = format!("{}/1.1/account/verify_credentials.json", self.inner.api_base_url);
        let params = [("skip_status", "true")];
        let request = self.inner.http.get(&url).query(&params);
        let request = self.authorize(request, &Method::GET, &url, &params).await?;
        let user: TwitterUser = check_status(request.send().await?).await?.json().await?;
        Ok(user.into())
    }

    async fn publish_reply(
        &self,
        status: &str,
        media: Vec<Bytes>,
        in_reply_to: u64,
    ) -> Result<PostedTweet> {
        let mut media_ids = Vec::with_capacity(media.len());
        for data in &media {
            media_ids.push(self.upload_media(data).await?);
        }

        let url = format!("{}/1.1/statuses/update.json", self.inner.api_base_url);
        let in_reply_to = in_reply_to.to_string();
        let media_ids = media_ids.join(",");
        let mut form = vec![("status", status), ("in_reply_to_status_id", in_reply_to.as_str())];
        if !media_ids.is_empty() {
            form.push(("media_ids", media_ids.as_str()));
        }

        let tweet: PostedTweet = self.post_form(url, &form).await?.json().await?;
        info!(tweet_id = tweet.id, in_reply_to = %in_reply_to, "published twitter reply");
        Ok(tweet)
    }
}

#[async_trait]
impl StreamTransport for TwitterClient {
    async fn open(&self, track: &str) -> Result<EventStream> {
        let url = format!("{}/1.1/statuses/filter.json", self.inner.stream_base_url);
        let form = [("track", track)];
        let request = self.inner.stream_http.post(&url).form(&form);
        let request = self.authorize(request, &Method::POST, &url, &form).await?;
        let resp = check_status(request.send().await?).await?;
        Ok(decode_stream_body(resp))
    }
}

/// Split a streaming response body into CRLF-delimited messages and decode
/// each one. Keep-alives, control messages and undecodable lines are skipped.
fn decode_stream_body(resp: Response) -> EventStream {
    Box::pin(stream_events(resp))
}

fn stream_events(resp: Response) -> impl Stream<Item = Result<InboundEvent>> + Send + 'static {
    let mut body = Box::pin(resp.bytes_stream());
    try_stream! {
        let mut buf: Vec<u8> = Vec::new();
        loop {
            let next = tokio::time::timeout(STREAM_STALL_TIMEOUT, body.next())
                .await
                .map_err(|_| Error::stream("no data received before stall timeout"))?;
            let Some(chunk) = next else {
                break;
            };
            buf.extend_from_slice(&chunk?);

            while let Some(pos) = buf.iter().position(|b| *b == b'\n') {
                let line: Vec<u8> = buf.drain(..=pos).collect();
                match tweet::decode(PayloadEncoding::Stream, &line) {
                    Ok(Some(event)) => { yield event; },
                    Ok(None) => {},
                    Err(e) => warn!(error = %e, "skipping undecodable stream message"),
                }
            }
        }
    }
}

async fn check_status(resp: Response) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(Error::Api {
        status: status.as_u16(),
        body,
    })
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use {
        super::*,
        axum::{
            Json, Router,
            body::Body,
            extract::{Form, State},
            http::{HeaderMap, StatusCode},
            response::{IntoResponse, Response as AxumResponse},
            routing::{get, post},
        },
        secrecy::Secret,
        serde_json::json,
        std::collections::HashMap,
    };

    #[derive(Debug, Clone)]
    struct Captured {
        path: &'static str,
        form: HashMap<String, String>,
        authorization: Option<String>,
    }

    #[derive(Clone, Default)]
    struct MockTwitter {
        requests: Arc<Mutex<Vec<Captured>>>,
        reject_status: Option<StatusCode>,
    }

    impl MockTwitter {
        fn capture(&self, path: &'static str, headers: &HeaderMap, form: HashMap<String, String>) {
            let authorization = headers
                .get(AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            self.requests.lock().unwrap().push(Captured {
                path,
                form,
                authorization,
            });
        }
    }

    async fn verify_credentials(
        State(state): State<MockTwitter>,
        headers: HeaderMap,
    ) -> Json<serde_json::Value> {
        state.capture("verify_credentials", &headers, HashMap::new());
        Json(json!({ "id": 99, "id_str": "99", "screen_name": "chirpbot" }))
    }

    async fn upload(
        State(state): State<MockTwitter>,
        headers: HeaderMap,
        Form(form): Form<HashMap<String, String>>,
    ) -> Json<serde_json::Value> {
        let n = state.requests.lock().unwrap().len();
        state.capture("upload", &headers, form);
        Json(json!({ "media_id": n, "media_id_string": format!("m{n}") }))
    }

    async fn update(
        State(state): State<MockTwitter>,
        headers: HeaderMap,
        Form(form): Form<HashMap<String, String>>,
    ) -> AxumResponse {
        state.capture("update", &headers, form.clone());
        if let Some(status) = state.reject_status {
            return (status, r#"{"errors":[{"code":187,"message":"Status is a duplicate."}]}"#)
                .into_response();
        }
        Json(json!({ "id": 555, "id_str": "555", "text": form.get("status") })).into_response()
    }

    async fn filter(
        State(state): State<MockTwitter>,
        headers: HeaderMap,
        Form(form): Form<HashMap<String, String>>,
    ) -> AxumResponse {
        state.capture("filter", &headers, form);
        let body = concat!(
            "\r\n",
            r#"{"id":1,"text":"@chirpbot one","user":{"id":7,"screen_name":"alice"}}"#,
            "\r\n",
            r#"{"limit":{"track":3}}"#,
            "\r\n",
            r#"{"id":2,"text":"@chirpbot two","user":{"id":8,"screen_name":"bob"},"in_reply_to_user_id":99}"#,
            "\r\n",
        );
        Body::from(body).into_response()
    }

    async fn serve(mock: MockTwitter) -> String {
        let app = Router::new()
            .route("/1.1/account/verify_credentials.json", get(verify_credentials))
            .route("/1.1/media/upload.json", post(upload))
            .route("/1.1/statuses/update.json", post(update))
            .route("/1.1/statuses/filter.json", post(filter))
            .with_state(mock);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn user_config(base: &str) -> TwitterAccountConfig {
        TwitterAccountConfig {
            credentials: TwitterCredentials {
                consumer_key: "ck".into(),
                consumer_secret: Secret::new("cs".into()),
                bearer_token: None,
                access_token: Some("at".into()),
                access_token_secret: Some(Secret::new("ats".into())),
            },
            api_base_url: base.into(),
            upload_base_url: base.into(),
            stream_base_url: base.into(),
            ..Default::default()
        }
    }

    #[test]
    fn new_rejects_missing_consumer_secret() {
        let mut config = user_config("http://127.0.0.1:1");
        config.credentials.consumer_secret = Secret::new(String::new());
        assert!(matches!(
            TwitterClient::new(&config),
            Err(Error::Configuration { .. })
        ));
    }

    #[tokio::test]
    async fn verify_credentials_resolves_identity_with_oauth1() {
        let mock = MockTwitter::default();
        let base = serve(mock.clone()).await;
        let client = TwitterClient::new(&user_config(&base)).unwrap();

        let identity = client.verify_credentials().await.unwrap();

        assert_eq!(identity, BotIdentity::new(99, "chirpbot"));
        let requests = mock.requests.lock().unwrap();
        let auth = requests[0].authorization.as_deref().unwrap();
        assert!(auth.starts_with("OAuth "));
        assert!(auth.contains("oauth_token=\"at\""));
    }

    #[tokio::test]
    async fn app_only_mode_uses_supplied_bearer_token() {
        let mock = MockTwitter::default();
        let base = serve(mock.clone()).await;
        let mut config = user_config(&base);
        config.credentials.access_token = None;
        config.credentials.bearer_token = Some(Secret::new("AAAA".into()));
        let client = TwitterClient::new(&config).unwrap();

        client.verify_credentials().await.unwrap();

        let requests = mock.requests.lock().unwrap();
        assert_eq!(requests[0].authorization.as_deref(), Some("Bearer AAAA"));
    }

    #[tokio::test]
    async fn publish_reply_uploads_media_then_threads_status() {
        let mock = MockTwitter::default();
        let base = serve(mock.clone()).await;
        let client = TwitterClient::new(&user_config(&base)).unwrap();

        let tweet = client
            .publish_reply(
                "@alice hi",
                vec![Bytes::from_static(b"png-1"), Bytes::from_static(b"png-2")],
                1234,
            )
            .await
            .unwrap();

        assert_eq!(tweet.id, 555);
        assert_eq!(tweet.text, "@alice hi");

        let requests = mock.requests.lock().unwrap();
        let paths: Vec<_> = requests.iter().map(|r| r.path).collect();
        assert_eq!(paths, vec!["upload", "upload", "update"]);
        assert_eq!(
            requests[0].form["media_data"],
            base64::engine::general_purpose::STANDARD.encode(b"png-1")
        );
        let update = &requests[2].form;
        assert_eq!(update["status"], "@alice hi");
        assert_eq!(update["in_reply_to_status_id"], "1234");
        assert_eq!(update["media_ids"], "m0,m1");
    }

    #[tokio::test]
    async fn publish_reply_without_media_omits_media_ids() {
        let mock = MockTwitter::default();
        let base = serve(mock.clone()).await;
        let client = TwitterClient::new(&user_config(&base)).unwrap();

        client.publish_reply("hi", Vec::new(), 1).await.unwrap();

        let requests = mock.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert!(!requests[0].form.contains_key("media_ids"));
    }

    #[tokio::test]
    async fn platform_rejection_is_surfaced_verbatim() {
        let mock = MockTwitter {
            reject_status: Some(StatusCode::FORBIDDEN),
            ..Default::default()
        };
        let base = serve(mock).await;
        let client = TwitterClient::new(&user_config(&base)).unwrap();

        let err = client.publish_reply("hi", Vec::new(), 1).await.unwrap_err();
        match err {
            Error::Api { status, body } => {
                assert_eq!(status, 403);
                assert!(body.contains("Status is a duplicate."));
            },
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn filtered_stream_yields_only_tweets() {
        let mock = MockTwitter::default();
        let base = serve(mock.clone()).await;
        let client = TwitterClient::new(&user_config(&base)).unwrap();

        let events: Vec<_> = client
            .open("@chirpbot")
            .await
            .unwrap()
            .collect::<Vec<_>>()
            .await
            .into_iter()
            .map(|e| e.unwrap())
            .collect();

        assert_eq!(events.len(), 2);
        assert_eq!(events[0].author.screen_name, "alice");
        assert_eq!(events[1].reply_target_user_id, Some(99));
        let requests = mock.requests.lock().unwrap();
        assert_eq!(requests[0].form["track"], "@chirpbot");
    }
}
