//! Credential validation, auth-mode selection and request signing.

use std::time::{SystemTime, UNIX_EPOCH};

use {
    base64::Engine,
    hmac::{Hmac, Mac},
    rand::{Rng, distr::Alphanumeric},
    secrecy::{ExposeSecret, Secret},
    serde::Deserialize,
    sha1::Sha1,
    tokio::sync::Mutex,
    tracing::debug,
};

use crate::{
    config::TwitterCredentials,
    error::{Error, Result},
};

type HmacSha1 = Hmac<Sha1>;

/// How requests to the Twitter API are authenticated.
#[derive(Clone)]
pub enum AuthMode {
    /// OAuth 1.0a on behalf of the account owning the access token.
    User,
    /// OAuth 2.0 application-only bearer token. Fetched on first use when not
    /// supplied.
    AppOnly { bearer_token: Option<Secret<String>> },
}

impl AuthMode {
    /// Pick the auth mode from the shape of `credentials`.
    ///
    /// Fails when the consumer key or secret is empty. No network access.
    pub fn select(credentials: &TwitterCredentials) -> Result<Self> {
        if credentials.consumer_key.is_empty()
            || credentials.consumer_secret.expose_secret().is_empty()
        {
            return Err(Error::configuration(
                "both consumer key and consumer secret are required",
            ));
        }

        if credentials.has_user_token() {
            return Ok(Self::User);
        }

        let bearer_token = credentials
            .bearer_token
            .as_ref()
            .filter(|t| !t.expose_secret().is_empty())
            .cloned();
        Ok(Self::AppOnly { bearer_token })
    }

    pub fn is_user_context(&self) -> bool {
        matches!(self, Self::User)
    }
}

impl std::fmt::Debug for AuthMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User => f.write_str("User"),
            Self::AppOnly { bearer_token } => f
                .debug_struct("AppOnly")
                .field("bearer_token", &bearer_token.as_ref().map(|_| "[REDACTED]"))
                .finish(),
        }
    }
}

/// RFC 3986 percent-encoding as required by OAuth 1.0a.
pub fn percent_encode(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}

/// OAuth 1.0a HMAC-SHA1 signer for user-context requests.
#[derive(Clone)]
pub struct OAuth1Signer {
    consumer_key: String,
    consumer_secret: Secret<String>,
    token: String,
    token_secret: Secret<String>,
}

impl OAuth1Signer {
    pub fn from_credentials(credentials: &TwitterCredentials) -> Result<Self> {
        let (Some(token), Some(token_secret)) = (
            credentials.access_token.clone(),
            credentials.access_token_secret.clone(),
        ) else {
            return Err(Error::configuration(
                "user-context auth requires access token and access token secret",
            ));
        };
        Ok(Self {
            consumer_key: credentials.consumer_key.clone(),
            consumer_secret: credentials.consumer_secret.clone(),
            token,
            token_secret,
        })
    }

    /// `Authorization` header value for a request.
    ///
    /// `params` must contain every query and form-encoded body parameter of
    /// the request; `url` must not carry a query string.
    pub fn authorization_header(&self, method: &str, url: &str, params: &[(&str, &str)]) -> String {
        let nonce: String = rand::rng()
            .sample_iter(&Alphanumeric)
            .take(32)
            .map(char::from)
            .collect();
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs()
            .to_string();
        self.authorization_header_with(method, url, params, &nonce, &timestamp)
    }

    fn authorization_header_with(
        &self,
        method: &str,
        url: &str,
        params: &[(&str, &str)],
        nonce: &str,
        timestamp: &str,
    ) -> String {
        let oauth_params = [
            ("oauth_consumer_key", self.consumer_key.as_str()),
            ("oauth_nonce", nonce),
            ("oauth_signature_method", "HMAC-SHA1"),
            ("oauth_timestamp", timestamp),
            ("oauth_token", self.token.as_str()),
            ("oauth_version", "1.0"),
        ];

        let signature = self.signature(method, url, params, &oauth_params);

        let mut header_params: Vec<(&str, &str)> = oauth_params.to_vec();
        header_params.push(("oauth_signature", signature.as_str()));
        header_params.sort_unstable();

        let fields = header_params
            .iter()
            .map(|(k, v)| format!("{}=\"{}\"", percent_encode(k), percent_encode(v)))
            .collect::<Vec<_>>()
            .join(", ");
        format!("OAuth {fields}")
    }

    fn signature(
        &self,
        method: &str,
        url: &str,
        params: &[(&str, &str)],
        oauth_params: &[(&str, &str)],
    ) -> String {
        let mut encoded: Vec<(String, String)> = params
            .iter()
            .chain(oauth_params.iter())
            .map(|(k, v)| (percent_encode(k), percent_encode(v)))
            .collect();
        encoded.sort_unstable();

        let parameter_string = encoded
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("&");

        let base_string = format!(
            "{}&{}&{}",
            method.to_ascii_uppercase(),
            percent_encode(url),
            percent_encode(&parameter_string)
        );
        let signing_key = format!(
            "{}&{}",
            percent_encode(self.consumer_secret.expose_secret()),
            percent_encode(self.token_secret.expose_secret())
        );

        // HMAC accepts keys of any length.
        let mut mac = match HmacSha1::new_from_slice(signing_key.as_bytes()) {
            Ok(mac) => mac,
            Err(_) => return String::new(),
        };
        mac.update(base_string.as_bytes());
        base64::engine::general_purpose::STANDARD.encode(mac.finalize().into_bytes())
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token_type: String,
    access_token: String,
}

/// Lazily fetched app-only bearer token.
pub struct BearerTokenCache {
    token: Mutex<Option<Secret<String>>>,
}

impl BearerTokenCache {
    pub fn new(initial: Option<Secret<String>>) -> Self {
        Self {
            token: Mutex::new(initial),
        }
    }

    /// Return the cached token, exchanging the consumer credentials for one
    /// via `POST /oauth2/token` on first use.
    pub async fn get(
        &self,
        http: &reqwest::Client,
        api_base_url: &str,
        credentials: &TwitterCredentials,
    ) -> Result<Secret<String>> {
        let mut guard = self.token.lock().await;
        if let Some(token) = guard.as_ref() {
            return Ok(token.clone());
        }

        let url = format!("{}/oauth2/token", api_base_url.trim_end_matches('/'));
        let resp = http
            .post(url)
            .basic_auth(
                percent_encode(&credentials.consumer_key),
                Some(percent_encode(credentials.consumer_secret.expose_secret())),
            )
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await?;
        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Api { status, body });
        }

        let body: TokenResponse = resp.json().await?;
        if !body.token_type.eq_ignore_ascii_case("bearer") {
            return Err(Error::configuration(format!(
                "unexpected token type from oauth2/token: {}",
                body.token_type
            )));
        }
        debug!("obtained twitter app-only bearer token");

        let token = Secret::new(body.access_token);
        *guard = Some(token.clone());
        Ok(token)
    }
}
