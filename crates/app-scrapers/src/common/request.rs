use std::time::Duration;

use app_config::Config;
use app_helpers::futures::retry_fn;
use http::{header, HeaderMap, HeaderValue, Method};
pub use reqwest::{Client as RequestClient, ClientBuilder as RequestClientBuilder, RequestBuilder, Response};
use tracing::warn;

use crate::error::FetchError;

pub const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like \
                              Gecko) Chrome/122.0.0.0 Safari/537.36";

const CLIENT_TIMEOUT_SECS: u64 = 30;

pub struct Client;

impl Client {
    pub fn base() -> Result<RequestClient, FetchError> {
        Self::builder().build().map_err(FetchError::Transport)
    }

    pub fn builder() -> RequestClientBuilder {
        let user_agent = Config::global()
            .scraper
            .user_agent
            .clone()
            .unwrap_or_else(|| USER_AGENT.to_string());

        RequestClient::builder()
            .user_agent(user_agent)
            .timeout(Duration::from_secs(CLIENT_TIMEOUT_SECS))
    }
}

#[derive(Debug, Clone)]
pub enum FetchBody {
    Json(serde_json::Value),
    Form(String),
}

#[derive(Debug, Clone)]
pub struct FetchOptions {
    pub method: Method,
    pub headers: HeaderMap,
    pub body: Option<FetchBody>,
    pub timeout: Option<Duration>,
    pub max_attempts: Option<u32>,
    pub follow_redirects: bool,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            method: Method::GET,
            headers: HeaderMap::default(),
            body: None,
            timeout: None,
            max_attempts: None,
            follow_redirects: true,
        }
    }
}

impl FetchOptions {
    #[must_use]
    pub fn get() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn post() -> Self {
        Self {
            method: Method::POST,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn post_json(body: serde_json::Value) -> Self {
        Self {
            method: Method::POST,
            body: Some(FetchBody::Json(body)),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn post_form(body: String) -> Self {
        Self {
            method: Method::POST,
            body: Some(FetchBody::Form(body)),
            ..Self::default()
        }
    }

    /// Set a header, replacing any previous value for the name.
    #[must_use]
    pub fn with_header<K, V>(mut self, key: K, value: &V) -> Self
    where
        K: header::IntoHeaderName,
        V: ToString + ?Sized,
    {
        let value = value.to_string();
        if let Ok(value) = HeaderValue::from_str(&value) {
            self.headers.insert(key, value);
        }
        self
    }

    #[must_use]
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers.extend(headers);
        self
    }
}

/// Fetch a URL, retrying transient failures with a linearly growing delay.
///
/// Every attempt runs under its own timeout; a timed-out attempt is aborted
/// and the next one starts with a full budget. Non-success statuses count as
/// failures and are retried like transport errors. The last error is
/// returned once attempts are exhausted.
///
/// Headers set by the caller take precedence over the default identity.
pub async fn fetch_with_retry(url: &str, options: &FetchOptions) -> Result<Response, FetchError> {
    let scraper_config = &Config::global().scraper;

    let timeout = options
        .timeout
        .unwrap_or_else(|| scraper_config.request_timeout());
    let max_attempts = options.max_attempts.unwrap_or(scraper_config.max_attempts).max(1);

    let client = if options.follow_redirects {
        Client::base()?
    } else {
        Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(FetchError::Transport)?
    };

    retry_fn(max_attempts, scraper_config.backoff_base(), || {
        let client = &client;
        async move {
            let resp = build_request(client, url, options, timeout)
                .send()
                .await
                .map_err(|e| {
                    if e.is_timeout() {
                        FetchError::Timeout(timeout)
                    } else {
                        FetchError::Transport(e)
                    }
                })?;

            let status = resp.status();
            if !status.is_success() {
                warn!(%status, url, "Request returned non-success status");
                return Err(FetchError::Status(status));
            }

            Ok(resp)
        }
    })
    .await
}

fn build_request(
    client: &RequestClient,
    url: &str,
    options: &FetchOptions,
    timeout: Duration,
) -> RequestBuilder {
    let mut builder = client
        .request(options.method.clone(), url)
        .timeout(timeout)
        .headers(options.headers.clone());

    match &options.body {
        Some(FetchBody::Json(json)) => {
            builder = builder.json(json);
        }
        Some(FetchBody::Form(form)) => {
            builder = builder
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(form.clone());
        }
        None => {}
    }

    builder
}
