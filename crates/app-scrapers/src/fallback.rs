//! External aggregator fallback, consulted only after every local strategy
//! has failed.

use std::fmt::Debug;

use app_config::Config;
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::{
    common::request::{fetch_with_retry, FetchOptions},
    error::FallbackError,
};

/// Opaque remote capability that may resolve URLs no local strategy can.
///
/// The returned document has no guaranteed schema; it goes through the
/// normalizer's defensive field extraction before anyone looks at it.
#[async_trait::async_trait]
pub trait FallbackProvider: Debug + Send + Sync {
    fn name(&self) -> &'static str;

    async fn fetch(&self, url: &Url) -> Result<Value, FallbackError>;
}

/// Aggregator API addressed via the `endpoint` configuration section.
#[derive(Debug, Default, Clone)]
pub struct AggregatorApi;

#[async_trait::async_trait]
impl FallbackProvider for AggregatorApi {
    fn name(&self) -> &'static str {
        "aggregator"
    }

    async fn fetch(&self, url: &Url) -> Result<Value, FallbackError> {
        let endpoint_config = &Config::global().endpoint;

        let endpoint = endpoint_config
            .fallback_api_url
            .as_ref()
            .ok_or(FallbackError::NotConfigured)?;

        debug!(%url, endpoint, "Asking external aggregator");

        let mut options = FetchOptions::post_json(serde_json::json!({ "url": url.as_str() }));
        if let Some(key) = &endpoint_config.fallback_api_key {
            options = options.with_header("x-api-key", key);
        }

        let resp = fetch_with_retry(endpoint, &options).await?;

        resp.json::<Value>()
            .await
            .map_err(|e| FallbackError::Decode(e.to_string()))
    }
}
