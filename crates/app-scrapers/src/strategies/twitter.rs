use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, trace};
use url::Url;

use super::Strategy;
use crate::{
    common::{
        request::{fetch_with_retry, FetchOptions},
        scrape_request::ScrapeRequest,
        scrape_result::{MediaKind, MediaVariant, ScrapeResult},
    },
    error::StrategyError,
    format::{format_duration, format_views},
    platform::Platform,
};

pub static URL_MATCH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^https?://(www\.)?(twitter|x)\.com/(?P<username>[^/]+)/status/(?P<status_id>[0-9]+)",
    )
    .expect("Invalid regex")
});

static RESOLUTION_MATCH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/(\d+)x(?P<height>\d+)/").expect("Invalid regex"));

static DEFAULT_AUTHORIZATION: &str =
    "Bearer AAAAAAAAAAAAAAAAAAAAANRILgAAAAAAnNwIzUejRCOuH5E6I8xnZz4puTs%\
     3D1Zv7ttfk8LF81IUq16cHjhLTvJu4FA33AGWWjCpTnA";

static TWEET_INFO_ENDPOINT: &str =
    "https://x.com/i/api/graphql/0hWvDhmW8YQ-S_ib3azIrw/TweetResultByRestId";

static GUEST_TOKEN_ENDPOINT: &str = "https://api.twitter.com/1.1/guest/activate.json";

const SYNDICATION_ENDPOINT: &str = "https://cdn.syndication.twimg.com/tweet-result";

/// Guest-token GraphQL lookup, the same flow the logged-out web client uses.
#[derive(Debug, Default, Clone)]
pub struct GuestApi;

#[async_trait::async_trait]
impl Strategy for GuestApi {
    fn name(&self) -> &'static str {
        "twitter-guest-api"
    }

    fn description(&self) -> &'static str {
        "Looks the tweet up over GraphQL with a guest token"
    }

    async fn attempt(&self, request: &ScrapeRequest) -> Result<ScrapeResult, StrategyError> {
        let status_id = extract_status_id(request.url.as_str())?;

        let guest_auth = get_guest_auth().await?;
        let tweet = get_tweet_data(&status_id, &guest_auth).await?;

        trace!(?tweet, "Got tweet data");

        build_api_result(&tweet)
    }
}

/// Syndication CDN lookup; serves embeds, needs no auth.
#[derive(Debug, Default, Clone)]
pub struct Syndication;

#[async_trait::async_trait]
impl Strategy for Syndication {
    fn name(&self) -> &'static str {
        "twitter-syndication"
    }

    fn description(&self) -> &'static str {
        "Queries the syndication CDN that backs embedded tweets"
    }

    async fn attempt(&self, request: &ScrapeRequest) -> Result<ScrapeResult, StrategyError> {
        let status_id = extract_status_id(request.url.as_str())?;

        debug!(status_id, "Querying syndication CDN");

        let api_url = Url::parse_with_params(
            SYNDICATION_ENDPOINT,
            &[("id", status_id.as_str()), ("token", "a")],
        )
        .map_err(|e| StrategyError::Parse(format!("syndication url: {e}")))?;

        let doc = fetch_with_retry(api_url.as_str(), &FetchOptions::get())
            .await?
            .json::<Value>()
            .await
            .map_err(|e| StrategyError::Parse(format!("syndication response: {e}")))?;

        build_syndication_result(&doc)
    }
}

fn extract_status_id(url: &str) -> Result<String, StrategyError> {
    URL_MATCH
        .captures(url)
        .and_then(|x| x.name("status_id"))
        .map(|x| x.as_str().to_string())
        .ok_or_else(|| StrategyError::Parse("not a tweet URL".to_string()))
}

#[derive(Debug)]
struct GuestAuth {
    guest_token: String,
    cookie: Option<String>,
}
impl GuestAuth {
    fn apply(&self, options: FetchOptions) -> FetchOptions {
        let mut options = options
            .with_header("authorization", DEFAULT_AUTHORIZATION)
            .with_header("x-guest-token", &self.guest_token);

        if let Some(cookie) = &self.cookie {
            options = options.with_header("cookie", cookie);
        }

        options
    }
}

async fn get_guest_auth() -> Result<GuestAuth, StrategyError> {
    #[derive(Debug, Deserialize)]
    struct GuestActivateResponse {
        guest_token: String,
    }

    debug!("Getting guest auth token");

    let options = FetchOptions::post().with_header("authorization", DEFAULT_AUTHORIZATION);

    let resp = fetch_with_retry(GUEST_TOKEN_ENDPOINT, &options).await?;

    let cookie = resp
        .headers()
        .get("set-cookie")
        .and_then(|x| x.to_str().ok())
        .and_then(|x| x.split(';').next())
        .map(ToString::to_string);

    let guest_token = resp
        .json::<GuestActivateResponse>()
        .await
        .map_err(|e| StrategyError::Parse(format!("guest token response: {e}")))?
        .guest_token;

    trace!(?guest_token, ?cookie, "Got guest auth token");

    Ok(GuestAuth {
        guest_token,
        cookie,
    })
}

async fn get_tweet_data(status_id: &str, auth: &GuestAuth) -> Result<Value, StrategyError> {
    let url = {
        let graphql_variables = json!({
            "tweetId": status_id,
            "includePromotedContent": false,
            "withCommunity": false,
            "withVoice": false,
        })
        .to_string();
        let graphql_features = json!({
            "creator_subscriptions_tweet_preview_api_enabled": true,
            "tweetypie_unmention_optimization_enabled": true,
            "responsive_web_edit_tweet_api_enabled": true,
            "graphql_is_translatable_rweb_tweet_is_translatable_enabled": true,
            "view_counts_everywhere_api_enabled": true,
            "longform_notetweets_consumption_enabled": true,
            "responsive_web_twitter_article_tweet_consumption_enabled": false,
            "tweet_awards_web_tipping_enabled": false,
            "freedom_of_speech_not_reach_fetch_enabled": true,
            "standardized_nudges_misinfo": true,
            "tweet_with_visibility_results_prefer_gql_limited_actions_policy_enabled": true,
            "longform_notetweets_rich_text_read_enabled": true,
            "longform_notetweets_inline_media_enabled": true,
            "responsive_web_media_download_video_enabled": true,
            "responsive_web_enhance_cards_enabled": false,
        })
        .to_string();

        let mut url = Url::parse(TWEET_INFO_ENDPOINT).expect("Invalid URL");
        url.query_pairs_mut().extend_pairs([
            ("variables", graphql_variables.as_str()),
            ("features", graphql_features.as_str()),
        ]);

        url
    };

    trace!(%url, "Tweet info URL");

    let resp = fetch_with_retry(url.as_str(), &auth.apply(FetchOptions::get()))
        .await?
        .json::<Value>()
        .await
        .map_err(|e| StrategyError::Parse(format!("tweet info response: {e}")))?;

    resp.get("data")
        .and_then(|x| x.get("tweetResult"))
        .and_then(|x| x.get("result"))
        .cloned()
        .ok_or_else(|| StrategyError::NoMedia("no tweet result in response".to_string()))
}

fn build_api_result(tweet: &Value) -> Result<ScrapeResult, StrategyError> {
    if tweet.get("__typename").and_then(Value::as_str) == Some("TweetUnavailable") {
        return Err(StrategyError::Blocked("tweet is unavailable".to_string()));
    }

    let legacy = tweet
        .get("legacy")
        .ok_or_else(|| StrategyError::Parse("tweet has no legacy payload".to_string()))?;

    let media = legacy
        .get("extended_entities")
        .and_then(|x| x.get("media"))
        .and_then(Value::as_array)
        .ok_or_else(|| StrategyError::NoMedia("tweet has no media entities".to_string()))?;

    let mut variants = Vec::new();
    let mut duration_ms = None;
    let mut thumbnail = None;

    for entry in media {
        let Some(video_info) = entry.get("video_info") else {
            continue;
        };

        variants.extend(variants_from_video_info(video_info));
        duration_ms = duration_ms.or_else(|| {
            video_info
                .get("duration_millis")
                .and_then(Value::as_u64)
        });
        thumbnail = thumbnail.or_else(|| {
            entry
                .get("media_url_https")
                .and_then(Value::as_str)
                .map(ToString::to_string)
        });
    }

    if variants.is_empty() {
        return Err(StrategyError::NoMedia(
            "tweet media contains no videos".to_string(),
        ));
    }

    let mut result = ScrapeResult::new(Platform::Twitter);

    if let Some(text) = legacy
        .get("full_text")
        .and_then(Value::as_str)
        .filter(|x| !x.is_empty())
    {
        result.description = text.to_string();
        result.title = text.to_string();
    }
    if let Some(author) = tweet
        .get("core")
        .and_then(|x| x.get("user_results"))
        .and_then(|x| x.get("result"))
        .and_then(|x| x.get("legacy"))
        .and_then(|x| x.get("name"))
        .and_then(Value::as_str)
    {
        result.author = author.to_string();
    }
    if let Some(views) = tweet
        .get("views")
        .and_then(|x| x.get("count"))
        .and_then(Value::as_str)
        .and_then(|x| x.parse().ok())
    {
        result.views = format_views(views);
    }
    if let Some(thumbnail) = thumbnail {
        result.thumbnail = thumbnail;
    }
    if let Some(duration_ms) = duration_ms {
        result.duration = format_duration(duration_ms / 1000);
    }

    result.variants = variants;

    Ok(result)
}

fn build_syndication_result(doc: &Value) -> Result<ScrapeResult, StrategyError> {
    let mut variants = Vec::new();
    let mut duration_ms = None;

    if let Some(details) = doc.get("mediaDetails").and_then(Value::as_array) {
        for detail in details {
            let Some(video_info) = detail.get("video_info") else {
                continue;
            };

            variants.extend(variants_from_video_info(video_info));
            duration_ms = duration_ms.or_else(|| {
                video_info
                    .get("duration_millis")
                    .and_then(Value::as_u64)
            });
        }
    }

    if variants.is_empty() {
        if let Some(alt) = doc
            .get("video")
            .and_then(|x| x.get("variants"))
            .and_then(Value::as_array)
        {
            for variant in alt {
                if variant.get("type").and_then(Value::as_str) != Some("video/mp4") {
                    continue;
                }
                if let Some(src) = variant.get("src").and_then(Value::as_str) {
                    variants.push(MediaVariant::new("HD", "mp4", MediaKind::Video, src));
                }
            }
        }
    }

    if variants.is_empty() {
        return Err(StrategyError::NoMedia(
            "syndication document contains no videos".to_string(),
        ));
    }

    let mut result = ScrapeResult::new(Platform::Twitter);

    if let Some(text) = doc
        .get("text")
        .and_then(Value::as_str)
        .filter(|x| !x.is_empty())
    {
        result.description = text.to_string();
        result.title = text.to_string();
    }
    if let Some(author) = doc
        .get("user")
        .and_then(|x| x.get("name"))
        .and_then(Value::as_str)
    {
        result.author = author.to_string();
    }
    if let Some(thumbnail) = doc
        .get("mediaDetails")
        .and_then(|x| x.get(0))
        .and_then(|x| x.get("media_url_https"))
        .and_then(Value::as_str)
    {
        result.thumbnail = thumbnail.to_string();
    }
    if let Some(duration_ms) = duration_ms {
        result.duration = format_duration(duration_ms / 1000);
    }

    result.variants = variants;

    Ok(result)
}

/// mp4 renditions of one video, best bitrate first.
fn variants_from_video_info(video_info: &Value) -> Vec<MediaVariant> {
    #[derive(Debug, Clone, Deserialize)]
    struct RespVideoVariant {
        bitrate: Option<i64>,
        content_type: String,
        url: String,
    }

    let parsed = serde_json::from_value::<Vec<RespVideoVariant>>(
        video_info.get("variants").cloned().unwrap_or_default(),
    );

    let Ok(mut parsed) = parsed else {
        return Vec::new();
    };

    parsed.retain(|x| x.content_type == "video/mp4");
    parsed.sort_by(|lt, gt| {
        gt.bitrate
            .unwrap_or_default()
            .cmp(&lt.bitrate.unwrap_or_default())
    });

    parsed
        .into_iter()
        .map(|x| MediaVariant::new(resolution_label(&x.url), "mp4", MediaKind::Video, x.url))
        .collect()
}

fn resolution_label(url: &str) -> String {
    RESOLUTION_MATCH
        .captures(url)
        .and_then(|x| x.name("height"))
        .map_or_else(|| "HD".to_string(), |x| format!("{}p", x.as_str()))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn recognizes_tweet_url_shapes() {
        assert_eq!(
            extract_status_id("https://twitter.com/someone/status/1234567890")
                .expect("Expected a status id"),
            "1234567890"
        );
        assert_eq!(
            extract_status_id("https://x.com/someone/status/987?s=20").expect("Expected a status id"),
            "987"
        );
        assert!(extract_status_id("https://x.com/someone").is_err());
    }

    #[test]
    fn orders_video_variants_by_bitrate() {
        let video_info = json!({
            "duration_millis": 45_000,
            "variants": [
                {
                    "bitrate": 256_000,
                    "content_type": "video/mp4",
                    "url": "https://video.twimg.com/vid/320x568/lo.mp4",
                },
                {
                    "content_type": "application/x-mpegURL",
                    "url": "https://video.twimg.com/pl/playlist.m3u8",
                },
                {
                    "bitrate": 2_176_000,
                    "content_type": "video/mp4",
                    "url": "https://video.twimg.com/vid/720x1280/hi.mp4",
                },
            ],
        });

        let variants = variants_from_video_info(&video_info);

        assert_eq!(variants.len(), 2);
        assert_eq!(variants[0].quality, "1280p");
        assert_eq!(variants[1].quality, "568p");
    }

    #[test]
    fn builds_results_from_tweet_payloads() {
        let tweet = json!({
            "core": {
                "user_results": { "result": { "legacy": { "name": "Someone" } } },
            },
            "views": { "count": "2300000" },
            "legacy": {
                "full_text": "look at this",
                "extended_entities": {
                    "media": [
                        {
                            "type": "video",
                            "media_url_https": "https://pbs.twimg.com/thumb.jpg",
                            "video_info": {
                                "duration_millis": 125_000,
                                "variants": [
                                    {
                                        "bitrate": 832_000,
                                        "content_type": "video/mp4",
                                        "url": "https://video.twimg.com/vid/480x852/v.mp4",
                                    },
                                ],
                            },
                        },
                    ],
                },
            },
        });

        let result = build_api_result(&tweet).expect("Expected a result");

        assert_eq!(result.title, "look at this");
        assert_eq!(result.author, "Someone");
        assert_eq!(result.views, "2.3M");
        assert_eq!(result.duration, "2:05");
        assert_eq!(result.thumbnail, "https://pbs.twimg.com/thumb.jpg");
        assert_eq!(result.variants.len(), 1);
        assert_eq!(result.variants[0].quality, "852p");
    }

    #[test]
    fn unavailable_tweets_are_block_signals() {
        let tweet = json!({ "__typename": "TweetUnavailable" });

        assert!(matches!(
            build_api_result(&tweet),
            Err(StrategyError::Blocked(_))
        ));
    }

    #[test]
    fn text_only_tweets_are_no_media_errors() {
        let tweet = json!({
            "legacy": { "full_text": "just words" },
        });

        assert!(matches!(
            build_api_result(&tweet),
            Err(StrategyError::NoMedia(_))
        ));
    }

    #[test]
    fn syndication_documents_fall_back_to_plain_variant_lists() {
        let doc = json!({
            "text": "clip",
            "user": { "name": "Someone" },
            "video": {
                "variants": [
                    { "type": "application/x-mpegURL", "src": "https://video.twimg.com/pl/p.m3u8" },
                    { "type": "video/mp4", "src": "https://video.twimg.com/vid/v.mp4" },
                ],
            },
        });

        let result = build_syndication_result(&doc).expect("Expected a result");

        assert_eq!(result.author, "Someone");
        assert_eq!(result.variants.len(), 1);
        assert_eq!(result.variants[0].source_url, "https://video.twimg.com/vid/v.mp4");
    }
}
