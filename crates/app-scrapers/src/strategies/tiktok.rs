use http::{header, HeaderMap, HeaderValue};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
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

const OEMBED_ENDPOINT: &str = "https://www.tiktok.com/oembed";
const MOBILE_API_ENDPOINT: &str = "https://api16-normal-c-useast1a.tiktokv.com/aweme/v1/feed/";
const MOBILE_USER_AGENT: &str = "com.zhiliaoapp.musically/2022600040 (Linux; U; Android 7.1.2; \
                                 en_US; Redmi 4X; Build/N2G47H; Cronet/TTNetVersion:b4d74d15 \
                                 2020-04-23 QuicVersion:0144d358 2020-03-24)";
const HYDRATION_ELEMENT_ID: &str = "__UNIVERSAL_DATA_FOR_REHYDRATION__";

static VIDEO_ID_MATCH: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"tiktok\.com/@[\w.-]+/video/(?P<id>\d+)",
        r"tiktok\.com/v/(?P<id>\d+)",
        r"vm\.tiktok\.com/(?P<id>[A-Za-z0-9]+)",
    ]
    .iter()
    .map(|x| Regex::new(x).expect("Invalid regex"))
    .collect()
});

static MEDIA_URL_MATCH: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r#""downloadAddr":"(?P<url>[^"]+)""#,
        r#""playAddr":"(?P<url>[^"]+)""#,
        r#"src="(?P<url>[^"]+\.mp4[^"]*)""#,
    ]
    .iter()
    .map(|x| Regex::new(x).expect("Invalid regex"))
    .collect()
});

/// oEmbed endpoint for metadata plus a page sweep for the media pointer.
#[derive(Debug, Default, Clone)]
pub struct Oembed;

#[async_trait::async_trait]
impl Strategy for Oembed {
    fn name(&self) -> &'static str {
        "tiktok-oembed"
    }

    fn description(&self) -> &'static str {
        "Combines the public oEmbed endpoint with a page scan for the video address"
    }

    async fn attempt(&self, request: &ScrapeRequest) -> Result<ScrapeResult, StrategyError> {
        #[derive(Debug, Deserialize)]
        struct OembedResponse {
            title: Option<String>,
            author_name: Option<String>,
            thumbnail_url: Option<String>,
        }

        let oembed_url = Url::parse_with_params(OEMBED_ENDPOINT, &[("url", request.url.as_str())])
            .map_err(|e| StrategyError::Parse(format!("oembed url: {e}")))?;

        debug!("Querying tiktok oembed endpoint");

        let data = fetch_with_retry(oembed_url.as_str(), &FetchOptions::get())
            .await?
            .json::<OembedResponse>()
            .await
            .map_err(|e| StrategyError::Parse(format!("oembed response: {e}")))?;

        // oEmbed carries no media address, so sweep the page markup for one.
        let media_url = find_media_url_in_page(request).await?;

        let mut result = ScrapeResult::new(Platform::Tiktok);
        if let Some(title) = data.title {
            result.description.clone_from(&title);
            result.title = title;
        }
        if let Some(author) = data.author_name {
            result.author = author;
        }
        if let Some(thumbnail) = data.thumbnail_url {
            result.thumbnail = thumbnail;
        }
        result.variants = vec![MediaVariant::new("HD", "mp4", MediaKind::Video, media_url)];

        Ok(result)
    }
}

/// Full page scrape of the hydration payload.
#[derive(Debug, Default, Clone)]
pub struct WebPage;

#[async_trait::async_trait]
impl Strategy for WebPage {
    fn name(&self) -> &'static str {
        "tiktok-web-page"
    }

    fn description(&self) -> &'static str {
        "Extracts the hydration payload embedded in the post page"
    }

    async fn attempt(&self, request: &ScrapeRequest) -> Result<ScrapeResult, StrategyError> {
        debug!("Fetching tiktok post page");

        let options = FetchOptions::get()
            .with_headers(browser_headers())
            .with_headers(request.headers.clone());

        let body = fetch_with_retry(request.url.as_str(), &options)
            .await?
            .text()
            .await
            .map_err(|e| StrategyError::Parse(format!("post page body: {e}")))?;

        ensure_not_verification_page(&body)?;

        let post_data = tokio::task::spawn_blocking(move || hydration_payload(&body)).await??;

        trace!("Got hydration payload from post page");

        let item = post_data
            .get("__DEFAULT_SCOPE__")
            .and_then(|x| x.get("webapp.video-detail"))
            .and_then(|x| x.get("itemInfo"))
            .and_then(|x| x.get("itemStruct"))
            .ok_or_else(|| {
                StrategyError::Parse("no video detail in hydration payload".to_string())
            })?;

        build_web_result(item)
    }
}

/// Mobile feed API queried with an app client identity; lowest priority.
#[derive(Debug, Default, Clone)]
pub struct MobileApi;

#[async_trait::async_trait]
impl Strategy for MobileApi {
    fn name(&self) -> &'static str {
        "tiktok-mobile-api"
    }

    fn description(&self) -> &'static str {
        "Queries the mobile feed API with an app client identity"
    }

    async fn attempt(&self, request: &ScrapeRequest) -> Result<ScrapeResult, StrategyError> {
        let video_id = extract_video_id(request.url.as_str())?;

        debug!(video_id, "Querying tiktok mobile API");

        let api_url =
            Url::parse_with_params(MOBILE_API_ENDPOINT, &[("aweme_id", video_id.as_str())])
                .map_err(|e| StrategyError::Parse(format!("mobile api url: {e}")))?;

        let options = FetchOptions::get().with_header(header::USER_AGENT, MOBILE_USER_AGENT);

        let data = fetch_with_retry(api_url.as_str(), &options)
            .await?
            .json::<Value>()
            .await
            .map_err(|e| StrategyError::Parse(format!("mobile api response: {e}")))?;

        let aweme = data
            .get("aweme_list")
            .and_then(|x| x.get(0))
            .ok_or_else(|| StrategyError::NoMedia("video not present in feed response".to_string()))?;

        build_mobile_result(aweme)
    }
}

fn extract_video_id(url: &str) -> Result<String, StrategyError> {
    VIDEO_ID_MATCH
        .iter()
        .find_map(|re| {
            re.captures(url)
                .and_then(|x| x.name("id"))
                .map(|x| x.as_str().to_string())
        })
        .ok_or_else(|| StrategyError::Parse("not a recognized post URL".to_string()))
}

fn browser_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::ACCEPT,
        HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
    );
    headers.insert(
        header::ACCEPT_LANGUAGE,
        HeaderValue::from_static("en-US,en;q=0.5"),
    );
    headers.insert("Sec-Fetch-Dest", HeaderValue::from_static("document"));
    headers.insert("Sec-Fetch-Mode", HeaderValue::from_static("navigate"));
    headers.insert("Sec-Fetch-Site", HeaderValue::from_static("none"));
    headers
}

fn ensure_not_verification_page(body: &str) -> Result<(), StrategyError> {
    if body.contains("tiktok-verify-page") || body.contains("security-check") {
        return Err(StrategyError::Blocked(
            "post page responded with a verification challenge".to_string(),
        ));
    }

    Ok(())
}

async fn find_media_url_in_page(request: &ScrapeRequest) -> Result<String, StrategyError> {
    let options = FetchOptions::get().with_headers(browser_headers());

    let html = fetch_with_retry(request.url.as_str(), &options)
        .await?
        .text()
        .await
        .map_err(|e| StrategyError::Parse(format!("post page body: {e}")))?;

    ensure_not_verification_page(&html)?;

    media_url_in_markup(&html)
        .ok_or_else(|| StrategyError::NoMedia("no media URL in page markup".to_string()))
}

fn media_url_in_markup(html: &str) -> Option<String> {
    MEDIA_URL_MATCH.iter().find_map(|re| {
        re.captures(html)
            .and_then(|x| x.name("url"))
            .map(|x| x.as_str().replace("\\u002F", "/"))
    })
}

fn hydration_payload(body: &str) -> Result<Value, StrategyError> {
    let dom = tl::parse(body, tl::ParserOptions::default())
        .map_err(|e| StrategyError::Parse(format!("invalid post page html: {e:?}")))?;
    let parser = dom.parser();

    let data_el = dom
        .get_element_by_id(HYDRATION_ELEMENT_ID)
        .and_then(|x| x.get(parser))
        .ok_or_else(|| StrategyError::Parse("hydration payload element not found".to_string()))?;

    serde_json::from_str(&data_el.inner_text(parser))
        .map_err(|e| StrategyError::Parse(format!("hydration payload is not valid json: {e}")))
}

fn build_web_result(item: &Value) -> Result<ScrapeResult, StrategyError> {
    let video = item
        .get("video")
        .ok_or_else(|| StrategyError::Parse("post item has no video object".to_string()))?;

    let mut variants = Vec::new();

    if let Some(url) = non_empty_str(video.get("downloadAddr")) {
        variants.push(MediaVariant::new(
            "HD (No Watermark)",
            "mp4",
            MediaKind::Video,
            url,
        ));
    }
    if let Some(url) = non_empty_str(video.get("playAddr")) {
        variants.push(MediaVariant::new("HD", "mp4", MediaKind::Video, url));
    }
    if let Some(url) = non_empty_str(item.get("music").and_then(|x| x.get("playUrl"))) {
        variants.push(MediaVariant::new(
            "High Quality",
            "m4a",
            MediaKind::Audio,
            url,
        ));
    }

    if variants.is_empty() {
        return Err(StrategyError::NoMedia(
            "post has no media addresses".to_string(),
        ));
    }

    let mut result = ScrapeResult::new(Platform::Tiktok);

    if let Some(desc) = non_empty_str(item.get("desc")) {
        result.description.clone_from(&desc);
        result.title = desc;
    }
    if let Some(author) = non_empty_str(item.get("author").and_then(|x| x.get("nickname"))) {
        result.author = author;
    }
    if let Some(cover) = non_empty_str(video.get("cover"))
        .or_else(|| non_empty_str(video.get("dynamicCover")))
    {
        result.thumbnail = cover;
    }
    if let Some(duration) = video.get("duration").and_then(Value::as_u64) {
        result.duration = format_duration(duration);
    }
    if let Some(views) = item
        .get("stats")
        .and_then(|x| x.get("playCount"))
        .and_then(Value::as_u64)
    {
        result.views = format_views(views);
    }

    result.variants = variants;

    Ok(result)
}

fn build_mobile_result(aweme: &Value) -> Result<ScrapeResult, StrategyError> {
    let video = aweme
        .get("video")
        .ok_or_else(|| StrategyError::Parse("feed entry has no video object".to_string()))?;

    let mut variants = Vec::new();

    if let Some(url) = first_url(video.get("download_addr")) {
        variants.push(
            MediaVariant::new("HD (No Watermark)", "mp4", MediaKind::Video, url)
                .with_size_bytes(data_size(video.get("download_addr"))),
        );
    }
    if let Some(url) = first_url(video.get("play_addr")) {
        variants.push(
            MediaVariant::new("HD", "mp4", MediaKind::Video, url)
                .with_size_bytes(data_size(video.get("play_addr"))),
        );
    }

    if variants.is_empty() {
        return Err(StrategyError::NoMedia(
            "feed entry has no media addresses".to_string(),
        ));
    }

    let mut result = ScrapeResult::new(Platform::Tiktok);

    if let Some(desc) = non_empty_str(aweme.get("desc")) {
        result.description.clone_from(&desc);
        result.title = desc;
    }
    if let Some(author) = non_empty_str(aweme.get("author").and_then(|x| x.get("nickname"))) {
        result.author = author;
    }
    if let Some(cover) = first_url(video.get("cover")) {
        result.thumbnail = cover;
    }
    if let Some(duration_ms) = video.get("duration").and_then(Value::as_u64) {
        result.duration = format_duration(duration_ms / 1000);
    }
    if let Some(views) = aweme
        .get("statistics")
        .and_then(|x| x.get("play_count"))
        .and_then(Value::as_u64)
    {
        result.views = format_views(views);
    }

    result.variants = variants;

    Ok(result)
}

fn non_empty_str(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .filter(|x| !x.is_empty())
        .map(ToString::to_string)
}

fn first_url(addr: Option<&Value>) -> Option<String> {
    non_empty_str(addr.and_then(|x| x.get("url_list")).and_then(|x| x.get(0)))
}

fn data_size(addr: Option<&Value>) -> Option<u64> {
    addr.and_then(|x| x.get("data_size")).and_then(Value::as_u64)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn recognizes_post_url_shapes() {
        assert_eq!(
            extract_video_id("https://www.tiktok.com/@some.user/video/7212345678901234567")
                .expect("Expected a video id"),
            "7212345678901234567"
        );
        assert_eq!(
            extract_video_id("https://vm.tiktok.com/ZMabcDEF/").expect("Expected a video id"),
            "ZMabcDEF"
        );
        assert!(extract_video_id("https://www.tiktok.com/discover").is_err());
    }

    #[test]
    fn sweeps_markup_for_media_urls() {
        let html = r#"<script>{"playAddr":"https://v16.tiktokcdn.com/video.mp4"}</script>"#;

        assert_eq!(
            media_url_in_markup(html).expect("Expected a media url"),
            "https://v16.tiktokcdn.com/video.mp4"
        );
        assert!(media_url_in_markup("<html></html>").is_none());
    }

    #[test]
    fn builds_results_from_hydration_items() {
        let item = json!({
            "desc": "funny clip",
            "author": { "nickname": "someone" },
            "stats": { "playCount": 1_500u64 },
            "video": {
                "duration": 45,
                "cover": "https://p16.tiktokcdn.com/cover.jpg",
                "downloadAddr": "https://v16.tiktokcdn.com/nowm.mp4",
                "playAddr": "https://v16.tiktokcdn.com/wm.mp4",
            },
            "music": { "playUrl": "https://sf16.tiktokcdn.com/music.m4a" },
        });

        let result = build_web_result(&item).expect("Expected a result");

        assert_eq!(result.title, "funny clip");
        assert_eq!(result.author, "someone");
        assert_eq!(result.views, "1.5K");
        assert_eq!(result.duration, "45s");

        assert_eq!(result.variants.len(), 3);
        assert_eq!(result.variants[0].quality, "HD (No Watermark)");
        assert_eq!(result.variants[2].kind, MediaKind::Audio);
    }

    #[test]
    fn posts_without_media_are_no_media_errors() {
        let item = json!({ "video": {} });

        assert!(matches!(
            build_web_result(&item),
            Err(StrategyError::NoMedia(_))
        ));
    }

    #[test]
    fn verification_pages_are_block_signals() {
        assert!(matches!(
            ensure_not_verification_page("<div class=\"tiktok-verify-page\"></div>"),
            Err(StrategyError::Blocked(_))
        ));
        assert!(ensure_not_verification_page("<html>fine</html>").is_ok());
    }

    #[test]
    fn mobile_results_convert_millisecond_durations() {
        let aweme = json!({
            "desc": "clip",
            "statistics": { "play_count": 2_300_000u64 },
            "video": {
                "duration": 125_000,
                "play_addr": {
                    "url_list": ["https://v16.tiktokcdn.com/wm.mp4"],
                    "data_size": 5_242_880u64,
                },
            },
        });

        let result = build_mobile_result(&aweme).expect("Expected a result");

        assert_eq!(result.duration, "2:05");
        assert_eq!(result.views, "2.3M");
        assert_eq!(result.variants.len(), 1);
        assert_eq!(result.variants[0].size, "5.00 MB");
    }
}
