use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, trace};

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

const PLAYER_ENDPOINT: &str = "https://www.youtube.com/youtubei/v1/player";
const VIDEO_INFO_ENDPOINT: &str = "https://www.youtube.com/get_video_info";
const WEB_CLIENT_VERSION: &str = "2.20240620.05.00";

static VIDEO_ID_MATCH: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?:youtube\.com/watch\?v=|youtu\.be/)(?P<id>[^&\n?#/]+)",
        r"youtube\.com/embed/(?P<id>[^&\n?#/]+)",
        r"youtube\.com/shorts/(?P<id>[^&\n?#/]+)",
        r"youtube\.com/v/(?P<id>[^&\n?#/]+)",
    ]
    .iter()
    .map(|x| Regex::new(x).expect("Invalid regex"))
    .collect()
});

static PLAYER_RESPONSE_MATCH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)ytInitialPlayerResponse\s*=\s*(\{.+?\});").expect("Invalid regex")
});

/// Queries the internal `youtubei` player endpoint with a web client identity.
#[derive(Debug, Default, Clone)]
pub struct PlayerApi;

#[async_trait::async_trait]
impl Strategy for PlayerApi {
    fn name(&self) -> &'static str {
        "youtube-player-api"
    }

    fn description(&self) -> &'static str {
        "Queries the internal youtubei player endpoint"
    }

    async fn attempt(&self, request: &ScrapeRequest) -> Result<ScrapeResult, StrategyError> {
        let video_id = extract_video_id(request.url.as_str())?;

        debug!(video_id, "Querying youtubei player endpoint");

        let body = json!({
            "videoId": video_id,
            "context": {
                "client": {
                    "clientName": "WEB",
                    "clientVersion": WEB_CLIENT_VERSION,
                },
            },
        });

        let options = FetchOptions::post_json(body)
            .with_header("X-YouTube-Client-Name", "1")
            .with_header("X-YouTube-Client-Version", WEB_CLIENT_VERSION);

        let player_response = fetch_with_retry(PLAYER_ENDPOINT, &options)
            .await?
            .json::<PlayerResponse>()
            .await
            .map_err(|e| StrategyError::Parse(format!("player response: {e}")))?;

        build_result(&player_response, &video_id)
    }
}

/// Scrapes the embedded player config out of the public embed page.
#[derive(Debug, Default, Clone)]
pub struct EmbedPage;

#[async_trait::async_trait]
impl Strategy for EmbedPage {
    fn name(&self) -> &'static str {
        "youtube-embed-page"
    }

    fn description(&self) -> &'static str {
        "Extracts the player config embedded in the embed page"
    }

    async fn attempt(&self, request: &ScrapeRequest) -> Result<ScrapeResult, StrategyError> {
        let video_id = extract_video_id(request.url.as_str())?;

        debug!(video_id, "Fetching embed page");

        let embed_url = format!("https://www.youtube.com/embed/{video_id}");
        let options = FetchOptions::get().with_headers(request.headers.clone());

        let html = fetch_with_retry(&embed_url, &options)
            .await?
            .text()
            .await
            .map_err(|e| StrategyError::Parse(format!("embed page body: {e}")))?;

        let raw = PLAYER_RESPONSE_MATCH
            .captures(&html)
            .and_then(|x| x.get(1))
            .ok_or_else(|| {
                StrategyError::Parse("no player response found in embed page".to_string())
            })?;

        trace!("Found embedded player response");

        let player_response = serde_json::from_str::<PlayerResponse>(raw.as_str())
            .map_err(|e| StrategyError::Parse(format!("embedded player response: {e}")))?;

        build_result(&player_response, &video_id)
    }
}

/// Legacy `get_video_info` endpoint; lowest priority.
#[derive(Debug, Default, Clone)]
pub struct VideoInfo;

#[async_trait::async_trait]
impl Strategy for VideoInfo {
    fn name(&self) -> &'static str {
        "youtube-video-info"
    }

    fn description(&self) -> &'static str {
        "Queries the legacy get_video_info endpoint"
    }

    async fn attempt(&self, request: &ScrapeRequest) -> Result<ScrapeResult, StrategyError> {
        let video_id = extract_video_id(request.url.as_str())?;

        debug!(video_id, "Querying get_video_info endpoint");

        let info_url = format!("{VIDEO_INFO_ENDPOINT}?video_id={video_id}");

        let body = fetch_with_retry(&info_url, &FetchOptions::get())
            .await?
            .text()
            .await
            .map_err(|e| StrategyError::Parse(format!("video info body: {e}")))?;

        let player_response_raw = form_urlencoded::parse(body.as_bytes())
            .find(|(k, _)| k == "player_response")
            .map(|(_, v)| v.into_owned())
            .ok_or_else(|| {
                StrategyError::Parse("no player_response field in video info".to_string())
            })?;

        let player_response = serde_json::from_str::<PlayerResponse>(&player_response_raw)
            .map_err(|e| StrategyError::Parse(format!("video info player response: {e}")))?;

        build_result(&player_response, &video_id)
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
        .ok_or_else(|| StrategyError::Parse("not a recognized video URL".to_string()))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct PlayerResponse {
    video_details: VideoDetails,
    streaming_data: StreamingData,
    playability_status: PlayabilityStatus,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct VideoDetails {
    title: Option<String>,
    author: Option<String>,
    length_seconds: Option<String>,
    view_count: Option<String>,
    short_description: Option<String>,
    thumbnail: Thumbnails,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Thumbnails {
    thumbnails: Vec<Thumbnail>,
}

#[derive(Debug, Deserialize)]
struct Thumbnail {
    url: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct StreamingData {
    formats: Vec<RawFormat>,
    adaptive_formats: Vec<RawFormat>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawFormat {
    url: Option<String>,
    mime_type: Option<String>,
    quality: Option<String>,
    quality_label: Option<String>,
    audio_quality: Option<String>,
    content_length: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct PlayabilityStatus {
    status: Option<String>,
    reason: Option<String>,
}

fn build_result(resp: &PlayerResponse, video_id: &str) -> Result<ScrapeResult, StrategyError> {
    if let Some(status) = &resp.playability_status.status {
        if matches!(status.as_str(), "LOGIN_REQUIRED" | "UNPLAYABLE") {
            return Err(StrategyError::Blocked(
                resp.playability_status
                    .reason
                    .clone()
                    .unwrap_or_else(|| status.clone()),
            ));
        }
    }

    let streaming = &resp.streaming_data;
    let mut variants = Vec::new();

    for format in streaming
        .adaptive_formats
        .iter()
        .filter(|x| is_mime_kind(x, "video"))
    {
        push_video_variant(&mut variants, format);
    }

    for format in streaming
        .adaptive_formats
        .iter()
        .filter(|x| is_mime_kind(x, "audio"))
        .take(2)
    {
        push_audio_variant(&mut variants, format);
    }

    // Combined (video + audio) renditions come last so the adaptive
    // qualities win the dedup for their label.
    for format in &streaming.formats {
        push_video_variant(&mut variants, format);
    }

    if variants.is_empty() {
        return Err(StrategyError::NoMedia(
            "no downloadable formats in player response".to_string(),
        ));
    }

    let details = &resp.video_details;
    let mut result = ScrapeResult::new(Platform::Youtube);

    if let Some(title) = &details.title {
        result.title = title.clone();
    }
    if let Some(author) = &details.author {
        result.author = author.clone();
    }
    if let Some(description) = &details.short_description {
        result.description = description.clone();
    }

    result.thumbnail = details.thumbnail.thumbnails.last().map_or_else(
        || format!("https://i.ytimg.com/vi/{video_id}/maxresdefault.jpg"),
        |x| x.url.clone(),
    );
    result.duration = format_duration(parsed_number(&details.length_seconds));
    result.views = format_views(parsed_number(&details.view_count));
    result.variants = variants;

    Ok(result.dedup_variants())
}

fn is_mime_kind(format: &RawFormat, kind: &str) -> bool {
    format.mime_type.as_deref().is_some_and(|x| x.starts_with(kind))
}

fn push_video_variant(variants: &mut Vec<MediaVariant>, format: &RawFormat) {
    // Signature-ciphered formats carry no direct URL and are skipped.
    let Some(url) = &format.url else { return };

    let quality = format
        .quality_label
        .clone()
        .or_else(|| format.quality.clone())
        .unwrap_or_else(|| "Unknown".to_string());

    variants.push(
        MediaVariant::new(quality, "mp4", MediaKind::Video, url)
            .with_size_bytes(content_length(format)),
    );
}

fn push_audio_variant(variants: &mut Vec<MediaVariant>, format: &RawFormat) {
    let Some(url) = &format.url else { return };

    let quality = format
        .audio_quality
        .clone()
        .unwrap_or_else(|| "High Quality".to_string());
    let container = if format.mime_type.as_deref().is_some_and(|x| x.contains("webm")) {
        "webm"
    } else {
        "m4a"
    };

    variants.push(
        MediaVariant::new(quality, container, MediaKind::Audio, url)
            .with_size_bytes(content_length(format)),
    );
}

fn content_length(format: &RawFormat) -> Option<u64> {
    format.content_length.as_deref().and_then(|x| x.parse().ok())
}

fn parsed_number(value: &Option<String>) -> u64 {
    value
        .as_deref()
        .and_then(|x| x.parse().ok())
        .unwrap_or_default()
}
