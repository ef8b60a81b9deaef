use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
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

const GRAPHQL_ENDPOINT: &str = "https://www.instagram.com/graphql/query/";
const GRAPHQL_DOC_ID: &str = "25531498899829322";
const APP_ID: &str = "936619743392459";

static URL_MATCH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^https?://(www\.)?instagram\.com/(p|reel|tv)/(?P<shortcode>[^/?#]+)")
        .expect("Invalid regex")
});

static LD_JSON_MATCH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?s)<script type="application/ld\+json"[^>]*>(.+?)</script>"#)
        .expect("Invalid regex")
});

static SHARED_DATA_MATCH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)window\._sharedData\s*=\s*(\{.+?\});</script>").expect("Invalid regex")
});

/// GraphQL document query, the same call the web client makes.
#[derive(Debug, Default, Clone)]
pub struct GraphApi;

#[async_trait::async_trait]
impl Strategy for GraphApi {
    fn name(&self) -> &'static str {
        "instagram-graph-api"
    }

    fn description(&self) -> &'static str {
        "Queries the GraphQL document endpoint used by the web client"
    }

    async fn attempt(&self, request: &ScrapeRequest) -> Result<ScrapeResult, StrategyError> {
        let shortcode = extract_shortcode(request.url.as_str())?;

        debug!(shortcode, "Querying instagram graphql endpoint");

        let query_variables = serde_json::json!({
            "shortcode": shortcode,
            "fetch_comment_count": 0,
            "parent_comment_count": 0,
            "child_comment_count": 0,
            "fetch_like_count": 0,
            "fetch_tagged_user_count": null,
            "fetch_preview_comment_count": 2,
            "has_threaded_comments": true,
            "hoisted_comment_id": null,
            "hoisted_reply_id": null,
        });
        let query_variables_str = serde_json::to_string(&query_variables)
            .map_err(|e| StrategyError::Parse(format!("query variables: {e}")))?;

        let form_body = {
            let mut q = form_urlencoded::Serializer::new(String::new());

            q.append_pair("variables", &query_variables_str);
            q.append_pair("server_timestamps", "true");
            q.append_pair("doc_id", GRAPHQL_DOC_ID);

            q.finish()
        };
        trace!(?form_body, "GraphQL form body");

        let options = FetchOptions::post_form(form_body).with_header("X-IG-App-ID", APP_ID);

        let resp = fetch_with_retry(GRAPHQL_ENDPOINT, &options)
            .await?
            .json::<Value>()
            .await
            .map_err(|e| StrategyError::Parse(format!("graphql response: {e}")))?;

        let media = resp
            .get("data")
            .and_then(|x| x.get("xdt_shortcode_media"))
            .ok_or_else(|| StrategyError::NoMedia("no media in graphql response".to_string()))?;

        media_result(media)
    }
}

/// Page scrape of the metadata blocks embedded in the post page.
#[derive(Debug, Default, Clone)]
pub struct WebPage;

#[async_trait::async_trait]
impl Strategy for WebPage {
    fn name(&self) -> &'static str {
        "instagram-web-page"
    }

    fn description(&self) -> &'static str {
        "Extracts LD+JSON or shared-data blocks from the post page"
    }

    async fn attempt(&self, request: &ScrapeRequest) -> Result<ScrapeResult, StrategyError> {
        // Instagram serves a different document without the trailing slash.
        let page_url = if request.url.as_str().ends_with('/') {
            request.url.to_string()
        } else {
            format!("{}/", request.url)
        };

        debug!("Fetching instagram post page");

        let options = FetchOptions::get().with_headers(request.headers.clone());

        let resp = fetch_with_retry(&page_url, &options).await?;

        if resp.url().path().starts_with("/accounts/login") {
            return Err(StrategyError::Blocked(
                "post page redirected to the login wall".to_string(),
            ));
        }

        let html = resp
            .text()
            .await
            .map_err(|e| StrategyError::Parse(format!("post page body: {e}")))?;

        page_result(&html)
    }
}

fn extract_shortcode(url: &str) -> Result<String, StrategyError> {
    URL_MATCH
        .captures(url)
        .and_then(|x| x.name("shortcode"))
        .map(|x| x.as_str().to_string())
        .ok_or_else(|| StrategyError::Parse("not an instagram post URL".to_string()))
}

fn page_result(html: &str) -> Result<ScrapeResult, StrategyError> {
    if let Some(raw) = LD_JSON_MATCH.captures(html).and_then(|x| x.get(1)) {
        if let Ok(doc) = serde_json::from_str::<Value>(raw.as_str()) {
            if doc.get("@type").and_then(Value::as_str) == Some("VideoObject") {
                trace!("Found LD+JSON video object");
                return ld_json_result(&doc);
            }
        }
    }

    if let Some(raw) = SHARED_DATA_MATCH.captures(html).and_then(|x| x.get(1)) {
        if let Ok(doc) = serde_json::from_str::<Value>(raw.as_str()) {
            let media = doc
                .get("entry_data")
                .and_then(|x| x.get("PostPage"))
                .and_then(|x| x.get(0))
                .and_then(|x| x.get("graphql"))
                .and_then(|x| x.get("shortcode_media"));

            if let Some(media) = media {
                trace!("Found shared-data media");
                return media_result(media);
            }
        }
    }

    Err(StrategyError::Parse(
        "no recognizable metadata blocks in post page".to_string(),
    ))
}

fn media_result(media: &Value) -> Result<ScrapeResult, StrategyError> {
    let mut variants = Vec::new();

    if is_video(media) {
        if let Some(url) = media.get("video_url").and_then(Value::as_str) {
            variants.push(MediaVariant::new("HD", "mp4", MediaKind::Video, url));
        }
    }

    // Carousel posts keep their videos in sidecar children.
    if let Some(edges) = media
        .get("edge_sidecar_to_children")
        .and_then(|x| x.get("edges"))
        .and_then(Value::as_array)
    {
        for edge in edges {
            let Some(node) = edge.get("node") else { continue };
            if !is_video(node) {
                continue;
            }
            if let Some(url) = node.get("video_url").and_then(Value::as_str) {
                variants.push(MediaVariant::new("HD", "mp4", MediaKind::Video, url));
            }
        }
    }

    if variants.is_empty() {
        return Err(StrategyError::NoMedia(
            "post contains no video".to_string(),
        ));
    }

    let mut result = ScrapeResult::new(Platform::Instagram);

    if let Some(caption) = caption(media) {
        result.description.clone_from(&caption);
        result.title = caption;
    }
    if let Some(author) = media
        .get("owner")
        .and_then(|x| x.get("username"))
        .and_then(Value::as_str)
    {
        result.author = author.to_string();
    }
    if let Some(thumbnail) = media
        .get("display_url")
        .and_then(Value::as_str)
        .or_else(|| media.get("thumbnail_src").and_then(Value::as_str))
    {
        result.thumbnail = thumbnail.to_string();
    }
    if let Some(duration) = media.get("video_duration").and_then(Value::as_f64) {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let seconds = duration.max(0.0).round() as u64;
        result.duration = format_duration(seconds);
    }
    if let Some(views) = media
        .get("video_view_count")
        .and_then(Value::as_u64)
        .or_else(|| {
            media
                .get("edge_media_preview_like")
                .and_then(|x| x.get("count"))
                .and_then(Value::as_u64)
        })
    {
        result.views = format_views(views);
    }

    result.variants = variants;

    Ok(result)
}

fn ld_json_result(doc: &Value) -> Result<ScrapeResult, StrategyError> {
    let content_url = doc
        .get("contentUrl")
        .and_then(Value::as_str)
        .ok_or_else(|| StrategyError::NoMedia("video object has no content URL".to_string()))?;

    let mut result = ScrapeResult::new(Platform::Instagram);

    if let Some(title) = doc
        .get("caption")
        .and_then(Value::as_str)
        .or_else(|| doc.get("name").and_then(Value::as_str))
    {
        result.title = title.to_string();
    }
    if let Some(description) = doc.get("description").and_then(Value::as_str) {
        result.description = description.to_string();
    }
    if let Some(thumbnail) = doc.get("thumbnailUrl").and_then(Value::as_str) {
        result.thumbnail = thumbnail.to_string();
    }
    if let Some(author) = doc
        .get("author")
        .and_then(|x| x.get("name"))
        .and_then(Value::as_str)
    {
        result.author = author.to_string();
    }

    result.variants = vec![MediaVariant::new(
        "HD",
        "mp4",
        MediaKind::Video,
        content_url,
    )];

    Ok(result)
}

fn is_video(media: &Value) -> bool {
    media
        .get("is_video")
        .and_then(Value::as_bool)
        .unwrap_or(false)
        || media
            .get("__typename")
            .and_then(Value::as_str)
            .is_some_and(|x| x == "GraphVideo" || x == "XDTGraphVideo")
}

fn caption(media: &Value) -> Option<String> {
    media
        .get("edge_media_to_caption")
        .and_then(|x| x.get("edges"))
        .and_then(|x| x.get(0))
        .and_then(|x| x.get("node"))
        .and_then(|x| x.get("text"))
        .and_then(Value::as_str)
        .filter(|x| !x.is_empty())
        .map(ToString::to_string)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn recognizes_post_url_shapes() {
        assert_eq!(
            extract_shortcode("https://www.instagram.com/p/Cabc123/").expect("Expected shortcode"),
            "Cabc123"
        );
        assert_eq!(
            extract_shortcode("https://instagram.com/reel/Xyz_9-8?utm_source=ig")
                .expect("Expected shortcode"),
            "Xyz_9-8"
        );
        assert!(extract_shortcode("https://www.instagram.com/someuser/").is_err());
    }

    #[test]
    fn builds_results_from_graph_media() {
        let media = json!({
            "__typename": "XDTGraphVideo",
            "is_video": true,
            "video_url": "https://scontent.cdninstagram.com/v.mp4",
            "display_url": "https://scontent.cdninstagram.com/cover.jpg",
            "video_duration": 45.2,
            "video_view_count": 950,
            "owner": { "username": "someone" },
            "edge_media_to_caption": {
                "edges": [ { "node": { "text": "a reel" } } ],
            },
        });

        let result = media_result(&media).expect("Expected a result");

        assert_eq!(result.title, "a reel");
        assert_eq!(result.author, "someone");
        assert_eq!(result.duration, "45s");
        assert_eq!(result.views, "950");
        assert_eq!(result.variants.len(), 1);
        assert!(result.has_usable_variant());
    }

    #[test]
    fn collects_carousel_videos() {
        let media = json!({
            "is_video": false,
            "edge_sidecar_to_children": {
                "edges": [
                    { "node": { "is_video": true, "video_url": "https://cdn/v1.mp4" } },
                    { "node": { "is_video": false, "display_url": "https://cdn/i1.jpg" } },
                    { "node": { "is_video": true, "video_url": "https://cdn/v2.mp4" } },
                ],
            },
        });

        let result = media_result(&media).expect("Expected a result");

        assert_eq!(result.variants.len(), 2);
    }

    #[test]
    fn image_posts_are_no_media_errors() {
        let media = json!({
            "is_video": false,
            "display_url": "https://cdn/image.jpg",
        });

        assert!(matches!(
            media_result(&media),
            Err(StrategyError::NoMedia(_))
        ));
    }

    #[test]
    fn parses_ld_json_video_objects() {
        let html = concat!(
            r#"<html><head><script type="application/ld+json">"#,
            r#"{"@type":"VideoObject","contentUrl":"https://cdn/v.mp4","name":"clip","#,
            r#""thumbnailUrl":"https://cdn/t.jpg","author":{"name":"someone"}}"#,
            r#"</script></head></html>"#,
        );

        let result = page_result(html).expect("Expected a result");

        assert_eq!(result.title, "clip");
        assert_eq!(result.author, "someone");
        assert!(result.has_usable_variant());
    }

    #[test]
    fn unrecognizable_pages_are_parse_errors() {
        assert!(matches!(
            page_result("<html><body>nothing here</body></html>"),
            Err(StrategyError::Parse(_))
        ));
    }
}
