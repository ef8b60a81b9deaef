use std::time::{Duration, Instant};

use app_config::Config;
use app_helpers::file_name::download_file_name;
use app_scrapers::{ScrapeError, ScrapeResult};
use axum::{
    body::Body,
    http::{header, HeaderValue, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info, warn};
use url::Url;

use crate::server::rate_limit;

const PROXY_TIMEOUT: Duration = Duration::from_secs(30);

pub(super) fn router() -> Router {
    Router::new()
        .route("/scrape", post(scrape))
        .route("/download-file", post(download_file))
        .layer(middleware::from_fn(rate_limit::middleware))
}

#[derive(Debug, Deserialize)]
struct ScrapeBody {
    url: String,
}

#[derive(Debug, Serialize)]
struct ScrapeResponse {
    success: bool,
    #[serde(flatten)]
    result: ScrapeResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    processing_time: String,
}

async fn scrape(Json(body): Json<ScrapeBody>) -> Response {
    let started_at = Instant::now();

    info!(url = body.url, "Processing scrape request");

    match app_scrapers::extract(&body.url).await {
        Ok(result) => {
            info!(elapsed = ?started_at.elapsed(), "Scrape succeeded");

            Json(ScrapeResponse {
                success: true,
                result,
                error: None,
                processing_time: processing_time(started_at),
            })
            .into_response()
        }
        Err(e @ ScrapeError::InvalidUrl(_)) => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": e.to_string() })),
        )
            .into_response(),
        Err(ScrapeError::ExtractionFailed { platform, reasons }) => {
            warn!(%platform, ?reasons, "Scrape failed");

            // Soft failure keeps the UI alive; the empty variant list marks
            // the miss unambiguously.
            let mut result = ScrapeResult::new(platform);
            result.title = "Unable to fetch video".to_string();
            result.description = "The video could not be fetched. It may be private, restricted, \
                                  or the platform may be blocking automated access."
                .to_string();

            Json(ScrapeResponse {
                success: false,
                result,
                error: reasons.last().cloned(),
                processing_time: processing_time(started_at),
            })
            .into_response()
        }
    }
}

fn processing_time(started_at: Instant) -> String {
    format!("{}ms", started_at.elapsed().as_millis())
}

#[derive(Debug, Deserialize)]
struct DownloadFileBody {
    url: String,
    #[serde(default)]
    filename: Option<String>,
    #[serde(default)]
    quality: Option<String>,
}

/// Byte passthrough for a previously extracted media URL.
///
/// Bounded by a per-request timeout and a configured size ceiling; this
/// service never stores the media it forwards.
async fn download_file(Json(body): Json<DownloadFileBody>) -> Response {
    let url = match Url::parse(&body.url) {
        Ok(url) => url,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": format!("Invalid download URL: {e}") })),
            )
                .into_response();
        }
    };

    let max_bytes = Config::global().server().max_proxy_bytes;

    debug!(%url, "Proxying download");

    let client = match app_scrapers::Client::base() {
        Ok(client) => client,
        Err(e) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": e.to_string() })),
            )
                .into_response();
        }
    };

    let origin = format!("{}://{}", url.scheme(), url.host_str().unwrap_or_default());

    let resp = client
        .get(url.clone())
        .timeout(PROXY_TIMEOUT)
        .header(header::ACCEPT, "*/*")
        .header(header::REFERER, format!("{origin}/"))
        .send()
        .await;

    let resp = match resp {
        Ok(resp) if resp.status().is_success() => resp,
        Ok(resp) => {
            warn!(status = %resp.status(), %url, "Upstream refused the download");
            return (
                StatusCode::BAD_GATEWAY,
                Json(json!({ "error": format!("Upstream responded with {}", resp.status()) })),
            )
                .into_response();
        }
        Err(e) => {
            warn!(error = %e, %url, "Failed to reach upstream");
            return (
                StatusCode::BAD_GATEWAY,
                Json(json!({ "error": format!("Failed to fetch file: {e}") })),
            )
                .into_response();
        }
    };

    if resp.content_length().is_some_and(|x| x > max_bytes) {
        return too_large(max_bytes);
    }

    let content_type = resp
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|x| x.to_str().ok())
        .unwrap_or("application/octet-stream")
        .to_string();

    let mut stream = resp.bytes_stream();
    let mut buffer = Vec::new();

    while let Some(chunk) = stream.next().await {
        match chunk {
            Ok(chunk) => {
                if (buffer.len() + chunk.len()) as u64 > max_bytes {
                    return too_large(max_bytes);
                }
                buffer.extend_from_slice(&chunk);
            }
            Err(e) => {
                warn!(error = %e, %url, "Upstream stream failed mid-transfer");
                return (
                    StatusCode::BAD_GATEWAY,
                    Json(json!({ "error": format!("Download interrupted: {e}") })),
                )
                    .into_response();
            }
        }
    }

    let filename = match body.filename {
        Some(name) if !name.trim().is_empty() => name,
        _ => download_file_name(
            "video",
            body.quality.as_deref().unwrap_or("hd"),
            extension_for_mime(&content_type),
        ),
    };

    debug!(filename, bytes = buffer.len(), "Proxied download complete");

    let disposition = HeaderValue::from_str(&format!("attachment; filename=\"{filename}\""))
        .unwrap_or_else(|_| HeaderValue::from_static("attachment; filename=\"video.mp4\""));

    (
        [
            (
                header::CONTENT_TYPE,
                HeaderValue::from_str(&content_type)
                    .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream")),
            ),
            (header::CONTENT_DISPOSITION, disposition),
            (
                header::CACHE_CONTROL,
                HeaderValue::from_static("no-store, no-cache, must-revalidate"),
            ),
        ],
        Body::from(buffer),
    )
        .into_response()
}

fn too_large(max_bytes: u64) -> Response {
    (
        StatusCode::PAYLOAD_TOO_LARGE,
        Json(json!({ "error": format!("File exceeds the {max_bytes} byte limit") })),
    )
        .into_response()
}

fn extension_for_mime(mime: &str) -> &'static str {
    match mime.split(';').next().map(str::trim) {
        Some("video/mp4") => "mp4",
        Some("video/webm" | "audio/webm") => "webm",
        Some("video/quicktime") => "mov",
        Some("audio/mpeg") => "mp3",
        Some("audio/mp4") => "m4a",
        Some("image/jpeg") => "jpg",
        Some("image/png") => "png",
        Some("image/gif") => "gif",
        _ => "bin",
    }
}
