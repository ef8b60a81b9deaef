//! Maps heterogeneous raw metadata documents into the canonical result shape.
//!
//! External aggregators and legacy strategies disagree on field names and on
//! whether numbers arrive as numbers or strings, so every lookup here is
//! defensive and every numeric display value is reformatted from scratch.

use serde_json::Value;

use crate::{
    common::scrape_result::{MediaKind, MediaVariant, ScrapeResult},
    format::{format_duration, format_views},
    platform::Platform,
};

#[must_use]
pub fn normalize(raw: &Value, platform: Platform) -> ScrapeResult {
    let mut result = ScrapeResult::new(platform);

    if let Some(title) = string_field(raw, &["title"]) {
        result.title = title;
    }
    if let Some(description) = string_field(raw, &["description"]) {
        result.description = description;
    }
    if let Some(thumbnail) = string_field(raw, &["thumbnail", "image"]) {
        result.thumbnail = thumbnail;
    }
    if let Some(author) = string_field(raw, &["uploader", "author", "channel"]) {
        result.author = author;
    }

    if let Some(duration) = number_field(raw, &["duration"]) {
        result.duration = format_duration(duration);
    }
    if let Some(views) = number_field(raw, &["view_count", "views"]) {
        result.views = format_views(views);
    }

    result.variants = variants_from(raw);
    result.sort_variants();

    result
}

fn variants_from(raw: &Value) -> Vec<MediaVariant> {
    if let Some(formats) = raw.get("formats").and_then(Value::as_array) {
        return formats.iter().filter_map(format_entry_variant).collect();
    }

    // Some aggregators return a single resolved link instead of a format list.
    string_field(raw, &["video_url", "download_url", "url"]).map_or_else(Vec::new, |url| {
        let quality = string_field(raw, &["quality"]).unwrap_or_else(|| "HD".to_string());

        vec![
            MediaVariant::new(quality, "mp4", MediaKind::Video, url)
                .with_size_bytes(number_field(raw, &["filesize"])),
        ]
    })
}

fn format_entry_variant(entry: &Value) -> Option<MediaVariant> {
    let url = string_field(entry, &["url", "download_url"])?;

    let quality = string_field(entry, &["quality", "resolution", "qualityLabel"])
        .unwrap_or_else(|| "Unknown".to_string());
    let container = string_field(entry, &["ext", "format"]).unwrap_or_else(|| "mp4".to_string());

    let is_video = entry
        .get("vcodec")
        .and_then(Value::as_str)
        .is_some_and(|x| x != "none");
    let kind = if is_video {
        MediaKind::Video
    } else {
        MediaKind::Audio
    };

    Some(
        MediaVariant::new(quality, &container, kind, url)
            .with_size_bytes(number_field(entry, &["filesize"])),
    )
}

fn string_field(value: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| {
        value
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|x| !x.is_empty())
            .map(ToString::to_string)
    })
}

fn number_field(value: &Value, keys: &[&str]) -> Option<u64> {
    keys.iter().find_map(|key| value.get(key).and_then(coerce_u64))
}

/// Numbers show up as integers, floats or digit strings depending on the source.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn coerce_u64(value: &Value) -> Option<u64> {
    if let Some(x) = value.as_u64() {
        return Some(x);
    }

    if let Some(x) = value.as_f64() {
        if x.is_finite() && x >= 0.0 {
            return Some(x.round() as u64);
        }
        return None;
    }

    value.as_str().and_then(|x| x.trim().parse().ok())
}
