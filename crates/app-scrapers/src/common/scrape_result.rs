use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::{format::quality_rank, platform::Platform};

/// Sentinel source URL for variants that could not be resolved to raw media.
/// Callers must treat such variants as undownloadable.
pub const UNRESOLVED_URL: &str = "#";

pub const PLACEHOLDER_THUMBNAIL: &str = "https://via.placeholder.com/640x360";

pub const DEFAULT_TITLE: &str = "Video";
pub const DEFAULT_AUTHOR: &str = "Unknown";
pub const DEFAULT_DURATION: &str = "0:00";
pub const DEFAULT_VIEWS: &str = "0";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Video,
    Audio,
}

/// One downloadable rendition of the asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaVariant {
    pub quality: String,
    pub container: String,
    pub size: String,
    pub kind: MediaKind,
    pub source_url: String,
}

impl MediaVariant {
    #[must_use]
    pub fn new<Q, U>(quality: Q, container: &str, kind: MediaKind, source_url: U) -> Self
    where
        Q: Into<String>,
        U: Into<String>,
    {
        Self {
            quality: quality.into(),
            container: container.to_string(),
            size: "Unknown".to_string(),
            kind,
            source_url: source_url.into(),
        }
    }

    #[must_use]
    pub fn with_size_bytes(mut self, bytes: Option<u64>) -> Self {
        if let Some(bytes) = bytes.filter(|x| *x > 0) {
            self.size = crate::format::format_file_size(bytes);
        }
        self
    }

    #[must_use]
    pub fn is_usable(&self) -> bool {
        !self.source_url.is_empty() && self.source_url != UNRESOLVED_URL
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapeResult {
    pub platform: String,
    pub title: String,
    pub author: String,
    pub description: String,
    pub thumbnail: String,
    pub duration: String,
    pub views: String,
    pub variants: Vec<MediaVariant>,
}

impl ScrapeResult {
    #[must_use]
    pub fn new(platform: Platform) -> Self {
        Self {
            platform: platform.display_name().to_string(),
            title: DEFAULT_TITLE.to_string(),
            author: DEFAULT_AUTHOR.to_string(),
            description: String::new(),
            thumbnail: PLACEHOLDER_THUMBNAIL.to_string(),
            duration: DEFAULT_DURATION.to_string(),
            views: DEFAULT_VIEWS.to_string(),
            variants: Vec::new(),
        }
    }

    /// A result only counts as successful if it can actually be downloaded.
    #[must_use]
    pub fn has_usable_variant(&self) -> bool {
        self.variants.iter().any(MediaVariant::is_usable)
    }

    /// Order variants video-first, then best quality first within each kind.
    pub fn sort_variants(&mut self) {
        self.variants.sort_by(|lt, gt| {
            kind_rank(lt.kind)
                .cmp(&kind_rank(gt.kind))
                .then_with(|| quality_rank(&gt.quality).cmp(&quality_rank(&lt.quality)))
        });
    }

    /// Drop repeated (quality, kind) pairs, keeping the first occurrence.
    #[must_use]
    pub fn dedup_variants(mut self) -> Self {
        let mut seen = HashSet::new();
        self.variants
            .retain(|x| seen.insert((x.quality.clone(), x.kind)));
        self
    }
}

const fn kind_rank(kind: MediaKind) -> u8 {
    match kind {
        MediaKind::Video => 0,
        MediaKind::Audio => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unresolved_variants_are_not_usable() {
        let unresolved = MediaVariant::new("HD", "mp4", MediaKind::Video, UNRESOLVED_URL);
        assert!(!unresolved.is_usable());

        let empty = MediaVariant::new("HD", "mp4", MediaKind::Video, "");
        assert!(!empty.is_usable());

        let resolved = MediaVariant::new("HD", "mp4", MediaKind::Video, "https://cdn.example.com/v.mp4");
        assert!(resolved.is_usable());
    }

    #[test]
    fn result_success_requires_a_usable_variant() {
        let mut result = ScrapeResult::new(Platform::Tiktok);
        assert!(!result.has_usable_variant());

        result.variants.push(MediaVariant::new(
            "HD",
            "mp4",
            MediaKind::Video,
            UNRESOLVED_URL,
        ));
        assert!(!result.has_usable_variant());

        result.variants.push(MediaVariant::new(
            "SD",
            "mp4",
            MediaKind::Video,
            "https://cdn.example.com/v.mp4",
        ));
        assert!(result.has_usable_variant());
    }

    #[test]
    fn variants_sort_video_first_then_by_quality() {
        let mut result = ScrapeResult::new(Platform::Youtube);
        result.variants = vec![
            MediaVariant::new("Audio", "m4a", MediaKind::Audio, "https://a"),
            MediaVariant::new("720p", "mp4", MediaKind::Video, "https://b"),
            MediaVariant::new("4K", "mp4", MediaKind::Video, "https://c"),
            MediaVariant::new("1080p", "mp4", MediaKind::Video, "https://d"),
        ];

        result.sort_variants();

        let order = result
            .variants
            .iter()
            .map(|x| x.quality.as_str())
            .collect::<Vec<_>>();
        assert_eq!(order, ["4K", "1080p", "720p", "Audio"]);
    }

    #[test]
    fn dedup_keeps_first_of_each_quality_and_kind() {
        let mut result = ScrapeResult::new(Platform::Youtube);
        result.variants = vec![
            MediaVariant::new("720p", "mp4", MediaKind::Video, "https://a"),
            MediaVariant::new("720p", "mp4", MediaKind::Video, "https://b"),
            MediaVariant::new("720p", "m4a", MediaKind::Audio, "https://c"),
        ];

        let result = result.dedup_variants();

        assert_eq!(result.variants.len(), 2);
        assert_eq!(result.variants[0].source_url, "https://a");
    }

    #[test]
    fn sizes_are_attached_only_when_known() {
        let sized = MediaVariant::new("HD", "mp4", MediaKind::Video, "https://a")
            .with_size_bytes(Some(5_242_880));
        assert_eq!(sized.size, "5.00 MB");

        let r#unsized = MediaVariant::new("HD", "mp4", MediaKind::Video, "https://a")
            .with_size_bytes(None);
        assert_eq!(r#unsized.size, "Unknown");

        let zero = MediaVariant::new("HD", "mp4", MediaKind::Video, "https://a")
            .with_size_bytes(Some(0));
        assert_eq!(zero.size, "Unknown");
    }
}
