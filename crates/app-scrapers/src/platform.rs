use std::fmt;

use serde::{Deserialize, Serialize};
use url::Url;

/// Hostname suffixes checked in order; first match wins.
const HOST_TABLE: &[(&str, Platform)] = &[
    ("youtube.com", Platform::Youtube),
    ("youtu.be", Platform::Youtube),
    ("instagram.com", Platform::Instagram),
    ("tiktok.com", Platform::Tiktok),
    ("facebook.com", Platform::Facebook),
    ("fb.watch", Platform::Facebook),
    ("twitter.com", Platform::Twitter),
    ("x.com", Platform::Twitter),
    ("pinterest.com", Platform::Pinterest),
    ("pin.it", Platform::Pinterest),
    ("linkedin.com", Platform::Linkedin),
    ("reddit.com", Platform::Reddit),
    ("redd.it", Platform::Reddit),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Youtube,
    Instagram,
    Tiktok,
    Facebook,
    Twitter,
    Pinterest,
    Linkedin,
    Reddit,
    Unknown,
}

impl Platform {
    /// Classify a URL by its hostname.
    ///
    /// Total over arbitrary input: anything that does not parse as an
    /// absolute URL, or whose host matches no table entry, is `Unknown`.
    #[must_use]
    pub fn classify(url: &str) -> Self {
        Url::parse(url).map_or(Self::Unknown, |x| Self::from_url(&x))
    }

    #[must_use]
    pub fn from_url(url: &Url) -> Self {
        let host = match url.host_str() {
            Some(host) => host.to_ascii_lowercase(),
            None => return Self::Unknown,
        };

        HOST_TABLE
            .iter()
            .find(|(domain, _)| host == *domain || host.ends_with(&format!(".{domain}")))
            .map_or(Self::Unknown, |(_, platform)| *platform)
    }

    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::Youtube => "YouTube",
            Self::Instagram => "Instagram",
            Self::Tiktok => "TikTok",
            Self::Facebook => "Facebook",
            Self::Twitter => "Twitter",
            Self::Pinterest => "Pinterest",
            Self::Linkedin => "LinkedIn",
            Self::Reddit => "Reddit",
            Self::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}
