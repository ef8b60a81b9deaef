use http::HeaderMap;
use url::Url;

/// A single extraction request.
///
/// Built once per inbound URL and shared read-only by every strategy the
/// request passes through.
#[derive(Debug, Clone)]
pub struct ScrapeRequest {
    pub url: Url,
    pub headers: HeaderMap,
}

impl ScrapeRequest {
    #[must_use]
    pub fn new<T>(url: T) -> Self
    where
        T: Into<Url>,
    {
        Self {
            url: url.into(),
            headers: HeaderMap::default(),
        }
    }
}

impl From<Url> for ScrapeRequest {
    fn from(url: Url) -> Self {
        Self::new(url)
    }
}

impl From<&Url> for ScrapeRequest {
    fn from(url: &Url) -> Self {
        url.clone().into()
    }
}

impl TryFrom<&str> for ScrapeRequest {
    type Error = url::ParseError;

    fn try_from(url: &str) -> Result<Self, Self::Error> {
        let parsed_url = Url::parse(url)?;

        Ok(parsed_url.into())
    }
}

impl TryFrom<String> for ScrapeRequest {
    type Error = url::ParseError;

    fn try_from(url: String) -> Result<Self, Self::Error> {
        url.as_str().try_into()
    }
}

impl TryFrom<&String> for ScrapeRequest {
    type Error = url::ParseError;

    fn try_from(url: &String) -> Result<Self, Self::Error> {
        url.as_str().try_into()
    }
}
