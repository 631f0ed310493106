use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer, de};
use url::Url;

/// The default base URL of the metrics API.
pub const DEFAULT_UPSTREAM: &str = "https://metrics-api.librato.com/v1/";

/// Raised if a URL cannot be parsed into an [`UpstreamUrl`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, thiserror::Error)]
pub enum UpstreamParseError {
    /// Raised if an upstream could not be parsed as URL.
    #[error("invalid upstream URL: bad URL format")]
    BadUrl,
    /// Raised if an unknown or unsupported scheme is encountered.
    #[error("invalid upstream URL: unknown or unsupported URL scheme")]
    UnknownScheme,
    /// Raised if no host was provided.
    #[error("invalid upstream URL: no host")]
    NoHost,
    /// Raised if the URL carries a query string or fragment.
    #[error("invalid upstream URL: query or fragment given")]
    NotABase,
}

/// The base URL of the metrics API.
///
/// The URL always uses `http` or `https`, has a host and its path ends with a slash, so that
/// endpoint paths can be appended with [`join`](Self::join).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct UpstreamUrl(Url);

impl UpstreamUrl {
    /// Returns the URL of an endpoint relative to this base.
    ///
    /// ```
    /// use librato_config::UpstreamUrl;
    ///
    /// let upstream: UpstreamUrl = "https://metrics-api.librato.com/v1".parse().unwrap();
    /// assert_eq!(
    ///     upstream.join("metrics").as_str(),
    ///     "https://metrics-api.librato.com/v1/metrics"
    /// );
    /// ```
    pub fn join(&self, path: &str) -> Url {
        let mut url = self.0.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .extend(path.trim_start_matches('/').split('/'));
        }
        url
    }

    /// Returns the host name.
    pub fn host(&self) -> &str {
        self.0.host_str().unwrap_or_default()
    }

    /// Returns the full base URL.
    pub fn as_url(&self) -> &Url {
        &self.0
    }
}

impl Default for UpstreamUrl {
    fn default() -> Self {
        Self(Url::parse(DEFAULT_UPSTREAM).expect("default upstream is a valid URL"))
    }
}

impl fmt::Display for UpstreamUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl FromStr for UpstreamUrl {
    type Err = UpstreamParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut url = Url::parse(s).map_err(|_| UpstreamParseError::BadUrl)?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(UpstreamParseError::UnknownScheme);
        }

        if url.host_str().is_none_or(str::is_empty) {
            return Err(UpstreamParseError::NoHost);
        }

        if url.query().is_some_and(|q| !q.is_empty()) || url.fragment().is_some() {
            return Err(UpstreamParseError::NotABase);
        }

        url.set_query(None);
        if !url.path().ends_with('/') {
            let path = format!("{}/", url.path());
            url.set_path(&path);
        }

        Ok(Self(url))
    }
}

impl Serialize for UpstreamUrl {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for UpstreamUrl {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default() {
        let upstream = UpstreamUrl::default();
        assert_eq!(upstream.host(), "metrics-api.librato.com");
        assert_eq!(
            upstream.join("metrics").as_str(),
            "https://metrics-api.librato.com/v1/metrics"
        );
    }

    #[test]
    fn test_trailing_slash_normalized() {
        let with: UpstreamUrl = "http://localhost:8080/v1/".parse().unwrap();
        let without: UpstreamUrl = "http://localhost:8080/v1".parse().unwrap();
        assert_eq!(with, without);
        assert_eq!(with.to_string(), "http://localhost:8080/v1/");
    }

    #[test]
    fn test_join_nested() {
        let upstream: UpstreamUrl = "http://127.0.0.1:3000/v1/".parse().unwrap();
        assert_eq!(
            upstream.join("/annotations/deploys").as_str(),
            "http://127.0.0.1:3000/v1/annotations/deploys"
        );
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(
            "not a url".parse::<UpstreamUrl>(),
            Err(UpstreamParseError::BadUrl)
        );
        assert_eq!(
            "ftp://example.com/".parse::<UpstreamUrl>(),
            Err(UpstreamParseError::UnknownScheme)
        );
        assert_eq!(
            "https://example.com/v1?x=1".parse::<UpstreamUrl>(),
            Err(UpstreamParseError::NotABase)
        );
    }
}
