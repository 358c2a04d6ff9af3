use std::fmt::Display;

use http::StatusCode;
use serde::de::{Deserialize, IgnoredAny, MapAccess, Visitor};
use serde_json::Value;

/// Target of a single fetch, as sent by the caller.
///
/// The payload is a JSON object with one string field naming the target,
/// e.g. `{"url": "https://example.com"}`. The field name is matched
/// case-insensitively; if it appears more than once, the last string value
/// wins. Values of other types are skipped.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    /// The URL to fetch. Empty if the payload did not name one.
    pub url: String,
}

impl FetchRequest {
    /// Create a new [`FetchRequest`] for the given URL
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    /// Parse a request from a raw payload.
    ///
    /// A payload that is not a JSON object is not rejected here: the request
    /// keeps whatever URL could be extracted (usually none) and the fetch is
    /// left to fail on its own.
    #[must_use]
    pub fn from_payload(payload: &[u8]) -> Self {
        match serde_json::from_slice(payload) {
            Ok(request) => request,
            Err(e) => {
                log::debug!("Cannot parse payload as fetch request: {e}");
                Self::default()
            }
        }
    }
}

struct FetchRequestVisitor;

impl<'de> Visitor<'de> for FetchRequestVisitor {
    type Value = FetchRequest;

    fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
        formatter.write_str("a JSON object with a `url` field")
    }

    fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
    where
        A: MapAccess<'de>,
    {
        let mut request = FetchRequest::default();
        while let Some(key) = map.next_key::<String>()? {
            if !key.eq_ignore_ascii_case("url") {
                map.next_value::<IgnoredAny>()?;
                continue;
            }
            if let Value::String(url) = map.next_value::<Value>()? {
                request.url = url;
            }
        }
        Ok(request)
    }
}

impl<'de> Deserialize<'de> for FetchRequest {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        deserializer.deserialize_map(FetchRequestVisitor)
    }
}

/// A completed outbound round trip: the requested URL and the status the
/// remote answered with.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FetchResult {
    /// The requested URL
    pub url: String,
    /// The status returned by the remote, not necessarily a success
    pub status: StatusCode,
}

impl FetchResult {
    /// Create a new [`FetchResult`]
    #[must_use]
    pub fn new(url: impl Into<String>, status: StatusCode) -> Self {
        Self {
            url: url.into(),
            status,
        }
    }
}

impl Display for FetchResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} [{}]", self.url, self.status)
    }
}
