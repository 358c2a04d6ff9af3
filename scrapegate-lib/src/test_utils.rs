use std::sync::Mutex;

use async_trait::async_trait;
use http::StatusCode;

use crate::telemetry::TelemetrySink;
use crate::{ErrorKind, Result, fetch::Fetcher};

/// Creates a JSON scrape payload for the given URL
pub(crate) fn payload(url: &str) -> Vec<u8> {
    serde_json::json!({ "url": url }).to_string().into_bytes()
}

/// A [`TelemetrySink`] which keeps every observation in memory, in order
#[derive(Debug, Default)]
pub(crate) struct RecordingSink {
    requests: Mutex<Vec<StatusCode>>,
    scrapes: Mutex<Vec<(String, StatusCode)>>,
    waits: Mutex<Vec<f64>>,
}

impl RecordingSink {
    pub(crate) fn request_outcomes(&self) -> Vec<StatusCode> {
        self.requests.lock().unwrap().clone()
    }

    pub(crate) fn scrape_outcomes(&self) -> Vec<(String, StatusCode)> {
        self.scrapes.lock().unwrap().clone()
    }

    pub(crate) fn admission_waits(&self) -> Vec<f64> {
        self.waits.lock().unwrap().clone()
    }
}

impl TelemetrySink for RecordingSink {
    fn inc_request_outcome(&self, status: StatusCode) {
        self.requests.lock().unwrap().push(status);
    }

    fn inc_scrape_outcome(&self, url: &str, status: StatusCode) {
        self.scrapes.lock().unwrap().push((url.to_string(), status));
    }

    fn observe_admission_wait(&self, millis: f64) {
        self.waits.lock().unwrap().push(millis);
    }

    fn shutdown(&self) {}
}

/// A [`Fetcher`] which answers every URL with the same status (or fails every
/// fetch) and remembers what was requested
#[derive(Debug)]
pub(crate) struct StaticFetcher {
    status: Option<StatusCode>,
    requested: Mutex<Vec<String>>,
}

impl StaticFetcher {
    /// Answers every non-empty URL with `status`, like a reachable host would.
    /// Empty URLs fail like they do for a real client.
    pub(crate) fn new(status: StatusCode) -> Self {
        Self {
            status: Some(status),
            requested: Mutex::new(Vec::new()),
        }
    }

    /// Fails every fetch
    pub(crate) fn failing() -> Self {
        Self {
            status: None,
            requested: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn requested(&self) -> Vec<String> {
        self.requested.lock().unwrap().clone()
    }
}

#[async_trait]
impl Fetcher for StaticFetcher {
    async fn fetch(&self, url: &str) -> Result<StatusCode> {
        self.requested.lock().unwrap().push(url.to_string());
        match self.status {
            Some(status) if !url.is_empty() => Ok(status),
            _ => Err(network_error(url)),
        }
    }
}

/// The error a real client reports when a request cannot be sent
fn network_error(url: &str) -> ErrorKind {
    // an unparsable URL fails before anything goes over the wire
    let source = reqwest::Client::new()
        .get("")
        .build()
        .expect_err("an empty URL cannot be requested");
    ErrorKind::NetworkRequest {
        url: url.to_string(),
        source,
    }
}
