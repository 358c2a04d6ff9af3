//! The unit of work guarded by the admission gate: one outbound GET on behalf
//! of a caller.
//!
//! This module defines the [`Fetcher`] capability with its production
//! implementation [`ReqwestFetcher`], and [`FetchOperation`], which turns an
//! inbound request into an [`Outcome`].
#![allow(clippy::module_name_repetitions)]

use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use http::{Method, StatusCode};
use log::{debug, warn};

use crate::telemetry::TelemetrySink;
use crate::{ErrorKind, FetchRequest, FetchResult, Outcome, Result};

/// User agent sent with every fetch, `scrapegate/<PKG_VERSION>`.
pub const DEFAULT_USER_AGENT: &str = concat!("scrapegate/", env!("CARGO_PKG_VERSION"));

/// Performs a single outbound GET and reports the remote status.
#[async_trait]
pub trait Fetcher: Send + Sync + std::fmt::Debug {
    /// Fetch `url` once.
    ///
    /// # Errors
    ///
    /// Returns an error if no response was received, e.g. because the URL is
    /// malformed, the host is unreachable or the TLS handshake failed.
    async fn fetch(&self, url: &str) -> Result<StatusCode>;
}

/// [`Fetcher`] backed by a `reqwest` client.
///
/// The client connects directly (proxy settings from the environment are
/// ignored), never follows redirects and never verifies remote certificates.
/// None of this is configurable.
#[derive(Debug, Clone)]
pub struct ReqwestFetcher {
    client: reqwest::Client,
}

impl ReqwestFetcher {
    /// Create a new fetcher.
    ///
    /// # Errors
    ///
    /// Returns an `Err` if the request client cannot be created.
    /// See [here](https://docs.rs/reqwest/latest/reqwest/struct.ClientBuilder.html#errors).
    pub fn new() -> Result<Self> {
        let client = reqwest::ClientBuilder::new()
            .gzip(true)
            .user_agent(DEFAULT_USER_AGENT)
            .no_proxy()
            .danger_accept_invalid_certs(true)
            // The first response is final, redirects are reported as is.
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(ErrorKind::BuildFetchClient)?;

        Ok(Self { client })
    }
}

#[async_trait]
impl Fetcher for ReqwestFetcher {
    async fn fetch(&self, url: &str) -> Result<StatusCode> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|source| ErrorKind::NetworkRequest {
                url: url.to_string(),
                source,
            })?;
        Ok(response.status())
    }
}

/// Turns an inbound scrape request into an [`Outcome`].
#[derive(Debug, Clone)]
pub struct FetchOperation {
    fetcher: Arc<dyn Fetcher>,
    sink: Arc<dyn TelemetrySink>,
}

impl FetchOperation {
    /// Create a new operation fetching with `fetcher` and reporting to `sink`
    #[must_use]
    pub fn new(fetcher: Arc<dyn Fetcher>, sink: Arc<dyn TelemetrySink>) -> Self {
        Self { fetcher, sink }
    }

    /// Execute one scrape request without recording telemetry.
    ///
    /// `body` is only awaited for `POST` requests. Only a completed round
    /// trip yields a [`FetchResult`], whatever status the remote answered with.
    pub async fn execute<B, P, E>(&self, method: &Method, body: B) -> (Outcome, Option<FetchResult>)
    where
        B: Future<Output = std::result::Result<P, E>>,
        P: AsRef<[u8]>,
        E: Display,
    {
        if *method != Method::POST {
            debug!("Unsupported method {method}");
            return (Outcome::NotImplemented, None);
        }

        let payload = match body.await {
            Ok(payload) => payload,
            Err(e) => {
                warn!("Cannot read request body: {e}");
                return (Outcome::InternalServerError, None);
            }
        };

        let FetchRequest { url } = FetchRequest::from_payload(payload.as_ref());
        match self.fetcher.fetch(&url).await {
            Ok(status) => {
                let result = FetchResult::new(url, status);
                debug!("Fetched {result}");
                (Outcome::Ok, Some(result))
            }
            Err(e) => {
                match e.details() {
                    Some(details) => debug!("{e}: {details}"),
                    None => debug!("{e}"),
                }
                (Outcome::BadRequest, None)
            }
        }
    }

    /// Execute one scrape request and record its telemetry.
    ///
    /// A scrape outcome is recorded if and only if the round trip completed,
    /// the request outcome is recorded in any case.
    pub async fn handle<B, P, E>(&self, method: &Method, body: B) -> Outcome
    where
        B: Future<Output = std::result::Result<P, E>>,
        P: AsRef<[u8]>,
        E: Display,
    {
        let (outcome, result) = self.execute(method, body).await;
        if let Some(FetchResult { url, status }) = &result {
            self.sink.inc_scrape_outcome(url, *status);
        }
        self.sink.inc_request_outcome(outcome.status_code());
        outcome
    }
}
