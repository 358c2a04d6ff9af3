use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    body::to_bytes,
    extract::{Request, State},
    http::StatusCode,
    routing::any,
};
use tokio_util::sync::CancellationToken;

use super::Listener;
use crate::telemetry::TelemetrySink;
use crate::{AdmissionGate, DEFAULT_ADMISSION_TIMEOUT, DEFAULT_CAPACITY};
use crate::{FetchOperation, Fetcher, Result};

/// Default listen address of the scrape endpoint
pub const DEFAULT_LISTEN: &str = "0.0.0.0:8080";

/// Settings of a [`ScrapeService`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScraperConfig {
    /// Address to accept scrape requests on
    pub listen: String,
    /// Path the scrape endpoint is served on
    pub path: String,
    /// Maximum number of concurrent fetches
    pub capacity: usize,
    /// Maximum time a request waits for a free slot
    pub admission_timeout: Duration,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            listen: DEFAULT_LISTEN.to_string(),
            path: String::from("/"),
            capacity: DEFAULT_CAPACITY,
            admission_timeout: DEFAULT_ADMISSION_TIMEOUT,
        }
    }
}

#[derive(Debug, Clone)]
struct ScrapeState {
    gate: Arc<AdmissionGate>,
    operation: FetchOperation,
}

/// The scrape endpoint.
///
/// Every request to the configured path, whatever its method, waits for
/// admission first and is then handed to a [`FetchOperation`]. The response
/// status is the request's [`Outcome`](crate::Outcome), the body is empty.
///
/// A path ending in `/` covers every path below it, so the default `/`
/// serves all paths. Any other path is matched exactly.
#[derive(Debug)]
pub struct ScrapeService {
    path: String,
    listener: Listener,
}

impl ScrapeService {
    /// Bind the listen address and start serving in the background.
    ///
    /// # Errors
    ///
    /// Returns an error if the listen address cannot be bound.
    pub async fn start(
        config: ScraperConfig,
        sink: Arc<dyn TelemetrySink>,
        fetcher: Arc<dyn Fetcher>,
    ) -> Result<Self> {
        let ScraperConfig {
            listen,
            path,
            capacity,
            admission_timeout,
        } = config;
        let path = if path.starts_with('/') {
            path
        } else {
            format!("/{path}")
        };

        let state = ScrapeState {
            gate: Arc::new(AdmissionGate::new(capacity, admission_timeout, sink.clone())),
            operation: FetchOperation::new(fetcher, sink),
        };
        let mut app = Router::new().route(&path, any(scrape));
        // A trailing slash makes the path a prefix covering everything below
        if path.ends_with('/') {
            app = app.route(&format!("{path}*rest"), any(scrape));
        }
        let app = app.with_state(state);

        let listener = Listener::serve("scrape service", &listen, app).await?;
        Ok(Self { path, listener })
    }

    /// The bound address, with the actual port if port `0` was requested
    #[must_use]
    pub const fn local_addr(&self) -> SocketAddr {
        self.listener.local_addr()
    }

    /// URL of the scrape endpoint
    #[must_use]
    pub fn url(&self) -> String {
        format!("http://{}{}", self.local_addr(), self.path)
    }

    /// Stop accepting requests. Requests in flight are allowed to finish.
    pub fn shutdown(&self) {
        self.listener.shutdown();
    }

    /// A token which shuts the service down once cancelled, like
    /// [`shutdown`](Self::shutdown), for use after the service was moved into
    /// [`wait`](Self::wait)
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.listener.cancellation_token()
    }

    /// Wait until the service has stopped.
    ///
    /// # Errors
    ///
    /// Returns an error if serving failed or the server task panicked.
    pub async fn wait(self) -> Result<()> {
        self.listener.wait().await
    }
}

async fn scrape(State(state): State<ScrapeState>, request: Request) -> StatusCode {
    let (parts, body) = request.into_parts();
    let payload = to_bytes(body, usize::MAX);
    state
        .gate
        .run(state.operation.handle(&parts.method, payload))
        .await
        .status_code()
}
