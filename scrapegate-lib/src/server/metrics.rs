use std::net::SocketAddr;

use axum::{Extension, Router, http::StatusCode, routing::get};
use prometheus::{Registry, TextEncoder};

use super::Listener;
use crate::Result;

/// Default listen address of the metrics endpoint
pub const DEFAULT_METRICS_LISTEN: &str = "0.0.0.0:9095";

/// Exposes a prometheus registry on a `/metrics` route.
#[derive(Debug)]
pub struct MetricsService {
    listener: Listener,
}

impl MetricsService {
    /// Bind `listen` and start serving metrics from `registry` in the
    /// background.
    ///
    /// # Errors
    ///
    /// Returns an error if the listen address cannot be bound.
    pub async fn start(listen: &str, registry: Registry) -> Result<Self> {
        let app = Router::new()
            .route("/metrics", get(metrics))
            .layer(Extension(registry));

        let listener = Listener::serve("metrics service", listen, app).await?;
        Ok(Self { listener })
    }

    /// The bound address, with the actual port if port `0` was requested
    #[must_use]
    pub const fn local_addr(&self) -> SocketAddr {
        self.listener.local_addr()
    }

    /// Stop serving metrics
    pub fn shutdown(&self) {
        self.listener.shutdown();
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

async fn metrics(Extension(registry): Extension<Registry>) -> (StatusCode, String) {
    match TextEncoder.encode_to_string(&registry.gather()) {
        Ok(s) => (StatusCode::OK, s),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("unable to encode metrics: {e}"),
        ),
    }
}
