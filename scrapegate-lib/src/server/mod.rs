//! HTTP listeners of the service.
//!
//! [`ScrapeService`] accepts scrape requests and runs them through the
//! admission gate; [`MetricsService`] exposes the prometheus registry. Both
//! bind eagerly, serve from a background task and shut down gracefully.

mod metrics;
mod scrape;

pub use metrics::{DEFAULT_METRICS_LISTEN, MetricsService};
pub use scrape::{DEFAULT_LISTEN, ScrapeService, ScraperConfig};

use std::net::SocketAddr;

use axum::Router;
use log::info;
use tokio::{net::TcpListener, task::JoinHandle};
use tokio_util::sync::CancellationToken;

use crate::{ErrorKind, Result};

/// A bound listener serving a router in the background
#[derive(Debug)]
struct Listener {
    addr: SocketAddr,
    cancel: CancellationToken,
    task: JoinHandle<Result<()>>,
}

impl Listener {
    /// Bind `addr` and start serving `app`.
    ///
    /// Binding happens before this returns, so a port that is already taken
    /// is reported to the caller instead of the background task.
    async fn serve(name: &'static str, addr: &str, app: Router) -> Result<Self> {
        let bind_error = |source| ErrorKind::Bind {
            addr: addr.to_string(),
            source,
        };
        let listener = TcpListener::bind(addr).await.map_err(bind_error)?;
        let local_addr = listener.local_addr().map_err(bind_error)?;

        let cancel = CancellationToken::new();
        let shutdown = cancel.clone();
        let task = tokio::spawn(async move {
            info!("Starting {name} on {local_addr}");
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    shutdown.cancelled().await;
                    info!("Shutdown received, shutting down {name}");
                })
                .await
                .map_err(|source| ErrorKind::Serve {
                    addr: local_addr,
                    source,
                })
        });

        Ok(Self {
            addr: local_addr,
            cancel,
            task,
        })
    }

    const fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    fn shutdown(&self) {
        self.cancel.cancel();
    }

    fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    async fn wait(self) -> Result<()> {
        self.task.await?
    }
}
