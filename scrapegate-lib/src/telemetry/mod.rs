//! Telemetry for scrape requests.
//!
//! The admission gate and the fetch operation report into a [`TelemetrySink`].
//! [`Metrics`] is the production sink backed by a `prometheus` registry it owns;
//! there is no process-wide registry.
//!
//! Recording must never fail the request being recorded: sinks swallow (and
//! log) their own errors.

mod metrics;

pub use metrics::{ADMISSION_WAIT_BUCKETS, Metrics};

use http::StatusCode;

/// Append-only target for request, scrape, and admission-wait observations.
///
/// Implementations are shared between concurrently running requests and
/// must keep aggregate counts consistent under concurrent writes.
pub trait TelemetrySink: Send + Sync + std::fmt::Debug {
    /// Count one completed inbound request, rejections included
    fn inc_request_outcome(&self, status: StatusCode);

    /// Count one completed outbound fetch, keyed by URL and remote status
    fn inc_scrape_outcome(&self, url: &str, status: StatusCode);

    /// Record how long one caller waited for admission, in milliseconds
    fn observe_admission_wait(&self, millis: f64);

    /// Release the sink's resources. Observations after this are dropped.
    fn shutdown(&self);
}
