//! `scrapegate` fetches URLs on behalf of its callers while bounding how many
//! fetches run at the same time.
//!
//! Every inbound request first passes an [`AdmissionGate`] with a fixed number
//! of slots. Admitted requests run a [`FetchOperation`], which performs a
//! single outbound GET; rejected requests are answered with
//! `408 Request Timeout` once the admission timeout has passed. Outcomes and
//! admission waits are reported to a [`TelemetrySink`].
//!
//! Running the service with prometheus metrics:
//!
//! ```no_run
//! use std::sync::Arc;
//! use scrapegate_lib::{Metrics, ReqwestFetcher, Result, ScrapeService, ScraperConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let metrics = Arc::new(Metrics::new()?);
//!     let fetcher = Arc::new(ReqwestFetcher::new()?);
//!     let service = ScrapeService::start(ScraperConfig::default(), metrics, fetcher).await?;
//!     println!("Listening on {}", service.local_addr());
//!     service.wait().await
//! }
//! ```
//!
//! The gate can also be used on its own to guard any unit of work:
//!
//! ```
//! use std::{sync::Arc, time::Duration};
//! use scrapegate_lib::{AdmissionGate, Metrics, Outcome};
//!
//! # #[tokio::main]
//! # async fn main() -> scrapegate_lib::Result<()> {
//! let gate = AdmissionGate::new(1, Duration::from_millis(100), Arc::new(Metrics::new()?));
//! let outcome = gate.run(async { Outcome::Ok }).await;
//! assert_eq!(outcome, Outcome::Ok);
//! # Ok(())
//! # }
//! ```
// #![deny(missing_docs)]

#[cfg(feature = "native-tls")]
use openssl_sys as _; // required for vendored-openssl feature

mod fetch;
mod gate;
mod types;

pub mod server;
pub mod telemetry;

#[cfg(test)]
pub(crate) mod test_utils;

#[doc(inline)]
pub use crate::{
    fetch::{DEFAULT_USER_AGENT, FetchOperation, Fetcher, ReqwestFetcher},
    gate::{Admission, AdmissionGate, DEFAULT_ADMISSION_TIMEOUT, DEFAULT_CAPACITY},
    server::{MetricsService, ScrapeService, ScraperConfig},
    telemetry::{Metrics, TelemetrySink},
    types::{ErrorKind, FetchRequest, FetchResult, Outcome, Result},
};
