use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use http::StatusCode;
use log::warn;
use prometheus::core::Collector;
use prometheus::{
    Histogram, IntCounterVec, Registry, TextEncoder, register_histogram_with_registry,
    register_int_counter_vec_with_registry,
};

use super::TelemetrySink;
use crate::Result;

/// Histogram buckets for the admission wait, in milliseconds
pub const ADMISSION_WAIT_BUCKETS: &[f64] = &[10.0, 100.0, 1000.0, 2000.0, 5000.0, 10000.0];

/// Prometheus metrics for scrapegate.
///
/// Cloning is cheap and every clone records into the same registry.
#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    /// `http_requests_total{code}`
    requests: IntCounterVec,
    /// `http_get{url,code}`
    scrapes: IntCounterVec,
    /// `wait_available_worker`
    admission_wait: Histogram,
    closed: Arc<AtomicBool>,
}

impl Metrics {
    /// Create the metrics and register them with a new registry owned by
    /// this instance.
    ///
    /// # Errors
    ///
    /// Returns an error if a metric cannot be registered.
    pub fn new() -> Result<Self> {
        Self::with_registry(Registry::new())
    }

    /// Create the metrics and register them with the given `registry`.
    ///
    /// # Errors
    ///
    /// Returns an error if a metric cannot be registered, for example because
    /// the registry already holds a metric of the same name.
    pub fn with_registry(registry: Registry) -> Result<Self> {
        let requests = register_int_counter_vec_with_registry!(
            "http_requests_total",
            "How many HTTP requests received, partitioned by response code.",
            &["code"],
            registry
        )?;
        let scrapes = register_int_counter_vec_with_registry!(
            "http_get",
            "How many HTTP GET scraped, partitioned by url and response code.",
            &["url", "code"],
            registry
        )?;
        let admission_wait = register_histogram_with_registry!(
            "wait_available_worker",
            "Time waiting for an available worker. In milliseconds.",
            ADMISSION_WAIT_BUCKETS.to_vec(),
            registry
        )?;

        Ok(Self {
            registry,
            requests,
            scrapes,
            admission_wait,
            closed: Arc::new(AtomicBool::new(false)),
        })
    }

    /// The registry holding all metrics, e.g. for serving them
    #[must_use]
    pub const fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Render all metrics in the prometheus text exposition format
    ///
    /// # Errors
    ///
    /// Returns an error if the metrics cannot be encoded.
    pub fn encode(&self) -> Result<String> {
        Ok(TextEncoder.encode_to_string(&self.registry.gather())?)
    }

    /// Current count of `http_requests_total{code}`, `0` if unknown
    #[must_use]
    pub fn request_outcome(&self, status: StatusCode) -> u64 {
        counter_value(&self.requests, &[("code", status.as_str())])
    }

    /// Current count of `http_get{url,code}`, `0` if unknown
    #[must_use]
    pub fn scrape_outcome(&self, url: &str, status: StatusCode) -> u64 {
        counter_value(&self.scrapes, &[("url", url), ("code", status.as_str())])
    }

    /// Number of admission waits observed so far
    #[must_use]
    pub fn admission_wait_count(&self) -> u64 {
        self.admission_wait.get_sample_count()
    }

    /// Sum of all admission waits observed so far, in milliseconds
    #[must_use]
    pub fn admission_wait_sum(&self) -> f64 {
        self.admission_wait.get_sample_sum()
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

impl fmt::Debug for Metrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Metrics")
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

/// Look up a counter without creating it, so that reading never adds
/// label combinations that were not recorded.
fn counter_value(vec: &IntCounterVec, labels: &[(&str, &str)]) -> u64 {
    vec.collect()
        .iter()
        .flat_map(|family| family.get_metric())
        .find(|metric| {
            labels.iter().all(|(name, value)| {
                metric
                    .get_label()
                    .iter()
                    .any(|pair| pair.get_name() == *name && pair.get_value() == *value)
            })
        })
        .map_or(0, |metric| {
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let value = metric.get_counter().get_value() as u64;
            value
        })
}

impl TelemetrySink for Metrics {
    fn inc_request_outcome(&self, status: StatusCode) {
        if self.is_closed() {
            return;
        }
        match self.requests.get_metric_with_label_values(&[status.as_str()]) {
            Ok(counter) => counter.inc(),
            Err(e) => warn!("Cannot record request outcome {status}: {e}"),
        }
    }

    fn inc_scrape_outcome(&self, url: &str, status: StatusCode) {
        if self.is_closed() {
            return;
        }
        match self
            .scrapes
            .get_metric_with_label_values(&[url, status.as_str()])
        {
            Ok(counter) => counter.inc(),
            Err(e) => warn!("Cannot record scrape outcome {status} for `{url}`: {e}"),
        }
    }

    fn observe_admission_wait(&self, millis: f64) {
        if self.is_closed() {
            return;
        }
        self.admission_wait.observe(millis);
    }

    fn shutdown(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.requests.reset();
        self.scrapes.reset();
        let collectors: [Box<dyn Collector>; 3] = [
            Box::new(self.requests.clone()),
            Box::new(self.scrapes.clone()),
            Box::new(self.admission_wait.clone()),
        ];
        for collector in collectors {
            if let Err(e) = self.registry.unregister(collector) {
                warn!("Cannot unregister metric: {e}");
            }
        }
    }
}
