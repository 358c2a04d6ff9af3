//! Admission control for scrape requests.
//!
//! An [`AdmissionGate`] owns a fixed number of slots. Every unit of work must
//! hold a slot while it runs; callers that find all slots taken wait up to the
//! admission timeout and are rejected afterwards.
//!
//! # Implementation Details
//!
//! Slots are permits of a [`tokio::sync::Semaphore`] and the bounded wait is a
//! [`tokio::time::timeout`] around the acquisition. A slot is a RAII guard, so
//! it is released on every exit path of the guarded work, including errors,
//! panics and dropped futures.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::debug;
use tokio::sync::{Semaphore, SemaphorePermit};

use crate::Outcome;
use crate::telemetry::TelemetrySink;

/// Default number of slots, 2.
pub const DEFAULT_CAPACITY: usize = 2;
/// Default admission timeout, 1 second.
pub const DEFAULT_ADMISSION_TIMEOUT: Duration = Duration::from_millis(1000);

/// Result of a single admission attempt
#[derive(Debug)]
pub enum Admission<'a> {
    /// A slot was acquired. It is held until `permit` is dropped.
    Admitted {
        /// The acquired slot
        permit: SemaphorePermit<'a>,
        /// Time spent waiting for the slot
        waited: Duration,
    },
    /// No slot became available within the admission timeout
    Rejected {
        /// Time spent waiting, never less than the admission timeout
        waited: Duration,
    },
}

impl Admission<'_> {
    /// Time spent waiting for admission
    #[must_use]
    pub const fn waited(&self) -> Duration {
        match self {
            Admission::Admitted { waited, .. } | Admission::Rejected { waited } => *waited,
        }
    }

    /// Returns `true` if a slot was acquired
    #[must_use]
    pub const fn is_admitted(&self) -> bool {
        matches!(self, Admission::Admitted { .. })
    }
}

/// Fixed-capacity concurrency limiter with a bounded admission wait.
///
/// The gate is `Send + Sync` and meant to be shared (e.g. behind an [`Arc`])
/// between all tasks handling requests.
#[derive(Debug)]
pub struct AdmissionGate {
    capacity: usize,
    timeout: Duration,
    semaphore: Semaphore,
    sink: Arc<dyn TelemetrySink>,
}

impl AdmissionGate {
    /// Create a gate with `capacity` slots.
    ///
    /// A capacity of `0` is valid: such a gate never admits anybody and every
    /// attempt is rejected once `timeout` has passed.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` exceeds [`Semaphore::MAX_PERMITS`].
    #[must_use]
    pub fn new(capacity: usize, timeout: Duration, sink: Arc<dyn TelemetrySink>) -> Self {
        Self {
            capacity,
            timeout,
            semaphore: Semaphore::new(capacity),
            sink,
        }
    }

    /// Maximum number of concurrently admitted units of work
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Maximum time a caller waits for a slot
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Number of slots currently free
    #[must_use]
    pub fn available_slots(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Try to acquire a slot, waiting at most the admission timeout.
    ///
    /// The wait is reported to the telemetry sink whether or not the attempt
    /// succeeds.
    pub async fn admit(&self) -> Admission<'_> {
        let start = Instant::now();
        let acquired = tokio::time::timeout(self.timeout, self.semaphore.acquire()).await;
        let waited = start.elapsed();

        self.sink.observe_admission_wait(as_millis(waited));

        match acquired {
            Ok(Ok(permit)) => Admission::Admitted { permit, waited },
            // The semaphore is owned by the gate and never closed, so the
            // only way to get here is the timeout.
            Ok(Err(_)) | Err(_) => Admission::Rejected { waited },
        }
    }

    /// Run `operation` while holding a slot.
    ///
    /// On rejection, `operation` is never polled, a `408 Request Timeout`
    /// outcome is counted and returned instead. On admission, the slot is
    /// released as soon as `operation` completes.
    pub async fn run<F>(&self, operation: F) -> Outcome
    where
        F: Future<Output = Outcome>,
    {
        match self.admit().await {
            Admission::Admitted { permit, waited } => {
                debug!("Admitted after {}ms", waited.as_millis());
                let outcome = operation.await;
                drop(permit);
                outcome
            }
            Admission::Rejected { waited } => {
                debug!(
                    "Rejected after {}ms, all {} slots busy",
                    waited.as_millis(),
                    self.capacity
                );
                let outcome = Outcome::RequestTimeout;
                self.sink.inc_request_outcome(outcome.status_code());
                outcome
            }
        }
    }
}

/// Wait time in whole milliseconds
#[allow(clippy::cast_precision_loss)]
fn as_millis(waited: Duration) -> f64 {
    waited.as_millis() as f64
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use http::StatusCode;

    use super::*;
    use crate::test_utils::RecordingSink;

    fn gate(capacity: usize, timeout: Duration) -> (Arc<AdmissionGate>, Arc<RecordingSink>) {
        let sink = Arc::new(RecordingSink::default());
        let gate = AdmissionGate::new(capacity, timeout, sink.clone());
        (Arc::new(gate), sink)
    }

    #[tokio::test]
    async fn test_admit_with_free_slot() {
        let (gate, sink) = gate(1, Duration::from_millis(100));

        let admission = gate.admit().await;
        assert!(admission.is_admitted());
        assert!(admission.waited() < Duration::from_millis(100));
        assert_eq!(gate.available_slots(), 0);

        drop(admission);
        assert_eq!(gate.available_slots(), 1);
        assert_eq!(sink.admission_waits().len(), 1);
    }

    #[tokio::test]
    async fn test_zero_capacity_always_rejects() {
        let timeout = Duration::from_millis(50);
        let (gate, sink) = gate(0, timeout);
        let executed = AtomicBool::new(false);

        for _ in 0..3 {
            let outcome = gate
                .run(async {
                    executed.store(true, Ordering::SeqCst);
                    Outcome::Ok
                })
                .await;
            assert_eq!(outcome, Outcome::RequestTimeout);
        }

        assert!(!executed.load(Ordering::SeqCst));
        assert_eq!(sink.request_outcomes(), vec![StatusCode::REQUEST_TIMEOUT; 3]);

        let waits = sink.admission_waits();
        assert_eq!(waits.len(), 3);
        assert!(waits.iter().all(|wait| *wait >= 50.0));
    }

    #[tokio::test]
    async fn test_rejection_waits_at_least_timeout() {
        let timeout = Duration::from_millis(30);
        let (gate, _sink) = gate(1, timeout);

        let held = gate.admit().await;
        assert!(held.is_admitted());

        let rejected = gate.admit().await;
        assert!(!rejected.is_admitted());
        assert!(rejected.waited() >= timeout);
    }

    #[tokio::test]
    async fn test_released_slot_is_reused() {
        let (gate, _sink) = gate(1, Duration::from_millis(500));

        let held = gate.admit().await;
        let waiter = tokio::spawn({
            let gate = gate.clone();
            async move { gate.run(async { Outcome::Ok }).await }
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        drop(held);

        assert_eq!(waiter.await.unwrap(), Outcome::Ok);
        assert_eq!(gate.available_slots(), 1);
    }

    #[tokio::test]
    async fn test_run_passes_through_outcome() {
        let (gate, sink) = gate(1, Duration::from_millis(100));

        let outcome = gate.run(async { Outcome::BadRequest }).await;
        assert_eq!(outcome, Outcome::BadRequest);
        assert_eq!(gate.available_slots(), 1);
        // the guarded operation reports its own outcome, the gate only
        // reports rejections
        assert!(sink.request_outcomes().is_empty());
    }

    async fn explode() -> Outcome {
        panic!("fetch exploded")
    }

    #[tokio::test]
    async fn test_slot_released_on_panic() {
        let (gate, _sink) = gate(1, Duration::from_millis(100));

        let task = tokio::spawn({
            let gate = gate.clone();
            async move { gate.run(explode()).await }
        });
        assert!(task.await.unwrap_err().is_panic());

        assert_eq!(gate.available_slots(), 1);
        assert_eq!(gate.run(async { Outcome::Ok }).await, Outcome::Ok);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_capacity_is_never_exceeded() {
        const CAPACITY: usize = 3;
        const CALLERS: usize = 24;

        let (gate, sink) = gate(CAPACITY, Duration::from_secs(10));
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let tasks: Vec<_> = (0..CALLERS)
            .map(|_| {
                let gate = gate.clone();
                let running = running.clone();
                let peak = peak.clone();
                tokio::spawn(async move {
                    gate.run(async {
                        let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                        peak.fetch_max(now, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                        running.fetch_sub(1, Ordering::SeqCst);
                        Outcome::Ok
                    })
                    .await
                })
            })
            .collect();

        for task in tasks {
            assert_eq!(task.await.unwrap(), Outcome::Ok);
        }

        assert!(peak.load(Ordering::SeqCst) <= CAPACITY);
        assert_eq!(running.load(Ordering::SeqCst), 0);
        assert_eq!(gate.available_slots(), CAPACITY);
        assert_eq!(sink.admission_waits().len(), CALLERS);
    }

    #[tokio::test]
    async fn test_every_attempt_is_observed() {
        let timeout = Duration::from_millis(20);
        let (gate, sink) = gate(1, timeout);

        let held = gate.admit().await;
        for _ in 0..4 {
            gate.run(async { Outcome::Ok }).await;
        }
        drop(held);
        gate.run(async { Outcome::Ok }).await;

        let waits = sink.admission_waits();
        assert_eq!(waits.len(), 6);
        assert!(waits.iter().all(|wait| *wait >= 0.0));
        assert!(waits[1..5].iter().all(|wait| *wait >= 20.0));
        assert_eq!(sink.request_outcomes().len(), 4);
    }

    #[test]
    fn test_wait_is_reported_in_whole_millis() {
        assert!((as_millis(Duration::from_micros(1_000_900)) - 1000.0).abs() < f64::EPSILON);
        assert!(as_millis(Duration::ZERO).abs() < f64::EPSILON);
    }
}
