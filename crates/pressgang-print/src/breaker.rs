// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Circuit breaker guarding one spooler route.
//
// If a spooler keeps failing, stop sending it requests that will only time
// out. Fail fast while the circuit is open, then let a single probe through
// once the cool-down has passed to find out whether it recovered.
//
//   CLOSED ──(threshold failures)──▶ OPEN ──(cool-down)──▶ HALF_OPEN
//     ▲                                ▲                       │
//     └────────(probe succeeds)────────┼───────────────────────┤
//                                      └───(probe fails)───────┘
//
// The lock only guards bookkeeping. Callers take an `Admission`, do their
// I/O, and then hand the outcome to `Admission::execute`. A probe whose
// caller goes away without an outcome gives its slot back on drop.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use pressgang_core::config::BreakerConfig;
use pressgang_core::error::ConnectionError;

/// Circuit breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Normal operation: requests pass through.
    Closed,
    /// Too many failures: requests are blocked until the cool-down ends.
    Open,
    /// Cool-down over: one probe request is in flight.
    HalfOpen,
}

/// A failure captured while the connection was still held, reported to the
/// breaker only after the connection has been released.
#[derive(Debug)]
pub struct DeferredError(ConnectionError);

impl DeferredError {
    pub fn into_inner(self) -> ConnectionError {
        self.0
    }
}

impl From<ConnectionError> for DeferredError {
    fn from(error: ConnectionError) -> Self {
        Self(error)
    }
}

/// Leave to make one request, handed out by [`CircuitBreaker::admit`].
#[must_use = "settle the admission with `execute`"]
#[derive(Debug)]
pub struct Admission<'a> {
    breaker: &'a CircuitBreaker,
    probe: bool,
}

impl Admission<'_> {
    /// This request is the half-open probe.
    pub fn is_probe(&self) -> bool {
        self.probe
    }

    /// Record the outcome of the admitted request.
    pub fn execute<T>(mut self, outcome: Result<T, DeferredError>) -> Result<T, ConnectionError> {
        self.probe = false;
        self.breaker.execute(outcome)
    }
}

impl Drop for Admission<'_> {
    fn drop(&mut self) {
        if self.probe {
            debug!(breaker = self.breaker.name, "probe abandoned before completing");
            self.breaker.release_probe();
        }
    }
}

/// Point-in-time view of a breaker, for diagnostics and tests.
#[derive(Debug, Clone)]
pub struct BreakerSnapshot {
    pub state: CircuitState,
    pub consecutive_failures: u32,
    pub opened_at: Option<Instant>,
    pub last_success: Option<Instant>,
    pub last_error: Option<String>,
}

#[derive(Debug)]
struct BreakerInner {
    state: CircuitState,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    last_success: Option<Instant>,
    last_error: Option<String>,
}

impl Default for BreakerInner {
    fn default() -> Self {
        Self {
            state: CircuitState::Closed,
            consecutive_failures: 0,
            opened_at: None,
            last_success: None,
            last_error: None,
        }
    }
}

/// Failure counting and fail-fast gate for one endpoint class.
#[derive(Debug)]
pub struct CircuitBreaker {
    name: &'static str,
    failure_threshold: u32,
    cool_down: Duration,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    pub fn new(name: &'static str, config: &BreakerConfig) -> Self {
        Self {
            name,
            failure_threshold: config.failure_threshold.max(1),
            cool_down: config.cool_down(),
            inner: Mutex::new(BreakerInner::default()),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    fn lock(&self) -> MutexGuard<'_, BreakerInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether a request may be attempted now.
    ///
    /// An open circuit whose cool-down has passed moves to half-open and
    /// admits exactly this call as the probe. Everything else is refused
    /// until the probe's admission is settled or dropped.
    pub fn admit(&self) -> Option<Admission<'_>> {
        let mut inner = self.lock();
        let probe = match inner.state {
            CircuitState::Closed => false,
            CircuitState::Open => {
                let elapsed = inner.opened_at.map_or(self.cool_down, |t| t.elapsed());
                if elapsed >= self.cool_down {
                    info!(breaker = self.name, "circuit half-open; allowing probe request");
                    inner.state = CircuitState::HalfOpen;
                    true
                } else {
                    debug!(
                        breaker = self.name,
                        remaining_ms = (self.cool_down - elapsed).as_millis() as u64,
                        "circuit open; blocking request"
                    );
                    return None;
                }
            }
            CircuitState::HalfOpen => return None,
        };
        Some(Admission {
            breaker: self,
            probe,
        })
    }

    /// Feed the outcome of an attempted request into the breaker and pass it
    /// on to the caller.
    ///
    /// Only failures that say something about the peer count. A non-success
    /// IPP status means the spooler answered, so it counts as a success here.
    pub fn execute<T>(&self, outcome: Result<T, DeferredError>) -> Result<T, ConnectionError> {
        match outcome {
            Ok(value) => {
                self.record_success();
                Ok(value)
            }
            Err(deferred) => {
                let error = deferred.into_inner();
                if error.counts_against_peer() {
                    self.record_failure(&error.to_string());
                } else if matches!(error, ConnectionError::Status { .. }) {
                    self.record_success();
                } else {
                    self.release_probe();
                }
                Err(error)
            }
        }
    }

    pub fn record_success(&self) {
        let mut inner = self.lock();
        if inner.state != CircuitState::Closed {
            info!(
                breaker = self.name,
                prev_state = ?inner.state,
                "spooler recovered; closing circuit"
            );
        }
        inner.state = CircuitState::Closed;
        inner.consecutive_failures = 0;
        inner.opened_at = None;
        inner.last_success = Some(Instant::now());
        inner.last_error = None;
    }

    pub fn record_failure(&self, error: &str) {
        let mut inner = self.lock();
        inner.consecutive_failures = inner.consecutive_failures.saturating_add(1);
        inner.last_error = Some(error.to_string());

        match inner.state {
            CircuitState::HalfOpen => {
                warn!(breaker = self.name, error, "probe failed; reopening circuit breaker");
                inner.state = CircuitState::Open;
                inner.opened_at = Some(Instant::now());
            }
            CircuitState::Closed if inner.consecutive_failures >= self.failure_threshold => {
                warn!(
                    breaker = self.name,
                    failures = inner.consecutive_failures,
                    error,
                    "opening circuit breaker"
                );
                inner.state = CircuitState::Open;
                inner.opened_at = Some(Instant::now());
            }
            _ => debug!(breaker = self.name, failures = inner.consecutive_failures, error, "request failed"),
        }
    }

    /// A probe ended without telling us anything about the peer; let the
    /// next caller probe again without waiting another cool-down.
    fn release_probe(&self) {
        let mut inner = self.lock();
        if inner.state == CircuitState::HalfOpen {
            debug!(breaker = self.name, "probe inconclusive; circuit back to open");
            inner.state = CircuitState::Open;
        }
    }

    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.lock().consecutive_failures
    }

    pub fn snapshot(&self) -> BreakerSnapshot {
        let inner = self.lock();
        BreakerSnapshot {
            state: inner.state,
            consecutive_failures: inner.consecutive_failures,
            opened_at: inner.opened_at,
            last_success: inner.last_success,
            last_error: inner.last_error.clone(),
        }
    }

    /// Force the circuit closed and forget all failures.
    pub fn reset(&self) {
        let mut inner = self.lock();
        if inner.state != CircuitState::Closed {
            info!(breaker = self.name, "circuit reset");
        }
        *inner = BreakerInner::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker(cool_down_ms: u64) -> CircuitBreaker {
        CircuitBreaker::new(
            "test",
            &BreakerConfig {
                failure_threshold: 3,
                cool_down_ms,
            },
        )
    }

    fn timeout() -> Result<(), DeferredError> {
        Err(ConnectionError::Timeout {
            uri: "ipp://test:631/".into(),
            timeout_ms: 10,
        }
        .into())
    }

    #[test]
    fn new_breaker_admits() {
        let breaker = breaker(30_000);
        let admission = breaker.admit().unwrap();
        assert!(!admission.is_probe());
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[test]
    fn circuit_opens_at_threshold() {
        let breaker = breaker(30_000);
        assert!(breaker.execute(timeout()).is_err());
        assert!(breaker.execute(timeout()).is_err());
        assert!(breaker.admit().is_some()); // 2 failures < threshold

        assert!(breaker.execute(timeout()).is_err());
        assert_eq!(breaker.state(), CircuitState::Open);
        assert!(breaker.admit().is_none());
        assert_eq!(breaker.consecutive_failures(), 3);
    }

    #[test]
    fn half_open_admits_a_single_probe() {
        let breaker = breaker(20);
        for _ in 0..3 {
            let _ = breaker.execute(timeout());
        }
        std::thread::sleep(Duration::from_millis(30));

        let probe = breaker.admit().unwrap();
        assert!(probe.is_probe());
        assert_eq!(breaker.state(), CircuitState::HalfOpen);
        assert!(breaker.admit().is_none());
        let _ = probe.execute(Ok(()));
    }

    #[test]
    fn dropped_probe_frees_the_slot() {
        let breaker = breaker(20);
        for _ in 0..3 {
            let _ = breaker.execute(timeout());
        }
        std::thread::sleep(Duration::from_millis(30));

        let probe = breaker.admit().unwrap();
        assert!(breaker.admit().is_none());
        drop(probe);

        assert_eq!(breaker.state(), CircuitState::Open);
        assert_eq!(breaker.consecutive_failures(), 3);
        let next = breaker.admit().unwrap();
        assert!(next.is_probe());
        assert_eq!(next.execute(Ok(1)).unwrap(), 1);
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[test]
    fn probe_failure_reopens_with_fresh_cool_down() {
        let breaker = breaker(40);
        for _ in 0..3 {
            let _ = breaker.execute(timeout());
        }
        let first_open = breaker.snapshot().opened_at.unwrap();
        std::thread::sleep(Duration::from_millis(50));

        let probe = breaker.admit().unwrap();
        let _ = probe.execute(timeout());
        let snapshot = breaker.snapshot();
        assert_eq!(snapshot.state, CircuitState::Open);
        assert!(snapshot.opened_at.unwrap() > first_open);
        assert!(breaker.admit().is_none());
    }

    #[test]
    fn probe_success_closes_and_clears_count() {
        let breaker = breaker(20);
        for _ in 0..3 {
            let _ = breaker.execute(timeout());
        }
        std::thread::sleep(Duration::from_millis(30));

        let probe = breaker.admit().unwrap();
        assert_eq!(probe.execute(Ok(7)).unwrap(), 7);
        assert_eq!(breaker.state(), CircuitState::Closed);
        assert_eq!(breaker.consecutive_failures(), 0);
        assert!(breaker.snapshot().last_error.is_none());
    }

    #[test]
    fn status_errors_do_not_trip() {
        let breaker = breaker(30_000);
        for _ in 0..5 {
            let outcome: Result<(), DeferredError> = Err(ConnectionError::Status {
                uri: "ipp://test:631/".into(),
                code: 0x0400,
            }
            .into());
            let err = breaker.execute(outcome).unwrap_err();
            assert!(matches!(err, ConnectionError::Status { code: 0x0400, .. }));
        }
        assert_eq!(breaker.state(), CircuitState::Closed);
        assert_eq!(breaker.consecutive_failures(), 0);
    }

    #[test]
    fn inconclusive_probe_allows_another() {
        let breaker = breaker(20);
        for _ in 0..3 {
            let _ = breaker.execute(timeout());
        }
        std::thread::sleep(Duration::from_millis(30));

        let probe = breaker.admit().unwrap();
        let outcome: Result<(), DeferredError> = Err(ConnectionError::PoolExhausted {
            class: "local",
            timeout_ms: 1,
        }
        .into());
        let _ = probe.execute(outcome);
        assert_eq!(breaker.state(), CircuitState::Open);
        assert!(breaker.admit().is_some());
    }

    #[test]
    fn reset_closes() {
        let breaker = breaker(30_000);
        for _ in 0..3 {
            let _ = breaker.execute(timeout());
        }
        breaker.reset();
        assert_eq!(breaker.state(), CircuitState::Closed);
        assert!(breaker.admit().is_some());
    }
}
