//! Circuit breaker guarding the upstream Goszakup API.
//!
//! Process-local and shared by every request from one client instance: a
//! single upstream outage blocks all entity syncs uniformly instead of
//! hammering a struggling server from four directions at once.

use std::sync::Mutex;
use std::time::Duration;

use log::{info, warn};
use tokio::time::Instant;

use super::error::ClientError;

struct BreakerState {
    failures: u32,
    open: bool,
    last_failure: Option<Instant>,
}

/// Consecutive-failure circuit breaker with a lazy half-open check.
///
/// Opens once `threshold` failures accumulate; while open, `check` fails
/// fast without any network I/O. After `cooldown` elapses since the last
/// failure the breaker closes again on the next check. Successes decrement
/// the counter toward zero rather than resetting it, so sporadic errors
/// under otherwise healthy traffic never trip the circuit.
pub struct CircuitBreaker {
    threshold: u32,
    cooldown: Duration,
    state: Mutex<BreakerState>,
}

impl CircuitBreaker {
    pub fn new(threshold: u32, cooldown: Duration) -> Self {
        Self {
            threshold: threshold.max(1),
            cooldown,
            state: Mutex::new(BreakerState {
                failures: 0,
                open: false,
                last_failure: None,
            }),
        }
    }

    /// Gate a request attempt. Returns `CircuitOpen` while the circuit is
    /// open and the cooldown has not yet elapsed.
    pub fn check(&self) -> Result<(), ClientError> {
        let mut state = self.state.lock().expect("breaker lock poisoned");

        if !state.open {
            return Ok(());
        }

        let cooled_down = state
            .last_failure
            .map(|at| at.elapsed() >= self.cooldown)
            .unwrap_or(true);

        if cooled_down {
            state.open = false;
            state.failures = 0;
            info!("Circuit breaker closed, resuming requests");
            Ok(())
        } else {
            Err(ClientError::CircuitOpen)
        }
    }

    pub fn record_failure(&self) {
        let mut state = self.state.lock().expect("breaker lock poisoned");
        state.failures += 1;
        state.last_failure = Some(Instant::now());

        if state.failures >= self.threshold && !state.open {
            state.open = true;
            warn!(
                "Circuit breaker opened after {} consecutive failures",
                state.failures
            );
        }
    }

    pub fn record_success(&self) {
        let mut state = self.state.lock().expect("breaker lock poisoned");
        state.failures = state.failures.saturating_sub(1);
    }

    #[cfg(test)]
    fn is_open(&self) -> bool {
        self.state.lock().unwrap().open
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn opens_after_threshold_failures() {
        let breaker = CircuitBreaker::new(5, Duration::from_secs(60));

        for _ in 0..4 {
            breaker.record_failure();
        }
        assert!(breaker.check().is_ok());

        breaker.record_failure();
        assert!(breaker.is_open());
        assert!(matches!(breaker.check(), Err(ClientError::CircuitOpen)));
    }

    #[tokio::test(start_paused = true)]
    async fn closes_after_cooldown() {
        let breaker = CircuitBreaker::new(2, Duration::from_secs(60));
        breaker.record_failure();
        breaker.record_failure();
        assert!(breaker.check().is_err());

        tokio::time::advance(Duration::from_secs(61)).await;

        assert!(breaker.check().is_ok());
        assert!(!breaker.is_open());
    }

    #[tokio::test(start_paused = true)]
    async fn success_decrements_instead_of_resetting() {
        let breaker = CircuitBreaker::new(3, Duration::from_secs(60));

        // Alternating failure/success never accumulates to the threshold.
        for _ in 0..10 {
            breaker.record_failure();
            breaker.record_success();
        }
        assert!(breaker.check().is_ok());

        // But one success only absorbs one failure.
        breaker.record_failure();
        breaker.record_failure();
        breaker.record_success();
        breaker.record_failure();
        breaker.record_failure();
        assert!(breaker.check().is_err());
    }
}
