//! Shared failure counters and stop signal
//!
//! One `CircuitBreaker` is shared by every fetch in a scope (a discovery run,
//! an extraction pool invocation, or a single job). Counter updates, the
//! threshold check, and tripping the stop signal happen under one lock, so no
//! caller decides on a stale count.

use crate::config::ThresholdConfig;
use std::sync::{Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;

/// HTTP failure classes tracked by the breaker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureClass {
    /// HTTP 429
    RateLimited,
    /// HTTP 404
    NotFound,
    /// 2xx with an empty or placeholder body
    EmptyBody,
}

impl FailureClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RateLimited => "rate_limited",
            Self::NotFound => "not_found",
            Self::EmptyBody => "empty_body",
        }
    }
}

/// Snapshot of the consecutive-failure counters
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FailureCounts {
    pub rate_limited: u32,
    pub not_found: u32,
    pub empty_body: u32,
}

impl FailureCounts {
    fn get_mut(&mut self, class: FailureClass) -> &mut u32 {
        match class {
            FailureClass::RateLimited => &mut self.rate_limited,
            FailureClass::NotFound => &mut self.not_found,
            FailureClass::EmptyBody => &mut self.empty_body,
        }
    }
}

/// Result of recording one response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreakerDecision {
    /// Counter value after the update (0 for a reset)
    pub count: u32,
    /// Threshold for the counter that was updated
    pub threshold: u32,
    /// Whether this update tripped the stop signal
    pub tripped: bool,
}

#[derive(Debug, Default)]
struct BreakerState {
    counts: FailureCounts,
    tripped_by: Option<FailureClass>,
}

/// Consecutive-failure circuit breaker with a set-once stop signal
#[derive(Debug)]
pub struct CircuitBreaker {
    state: Mutex<BreakerState>,
    thresholds: ThresholdConfig,
    stop: CancellationToken,
}

impl CircuitBreaker {
    /// Creates a breaker with its own stop signal
    pub fn new(thresholds: ThresholdConfig) -> Self {
        Self::with_token(thresholds, CancellationToken::new())
    }

    /// Creates a breaker that trips (and observes) the given stop signal
    pub fn with_token(thresholds: ThresholdConfig, stop: CancellationToken) -> Self {
        Self {
            state: Mutex::new(BreakerState::default()),
            thresholds,
            stop,
        }
    }

    /// Creates a breaker with fresh counters whose stop signal is a child of this one
    ///
    /// Tripping this breaker stops the child; tripping the child leaves this
    /// breaker running.
    pub fn child(&self) -> Self {
        Self::with_token(self.thresholds, self.stop.child_token())
    }

    // The guarded data is plain counters, so a poisoned lock is still usable.
    fn lock(&self) -> MutexGuard<'_, BreakerState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn threshold(&self, class: FailureClass) -> u32 {
        match class {
            FailureClass::RateLimited => self.thresholds.rate_limited,
            FailureClass::NotFound => self.thresholds.not_found,
            FailureClass::EmptyBody => self.thresholds.empty_body,
        }
    }

    fn bump(&self, state: &mut BreakerState, class: FailureClass) -> BreakerDecision {
        let counter = state.counts.get_mut(class);
        *counter += 1;
        let count = *counter;
        let threshold = self.threshold(class);

        let tripped = count >= threshold;
        if tripped {
            state.tripped_by.get_or_insert(class);
            self.stop.cancel();
        }

        BreakerDecision {
            count,
            threshold,
            tripped,
        }
    }

    /// Records a failure of the given class, tripping the stop signal at threshold
    pub fn record_failure(&self, class: FailureClass) -> BreakerDecision {
        let mut state = self.lock();
        self.bump(&mut state, class)
    }

    /// Records a 2xx response
    ///
    /// Resets the rate-limited and not-found counters. A usable body also
    /// resets the empty-body counter; an unusable one increments it.
    pub fn record_success(&self, usable_body: bool) -> BreakerDecision {
        let mut state = self.lock();
        state.counts.rate_limited = 0;
        state.counts.not_found = 0;

        if usable_body {
            state.counts.empty_body = 0;
            BreakerDecision {
                count: 0,
                threshold: self.thresholds.empty_body,
                tripped: false,
            }
        } else {
            self.bump(&mut state, FailureClass::EmptyBody)
        }
    }

    /// Sets the stop signal without touching the counters
    pub fn stop(&self) {
        let _state = self.lock();
        self.stop.cancel();
    }

    /// Returns true once the stop signal is set
    pub fn is_stopped(&self) -> bool {
        self.stop.is_cancelled()
    }

    /// The stop signal observed by fetches in this scope
    pub fn token(&self) -> &CancellationToken {
        &self.stop
    }

    /// Current counter values
    pub fn counts(&self) -> FailureCounts {
        self.lock().counts
    }

    /// The failure class whose threshold tripped this breaker, if any
    pub fn tripped_by(&self) -> Option<FailureClass> {
        self.lock().tripped_by
    }

    pub fn thresholds(&self) -> ThresholdConfig {
        self.thresholds
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn thresholds(rate_limited: u32, not_found: u32, empty_body: u32) -> ThresholdConfig {
        ThresholdConfig {
            rate_limited,
            not_found,
            empty_body,
        }
    }

    #[test]
    fn test_trips_at_threshold() {
        let breaker = CircuitBreaker::new(thresholds(3, 10, 10));

        assert!(!breaker.record_failure(FailureClass::RateLimited).tripped);
        assert!(!breaker.record_failure(FailureClass::RateLimited).tripped);
        assert!(!breaker.is_stopped());

        let decision = breaker.record_failure(FailureClass::RateLimited);
        assert!(decision.tripped);
        assert_eq!(decision.count, 3);
        assert!(breaker.is_stopped());
        assert_eq!(breaker.tripped_by(), Some(FailureClass::RateLimited));
    }

    #[test]
    fn test_success_resets_counters() {
        let breaker = CircuitBreaker::new(thresholds(5, 5, 5));
        breaker.record_failure(FailureClass::RateLimited);
        breaker.record_failure(FailureClass::RateLimited);
        breaker.record_failure(FailureClass::NotFound);
        breaker.record_success(false);
        breaker.record_success(false);

        // The unusable bodies reset 429/404 but accumulate empty-body
        assert_eq!(
            breaker.counts(),
            FailureCounts {
                rate_limited: 0,
                not_found: 0,
                empty_body: 2
            }
        );

        breaker.record_failure(FailureClass::RateLimited);
        breaker.record_success(true);
        assert_eq!(breaker.counts(), FailureCounts::default());
    }

    #[test]
    fn test_stop_signal_is_monotonic() {
        let breaker = CircuitBreaker::new(thresholds(1, 10, 10));
        breaker.record_failure(FailureClass::RateLimited);
        assert!(breaker.is_stopped());

        // Later successes reset counters but never clear the stop signal
        breaker.record_success(true);
        assert!(breaker.is_stopped());
        assert_eq!(breaker.tripped_by(), Some(FailureClass::RateLimited));
    }

    #[test]
    fn test_first_trip_cause_is_kept() {
        let breaker = CircuitBreaker::new(thresholds(1, 1, 1));
        breaker.record_failure(FailureClass::NotFound);
        breaker.record_failure(FailureClass::RateLimited);
        assert_eq!(breaker.tripped_by(), Some(FailureClass::NotFound));
    }

    #[test]
    fn test_child_breaker_scoping() {
        let parent = CircuitBreaker::new(thresholds(1, 10, 10));
        let child = parent.child();

        child.record_failure(FailureClass::RateLimited);
        assert!(child.is_stopped());
        assert!(!parent.is_stopped());

        let sibling = parent.child();
        parent.stop();
        assert!(sibling.is_stopped());
    }

    #[test]
    fn test_concurrent_increments_trip_exactly_once() {
        let breaker = Arc::new(CircuitBreaker::new(thresholds(50, 10, 10)));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let breaker = Arc::clone(&breaker);
                std::thread::spawn(move || {
                    (0..25)
                        .filter(|_| {
                            let decision = breaker.record_failure(FailureClass::RateLimited);
                            decision.tripped && decision.count == 50
                        })
                        .count()
                })
            })
            .collect();

        let exact_trips: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(exact_trips, 1);
        assert_eq!(breaker.counts().rate_limited, 200);
        assert!(breaker.is_stopped());
    }
}
