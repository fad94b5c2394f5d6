//! Consecutive-failure circuit breaker wrapped around the tier chain.
//!
//! Pure load shedding: while open the parser still honors its
//! guaranteed-result contract, it just substitutes the canned fallback
//! instead of spending time on tiers that keep failing.

use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{info, warn};

#[derive(Debug, Default)]
struct BreakerState {
    consecutive_failures: u32,
    open_until: Option<Instant>,
}

pub(crate) struct FailureBreaker {
    threshold: u32,
    cooldown: Duration,
    state: Mutex<BreakerState>,
}

impl FailureBreaker {
    pub(crate) fn new(threshold: u32, cooldown: Duration) -> Self {
        Self {
            threshold: threshold.max(1),
            cooldown,
            state: Mutex::new(BreakerState::default()),
        }
    }

    /// Whether the tier chain may run. An expired cooldown closes the
    /// breaker on the spot, so the call observing it proceeds normally.
    pub(crate) fn allows(&self) -> bool {
        let mut state = self.state.lock();
        match state.open_until {
            None => true,
            Some(deadline) => {
                if Instant::now() < deadline {
                    false
                } else {
                    info!("circuit breaker cooldown elapsed, closing");
                    *state = BreakerState::default();
                    true
                }
            }
        }
    }

    pub(crate) fn record_success(&self) {
        let mut state = self.state.lock();
        state.consecutive_failures = 0;
    }

    /// Record a total-exhaustion result; opens the breaker at the
    /// configured threshold.
    pub(crate) fn record_failure(&self) {
        let mut state = self.state.lock();
        state.consecutive_failures = state.consecutive_failures.saturating_add(1);
        if state.consecutive_failures >= self.threshold && state.open_until.is_none() {
            warn!(
                failures = state.consecutive_failures,
                cooldown_ms = self.cooldown.as_millis() as u64,
                "circuit breaker opened"
            );
            state.open_until = Some(Instant::now() + self.cooldown);
            state.consecutive_failures = 0;
        }
    }

    pub(crate) fn is_open(&self) -> bool {
        let state = self.state.lock();
        state
            .open_until
            .is_some_and(|deadline| Instant::now() < deadline)
    }

    pub(crate) fn reset(&self) {
        *self.state.lock() = BreakerState::default();
    }
}
