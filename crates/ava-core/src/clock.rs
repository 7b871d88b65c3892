// crates/ava-core/src/clock.rs
// ============================================================================
// Module: AVA Clock
// Description: Wall-clock abstraction used by session aging, cooldowns, and
//              the job runner's self-rescheduling timers.
// Purpose: Let the evaluation pipeline and control plane be tested without
//          depending on real elapsed time.
// Dependencies: time
// ============================================================================

//! ## Overview
//! Every duration-sensitive computation in the system (session age, cooldown
//! windows, drift snapshot boundaries, the nightly job's wall-clock
//! rescheduling) reads the current instant through [`Clock`] rather than
//! calling into the operating system directly.

use time::Duration;
use time::OffsetDateTime;

/// A source of the current instant, abstracted so tests can supply a fixed
/// or stepped clock instead of the real wall clock.
pub trait Clock: Send + Sync {
    /// Returns the current instant in UTC.
    fn now(&self) -> OffsetDateTime;
}

/// A [`Clock`] backed by the operating system's real-time clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}

/// A [`Clock`] that always returns a fixed instant, advanceable by tests.
#[derive(Debug, Clone)]
pub struct FixedClock {
    instant: std::sync::Mutex<OffsetDateTime>,
}

impl FixedClock {
    /// Creates a clock fixed at `instant`.
    #[must_use]
    pub fn new(instant: OffsetDateTime) -> Self {
        Self {
            instant: std::sync::Mutex::new(instant),
        }
    }

    /// Advances the fixed instant by `delta`.
    ///
    /// # Panics
    /// Panics if the internal mutex is poisoned, which only happens if a
    /// prior caller panicked while holding the lock.
    pub fn advance(&self, delta: Duration) {
        #[allow(
            clippy::unwrap_used,
            reason = "Test-only helper; a poisoned lock indicates a prior test panic."
        )]
        let mut guard = self.instant.lock().unwrap();
        *guard += delta;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> OffsetDateTime {
        #[allow(
            clippy::unwrap_used,
            reason = "Test-only helper; a poisoned lock indicates a prior test panic."
        )]
        *self.instant.lock().unwrap()
    }
}

/// Returns the whole-second difference `later - earlier`, saturating at
/// zero if `later` precedes `earlier`.
#[must_use]
pub fn seconds_between(earlier: OffsetDateTime, later: OffsetDateTime) -> u64 {
    let delta = later - earlier;
    u64::try_from(delta.whole_seconds()).unwrap_or(0)
}
