use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Defines how an [`Engine`](crate::engine::Engine) determines the current time.
///
/// Generally an `Engine` will use a:
/// * [`LiveClock`] for live runs against a real venue.
/// * [`SimulatedClock`] for back-testing, advanced only by the engine.
#[derive(Debug, Clone)]
pub enum Clock {
    Live(LiveClock),
    Simulated(SimulatedClock),
}

impl Clock {
    /// Construct a wall-clock [`Clock`].
    pub fn live() -> Self {
        Self::Live(LiveClock)
    }

    /// Construct an unset [`SimulatedClock`], initialised by the engine at run start.
    pub fn simulated() -> Self {
        Self::Simulated(SimulatedClock::default())
    }

    /// Construct a [`SimulatedClock`] pinned to `start`.
    pub fn simulated_at(start: DateTime<Utc>) -> Self {
        Self::Simulated(SimulatedClock::new(start))
    }

    pub fn is_simulated(&self) -> bool {
        matches!(self, Self::Simulated(_))
    }

    /// Current time according to the clock.
    pub fn now(&self) -> DateTime<Utc> {
        match self {
            Self::Live(clock) => clock.now(),
            Self::Simulated(clock) => clock.now(),
        }
    }

    /// Reset the clock to `start`, or clear it with `None`. Ignored by the live clock.
    pub fn reset(&self, start: Option<DateTime<Utc>>) {
        if let Self::Simulated(clock) = self {
            clock.reset(start)
        }
    }

    /// Advance the clock to `max(current, moment)`. No-op on the live clock.
    pub fn advance_to(&self, moment: DateTime<Utc>) {
        if let Self::Simulated(clock) = self {
            clock.advance_to(moment)
        }
    }
}

/// Live `Clock` using `Utc::now()`. Resets and advancement requests are ignored because
/// wall-clock time is continuous.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize)]
pub struct LiveClock;

impl LiveClock {
    pub fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Deterministic `Clock` driven by the event timeline during simulations.
///
/// Monotonic within a run: [`SimulatedClock::advance_to`] never moves backwards. Cheap to
/// clone, with all clones observing the same instant.
#[derive(Debug, Clone, Default)]
pub struct SimulatedClock {
    inner: Arc<parking_lot::RwLock<Option<DateTime<Utc>>>>,
}

impl SimulatedClock {
    /// Construct a new `SimulatedClock` pinned to `start`.
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            inner: Arc::new(parking_lot::RwLock::new(Some(start))),
        }
    }

    /// Current simulated time, falling back to `Utc::now()` when unset.
    pub fn now(&self) -> DateTime<Utc> {
        self.inner.read().unwrap_or_else(Utc::now)
    }

    /// Pin the clock to `start`, or clear it with `None`.
    pub fn reset(&self, start: Option<DateTime<Utc>>) {
        *self.inner.write() = start;
    }

    /// Move the clock forward to `moment`, ignoring targets in the past.
    pub fn advance_to(&self, moment: DateTime<Utc>) {
        let mut lock = self.inner.write();
        match *lock {
            Some(current) if moment <= current => {}
            _ => *lock = Some(moment),
        }
    }
}
