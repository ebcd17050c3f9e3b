//! Time source abstraction.
//!
//! Everything time-dependent in the engine (SCRAM pulse expiry, sustained
//! critical duration) reads the clock through this trait, so tests can drive
//! a synthetic clock instead of waiting on the wall clock.

use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

pub trait Clock: Send + Sync + 'static {
    /// Current monotonic instant.
    ///
    /// In production this follows `tokio::time`, which also honours a paused
    /// test runtime.
    fn now(&self) -> Instant;
}

/// Production clock backed by `tokio::time::Instant`
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Synthetic clock that only moves when told to
#[derive(Debug, Clone)]
pub struct ManualClock {
    origin: Instant,
    offset: Arc<Mutex<Duration>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            offset: Arc::new(Mutex::new(Duration::ZERO)),
        }
    }

    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Advances the clock by the given duration.
    pub fn advance(&self, duration: Duration) {
        let mut offset = self.offset.lock().unwrap_or_else(|e| e.into_inner());
        *offset += duration;
    }

    /// Time elapsed since the clock was created
    pub fn elapsed(&self) -> Duration {
        *self.offset.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + self.elapsed()
    }
}
