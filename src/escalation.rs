//! Sustained hyper-critical escalation.
//!
//! The monitor watches for readings beyond the hyper-critical limits, which
//! sit above the classifier's Emergency limits. A hyper-critical condition
//! held continuously for longer than the hold period locks the plant down.
//! Lockdown is terminal: there is no transition back to monitoring.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;

use crate::reactor::Reading;

/// Hyper-critical temperature limit [°C]
pub const HYPER_CRITICAL_TEMP_C: f64 = 650.0;
/// Hyper-critical radiation limit [µSv/h]
pub const HYPER_CRITICAL_RADIATION_USV: f64 = 250.0;
/// How long the condition must persist before lockdown
pub const LOCKDOWN_HOLD: Duration = Duration::from_secs(15);

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EscalationPolicy {
    pub temperature_limit: f64,
    pub radiation_limit: f64,
    pub hold: Duration,
}

impl Default for EscalationPolicy {
    fn default() -> Self {
        Self {
            temperature_limit: HYPER_CRITICAL_TEMP_C,
            radiation_limit: HYPER_CRITICAL_RADIATION_USV,
            hold: LOCKDOWN_HOLD,
        }
    }
}

impl EscalationPolicy {
    pub fn is_hyper_critical(&self, reading: &Reading) -> bool {
        reading.temperature > self.temperature_limit || reading.radiation > self.radiation_limit
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EscalationState {
    Monitoring,
    LockedDown,
}

/// Emitted exactly once, on the transition into lockdown
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LockdownEvent {
    /// Reading that completed the hold period
    pub reading: Reading,
    /// How long the condition had been held
    pub sustained: Duration,
}

impl LockdownEvent {
    pub fn notice(&self) -> String {
        format!(
            "CONTAINMENT LOCKDOWN: hyper-critical conditions sustained for {:.0}s \
             (core {:.1}°C, flux {:.1} μSv/h). Operator controls disabled.",
            self.sustained.as_secs_f64(),
            self.reading.temperature,
            self.reading.radiation
        )
    }
}

#[derive(Debug, Clone)]
pub struct EscalationMonitor {
    policy: EscalationPolicy,
    state: EscalationState,
    critical_since: Option<Instant>,
}

impl Default for EscalationMonitor {
    fn default() -> Self {
        Self::new(EscalationPolicy::default())
    }
}

impl EscalationMonitor {
    pub fn new(policy: EscalationPolicy) -> Self {
        Self {
            policy,
            state: EscalationState::Monitoring,
            critical_since: None,
        }
    }

    pub fn state(&self) -> EscalationState {
        self.state
    }

    pub fn is_locked_down(&self) -> bool {
        self.state == EscalationState::LockedDown
    }

    pub fn critical_since(&self) -> Option<Instant> {
        self.critical_since
    }

    /// Feed the latest reading. Returns the lockdown event on the one tick
    /// that crosses the hold period, `None` otherwise.
    pub fn observe(&mut self, reading: &Reading, now: Instant) -> Option<LockdownEvent> {
        if self.is_locked_down() {
            return None;
        }

        if !self.policy.is_hyper_critical(reading) {
            // Any recovery restarts the hold period from scratch
            self.critical_since = None;
            return None;
        }

        let since = *self.critical_since.get_or_insert(now);
        let sustained = now.saturating_duration_since(since);
        if sustained > self.policy.hold {
            self.state = EscalationState::LockedDown;
            return Some(LockdownEvent {
                reading: *reading,
                sustained,
            });
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hot(sequence: u64) -> Reading {
        Reading {
            sequence,
            temperature: 700.0,
            radiation: 50.0,
            ..Reading::baseline()
        }
    }

    fn calm(sequence: u64) -> Reading {
        Reading { sequence, ..Reading::baseline() }
    }

    #[test]
    fn locks_down_after_sustained_hold() {
        let t0 = Instant::now();
        let mut monitor = EscalationMonitor::default();
        let mut events = 0;
        for s in 0..=16u64 {
            if monitor.observe(&hot(s), t0 + Duration::from_secs(s)).is_some() {
                events += 1;
            }
        }
        assert_eq!(monitor.state(), EscalationState::LockedDown);
        assert_eq!(events, 1);
    }

    #[test]
    fn exactly_hold_is_not_enough() {
        let t0 = Instant::now();
        let mut monitor = EscalationMonitor::default();
        for s in 0..=15u64 {
            assert!(monitor.observe(&hot(s), t0 + Duration::from_secs(s)).is_none());
        }
        assert_eq!(monitor.state(), EscalationState::Monitoring);
    }

    #[test]
    fn recovery_resets_hold() {
        let t0 = Instant::now();
        let mut monitor = EscalationMonitor::default();
        for s in 0..=14u64 {
            monitor.observe(&hot(s), t0 + Duration::from_secs(s));
        }
        monitor.observe(&calm(15), t0 + Duration::from_secs(15));
        assert!(monitor.critical_since().is_none());

        // Another 14 seconds must not carry over the first 14
        for s in 16..=30u64 {
            monitor.observe(&hot(s), t0 + Duration::from_secs(s));
        }
        assert_eq!(monitor.state(), EscalationState::Monitoring);
    }

    #[test]
    fn radiation_alone_counts() {
        let t0 = Instant::now();
        let mut monitor = EscalationMonitor::default();
        let r = Reading { radiation: 260.0, ..Reading::baseline() };
        monitor.observe(&r, t0);
        let event = monitor.observe(&r, t0 + Duration::from_secs(16));
        assert!(event.is_some());
        assert!(event.map(|e| e.notice()).unwrap_or_default().contains("LOCKDOWN"));
    }

    #[test]
    fn emergency_but_not_hyper_critical_never_locks() {
        let t0 = Instant::now();
        let mut monitor = EscalationMonitor::default();
        let r = Reading { temperature: 600.0, radiation: 200.0, ..Reading::baseline() };
        for s in 0..60u64 {
            monitor.observe(&r, t0 + Duration::from_secs(s));
        }
        assert_eq!(monitor.state(), EscalationState::Monitoring);
        assert!(monitor.critical_since().is_none());
    }

    #[test]
    fn lockdown_is_terminal() {
        let t0 = Instant::now();
        let mut monitor = EscalationMonitor::default();
        monitor.observe(&hot(0), t0);
        assert!(monitor.observe(&hot(1), t0 + Duration::from_secs(20)).is_some());
        for s in 2..10u64 {
            assert!(monitor.observe(&calm(s), t0 + Duration::from_secs(20 + s)).is_none());
        }
        assert!(monitor.is_locked_down());
    }
}
